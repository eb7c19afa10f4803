use crate::schedule::{MachineSchedulingProblem, Schedule};
use log::info;
use plotters::prelude::*;
use std::error::Error;

/// A job placed on the time axis: `(job, machine, start, end)`.
pub type TimelineEntry = (usize, usize, u32, u32);

// Jobs run back to back in list order on every machine
pub fn schedule_timeline(schedule: &Schedule, problem: &MachineSchedulingProblem) -> Vec<TimelineEntry> {
    let mut timeline: Vec<TimelineEntry> = Vec::with_capacity(problem.jobs());

    for (machine, jobs) in schedule.iter().enumerate() {
        let mut current_time: u32 = 0;
        for &job in jobs {
            let end_time = current_time + problem.processing_times[job];
            timeline.push((job, machine, current_time, end_time));
            current_time = end_time;
        }
    }

    timeline
}

pub fn render_gantt(
    timeline: &[TimelineEntry],
    problem: &MachineSchedulingProblem,
    highlight_tardy: bool,
    output_path: &str,
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(output_path, (1600, 900)).into_drawing_area();
    root.fill(&WHITE)?;

    let machines = problem.machines.max(1) as u32;
    let max_time = timeline
        .iter()
        .map(|&(_, _, _, end_time)| end_time)
        .max()
        .unwrap_or(0)
        .max(1);

    let mut chart = ChartBuilder::on(&root)
        .caption("Schedule", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d(0..max_time, 0..machines)?;

    chart
        .configure_mesh()
        .x_desc("Time")
        .y_desc("Machine")
        .y_labels(machines as usize)
        .x_labels(10)
        .draw()?;

    for &(job, machine, start_time, end_time) in timeline {
        let machine = machine as u32;
        let tardy = end_time > problem.due_dates[job];
        let color = if highlight_tardy && tardy {
            RED.to_rgba()
        } else if highlight_tardy {
            Palette99::pick(job).mix(0.4)
        } else {
            Palette99::pick(job).to_rgba()
        };

        chart
            .draw_series(vec![Rectangle::new(
                [(start_time, machine), (end_time, machine + 1)],
                color.filled(),
            )])?
            .label(format!("Job {}", job))
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    info!("chart saved to {}", output_path);
    Ok(())
}
