use crate::schedule::{MachineSchedulingProblem, Schedule};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Moore-Hodgson: a single-machine sequence with the maximum number of
/// on-time jobs. On-time jobs come first in due-date order, followed by the
/// rejected jobs.
pub fn moore_hodgson(processing_times: &[u32], due_dates: &[u32]) -> Vec<usize> {
    let mut by_due_date: Vec<usize> = (0..processing_times.len()).collect();
    by_due_date.sort_by_key(|&job| (due_dates[job], job));

    let mut scheduled: BinaryHeap<(u32, Reverse<usize>)> = BinaryHeap::new();
    let mut rejected = Vec::new();
    let mut current_time: u32 = 0;

    for job in by_due_date {
        scheduled.push((processing_times[job], Reverse(job)));
        current_time += processing_times[job];

        if current_time > due_dates[job] {
            // Drop the longest job scheduled so far.
            if let Some((longest, Reverse(dropped))) = scheduled.pop() {
                current_time -= longest;
                rejected.push(dropped);
            }
        }
    }

    let mut on_time: Vec<usize> = scheduled.into_iter().map(|(_, Reverse(job))| job).collect();
    on_time.sort_by_key(|&job| (due_dates[job], job));
    on_time.extend(rejected);
    on_time
}

/// The Moore-Hodgson sequence as a one-machine schedule.
pub fn optimal_single_machine(problem: &MachineSchedulingProblem) -> Schedule {
    vec![moore_hodgson(&problem.processing_times, &problem.due_dates)]
}

/// Maximum number of on-time jobs on a single machine, the optimum of the
/// tardy-jobs fitness for `m = 1`.
pub fn max_on_time_jobs(problem: &MachineSchedulingProblem) -> usize {
    problem.jobs() - problem.tardy_jobs(&optimal_single_machine(problem))
}
