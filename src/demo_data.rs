use crate::schedule::MachineSchedulingProblem;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal};

// Uniform processing times in 1..=max
pub fn processing_times(seed: u64, jobs: usize, max: u32) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..jobs).map(|_| rng.gen_range(1..=max.max(1))).collect()
}

// The first half of the jobs is released at time zero, the second half
// follows an exponential distribution capped by the total processing time
pub fn release_dates(seed: u64, processing_times: &[u32]) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let jobs = processing_times.len();
    let upper_bound: u32 = processing_times.iter().sum();
    let Ok(distribution) = Exp::new(0.1) else {
        return vec![0; jobs];
    };

    (0..jobs)
        .map(|job| {
            if job < jobs / 2 {
                return 0;
            }
            loop {
                let sample = distribution.sample(&mut rng) as u32;
                if sample <= upper_bound {
                    return sample;
                }
            }
        })
        .collect()
}

// Due dates are normally distributed around r + f * p with f drawn from
// [3, 10], never earlier than r + p
pub fn due_dates(seed: u64, processing_times: &[u32], release_dates: &[u32]) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(seed);

    processing_times
        .iter()
        .zip(release_dates)
        .map(|(&p, &r)| {
            let factor: f64 = rng.gen_range(3.0..10.0);
            let mean = r as f64 + factor * p as f64;
            let std_dev = (factor - 1.0) * p as f64 / 3.0;
            let earliest = r + p;

            match Normal::new(mean, std_dev) {
                Ok(distribution) => loop {
                    let sample = distribution.sample(&mut rng);
                    if sample >= earliest as f64 {
                        break sample as u32;
                    }
                },
                Err(_) => earliest.max(mean as u32),
            }
        })
        .collect()
}

pub fn generate_problem(seed: u64, jobs: usize, machines: usize, max_processing_time: u32) -> MachineSchedulingProblem {
    let processing_times = processing_times(seed, jobs, max_processing_time);
    let release_dates = release_dates(seed, &processing_times);
    let due_dates = due_dates(seed, &processing_times, &release_dates);

    MachineSchedulingProblem {
        machines,
        processing_times,
        release_dates,
        due_dates,
    }
}
