use crate::diversity::{DiversityModel, Normalization};
use crate::error::ConfigError;
use crate::genetic_algorithm::{EvaluateFn, InitializeFn, MutateFn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type Schedule = Vec<Vec<usize>>;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MachineSchedulingProblem {
    pub machines: usize,
    pub processing_times: Vec<u32>,
    pub release_dates: Vec<u32>,
    pub due_dates: Vec<u32>,
}

impl MachineSchedulingProblem {
    pub fn jobs(&self) -> usize {
        self.processing_times.len()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.machines == 0 || self.processing_times.is_empty() {
            return Err(ConfigError::EmptyProblem);
        }
        Ok(())
    }

    pub fn normalization(&self) -> Normalization {
        Normalization::ProblemScaled {
            jobs: self.jobs(),
            machines: self.machines,
        }
    }

    // Completion time of each machine, jobs back to back
    pub fn machine_completion_times(&self, schedule: &Schedule) -> Vec<u32> {
        schedule
            .iter()
            .map(|jobs| jobs.iter().map(|&job| self.processing_times[job]).sum())
            .collect()
    }

    pub fn makespan(&self, schedule: &Schedule) -> u32 {
        self.machine_completion_times(schedule)
            .into_iter()
            .max()
            .unwrap_or(0)
    }

    pub fn tardy_jobs(&self, schedule: &Schedule) -> usize {
        schedule
            .iter()
            .map(|jobs| {
                let mut current_time = 0;
                jobs.iter()
                    .filter(|&&job| {
                        current_time += self.processing_times[job];
                        current_time > self.due_dates[job]
                    })
                    .count()
            })
            .sum()
    }
}

/// Assigns each job to a uniformly random machine and shuffles every machine list.
pub fn initialize_random(population_size: usize, jobs: usize, machines: usize) -> InitializeFn<Schedule> {
    Arc::new(move |rng: &mut StdRng| {
        (0..population_size)
            .map(|_| {
                let mut schedule: Schedule = vec![Vec::new(); machines];
                for job in 0..jobs {
                    schedule[rng.gen_range(0..machines)].push(job);
                }
                for machine in schedule.iter_mut() {
                    machine.shuffle(rng);
                }
                schedule
            })
            .collect()
    })
}

pub fn initialize_fixed(genes: Vec<Schedule>) -> InitializeFn<Schedule> {
    Arc::new(move |_: &mut StdRng| genes.clone())
}

pub fn evaluate_makespan(problem: Arc<MachineSchedulingProblem>) -> EvaluateFn<Schedule, f64> {
    Arc::new(move |genes: &[Schedule]| {
        genes
            .par_iter()
            .map(|schedule| -(problem.makespan(schedule) as f64))
            .collect()
    })
}

pub fn evaluate_tardy_jobs(problem: Arc<MachineSchedulingProblem>) -> EvaluateFn<Schedule, f64> {
    Arc::new(move |genes: &[Schedule]| {
        let jobs = problem.jobs();
        genes
            .par_iter()
            .map(|schedule| (jobs - problem.tardy_jobs(schedule)) as f64)
            .collect()
    })
}

fn random_slot(schedule: &Schedule, rng: &mut StdRng) -> Option<(usize, usize)> {
    let loaded: Vec<usize> = (0..schedule.len())
        .filter(|&machine| !schedule[machine].is_empty())
        .collect();
    let &machine = loaded.choose(rng)?;
    Some((machine, rng.gen_range(0..schedule[machine].len())))
}

pub fn mutate_swap(mutation_rate: f64) -> MutateFn<Schedule> {
    Arc::new(move |genes: &[Schedule], rng: &mut StdRng| {
        genes
            .iter()
            .map(|schedule| {
                let mut mutated = schedule.clone();
                if rng.gen_bool(mutation_rate) {
                    if let (Some((m1, j1)), Some((m2, j2))) =
                        (random_slot(&mutated, rng), random_slot(&mutated, rng))
                    {
                        let job = mutated[m1][j1];
                        mutated[m1][j1] = mutated[m2][j2];
                        mutated[m2][j2] = job;
                    }
                }
                mutated
            })
            .collect()
    })
}

// Moves a random job to a random position on a random machine
pub fn mutate_remove_insert(mutation_rate: f64) -> MutateFn<Schedule> {
    Arc::new(move |genes: &[Schedule], rng: &mut StdRng| {
        genes
            .iter()
            .map(|schedule| {
                let mut mutated = schedule.clone();
                if rng.gen_bool(mutation_rate) {
                    if let Some((machine, position)) = random_slot(&mutated, rng) {
                        let job = mutated[machine].remove(position);
                        let target = rng.gen_range(0..mutated.len());
                        let at = rng.gen_range(0..=mutated[target].len());
                        mutated[target].insert(at, job);
                    }
                }
                mutated
            })
            .collect()
    })
}

pub fn lcs_length(a: &[usize], b: &[usize]) -> usize {
    let mut dp = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            dp[i][j] = if a[i] == b[j] {
                1 + dp[i + 1][j + 1]
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }
    dp[0][0]
}

/// Smallest LCS length over all pairs of machine lists.
pub fn lcs_similarity(a: &Schedule, b: &Schedule) -> f64 {
    a.iter()
        .flat_map(|machine_a| b.iter().map(move |machine_b| lcs_length(machine_a, machine_b)))
        .min()
        .unwrap_or(0) as f64
}

pub fn lcs_diversity_model(problem: &MachineSchedulingProblem) -> DiversityModel<Schedule> {
    DiversityModel::new(lcs_similarity, problem.normalization())
}

/// One line per machine, 1-based: `1: 3 0 2`.
pub fn render_schedule(schedule: &Schedule) -> String {
    schedule
        .iter()
        .enumerate()
        .map(|(machine, jobs)| {
            let jobs: Vec<String> = jobs.iter().map(|job| job.to_string()).collect();
            format!("{}: {}\n", machine + 1, jobs.join(" "))
        })
        .collect()
}
