use colored::Colorize;
use genetic_diversity::config::{ExperimentKind, Mu1Config, NoahConfig, SimpleConfig};
use genetic_diversity::demo_data::generate_problem;
use genetic_diversity::diversity::DiversityModel;
use genetic_diversity::diversity_preserver::{DiversitySelector, QualityGate};
use genetic_diversity::error::EngineError;
use genetic_diversity::genetic_algorithm::{Operators, SurvivorSelector};
use genetic_diversity::noah::{Noah, NoahOperators};
use genetic_diversity::operators::{
    select_mu, select_random, select_tournament, terminate_generations,
};
use genetic_diversity::population::Population;
use genetic_diversity::report::{timestamped_filename, ReportSink, RunRecord};
use genetic_diversity::schedule::{
    evaluate_tardy_jobs, initialize_fixed, initialize_random, lcs_diversity_model, mutate_swap,
    render_schedule, MachineSchedulingProblem, Schedule,
};
use genetic_diversity::solvers::max_on_time_jobs;
use genetic_diversity::visualization::{render_gantt, schedule_timeline};
use itertools::iproduct;
use log::info;
use rayon::prelude::*;
use std::env;
use std::error::Error;
use std::sync::Arc;
use std::time::Instant;

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug)]
pub struct TestSchema {
    experiments: Vec<ExperimentKind>,
    jobs: Vec<usize>,
    machines: Vec<usize>,
    population_sizes: Vec<usize>,
    seeds: Vec<u64>,
}

#[derive(Debug)]
pub struct RunResult {
    record: RunRecord,
    best_specimen: Schedule,
}

const RUNS: usize = 5;
const MAX_PROCESSING_TIME: u32 = 50;

fn run_seed(seed: u64, run: usize) -> u64 {
    seed.wrapping_mul(1_000_003).wrapping_add(run as u64)
}

fn run_simple(
    problem: &Arc<MachineSchedulingProblem>,
    config: &SimpleConfig,
    seed: u64,
) -> Result<Population<Schedule, f64>, EngineError> {
    config.validate()?;
    let evaluate = evaluate_tardy_jobs(Arc::clone(problem));
    let operators = Operators::default()
        .with_evaluate(Arc::clone(&evaluate))
        .with_select_parents(select_tournament(config.tournament_size))
        .with_mutate(mutate_swap(config.mutation_rate))
        .with_select_survivors(SurvivorSelector::Generational(select_mu(
            config.population_size,
            evaluate,
        )));

    let initialize = initialize_random(config.population_size, problem.jobs(), problem.machines);
    let mut population = Population::new(seed, &initialize, operators)?;
    population.run_until(terminate_generations(config.generations))?;
    Ok(population)
}

// Starts from the population of a simple run, so the quality gate admits
// offspring from the first generation on
fn run_mu1(
    problem: &Arc<MachineSchedulingProblem>,
    config: &Mu1Config,
    model: &DiversityModel<Schedule>,
    optimum: f64,
    seed: u64,
) -> Result<Population<Schedule, f64>, EngineError> {
    config.validate()?;
    let simple = SimpleConfig {
        population_size: config.population_size,
        ..Default::default()
    };
    let warm_start = run_simple(problem, &simple, seed)?;

    let evaluate = evaluate_tardy_jobs(Arc::clone(problem));
    let selector = DiversitySelector::new(model.clone(), config.population_size)
        .with_quality_gate(QualityGate::new(Arc::clone(&evaluate), optimum, config.alpha));
    let operators = Operators::default()
        .with_evaluate(evaluate)
        .with_uniform_parents(select_random(1))
        .with_mutate(mutate_swap(config.mutation_rate))
        .with_select_survivors(SurvivorSelector::Diversity(Box::new(selector)));

    let mut population =
        Population::new(seed, &initialize_fixed(warm_start.genes(false)), operators)?;
    population.run_generations(config.generations)?;
    Ok(population)
}

fn run_noah(
    problem: &Arc<MachineSchedulingProblem>,
    config: &NoahConfig,
    model: &DiversityModel<Schedule>,
    generations: usize,
    seed: u64,
) -> Result<Population<Schedule, f64>, EngineError> {
    let evaluate = evaluate_tardy_jobs(Arc::clone(problem));
    let operators = NoahOperators {
        evaluate: Arc::clone(&evaluate),
        select_parents: select_tournament(config.tournament_size),
        select_survivors: select_mu(config.population_size, evaluate),
        mutate: mutate_swap(config.mutation_rate),
        recombine: None,
        model: model.clone(),
    };

    let mut noah = Noah::new(config.clone(), operators)?;
    let initialize = initialize_random(config.population_size, problem.jobs(), problem.machines);
    let mut population = noah.population(seed, &initialize)?;
    noah.run(&mut population, terminate_generations(generations))?;
    Ok(population)
}

// Exact for one machine, otherwise the best of a long simple run
fn estimate_optimum(
    problem: &Arc<MachineSchedulingProblem>,
    seed: u64,
) -> Result<f64, EngineError> {
    if problem.machines == 1 {
        return Ok(max_on_time_jobs(problem) as f64);
    }

    let config = SimpleConfig {
        generations: 2000,
        ..Default::default()
    };
    let evaluate = evaluate_tardy_jobs(Arc::clone(problem));
    let population = run_simple(problem, &config, seed)?;
    Ok(population.best_fitness(&evaluate)?.unwrap_or(0.0))
}

fn benchmark_run(
    kind: ExperimentKind,
    problem: &Arc<MachineSchedulingProblem>,
    population_size: usize,
    optimum: f64,
    seed: u64,
    run: usize,
) -> Result<RunResult, EngineError> {
    let model = lcs_diversity_model(problem);
    let evaluate = evaluate_tardy_jobs(Arc::clone(problem));
    let generations = Mu1Config::default().generations;
    let seed = run_seed(seed, run);

    let start = Instant::now();
    let population = match kind {
        ExperimentKind::Simple => {
            let config = SimpleConfig {
                population_size,
                generations,
                ..Default::default()
            };
            run_simple(problem, &config, seed)?
        }
        ExperimentKind::Mu1 => {
            let config = Mu1Config {
                population_size,
                ..Default::default()
            };
            run_mu1(problem, &config, &model, optimum, seed)?
        }
        ExperimentKind::Noah => {
            let config = NoahConfig {
                population_size,
                barrier_value: optimum,
                remaining_solutions_n: (population_size / 2).max(1),
                ..Default::default()
            };
            run_noah(problem, &config, &model, generations, seed)?
        }
    };
    let runtime = start.elapsed().as_secs_f64();

    let best_specimen = population
        .best_individuals(true, &evaluate)?
        .into_iter()
        .next()
        .unwrap_or_default();

    Ok(RunResult {
        record: RunRecord {
            seed,
            jobs: problem.jobs(),
            machines: problem.machines,
            population_size,
            run,
            algorithm: kind.to_string(),
            generations: population.generation(),
            diversity: population.diversity(&model),
            best_fitness: population.best_fitness(&evaluate)?.unwrap_or(0.0),
            optimum,
            unique_individuals: population.size(true),
            runtime,
        },
        best_specimen,
    })
}

fn collect_benchmarks(
    schemas: &[TestSchema],
    selected: &[ExperimentKind],
    sink: &ReportSink,
) -> Result<Option<(RunResult, Arc<MachineSchedulingProblem>)>, BoxError> {
    let mut best: Option<(RunResult, Arc<MachineSchedulingProblem>)> = None;

    for schema in schemas {
        for (&jobs, &machines, &population_size, &seed) in iproduct!(
            &schema.jobs,
            &schema.machines,
            &schema.population_sizes,
            &schema.seeds
        ) {
            let problem = Arc::new(generate_problem(seed, jobs, machines, MAX_PROCESSING_TIME));
            problem.validate()?;
            let optimum = estimate_optimum(&problem, seed)?;
            info!("n={} m={} seed={} optimum {}", jobs, machines, seed, optimum);

            for &kind in schema
                .experiments
                .iter()
                .filter(|kind| selected.is_empty() || selected.contains(kind))
            {
                let results: Vec<Result<RunResult, BoxError>> = (0..RUNS)
                    .into_par_iter()
                    .map(|run| -> Result<RunResult, BoxError> {
                        let result =
                            benchmark_run(kind, &problem, population_size, optimum, seed, run)?;
                        sink.append(&result.record)?;
                        Ok(result)
                    })
                    .collect();

                for result in results {
                    let result = result?;
                    let record = &result.record;
                    println!(
                        "{} - n: {}, m: {}, mu: {}, run: {}, fitness: {}/{}, diversity: {:.4}, unique: {}, {:.2}s",
                        format!("{:6}", record.algorithm).bold().red(),
                        record.jobs,
                        record.machines,
                        record.population_size,
                        record.run,
                        record.best_fitness,
                        record.optimum,
                        record.diversity,
                        record.unique_individuals,
                        record.runtime,
                    );

                    let gap = |r: &RunRecord| r.optimum - r.best_fitness;
                    if best.as_ref().map_or(true, |(b, _)| gap(record) < gap(&b.record)) {
                        best = Some((result, Arc::clone(&problem)));
                    }
                }
            }
        }
    }

    Ok(best)
}

fn main() -> Result<(), BoxError> {
    env_logger::init();

    let selected = env::args()
        .skip(1)
        .map(|argument| argument.parse::<ExperimentKind>())
        .collect::<Result<Vec<_>, _>>()?;

    let schemas = vec![
        TestSchema {
            experiments: vec![ExperimentKind::Simple, ExperimentKind::Mu1, ExperimentKind::Noah],
            jobs: vec![10, 20],
            machines: vec![1],
            population_sizes: vec![5, 10],
            seeds: vec![945845, 23417],
        },
        TestSchema {
            experiments: vec![ExperimentKind::Simple, ExperimentKind::Mu1, ExperimentKind::Noah],
            jobs: vec![20, 40],
            machines: vec![2, 3],
            population_sizes: vec![10],
            seeds: vec![945845],
        },
    ];

    let filename = timestamped_filename("test_results", "csv");
    let sink = ReportSink::create(&filename)?;

    if let Some((result, problem)) = collect_benchmarks(&schemas, &selected, &sink)? {
        println!(
            "Best {} schedule (fitness {}):\n{}",
            result.record.algorithm,
            result.record.best_fitness,
            render_schedule(&result.best_specimen)
        );

        let timeline = schedule_timeline(&result.best_specimen, &problem);
        let chart = timestamped_filename("best_schedule", "png");
        render_gantt(&timeline, &problem, true, &chart).map_err(|error| error.to_string())?;
    }

    println!("Results written to {}", filename);
    Ok(())
}
