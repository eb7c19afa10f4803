use genetic_diversity::config::NoahConfig;
use genetic_diversity::demo_data::generate_problem;
use genetic_diversity::diversity_preserver::{DiversitySelector, QualityGate};
use genetic_diversity::genetic_algorithm::{Operators, SurvivorSelector};
use genetic_diversity::noah::{Noah, NoahOperators};
use genetic_diversity::operators::{
    select_mu, select_random, select_tournament, terminate_generations,
};
use genetic_diversity::population::Population;
use genetic_diversity::schedule::{
    evaluate_tardy_jobs, initialize_random, lcs_diversity_model, mutate_remove_insert,
    mutate_swap, MachineSchedulingProblem, Schedule,
};
use genetic_diversity::solvers::max_on_time_jobs;
use std::sync::Arc;

fn sorted_jobs(schedule: &Schedule) -> Vec<usize> {
    let mut jobs: Vec<usize> = schedule.iter().flatten().copied().collect();
    jobs.sort_unstable();
    jobs
}

fn mu1_population(
    problem: &Arc<MachineSchedulingProblem>,
    mu: usize,
    alpha: Option<f64>,
    seed: u64,
) -> Population<Schedule, f64> {
    let model = lcs_diversity_model(problem);
    let evaluate = evaluate_tardy_jobs(Arc::clone(problem));
    let mut selector = DiversitySelector::new(model, mu);
    if let Some(alpha) = alpha {
        let optimum = max_on_time_jobs(problem) as f64;
        selector =
            selector.with_quality_gate(QualityGate::new(Arc::clone(&evaluate), optimum, alpha));
    }
    let operators = Operators::default()
        .with_evaluate(evaluate)
        .with_uniform_parents(select_random(1))
        .with_mutate(mutate_remove_insert(1.0))
        .with_select_survivors(SurvivorSelector::Diversity(Box::new(selector)));

    Population::new(seed, &initialize_random(mu, problem.jobs(), problem.machines), operators)
        .unwrap()
}

#[test]
fn mu1_run_keeps_size_and_matches_full_recomputation() {
    let problem = Arc::new(generate_problem(945845, 12, 1, 20));
    let model = lcs_diversity_model(&problem);
    let mut population = mu1_population(&problem, 6, None, 3);

    for generation in 1..=200 {
        population.step().unwrap();
        assert_eq!(population.size(false), 6);
        assert_eq!(population.generation(), generation);
    }

    for schedule in population.genes(false) {
        assert_eq!(sorted_jobs(&schedule), (0..12).collect::<Vec<_>>());
    }

    // The selector's cache uses its own model instance, so this recomputes.
    let full = model.population_diversity(&population.genes(false));
    let cached = population.cached_diversity().unwrap();
    assert!((full - cached).abs() < 1e-9);
}

#[test]
fn identical_seeds_reproduce_mu1_runs() {
    let problem = Arc::new(generate_problem(23417, 10, 2, 30));
    let mut a = mu1_population(&problem, 5, Some(0.5), 99);
    let mut b = mu1_population(&problem, 5, Some(0.5), 99);

    a.run_generations(150).unwrap();
    b.run_generations(150).unwrap();
    assert_eq!(a.genes(false), b.genes(false));
    assert_eq!(a.cached_diversity(), b.cached_diversity());
}

#[test]
fn simple_run_reaches_the_single_machine_optimum_from_below() {
    let problem = Arc::new(generate_problem(7, 10, 1, 20));
    let evaluate = evaluate_tardy_jobs(Arc::clone(&problem));
    let operators = Operators::default()
        .with_evaluate(Arc::clone(&evaluate))
        .with_select_parents(select_tournament(2))
        .with_mutate(mutate_swap(1.0))
        .with_select_survivors(SurvivorSelector::Generational(select_mu(
            10,
            Arc::clone(&evaluate),
        )));
    let mut population =
        Population::new(1, &initialize_random(10, problem.jobs(), 1), operators).unwrap();
    let initial = population.best_fitness(&evaluate).unwrap().unwrap();

    population.run_until(terminate_generations(300)).unwrap();

    let best = population.best_fitness(&evaluate).unwrap().unwrap();
    assert!(best >= initial);
    assert!(best <= max_on_time_jobs(&problem) as f64);
    assert_eq!(population.generation(), 300);
}

#[test]
fn noah_run_on_a_scheduling_problem() {
    let problem = Arc::new(generate_problem(945845, 15, 2, 20));
    let evaluate = evaluate_tardy_jobs(Arc::clone(&problem));
    let config = NoahConfig {
        population_size: 6,
        obj_generations_n: 20,
        remaining_solutions_n: 3,
        div_generations_con: 10,
        ..Default::default()
    };
    let operators = NoahOperators {
        evaluate: Arc::clone(&evaluate),
        select_parents: select_tournament(2),
        select_survivors: select_mu(6, Arc::clone(&evaluate)),
        mutate: mutate_swap(1.0),
        recombine: None,
        model: lcs_diversity_model(&problem),
    };

    let mut noah = Noah::new(config, operators).unwrap();
    let mut population = noah
        .population(17, &initialize_random(6, problem.jobs(), problem.machines))
        .unwrap();
    noah.run(&mut population, terminate_generations(400)).unwrap();

    assert!(noah.bounds().windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(population.size(false) <= 6);
    let fitnesses = evaluate(&population.genes(false));
    assert!(fitnesses.iter().all(|&fitness| fitness >= noah.bound()));
    for schedule in population.genes(false) {
        assert_eq!(sorted_jobs(&schedule), (0..15).collect::<Vec<_>>());
    }
}
