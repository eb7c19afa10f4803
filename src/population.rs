use crate::diversity::DiversityModel;
use crate::error::EngineError;
use crate::genetic_algorithm::{
    EvaluateFn, Fitness, Genotype, InitializeFn, Operator, Operators, SurvivorSelector,
};
use itertools::Itertools;
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cmp::Ordering;

/// A population of genotypes evolved by hot-swappable operators.
///
/// The engine is generic over the genotype `T` and the fitness `L`; every
/// piece of domain behaviour arrives through [`Operators`]. The random
/// stream is seeded once, so identical seeds and operators give identical
/// trajectories.
pub struct Population<T, L> {
    genes: Vec<T>,
    rng: StdRng,
    generation: usize,
    operators: Operators<T, L>,
}

/// Genes of a population at one generation.
#[derive(Clone, Debug)]
pub struct PopulationSnapshot<T> {
    genes: Vec<T>,
    generation: usize,
}

impl<T: Genotype, L: Fitness> Population<T, L> {
    pub fn new(
        seed: u64,
        initialize: &InitializeFn<T>,
        operators: Operators<T, L>,
    ) -> Result<Self, EngineError> {
        if let Some(operator) = operators.missing_evaluate() {
            return Err(EngineError::MissingEvaluate { operator });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let genes = initialize(&mut rng);
        if genes.is_empty() {
            return Err(EngineError::EmptyPopulation);
        }

        Ok(Self {
            genes,
            rng,
            generation: 0,
            operators,
        })
    }

    fn evaluate_genes(&self, genes: &[T]) -> Result<Vec<L>, EngineError> {
        match &self.operators.evaluate {
            Some(evaluate) => checked_evaluate(evaluate, genes),
            None => Ok(Vec::new()),
        }
    }

    /// Runs one generation. On error the genes and the generation counter
    /// are left as they were.
    pub fn step(&mut self) -> Result<(), EngineError> {
        let fitnesses = self.evaluate_genes(&self.genes)?;

        let parents = match &self.operators.select_parents {
            Some(selector) => (selector.select_fn())(&self.genes, &fitnesses, &mut self.rng),
            None => self.genes.clone(),
        };

        let children = match &self.operators.recombine {
            Some(recombine) => recombine(&parents, &mut self.rng),
            None => parents,
        };

        let children = match &self.operators.mutate {
            Some(mutate) => mutate(&children, &mut self.rng),
            None => children,
        };

        let survivors = match &mut self.operators.select_survivors {
            Some(SurvivorSelector::Generational(select_survivors)) => {
                select_survivors(&self.genes, &fitnesses, &children, &mut self.rng)
            }
            Some(SurvivorSelector::Diversity(selector)) => {
                selector.select(&self.genes, children, &mut self.rng)?
            }
            None => children,
        };

        self.genes = survivors;
        self.generation += 1;
        debug!(
            "generation {} complete with {} individuals",
            self.generation,
            self.genes.len()
        );

        Ok(())
    }

    /// Steps until `terminate` holds; the predicate is checked before every step.
    pub fn run_until<F>(&mut self, mut terminate: F) -> Result<(), EngineError>
    where
        F: FnMut(&Population<T, L>) -> bool,
    {
        while !terminate(self) {
            self.step()?;
        }
        Ok(())
    }

    pub fn run_generations(&mut self, generations: usize) -> Result<(), EngineError> {
        for _ in 0..generations {
            self.step()?;
        }
        Ok(())
    }

    /// Replaces one operator binding. Rejected if it would leave a
    /// fitness-based selector without an evaluator.
    pub fn rebind(&mut self, operator: Operator<T, L>) -> Result<(), EngineError> {
        let previous = match operator {
            Operator::Evaluate(evaluate) => {
                Operator::Evaluate(std::mem::replace(&mut self.operators.evaluate, evaluate))
            }
            Operator::SelectParents(select_parents) => Operator::SelectParents(std::mem::replace(
                &mut self.operators.select_parents,
                select_parents,
            )),
            Operator::Recombine(recombine) => {
                Operator::Recombine(std::mem::replace(&mut self.operators.recombine, recombine))
            }
            Operator::Mutate(mutate) => {
                Operator::Mutate(std::mem::replace(&mut self.operators.mutate, mutate))
            }
            Operator::SelectSurvivors(select_survivors) => Operator::SelectSurvivors(
                std::mem::replace(&mut self.operators.select_survivors, select_survivors),
            ),
        };

        if let Some(name) = self.operators.missing_evaluate() {
            self.restore_operator(previous);
            return Err(EngineError::MissingEvaluate { operator: name });
        }

        Ok(())
    }

    fn restore_operator(&mut self, operator: Operator<T, L>) {
        match operator {
            Operator::Evaluate(evaluate) => self.operators.evaluate = evaluate,
            Operator::SelectParents(select_parents) => {
                self.operators.select_parents = select_parents
            }
            Operator::Recombine(recombine) => self.operators.recombine = recombine,
            Operator::Mutate(mutate) => self.operators.mutate = mutate,
            Operator::SelectSurvivors(select_survivors) => {
                self.operators.select_survivors = select_survivors
            }
        }
    }

    pub fn operators(&self) -> &Operators<T, L> {
        &self.operators
    }

    /// Replaces the genes. A diversity cache is dropped, since it no longer
    /// describes the population.
    pub fn set_genes(&mut self, genes: Vec<T>) {
        if let Some(SurvivorSelector::Diversity(selector)) = &mut self.operators.select_survivors {
            selector.reset();
        }
        self.genes = genes;
    }

    pub fn snapshot(&self) -> PopulationSnapshot<T> {
        PopulationSnapshot {
            genes: self.genes.clone(),
            generation: self.generation,
        }
    }

    /// Rolls the genes back. The generation counter and the random stream
    /// keep moving forward. A diversity cache one generation ahead of the
    /// snapshot is reverted in place; further back it is dropped.
    pub fn restore(&mut self, snapshot: PopulationSnapshot<T>) {
        if let Some(SurvivorSelector::Diversity(selector)) = &mut self.operators.select_survivors {
            match self.generation.saturating_sub(snapshot.generation) {
                0 => {}
                1 if selector.revert() => {}
                _ => selector.reset(),
            }
        }
        self.genes = snapshot.genes;
    }

    pub fn genes(&self, dedupe: bool) -> Vec<T> {
        if dedupe {
            self.genes.iter().unique().cloned().collect()
        } else {
            self.genes.clone()
        }
    }

    pub fn genes_ref(&self) -> &[T] {
        &self.genes
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn size(&self, dedupe: bool) -> usize {
        if dedupe {
            self.genes.iter().unique().count()
        } else {
            self.genes.len()
        }
    }

    /// All genotypes attaining the maximum fitness under `evaluate`.
    pub fn best_individuals(
        &self,
        dedupe: bool,
        evaluate: &EvaluateFn<T, L>,
    ) -> Result<Vec<T>, EngineError> {
        let fitnesses = checked_evaluate(evaluate, &self.genes)?;
        let Some(best) = max_fitness(&fitnesses) else {
            return Ok(Vec::new());
        };

        let bests = self
            .genes
            .iter()
            .zip(&fitnesses)
            .filter(|(_, &fitness)| fitness.partial_cmp(&best) == Some(Ordering::Equal))
            .map(|(genotype, _)| genotype);

        Ok(if dedupe {
            bests.unique().cloned().collect()
        } else {
            bests.cloned().collect()
        })
    }

    pub fn best_fitness(&self, evaluate: &EvaluateFn<T, L>) -> Result<Option<L>, EngineError> {
        Ok(max_fitness(&checked_evaluate(evaluate, &self.genes)?))
    }

    /// Current diversity under `model`. Uses the survivor selector's cache
    /// when it is warm, otherwise recomputes every pair.
    pub fn diversity(&self, model: &DiversityModel<T>) -> f64 {
        if let Some(SurvivorSelector::Diversity(selector)) = &self.operators.select_survivors {
            if selector.model().same_as(model) {
                if let Some(diversity) = selector.diversity() {
                    return diversity;
                }
            }
        }
        model.population_diversity(&self.genes)
    }

    /// Cached diversity of the survivor selector, if any.
    pub fn cached_diversity(&self) -> Option<f64> {
        match &self.operators.select_survivors {
            Some(SurvivorSelector::Diversity(selector)) => selector.diversity(),
            _ => None,
        }
    }
}

pub fn checked_evaluate<T, L>(evaluate: &EvaluateFn<T, L>, genes: &[T]) -> Result<Vec<L>, EngineError> {
    let fitnesses = evaluate(genes);
    if fitnesses.len() != genes.len() {
        return Err(EngineError::FitnessLengthMismatch {
            genes: genes.len(),
            fitnesses: fitnesses.len(),
        });
    }
    Ok(fitnesses)
}

pub fn max_fitness<L: Fitness>(fitnesses: &[L]) -> Option<L> {
    fitnesses
        .iter()
        .copied()
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diversity::Normalization;
    use crate::diversity_preserver::DiversitySelector;
    use crate::genetic_algorithm::{MutateFn, SelectParentsFn, SelectSurvivorsFn};
    use proptest::prelude::*;
    use rand::Rng;
    use std::sync::Arc;

    fn random_initialize(size: usize) -> InitializeFn<i64> {
        Arc::new(move |rng: &mut StdRng| (0..size).map(|_| rng.gen_range(0..100)).collect())
    }

    fn identity_evaluate() -> EvaluateFn<i64, f64> {
        Arc::new(|genes: &[i64]| genes.iter().map(|&g| g as f64).collect())
    }

    fn jitter() -> MutateFn<i64> {
        Arc::new(|genes: &[i64], rng: &mut StdRng| {
            genes.iter().map(|g| g + rng.gen_range(-3..=3)).collect()
        })
    }

    fn single_random_parent() -> SelectParentsFn<i64, f64> {
        Arc::new(|genes: &[i64], _: &[f64], rng: &mut StdRng| {
            vec![genes[rng.gen_range(0..genes.len())]]
        })
    }

    fn keep_best(mu: usize) -> SelectSurvivorsFn<i64, f64> {
        Arc::new(move |parents: &[i64], _: &[f64], children: &[i64], _: &mut StdRng| {
            let mut combined: Vec<i64> = parents.iter().chain(children).copied().collect();
            combined.sort_by(|a, b| b.cmp(a));
            combined.truncate(mu);
            combined
        })
    }

    fn mu1_population(seed: u64, mu: usize) -> Population<i64, f64> {
        let model = DiversityModel::new(
            |a: &i64, b: &i64| (a - b).abs() as f64,
            Normalization::Fixed(1000.0),
        );
        let operators = Operators::default()
            .with_evaluate(identity_evaluate())
            .with_select_parents(single_random_parent())
            .with_mutate(jitter())
            .with_select_survivors(SurvivorSelector::Diversity(Box::new(
                DiversitySelector::new(model, mu),
            )));
        Population::new(seed, &random_initialize(mu), operators).unwrap()
    }

    #[test]
    fn test_empty_initialization_is_rejected() {
        let initialize: InitializeFn<i64> = Arc::new(|_: &mut StdRng| Vec::new());
        let result: Result<Population<i64, f64>, _> =
            Population::new(0, &initialize, Operators::default());
        assert!(matches!(result, Err(EngineError::EmptyPopulation)));
    }

    #[test]
    fn test_fitness_selectors_require_evaluate() {
        let operators: Operators<i64, f64> =
            Operators::default().with_select_parents(single_random_parent());
        let result = Population::new(0, &random_initialize(4), operators);
        assert!(matches!(
            result,
            Err(EngineError::MissingEvaluate {
                operator: "select_parents"
            })
        ));
    }

    #[test]
    fn test_rebind_rejects_removing_evaluate() {
        let mut population = mu1_population(3, 4);
        let result = population.rebind(Operator::Evaluate(None));
        assert!(matches!(result, Err(EngineError::MissingEvaluate { .. })));
        assert!(population.operators().evaluate.is_some());
        population.step().unwrap();
    }

    #[test]
    fn test_mismatched_fitness_length_fails_without_advancing() {
        let broken: EvaluateFn<i64, f64> = Arc::new(|_: &[i64]| vec![1.0]);
        let operators = Operators::default()
            .with_evaluate(broken)
            .with_select_survivors(SurvivorSelector::Generational(keep_best(3)));
        let mut population = Population::new(1, &random_initialize(3), operators).unwrap();
        let before = population.genes(false);

        assert!(matches!(
            population.step(),
            Err(EngineError::FitnessLengthMismatch {
                genes: 3,
                fitnesses: 1
            })
        ));
        assert_eq!(population.generation(), 0);
        assert_eq!(population.genes(false), before);
    }

    #[test]
    fn test_unbound_operators_are_identity() {
        let mut population: Population<i64, f64> =
            Population::new(9, &random_initialize(5), Operators::default()).unwrap();
        let before = population.genes(false);
        population.run_generations(3).unwrap();
        assert_eq!(population.genes(false), before);
        assert_eq!(population.generation(), 3);
    }

    #[test]
    fn test_run_until_stops_as_soon_as_predicate_holds() {
        let mut population = mu1_population(5, 4);
        let mut checks = 0;
        population
            .run_until(|p| {
                checks += 1;
                p.generation() >= 7
            })
            .unwrap();
        assert_eq!(population.generation(), 7);
        assert_eq!(checks, 8);
    }

    #[test]
    fn test_best_individuals_dedupe() {
        let initialize: InitializeFn<i64> = Arc::new(|_: &mut StdRng| vec![5, 9, 9, 2, 9]);
        let population: Population<i64, f64> = Population::new(
            0,
            &initialize,
            Operators::default().with_evaluate(identity_evaluate()),
        )
        .unwrap();
        let evaluate = identity_evaluate();

        assert_eq!(population.best_individuals(false, &evaluate).unwrap(), vec![9, 9, 9]);
        assert_eq!(population.best_individuals(true, &evaluate).unwrap(), vec![9]);
        assert_eq!(population.best_fitness(&evaluate).unwrap(), Some(9.0));
        assert_eq!(population.size(true), 3);
        assert_eq!(population.genes(true), vec![5, 9, 2]);
    }

    #[test]
    fn test_identical_seeds_give_identical_trajectories() {
        let mut a = mu1_population(1234, 6);
        let mut b = mu1_population(1234, 6);
        for _ in 0..50 {
            a.step().unwrap();
            b.step().unwrap();
            assert_eq!(a.genes(false), b.genes(false));
        }
    }

    #[test]
    fn test_restore_one_step_back_reverts_the_cache() {
        let mut population = mu1_population(77, 5);
        population.step().unwrap();
        let snapshot = population.snapshot();
        let genes = population.genes(false);
        let diversity = population.cached_diversity();

        population.step().unwrap();
        population.restore(snapshot);

        assert_eq!(population.genes(false), genes);
        assert!(diversity.is_some());
        assert_eq!(population.cached_diversity(), diversity);
        match &population.operators().select_survivors {
            Some(SurvivorSelector::Diversity(selector)) => {
                assert_eq!(selector.preserver().genes(), genes)
            }
            other => panic!("unexpected survivor selector {:?}", other),
        }
        assert_eq!(population.generation(), 2);
        population.step().unwrap();
        assert_eq!(population.size(false), 5);
    }

    #[test]
    fn test_restore_several_steps_back_drops_the_cache() {
        let mut population = mu1_population(78, 5);
        population.step().unwrap();
        let snapshot = population.snapshot();
        let genes = population.genes(false);

        population.run_generations(4).unwrap();
        population.restore(snapshot);

        assert_eq!(population.genes(false), genes);
        assert!(population.cached_diversity().is_none());
        assert_eq!(population.generation(), 5);
        population.step().unwrap();
        assert_eq!(population.size(false), 5);
    }

    #[test]
    fn test_uniform_parents_run_without_evaluate() {
        let operators: Operators<i64, f64> = Operators::default()
            .with_uniform_parents(crate::operators::select_random(4))
            .with_mutate(jitter());
        let mut population = Population::new(2, &random_initialize(4), operators).unwrap();
        population.run_generations(5).unwrap();
        assert_eq!(population.size(false), 4);

        let result = population.rebind(Operator::SelectParents(Some(
            crate::genetic_algorithm::ParentSelector::Fitness(single_random_parent()),
        )));
        assert!(matches!(
            result,
            Err(EngineError::MissingEvaluate {
                operator: "select_parents"
            })
        ));
        population.step().unwrap();
        assert_eq!(population.size(false), 4);
    }

    #[test]
    fn test_set_genes_resets_diversity_cache() {
        let mut population = mu1_population(8, 4);
        population.step().unwrap();
        assert!(population.cached_diversity().is_some());
        population.set_genes(vec![1, 2, 3, 4]);
        assert!(population.cached_diversity().is_none());
        population.step().unwrap();
        assert_eq!(population.size(false), 4);
    }

    proptest! {
        #[test]
        fn prop_mu1_population_size_is_invariant(
            seed in any::<u64>(),
            mu in 2usize..10,
            generations in 0usize..40,
        ) {
            let mut population = mu1_population(seed, mu);
            for step in 0..generations {
                population.step().unwrap();
                prop_assert_eq!(population.size(false), mu);
                prop_assert_eq!(population.generation(), step + 1);
            }
        }
    }
}
