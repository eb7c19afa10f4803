use crate::config::NoahConfig;
use crate::diversity::DiversityModel;
use crate::diversity_preserver::DiversitySelector;
use crate::error::EngineError;
use crate::genetic_algorithm::{
    EvaluateFn, Fitness, Genotype, InitializeFn, MutateFn, Operator, Operators, ParentSelector,
    RecombineFn, SelectParentsFn, SelectSurvivorsFn, SurvivorSelector,
};
use crate::operators::{bounded_mutation, select_random};
use crate::population::{checked_evaluate, Population};
use log::{debug, info};
use std::cmp::Ordering;
use std::sync::Arc;

// Domain operators the phases switch between. Selection is only used by
// the objective phase
pub struct NoahOperators<T, L> {
    pub evaluate: EvaluateFn<T, L>,
    pub select_parents: SelectParentsFn<T, L>,
    pub select_survivors: SelectSurvivorsFn<T, L>,
    pub mutate: MutateFn<T>,
    pub recombine: Option<RecombineFn<T>>,
    pub model: DiversityModel<T>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Objective,
    BoundTighten,
    Diversity,
}

/// Alternates objective and diversity phases under a rising quality bound.
/// Every mutation goes through [`bounded_mutation`], so once a bound is set
/// nothing below it enters the population.
pub struct Noah<T, L> {
    config: NoahConfig,
    operators: NoahOperators<T, L>,
    bound: f64,
    bounds: Vec<f64>,
    cycles: usize,
}

impl<T: Genotype, L: Fitness> Noah<T, L> {
    pub fn new(config: NoahConfig, operators: NoahOperators<T, L>) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            operators,
            bound: f64::NEG_INFINITY,
            bounds: Vec::new(),
            cycles: 0,
        })
    }

    pub fn population(
        &self,
        seed: u64,
        initialize: &InitializeFn<T>,
    ) -> Result<Population<T, L>, EngineError> {
        Population::new(seed, initialize, self.objective_operators())
    }

    pub fn config(&self) -> &NoahConfig {
        &self.config
    }

    pub fn bound(&self) -> f64 {
        self.bound
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    pub fn cycles(&self) -> usize {
        self.cycles
    }

    fn mutation(&self) -> MutateFn<T> {
        bounded_mutation(
            Arc::clone(&self.operators.mutate),
            Arc::clone(&self.operators.evaluate),
            self.bound,
            self.config.max_mutation_attempts,
        )
    }

    fn objective_operators(&self) -> Operators<T, L> {
        let mut operators = Operators::default()
            .with_evaluate(Arc::clone(&self.operators.evaluate))
            .with_select_parents(Arc::clone(&self.operators.select_parents))
            .with_mutate(self.mutation())
            .with_select_survivors(SurvivorSelector::Generational(Arc::clone(
                &self.operators.select_survivors,
            )));
        operators.recombine = self.operators.recombine.clone();
        operators
    }

    /// Runs cycles until `terminate` holds or the bound reaches the barrier.
    /// `terminate` is also checked between the generations of every phase.
    pub fn run<F>(
        &mut self,
        population: &mut Population<T, L>,
        mut terminate: F,
    ) -> Result<(), EngineError>
    where
        F: FnMut(&Population<T, L>) -> bool,
    {
        while self.bound < self.config.barrier_value && !terminate(population) {
            if !self.objective_phase(population, &mut terminate)? {
                break;
            }
            self.tighten_bound(population)?;
            if !self.diversity_phase(population, &mut terminate)? {
                break;
            }
            self.cycles += 1;
        }

        info!(
            "noah finished after {} cycles, bound {}, generation {}",
            self.cycles,
            self.bound,
            population.generation()
        );
        Ok(())
    }

    fn enter(&self, phase: Phase, population: &Population<T, L>) {
        info!(
            "cycle {}: {:?} phase at generation {}, bound {}",
            self.cycles,
            phase,
            population.generation(),
            self.bound
        );
    }

    // Returns false when `terminate` interrupted the phase.
    fn objective_phase<F>(
        &self,
        population: &mut Population<T, L>,
        terminate: &mut F,
    ) -> Result<bool, EngineError>
    where
        F: FnMut(&Population<T, L>) -> bool,
    {
        self.enter(Phase::Objective, population);

        population.rebind(Operator::Evaluate(Some(Arc::clone(&self.operators.evaluate))))?;
        population.rebind(Operator::SelectParents(Some(ParentSelector::Fitness(
            Arc::clone(&self.operators.select_parents),
        ))))?;
        population.rebind(Operator::Recombine(self.operators.recombine.clone()))?;
        population.rebind(Operator::Mutate(Some(self.mutation())))?;
        population.rebind(Operator::SelectSurvivors(Some(SurvivorSelector::Generational(
            Arc::clone(&self.operators.select_survivors),
        ))))?;

        for _ in 0..self.config.obj_generations_n {
            if terminate(population) {
                return Ok(false);
            }
            population.step()?;
        }
        Ok(true)
    }

    /// Keeps the best `remaining_solutions_n` individuals and raises the
    /// bound to the fitness of the worst one kept. The bound never drops.
    pub fn tighten_bound(
        &mut self,
        population: &mut Population<T, L>,
    ) -> Result<f64, EngineError> {
        self.enter(Phase::BoundTighten, population);

        let genes = population.genes(false);
        let fitnesses = checked_evaluate(&self.operators.evaluate, &genes)?;

        let mut order: Vec<usize> = (0..genes.len()).collect();
        order.sort_by(|&a, &b| {
            fitnesses[b]
                .partial_cmp(&fitnesses[a])
                .unwrap_or(Ordering::Equal)
        });
        order.truncate(self.config.remaining_solutions_n);

        if let Some(&worst) = order.last() {
            let candidate: f64 = fitnesses[worst].into();
            if candidate > self.bound {
                self.bound = candidate;
            }
        }
        self.bounds.push(self.bound);

        let kept: Vec<T> = order.into_iter().map(|index| genes[index].clone()).collect();
        debug!("kept {} individuals, bound {}", kept.len(), self.bound);
        population.set_genes(kept);

        Ok(self.bound)
    }

    // Refills the population to its configured size, then keeps only steps
    // that strictly raise its diversity. The phase ends after
    // `div_generations_con` rejected steps in a row.
    fn diversity_phase<F>(
        &self,
        population: &mut Population<T, L>,
        terminate: &mut F,
    ) -> Result<bool, EngineError>
    where
        F: FnMut(&Population<T, L>) -> bool,
    {
        self.enter(Phase::Diversity, population);

        let model = &self.operators.model;
        population.rebind(Operator::SelectParents(Some(ParentSelector::Uniform(
            select_random(1),
        ))))?;
        population.rebind(Operator::Recombine(None))?;
        population.rebind(Operator::Mutate(Some(self.mutation())))?;
        population.rebind(Operator::SelectSurvivors(Some(SurvivorSelector::Diversity(
            Box::new(DiversitySelector::new(model.clone(), self.config.population_size)),
        ))))?;

        while population.size(false) < self.config.population_size {
            if terminate(population) {
                return Ok(false);
            }
            population.step()?;
        }

        let mut failures = 0;
        while failures < self.config.div_generations_con {
            if terminate(population) {
                return Ok(false);
            }

            let before = population.diversity(model);
            let snapshot = population.snapshot();
            population.step()?;

            if population.diversity(model) > before {
                failures = 0;
            } else {
                population.restore(snapshot);
                failures += 1;
            }
        }

        debug!("diversity phase ended at {}", population.diversity(model));
        Ok(true)
    }
}
