use crate::diversity_preserver::DiversitySelector;
use rand::rngs::StdRng;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

// This trait represents a genotype - a single candidate solution
// the engine evolves without knowing its structure
pub trait Genotype: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> Genotype for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

// This trait represents a fitness value, higher is better
pub trait Fitness: Copy + PartialOrd + Debug + Into<f64> + Send + Sync + 'static {}

impl<L> Fitness for L where L: Copy + PartialOrd + Debug + Into<f64> + Send + Sync + 'static {}

pub type InitializeFn<T> = Arc<dyn Fn(&mut StdRng) -> Vec<T> + Send + Sync>;
pub type EvaluateFn<T, L> = Arc<dyn Fn(&[T]) -> Vec<L> + Send + Sync>;
pub type SelectParentsFn<T, L> = Arc<dyn Fn(&[T], &[L], &mut StdRng) -> Vec<T> + Send + Sync>;
pub type MutateFn<T> = Arc<dyn Fn(&[T], &mut StdRng) -> Vec<T> + Send + Sync>;
pub type RecombineFn<T> = Arc<dyn Fn(&[T], &mut StdRng) -> Vec<T> + Send + Sync>;
pub type SelectSurvivorsFn<T, L> =
    Arc<dyn Fn(&[T], &[L], &[T], &mut StdRng) -> Vec<T> + Send + Sync>;
pub type PairwiseFn<T> = Arc<dyn Fn(&T, &T) -> f64 + Send + Sync>;

// How parents are drawn from the population
pub enum ParentSelector<T, L> {
    // Reads the fitness of every individual
    Fitness(SelectParentsFn<T, L>),
    // Never reads fitness, so it may run without an evaluator
    Uniform(SelectParentsFn<T, L>),
}

impl<T, L> ParentSelector<T, L> {
    pub fn needs_fitness(&self) -> bool {
        matches!(self, ParentSelector::Fitness(_))
    }

    pub fn select_fn(&self) -> &SelectParentsFn<T, L> {
        match self {
            ParentSelector::Fitness(select) | ParentSelector::Uniform(select) => select,
        }
    }
}

// How the next generation is chosen from parents and children
pub enum SurvivorSelector<T, L> {
    // Stateless selection over parents, their fitnesses and the children
    Generational(SelectSurvivorsFn<T, L>),
    // Incremental (mu+1) selection that keeps the pairwise diversity cache
    Diversity(Box<DiversitySelector<T, L>>),
}

impl<T, L> SurvivorSelector<T, L> {
    pub fn needs_fitness(&self) -> bool {
        matches!(self, SurvivorSelector::Generational(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            SurvivorSelector::Generational(_) => "generational",
            SurvivorSelector::Diversity(_) => "diversity",
        }
    }
}

impl<T, L> Debug for SurvivorSelector<T, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The operator bindings of a population. Every slot is optional; an
/// unbound slot means identity for that stage of a generation.
pub struct Operators<T, L> {
    pub evaluate: Option<EvaluateFn<T, L>>,
    pub select_parents: Option<ParentSelector<T, L>>,
    pub recombine: Option<RecombineFn<T>>,
    pub mutate: Option<MutateFn<T>>,
    pub select_survivors: Option<SurvivorSelector<T, L>>,
}

impl<T, L> Default for Operators<T, L> {
    fn default() -> Self {
        Self {
            evaluate: None,
            select_parents: None,
            recombine: None,
            mutate: None,
            select_survivors: None,
        }
    }
}

impl<T, L> Operators<T, L> {
    pub fn with_evaluate(mut self, evaluate: EvaluateFn<T, L>) -> Self {
        self.evaluate = Some(evaluate);
        self
    }

    pub fn with_select_parents(mut self, select_parents: SelectParentsFn<T, L>) -> Self {
        self.select_parents = Some(ParentSelector::Fitness(select_parents));
        self
    }

    // For selectors that never look at fitness, so no evaluate is needed
    pub fn with_uniform_parents(mut self, select_parents: SelectParentsFn<T, L>) -> Self {
        self.select_parents = Some(ParentSelector::Uniform(select_parents));
        self
    }

    pub fn with_recombine(mut self, recombine: RecombineFn<T>) -> Self {
        self.recombine = Some(recombine);
        self
    }

    pub fn with_mutate(mut self, mutate: MutateFn<T>) -> Self {
        self.mutate = Some(mutate);
        self
    }

    pub fn with_select_survivors(mut self, select_survivors: SurvivorSelector<T, L>) -> Self {
        self.select_survivors = Some(select_survivors);
        self
    }

    /// Name of the first operator that needs fitnesses while `evaluate` is unbound.
    pub fn missing_evaluate(&self) -> Option<&'static str> {
        if self.evaluate.is_some() {
            return None;
        }
        if matches!(&self.select_parents, Some(selector) if selector.needs_fitness()) {
            return Some("select_parents");
        }
        match &self.select_survivors {
            Some(selector) if selector.needs_fitness() => Some("select_survivors"),
            _ => None,
        }
    }
}

// A single operator replacement, applied between generations
pub enum Operator<T, L> {
    Evaluate(Option<EvaluateFn<T, L>>),
    SelectParents(Option<ParentSelector<T, L>>),
    Recombine(Option<RecombineFn<T>>),
    Mutate(Option<MutateFn<T>>),
    SelectSurvivors(Option<SurvivorSelector<T, L>>),
}
