/// Errors raised by the population engine and its selectors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("initialize returned an empty population")]
    EmptyPopulation,
    #[error("{operator} requires an evaluate operator to be bound")]
    MissingEvaluate { operator: &'static str },
    #[error("evaluate returned {fitnesses} fitness values for {genes} genotypes")]
    FitnessLengthMismatch { genes: usize, fitnesses: usize },
    #[error("diversity selection expected {expected} candidates, got {actual}")]
    CandidateCountMismatch { expected: usize, actual: usize },
    #[error("diversity preserver does not match the population it is applied to")]
    StaleDiversityState,
    #[error("diversity selection expects exactly one offspring per generation, got {actual}")]
    OffspringCountMismatch { actual: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be at least 2")]
    PopulationTooSmall,
    #[error("Rate {name} must lie in [0, 1], got {value}")]
    InvalidRate { name: &'static str, value: f64 },
    #[error("{0} must be positive")]
    NotPositive(&'static str),
    #[error("remaining_solutions_n must be in 1..={population_size}, got {value}")]
    InvalidRemaining { value: usize, population_size: usize },
    #[error("Problem must have at least one job and one machine")]
    EmptyProblem,
    #[error("Unknown experiment type: {0} (expected simple, mu1 or noah)")]
    UnknownExperiment(String),
}
