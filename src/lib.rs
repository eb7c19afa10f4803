pub mod config;
pub mod demo_data;
pub mod diversity;
pub mod diversity_preserver;
pub mod error;
pub mod genetic_algorithm;
pub mod noah;
pub mod operators;
pub mod population;
pub mod report;
pub mod schedule;
pub mod solvers;
pub mod visualization;

pub use diversity::{DiversityModel, Normalization};
pub use diversity_preserver::{DiversityPreserver, DiversitySelector, QualityGate};
pub use error::{ConfigError, EngineError};
pub use genetic_algorithm::{
    Fitness, Genotype, Operator, Operators, ParentSelector, SurvivorSelector,
};
pub use noah::{Noah, NoahOperators};
pub use population::{Population, PopulationSnapshot};
