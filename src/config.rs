use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

fn check_population(population_size: usize) -> Result<(), ConfigError> {
    if population_size < 2 {
        return Err(ConfigError::PopulationTooSmall);
    }
    Ok(())
}

fn check_rate(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidRate { name, value });
    }
    Ok(())
}

fn check_positive(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::NotPositive(name));
    }
    Ok(())
}

/// Tournament selection, mutation and mu-selection for a fixed number of
/// generations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimpleConfig {
    pub population_size: usize,
    pub generations: usize,
    pub tournament_size: usize,
    pub mutation_rate: f64,
}

impl Default for SimpleConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            generations: 500,
            tournament_size: 2,
            mutation_rate: 0.9,
        }
    }
}

impl SimpleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_population(self.population_size)?;
        check_positive("generations", self.generations)?;
        check_positive("tournament_size", self.tournament_size)?;
        check_rate("mutation_rate", self.mutation_rate)
    }
}

/// (mu+1) diversity optimization with a quality gate at `alpha * OPT`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mu1Config {
    pub population_size: usize,
    pub alpha: f64,
    pub mutation_rate: f64,
    pub generations: usize,
}

impl Default for Mu1Config {
    fn default() -> Self {
        Self {
            population_size: 10,
            alpha: 0.9,
            mutation_rate: 1.0,
            generations: 2000,
        }
    }
}

impl Mu1Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_population(self.population_size)?;
        check_rate("alpha", self.alpha)?;
        check_rate("mutation_rate", self.mutation_rate)?;
        check_positive("generations", self.generations)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoahConfig {
    pub population_size: usize,
    /// The outer loop stops once the bound reaches this value.
    pub barrier_value: f64,
    pub obj_generations_n: usize,
    pub remaining_solutions_n: usize,
    /// Consecutive non-improving diversity steps before the phase ends.
    pub div_generations_con: usize,
    pub max_mutation_attempts: usize,
    pub mutation_rate: f64,
    pub tournament_size: usize,
}

impl Default for NoahConfig {
    fn default() -> Self {
        Self {
            population_size: 10,
            barrier_value: f64::INFINITY,
            obj_generations_n: 100,
            remaining_solutions_n: 5,
            div_generations_con: 20,
            max_mutation_attempts: 100,
            mutation_rate: 1.0,
            tournament_size: 2,
        }
    }
}

impl NoahConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_population(self.population_size)?;
        check_positive("obj_generations_n", self.obj_generations_n)?;
        check_positive("div_generations_con", self.div_generations_con)?;
        check_positive("max_mutation_attempts", self.max_mutation_attempts)?;
        check_positive("tournament_size", self.tournament_size)?;
        check_rate("mutation_rate", self.mutation_rate)?;
        if self.remaining_solutions_n == 0 || self.remaining_solutions_n > self.population_size {
            return Err(ConfigError::InvalidRemaining {
                value: self.remaining_solutions_n,
                population_size: self.population_size,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExperimentKind {
    Simple,
    Mu1,
    Noah,
}

impl ExperimentKind {
    pub fn label(&self) -> &'static str {
        match self {
            ExperimentKind::Simple => "simple",
            ExperimentKind::Mu1 => "mu1",
            ExperimentKind::Noah => "noah",
        }
    }
}

impl fmt::Display for ExperimentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ExperimentKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(ExperimentKind::Simple),
            "mu1" => Ok(ExperimentKind::Mu1),
            "noah" => Ok(ExperimentKind::Noah),
            _ => Err(ConfigError::UnknownExperiment(s.to_string())),
        }
    }
}
