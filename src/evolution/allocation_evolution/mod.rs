use crate::allocation::Allocation;
use crate::consts::{
    CROSSOVER_RATE, GENERATIONS, GENERATION_CHECK_INTERVAL, MAX_UNITS, MUTATION_RATE,
    POPULATION_SIZE, TOURNAMENT_SIZE,
};
use crate::evolution::objective::FitnessTargets;
use crate::evolution::population::Population;
use crate::pricing::PricingTable;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod generational;

// Strategy Definition
pub trait EvolutionStrategy {
    type Config;
    fn evolve(&self, config: &Self::Config) -> Result<EvolutionResult, EvolutionError>;
}

#[derive(Error, Debug)]
pub enum EvolutionError {
    #[error("Invalid population parameters were passed: {0}")]
    BadPopulationParameter(String),
    #[error("Budget must be positive and finite, got {0}")]
    InvalidBudget(f64),
    #[error("`{name}` must lie in [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },
    #[error("`{name}` must be non-negative and finite, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("Allocation has {found} genes but the pricing table lists {expected} instruments")]
    InstrumentCountMismatch { expected: usize, found: usize },
    #[error("Gene {index} holds {units} units, above the bound of {max_units}")]
    GeneOutOfBounds {
        index: usize,
        units: u32,
        max_units: u32,
    },
    #[error("Failed to build the worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// How the mutation rate gates mutation.
///
/// `DoubleGated` first decides per allocation whether to mutate at all and then
/// applies the same rate again per gene, so a gene is reset with probability
/// `rate^2`. `SingleGated` skips the per-allocation draw.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationGate {
    #[default]
    DoubleGated,
    SingleGated,
}

fn default_crossover_rate() -> f64 {
    CROSSOVER_RATE
}

fn default_max_units() -> u32 {
    MAX_UNITS
}

fn default_generation_check_interval() -> usize {
    GENERATION_CHECK_INTERVAL
}

fn default_max_concurrency() -> usize {
    num_cpus::get()
}

fn default_independent_runs() -> usize {
    1
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EvolutionConfig {
    #[serde(flatten)]
    pub targets: FitnessTargets,
    pub generations: usize,
    pub population_size: usize,
    pub mutation_rate: f64,
    pub tournament_size: usize,
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    #[serde(default = "default_max_units")]
    pub max_units: u32,
    #[serde(default)]
    pub mutation_gate: MutationGate,
    /// Log progress every this many generations, 0 disables it.
    #[serde(default = "default_generation_check_interval")]
    pub generation_check_interval: usize,
    #[serde(default)]
    pub global_seed: Option<u64>,
    #[serde(default)]
    pub parallel_evaluation: bool,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_independent_runs")]
    pub independent_runs: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        EvolutionConfig {
            targets: FitnessTargets::default(),
            generations: GENERATIONS,
            population_size: POPULATION_SIZE,
            mutation_rate: MUTATION_RATE,
            tournament_size: TOURNAMENT_SIZE,
            crossover_rate: CROSSOVER_RATE,
            max_units: MAX_UNITS,
            mutation_gate: MutationGate::default(),
            generation_check_interval: GENERATION_CHECK_INTERVAL,
            global_seed: None,
            parallel_evaluation: false,
            max_concurrency: default_max_concurrency(),
            independent_runs: default_independent_runs(),
        }
    }
}

impl EvolutionConfig {
    /// Rejects configurations that would make every generation meaningless.
    /// Zero generations or an empty population are legal and simply do nothing.
    pub fn validate(&self) -> Result<(), EvolutionError> {
        self.targets.validate()?;

        for (name, value) in [
            ("mutation_rate", self.mutation_rate),
            ("crossover_rate", self.crossover_rate),
        ] {
            if !(0. ..=1.).contains(&value) {
                return Err(EvolutionError::OutOfUnitRange { name, value });
            }
        }
        if self.tournament_size == 0 {
            return Err(EvolutionError::BadPopulationParameter(
                "Tournament size cannot be zero".into(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(EvolutionError::BadPopulationParameter(
                "Max concurrency cannot be zero".into(),
            ));
        }
        Ok(())
    }

    pub fn make_rng(&self) -> StdRng {
        match self.global_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

pub fn initialize_population<R: Rng + ?Sized>(
    config: &EvolutionConfig,
    pricing: &PricingTable,
    rng: &mut R,
) -> Population {
    Population::random(config.population_size, pricing.len(), config.max_units, rng)
}

/// Checks that a caller-supplied population fits the pricing table and gene bound.
pub fn check_population(
    population: &Population,
    pricing: &PricingTable,
    max_units: u32,
) -> Result<(), EvolutionError> {
    for allocation in population.individuals() {
        if allocation.len() != pricing.len() {
            return Err(EvolutionError::InstrumentCountMismatch {
                expected: pricing.len(),
                found: allocation.len(),
            });
        }
        if let Some((index, &units)) = allocation
            .genes()
            .iter()
            .enumerate()
            .find(|(_, &units)| units > max_units)
        {
            return Err(EvolutionError::GeneOutOfBounds {
                index,
                units,
                max_units,
            });
        }
    }
    Ok(())
}

/// Outcome of one run: the global best plus the per-generation history.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct EvolutionResult {
    pub best: Option<Allocation>,
    pub best_per_generation: Vec<Allocation>,
    pub mean_fitness_per_generation: Vec<f64>,
    pub best_fitness_per_generation: Vec<f64>,
}

impl EvolutionResult {
    pub fn with_capacity(generations: usize) -> Self {
        EvolutionResult {
            best: None,
            best_per_generation: Vec::with_capacity(generations),
            mean_fitness_per_generation: Vec::with_capacity(generations),
            best_fitness_per_generation: Vec::with_capacity(generations),
        }
    }

    pub fn record_generation(&mut self, best: Allocation, mean_fitness: f64) {
        self.best_fitness_per_generation
            .push(best.fitness().unwrap_or(0.));
        self.mean_fitness_per_generation.push(mean_fitness);
        self.best_per_generation.push(best);
    }

    pub fn generations(&self) -> usize {
        self.best_fitness_per_generation.len()
    }

    /// 0-based generation in which the global best first appeared.
    pub fn best_generation_index(&self) -> Option<usize> {
        best_generation_index(&self.best_fitness_per_generation)
    }
}

/// Index of the first maximum.
pub fn best_generation_index(best_fitness: &[f64]) -> Option<usize> {
    best_fitness
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (idx, &fitness)| match best {
            Some((_, incumbent)) if fitness <= incumbent => best,
            _ => Some((idx, fitness)),
        })
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_generation_index_first_maximum() {
        assert_eq!(best_generation_index(&[]), None);
        assert_eq!(best_generation_index(&[1., 4., 2., 4.]), Some(1));
        assert_eq!(best_generation_index(&[7.]), Some(0));
    }

    #[test]
    fn test_config_validation() {
        assert!(EvolutionConfig::default().validate().is_ok());

        let bad_tournament = EvolutionConfig {
            tournament_size: 0,
            ..EvolutionConfig::default()
        };
        assert!(matches!(
            bad_tournament.validate(),
            Err(EvolutionError::BadPopulationParameter(_))
        ));

        let bad_rate = EvolutionConfig {
            crossover_rate: 1.2,
            ..EvolutionConfig::default()
        };
        assert!(matches!(
            bad_rate.validate(),
            Err(EvolutionError::OutOfUnitRange {
                name: "crossover_rate",
                ..
            })
        ));

        let degenerate = EvolutionConfig {
            population_size: 0,
            generations: 0,
            ..EvolutionConfig::default()
        };
        assert!(
            degenerate.validate().is_ok(),
            "Empty runs are a no-op, not an error"
        );
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let json = r#"{
            "budget": 500.0,
            "stock_proportion": 0.5,
            "fund_proportion": 0.5,
            "proportion_weight": 0.6,
            "distribution_weight": 0.4,
            "generations": 10,
            "population_size": 20,
            "mutation_rate": 0.2,
            "tournament_size": 2,
            "mutation_gate": "SingleGated",
            "global_seed": 42
        }"#;
        let config: EvolutionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.targets.budget, 500.);
        assert_eq!(config.targets.fund_bonus_rate, 0.1);
        assert_eq!(config.crossover_rate, CROSSOVER_RATE);
        assert_eq!(config.max_units, MAX_UNITS);
        assert_eq!(config.mutation_gate, MutationGate::SingleGated);
        assert_eq!(config.global_seed, Some(42));
        assert!(config.max_concurrency >= 1);
        assert_eq!(config.independent_runs, 1);
    }

    #[test]
    fn test_check_population() {
        let pricing = PricingTable::new(
            vec![crate::pricing::Instrument::new("A", 1.)],
            vec![crate::pricing::Instrument::new("B", 2.)],
        )
        .unwrap();
        let good = Population::new(vec![Allocation::new(vec![1, 3])]);
        assert!(check_population(&good, &pricing, 3).is_ok());

        let short = Population::new(vec![Allocation::new(vec![1])]);
        assert!(matches!(
            check_population(&short, &pricing, 3),
            Err(EvolutionError::InstrumentCountMismatch {
                expected: 2,
                found: 1
            })
        ));

        let over = Population::new(vec![Allocation::new(vec![0, 4])]);
        assert!(matches!(
            check_population(&over, &pricing, 3),
            Err(EvolutionError::GeneOutOfBounds { index: 1, .. })
        ));
    }
}
