// Modules
pub mod allocation;
pub mod consts;
pub mod evolution;
pub mod logging;
pub mod pricing;
pub mod report;

pub use allocation::Allocation;
pub use evolution::allocation_evolution::generational::GenerationalEvolution;
pub use evolution::allocation_evolution::{
    EvolutionConfig, EvolutionError, EvolutionResult, EvolutionStrategy, MutationGate,
};
pub use evolution::objective::{FitnessEvaluator, FitnessTargets};
pub use pricing::{AssetClass, Instrument, Investment, PricingTable};
