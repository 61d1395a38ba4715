// Gene bound: units of a single instrument an allocation may hold
pub const MAX_UNITS: u32 = 3;

pub const BUDGET: f64 = 1000.;
pub const CLASS_A_PROPORTION: f64 = 0.7;
pub const CLASS_B_PROPORTION: f64 = 0.3;

// Fitness weights
pub const PROPORTION_WEIGHT: f64 = 0.6;
pub const DISTRIBUTION_WEIGHT: f64 = 0.4;
pub const CLASS_B_BONUS_RATE: f64 = 0.1;

// GA parameters
pub const MUTATION_RATE: f64 = 0.15;
pub const CROSSOVER_RATE: f64 = 0.7;
pub const TOURNAMENT_SIZE: usize = 3;
pub const POPULATION_SIZE: usize = 300;
pub const GENERATIONS: usize = 200;
pub const GENERATION_CHECK_INTERVAL: usize = 20;

pub const FLOAT_COMPARISON_EPSILON: f64 = 1e-9;
