pub mod allocation_evolution;
pub mod objective;
pub mod operators;
pub mod population;
