use crate::allocation::index_of_best;
use crate::evolution::allocation_evolution::{
    check_population, initialize_population, EvolutionConfig, EvolutionError, EvolutionResult,
    EvolutionStrategy,
};
use crate::evolution::operators::StandardOperators;
use crate::evolution::population::Population;
use crate::pricing::PricingTable;
use rand::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Plain generational GA: the whole population is replaced every generation and
/// elitism only exists as the best-seen allocation recorded outside of it.
pub struct GenerationalEvolution<'a> {
    pricing: &'a PricingTable,
}

impl<'a> EvolutionStrategy for GenerationalEvolution<'a> {
    type Config = EvolutionConfig;

    fn evolve(&self, config: &EvolutionConfig) -> Result<EvolutionResult, EvolutionError> {
        let mut rng = config.make_rng();
        self.evolve_with_rng(config, None, &mut rng)
    }
}

impl<'a> GenerationalEvolution<'a> {
    pub fn new(pricing: &'a PricingTable) -> Self {
        GenerationalEvolution { pricing }
    }

    /// Runs the configured number of generations, starting from `population` when
    /// given and from a random one otherwise.
    pub fn evolve_with_rng<R: Rng + ?Sized>(
        &self,
        config: &EvolutionConfig,
        population: Option<Population>,
        rng: &mut R,
    ) -> Result<EvolutionResult, EvolutionError> {
        config.validate()?;
        let mut population = match population {
            Some(mut population) => {
                check_population(&population, self.pricing, config.max_units)?;
                population.invalidate();
                population
            }
            None => initialize_population(config, self.pricing, rng),
        };

        if population.is_empty() || config.generations == 0 {
            warn!(
                population_size = population.len(),
                generations = config.generations,
                "Nothing to evolve, returning an empty result."
            );
            return Ok(EvolutionResult::default());
        }

        let operators = StandardOperators::new(self.pricing, config);
        population.evaluate(&operators, config.parallel_evaluation);

        info!(
            population_size = population.len(),
            generations = config.generations,
            instruments = self.pricing.len(),
            "Evolution starting."
        );

        let mut result = EvolutionResult::with_capacity(config.generations);
        for generation in 0..config.generations {
            population.advance(config, &operators, rng);

            let (Some(best), Some(mean_fitness)) = (population.best(), population.mean_fitness())
            else {
                break;
            };
            let best_fitness = best.fitness().unwrap_or(0.);
            debug!(generation, best_fitness, mean_fitness, "Generation done.");
            if config.generation_check_interval > 0
                && (generation + 1) % config.generation_check_interval == 0
            {
                info!(
                    "Generation {}/{}: best fitness {:.2}, mean fitness {:.2}",
                    generation + 1,
                    config.generations,
                    best_fitness,
                    mean_fitness
                );
            }
            result.record_generation(best.clone(), mean_fitness);
        }

        result.best = index_of_best(&result.best_per_generation)
            .map(|idx| result.best_per_generation[idx].clone());

        info!(
            best_fitness = result.best.as_ref().and_then(|best| best.fitness()),
            found_in_generation = result.best_generation_index().map(|idx| idx + 1),
            "Evolution finished."
        );
        Ok(result)
    }

    /// Several runs with no shared state, spread over a pool of
    /// `config.max_concurrency` threads. Run `i` is seeded with `global_seed + i`
    /// when a seed is configured.
    pub fn run_independent(
        &self,
        config: &EvolutionConfig,
        runs: usize,
    ) -> Result<Vec<EvolutionResult>, EvolutionError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_concurrency)
            .build()?;

        pool.install(|| {
            (0..runs)
                .into_par_iter()
                .map(|run| {
                    let mut rng = match config.global_seed {
                        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(run as u64)),
                        None => StdRng::from_entropy(),
                    };
                    debug!(run, "Independent run launched.");
                    self.evolve_with_rng(config, None, &mut rng)
                })
                .collect()
        })
    }
}

/// The best result among several runs, by global-best fitness. First one wins ties.
pub fn best_of_runs(results: &[EvolutionResult]) -> Option<&EvolutionResult> {
    results
        .iter()
        .filter(|result| result.best.is_some())
        .fold(None, |best: Option<&EvolutionResult>, candidate| match best {
            Some(incumbent) if !beats(candidate, incumbent) => best,
            _ => Some(candidate),
        })
}

fn beats(candidate: &EvolutionResult, incumbent: &EvolutionResult) -> bool {
    match (&candidate.best, &incumbent.best) {
        (Some(a), Some(b)) => a.cmp_fitness(b).is_gt(),
        (Some(_), None) => true,
        _ => false,
    }
}
