use crate::allocation::{index_of_best, Allocation};
use crate::evolution::allocation_evolution::{EvolutionConfig, MutationGate};
use crate::evolution::operators::GeneticOperators;
use rand::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// One generation of allocations. Duplicates are allowed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Population {
    individuals: Vec<Allocation>,
}

impl Population {
    pub fn new(individuals: Vec<Allocation>) -> Self {
        Population { individuals }
    }

    pub fn random<R: Rng + ?Sized>(
        size: usize,
        length: usize,
        max_units: u32,
        rng: &mut R,
    ) -> Self {
        Population::new(
            (0..size)
                .map(|_| Allocation::random(length, max_units, rng))
                .collect(),
        )
    }

    pub fn individuals(&self) -> &[Allocation] {
        &self.individuals
    }

    pub fn into_individuals(self) -> Vec<Allocation> {
        self.individuals
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Drops every cached fitness so the next `evaluate` scores all allocations.
    pub fn invalidate(&mut self) {
        self.individuals.iter_mut().for_each(Allocation::invalidate);
    }

    /// Computes the fitness of every allocation that does not have one yet.
    pub fn evaluate<O: GeneticOperators + Sync>(&mut self, operators: &O, parallel: bool) {
        evaluate_pending(&mut self.individuals, operators, parallel);
    }

    /// Replaces this generation with the next one: selection, crossover,
    /// mutation, then evaluation of whatever changed.
    pub fn advance<O, R>(&mut self, config: &EvolutionConfig, operators: &O, rng: &mut R)
    where
        O: GeneticOperators + Sync,
        R: Rng + ?Sized,
    {
        let mut offspring = operators.select(&self.individuals, self.individuals.len(), rng);

        for pair in offspring.chunks_exact_mut(2) {
            if rng.gen_bool(config.crossover_rate) {
                let (first, second) = pair.split_at_mut(1);
                operators.mate(&mut first[0], &mut second[0], rng);
                first[0].invalidate();
                second[0].invalidate();
            }
        }

        for mutant in offspring.iter_mut() {
            let gate_open = match config.mutation_gate {
                MutationGate::DoubleGated => rng.gen_bool(config.mutation_rate),
                MutationGate::SingleGated => true,
            };
            if gate_open {
                operators.mutate(mutant, rng);
            }
        }

        evaluate_pending(&mut offspring, operators, config.parallel_evaluation);
        self.individuals = offspring;
    }

    pub fn best(&self) -> Option<&Allocation> {
        index_of_best(&self.individuals).map(|idx| &self.individuals[idx])
    }

    pub fn mean_fitness(&self) -> Option<f64> {
        if self.individuals.is_empty() {
            return None;
        }
        let sum = self
            .individuals
            .iter()
            .filter_map(Allocation::fitness)
            .sum::<f64>();
        Some(sum / self.individuals.len() as f64)
    }
}

fn evaluate_pending<O: GeneticOperators + Sync>(
    individuals: &mut [Allocation],
    operators: &O,
    parallel: bool,
) {
    if parallel {
        individuals
            .par_iter_mut()
            .filter(|allocation| !allocation.is_evaluated())
            .for_each(|allocation| {
                let fitness = operators.evaluate(allocation);
                allocation.set_fitness(fitness);
            });
    } else {
        individuals
            .iter_mut()
            .filter(|allocation| !allocation.is_evaluated())
            .for_each(|allocation| {
                let fitness = operators.evaluate(allocation);
                allocation.set_fitness(fitness);
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::operators::StandardOperators;
    use crate::pricing::{PriceRange, PricingTable};
    use rand::rngs::StdRng;

    fn reference_pricing() -> PricingTable {
        let mut rng = StdRng::seed_from_u64(0);
        PricingTable::placeholder(PriceRange::fixed(30.), PriceRange::fixed(120.), &mut rng)
            .unwrap()
    }

    #[test]
    fn test_advance_keeps_size_and_evaluates_everything() {
        let pricing = reference_pricing();
        let config = EvolutionConfig::default();
        let operators = StandardOperators::new(&pricing, &config);
        let mut rng = StdRng::seed_from_u64(4);

        let mut population = Population::random(31, pricing.len(), config.max_units, &mut rng);
        population.evaluate(&operators, false);

        for _ in 0..5 {
            population.advance(&config, &operators, &mut rng);
            assert_eq!(population.len(), 31);
            for allocation in population.individuals() {
                assert!(allocation.is_evaluated());
                assert_eq!(allocation.len(), pricing.len());
                assert!(allocation.within_bounds(config.max_units));
                assert_eq!(
                    allocation.fitness(),
                    Some(operators.evaluate(allocation)),
                    "Cached fitness must match the genes"
                );
            }
        }
    }

    #[test]
    fn test_parallel_evaluation_matches_sequential() {
        let pricing = reference_pricing();
        let config = EvolutionConfig::default();
        let operators = StandardOperators::new(&pricing, &config);
        let mut rng = StdRng::seed_from_u64(12);

        let population = Population::random(64, pricing.len(), config.max_units, &mut rng);
        let mut sequential = population.clone();
        let mut parallel = population;
        sequential.evaluate(&operators, false);
        parallel.evaluate(&operators, true);

        let fitness = |p: &Population| {
            p.individuals()
                .iter()
                .map(|a| a.fitness())
                .collect::<Vec<_>>()
        };
        assert_eq!(fitness(&sequential), fitness(&parallel));
    }

    #[test]
    fn test_single_individual_population() {
        let pricing = reference_pricing();
        let config = EvolutionConfig::default();
        let operators = StandardOperators::new(&pricing, &config);
        let mut rng = StdRng::seed_from_u64(6);

        let mut population = Population::random(1, pricing.len(), config.max_units, &mut rng);
        population.evaluate(&operators, false);
        population.advance(&config, &operators, &mut rng);
        assert_eq!(population.len(), 1);
        assert!(population.best().is_some());
    }

    #[test]
    fn test_zero_rates_only_clone_members() {
        let pricing = reference_pricing();
        let config = EvolutionConfig {
            crossover_rate: 0.,
            mutation_rate: 0.,
            ..EvolutionConfig::default()
        };
        let operators = StandardOperators::new(&pricing, &config);
        let mut rng = StdRng::seed_from_u64(21);

        let mut population = Population::random(50, pricing.len(), config.max_units, &mut rng);
        population.evaluate(&operators, false);
        let parents = population.clone();
        population.advance(&config, &operators, &mut rng);

        assert_eq!(population.len(), parents.len());
        for offspring in population.individuals() {
            assert!(offspring.is_evaluated());
            assert!(
                parents.individuals().contains(offspring),
                "Without crossover or mutation every offspring is a clone, fitness included"
            );
        }
    }

    /// Share of genes that differ from the single parent every offspring descends from.
    fn changed_gene_share(gate: MutationGate, mutation_rate: f64) -> f64 {
        let pricing = reference_pricing();
        let config = EvolutionConfig {
            crossover_rate: 0.,
            mutation_rate,
            mutation_gate: gate,
            ..EvolutionConfig::default()
        };
        let operators = StandardOperators::new(&pricing, &config);
        let mut rng = StdRng::seed_from_u64(33);

        let parent = Allocation::new(vec![1; pricing.len()]);
        let mut population = Population::new(vec![parent.clone(); 4000]);
        population.evaluate(&operators, false);
        population.advance(&config, &operators, &mut rng);

        let changed = population
            .individuals()
            .iter()
            .flat_map(|offspring| offspring.genes().iter().zip(parent.genes()))
            .filter(|(child, original)| child != original)
            .count();
        changed as f64 / (population.len() * pricing.len()) as f64
    }

    #[test]
    fn test_mutation_gate_rates() {
        // A reset draws the old value back one time in max_units + 1.
        let effective = 3. / 4.;

        let double = changed_gene_share(MutationGate::DoubleGated, 0.5);
        assert!(
            (double - 0.25 * effective).abs() < 0.03,
            "Double gating resets genes at rate squared, got {double}"
        );

        let single = changed_gene_share(MutationGate::SingleGated, 0.5);
        assert!(
            (single - 0.5 * effective).abs() < 0.03,
            "Single gating resets genes at rate, got {single}"
        );
    }

    #[test]
    fn test_statistics_of_empty_population() {
        let population = Population::default();
        assert!(population.best().is_none());
        assert!(population.mean_fitness().is_none());
    }

    #[test]
    fn test_mean_fitness() {
        let individuals = [1., 2., 6.]
            .iter()
            .map(|&fitness| {
                let mut allocation = Allocation::new(vec![0]);
                allocation.set_fitness(fitness);
                allocation
            })
            .collect();
        let population = Population::new(individuals);
        assert_eq!(population.mean_fitness(), Some(3.));
        assert_eq!(population.best().and_then(Allocation::fitness), Some(6.));
    }
}
