use crate::allocation::Allocation;
use crate::evolution::allocation_evolution::EvolutionConfig;
use crate::evolution::objective::FitnessEvaluator;
use crate::pricing::PricingTable;
use rand::distributions::Uniform;
use rand::prelude::*;
use std::cmp::Ordering;

/// The four capabilities a generation needs. The population decides *when* to
/// call them (crossover and mutation gates), the operators decide *how*.
pub trait GeneticOperators {
    fn evaluate(&self, allocation: &Allocation) -> f64;
    fn mate<R: Rng + ?Sized>(&self, first: &mut Allocation, second: &mut Allocation, rng: &mut R);
    fn mutate<R: Rng + ?Sized>(&self, allocation: &mut Allocation, rng: &mut R);
    fn select<R: Rng + ?Sized>(
        &self,
        population: &[Allocation],
        count: usize,
        rng: &mut R,
    ) -> Vec<Allocation>;
}

/// Tournament selection, two-point crossover and uniform integer reset mutation.
#[derive(Debug, Clone, Copy)]
pub struct StandardOperators<'a> {
    evaluator: FitnessEvaluator<'a>,
    tournament_size: usize,
    mutation_rate: f64,
    max_units: u32,
}

impl<'a> StandardOperators<'a> {
    pub fn new(pricing: &'a PricingTable, config: &'a EvolutionConfig) -> Self {
        StandardOperators {
            evaluator: FitnessEvaluator::new(pricing, &config.targets),
            tournament_size: config.tournament_size,
            mutation_rate: config.mutation_rate,
            max_units: config.max_units,
        }
    }

    pub fn evaluator(&self) -> &FitnessEvaluator<'a> {
        &self.evaluator
    }
}

impl GeneticOperators for StandardOperators<'_> {
    fn evaluate(&self, allocation: &Allocation) -> f64 {
        self.evaluator.evaluate(allocation.genes())
    }

    fn mate<R: Rng + ?Sized>(&self, first: &mut Allocation, second: &mut Allocation, rng: &mut R) {
        two_point_crossover(first, second, rng);
    }

    fn mutate<R: Rng + ?Sized>(&self, allocation: &mut Allocation, rng: &mut R) {
        uniform_reset_mutation(allocation, self.max_units, self.mutation_rate, rng);
    }

    fn select<R: Rng + ?Sized>(
        &self,
        population: &[Allocation],
        count: usize,
        rng: &mut R,
    ) -> Vec<Allocation> {
        tournament_selection(population, count, self.tournament_size, rng)
    }
}

/// Indices of `tournament_size` contestants, drawn uniformly with replacement.
pub fn sample_contestants<R: Rng + ?Sized>(
    population_size: usize,
    tournament_size: usize,
    rng: &mut R,
) -> Vec<usize> {
    if population_size == 0 {
        return vec![];
    }
    (0..tournament_size)
        .map(|_| rng.gen_range(0..population_size))
        .collect()
}

/// The fittest contestant; the earliest drawn wins a tie.
pub fn tournament_winner(population: &[Allocation], contestants: &[usize]) -> Option<usize> {
    contestants.iter().copied().fold(None, |best, idx| match best {
        Some(incumbent)
            if population[idx].cmp_fitness(&population[incumbent]) != Ordering::Greater =>
        {
            best
        }
        _ => Some(idx),
    })
}

/// Runs `count` independent tournaments and clones each winner.
pub fn tournament_selection<R: Rng + ?Sized>(
    population: &[Allocation],
    count: usize,
    tournament_size: usize,
    rng: &mut R,
) -> Vec<Allocation> {
    (0..count)
        .filter_map(|_| {
            let contestants = sample_contestants(population.len(), tournament_size, rng);
            tournament_winner(population, &contestants)
        })
        .map(|winner| population[winner].clone())
        .collect()
}

/// Swaps the genes between two distinct cut points `c1 < c2`, both in `[1, len]`.
/// Allocations with fewer than two genes are left as they are.
pub fn two_point_crossover<R: Rng + ?Sized>(
    first: &mut Allocation,
    second: &mut Allocation,
    rng: &mut R,
) {
    let size = first.len().min(second.len());
    if size < 2 {
        return;
    }

    let mut cut_1 = rng.gen_range(1..=size);
    let mut cut_2 = rng.gen_range(1..size);
    if cut_2 >= cut_1 {
        cut_2 += 1;
    } else {
        std::mem::swap(&mut cut_1, &mut cut_2);
    }

    first.genes_mut()[cut_1..cut_2].swap_with_slice(&mut second.genes_mut()[cut_1..cut_2]);
}

/// Each gene is independently reset, with probability `gene_rate`, to a uniform
/// value in `[0, max_units]`.
pub fn uniform_reset_mutation<R: Rng + ?Sized>(
    allocation: &mut Allocation,
    max_units: u32,
    gene_rate: f64,
    rng: &mut R,
) {
    let uniform = Uniform::new_inclusive(0, max_units);
    for idx in 0..allocation.len() {
        if rng.gen_bool(gene_rate) {
            allocation.genes_mut()[idx] = uniform.sample(rng);
        }
    }
}
