use rand::distributions::Uniform;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A candidate solution: how many units of each instrument to buy, stocks first.
///
/// The fitness is cached and cleared whenever the genes change, so an allocation
/// with `fitness == None` must be re-evaluated before it takes part in selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    genes: Vec<u32>,
    fitness: Option<f64>,
}

impl Allocation {
    pub fn new(genes: Vec<u32>) -> Self {
        Allocation {
            genes,
            fitness: None,
        }
    }

    pub fn random<R: Rng + ?Sized>(length: usize, max_units: u32, rng: &mut R) -> Self {
        let uniform = Uniform::new_inclusive(0, max_units);
        Allocation::new(uniform.sample_iter(rng).take(length).collect())
    }

    pub fn genes(&self) -> &[u32] {
        &self.genes
    }

    /// Mutable access to the genes. Clears the cached fitness.
    pub fn genes_mut(&mut self) -> &mut [u32] {
        self.fitness = None;
        &mut self.genes
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    pub fn invalidate(&mut self) {
        self.fitness = None;
    }

    pub fn within_bounds(&self, max_units: u32) -> bool {
        self.genes.iter().all(|&units| units <= max_units)
    }

    /// Orders by fitness, an unevaluated allocation ranking below any evaluated one.
    pub fn cmp_fitness(&self, other: &Allocation) -> Ordering {
        match (self.fitness, other.fitness) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Index of the first allocation with the highest fitness.
pub fn index_of_best(allocations: &[Allocation]) -> Option<usize> {
    allocations
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, &Allocation)>, (idx, candidate)| match best {
            Some((_, incumbent)) if candidate.cmp_fitness(incumbent) != Ordering::Greater => best,
            _ => Some((idx, candidate)),
        })
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    fn evaluated(genes: Vec<u32>, fitness: f64) -> Allocation {
        let mut allocation = Allocation::new(genes);
        allocation.set_fitness(fitness);
        allocation
    }

    #[test]
    fn test_random_respects_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let allocation = Allocation::random(15, 3, &mut rng);
            assert_eq!(allocation.len(), 15);
            assert!(allocation.within_bounds(3));
            assert!(!allocation.is_evaluated(), "New allocations start unevaluated");
        }
    }

    #[test]
    fn test_gene_access_invalidates_fitness() {
        let mut allocation = evaluated(vec![1, 2, 3], 42.);
        assert_eq!(allocation.fitness(), Some(42.));
        allocation.genes_mut()[0] = 0;
        assert_eq!(allocation.fitness(), None);
        assert_eq!(allocation.genes(), &[0, 2, 3]);
    }

    #[test]
    fn test_index_of_best_takes_first_maximum() {
        let allocations = vec![
            evaluated(vec![0], 1.),
            evaluated(vec![1], 5.),
            evaluated(vec![2], 5.),
            Allocation::new(vec![3]),
        ];
        assert_eq!(index_of_best(&allocations), Some(1));
        assert_eq!(index_of_best(&[]), None);
    }
}
