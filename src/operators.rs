use crate::genetic_algorithm::{
    EvaluateFn, Fitness, Genotype, MutateFn, SelectParentsFn, SelectSurvivorsFn,
};
use crate::population::Population;
use log::warn;
use rand::rngs::StdRng;
use rand::Rng;
use std::cmp::Ordering;
use std::sync::Arc;

pub fn select_tournament<T: Genotype, L: Fitness>(tournament_size: usize) -> SelectParentsFn<T, L> {
    let tournament_size = tournament_size.max(1);
    Arc::new(move |genes: &[T], fitnesses: &[L], rng: &mut StdRng| {
        (0..genes.len())
            .map(|_| {
                let mut winner = rng.gen_range(0..genes.len());
                for _ in 1..tournament_size {
                    let contender = rng.gen_range(0..genes.len());
                    if fitnesses[contender] > fitnesses[winner] {
                        winner = contender;
                    }
                }
                genes[winner].clone()
            })
            .collect()
    })
}

// Negative fitnesses count as zero; with no positive mass the draw is uniform
pub fn select_roulette<T: Genotype, L: Fitness>() -> SelectParentsFn<T, L> {
    Arc::new(|genes: &[T], fitnesses: &[L], rng: &mut StdRng| {
        let weights: Vec<f64> = fitnesses.iter().map(|&f| f.into().max(0.0)).collect();
        let total: f64 = weights.iter().sum();

        if total <= 0.0 || !total.is_finite() {
            return (0..genes.len())
                .map(|_| genes[rng.gen_range(0..genes.len())].clone())
                .collect();
        }

        (0..genes.len())
            .map(|_| {
                let mut remaining = rng.gen_range(0.0..total);
                let mut chosen = genes.len() - 1;
                for (index, weight) in weights.iter().enumerate() {
                    if remaining < *weight {
                        chosen = index;
                        break;
                    }
                    remaining -= weight;
                }
                genes[chosen].clone()
            })
            .collect()
    })
}

pub fn select_random<T: Genotype, L: Fitness>(count: usize) -> SelectParentsFn<T, L> {
    Arc::new(move |genes: &[T], _: &[L], rng: &mut StdRng| {
        (0..count)
            .map(|_| genes[rng.gen_range(0..genes.len())].clone())
            .collect()
    })
}

/// Keeps the `mu` fittest of parents and offspring, stable on ties.
pub fn select_mu<T: Genotype, L: Fitness>(
    mu: usize,
    evaluate: EvaluateFn<T, L>,
) -> SelectSurvivorsFn<T, L> {
    Arc::new(move |parents: &[T], fitnesses: &[L], offspring: &[T], _: &mut StdRng| {
        let mut combined_fitness = fitnesses.to_vec();
        combined_fitness.extend(evaluate(offspring));

        let combined: Vec<&T> = parents.iter().chain(offspring).collect();
        let mut indices: Vec<usize> = (0..combined.len().min(combined_fitness.len())).collect();
        indices.sort_by(|&a, &b| {
            combined_fitness[b]
                .partial_cmp(&combined_fitness[a])
                .unwrap_or(Ordering::Equal)
        });

        indices
            .into_iter()
            .take(mu)
            .map(|index| combined[index].clone())
            .collect()
    })
}

pub fn terminate_generations<T: Genotype, L: Fitness>(
    max_generations: usize,
) -> impl Fn(&Population<T, L>) -> bool + Clone + Send + Sync {
    move |population: &Population<T, L>| population.generation() >= max_generations
}

/// Wraps `mutate` so every child reaches `bound`. After `max_attempts`
/// misses the fittest of the parent and its tried children is kept.
pub fn bounded_mutation<T: Genotype, L: Fitness>(
    mutate: MutateFn<T>,
    evaluate: EvaluateFn<T, L>,
    bound: f64,
    max_attempts: usize,
) -> MutateFn<T> {
    if bound == f64::NEG_INFINITY {
        return mutate;
    }

    let max_attempts = max_attempts.max(1);
    Arc::new(move |genes: &[T], rng: &mut StdRng| {
        genes
            .iter()
            .map(|parent| {
                let mut fallback = parent.clone();
                let mut fallback_fitness = fitness_of(&evaluate, parent);

                for _ in 0..max_attempts {
                    let Some(child) = mutate(std::slice::from_ref(parent), rng).into_iter().next()
                    else {
                        continue;
                    };
                    let fitness = fitness_of(&evaluate, &child);
                    if fitness >= bound {
                        return child;
                    }
                    if fitness > fallback_fitness {
                        fallback = child;
                        fallback_fitness = fitness;
                    }
                }

                warn!(
                    "no child reached bound {} within {} attempts, keeping fitness {}",
                    bound, max_attempts, fallback_fitness
                );
                fallback
            })
            .collect()
    })
}

fn fitness_of<T, L: Fitness>(evaluate: &EvaluateFn<T, L>, genotype: &T) -> f64 {
    evaluate(std::slice::from_ref(genotype))
        .first()
        .map(|&fitness| fitness.into())
        .unwrap_or(f64::NEG_INFINITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn identity() -> EvaluateFn<i64, f64> {
        Arc::new(|genes: &[i64]| genes.iter().map(|&g| g as f64).collect())
    }

    #[test]
    fn test_select_mu_keeps_fittest() {
        let select = select_mu(3, identity());
        let mut rng = StdRng::seed_from_u64(0);
        let survivors = select(&[4, 1, 7], &[4.0, 1.0, 7.0], &[9, 2], &mut rng);
        assert_eq!(survivors, vec![9, 7, 4]);
    }

    #[test]
    fn test_tournament_of_whole_population_finds_best() {
        let select = select_tournament::<i64, f64>(64);
        let mut rng = StdRng::seed_from_u64(1);
        let parents = select(&[3, 8, 5], &[3.0, 8.0, 5.0], &mut rng);
        assert_eq!(parents, vec![8, 8, 8]);
    }

    #[test]
    fn test_roulette_never_picks_zero_weight() {
        let select = select_roulette::<i64, f64>();
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..50 {
            let parents = select(&[1, 2, 3], &[0.0, 5.0, 0.0], &mut rng);
            assert!(parents.iter().all(|&p| p == 2));
        }
        let uniform = select(&[1, 2, 3], &[-1.0, -2.0, -3.0], &mut rng);
        assert_eq!(uniform.len(), 3);
    }

    #[test]
    fn test_select_random_count() {
        let select = select_random::<i64, f64>(1);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(select(&[1, 2, 3], &[], &mut rng).len(), 1);
    }

    #[test]
    fn test_bounded_mutation_resamples_until_bound() {
        let step: MutateFn<i64> = Arc::new(|genes: &[i64], rng: &mut StdRng| {
            genes.iter().map(|g| g + rng.gen_range(-5..=5)).collect()
        });
        let mutate = bounded_mutation(step, identity(), 10.0, 1000);
        let mut rng = StdRng::seed_from_u64(4);
        let children = mutate(&[10, 12, 14], &mut rng);
        assert_eq!(children.len(), 3);
        assert!(children.iter().all(|&c| c >= 10));
    }

    #[test]
    fn test_bounded_mutation_falls_back_when_exhausted() {
        let worsen: MutateFn<i64> =
            Arc::new(|genes: &[i64], _: &mut StdRng| genes.iter().map(|g| g - 100).collect());
        let mutate = bounded_mutation(worsen, identity(), 50.0, 5);
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(mutate(&[3, 60], &mut rng), vec![3, 60]);
    }
}
