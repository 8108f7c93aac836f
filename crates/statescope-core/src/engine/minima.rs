use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::config::{MinimizerConfig, MinimizerStrategy};
use super::error::EngineError;
use super::simplex::{self, Refinement, SimplexOptions};
use crate::core::fes::ScalarField;
use crate::core::models::bounds::Bounds;
use crate::core::models::labels::Minimum;

/// Candidates closer than this fraction of a dimension's width to its edge count as boundary minima.
const BOUNDARY_TOLERANCE: f64 = 1e-6;

/// Finds the local minima of `field` inside `bounds`.
///
/// Seeds are generated by the configured [`MinimizerStrategy`] and each is refined with a
/// box-constrained Nelder–Mead simplex. Refined candidates closer than
/// `merge_tolerance · diagonal` to an accepted minimum are merged into it; the merged minimum
/// keeps its discovery slot and moves only when the new candidate is strictly lower. The
/// result is deterministic for a fixed configuration.
///
/// # Errors
///
/// - [`EngineError::DimensionMismatch`] if `bounds` and `field` disagree on dimensionality.
/// - [`EngineError::InvalidInput`] for an invalid [`MinimizerConfig`].
/// - [`EngineError::NoMinimaFound`] if no candidate survives filtering.
#[instrument(
    skip_all,
    name = "find_local_minima",
    fields(dim = bounds.dim(), strategy = %config.strategy)
)]
pub fn find_local_minima<F>(
    field: &F,
    bounds: &Bounds,
    config: &MinimizerConfig,
) -> Result<Vec<Minimum>, EngineError>
where
    F: ScalarField + Sync + ?Sized,
{
    if bounds.dim() != field.dim() {
        return Err(EngineError::DimensionMismatch {
            context: "bounds",
            expected: field.dim(),
            found: bounds.dim(),
        });
    }
    config
        .validate()
        .map_err(|e| EngineError::InvalidInput(e.to_string()))?;

    let seeds = match config.strategy {
        MinimizerStrategy::GridSearch => grid_seeds(field, bounds, config)?,
        MinimizerStrategy::RandomRestarts => random_seeds(bounds, config),
    };
    debug!(seeds = seeds.len(), "Generated optimizer seeds.");

    let options = SimplexOptions {
        tolerance: config.tolerance,
        max_iterations: config.max_iterations,
    };

    #[cfg(not(feature = "parallel"))]
    let iterator = seeds.iter();

    #[cfg(feature = "parallel")]
    let iterator = seeds.par_iter();

    let refined: Vec<Refinement> = iterator
        .map(|seed| simplex::minimize(field, seed, bounds, &options))
        .collect();

    let not_converged = refined.iter().filter(|r| !r.converged).count();
    if not_converged > 0 {
        debug!(
            not_converged,
            "Some refinements hit the iteration cap before converging."
        );
    }

    let minima = merge_candidates(refined, bounds, config);
    if minima.is_empty() {
        return Err(EngineError::NoMinimaFound {
            reason: if seeds.is_empty() {
                "no grid point is lower than all of its neighbours".to_string()
            } else {
                format!(
                    "all {} refined candidates were non-finite or on the search boundary",
                    seeds.len()
                )
            },
        });
    }

    info!(count = minima.len(), "Local minima located.");
    Ok(minima)
}

/// Grid points whose value is finite and not above any of their (up to `3^D - 1`) neighbours,
/// lowest first.
fn grid_seeds<F>(
    field: &F,
    bounds: &Bounds,
    config: &MinimizerConfig,
) -> Result<Vec<Vec<f64>>, EngineError>
where
    F: ScalarField + ?Sized,
{
    let n = config.grid_points;
    let dim = bounds.dim();
    let points = bounds.grid(n)?;
    let matrix = DMatrix::from_row_iterator(points.len(), dim, points.iter().flatten().copied());
    let values = field.values(&matrix);

    let strides: Vec<usize> = (0..dim).map(|d| n.pow((dim - 1 - d) as u32)).collect();
    let offsets = neighbour_offsets(dim);

    let mut seeds: Vec<(usize, f64)> = (0..points.len())
        .filter(|&flat| values[flat].is_finite())
        .filter(|&flat| {
            let index: Vec<usize> = strides.iter().map(|s| (flat / s) % n).collect();
            offsets.iter().all(|offset| {
                neighbour(&index, offset, n)
                    .map(|nb| {
                        let nb_flat: usize = nb.iter().zip(&strides).map(|(i, s)| i * s).sum();
                        values[flat] <= values[nb_flat] || values[nb_flat].is_nan()
                    })
                    .unwrap_or(true)
            })
        })
        .map(|flat| (flat, values[flat]))
        .collect();

    seeds.sort_by(|a, b| a.1.total_cmp(&b.1));
    if let Some(cap) = config.max_candidates {
        seeds.truncate(cap);
    }

    let mut points = points;
    Ok(seeds
        .into_iter()
        .map(|(flat, _)| std::mem::take(&mut points[flat]))
        .collect())
}

fn neighbour_offsets(dim: usize) -> Vec<Vec<i64>> {
    let mut offsets = vec![Vec::new()];
    for _ in 0..dim {
        offsets = offsets
            .into_iter()
            .flat_map(|prefix| {
                [-1, 0, 1].into_iter().map(move |step| {
                    let mut next = prefix.clone();
                    next.push(step);
                    next
                })
            })
            .collect();
    }
    offsets.retain(|o| o.iter().any(|&s| s != 0));
    offsets
}

fn neighbour(index: &[usize], offset: &[i64], n: usize) -> Option<Vec<usize>> {
    index
        .iter()
        .zip(offset)
        .map(|(&i, &o)| {
            let j = i as i64 + o;
            (0..n as i64).contains(&j).then_some(j as usize)
        })
        .collect()
}

fn random_seeds(bounds: &Bounds, config: &MinimizerConfig) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    (0..config.restarts)
        .map(|_| {
            bounds
                .ranges()
                .iter()
                .map(|&(lo, hi)| rng.gen_range(lo..=hi))
                .collect()
        })
        .collect()
}

fn merge_candidates(
    refined: Vec<Refinement>,
    bounds: &Bounds,
    config: &MinimizerConfig,
) -> Vec<Minimum> {
    let radius = config.merge_tolerance * bounds.diagonal();
    let mut minima: Vec<Minimum> = Vec::new();

    for candidate in refined {
        if !candidate.value.is_finite() {
            continue;
        }
        if !config.keep_boundary_minima
            && bounds.is_on_boundary(&candidate.position, BOUNDARY_TOLERANCE)
        {
            debug!(position = ?candidate.position, "Discarding minimum on the search boundary.");
            continue;
        }

        let position = DVector::from_vec(candidate.position);
        match minima
            .iter_mut()
            .find(|m| (&m.position - &position).norm() <= radius)
        {
            Some(existing) => {
                if candidate.value < existing.free_energy {
                    existing.position = position;
                    existing.free_energy = candidate.value;
                }
            }
            None => minima.push(Minimum::new(position, candidate.value)),
        }
    }
    minima
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fes::FnField;

    const TOLERANCE: f64 = 1e-3;

    fn double_well() -> FnField<impl Fn(&[f64]) -> f64> {
        // Minima at x = ±1 (y = 0), the one at x = -1 is deeper.
        FnField::new(2, |x: &[f64]| (x[0] * x[0] - 1.0).powi(2) + 0.2 * x[0] + x[1] * x[1])
    }

    fn box_2d() -> Bounds {
        Bounds::new(vec![(-2.0, 2.0), (-2.0, 2.0)]).unwrap()
    }

    fn sorted_by_x(mut minima: Vec<Minimum>) -> Vec<Minimum> {
        minima.sort_by(|a, b| a.position[0].total_cmp(&b.position[0]));
        minima
    }

    #[test]
    fn grid_search_finds_both_wells_of_a_double_well() {
        let minima = sorted_by_x(
            find_local_minima(&double_well(), &box_2d(), &MinimizerConfig::default()).unwrap(),
        );
        assert_eq!(minima.len(), 2);
        assert!((minima[0].position[0] + 1.0).abs() < 0.1);
        assert!((minima[1].position[0] - 1.0).abs() < 0.1);
        assert!(minima[0].position[1].abs() < TOLERANCE);
        assert!(minima[0].free_energy < minima[1].free_energy);
    }

    #[test]
    fn grid_search_reports_lowest_minimum_first() {
        let minima =
            find_local_minima(&double_well(), &box_2d(), &MinimizerConfig::default()).unwrap();
        assert!(minima[0].position[0] < 0.0);
    }

    #[test]
    fn random_restarts_find_the_same_wells() {
        let config = MinimizerConfig {
            strategy: MinimizerStrategy::RandomRestarts,
            restarts: 32,
            ..Default::default()
        };
        let minima = sorted_by_x(find_local_minima(&double_well(), &box_2d(), &config).unwrap());
        assert_eq!(minima.len(), 2);
        assert!((minima[0].position[0] + 1.0).abs() < 0.1);
        assert!((minima[1].position[0] - 1.0).abs() < 0.1);
    }

    #[test]
    fn search_is_deterministic_for_fixed_configuration() {
        let config = MinimizerConfig {
            strategy: MinimizerStrategy::RandomRestarts,
            seed: 42,
            ..Default::default()
        };
        let first = find_local_minima(&double_well(), &box_2d(), &config).unwrap();
        let second = find_local_minima(&double_well(), &box_2d(), &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn max_candidates_keeps_the_lowest_seeds() {
        let config = MinimizerConfig {
            max_candidates: Some(1),
            ..Default::default()
        };
        let minima = find_local_minima(&double_well(), &box_2d(), &config).unwrap();
        assert_eq!(minima.len(), 1);
        assert!((minima[0].position[0] + 1.0).abs() < 0.1);
    }

    #[test]
    fn boundary_minima_are_discarded_unless_requested() {
        let slope = FnField::new(1, |x: &[f64]| x[0]);
        let bounds = Bounds::new(vec![(0.0, 1.0)]).unwrap();

        let result = find_local_minima(&slope, &bounds, &MinimizerConfig::default());
        assert!(matches!(result, Err(EngineError::NoMinimaFound { .. })));

        let config = MinimizerConfig {
            keep_boundary_minima: true,
            ..Default::default()
        };
        let minima = find_local_minima(&slope, &bounds, &config).unwrap();
        assert_eq!(minima.len(), 1);
        assert_eq!(minima[0].position[0], 0.0);
    }

    #[test]
    fn nearby_candidates_merge_into_the_lower_one() {
        let bounds = Bounds::new(vec![(0.0, 10.0)]).unwrap();
        let config = MinimizerConfig::default();
        let candidate = |x: f64, value: f64| Refinement {
            position: vec![x],
            value,
            iterations: 1,
            converged: true,
        };

        let minima = merge_candidates(
            vec![
                candidate(5.0, 1.0),
                candidate(2.0, 3.0),
                candidate(5.05, 0.5),
                candidate(5.02, 0.7),
            ],
            &bounds,
            &config,
        );

        assert_eq!(minima.len(), 2);
        assert_eq!(minima[0].position[0], 5.05);
        assert_eq!(minima[0].free_energy, 0.5);
        assert_eq!(minima[1].position[0], 2.0);
    }

    #[test]
    fn non_finite_candidates_are_dropped() {
        let bounds = Bounds::new(vec![(0.0, 10.0)]).unwrap();
        let minima = merge_candidates(
            vec![Refinement {
                position: vec![5.0],
                value: f64::INFINITY,
                iterations: 1,
                converged: true,
            }],
            &bounds,
            &MinimizerConfig::default(),
        );
        assert!(minima.is_empty());
    }

    #[test]
    fn mismatched_bounds_are_rejected() {
        let bounds = Bounds::new(vec![(0.0, 1.0)]).unwrap();
        assert!(matches!(
            find_local_minima(&double_well(), &bounds, &MinimizerConfig::default()),
            Err(EngineError::DimensionMismatch {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let config = MinimizerConfig {
            merge_tolerance: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            find_local_minima(&double_well(), &box_2d(), &config),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn neighbourhood_has_three_to_the_d_minus_one_offsets() {
        assert_eq!(neighbour_offsets(1).len(), 2);
        assert_eq!(neighbour_offsets(2).len(), 8);
        assert_eq!(neighbour_offsets(3).len(), 26);
    }
}
