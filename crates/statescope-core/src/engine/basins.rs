use nalgebra::{DMatrix, DVector};
use std::ops::Range;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::config::Batching;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::fes::ScalarField;
use crate::core::models::labels::{BasinLabel, Minimum};

/// Labels every sample with its nearest minimum and flags it as selected when its value lies
/// less than `cutoff` above that minimum's value.
///
/// Nearest means smallest Euclidean distance; on an exact tie the lowest minimum index wins.
/// Non-selected samples stay in the output. The labels do not depend on `batching`, which only
/// bounds how many samples are evaluated at once.
///
/// Emits one [`Progress::TaskIncrement`] per evaluated chunk.
#[instrument(
    skip_all,
    name = "assign_basins",
    fields(samples = samples.nrows(), minima = minima.len())
)]
pub fn assign_basins<F>(
    samples: &DMatrix<f64>,
    minima: &[Minimum],
    field: &F,
    cutoff: f64,
    batching: Batching,
    reporter: &ProgressReporter,
) -> Result<Vec<BasinLabel>, EngineError>
where
    F: ScalarField + Sync + ?Sized,
{
    if minima.is_empty() {
        return Err(EngineError::NoMinimaFound {
            reason: "basin assignment needs at least one minimum".to_string(),
        });
    }
    let dim = field.dim();
    if samples.ncols() != dim {
        return Err(EngineError::DimensionMismatch {
            context: "samples",
            expected: dim,
            found: samples.ncols(),
        });
    }
    if let Some(m) = minima.iter().find(|m| m.dim() != dim) {
        return Err(EngineError::DimensionMismatch {
            context: "minimum",
            expected: dim,
            found: m.dim(),
        });
    }
    if !(cutoff.is_finite() && cutoff > 0.0) {
        return Err(EngineError::InvalidInput(format!(
            "free-energy cutoff must be positive and finite, got {cutoff}"
        )));
    }

    let classes = nearest_minima(samples, minima);

    let positions = DMatrix::from_fn(minima.len(), dim, |i, j| minima[i].position[j]);
    let reference = field.values(&positions);

    let values = evaluate(samples, field, batching, reporter)?;

    let labels: Vec<BasinLabel> = classes
        .iter()
        .zip(values.iter())
        .map(|(&basin, &value)| BasinLabel::new(basin, value - reference[basin] < cutoff))
        .collect();

    info!(
        selected = labels.iter().filter(|l| l.selected).count(),
        total = labels.len(),
        "Basin assignment complete."
    );
    Ok(labels)
}

/// Index of the closest minimum for every row, ties going to the lowest index.
fn nearest_minima(samples: &DMatrix<f64>, minima: &[Minimum]) -> Vec<usize> {
    samples
        .row_iter()
        .map(|row| {
            let mut best = 0;
            let mut best_distance = f64::INFINITY;
            for (k, minimum) in minima.iter().enumerate() {
                let distance: f64 = row
                    .iter()
                    .zip(minimum.position.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                if distance < best_distance {
                    best = k;
                    best_distance = distance;
                }
            }
            best
        })
        .collect()
}

/// Row ranges of `splits` nearly equal chunks; the first `n % splits` are one row longer.
pub(crate) fn split_ranges(n: usize, splits: usize) -> Vec<Range<usize>> {
    let base = n / splits;
    let extra = n % splits;
    let mut start = 0;
    (0..splits)
        .map(|k| {
            let len = base + usize::from(k < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

fn evaluate<F>(
    samples: &DMatrix<f64>,
    field: &F,
    batching: Batching,
    reporter: &ProgressReporter,
) -> Result<DVector<f64>, EngineError>
where
    F: ScalarField + Sync + ?Sized,
{
    let ranges = match batching {
        Batching::Whole => vec![0..samples.nrows()],
        Batching::Chunked { splits: 0 } => {
            return Err(EngineError::InvalidInput(
                "chunked evaluation needs at least one split".to_string(),
            ));
        }
        Batching::Chunked { splits } => split_ranges(samples.nrows(), splits),
    };
    debug!(chunks = ranges.len(), "Evaluating free energy of samples.");

    reporter.report(Progress::TaskStart {
        total_steps: ranges.len() as u64,
    });

    let evaluate_chunk = |range: &Range<usize>| {
        let chunk = samples.rows(range.start, range.len()).into_owned();
        let values = field.values(&chunk);
        reporter.report(Progress::TaskIncrement { amount: 1 });
        values
    };

    #[cfg(not(feature = "parallel"))]
    let chunks: Vec<DVector<f64>> = ranges.iter().map(evaluate_chunk).collect();

    #[cfg(feature = "parallel")]
    let chunks: Vec<DVector<f64>> = ranges.par_iter().map(evaluate_chunk).collect();

    reporter.report(Progress::TaskFinish);

    Ok(DVector::from_iterator(
        samples.nrows(),
        chunks.iter().flat_map(|c| c.iter().copied()),
    ))
}
