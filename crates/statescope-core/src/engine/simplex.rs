use crate::core::fes::ScalarField;
use crate::core::models::bounds::Bounds;

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;
/// Initial simplex edge, as a fraction of each dimension's width.
const INITIAL_STEP: f64 = 0.05;

#[derive(Debug, Clone, Copy)]
pub(crate) struct SimplexOptions {
    pub tolerance: f64,
    pub max_iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Refinement {
    pub position: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Box-constrained Nelder–Mead from `start`, followed by one restart from the result.
///
/// Every trial point is clamped into `bounds`. Non-finite function values rank as `+inf`.
pub(crate) fn minimize<F>(
    field: &F,
    start: &[f64],
    bounds: &Bounds,
    options: &SimplexOptions,
) -> Refinement
where
    F: ScalarField + ?Sized,
{
    let first = run(field, start, bounds, options);
    let second = run(field, &first.position, bounds, options);
    let iterations = first.iterations + second.iterations;
    if second.value < first.value {
        Refinement {
            iterations,
            ..second
        }
    } else {
        Refinement {
            iterations,
            converged: first.converged && second.converged,
            ..first
        }
    }
}

fn evaluate<F: ScalarField + ?Sized>(field: &F, x: &[f64]) -> f64 {
    let v = field.value(x);
    if v.is_nan() { f64::INFINITY } else { v }
}

fn clamped(bounds: &Bounds, mut x: Vec<f64>) -> Vec<f64> {
    bounds.clamp(&mut x);
    x
}

fn initial_simplex(start: &[f64], bounds: &Bounds) -> Vec<Vec<f64>> {
    let origin = clamped(bounds, start.to_vec());
    let mut simplex = vec![origin.clone()];
    for d in 0..origin.len() {
        let step = INITIAL_STEP * bounds.width(d);
        let mut vertex = origin.clone();
        vertex[d] = if origin[d] + step <= bounds.upper(d) {
            origin[d] + step
        } else {
            origin[d] - step
        };
        simplex.push(vertex);
    }
    simplex
}

/// `a + t·(b - a)`, clamped into the bounds.
fn along(bounds: &Bounds, a: &[f64], b: &[f64], t: f64) -> Vec<f64> {
    clamped(
        bounds,
        a.iter().zip(b).map(|(ai, bi)| ai + t * (bi - ai)).collect(),
    )
}

fn run<F: ScalarField + ?Sized>(
    field: &F,
    start: &[f64],
    bounds: &Bounds,
    options: &SimplexOptions,
) -> Refinement {
    let dim = start.len();
    let x_tolerance = options.tolerance.sqrt() * bounds.diagonal();

    let mut vertices = initial_simplex(start, bounds);
    let mut values: Vec<f64> = vertices.iter().map(|v| evaluate(field, v)).collect();
    let mut order: Vec<usize> = (0..=dim).collect();

    let mut iterations = 0;
    let mut converged = false;
    while iterations < options.max_iterations {
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        let best = order[0];
        let worst = order[dim];
        let second_worst = order[dim.saturating_sub(1)];

        let f_spread = values[worst] - values[best];
        let x_spread = vertices
            .iter()
            .flat_map(|v| v.iter().zip(&vertices[best]).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max);
        if (f_spread <= options.tolerance || !f_spread.is_finite() && values[best] == values[worst])
            && x_spread <= x_tolerance
        {
            converged = true;
            break;
        }
        iterations += 1;

        let mut centroid = vec![0.0; dim];
        for &i in order.iter().take(dim) {
            for (c, x) in centroid.iter_mut().zip(&vertices[i]) {
                *c += x / dim as f64;
            }
        }

        let reflected = along(bounds, &centroid, &vertices[worst], -REFLECTION);
        let f_reflected = evaluate(field, &reflected);

        if f_reflected < values[best] {
            let expanded = along(bounds, &centroid, &reflected, EXPANSION);
            let f_expanded = evaluate(field, &expanded);
            if f_expanded < f_reflected {
                vertices[worst] = expanded;
                values[worst] = f_expanded;
            } else {
                vertices[worst] = reflected;
                values[worst] = f_reflected;
            }
            continue;
        }
        if f_reflected < values[second_worst] {
            vertices[worst] = reflected;
            values[worst] = f_reflected;
            continue;
        }

        let (contracted, f_contracted, accept) = if f_reflected < values[worst] {
            let outside = along(bounds, &centroid, &reflected, CONTRACTION);
            let f = evaluate(field, &outside);
            (outside, f, f <= f_reflected)
        } else {
            let inside = along(bounds, &centroid, &vertices[worst], CONTRACTION);
            let f = evaluate(field, &inside);
            (inside, f, f < values[worst])
        };
        if accept {
            vertices[worst] = contracted;
            values[worst] = f_contracted;
            continue;
        }

        let anchor = vertices[best].clone();
        for i in 0..=dim {
            if i != best {
                vertices[i] = along(bounds, &anchor, &vertices[i], SHRINK);
                values[i] = evaluate(field, &vertices[i]);
            }
        }
    }

    let best = (0..=dim)
        .min_by(|&a, &b| values[a].total_cmp(&values[b]))
        .unwrap_or(0);
    Refinement {
        position: vertices.swap_remove(best),
        value: values[best],
        iterations,
        converged,
    }
}
