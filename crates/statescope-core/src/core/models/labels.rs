use nalgebra::DVector;

/// A local minimum of the free-energy surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub position: DVector<f64>,
    pub free_energy: f64,
}

impl Minimum {
    pub fn new(position: DVector<f64>, free_energy: f64) -> Self {
        Self {
            position,
            free_energy,
        }
    }

    pub fn dim(&self) -> usize {
        self.position.len()
    }
}

/// Basin membership of a single frame.
///
/// `basin` indexes the minima sequence the label was computed against; `selected` is true
/// when the frame's free energy lies within the cutoff of that basin's minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BasinLabel {
    pub basin: usize,
    pub selected: bool,
}

impl BasinLabel {
    pub fn new(basin: usize, selected: bool) -> Self {
        Self { basin, selected }
    }
}

/// Number of frames per basin, counting only selected frames when `selected_only` is set.
pub fn basin_populations(
    labels: &[BasinLabel],
    n_basins: usize,
    selected_only: bool,
) -> Vec<usize> {
    let mut counts = vec![0; n_basins];
    for label in labels {
        if selected_only && !label.selected {
            continue;
        }
        if let Some(count) = counts.get_mut(label.basin) {
            *count += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basin_populations_counts_all_frames() {
        let labels = vec![
            BasinLabel::new(0, true),
            BasinLabel::new(1, false),
            BasinLabel::new(1, true),
            BasinLabel::new(0, true),
        ];
        assert_eq!(basin_populations(&labels, 2, false), vec![2, 2]);
    }

    #[test]
    fn basin_populations_can_skip_unselected_frames() {
        let labels = vec![
            BasinLabel::new(0, false),
            BasinLabel::new(1, false),
            BasinLabel::new(1, true),
        ];
        assert_eq!(basin_populations(&labels, 3, true), vec![0, 1, 0]);
    }

    #[test]
    fn minimum_reports_its_dimensionality() {
        let minimum = Minimum::new(DVector::from_vec(vec![0.0, 1.0, 2.0]), -3.0);
        assert_eq!(minimum.dim(), 3);
    }
}
