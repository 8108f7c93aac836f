use nalgebra::{DMatrix, DVector};
use tracing::{info, instrument, warn};

use crate::core::density::bandwidth::BandwidthMethod;
use crate::core::density::kde::WeightedKde;
use crate::core::density::weights::from_log_weights;
use crate::core::fes::FreeEnergySurface;
use crate::core::models::bounds::Bounds;
use crate::core::models::dataset::LabeledDataset;
use crate::core::models::labels::{BasinLabel, Minimum, basin_populations};
use crate::core::models::table::NumericTable;
use crate::engine::basins;
use crate::engine::config::{Batching, IdentifyConfig, MinimizerConfig, WeightSource};
use crate::engine::error::EngineError;
use crate::engine::minima::find_local_minima;
use crate::engine::progress::{Progress, ProgressReporter};

/// Descriptor column that duplicates the simulation time and is dropped on load.
const TIME_COLUMN: &str = "time";
/// Columns containing this marker hold bias potentials, usually a sign of unused reweighting.
const BIAS_MARKER: &str = ".bias";

/// Collective variables and optional descriptors, validated and row-aligned.
#[derive(Debug, Clone)]
pub struct Loaded {
    colvar: NumericTable,
    descriptors: Option<NumericTable>,
    kbt: f64,
}

impl Loaded {
    /// # Errors
    ///
    /// - [`EngineError::InvalidInput`] if `kbt` is not positive and finite.
    /// - [`EngineError::Precondition`] if the descriptor table has a different number of rows.
    pub fn new(
        colvar: NumericTable,
        descriptors: Option<NumericTable>,
        kbt: f64,
    ) -> Result<Self, EngineError> {
        if !(kbt.is_finite() && kbt > 0.0) {
            return Err(EngineError::InvalidInput(format!(
                "temperature scale kT must be positive and finite, got {kbt}"
            )));
        }
        let descriptors = descriptors.map(|d| d.without_column(TIME_COLUMN));
        if let Some(d) = &descriptors {
            if d.n_rows() != colvar.n_rows() {
                return Err(EngineError::Precondition(format!(
                    "descriptors have {} rows but the collective variables have {}",
                    d.n_rows(),
                    colvar.n_rows()
                )));
            }
        }
        Ok(Self {
            colvar,
            descriptors,
            kbt,
        })
    }

    /// Keeps every `stride`-th frame of both tables.
    pub fn with_stride(self, stride: usize) -> Result<Self, EngineError> {
        if stride == 0 {
            return Err(EngineError::InvalidInput(
                "stride must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            colvar: self.colvar.strided(stride),
            descriptors: self.descriptors.map(|d| d.strided(stride)),
            kbt: self.kbt,
        })
    }

    pub fn colvar(&self) -> &NumericTable {
        &self.colvar
    }

    pub fn descriptors(&self) -> Option<&NumericTable> {
        self.descriptors.as_ref()
    }

    pub fn kbt(&self) -> f64 {
        self.kbt
    }

    /// Fits the free-energy surface over `selected_cvs`.
    #[instrument(skip_all, name = "fit_fes", fields(cvs = ?selected_cvs))]
    pub fn fit(
        self,
        selected_cvs: &[String],
        weights: &WeightSource,
        bandwidth: BandwidthMethod,
    ) -> Result<Fitted, EngineError> {
        if selected_cvs.is_empty() {
            return Err(EngineError::InvalidInput(
                "at least one collective variable must be selected".to_string(),
            ));
        }
        let samples = self.colvar.select(selected_cvs)?;
        let weights = self.resolve_weights(weights)?;

        let kde = WeightedKde::fit(samples.clone(), weights, bandwidth)?;
        info!(
            frames = kde.len(),
            effective_sample_size = kde.effective_sample_size(),
            factor = kde.factor(),
            "Free-energy surface fitted."
        );
        let fes = FreeEnergySurface::new(kde, self.kbt)?;

        Ok(Fitted {
            loaded: self,
            selected_cvs: selected_cvs.to_vec(),
            samples,
            fes,
        })
    }

    fn resolve_weights(&self, source: &WeightSource) -> Result<Option<DVector<f64>>, EngineError> {
        match source {
            WeightSource::Uniform => {
                if let Some(column) = self
                    .colvar
                    .columns()
                    .iter()
                    .find(|c| c.contains(BIAS_MARKER))
                {
                    warn!(
                        column = %column,
                        "A bias column is present but uniform weights are used for the free-energy surface."
                    );
                }
                Ok(None)
            }
            WeightSource::LogWeightsColumn(name) => {
                let log_weights = self.colvar.column(name)?;
                Ok(Some(from_log_weights(&log_weights)?))
            }
            WeightSource::LogWeights(log_weights) => {
                if log_weights.len() != self.colvar.n_rows() {
                    return Err(EngineError::InvalidInput(format!(
                        "{} log-weights given for {} frames",
                        log_weights.len(),
                        self.colvar.n_rows()
                    )));
                }
                Ok(Some(from_log_weights(log_weights)?))
            }
        }
    }
}

/// A fitted free-energy surface over the selected collective variables.
#[derive(Debug, Clone)]
pub struct Fitted {
    loaded: Loaded,
    selected_cvs: Vec<String>,
    samples: DMatrix<f64>,
    fes: FreeEnergySurface,
}

impl Fitted {
    pub fn fes(&self) -> &FreeEnergySurface {
        &self.fes
    }

    pub fn selected_cvs(&self) -> &[String] {
        &self.selected_cvs
    }

    /// The frames projected on the selected collective variables.
    pub fn samples(&self) -> &DMatrix<f64> {
        &self.samples
    }

    pub fn loaded(&self) -> &Loaded {
        &self.loaded
    }

    pub fn find_minima(
        self,
        bounds: &Bounds,
        config: &MinimizerConfig,
    ) -> Result<MinimaFound, EngineError> {
        let minima = find_local_minima(&self.fes, bounds, config)?;
        for (k, m) in minima.iter().enumerate() {
            info!(
                basin = k,
                position = ?m.position.as_slice(),
                free_energy = m.free_energy,
                "Minimum located."
            );
        }
        Ok(MinimaFound {
            fitted: self,
            minima,
        })
    }
}

/// The minima of a fitted surface, in discovery order.
#[derive(Debug, Clone)]
pub struct MinimaFound {
    fitted: Fitted,
    minima: Vec<Minimum>,
}

impl MinimaFound {
    pub fn fes(&self) -> &FreeEnergySurface {
        self.fitted.fes()
    }

    pub fn minima(&self) -> &[Minimum] {
        &self.minima
    }

    pub fn fitted(&self) -> &Fitted {
        &self.fitted
    }

    pub fn assign_basins(
        self,
        cutoff: f64,
        batching: Batching,
        reporter: &ProgressReporter,
    ) -> Result<BasinsAssigned, EngineError> {
        let labels = basins::assign_basins(
            self.fitted.samples(),
            &self.minima,
            self.fitted.fes(),
            cutoff,
            batching,
            reporter,
        )?;
        Ok(BasinsAssigned {
            found: self,
            labels,
        })
    }
}

/// Every frame labeled with its basin and selection flag.
#[derive(Debug, Clone)]
pub struct BasinsAssigned {
    found: MinimaFound,
    labels: Vec<BasinLabel>,
}

impl BasinsAssigned {
    pub fn fes(&self) -> &FreeEnergySurface {
        self.found.fes()
    }

    pub fn minima(&self) -> &[Minimum] {
        self.found.minima()
    }

    pub fn labels(&self) -> &[BasinLabel] {
        &self.labels
    }

    pub fn selected_cvs(&self) -> &[String] {
        self.found.fitted().selected_cvs()
    }

    /// Frames per basin, optionally counting selected frames only.
    pub fn populations(&self, selected_only: bool) -> Vec<usize> {
        basin_populations(&self.labels, self.minima().len(), selected_only)
    }

    /// Joins collective variables, labels and descriptors into one row-aligned dataset.
    ///
    /// With `only_selected_cvs` the dataset carries just the columns the surface was fitted on.
    pub fn collect_data(&self, only_selected_cvs: bool) -> Result<LabeledDataset, EngineError> {
        let loaded = self.found.fitted().loaded();
        let cvs = if only_selected_cvs {
            loaded.colvar().subset(self.selected_cvs())?
        } else {
            loaded.colvar().clone()
        };
        Ok(LabeledDataset::new(
            cvs,
            self.labels.clone(),
            loaded.descriptors().cloned(),
        )?)
    }
}

/// Runs the whole pipeline: fit, minima search, basin assignment.
#[instrument(skip_all, name = "identify_states", fields(frames = loaded.colvar().n_rows()))]
pub fn identify_states(
    loaded: Loaded,
    config: &IdentifyConfig,
    reporter: &ProgressReporter,
) -> Result<BasinsAssigned, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Density Estimation",
    });
    let fitted = loaded.fit(&config.selected_cvs, &config.weights, config.bandwidth)?;
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Minima Search",
    });
    let found = fitted.find_minima(&config.bounds, &config.minimizer)?;
    reporter.message(format!("{} minima located", found.minima().len()));
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Basin Assignment",
    });
    let assigned = found.assign_basins(
        config.selection.fes_cutoff,
        config.selection.batching,
        reporter,
    )?;
    reporter.report(Progress::PhaseFinish);

    info!(
        minima = assigned.minima().len(),
        selected = assigned.labels().iter().filter(|l| l.selected).count(),
        "State identification complete."
    );
    Ok(assigned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::IdentifyConfigBuilder;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    const CLUSTER_SIZE: usize = 500;
    const CLUSTER_STD: f64 = 0.1;

    fn gaussian(rng: &mut StdRng) -> f64 {
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen_range(0.0..1.0);
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// Cluster A around (0, 0) followed by cluster B around (5, 5).
    fn two_clusters() -> NumericTable {
        let mut rng = StdRng::seed_from_u64(7);
        let mut rows = Vec::with_capacity(2 * CLUSTER_SIZE);
        for (cx, cy) in [(0.0, 0.0), (5.0, 5.0)] {
            for i in 0..CLUSTER_SIZE {
                rows.push(vec![
                    i as f64,
                    cx + CLUSTER_STD * gaussian(&mut rng),
                    cy + CLUSTER_STD * gaussian(&mut rng),
                ]);
            }
        }
        NumericTable::from_rows(vec!["time".into(), "d1".into(), "d2".into()], rows).unwrap()
    }

    fn config() -> IdentifyConfig {
        IdentifyConfigBuilder::new()
            .selected_cvs(["d1", "d2"])
            .bounds(Bounds::new(vec![(-1.0, 6.0), (-1.0, 6.0)]).unwrap())
            .fes_cutoff(5.0)
            .build()
            .unwrap()
    }

    fn run(table: NumericTable) -> BasinsAssigned {
        let loaded = Loaded::new(table, None, 1.0).unwrap();
        identify_states(loaded, &config(), &ProgressReporter::new()).unwrap()
    }

    #[test]
    fn two_gaussian_clusters_yield_two_separated_basins() {
        let result = run(two_clusters());

        let minima = result.minima();
        assert_eq!(minima.len(), 2);
        let near = |m: &Minimum, x: f64, y: f64| {
            ((m.position[0] - x).powi(2) + (m.position[1] - y).powi(2)).sqrt() < 0.5
        };
        let a = minima
            .iter()
            .position(|m| near(m, 0.0, 0.0))
            .expect("no minimum near (0, 0)");
        let b = minima
            .iter()
            .position(|m| near(m, 5.0, 5.0))
            .expect("no minimum near (5, 5)");
        assert_ne!(a, b);

        let labels = result.labels();
        let (cluster_a, cluster_b) = labels.split_at(CLUSTER_SIZE);
        assert!(cluster_a.iter().all(|l| l.basin == a));
        assert!(cluster_b.iter().all(|l| l.basin == b));

        let selected_a = cluster_a.iter().filter(|l| l.selected).count();
        assert!(
            selected_a as f64 >= 0.95 * CLUSTER_SIZE as f64,
            "only {selected_a} of cluster A selected"
        );
    }

    #[test]
    fn identification_is_idempotent() {
        let first = run(two_clusters());
        let second = run(two_clusters());
        assert_eq!(first.minima(), second.minima());
        assert_eq!(first.labels(), second.labels());
    }

    #[test]
    fn every_frame_gets_exactly_one_valid_basin() {
        let result = run(two_clusters());
        assert_eq!(result.labels().len(), 2 * CLUSTER_SIZE);
        assert!(result.labels().iter().all(|l| l.basin < result.minima().len()));
        assert_eq!(result.populations(false).iter().sum::<usize>(), 2 * CLUSTER_SIZE);
    }

    #[test]
    fn chunked_batching_gives_the_same_labels() {
        let loaded = Loaded::new(two_clusters(), None, 1.0).unwrap();
        let found = loaded
            .fit(&config().selected_cvs, &WeightSource::Uniform, BandwidthMethod::Scott)
            .unwrap()
            .find_minima(&config().bounds, &MinimizerConfig::default())
            .unwrap();
        let reporter = ProgressReporter::new();

        let whole = found
            .clone()
            .assign_basins(5.0, Batching::Whole, &reporter)
            .unwrap();
        let chunked = found
            .assign_basins(5.0, Batching::Chunked { splits: 7 }, &reporter)
            .unwrap();
        assert_eq!(whole.labels(), chunked.labels());
    }

    #[test]
    fn log_weight_column_is_used_for_the_fit() {
        let table = two_clusters();
        let n = table.n_rows();
        let mut columns = table.columns().to_vec();
        columns.push("opes.bias".into());
        let rows = (0..n)
            .map(|i| {
                let mut row = table.row(i);
                row.push(if i < CLUSTER_SIZE { 0.0 } else { -1.0 });
                row
            })
            .collect();
        let table = NumericTable::from_rows(columns, rows).unwrap();

        let loaded = Loaded::new(table, None, 1.0).unwrap();
        let fitted = loaded
            .fit(
                &["d1".to_string(), "d2".to_string()],
                &WeightSource::LogWeightsColumn("opes.bias".into()),
                BandwidthMethod::Scott,
            )
            .unwrap();

        let weights = fitted.fes().kde().weights();
        assert_eq!(weights[0], 1.0);
        assert!((weights[n - 1] - (-1.0f64).exp()).abs() < 1e-15);
    }

    #[test]
    fn log_weights_of_wrong_length_are_invalid_input() {
        let loaded = Loaded::new(two_clusters(), None, 1.0).unwrap();
        let result = loaded.fit(
            &["d1".to_string()],
            &WeightSource::LogWeights(vec![0.0; 3]),
            BandwidthMethod::Scott,
        );
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn unknown_cv_is_a_table_error() {
        let loaded = Loaded::new(two_clusters(), None, 1.0).unwrap();
        let result = loaded.fit(
            &["psi".to_string()],
            &WeightSource::Uniform,
            BandwidthMethod::Scott,
        );
        assert!(matches!(result, Err(EngineError::Table { .. })));
    }

    #[test]
    fn descriptor_row_mismatch_violates_a_precondition() {
        let descriptors = NumericTable::from_rows(vec!["phi".into()], vec![vec![0.0]; 3]).unwrap();
        assert!(matches!(
            Loaded::new(two_clusters(), Some(descriptors), 1.0),
            Err(EngineError::Precondition(_))
        ));
    }

    #[test]
    fn non_positive_temperature_is_rejected() {
        assert!(matches!(
            Loaded::new(two_clusters(), None, 0.0),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn descriptor_time_column_is_dropped_and_stride_applies_to_both_tables() {
        let n = 2 * CLUSTER_SIZE;
        let descriptors = NumericTable::from_rows(
            vec!["time".into(), "phi".into()],
            (0..n).map(|i| vec![i as f64, -(i as f64)]).collect(),
        )
        .unwrap();

        let loaded = Loaded::new(two_clusters(), Some(descriptors), 1.0)
            .unwrap()
            .with_stride(10)
            .unwrap();

        let descriptors = loaded.descriptors().unwrap();
        assert_eq!(descriptors.columns(), &["phi"]);
        assert_eq!(descriptors.n_rows(), n / 10);
        assert_eq!(loaded.colvar().n_rows(), n / 10);
        assert_eq!(descriptors.column("phi").unwrap()[1], -10.0);
    }

    #[test]
    fn zero_stride_is_rejected() {
        let loaded = Loaded::new(two_clusters(), None, 1.0).unwrap();
        assert!(matches!(loaded.with_stride(0), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn collect_data_joins_cvs_labels_and_descriptors() {
        let n = 2 * CLUSTER_SIZE;
        let descriptors =
            NumericTable::from_rows(vec!["phi".into()], vec![vec![1.0]; n]).unwrap();
        let loaded = Loaded::new(two_clusters(), Some(descriptors), 1.0).unwrap();
        let result = identify_states(loaded, &config(), &ProgressReporter::new()).unwrap();

        let full = result.collect_data(false).unwrap();
        assert_eq!(full.header(), vec!["time", "d1", "d2", "basin", "selection", "phi"]);
        assert_eq!(full.len(), n);

        let reduced = result.collect_data(true).unwrap();
        assert_eq!(reduced.header(), vec!["d1", "d2", "basin", "selection", "phi"]);
        assert_eq!(reduced.labels(), result.labels());
    }
}
