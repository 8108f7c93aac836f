use statescope::core::density::bandwidth::BandwidthMethod;

pub struct DefaultsConfig {
    pub kbt: f64,
    pub stride: usize,
    pub bandwidth: BandwidthMethod,
    pub fes_cutoff: f64,
    pub memory_saver: bool,
    pub splits: usize,
    pub export_grid_points: usize,
    /// Fraction of the data range added on each side when bounds are derived from the data.
    pub bounds_padding: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            kbt: 2.5,
            stride: 1,
            bandwidth: BandwidthMethod::Scott,
            fes_cutoff: 5.0,
            memory_saver: false,
            splits: 50,
            export_grid_points: 100,
            bounds_padding: 0.1,
        }
    }
}
