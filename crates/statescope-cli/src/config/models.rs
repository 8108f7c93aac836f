use statescope::core::density::bandwidth::BandwidthMethod;
use statescope::core::models::bounds::Bounds;
use statescope::engine::config::{IdentifyConfig, WeightSource};

/// Settings every command needs to fit a free-energy surface.
#[derive(Debug, Clone)]
pub struct SurfaceSettings {
    pub kbt: f64,
    pub stride: usize,
    pub cvs: Vec<String>,
    pub bounds: Bounds,
    pub weights: WeightSource,
    pub bandwidth: BandwidthMethod,
}

pub struct IdentifyAppConfig {
    pub kbt: f64,
    pub stride: usize,
    pub only_selected_cvs: bool,
    pub core_config: IdentifyConfig,
}

pub struct FesAppConfig {
    pub surface: SurfaceSettings,
    pub grid_points: usize,
}
