mod builder;
mod defaults;
mod file;
mod models;

pub use builder::{build_fes_config, build_identify_config};
