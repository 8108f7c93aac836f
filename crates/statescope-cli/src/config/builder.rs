use super::defaults::DefaultsConfig;
use super::file::{FileBandwidth, FileConfig, FileMinimizerConfig};
use super::models::{FesAppConfig, IdentifyAppConfig, SurfaceSettings};
use crate::cli::{FesArgs, IdentifyArgs, SurfaceArgs};
use crate::error::{CliError, Result};
use statescope::core::density::bandwidth::BandwidthMethod;
use statescope::core::models::bounds::Bounds;
use statescope::core::models::table::NumericTable;
use statescope::engine::config::{
    Batching, IdentifyConfigBuilder, MinimizerConfig, WeightSource,
};
use std::str::FromStr;
use tracing::{debug, info};

pub fn build_identify_config(
    args: &IdentifyArgs,
    colvar: &NumericTable,
) -> Result<IdentifyAppConfig> {
    let defaults = DefaultsConfig::default();
    let mut file_config = load_file_config(&args.surface)?;
    let surface = resolve_surface(&args.surface, &mut file_config, colvar, &defaults)?;

    let mut minimizer = merge_minimizer(file_config.minimizer.take().unwrap_or_default());
    if let Some(strategy) = args.optimizer {
        minimizer.strategy = strategy;
    }

    let selection_file = file_config.selection.take().unwrap_or_default();
    let fes_cutoff = args
        .fes_cutoff
        .or(selection_file.fes_cutoff)
        .unwrap_or(defaults.fes_cutoff);
    let memory_saver = args.memory_saver
        || selection_file
            .memory_saver
            .unwrap_or(defaults.memory_saver);
    let splits = args
        .splits
        .or(selection_file.splits)
        .unwrap_or(defaults.splits);

    let core_config = IdentifyConfigBuilder::new()
        .selected_cvs(surface.cvs)
        .bounds(surface.bounds)
        .weights(surface.weights)
        .bandwidth(surface.bandwidth)
        .minimizer(minimizer)
        .fes_cutoff(fes_cutoff)
        .batching(Batching::from_memory_saver(memory_saver, splits))
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(IdentifyAppConfig {
        kbt: surface.kbt,
        stride: surface.stride,
        only_selected_cvs: args.only_selected_cvs,
        core_config,
    })
}

pub fn build_fes_config(args: &FesArgs, colvar: &NumericTable) -> Result<FesAppConfig> {
    let defaults = DefaultsConfig::default();
    let mut file_config = load_file_config(&args.surface)?;
    let grid_points = args
        .grid_points
        .or(file_config.fes.as_ref().and_then(|f| f.grid_points))
        .unwrap_or(defaults.export_grid_points);
    let surface = resolve_surface(&args.surface, &mut file_config, colvar, &defaults)?;

    Ok(FesAppConfig {
        surface,
        grid_points,
    })
}

fn load_file_config(args: &SurfaceArgs) -> Result<FileConfig> {
    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };
    apply_set_values(file_config, &args.set_values)
}

fn resolve_surface(
    args: &SurfaceArgs,
    file_config: &mut FileConfig,
    colvar: &NumericTable,
    defaults: &DefaultsConfig,
) -> Result<SurfaceSettings> {
    let cvs = if !args.cvs.is_empty() {
        args.cvs.clone()
    } else {
        file_config.cvs.take().unwrap_or_default()
    };
    if cvs.is_empty() {
        return Err(CliError::Config(
            "no collective variables selected; pass --cvs or set `cvs` in the configuration file"
                .to_string(),
        ));
    }

    let ranges = if !args.bounds.is_empty() {
        args.bounds.clone()
    } else if let Some(bounds) = file_config.bounds.take() {
        bounds.into_iter().map(|[lo, hi]| (lo, hi)).collect()
    } else {
        data_ranges(colvar, &cvs, defaults.bounds_padding)?
    };
    if ranges.len() != cvs.len() {
        return Err(CliError::Config(format!(
            "{} bounds given for {} collective variables",
            ranges.len(),
            cvs.len()
        )));
    }
    let bounds = Bounds::new(ranges).map_err(|e| CliError::Config(e.to_string()))?;

    let fes_file = file_config.fes.take().unwrap_or_default();
    let kbt = args.kbt.or(fes_file.kbt).unwrap_or(defaults.kbt);
    let bandwidth = match (args.bandwidth, fes_file.bandwidth) {
        (Some(method), _) => method,
        (None, Some(file_value)) => BandwidthMethod::try_from(file_value)?,
        (None, None) => defaults.bandwidth,
    };
    let stride = args
        .stride
        .or(file_config.stride)
        .unwrap_or(defaults.stride);
    let weights = match args.logweights.clone().or(file_config.logweights.take()) {
        Some(column) => WeightSource::LogWeightsColumn(column),
        None => WeightSource::Uniform,
    };

    debug!(?cvs, ?bounds, kbt, stride, %bandwidth, "Resolved surface settings.");
    Ok(SurfaceSettings {
        kbt,
        stride,
        cvs,
        bounds,
        weights,
        bandwidth,
    })
}

/// Per-column data extent, widened by `padding` times its width on both sides.
fn data_ranges(colvar: &NumericTable, cvs: &[String], padding: f64) -> Result<Vec<(f64, f64)>> {
    cvs.iter()
        .map(|name| {
            let values = colvar
                .column(name)
                .map_err(|e| CliError::Config(e.to_string()))?;
            let (lo, hi) = values
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
            if !(lo.is_finite() && hi.is_finite() && hi > lo) {
                return Err(CliError::Config(format!(
                    "cannot derive bounds for '{name}' from its data; pass --bounds"
                )));
            }
            let margin = padding * (hi - lo);
            info!(cv = %name, min = lo - margin, max = hi + margin, "Bounds derived from data.");
            Ok((lo - margin, hi + margin))
        })
        .collect()
}

fn merge_minimizer(file_val: FileMinimizerConfig) -> MinimizerConfig {
    let defaults = MinimizerConfig::default();
    MinimizerConfig {
        strategy: file_val.strategy.unwrap_or(defaults.strategy),
        grid_points: file_val.grid_points.unwrap_or(defaults.grid_points),
        tolerance: file_val.tolerance.unwrap_or(defaults.tolerance),
        max_iterations: file_val.max_iterations.unwrap_or(defaults.max_iterations),
        restarts: file_val.restarts.unwrap_or(defaults.restarts),
        seed: file_val.seed.unwrap_or(defaults.seed),
        merge_tolerance: file_val.merge_tolerance.unwrap_or(defaults.merge_tolerance),
        max_candidates: file_val.max_candidates.or(defaults.max_candidates),
        keep_boundary_minima: file_val
            .keep_boundary_minima
            .unwrap_or(defaults.keep_boundary_minima),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {kind} value for {key}: {value}")))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{kv_pair}'. Expected KEY=VALUE."
            )));
        };

        match key {
            "cvs" => {
                config.cvs = Some(
                    value_str
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect(),
                );
            }
            "stride" => config.stride = Some(parse_value(key, value_str, "integer")?),
            "logweights" => config.logweights = Some(value_str.trim().to_string()),
            "fes.kbt" => {
                config.fes.get_or_insert_with(Default::default).kbt =
                    Some(parse_value(key, value_str, "float")?);
            }
            "fes.bandwidth" => {
                let bandwidth = match value_str.trim().parse::<f64>() {
                    Ok(factor) => FileBandwidth::Factor(factor),
                    Err(_) => FileBandwidth::Rule(value_str.trim().to_string()),
                };
                config.fes.get_or_insert_with(Default::default).bandwidth = Some(bandwidth);
            }
            "fes.grid-points" => {
                config.fes.get_or_insert_with(Default::default).grid_points =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "minimizer.strategy" => {
                config.minimizer.get_or_insert_with(Default::default).strategy = Some(
                    value_str
                        .parse()
                        .map_err(|e| CliError::Config(format!("{key}: {e}")))?,
                );
            }
            "minimizer.grid-points" => {
                config.minimizer.get_or_insert_with(Default::default).grid_points =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "minimizer.tolerance" => {
                config.minimizer.get_or_insert_with(Default::default).tolerance =
                    Some(parse_value(key, value_str, "float")?);
            }
            "minimizer.max-iterations" => {
                config.minimizer.get_or_insert_with(Default::default).max_iterations =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "minimizer.restarts" => {
                config.minimizer.get_or_insert_with(Default::default).restarts =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "minimizer.seed" => {
                config.minimizer.get_or_insert_with(Default::default).seed =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "minimizer.merge-tolerance" => {
                config.minimizer.get_or_insert_with(Default::default).merge_tolerance =
                    Some(parse_value(key, value_str, "float")?);
            }
            "minimizer.max-candidates" => {
                config.minimizer.get_or_insert_with(Default::default).max_candidates =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "minimizer.keep-boundary-minima" => {
                config
                    .minimizer
                    .get_or_insert_with(Default::default)
                    .keep_boundary_minima = Some(parse_value(key, value_str, "boolean")?);
            }
            "selection.fes-cutoff" => {
                config.selection.get_or_insert_with(Default::default).fes_cutoff =
                    Some(parse_value(key, value_str, "float")?);
            }
            "selection.memory-saver" => {
                config.selection.get_or_insert_with(Default::default).memory_saver =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "selection.splits" => {
                config.selection.get_or_insert_with(Default::default).splits =
                    Some(parse_value(key, value_str, "integer")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{key}'"
                )));
            }
        }
    }
    Ok(config)
}
