use super::read_input;
use crate::cli::FesArgs;
use crate::config::build_fes_config;
use crate::error::{CliError, Result};
use statescope::engine::error::EngineError;
use statescope::workflows::identify::Loaded;
use tracing::info;

pub fn run(args: FesArgs, quiet: bool) -> Result<()> {
    let colvar = read_input(&args.surface.input)?;
    let config = build_fes_config(&args, &colvar)?;
    let surface = &config.surface;

    let fitted = Loaded::new(colvar, None, surface.kbt)?
        .with_stride(surface.stride)?
        .fit(&surface.cvs, &surface.weights, surface.bandwidth)?;

    let grid = fitted
        .fes()
        .on_grid(&surface.bounds, config.grid_points)
        .map_err(EngineError::from)?;
    grid.write_csv_path(&surface.cvs, &args.output)
        .map_err(|source| CliError::TableWrite {
            path: args.output.clone(),
            source,
        })?;
    info!(
        path = %args.output.display(),
        nodes = grid.values.len(),
        "Free-energy grid written."
    );

    if !quiet {
        if let Some(min) = grid.min_value() {
            println!(
                "Free-energy surface over [{}] on a {} grid, lowest value {min:.3}.",
                surface.cvs.join(", "),
                grid.shape()
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join("x")
            );
        }
    }
    Ok(())
}
