use crate::utils::parser;
use clap::{Args, Parser, Subcommand};
use statescope::core::density::bandwidth::BandwidthMethod;
use statescope::engine::config::MinimizerStrategy;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "statescope - Identify metastable states from collective-variable time series through weighted KDE free-energy surfaces.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find free-energy basins and label every frame with its basin and selection flag.
    Identify(IdentifyArgs),
    /// Export the free-energy surface over one or two collective variables on a grid.
    Fes(FesArgs),
}

/// Options shared by every command that fits a free-energy surface.
#[derive(Args, Debug, Clone)]
pub struct SurfaceArgs {
    /// Path to the collective-variable table (PLUMED COLVAR, or CSV when the extension is .csv).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path to a TOML configuration file.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Collective variables spanning the free-energy surface, comma separated.
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub cvs: Vec<String>,

    /// Range of one collective variable, given once per selected CV in the same order.
    /// Defaults to the data range padded by 10%.
    #[arg(
        long,
        value_name = "MIN:MAX",
        value_parser = parser::parse_range,
        allow_hyphen_values = true
    )]
    pub bounds: Vec<(f64, f64)>,

    /// Thermal energy kT in the units of the reported free energies.
    #[arg(long, value_name = "FLOAT")]
    pub kbt: Option<f64>,

    /// Keep only every N-th frame.
    #[arg(long, value_name = "INT")]
    pub stride: Option<usize>,

    /// Column holding per-frame log-weights for reweighting biased simulations.
    #[arg(long, value_name = "COLUMN")]
    pub logweights: Option<String>,

    /// Bandwidth rule: 'scott', 'silverman' or a fixed factor.
    #[arg(long, value_name = "METHOD")]
    pub bandwidth: Option<BandwidthMethod>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S minimizer.grid-points=40
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `identify` subcommand.
#[derive(Args, Debug)]
pub struct IdentifyArgs {
    #[command(flatten)]
    pub surface: SurfaceArgs,

    /// Optional descriptor table aligned frame by frame with the input.
    #[arg(short, long, value_name = "PATH")]
    pub descriptors: Option<PathBuf>,

    /// Path for the labeled output dataset (CSV).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Frames more than this far above their basin minimum are not selected.
    #[arg(long, value_name = "FLOAT")]
    pub fes_cutoff: Option<f64>,

    /// Strategy for seeding the minima search.
    #[arg(long, value_name = "STRATEGY")]
    pub optimizer: Option<MinimizerStrategy>,

    /// Evaluate frame free energies in chunks to bound memory use.
    #[arg(long)]
    pub memory_saver: bool,

    /// Number of chunks used with --memory-saver.
    #[arg(long, value_name = "INT")]
    pub splits: Option<usize>,

    /// Write only the selected collective variables instead of every input column.
    #[arg(long)]
    pub only_selected_cvs: bool,
}

/// Arguments for the `fes` subcommand.
#[derive(Args, Debug)]
pub struct FesArgs {
    #[command(flatten)]
    pub surface: SurfaceArgs,

    /// Path for the exported grid (CSV).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Grid points per dimension.
    #[arg(long, value_name = "INT")]
    pub grid_points: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_arguments_parse() {
        let cli = Cli::parse_from([
            "statescope",
            "-vv",
            "identify",
            "-i",
            "COLVAR",
            "-o",
            "out.csv",
            "--cvs",
            "d1,d2",
            "--bounds",
            "-1:6",
            "--bounds",
            "-1:6",
            "--bandwidth",
            "silverman",
            "--optimizer",
            "random-restarts",
            "--memory-saver",
            "--splits",
            "10",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Identify(args) = cli.command else {
            panic!("Expected 'identify' subcommand");
        };
        assert_eq!(args.surface.cvs, vec!["d1", "d2"]);
        assert_eq!(args.surface.bounds, vec![(-1.0, 6.0), (-1.0, 6.0)]);
        assert_eq!(args.surface.bandwidth, Some(BandwidthMethod::Silverman));
        assert_eq!(args.optimizer, Some(MinimizerStrategy::RandomRestarts));
        assert!(args.memory_saver);
        assert_eq!(args.splits, Some(10));
    }

    #[test]
    fn malformed_bounds_are_rejected_by_the_parser() {
        let result = Cli::try_parse_from([
            "statescope", "fes", "-i", "COLVAR", "-o", "fes.csv", "--bounds", "1-2",
        ]);
        assert!(result.is_err());
    }
}
