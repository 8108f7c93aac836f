use super::read_input;
use crate::cli::IdentifyArgs;
use crate::config::build_identify_config;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use statescope::engine::progress::ProgressReporter;
use statescope::workflows::identify::{BasinsAssigned, Loaded, identify_states};
use tracing::info;

pub fn run(args: IdentifyArgs, quiet: bool) -> Result<()> {
    let colvar = read_input(&args.surface.input)?;
    let descriptors = args.descriptors.as_deref().map(read_input).transpose()?;

    let config = build_identify_config(&args, &colvar)?;
    info!(
        cvs = ?config.core_config.selected_cvs,
        kbt = config.kbt,
        stride = config.stride,
        strategy = %config.core_config.minimizer.strategy,
        "Configuration resolved."
    );

    let loaded = Loaded::new(colvar, descriptors, config.kbt)?.with_stride(config.stride)?;

    let handler = if quiet {
        CliProgressHandler::hidden()
    } else {
        CliProgressHandler::new()
    };
    let reporter = ProgressReporter::with_callback(handler.get_callback());

    let assigned = identify_states(loaded, &config.core_config, &reporter)?;

    let dataset = assigned.collect_data(config.only_selected_cvs)?;
    dataset
        .write_csv_path(&args.output)
        .map_err(|source| CliError::TableWrite {
            path: args.output.clone(),
            source,
        })?;
    info!(path = %args.output.display(), rows = dataset.len(), "Labeled dataset written.");

    if !quiet {
        print_summary(&assigned);
    }
    Ok(())
}

fn print_summary(assigned: &BasinsAssigned) {
    let all = assigned.populations(false);
    let selected = assigned.populations(true);

    println!(
        "Found {} basins over [{}]:",
        assigned.minima().len(),
        assigned.selected_cvs().join(", ")
    );
    for (i, minimum) in assigned.minima().iter().enumerate() {
        let position: Vec<String> = minimum.position.iter().map(|v| format!("{v:.3}")).collect();
        println!(
            "  basin {i}: ({})  F = {:.3}  frames = {}  selected = {}",
            position.join(", "),
            minimum.free_energy,
            all[i],
            selected[i]
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SurfaceArgs;
    use crate::commands::test_support::write_two_cluster_csv;
    use std::collections::BTreeSet;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn args(input: PathBuf, output: PathBuf) -> IdentifyArgs {
        IdentifyArgs {
            surface: SurfaceArgs {
                input,
                config: None,
                cvs: vec!["d1".to_string()],
                bounds: vec![],
                kbt: Some(1.0),
                stride: None,
                logweights: None,
                bandwidth: None,
                set_values: vec![],
            },
            descriptors: None,
            output,
            fes_cutoff: None,
            optimizer: None,
            memory_saver: true,
            splits: Some(4),
            only_selected_cvs: false,
        }
    }

    fn read_output(path: &std::path::Path) -> (Vec<String>, Vec<Vec<String>>) {
        let text = std::fs::read_to_string(path).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap().split(',').map(String::from).collect();
        let rows = lines
            .map(|l| l.split(',').map(String::from).collect())
            .collect();
        (header, rows)
    }

    #[test]
    fn labels_every_frame_of_a_two_cluster_trajectory() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("colvar.csv");
        let output = dir.path().join("labeled.csv");
        write_two_cluster_csv(&input);

        run(args(input, output.clone()), true).expect("identify succeeds");

        let (header, rows) = read_output(&output);
        assert_eq!(header, vec!["time", "d1", "d2", "basin", "selection"]);
        assert_eq!(rows.len(), 42);

        let basins: BTreeSet<&str> = rows.iter().map(|r| r[3].as_str()).collect();
        assert_eq!(basins.len(), 2);
        let first = &rows[0][3];
        for row in &rows {
            let d1: f64 = row[1].parse().unwrap();
            assert_eq!(&row[3] == first, d1 < 2.5, "frame at d1 = {d1}");
        }
    }

    #[test]
    fn only_selected_cvs_drops_other_columns() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("colvar.csv");
        let output = dir.path().join("labeled.csv");
        write_two_cluster_csv(&input);

        let mut args = args(input, output.clone());
        args.only_selected_cvs = true;
        args.surface.stride = Some(2);
        run(args, true).expect("identify succeeds");

        let (header, rows) = read_output(&output);
        assert_eq!(header, vec!["d1", "basin", "selection"]);
        assert_eq!(rows.len(), 21);
    }

    #[test]
    fn missing_input_reports_the_path() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("missing.csv");
        let result = run(args(input.clone(), dir.path().join("out.csv")), true);

        match result {
            Err(CliError::TableRead { path, .. }) => assert_eq!(path, input),
            other => panic!("expected TableRead error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_cv_is_an_engine_error() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("colvar.csv");
        write_two_cluster_csv(&input);

        let mut args = args(input, dir.path().join("out.csv"));
        args.surface.cvs = vec!["rmsd".to_string()];
        args.surface.bounds = vec![(0.0, 1.0)];

        assert!(matches!(run(args, true), Err(CliError::Engine(_))));
    }
}
