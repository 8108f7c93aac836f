pub mod fes;
pub mod identify;

use crate::error::{CliError, Result};
use statescope::core::io::read_table;
use statescope::core::models::table::NumericTable;
use std::path::Path;
use tracing::info;

fn read_input(path: &Path) -> Result<NumericTable> {
    let table = read_table(path).map_err(|source| CliError::TableRead {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        rows = table.n_rows(),
        columns = table.n_cols(),
        "Table loaded."
    );
    Ok(table)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::fmt::Write as _;
    use std::path::Path;

    /// A CSV with two one-dimensional clusters in `d1`, centred at 0 and 5, plus a
    /// `d2` column and a time column.
    pub fn write_two_cluster_csv(path: &Path) {
        let mut text = String::from("time,d1,d2\n");
        let mut t = 0;
        for centre in [0.0, 5.0] {
            for k in 0..21 {
                let d1 = centre - 0.2 + 0.02 * k as f64;
                writeln!(text, "{t},{d1},{}", 0.1 * (k % 3) as f64).unwrap();
                t += 1;
            }
        }
        std::fs::write(path, text).unwrap();
    }
}
