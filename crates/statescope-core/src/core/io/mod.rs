//! Reading and writing numeric tables.
//!
//! Collective variables and descriptors arrive either as PLUMED COLVAR files or as plain CSV.
//! Both formats implement [`traits::TableFile`]; [`read_table`] picks one from the file
//! extension. The labeled output dataset and exported free-energy grids are always CSV.

pub mod colvar;
pub mod delimited;
pub mod traits;

use crate::core::models::table::NumericTable;
use colvar::ColvarFile;
use delimited::CsvFile;
use std::path::Path;
use traits::{TableFile, TableFileError};

/// Reads `path` as CSV when its extension is `.csv` (any case), otherwise as COLVAR.
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<NumericTable, TableFileError> {
    let path = path.as_ref();
    if is_csv(path) {
        CsvFile::read_from_path(path)
    } else {
        ColvarFile::read_from_path(path)
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}
