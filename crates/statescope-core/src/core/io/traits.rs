use crate::core::models::table::{NumericTable, TableError};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableFileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Missing header: {0}")]
    MissingHeader(String),
    #[error("Row on line {line} has {found} values, expected {expected}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("File contains no data rows")]
    Empty,
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Reads and writes a [`NumericTable`] in one text format.
///
/// Implementors only provide the reader/writer pair; path-based helpers open and buffer the
/// file for them.
pub trait TableFile {
    fn read_from(reader: &mut impl BufRead) -> Result<NumericTable, TableFileError>;

    fn write_to(table: &NumericTable, writer: &mut impl Write) -> Result<(), TableFileError>;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<NumericTable, TableFileError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    fn write_to_path<P: AsRef<Path>>(
        table: &NumericTable,
        path: P,
    ) -> Result<(), TableFileError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(table, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
