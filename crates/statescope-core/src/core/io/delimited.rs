use super::traits::{TableFile, TableFileError};
use crate::core::fes::FesGrid;
use crate::core::models::dataset::LabeledDataset;
use crate::core::models::table::NumericTable;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

/// Column holding the free energy in exported grids.
pub const FREE_ENERGY_COLUMN: &str = "free_energy";

/// Comma-separated tables with a single header row.
pub struct CsvFile;

impl TableFile for CsvFile {
    fn read_from(reader: &mut impl BufRead) -> Result<NumericTable, TableFileError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        if columns.iter().all(String::is_empty) {
            return Err(TableFileError::MissingHeader(
                "the first row of a CSV table must name its columns".to_string(),
            ));
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let line = record.position().map_or(0, |p| p.line() as usize);
            if record.len() != columns.len() {
                return Err(TableFileError::RaggedRow {
                    line,
                    expected: columns.len(),
                    found: record.len(),
                });
            }
            let row = record
                .iter()
                .map(|field| {
                    field.parse::<f64>().map_err(|_| TableFileError::Parse {
                        line,
                        message: format!("invalid number '{field}'"),
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(TableFileError::Empty);
        }
        Ok(NumericTable::from_rows(columns, rows)?)
    }

    fn write_to(table: &NumericTable, writer: &mut impl Write) -> Result<(), TableFileError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(table.columns())?;
        for i in 0..table.n_rows() {
            csv_writer.write_record(table.row(i).iter().map(|v| v.to_string()))?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

impl LabeledDataset {
    /// Writes the dataset as CSV: CV columns, `basin`, `selection`, then descriptor columns.
    pub fn write_csv(&self, writer: &mut impl Write) -> Result<(), TableFileError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.header())?;
        for i in 0..self.len() {
            csv_writer.write_record(self.record(i))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_csv_path<P: AsRef<Path>>(&self, path: P) -> Result<(), TableFileError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_csv(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl FesGrid {
    /// Writes one row per grid node: the coordinates under `names`, then `free_energy`.
    ///
    /// Axes without a name fall back to `x0`, `x1`, ...
    pub fn write_csv<S: AsRef<str>>(
        &self,
        names: &[S],
        writer: &mut impl Write,
    ) -> Result<(), TableFileError> {
        let mut header: Vec<String> = (0..self.dim())
            .map(|d| {
                names
                    .get(d)
                    .map_or_else(|| format!("x{d}"), |n| n.as_ref().to_string())
            })
            .collect();
        header.push(FREE_ENERGY_COLUMN.to_string());

        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&header)?;
        for (coords, value) in self.nodes() {
            csv_writer.write_record(
                coords
                    .iter()
                    .chain(std::iter::once(&value))
                    .map(|v| v.to_string()),
            )?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_csv_path<S: AsRef<str>, P: AsRef<Path>>(
        &self,
        names: &[S],
        path: P,
    ) -> Result<(), TableFileError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_csv(names, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::labels::BasinLabel;
    use std::io::Cursor;

    fn read(text: &str) -> Result<NumericTable, TableFileError> {
        CsvFile::read_from(&mut Cursor::new(text.as_bytes()))
    }

    #[test]
    fn reads_header_and_trims_fields() {
        let table = read("a, b\n1.0, 2.0\n3.0,4.0\n").unwrap();
        assert_eq!(table.columns(), &["a", "b"]);
        assert_eq!(table.column("b").unwrap(), vec![2.0, 4.0]);
    }

    #[test]
    fn ragged_row_is_rejected() {
        assert!(matches!(
            read("a,b\n1,2\n3\n"),
            Err(TableFileError::RaggedRow {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn non_numeric_field_is_rejected() {
        assert!(matches!(
            read("a,b\n1,x\n"),
            Err(TableFileError::Parse { .. })
        ));
    }

    #[test]
    fn header_only_is_empty() {
        assert!(matches!(read("a,b\n"), Err(TableFileError::Empty)));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        assert!(matches!(
            read("a,a\n1,2\n"),
            Err(TableFileError::Table(_))
        ));
    }

    #[test]
    fn table_written_to_disk_reads_back_identically() {
        let table = read("time,d1\n0,0.125\n1,-3.5\n").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        CsvFile::write_to_path(&table, &path).unwrap();
        assert_eq!(CsvFile::read_from_path(&path).unwrap(), table);
    }

    #[test]
    fn labeled_dataset_is_written_with_flat_header() {
        let cvs = NumericTable::from_rows(
            vec!["d1".into()],
            vec![vec![0.5], vec![1.5]],
        )
        .unwrap();
        let dataset = LabeledDataset::new(
            cvs,
            vec![BasinLabel::new(0, true), BasinLabel::new(1, false)],
            None,
        )
        .unwrap();

        let mut out = Vec::new();
        dataset.write_csv(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "d1,basin,selection\n0.5,0,true\n1.5,1,false\n"
        );
    }

    #[test]
    fn fes_grid_is_written_one_row_per_node() {
        let grid = FesGrid {
            axes: vec![vec![0.0, 1.0]],
            values: vec![2.0, 0.5],
        };
        let mut out = Vec::new();
        grid.write_csv(&["phi"], &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "phi,free_energy\n0,2\n1,0.5\n"
        );
    }

    #[test]
    fn fes_grid_falls_back_to_positional_names() {
        let grid = FesGrid {
            axes: vec![vec![0.0], vec![1.0]],
            values: vec![3.0],
        };
        let mut out = Vec::new();
        grid.write_csv::<&str>(&[], &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("x0,x1,free_energy\n"));
    }
}
