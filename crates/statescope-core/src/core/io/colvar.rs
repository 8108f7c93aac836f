use super::traits::{TableFile, TableFileError};
use crate::core::models::table::NumericTable;
use std::io::{BufRead, Write};

const DIRECTIVE: &str = "#!";
const FIELDS: &str = "FIELDS";

/// PLUMED COLVAR text files.
///
/// The column names come from the `#! FIELDS` line. Other `#!` directives (`SET`, repeated
/// headers after a restart) and `#` comments are ignored, as are blank lines.
pub struct ColvarFile;

impl TableFile for ColvarFile {
    fn read_from(reader: &mut impl BufRead) -> Result<NumericTable, TableFileError> {
        let mut columns: Option<Vec<String>> = None;
        let mut rows: Vec<Vec<f64>> = Vec::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_no = line_num + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(directive) = trimmed.strip_prefix(DIRECTIVE) {
                let mut tokens = directive.split_whitespace();
                if tokens.next() == Some(FIELDS) && columns.is_none() {
                    let names: Vec<String> = tokens.map(str::to_string).collect();
                    if names.is_empty() {
                        return Err(TableFileError::MissingHeader(format!(
                            "FIELDS directive on line {line_no} names no columns"
                        )));
                    }
                    columns = Some(names);
                }
                continue;
            }
            if trimmed.starts_with('#') {
                continue;
            }

            let Some(names) = columns.as_ref() else {
                return Err(TableFileError::MissingHeader(format!(
                    "data on line {line_no} appears before the '#! FIELDS' line"
                )));
            };

            let row = trimmed
                .split_whitespace()
                .map(|token| {
                    token.parse::<f64>().map_err(|_| TableFileError::Parse {
                        line: line_no,
                        message: format!("invalid number '{token}'"),
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            if row.len() != names.len() {
                return Err(TableFileError::RaggedRow {
                    line: line_no,
                    expected: names.len(),
                    found: row.len(),
                });
            }
            rows.push(row);
        }

        let columns = columns.ok_or_else(|| {
            TableFileError::MissingHeader("no '#! FIELDS' line found".to_string())
        })?;
        if rows.is_empty() {
            return Err(TableFileError::Empty);
        }
        Ok(NumericTable::from_rows(columns, rows)?)
    }

    fn write_to(table: &NumericTable, writer: &mut impl Write) -> Result<(), TableFileError> {
        writeln!(writer, "{DIRECTIVE} {FIELDS} {}", table.columns().join(" "))?;
        for i in 0..table.n_rows() {
            let line = table
                .row(i)
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(writer, "{line}")?;
        }
        Ok(())
    }
}
