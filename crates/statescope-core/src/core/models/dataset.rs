use super::labels::BasinLabel;
use super::table::{NumericTable, TableError};

pub const BASIN_COLUMN: &str = "basin";
pub const SELECTION_COLUMN: &str = "selection";

/// The final, row-aligned output of state identification.
///
/// Rows follow the frame order of the collective-variable table. Non-selected frames are
/// kept; consumers filter on [`BasinLabel::selected`] themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledDataset {
    cvs: NumericTable,
    labels: Vec<BasinLabel>,
    descriptors: Option<NumericTable>,
}

impl LabeledDataset {
    pub fn new(
        cvs: NumericTable,
        labels: Vec<BasinLabel>,
        descriptors: Option<NumericTable>,
    ) -> Result<Self, TableError> {
        if labels.len() != cvs.n_rows() {
            return Err(TableError::RowCountMismatch {
                expected: cvs.n_rows(),
                found: labels.len(),
            });
        }
        if let Some(d) = &descriptors {
            if d.n_rows() != cvs.n_rows() {
                return Err(TableError::RowCountMismatch {
                    expected: cvs.n_rows(),
                    found: d.n_rows(),
                });
            }
        }
        Ok(Self {
            cvs,
            labels,
            descriptors,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn cvs(&self) -> &NumericTable {
        &self.cvs
    }

    pub fn labels(&self) -> &[BasinLabel] {
        &self.labels
    }

    pub fn descriptors(&self) -> Option<&NumericTable> {
        self.descriptors.as_ref()
    }

    /// Flat column names: CVs, then `basin` and `selection`, then descriptors.
    pub fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = self.cvs.columns().to_vec();
        header.push(BASIN_COLUMN.to_string());
        header.push(SELECTION_COLUMN.to_string());
        if let Some(d) = &self.descriptors {
            header.extend(d.columns().iter().cloned());
        }
        header
    }

    /// Row `i` rendered as text, in [`header`](Self::header) order.
    pub fn record(&self, i: usize) -> Vec<String> {
        let mut record: Vec<String> = self.cvs.row(i).iter().map(|v| v.to_string()).collect();
        let label = self.labels[i];
        record.push(label.basin.to_string());
        record.push(label.selected.to_string());
        if let Some(d) = &self.descriptors {
            record.extend(d.row(i).iter().map(|v| v.to_string()));
        }
        record
    }

    /// Keeps only the rows flagged as selected.
    pub fn selected_only(&self) -> Self {
        let rows: Vec<usize> = self
            .labels
            .iter()
            .enumerate()
            .filter_map(|(i, l)| l.selected.then_some(i))
            .collect();
        Self {
            cvs: self.cvs.take_rows(&rows),
            labels: rows.iter().map(|&i| self.labels[i]).collect(),
            descriptors: self.descriptors.as_ref().map(|d| d.take_rows(&rows)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cvs() -> NumericTable {
        NumericTable::from_rows(
            vec!["d1".into(), "d2".into()],
            vec![vec![0.0, 0.5], vec![1.0, 1.5], vec![2.0, 2.5]],
        )
        .unwrap()
    }

    fn descriptors() -> NumericTable {
        NumericTable::from_rows(
            vec!["phi".into()],
            vec![vec![-1.0], vec![-2.0], vec![-3.0]],
        )
        .unwrap()
    }

    fn labels() -> Vec<BasinLabel> {
        vec![
            BasinLabel::new(0, true),
            BasinLabel::new(1, false),
            BasinLabel::new(1, true),
        ]
    }

    #[test]
    fn header_orders_cvs_labels_then_descriptors() {
        let dataset = LabeledDataset::new(cvs(), labels(), Some(descriptors())).unwrap();
        assert_eq!(dataset.header(), vec!["d1", "d2", "basin", "selection", "phi"]);
    }

    #[test]
    fn record_renders_row_in_header_order() {
        let dataset = LabeledDataset::new(cvs(), labels(), Some(descriptors())).unwrap();
        assert_eq!(dataset.record(1), vec!["1", "1.5", "1", "false", "-2"]);
    }

    #[test]
    fn new_rejects_label_count_mismatch() {
        let result = LabeledDataset::new(cvs(), labels()[..2].to_vec(), None);
        assert_eq!(
            result,
            Err(TableError::RowCountMismatch {
                expected: 3,
                found: 2
            })
        );
    }

    #[test]
    fn new_rejects_descriptor_row_mismatch() {
        let short = descriptors().strided(2);
        let result = LabeledDataset::new(cvs(), labels(), Some(short));
        assert!(matches!(result, Err(TableError::RowCountMismatch { .. })));
    }

    #[test]
    fn selected_only_filters_all_tables_consistently() {
        let dataset = LabeledDataset::new(cvs(), labels(), Some(descriptors())).unwrap();
        let filtered = dataset.selected_only();
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.cvs().column("d1").unwrap(), vec![0.0, 2.0]);
        assert_eq!(
            filtered.descriptors().unwrap().column("phi").unwrap(),
            vec![-1.0, -3.0]
        );
        assert!(filtered.labels().iter().all(|l| l.selected));
    }
}
