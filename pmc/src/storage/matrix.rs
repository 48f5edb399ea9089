//! Sparse matrices in compressed row storage with optional row grouping.
//!
//! For nondeterministic models the rows of a matrix are partitioned into contiguous
//! *row groups*, one per state, so that row group $i$ holds the choices of state
//! $i$. Deterministic models have a trivial grouping with exactly one row per
//! group.
//!
//! Matrices are constructed incrementally with a [`SparseMatrixBuilder`]. Entries
//! must be added row by row, i.e., the row index never decreases. Within a row,
//! entries may come in any column order; they are sorted when the matrix is built.

use std::{fmt, ops::Range};

use crate::linalg::fields::PseudoField;

/// An entry of a sparse matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct MatrixEntry<F> {
    column: usize,
    value: F,
}

impl<F> MatrixEntry<F> {
    pub fn new(column: usize, value: F) -> Self {
        Self { column, value }
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn value(&self) -> &F {
        &self.value
    }
}

/// Incrementally constructs a [`SparseMatrix`].
#[derive(Debug)]
pub struct SparseMatrixBuilder<F> {
    initial_row_count: usize,
    initial_column_count: usize,
    initial_row_group_count: usize,
    force_initial_dimensions: bool,
    has_custom_row_grouping: bool,
    /// Start index of every row in `columns_and_values` up to `current_row`.
    row_indications: Vec<usize>,
    columns_and_values: Vec<MatrixEntry<F>>,
    row_group_indices: Vec<usize>,
    current_row: usize,
    has_entries: bool,
    highest_column: Option<usize>,
}

impl<F: PseudoField> SparseMatrixBuilder<F> {
    /// Creates a builder without size hints.
    pub fn new(has_custom_row_grouping: bool) -> Self {
        Self::with_dimensions(0, 0, 0, false, has_custom_row_grouping, 0)
    }

    /// Creates a builder with size hints. If `force_dimensions` is set, the built
    /// matrix has at least the given numbers of rows, columns and row groups.
    pub fn with_dimensions(
        rows: usize,
        columns: usize,
        entries: usize,
        force_dimensions: bool,
        has_custom_row_grouping: bool,
        row_groups: usize,
    ) -> Self {
        let mut row_indications = Vec::with_capacity(rows + 1);
        row_indications.push(0);
        Self {
            initial_row_count: rows,
            initial_column_count: columns,
            initial_row_group_count: row_groups,
            force_initial_dimensions: force_dimensions,
            has_custom_row_grouping,
            row_indications,
            columns_and_values: Vec::with_capacity(entries),
            row_group_indices: Vec::with_capacity(row_groups + 1),
            current_row: 0,
            has_entries: false,
            highest_column: None,
        }
    }

    /// Appends an entry to the given row.
    ///
    /// # Panics
    ///
    /// Panics if an entry of a later row has already been added.
    pub fn add_next_value(&mut self, row: usize, column: usize, value: F) {
        assert!(
            row >= self.current_row,
            "Adding an element in row {}, but an element in row {} has already been added.",
            row,
            self.current_row
        );
        self.advance_to_row(row);
        self.has_entries = true;
        self.highest_column = self.highest_column.max(Some(column));
        self.columns_and_values.push(MatrixEntry::new(column, value));
    }

    /// Starts a new row group beginning at `start_row`.
    ///
    /// # Panics
    ///
    /// Panics if the builder has no custom row grouping, or if `start_row` does not
    /// lie strictly after the start of the previous group.
    pub fn new_row_group(&mut self, start_row: usize) {
        assert!(
            self.has_custom_row_grouping,
            "Matrix was not created to have a custom row grouping."
        );
        if let Some(previous) = self.row_group_indices.last() {
            assert!(
                start_row > *previous,
                "Illegal row group starting at row {} after the group starting at row {}.",
                start_row,
                previous
            );
        }
        assert!(
            start_row >= self.current_row,
            "Illegal row group starting at row {}, rows up to {} have already been filled.",
            start_row,
            self.current_row
        );
        self.row_group_indices.push(start_row);
    }

    /// Rewrites every column `c >= offset` to `replacements[c - offset]`.
    ///
    /// # Panics
    ///
    /// Panics if a column has no replacement.
    pub fn replace_columns(&mut self, replacements: &[usize], offset: usize) {
        let mut highest_column = None;
        for entry in self.columns_and_values.iter_mut() {
            if entry.column >= offset {
                entry.column = replacements[entry.column - offset];
            }
            highest_column = highest_column.max(Some(entry.column));
        }
        self.highest_column = highest_column;
    }

    fn advance_to_row(&mut self, row: usize) {
        while self.current_row < row {
            self.row_indications.push(self.columns_and_values.len());
            self.current_row += 1;
        }
    }

    /// Builds the matrix.
    pub fn build(self) -> SparseMatrix<F> {
        self.build_with(None, None, None)
    }

    /// Builds the matrix with at least the given numbers of rows and columns and, for
    /// custom row groupings, row groups. Missing row groups are appended empty.
    pub fn build_with(
        mut self,
        row_count: Option<usize>,
        column_count: Option<usize>,
        row_group_count: Option<usize>,
    ) -> SparseMatrix<F> {
        let mut rows = if self.has_entries {
            self.current_row + 1
        } else {
            0
        };
        if let Some(start) = self.row_group_indices.last() {
            rows = rows.max(*start + 1);
        }
        rows = rows.max(row_count.unwrap_or(0));
        let mut columns = self.highest_column.map_or(0, |column| column + 1);
        columns = columns.max(column_count.unwrap_or(0));
        if self.force_initial_dimensions {
            rows = rows.max(self.initial_row_count);
            columns = columns.max(self.initial_column_count);
        }

        // Close all remaining rows, including the end marker of the last one.
        if rows > 0 {
            self.advance_to_row(rows - 1);
        }
        self.row_indications.truncate(rows.max(1));
        self.row_indications.push(self.columns_and_values.len());
        if rows == 0 {
            self.row_indications = vec![0];
        }

        let (row_indications, columns_and_values) =
            normalize_rows(&self.row_indications, self.columns_and_values);

        let trivial_row_grouping = !self.has_custom_row_grouping;
        let row_group_indices = if trivial_row_grouping {
            (0..=rows).collect()
        } else {
            let mut groups = self.row_group_indices;
            let mut group_count = groups.len().max(row_group_count.unwrap_or(0));
            if self.force_initial_dimensions {
                group_count = group_count.max(self.initial_row_group_count);
            }
            groups.resize(group_count, rows);
            groups.push(rows);
            assert!(
                groups[0] == 0 || rows == 0,
                "The first row group must start at row 0."
            );
            groups
        };

        SparseMatrix {
            row_count: rows,
            column_count: columns,
            row_indications,
            columns_and_values,
            trivial_row_grouping,
            row_group_indices,
        }
    }
}

/// Sorts the entries of every row by column and sums up duplicate columns.
fn normalize_rows<F: PseudoField>(
    row_indications: &[usize],
    entries: Vec<MatrixEntry<F>>,
) -> (Vec<usize>, Vec<MatrixEntry<F>>) {
    let mut result: Vec<MatrixEntry<F>> = Vec::with_capacity(entries.len());
    let mut indications = Vec::with_capacity(row_indications.len());
    let mut entries = entries.into_iter();
    for window in row_indications.windows(2) {
        let row_start = result.len();
        indications.push(row_start);
        let mut row: Vec<MatrixEntry<F>> = entries.by_ref().take(window[1] - window[0]).collect();
        row.sort_by_key(|entry| entry.column);
        for entry in row {
            let last = result.len().checked_sub(1).filter(|last| *last >= row_start);
            match last {
                Some(last) if result[last].column == entry.column => {
                    result[last].value.add_assign(&entry.value)
                }
                _ => result.push(entry),
            }
        }
    }
    indications.push(result.len());
    (indications, result)
}

/// A sparse matrix in compressed row storage.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseMatrix<F> {
    row_count: usize,
    column_count: usize,
    row_indications: Vec<usize>,
    columns_and_values: Vec<MatrixEntry<F>>,
    trivial_row_grouping: bool,
    row_group_indices: Vec<usize>,
}

impl<F: PseudoField> SparseMatrix<F> {
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// The number of stored entries.
    pub fn entry_count(&self) -> usize {
        self.columns_and_values.len()
    }

    /// The number of stored entries that are not zero.
    pub fn nonzero_entry_count(&self) -> usize {
        self.columns_and_values
            .iter()
            .filter(|entry| !entry.value.is_zero())
            .count()
    }

    pub fn row_group_count(&self) -> usize {
        self.row_group_indices.len() - 1
    }

    /// The start row of every row group followed by the number of rows.
    pub fn row_group_indices(&self) -> &[usize] {
        &self.row_group_indices
    }

    pub fn has_trivial_row_grouping(&self) -> bool {
        self.trivial_row_grouping
    }

    /// The rows of the given row group.
    pub fn row_group(&self, group: usize) -> Range<usize> {
        self.row_group_indices[group]..self.row_group_indices[group + 1]
    }

    pub fn row_group_size(&self, group: usize) -> usize {
        self.row_group(group).len()
    }

    /// The entries of the given row, sorted by column.
    pub fn row(&self, row: usize) -> &[MatrixEntry<F>] {
        &self.columns_and_values[self.row_indications[row]..self.row_indications[row + 1]]
    }

    /// Returns the value at the given row and column, if an entry is stored there.
    pub fn get(&self, row: usize, column: usize) -> Option<&F> {
        let entries = self.row(row);
        entries
            .binary_search_by_key(&column, MatrixEntry::column)
            .ok()
            .map(|index| &entries[index].value)
    }

    /// The sum of all values of the given row.
    pub fn row_sum(&self, row: usize) -> F {
        crate::linalg::fields::sum(self.row(row).iter().map(MatrixEntry::value))
    }

    /// Checks whether every row sums up to one within `tolerance`.
    pub fn is_probabilistic(&self, tolerance: f64) -> bool {
        (0..self.row_count).all(|row| self.row_sum(row).is_close(&F::one(), tolerance))
    }

    /// Iterates over all entries together with their rows.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &MatrixEntry<F>)> + '_ {
        (0..self.row_count).flat_map(move |row| self.row(row).iter().map(move |entry| (row, entry)))
    }

    /// Divides every value of the given row by `divisor`.
    pub fn divide_row(&mut self, row: usize, divisor: &F) {
        let range = self.row_indications[row]..self.row_indications[row + 1];
        for entry in &mut self.columns_and_values[range] {
            entry.value.div_assign(divisor);
        }
    }

    /// Copies selected rows into a new matrix with trivial row grouping. Each pair
    /// names the target row and the source row; targets must be ascending.
    pub fn submatrix_rows(
        &self,
        selection: impl IntoIterator<Item = (usize, usize)>,
        row_count: usize,
    ) -> SparseMatrix<F> {
        let mut builder = SparseMatrixBuilder::new(false);
        for (target, source) in selection {
            for entry in self.row(source) {
                builder.add_next_value(target, entry.column, entry.value.clone());
            }
        }
        builder.build_with(Some(row_count), Some(self.column_count), None)
    }
}

impl<F: PseudoField> fmt::Display for SparseMatrix<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} x {} matrix ({} entries, {} row groups)",
            self.row_count,
            self.column_count,
            self.entry_count(),
            self.row_group_count()
        )?;
        for group in 0..self.row_group_count() {
            for row in self.row_group(group) {
                write!(f, "{group}\t{row}\t")?;
                for entry in self.row(row) {
                    write!(f, " ({}, {})", entry.column, entry.value)?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::fields::{FromRational, float64::Float64, rational::Rational};

    fn value(v: f64) -> Float64 {
        Float64::from(v)
    }

    #[test]
    fn test_deterministic_matrix() {
        let mut builder = SparseMatrixBuilder::new(false);
        builder.add_next_value(0, 1, value(1.0));
        builder.add_next_value(1, 2, value(0.5));
        builder.add_next_value(1, 1, value(0.5));
        builder.add_next_value(2, 2, value(1.0));
        let matrix = builder.build();

        assert_eq!(matrix.row_count(), 3);
        assert_eq!(matrix.column_count(), 3);
        assert_eq!(matrix.entry_count(), 4);
        assert!(matrix.has_trivial_row_grouping());
        assert_eq!(matrix.row_group_indices(), &[0, 1, 2, 3]);
        let columns: Vec<_> = matrix.row(1).iter().map(MatrixEntry::column).collect();
        assert_eq!(columns, vec![1, 2]);
        assert!(matrix.is_probabilistic(1e-6));
        assert_eq!(matrix.get(1, 2), Some(&value(0.5)));
        assert_eq!(matrix.get(0, 0), None);
    }

    #[test]
    fn test_row_groups_partition_rows() {
        let mut builder = SparseMatrixBuilder::new(true);
        builder.new_row_group(0);
        builder.add_next_value(0, 0, value(1.0));
        builder.add_next_value(1, 1, value(1.0));
        builder.new_row_group(2);
        builder.add_next_value(2, 0, value(1.0));
        let matrix = builder.build();

        assert_eq!(matrix.row_group_count(), 2);
        assert_eq!(matrix.row_group_indices(), &[0, 2, 3]);
        assert_eq!(matrix.row_group(0), 0..2);
        assert_eq!(matrix.row_group_size(1), 1);
        assert!(
            matrix
                .row_group_indices()
                .windows(2)
                .all(|pair| pair[0] < pair[1])
        );
        assert_eq!(*matrix.row_group_indices().last().unwrap(), matrix.row_count());
    }

    #[test]
    fn test_duplicate_columns_are_summed() {
        let mut builder = SparseMatrixBuilder::new(false);
        builder.add_next_value(0, 3, Rational::from_rational("1", "3"));
        builder.add_next_value(0, 0, Rational::from_rational("1", "3"));
        builder.add_next_value(0, 3, Rational::from_rational("1", "3"));
        let matrix = builder.build();
        assert_eq!(matrix.entry_count(), 2);
        assert_eq!(matrix.get(0, 3), Some(&Rational::from_rational("2", "3")));
        assert!(matrix.is_probabilistic(0.0));
    }

    #[test]
    fn test_skipped_rows_are_empty() {
        let mut builder = SparseMatrixBuilder::new(false);
        builder.add_next_value(0, 0, value(1.0));
        builder.add_next_value(3, 0, value(1.0));
        let matrix = builder.build_with(Some(5), Some(2), None);
        assert_eq!(matrix.row_count(), 5);
        assert_eq!(matrix.column_count(), 2);
        assert!(matrix.row(1).is_empty());
        assert!(matrix.row(4).is_empty());
        assert_eq!(matrix.row(3).len(), 1);
    }

    #[test]
    fn test_trailing_empty_rows_in_row_groups() {
        let mut builder = SparseMatrixBuilder::new(true);
        builder.new_row_group(0);
        builder.add_next_value(0, 1, value(1.0));
        builder.new_row_group(1);
        builder.add_next_value(1, 0, value(1.0));
        let matrix = builder.build_with(Some(3), Some(2), Some(2));
        assert_eq!(matrix.row_count(), 3);
        assert_eq!(matrix.row_group_indices(), &[0, 1, 3]);
        assert_eq!(matrix.row_group_size(1), 2);
        assert!(matrix.row(2).is_empty());
    }

    #[test]
    fn test_replace_columns() {
        let mut builder = SparseMatrixBuilder::new(false);
        builder.add_next_value(0, 0, value(0.5));
        builder.add_next_value(0, 1, value(0.5));
        builder.add_next_value(1, 2, value(1.0));
        builder.add_next_value(2, 2, value(1.0));
        builder.replace_columns(&[2, 0, 1], 0);
        let matrix = builder.build();
        let columns: Vec<_> = matrix.entries().map(|(row, entry)| (row, entry.column())).collect();
        assert_eq!(columns, vec![(0, 0), (0, 2), (1, 1), (2, 1)]);
    }

    #[test]
    fn test_submatrix_rows() {
        let mut builder = SparseMatrixBuilder::new(true);
        builder.new_row_group(0);
        builder.add_next_value(0, 1, value(2.0));
        builder.add_next_value(1, 0, value(3.0));
        builder.new_row_group(2);
        builder.add_next_value(2, 0, value(1.0));
        let matrix = builder.build();

        let event = matrix.submatrix_rows([(0, 1), (1, 2)], 2);
        assert!(event.has_trivial_row_grouping());
        assert_eq!(event.row_count(), 2);
        assert_eq!(event.get(0, 0), Some(&value(3.0)));
        assert_eq!(event.get(1, 0), Some(&value(1.0)));
        assert_eq!(event.get(0, 1), None);
    }

    #[test]
    fn test_empty_matrix() {
        let matrix = SparseMatrixBuilder::<Float64>::new(true).build();
        assert_eq!(matrix.row_count(), 0);
        assert_eq!(matrix.row_group_count(), 0);
        assert_eq!(matrix.entry_count(), 0);
    }

    #[test]
    #[should_panic(expected = "has already been added")]
    fn test_rows_must_not_decrease() {
        let mut builder = SparseMatrixBuilder::new(false);
        builder.add_next_value(1, 0, value(1.0));
        builder.add_next_value(0, 0, value(1.0));
    }

    #[test]
    #[should_panic(expected = "custom row grouping")]
    fn test_row_group_requires_grouping() {
        SparseMatrixBuilder::<Float64>::new(false).new_row_group(0);
    }
}
