//! Dense row-major matrix used for targets and simulation outputs.
//!
//! Rows are timesteps, columns are strategies. Row-major storage keeps each
//! timestep contiguous, which is what the engine walks and what the parallel
//! schedule splits into column blocks.

use std::ops::{Index, IndexMut};

use crate::error::InputError;

/// T x W matrix of `f64` stored row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Wrap a row-major buffer. The buffer length must equal `rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, InputError> {
        if data.len() != rows * cols {
            return Err(InputError::BufferSize {
                rows,
                cols,
                actual: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from a slice of rows. All rows must have the same length.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, InputError> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(InputError::RaggedRow {
                    row: i,
                    expected: cols,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Single-strategy matrix: one column, one row per value.
    pub fn column_vector(values: &[f64]) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            data: values.to_vec(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Bounds-checked cell access.
    pub fn get(&self, r: usize, c: usize) -> Option<f64> {
        if r < self.rows && c < self.cols {
            Some(self.data[r * self.cols + c])
        } else {
            None
        }
    }

    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn row_mut(&mut self, r: usize) -> &mut [f64] {
        &mut self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn column(&self, c: usize) -> impl Iterator<Item = f64> + '_ {
        assert!(c < self.cols, "column {c} out of bounds ({})", self.cols);
        (0..self.rows).map(move |r| self.data[r * self.cols + c])
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.rows).map(move |r| self.row(r))
    }

    /// Borrow row `r - 1` immutably and row `r` mutably at the same time.
    ///
    /// Requires `r >= 1`.
    pub(crate) fn split_rows_mut(&mut self, r: usize) -> (&[f64], &mut [f64]) {
        debug_assert!(r >= 1 && r < self.rows);
        let (head, tail) = self.data.split_at_mut(r * self.cols);
        (&head[(r - 1) * self.cols..], &mut tail[..self.cols])
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (r, c): (usize, usize)) -> &f64 {
        assert!(c < self.cols, "column {c} out of bounds ({})", self.cols);
        &self.data[r * self.cols + c]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut f64 {
        assert!(c < self.cols, "column {c} out of bounds ({})", self.cols);
        &mut self.data[r * self.cols + c]
    }
}

/// Row-wise difference of a target matrix.
///
/// Row 0 is the change from an implicit all-zero row, i.e. a copy of
/// `targets` row 0. Row t is `targets[t] - targets[t - 1]`.
pub fn position_changes(targets: &Matrix) -> Matrix {
    let mut changes = Matrix::zeros(targets.rows(), targets.cols());
    if targets.rows() == 0 {
        return changes;
    }
    changes.row_mut(0).copy_from_slice(targets.row(0));
    for t in 1..targets.rows() {
        let prev = targets.row(t - 1);
        let cur = targets.row(t);
        for ((out, &now), &before) in changes.row_mut(t).iter_mut().zip(cur).zip(prev) {
            *out = now - before;
        }
    }
    changes
}
