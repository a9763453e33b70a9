use super::{Element, Matrix, MatrixError};

/// A borrowed rectangular window into a [`Matrix`].
///
/// Created with [`Matrix::block`]. The parent matrix cannot be resized
/// or otherwise mutated while the block is alive.
#[derive(Clone, Copy, Debug)]
pub struct MatrixBlock<'a, T> {
    parent: &'a Matrix<T>,
    row_start: usize,
    col_start: usize,
    rows: usize,
    cols: usize,
}

/// A mutably borrowed rectangular window into a [`Matrix`].
///
/// Created with [`Matrix::block_mut`]. Writes go directly to the parent's storage.
#[derive(Debug)]
pub struct MatrixBlockMut<'a, T> {
    parent: &'a mut Matrix<T>,
    row_start: usize,
    col_start: usize,
    rows: usize,
    cols: usize,
}

impl<'a, T> MatrixBlock<'a, T> {
    /// Bounds are checked by the caller (`Matrix::block`).
    pub(super) fn new(
        parent: &'a Matrix<T>,
        row_start: usize,
        col_start: usize,
        rows: usize,
        cols: usize,
    ) -> Self {
        Self {
            parent,
            row_start,
            col_start,
            rows,
            cols,
        }
    }

    /// Number of rows in the block.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns in the block.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)` of the block.
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// One row of the block, which is contiguous in the parent's storage.
    #[inline]
    pub fn row(&self, row: usize) -> &'a [T] {
        debug_assert!(row < self.rows, "row {row} out of range");
        let parent_row = self.parent.row(self.row_start + row);
        &parent_row[self.col_start..self.col_start + self.cols]
    }

    /// Checked element access in block coordinates.
    pub fn get(&self, row: usize, col: usize) -> Result<&'a T, MatrixError> {
        if row < self.rows && col < self.cols {
            Ok(&self.row(row)[col])
        } else {
            Err(MatrixError::IndexOutOfRange {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }

    /// Copy the block into a new owned matrix.
    pub fn to_matrix(&self) -> Matrix<T>
    where
        T: Element,
    {
        Matrix::from_fn(self.rows, self.cols, |row, col| self.row(row)[col].clone())
    }
}

impl<'a, T> MatrixBlockMut<'a, T> {
    pub(super) fn new(
        parent: &'a mut Matrix<T>,
        row_start: usize,
        col_start: usize,
        rows: usize,
        cols: usize,
    ) -> Self {
        Self {
            parent,
            row_start,
            col_start,
            rows,
            cols,
        }
    }

    /// Number of rows in the block.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns in the block.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)` of the block.
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Reborrow as an immutable block.
    pub fn as_block(&self) -> MatrixBlock<'_, T> {
        MatrixBlock::new(
            self.parent,
            self.row_start,
            self.col_start,
            self.rows,
            self.cols,
        )
    }

    /// One row of the block.
    #[inline]
    pub fn row(&self, row: usize) -> &[T] {
        debug_assert!(row < self.rows, "row {row} out of range");
        let parent_row = self.parent.row(self.row_start + row);
        &parent_row[self.col_start..self.col_start + self.cols]
    }

    /// One row of the block, mutably.
    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [T] {
        debug_assert!(row < self.rows, "row {row} out of range");
        let (col_start, cols) = (self.col_start, self.cols);
        let parent_row = self.parent.row_mut(self.row_start + row);
        &mut parent_row[col_start..col_start + cols]
    }

    /// Set every element in the block to `value`.
    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        for row in 0..self.rows {
            self.row_mut(row).fill(value.clone());
        }
    }

    /// Overwrite the block with the contents of a matrix of the same shape.
    pub fn assign(&mut self, source: &Matrix<T>) -> Result<(), MatrixError>
    where
        T: Clone,
    {
        if source.dims() != self.dims() {
            return Err(MatrixError::InvalidDimension(format!(
                "cannot assign a {}x{} matrix to a {}x{} block",
                source.rows(),
                source.cols(),
                self.rows,
                self.cols
            )));
        }
        for row in 0..self.rows {
            self.row_mut(row).clone_from_slice(source.row(row));
        }
        Ok(())
    }

    /// Copy the block into a new owned matrix.
    pub fn to_matrix(&self) -> Matrix<T>
    where
        T: Element,
    {
        self.as_block().to_matrix()
    }
}

impl<'a, T> std::ops::Index<(usize, usize)> for MatrixBlock<'a, T> {
    type Output = T;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        debug_assert!(col < self.cols, "column {col} out of range");
        &self.row(row)[col]
    }
}

impl<'a, T> std::ops::Index<(usize, usize)> for MatrixBlockMut<'a, T> {
    type Output = T;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        debug_assert!(col < self.cols, "column {col} out of range");
        &self.row(row)[col]
    }
}

impl<'a, T> std::ops::IndexMut<(usize, usize)> for MatrixBlockMut<'a, T> {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
        debug_assert!(col < self.cols, "column {col} out of range");
        &mut self.row_mut(row)[col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_matrix(n: usize) -> Matrix<f64> {
        Matrix::from_fn(n, n, |row, col| (row * n + col) as f64)
    }

    #[test]
    fn block_reads_parent() {
        let m = counting_matrix(4);
        let b = m.block(1, 2, 2, 2).unwrap();
        assert_eq!(b.dims(), (2, 2));
        assert_eq!(b[(0, 0)], 6.0);
        assert_eq!(b[(1, 1)], 11.0);
        assert_eq!(b.row(1), &[10.0, 11.0]);
        assert!(b.get(2, 0).is_err());
        #[rustfmt::skip]
        let expected = Matrix::from_row_major(2, 2, vec![
            6.0, 7.0,
            10.0, 11.0,
        ]).unwrap();
        assert_eq!(b.to_matrix(), expected);
    }

    #[test]
    fn out_of_range_blocks_are_rejected() {
        let m = counting_matrix(3);
        assert!(m.block(0, 0, 3, 3).is_ok());
        assert!(m.block(3, 0, 0, 0).is_ok(), "empty block at the edge is fine");
        assert!(matches!(
            m.block(1, 1, 3, 1),
            Err(MatrixError::IndexOutOfRange { .. })
        ));
        assert!(m.block(usize::MAX, 0, 2, 1).is_err());
    }

    /// Writes through a mutable block show up in the parent.
    #[test]
    fn block_mut_aliases_parent() {
        let mut m = counting_matrix(3);
        {
            let mut b = m.block_mut(1, 0, 2, 2).unwrap();
            b[(0, 1)] = -1.0;
            b.row_mut(1).fill(0.5);
        }
        assert_eq!(m[(1, 1)], -1.0);
        assert_eq!(m.row(2), &[0.5, 0.5, 8.0]);

        let mut b = m.block_mut(0, 1, 2, 2).unwrap();
        b.fill(9.0);
        assert_eq!(b.to_matrix(), Matrix::from_element(2, 2, 9.0));
        assert_eq!(m.row(0), &[0.0, 9.0, 9.0]);
    }

    #[test]
    fn assign_requires_matching_shape() {
        let mut m = Matrix::<f64>::zeros(3, 3);
        let src = Matrix::from_element(2, 1, 4.0);
        let mut b = m.block_mut(1, 1, 2, 1).unwrap();
        b.assign(&src).unwrap();
        assert!(b.assign(&Matrix::zeros(1, 2)).is_err());
        assert_eq!(m.column(1).copied().collect::<Vec<_>>(), vec![0.0, 4.0, 4.0]);
    }
}
