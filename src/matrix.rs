//! Dense matrices stored contiguously in row-major order.
//!
//! [`Matrix`] is the general rectangular storage.
//! [`SquareMatrix`] wraps it with the additional guarantee `rows == cols`
//! and provides the decomposition routines in [`lu`][self::lu_decompose].

mod block;
pub use block::{MatrixBlock, MatrixBlockMut};

mod square;
pub use square::{MatrixTolerances, SquareMatrix};

mod lu;
pub use lu::{
    det, det_decomposed, det_in_place, det_in_place_with, lu_decompose, lu_decompose_with,
    LuDecomposed,
};

use nalgebra as na;

use itertools::izip;

/// Error in constructing or accessing a matrix.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    /// Sizes given to a constructor or operation don't fit together.
    #[error("Invalid matrix dimensions: {0}")]
    InvalidDimension(String),
    /// A square matrix was requested from a rectangular one.
    #[error("Matrix is not square: {rows} rows, {cols} columns")]
    NotSquare {
        /// Row count of the offending matrix.
        rows: usize,
        /// Column count of the offending matrix.
        cols: usize,
    },
    /// Checked element access outside of the matrix.
    #[error("Index ({row}, {col}) out of range for a {rows}x{cols} matrix")]
    IndexOutOfRange {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
        /// Row count of the matrix.
        rows: usize,
        /// Column count of the matrix.
        cols: usize,
    },
    /// A linear system was solved with a singular decomposition.
    #[error("Matrix is singular")]
    Singular,
}

/// Trait for values that can be stored in a [`Matrix`].
///
/// Besides scalars this is implemented for `nalgebra` static vectors and tensors,
/// so e.g. a matrix of 3D vectors is possible.
pub trait Element: Clone + PartialEq + std::fmt::Debug {
    /// The additive identity, used to fill new entries.
    fn zero() -> Self;
    /// Magnitude of the value, used by tolerance-based checks.
    fn magnitude(&self) -> f64;
    /// Magnitude of the difference between two values.
    fn distance(&self, other: &Self) -> f64;
}

/// Elements with a multiplicative identity, allowing identity matrices.
pub trait UnitElement: Element {
    /// The multiplicative identity.
    fn one() -> Self;
}

macro_rules! impl_scalar_element {
    ($($t:ty),*) => {
        $(
            impl Element for $t {
                #[inline]
                fn zero() -> Self {
                    0 as $t
                }

                #[inline]
                fn magnitude(&self) -> f64 {
                    (*self as f64).abs()
                }

                #[inline]
                fn distance(&self, other: &Self) -> f64 {
                    (*self as f64 - *other as f64).abs()
                }
            }

            impl UnitElement for $t {
                #[inline]
                fn one() -> Self {
                    1 as $t
                }
            }
        )*
    };
}

impl_scalar_element!(f64, f32, i32, i64);

impl<const R: usize, const C: usize> Element for na::SMatrix<f64, R, C> {
    #[inline]
    fn zero() -> Self {
        Self::zeros()
    }

    #[inline]
    fn magnitude(&self) -> f64 {
        self.norm()
    }

    #[inline]
    fn distance(&self, other: &Self) -> f64 {
        (self - other).norm()
    }
}

/// A dense `rows x cols` matrix stored in row-major order.
///
/// Element access with `m[(row, col)]` is bounds-checked in debug builds only.
/// In release builds only the underlying storage bound is checked,
/// so an out-of-range column silently addresses the next row.
/// Use [`get`][Self::get] for access that is always checked.
#[derive(Clone, Debug)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    /// storage for at least `rows * cols` elements.
    /// may be longer after a shallow resize to fewer rows
    data: Vec<T>,
}

impl<T: Element> Matrix<T> {
    /// Create a matrix with every element set to zero.
    ///
    /// # Panics
    ///
    /// If `rows * cols` overflows `usize`.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::from_element(rows, cols, T::zero())
    }

    /// Create a matrix with every element set to `value`.
    ///
    /// # Panics
    ///
    /// If `rows * cols` overflows `usize`.
    pub fn from_element(rows: usize, cols: usize, value: T) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; len_or_panic(rows, cols)],
        }
    }

    /// Create a matrix by calling `f(row, col)` for each element.
    ///
    /// # Panics
    ///
    /// If `rows * cols` overflows `usize`.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(len_or_panic(rows, cols));
        for row in 0..rows {
            for col in 0..cols {
                data.push(f(row, col));
            }
        }
        Self { rows, cols, data }
    }

    /// Create a matrix from elements given in row-major order.
    ///
    /// Fails if the number of elements is not `rows * cols`.
    pub fn from_row_major(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, MatrixError> {
        let len = checked_len(rows, cols)?;
        if data.len() != len {
            return Err(MatrixError::InvalidDimension(format!(
                "{} elements given for a {rows}x{cols} matrix",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Resize the matrix, keeping the elements in the overlap
    /// of the old and new shape and setting all others to zero.
    ///
    /// # Panics
    ///
    /// If `rows * cols` overflows `usize`.
    /// See [`try_resize`][Self::try_resize] for a fallible version.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        if let Err(e) = self.try_resize(rows, cols) {
            panic!("{e}");
        }
    }

    /// Like [`resize`][Self::resize], but fails instead of panicking
    /// if `rows * cols` overflows `usize`. The matrix is unchanged on failure.
    pub fn try_resize(&mut self, rows: usize, cols: usize) -> Result<(), MatrixError> {
        let len = checked_len(rows, cols)?;
        if rows == self.rows && cols == self.cols {
            return Ok(());
        }
        let old = std::mem::take(&mut self.data);
        let old_cols = self.cols;
        let old_rows = self.rows;

        let mut data = Vec::with_capacity(len);
        for row in 0..rows {
            for col in 0..cols {
                if row < old_rows && col < old_cols {
                    data.push(old[row * old_cols + col].clone());
                } else {
                    data.push(T::zero());
                }
            }
        }

        self.rows = rows;
        self.cols = cols;
        self.data = data;
        Ok(())
    }

    /// Take the transpose of the matrix.
    pub fn transpose(&self) -> Self {
        Self::from_fn(self.cols, self.rows, |row, col| self[(col, row)].clone())
    }

    /// Get the elements on the main diagonal.
    pub fn diag(&self) -> Vec<T> {
        (0..self.rows.min(self.cols))
            .map(|i| self[(i, i)].clone())
            .collect()
    }

    /// The Frobenius norm, i.e. the square root of the sum
    /// of squared element magnitudes.
    pub fn frobenius_norm(&self) -> f64 {
        self.as_slice()
            .iter()
            .map(|v| v.magnitude().powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// The largest element magnitude, or zero for an empty matrix.
    pub fn max_magnitude(&self) -> f64 {
        self.as_slice()
            .iter()
            .fold(0.0, |max, v| f64::max(max, v.magnitude()))
    }
}

impl<T> Matrix<T> {
    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)` as a tuple.
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of elements, `rows * cols`.
    ///
    /// Every constructor checks this product for overflow.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Whether the matrix has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of elements the storage can hold without reallocating,
    /// i.e. the limit for [`shallow_resize`][Self::shallow_resize].
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The elements in row-major order.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data[..self.len()]
    }

    /// The elements in row-major order, mutably.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.len();
        &mut self.data[..len]
    }

    /// Iterate over the elements in row-major order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Iterate mutably over the elements in row-major order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    /// Checked element access.
    pub fn get(&self, row: usize, col: usize) -> Result<&T, MatrixError> {
        self.check_index(row, col)?;
        Ok(&self.data[row * self.cols + col])
    }

    /// Checked mutable element access.
    pub fn get_mut(&mut self, row: usize, col: usize) -> Result<&mut T, MatrixError> {
        self.check_index(row, col)?;
        Ok(&mut self.data[row * self.cols + col])
    }

    fn check_index(&self, row: usize, col: usize) -> Result<(), MatrixError> {
        if row < self.rows && col < self.cols {
            Ok(())
        } else {
            Err(MatrixError::IndexOutOfRange {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }

    /// A single row as a slice.
    #[inline]
    pub fn row(&self, row: usize) -> &[T] {
        debug_assert!(row < self.rows, "row {row} out of range");
        let start = row * self.cols;
        &self.data[start..start + self.cols]
    }

    /// A single row as a mutable slice.
    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [T] {
        debug_assert!(row < self.rows, "row {row} out of range");
        let start = row * self.cols;
        &mut self.data[start..start + self.cols]
    }

    /// Iterate over the elements of a single column.
    pub fn column(&self, col: usize) -> impl '_ + Iterator<Item = &T> {
        debug_assert!(col < self.cols, "column {col} out of range");
        self.as_slice().iter().skip(col).step_by(self.cols.max(1))
    }

    /// Swap two rows in place.
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let cols = self.cols;
        for col in 0..cols {
            self.data.swap(a * cols + col, b * cols + col);
        }
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        self.as_mut_slice().fill(value);
    }

    /// Remove all elements, leaving a 0x0 matrix.
    pub fn clear(&mut self) {
        self.rows = 0;
        self.cols = 0;
        self.data.clear();
    }

    /// Change the number of rows without touching the storage.
    ///
    /// Shrinking keeps the allocation, so a later shallow resize back up
    /// sees the old rows again. Growing beyond the allocation fails.
    pub fn shallow_resize(&mut self, rows: usize) -> Result<(), MatrixError> {
        self.shallow_reshape(rows, self.cols)
    }

    /// Reinterpret the storage with a new shape.
    /// Elements are not moved, so a change in column count scrambles rows.
    fn shallow_reshape(&mut self, rows: usize, cols: usize) -> Result<(), MatrixError> {
        let len = checked_len(rows, cols)?;
        if len > self.data.len() {
            return Err(MatrixError::InvalidDimension(format!(
                "shallow resize to {rows}x{cols} exceeds storage of {} elements",
                self.data.len()
            )));
        }
        self.rows = rows;
        self.cols = cols;
        Ok(())
    }

    /// Borrow a rectangular sub-block of the matrix,
    /// starting at `(row, col)` and spanning `rows x cols` elements.
    pub fn block(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> Result<MatrixBlock<'_, T>, MatrixError> {
        self.check_block(row, col, rows, cols)?;
        Ok(MatrixBlock::new(self, row, col, rows, cols))
    }

    /// Mutably borrow a rectangular sub-block of the matrix.
    /// Writes through the block alias this matrix.
    pub fn block_mut(
        &mut self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> Result<MatrixBlockMut<'_, T>, MatrixError> {
        self.check_block(row, col, rows, cols)?;
        Ok(MatrixBlockMut::new(self, row, col, rows, cols))
    }

    fn check_block(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> Result<(), MatrixError> {
        let row_end = row.checked_add(rows);
        let col_end = col.checked_add(cols);
        match (row_end, col_end) {
            (Some(re), Some(ce)) if re <= self.rows && ce <= self.cols => Ok(()),
            _ => Err(MatrixError::IndexOutOfRange {
                row: row.saturating_add(rows),
                col: col.saturating_add(cols),
                rows: self.rows,
                cols: self.cols,
            }),
        }
    }
}

/// Arithmetic for numeric element types.
impl<T> Matrix<T>
where
    T: Element + Copy + std::ops::Add<Output = T> + std::ops::Mul<Output = T>,
{
    /// Sum of the diagonal elements.
    pub fn trace(&self) -> T {
        self.diag().into_iter().fold(T::zero(), |acc, v| acc + v)
    }

    /// Multiply every element by `factor` in place.
    pub fn scale(&mut self, factor: T) {
        for v in self.iter_mut() {
            *v = *v * factor;
        }
    }

    /// Matrix product `self * rhs`.
    pub fn mat_mul(&self, rhs: &Self) -> Result<Self, MatrixError> {
        if self.cols != rhs.rows {
            return Err(MatrixError::InvalidDimension(format!(
                "cannot multiply {}x{} by {}x{}",
                self.rows, self.cols, rhs.rows, rhs.cols
            )));
        }
        let mut out = Self::zeros(self.rows, rhs.cols);
        for row in 0..self.rows {
            for (k, &a) in self.row(row).iter().enumerate() {
                for (o, &b) in izip!(out.row_mut(row), rhs.row(k)) {
                    *o = *o + a * b;
                }
            }
        }
        Ok(out)
    }

    /// Matrix-vector product `self * x`.
    pub fn mul_vec(&self, x: &[T]) -> Result<Vec<T>, MatrixError> {
        if x.len() != self.cols {
            return Err(MatrixError::InvalidDimension(format!(
                "vector of length {} for a {}x{} matrix",
                x.len(),
                self.rows,
                self.cols
            )));
        }
        Ok((0..self.rows)
            .map(|row| {
                izip!(self.row(row), x).fold(T::zero(), |acc, (&a, &b)| acc + a * b)
            })
            .collect())
    }

    /// Transposed matrix-vector product `self^T * x`.
    pub fn tr_mul_vec(&self, x: &[T]) -> Result<Vec<T>, MatrixError> {
        if x.len() != self.rows {
            return Err(MatrixError::InvalidDimension(format!(
                "vector of length {} for a transposed {}x{} matrix",
                x.len(),
                self.rows,
                self.cols
            )));
        }
        let mut out = vec![T::zero(); self.cols];
        for (row, &xv) in x.iter().enumerate() {
            for (o, &a) in izip!(&mut out, self.row(row)) {
                *o = *o + a * xv;
            }
        }
        Ok(out)
    }
}

fn checked_len(rows: usize, cols: usize) -> Result<usize, MatrixError> {
    rows.checked_mul(cols).ok_or_else(|| {
        MatrixError::InvalidDimension(format!("{rows}x{cols} overflows the address space"))
    })
}

fn len_or_panic(rows: usize, cols: usize) -> usize {
    match checked_len(rows, cols) {
        Ok(len) => len,
        Err(e) => panic!("{e}"),
    }
}

//
// std trait impls
//

impl<T: PartialEq> PartialEq for Matrix<T> {
    fn eq(&self, other: &Self) -> bool {
        self.dims() == other.dims() && self.as_slice() == other.as_slice()
    }
}

impl<T> std::ops::Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        debug_assert!(
            row < self.rows && col < self.cols,
            "index ({row}, {col}) out of range for a {}x{} matrix",
            self.rows,
            self.cols
        );
        &self.data[row * self.cols + col]
    }
}

impl<T> std::ops::IndexMut<(usize, usize)> for Matrix<T> {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
        debug_assert!(
            row < self.rows && col < self.cols,
            "index ({row}, {col}) out of range for a {}x{} matrix",
            self.rows,
            self.cols
        );
        &mut self.data[row * self.cols + col]
    }
}

// binary operators panic on shape mismatch like nalgebra's do;
// use `mat_mul` for a fallible product

impl<T> std::ops::Add for &Matrix<T>
where
    T: Element + Copy + std::ops::Add<Output = T>,
{
    type Output = Matrix<T>;

    fn add(self, rhs: Self) -> Self::Output {
        assert_eq!(self.dims(), rhs.dims(), "matrix dimensions don't match");
        let data = izip!(self.as_slice(), rhs.as_slice())
            .map(|(&a, &b)| a + b)
            .collect();
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data,
        }
    }
}

impl<T> std::ops::Sub for &Matrix<T>
where
    T: Element + Copy + std::ops::Sub<Output = T>,
{
    type Output = Matrix<T>;

    fn sub(self, rhs: Self) -> Self::Output {
        assert_eq!(self.dims(), rhs.dims(), "matrix dimensions don't match");
        let data = izip!(self.as_slice(), rhs.as_slice())
            .map(|(&a, &b)| a - b)
            .collect();
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data,
        }
    }
}

impl<T> std::ops::Mul for &Matrix<T>
where
    T: Element + Copy + std::ops::Add<Output = T> + std::ops::Mul<Output = T>,
{
    type Output = Matrix<T>;

    fn mul(self, rhs: Self) -> Self::Output {
        match self.mat_mul(rhs) {
            Ok(product) => product,
            Err(e) => panic!("{e}"),
        }
    }
}

impl From<&Matrix<f64>> for na::DMatrix<f64> {
    fn from(m: &Matrix<f64>) -> Self {
        na::DMatrix::from_row_slice(m.rows, m.cols, m.as_slice())
    }
}

impl From<&na::DMatrix<f64>> for Matrix<f64> {
    fn from(m: &na::DMatrix<f64>) -> Self {
        Matrix::from_fn(m.nrows(), m.ncols(), |row, col| m[(row, col)])
    }
}

//
// tests
//
