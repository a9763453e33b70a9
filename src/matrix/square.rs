use itertools::iproduct;

use super::{Element, Matrix, MatrixBlock, MatrixError, UnitElement};

/// Tolerances for the approximate checks on square matrices.
///
/// The defaults are suitable for `f64` matrices with entries of order one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatrixTolerances {
    /// Relative tolerance for [`SquareMatrix::is_symmetric_with`].
    /// Default `1e-12`.
    pub symmetric: f64,
    /// Magnitude below which an element counts as zero.
    /// Used as an absolute floor for the symmetry check
    /// and for the off-band test in [`SquareMatrix::is_tridiagonal_with`].
    /// Default `1e-15`.
    pub zero: f64,
    /// A pivot whose magnitude is at most this times the largest
    /// element magnitude of the input ends LU decomposition as singular.
    /// Default `1e-14`.
    pub pivot: f64,
}

impl Default for MatrixTolerances {
    fn default() -> Self {
        Self {
            symmetric: 1e-12,
            zero: 1e-15,
            pivot: 1e-14,
        }
    }
}

/// A [`Matrix`] with an equal number of rows and columns.
///
/// Derefs to the underlying `Matrix` for read access;
/// mutating operations that could break squareness are not exposed.
#[derive(Clone, Debug, PartialEq)]
pub struct SquareMatrix<T> {
    inner: Matrix<T>,
}

impl<T: Element> SquareMatrix<T> {
    /// Create an `n x n` matrix of zeros.
    pub fn zeros(n: usize) -> Self {
        Self {
            inner: Matrix::zeros(n, n),
        }
    }

    /// Create an `n x n` matrix with every element set to `value`.
    pub fn from_element(n: usize, value: T) -> Self {
        Self {
            inner: Matrix::from_element(n, n, value),
        }
    }

    /// Create an `n x n` matrix by calling `f(row, col)` for each element.
    pub fn from_fn(n: usize, f: impl FnMut(usize, usize) -> T) -> Self {
        Self {
            inner: Matrix::from_fn(n, n, f),
        }
    }

    /// Create an `n x n` matrix from elements in row-major order.
    pub fn from_row_major(n: usize, data: Vec<T>) -> Result<Self, MatrixError> {
        Ok(Self {
            inner: Matrix::from_row_major(n, n, data)?,
        })
    }

    /// Copy a square sub-block of another matrix.
    pub fn from_block(block: &MatrixBlock<'_, T>) -> Result<Self, MatrixError> {
        Self::try_from(block.to_matrix())
    }

    /// Resize to `n x n`, keeping the overlapping elements
    /// and zero-filling the rest.
    ///
    /// # Panics
    ///
    /// If `n * n` overflows `usize`.
    pub fn resize(&mut self, n: usize) {
        self.inner.resize(n, n);
    }

    /// Like [`resize`][Self::resize], but fails on overflow instead of panicking.
    pub fn try_resize(&mut self, n: usize) -> Result<(), MatrixError> {
        self.inner.try_resize(n, n)
    }

    /// Transpose of the matrix.
    pub fn transpose(&self) -> Self {
        Self {
            inner: self.inner.transpose(),
        }
    }

    /// Whether the matrix is symmetric up to the default [`MatrixTolerances`].
    pub fn is_symmetric(&self) -> bool {
        self.is_symmetric_with(&MatrixTolerances::default())
    }

    /// Whether `|a(i,j) - a(j,i)|` is within tolerance for every `i, j`.
    ///
    /// Tolerance is relative to the larger of the two magnitudes,
    /// with `tol.zero` as an absolute floor.
    pub fn is_symmetric_with(&self, tol: &MatrixTolerances) -> bool {
        let n = self.n();
        iproduct!(0..n, 0..n)
            .filter(|(row, col)| row < col)
            .all(|(row, col)| {
                let upper = &self[(row, col)];
                let lower = &self[(col, row)];
                let scale = f64::max(upper.magnitude(), lower.magnitude());
                upper.distance(lower) <= f64::max(tol.zero, tol.symmetric * scale)
            })
    }

    /// Whether the matrix is tridiagonal up to the default [`MatrixTolerances`].
    pub fn is_tridiagonal(&self) -> bool {
        self.is_tridiagonal_with(&MatrixTolerances::default())
    }

    /// Whether every element outside the main diagonal
    /// and its two neighbouring diagonals is within `tol.zero` of zero.
    pub fn is_tridiagonal_with(&self, tol: &MatrixTolerances) -> bool {
        let n = self.n();
        iproduct!(0..n, 0..n)
            .filter(|(row, col)| row.abs_diff(*col) > 1)
            .all(|(row, col)| self[(row, col)].magnitude() <= tol.zero)
    }
}

impl<T> SquareMatrix<T> {
    /// The size `n` of the `n x n` matrix.
    #[inline]
    pub fn n(&self) -> usize {
        self.inner.rows()
    }

    /// Change the size to `n x n` without touching the storage.
    /// Fails if the storage holds fewer than `n * n` elements.
    pub fn shallow_resize(&mut self, n: usize) -> Result<(), MatrixError> {
        self.inner.shallow_reshape(n, n)
    }

    /// Swap two rows in place.
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        self.inner.swap_rows(a, b);
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        self.inner.fill(value);
    }

    /// The elements in row-major order, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.inner.as_mut_slice()
    }

    /// Borrow as a general matrix.
    #[inline]
    pub fn as_matrix(&self) -> &Matrix<T> {
        &self.inner
    }

    /// Unwrap into a general matrix.
    #[inline]
    pub fn into_inner(self) -> Matrix<T> {
        self.inner
    }
}

impl<T: UnitElement> SquareMatrix<T> {
    /// Create an `n x n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n);
        m.set_identity();
        m
    }

    /// Overwrite the matrix with the identity.
    pub fn set_identity(&mut self) {
        self.fill(T::zero());
        for i in 0..self.n() {
            self[(i, i)] = T::one();
        }
    }
}

impl<T> TryFrom<Matrix<T>> for SquareMatrix<T> {
    type Error = MatrixError;

    fn try_from(m: Matrix<T>) -> Result<Self, Self::Error> {
        if m.rows() != m.cols() {
            return Err(MatrixError::NotSquare {
                rows: m.rows(),
                cols: m.cols(),
            });
        }
        Ok(Self { inner: m })
    }
}

impl<T> From<SquareMatrix<T>> for Matrix<T> {
    fn from(m: SquareMatrix<T>) -> Self {
        m.inner
    }
}

impl<T> std::ops::Deref for SquareMatrix<T> {
    type Target = Matrix<T>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> std::ops::Index<(usize, usize)> for SquareMatrix<T> {
    type Output = T;

    #[inline]
    fn index(&self, idx: (usize, usize)) -> &Self::Output {
        &self.inner[idx]
    }
}

impl<T> std::ops::IndexMut<(usize, usize)> for SquareMatrix<T> {
    #[inline]
    fn index_mut(&mut self, idx: (usize, usize)) -> &mut Self::Output {
        &mut self.inner[idx]
    }
}

impl<T> std::ops::Mul for &SquareMatrix<T>
where
    T: Element + Copy + std::ops::Add<Output = T> + std::ops::Mul<Output = T>,
{
    type Output = SquareMatrix<T>;

    fn mul(self, rhs: Self) -> Self::Output {
        SquareMatrix {
            inner: &self.inner * &rhs.inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra as na;

    #[test]
    fn rectangular_source_is_rejected() {
        let rect = Matrix::<f64>::zeros(2, 3);
        assert_eq!(
            SquareMatrix::try_from(rect),
            Err(MatrixError::NotSquare { rows: 2, cols: 3 })
        );
        let sq = SquareMatrix::try_from(Matrix::<f64>::zeros(3, 3)).unwrap();
        assert_eq!(sq.n(), 3);
        assert!(SquareMatrix::from_row_major(2, vec![1.0; 3]).is_err());
    }

    #[test]
    fn identity_is_symmetric_and_tridiagonal() {
        for n in 0..6 {
            let id = SquareMatrix::<f64>::identity(n);
            for (row, col) in iproduct!(0..n, 0..n) {
                let expected = if row == col { 1.0 } else { 0.0 };
                assert_eq!(id[(row, col)], expected);
            }
            assert!(id.is_symmetric(), "identity({n}) should be symmetric");
            assert!(id.is_tridiagonal(), "identity({n}) should be tridiagonal");
        }
    }

    #[test]
    fn symmetry_tolerates_roundoff() {
        #[rustfmt::skip]
        let mut m = SquareMatrix::from_row_major(3, vec![
            4.0, 1.0, 2.0,
            1.0, 5.0, 3.0,
            2.0, 3.0, 6.0,
        ]).unwrap();
        assert!(m.is_symmetric());

        m[(0, 2)] = 2.0 + 1e-15;
        assert!(m.is_symmetric(), "round-off sized asymmetry is accepted");

        m[(0, 2)] = 2.001;
        assert!(!m.is_symmetric());
        assert!(m.is_symmetric_with(&MatrixTolerances {
            symmetric: 1e-2,
            ..Default::default()
        }));
    }

    #[test]
    fn tridiagonal_band() {
        let mut m = SquareMatrix::from_fn(4, |row, col| {
            if row.abs_diff(col) <= 1 {
                1.0 + (row + col) as f64
            } else {
                0.0
            }
        });
        assert!(m.is_tridiagonal());
        assert!(m.is_symmetric());

        m[(0, 2)] = 1e-3;
        assert!(!m.is_tridiagonal());
        m[(0, 2)] = 1e-16;
        assert!(m.is_tridiagonal(), "near-zero entries count as zero");
    }

    #[test]
    fn vector_valued_symmetry() {
        type V2 = na::Vector2<f64>;
        let mut m = SquareMatrix::<V2>::zeros(2);
        m[(0, 1)] = V2::new(1.0, 2.0);
        assert!(!m.is_symmetric());
        m[(1, 0)] = V2::new(1.0, 2.0);
        assert!(m.is_symmetric());
    }

    #[test]
    fn resizing_stays_square() {
        let mut m = SquareMatrix::<f64>::identity(4);
        m.resize(2);
        assert_eq!(m.dims(), (2, 2));
        assert_eq!(m, SquareMatrix::identity(2));
        m.resize(3);
        assert_eq!(m[(2, 2)], 0.0, "new diagonal entries are zero, not one");

        let mut big = SquareMatrix::<f64>::identity(3);
        big.shallow_resize(2).unwrap();
        assert_eq!(big.dims(), (2, 2));
        assert!(big.shallow_resize(4).is_err());
    }

    #[test]
    fn square_from_block() {
        let m = Matrix::from_fn(3, 4, |row, col| (row + col) as f64);
        let b = m.block(1, 1, 2, 2).unwrap();
        let sq = SquareMatrix::from_block(&b).unwrap();
        assert_eq!(sq.as_slice(), &[2.0, 3.0, 3.0, 4.0]);
        assert!(sq.is_symmetric());
        let rect = m.block(0, 0, 2, 3).unwrap();
        assert!(matches!(
            SquareMatrix::from_block(&rect),
            Err(MatrixError::NotSquare { .. })
        ));
    }

    #[test]
    fn square_product() {
        let a = SquareMatrix::from_fn(3, |row, col| (row * 3 + col) as f64);
        let id = SquareMatrix::identity(3);
        assert_eq!(&a * &id, a);
        assert_eq!(&id * &a, a);
    }
}
