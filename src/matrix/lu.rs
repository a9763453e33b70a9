//! LU decomposition with partial pivoting.

use super::{MatrixError, MatrixTolerances, SquareMatrix};

/// The result of an LU decomposition `PA = LU`.
///
/// `L` and `U` are packed into a single matrix:
/// the strict lower triangle holds `L` (whose unit diagonal is implicit)
/// and the rest holds `U`.
/// If elimination hit a near-zero pivot it stops early and the decomposition
/// is marked singular; the packed factors are then only partially reduced.
#[derive(Clone, Debug)]
pub struct LuDecomposed {
    factors: SquareMatrix<f64>,
    permutation: Vec<usize>,
    sign: f64,
    singular: bool,
}

struct Pivoting {
    permutation: Vec<usize>,
    sign: f64,
    singular: bool,
}

/// Gaussian elimination in place, choosing the largest remaining
/// element of each column as the pivot.
fn eliminate(a: &mut SquareMatrix<f64>, pivot_tol: f64) -> Pivoting {
    let n = a.n();
    let threshold = pivot_tol * a.max_magnitude();
    let mut permutation: Vec<usize> = (0..n).collect();
    let mut sign = 1.0;

    for k in 0..n {
        let mut pivot_row = k;
        let mut pivot_mag = a[(k, k)].abs();
        for row in k + 1..n {
            let mag = a[(row, k)].abs();
            if mag > pivot_mag {
                pivot_row = row;
                pivot_mag = mag;
            }
        }

        if pivot_mag <= threshold {
            return Pivoting {
                permutation,
                sign,
                singular: true,
            };
        }

        if pivot_row != k {
            a.swap_rows(k, pivot_row);
            permutation.swap(k, pivot_row);
            sign = -sign;
        }

        let pivot = a[(k, k)];
        for row in k + 1..n {
            let factor = a[(row, k)] / pivot;
            a[(row, k)] = factor;
            if factor == 0.0 {
                continue;
            }
            for col in k + 1..n {
                let upper = a[(k, col)];
                a[(row, col)] -= factor * upper;
            }
        }
    }

    Pivoting {
        permutation,
        sign,
        singular: false,
    }
}

/// Decompose a matrix with the default [`MatrixTolerances`].
pub fn lu_decompose(matrix: SquareMatrix<f64>) -> LuDecomposed {
    lu_decompose_with(matrix, &MatrixTolerances::default())
}

/// Decompose a matrix, treating pivots at most `tol.pivot` times
/// the largest element magnitude as zero.
pub fn lu_decompose_with(mut matrix: SquareMatrix<f64>, tol: &MatrixTolerances) -> LuDecomposed {
    let Pivoting {
        permutation,
        sign,
        singular,
    } = eliminate(&mut matrix, tol.pivot);
    LuDecomposed {
        factors: matrix,
        permutation,
        sign,
        singular,
    }
}

/// Determinant of an already decomposed matrix.
///
/// Exactly zero if the decomposition is singular.
pub fn det_decomposed(lu: &LuDecomposed) -> f64 {
    if lu.singular {
        return 0.0;
    }
    lu.sign * lu.factors.diag().iter().product::<f64>()
}

/// Determinant of a square matrix, leaving the matrix untouched.
///
/// ```
/// # use meshkernels::{det, SquareMatrix};
/// let m = SquareMatrix::from_row_major(2, vec![0.0, 1.0, 1.0, 0.0]).unwrap();
/// assert_eq!(det(&m), -1.0);
/// assert_eq!(det(&SquareMatrix::<f64>::zeros(0)), 1.0);
/// ```
pub fn det(matrix: &SquareMatrix<f64>) -> f64 {
    det_decomposed(&lu_decompose(matrix.clone()))
}

/// Determinant of a square matrix, overwriting it with its packed LU factors.
pub fn det_in_place(matrix: &mut SquareMatrix<f64>) -> f64 {
    det_in_place_with(matrix, &MatrixTolerances::default())
}

/// [`det_in_place`] with a configured pivot tolerance.
pub fn det_in_place_with(matrix: &mut SquareMatrix<f64>, tol: &MatrixTolerances) -> f64 {
    let pivoting = eliminate(matrix, tol.pivot);
    if pivoting.singular {
        return 0.0;
    }
    pivoting.sign * matrix.diag().iter().product::<f64>()
}

impl LuDecomposed {
    /// Size of the decomposed matrix.
    #[inline]
    pub fn n(&self) -> usize {
        self.factors.n()
    }

    /// Whether elimination stopped on a near-zero pivot.
    #[inline]
    pub fn is_singular(&self) -> bool {
        self.singular
    }

    /// Sign of the row permutation, `1.0` or `-1.0`.
    #[inline]
    pub fn sign(&self) -> f64 {
        self.sign
    }

    /// Row permutation: row `i` of `PA` is row `permutation()[i]` of `A`.
    #[inline]
    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    /// The packed factors.
    #[inline]
    pub fn factors(&self) -> &SquareMatrix<f64> {
        &self.factors
    }

    /// Take ownership of the packed factors.
    pub fn into_factors(self) -> SquareMatrix<f64> {
        self.factors
    }

    /// The unit lower triangular factor `L`.
    pub fn lower(&self) -> SquareMatrix<f64> {
        SquareMatrix::from_fn(self.n(), |row, col| match row.cmp(&col) {
            std::cmp::Ordering::Greater => self.factors[(row, col)],
            std::cmp::Ordering::Equal => 1.0,
            std::cmp::Ordering::Less => 0.0,
        })
    }

    /// The upper triangular factor `U`.
    pub fn upper(&self) -> SquareMatrix<f64> {
        SquareMatrix::from_fn(self.n(), |row, col| {
            if row <= col {
                self.factors[(row, col)]
            } else {
                0.0
            }
        })
    }

    /// Determinant of the decomposed matrix. See [`det_decomposed`].
    #[inline]
    pub fn det(&self) -> f64 {
        det_decomposed(self)
    }

    /// Solve `Ax = b` by forward and back substitution.
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>, MatrixError> {
        let n = self.n();
        if b.len() != n {
            return Err(MatrixError::InvalidDimension(format!(
                "right-hand side of length {} for a {n}x{n} system",
                b.len()
            )));
        }
        if self.singular {
            return Err(MatrixError::Singular);
        }

        // Ly = Pb
        let mut x: Vec<f64> = self.permutation.iter().map(|&p| b[p]).collect();
        for row in 1..n {
            let lower = &self.factors.row(row)[..row];
            let sum: f64 = lower.iter().zip(&x[..row]).map(|(l, y)| l * y).sum();
            x[row] -= sum;
        }
        // Ux = y
        for row in (0..n).rev() {
            let upper = &self.factors.row(row)[row + 1..];
            let sum: f64 = upper.iter().zip(&x[row + 1..]).map(|(u, v)| u * v).sum();
            x[row] = (x[row] - sum) / self.factors[(row, row)];
        }
        Ok(x)
    }

    /// The inverse of the decomposed matrix, one column solve at a time.
    pub fn inverse(&self) -> Result<SquareMatrix<f64>, MatrixError> {
        let n = self.n();
        let mut inv = SquareMatrix::zeros(n);
        let mut unit = vec![0.0; n];
        for col in 0..n {
            unit[col] = 1.0;
            let x = self.solve(&unit)?;
            unit[col] = 0.0;
            for (row, v) in x.into_iter().enumerate() {
                inv[(row, col)] = v;
            }
        }
        Ok(inv)
    }
}

//
// tests
//
