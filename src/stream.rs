//! Whitespace-separated text serialization for matrices and tracking records.
//!
//! Values are written as plain numeric tokens so that records can be sent
//! between partitions or dumped for inspection.
//! Floats use Rust's shortest round-trip representation,
//! so reading back what was written gives bit-identical values.

use std::io;

use nalgebra as na;

use crate::matrix::{Element, Matrix, SquareMatrix};

/// Error in reading or writing a streamed value.
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    /// Underlying reader or writer failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The input ended before a complete value was read.
    #[error("Unexpected end of input")]
    UnexpectedEnd,
    /// A token could not be parsed as the expected type.
    #[error("Could not parse token {token:?}")]
    Parse {
        /// The offending token.
        token: String,
    },
    /// A size read from the input is negative or inconsistent.
    #[error("Invalid dimensions in input: {0}")]
    InvalidDimension(String),
}

/// Iterator over the whitespace-separated tokens of a string.
pub struct Tokens<'a> {
    inner: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    /// Tokenize a string.
    pub fn new(source: &'a str) -> Self {
        Self {
            inner: source.split_whitespace(),
        }
    }

    /// Parse the next token as `V`.
    pub fn next_parsed<V: std::str::FromStr>(&mut self) -> Result<V, StreamError> {
        let token = self.inner.next().ok_or(StreamError::UnexpectedEnd)?;
        token.parse().map_err(|_| StreamError::Parse {
            token: token.to_string(),
        })
    }

    /// Whether all tokens have been consumed.
    pub fn is_finished(&mut self) -> bool {
        self.inner.clone().next().is_none()
    }
}

/// Values that can be written to and read from a text stream.
pub trait Streamable: Sized {
    /// Write the value as whitespace-separated tokens.
    /// No trailing separator is written.
    fn write_to<W: io::Write>(&self, w: &mut W) -> Result<(), StreamError>;

    /// Read a value from a token stream.
    fn read_tokens(tokens: &mut Tokens<'_>) -> Result<Self, StreamError>;

    /// Read a value from a reader containing exactly one value.
    fn read_from<R: io::Read>(r: &mut R) -> Result<Self, StreamError> {
        let mut source = String::new();
        r.read_to_string(&mut source)?;
        let mut tokens = Tokens::new(&source);
        Self::read_tokens(&mut tokens)
    }

    /// Write the value into a new string.
    fn to_stream_string(&self) -> Result<String, StreamError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        String::from_utf8(buf).map_err(|e| StreamError::Parse {
            token: e.to_string(),
        })
    }
}

impl Streamable for f64 {
    fn write_to<W: io::Write>(&self, w: &mut W) -> Result<(), StreamError> {
        write!(w, "{self:?}")?;
        Ok(())
    }

    fn read_tokens(tokens: &mut Tokens<'_>) -> Result<Self, StreamError> {
        tokens.next_parsed()
    }
}

impl Streamable for i64 {
    fn write_to<W: io::Write>(&self, w: &mut W) -> Result<(), StreamError> {
        write!(w, "{self}")?;
        Ok(())
    }

    fn read_tokens(tokens: &mut Tokens<'_>) -> Result<Self, StreamError> {
        tokens.next_parsed()
    }
}

impl<const R: usize, const C: usize> Streamable for na::SMatrix<f64, R, C> {
    fn write_to<W: io::Write>(&self, w: &mut W) -> Result<(), StreamError> {
        write_separated(w, self.iter())
    }

    fn read_tokens(tokens: &mut Tokens<'_>) -> Result<Self, StreamError> {
        let mut out = Self::zeros();
        // nalgebra storage is column-major, which is also the iteration order
        for v in out.iter_mut() {
            *v = f64::read_tokens(tokens)?;
        }
        Ok(out)
    }
}

/// Matrices are written as a `rows cols` header
/// followed by the elements in row-major order.
impl<T> Streamable for Matrix<T>
where
    T: Element + Streamable,
{
    fn write_to<W: io::Write>(&self, w: &mut W) -> Result<(), StreamError> {
        write!(w, "{} {}", self.rows(), self.cols())?;
        for v in self.iter() {
            write!(w, " ")?;
            v.write_to(w)?;
        }
        Ok(())
    }

    fn read_tokens(tokens: &mut Tokens<'_>) -> Result<Self, StreamError> {
        let rows = read_size(tokens, "rows")?;
        let cols = read_size(tokens, "cols")?;
        let len = rows.checked_mul(cols).ok_or_else(|| {
            StreamError::InvalidDimension(format!("{rows}x{cols} overflows the address space"))
        })?;
        let data = (0..len)
            .map(|_| T::read_tokens(tokens))
            .collect::<Result<Vec<T>, _>>()?;
        Matrix::from_row_major(rows, cols, data)
            .map_err(|e| StreamError::InvalidDimension(e.to_string()))
    }
}

/// Same format as [`Matrix`]; reading fails on a rectangular header.
impl<T> Streamable for SquareMatrix<T>
where
    T: Element + Streamable,
{
    fn write_to<W: io::Write>(&self, w: &mut W) -> Result<(), StreamError> {
        self.as_matrix().write_to(w)
    }

    fn read_tokens(tokens: &mut Tokens<'_>) -> Result<Self, StreamError> {
        let m = Matrix::<T>::read_tokens(tokens)?;
        SquareMatrix::try_from(m).map_err(|e| StreamError::InvalidDimension(e.to_string()))
    }
}

fn read_size(tokens: &mut Tokens<'_>, what: &str) -> Result<usize, StreamError> {
    let size: i64 = tokens.next_parsed()?;
    usize::try_from(size)
        .map_err(|_| StreamError::InvalidDimension(format!("{what} = {size} is not a valid size")))
}

fn write_separated<'v, W: io::Write>(
    w: &mut W,
    values: impl Iterator<Item = &'v f64>,
) -> Result<(), StreamError> {
    for (i, v) in values.enumerate() {
        if i > 0 {
            write!(w, " ")?;
        }
        v.write_to(w)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_stream_format() {
        let m = Matrix::from_row_major(2, 3, vec![1.0, 2.5, -3.0, 0.0, 1e-300, 7.0]).unwrap();
        let s = m.to_stream_string().unwrap();
        assert!(s.starts_with("2 3 1.0 2.5"), "got {s}");
        let back = Matrix::<f64>::read_from(&mut s.as_bytes()).unwrap();
        assert_eq!(back, m);

        let ints = Matrix::<i64>::read_from(&mut "2 2\n1 2\n3 4\n".as_bytes()).unwrap();
        assert_eq!(ints.row(1), &[3, 4]);
    }

    #[test]
    fn vector_valued_matrix() {
        type V2 = na::Vector2<f64>;
        let m = Matrix::from_fn(1, 2, |_, col| V2::new(col as f64, 0.5));
        let s = m.to_stream_string().unwrap();
        assert_eq!(s, "1 2 0.0 0.5 1.0 0.5");
        assert_eq!(Matrix::<V2>::read_from(&mut s.as_bytes()).unwrap(), m);
    }

    #[test]
    fn square_matrix_stream() {
        let m = SquareMatrix::from_row_major(2, vec![4.0, -1.0, -1.0, 4.0]).unwrap();
        let s = m.to_stream_string().unwrap();
        assert_eq!(s, "2 2 4.0 -1.0 -1.0 4.0");
        assert_eq!(SquareMatrix::<f64>::read_from(&mut s.as_bytes()).unwrap(), m);

        let read = |s: &str| SquareMatrix::<f64>::read_from(&mut s.as_bytes());
        assert!(matches!(
            read("1 2 1.0 2.0"),
            Err(StreamError::InvalidDimension(_))
        ));
        assert_eq!(read("0 0").unwrap().n(), 0);
    }

    #[test]
    fn malformed_input() {
        let read = |s: &str| Matrix::<f64>::read_from(&mut s.as_bytes());
        assert!(matches!(read("-1 2"), Err(StreamError::InvalidDimension(_))));
        assert!(matches!(read("2 2 1 2 3"), Err(StreamError::UnexpectedEnd)));
        assert!(matches!(read("1 1 x"), Err(StreamError::Parse { .. })));
        assert!(matches!(read("1.5 1 0"), Err(StreamError::Parse { .. })));
        assert_eq!(read("0 0").unwrap().dims(), (0, 0));
    }

    #[test]
    fn tokens_track_end() {
        let mut t = Tokens::new(" 1  2 ");
        assert_eq!(t.next_parsed::<i64>().unwrap(), 1);
        assert!(!t.is_finished());
        assert_eq!(t.next_parsed::<i64>().unwrap(), 2);
        assert!(t.is_finished());
    }
}
