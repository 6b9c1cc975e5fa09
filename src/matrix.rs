//! Dense row-major matrix of ordinal codes.
//!
//! One row per record, one column per attribute. Column `i` holds codes in
//! `[0, kᵢ)` where `kᵢ` is attribute `i`'s domain size; the range is checked
//! by the consumers that know the domains ([`crate::tensor::CountTensor`],
//! [`crate::encoder::decode`]).

use crate::error::{Result, SynthError};

/// Integer matrix `n_rows × n_cols` of encoded category codes.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "MatrixRepr"))]
pub struct EncodedMatrix {
    n_cols: usize,
    data: Vec<u32>,
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct MatrixRepr {
    n_cols: usize,
    data: Vec<u32>,
}

#[cfg(feature = "serde")]
impl TryFrom<MatrixRepr> for EncodedMatrix {
    type Error = SynthError;

    fn try_from(repr: MatrixRepr) -> Result<Self> {
        Self::from_vec(repr.n_cols, repr.data)
    }
}

impl EncodedMatrix {
    /// Empty matrix with `n_cols` columns.
    pub fn new(n_cols: usize) -> Self {
        Self { n_cols, data: Vec::new() }
    }

    /// Empty matrix with room for `n_rows` rows.
    pub fn with_capacity(n_cols: usize, n_rows: usize) -> Self {
        Self { n_cols, data: Vec::with_capacity(n_cols.saturating_mul(n_rows)) }
    }

    /// Wrap a row-major buffer. `data.len()` must be a multiple of `n_cols`.
    pub fn from_vec(n_cols: usize, data: Vec<u32>) -> Result<Self> {
        if n_cols == 0 {
            return Err(SynthError::config("encoded matrix needs at least one column"));
        }
        if data.len() % n_cols != 0 {
            return Err(SynthError::config(format!(
                "buffer of {} codes is not a whole number of {}-column rows",
                data.len(),
                n_cols
            )));
        }
        Ok(Self { n_cols, data })
    }

    /// Build from explicit rows; every row must have the same width.
    pub fn from_rows<R: AsRef<[u32]>>(n_cols: usize, rows: &[R]) -> Result<Self> {
        let mut m = Self::with_capacity(n_cols, rows.len());
        for row in rows {
            m.push_row(row.as_ref())?;
        }
        Ok(m)
    }

    /// Append one row.
    pub fn push_row(&mut self, row: &[u32]) -> Result<()> {
        if row.len() != self.n_cols {
            return Err(SynthError::config(format!(
                "row has {} codes, expected {}",
                row.len(),
                self.n_cols
            )));
        }
        self.data.extend_from_slice(row);
        Ok(())
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        if self.n_cols == 0 {
            0
        } else {
            self.data.len() / self.n_cols
        }
    }

    /// Number of columns (attributes).
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// `(n_rows, n_cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows(), self.n_cols)
    }

    /// Row `i`.
    ///
    /// # Panics
    /// If `i >= n_rows()`.
    pub fn row(&self, i: usize) -> &[u32] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    /// Iterate over rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[u32]> + '_ {
        // chunks_exact panics on a zero chunk size; an empty slice yields nothing.
        self.data.chunks_exact(self.n_cols.max(1))
    }

    /// Copy out column `j`.
    pub fn column(&self, j: usize) -> Vec<u32> {
        self.rows().map(|r| r[j]).collect()
    }

    /// Raw row-major codes.
    pub fn as_slice(&self) -> &[u32] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.data
    }
}
