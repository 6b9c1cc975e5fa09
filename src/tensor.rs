/*
 * This source code is licensed under the Business Source License 1.1.
 */

//! Dense joint tensors over encoded attributes.
//!
//! A [`Tensor`] has one axis per attribute (axis `i` of length `kᵢ`) and
//! stores its cells in a flat row-major buffer: the last axis varies
//! fastest. Two element types are used:
//!
//! - [`CountTensor`] (`u64`): empirical observation counts.
//! - [`MassTensor`] (`f64`): unnormalised probability mass.
//!
//! # Size budget
//!
//! The element count `Π kᵢ` is computed with overflow-checked arithmetic and
//! compared against a caller-supplied cap *before* any buffer is allocated
//! ([`SynthError::SizeLimitExceeded`]). At most [`MAX_AXES`] axes are
//! supported.
//!
//! # Invariants
//! - Every axis has length ≥ 1.
//! - `data.len() == Π dims`.
//! - Mass entries are finite and ≥ 0 for tensors built by this crate.

use core::ops::AddAssign;

use heapless::Vec as HVec;

use crate::error::{Result, SynthError};
use crate::matrix::EncodedMatrix;

/// Maximum number of axes (attributes) in a joint tensor.
pub const MAX_AXES: usize = 16;

/// Default cap on joint tensor cells: 2²⁴ (128 MiB of `f64` mass).
pub const DEFAULT_MAX_CELLS: usize = 1 << 24;

/// Fixed-capacity list of per-axis lengths or strides.
pub type AxisVec = HVec<usize, MAX_AXES>;

// ─── Shape ───────────────────────────────────────────────────────────────────

/// Axis lengths plus the derived row-major strides.
///
/// Deserialization rebuilds the strides from `dims`; stored `strides` or
/// `len` that disagree with them are rejected.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "ShapeRepr", into = "ShapeRepr"))]
pub struct Shape {
    dims: AxisVec,
    strides: AxisVec,
    len: usize,
}

impl Shape {
    /// Validate `dims` against the cell budget and build the shape.
    ///
    /// Errors:
    /// - [`SynthError::Configuration`] for zero axes, more than [`MAX_AXES`]
    ///   axes, or a zero-length axis.
    /// - [`SynthError::SizeLimitExceeded`] when `Π dims > max_cells`.
    pub fn new(dims: &[usize], max_cells: usize) -> Result<Self> {
        if dims.is_empty() {
            return Err(SynthError::config("a tensor needs at least one axis"));
        }
        if dims.len() > MAX_AXES {
            return Err(SynthError::config(format!(
                "{} axes requested, at most {} are supported",
                dims.len(),
                MAX_AXES
            )));
        }
        if let Some(axis) = dims.iter().position(|&k| k == 0) {
            return Err(SynthError::config(format!("axis {axis} has length zero")));
        }

        let cells = dims.iter().fold(1u128, |acc, &k| acc.saturating_mul(k as u128));
        if cells > max_cells as u128 {
            return Err(SynthError::SizeLimitExceeded { cells, limit: max_cells });
        }

        Ok(Self::from_dims_unchecked(dims))
    }

    /// Build a shape already known to be within budget (e.g. a projection of
    /// an existing shape).
    pub(crate) fn from_dims_unchecked(dims: &[usize]) -> Self {
        let mut strides = AxisVec::new();
        let mut acc = 1usize;
        // Fill strides back to front, then reverse into place.
        for &k in dims.iter().rev() {
            let _ = strides.push(acc);
            acc *= k;
        }
        strides.reverse();
        let mut d = AxisVec::new();
        for &k in dims {
            let _ = d.push(k);
        }
        Self { dims: d, strides, len: acc }
    }

    /// Axis lengths.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Row-major strides.
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false for a valid shape; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flat offset of `coords`, or `None` when out of bounds or of the
    /// wrong rank.
    pub fn offset(&self, coords: &[usize]) -> Option<usize> {
        if coords.len() != self.ndim() {
            return None;
        }
        let mut off = 0;
        for ((&c, &k), &s) in coords.iter().zip(self.dims.iter()).zip(self.strides.iter()) {
            if c >= k {
                return None;
            }
            off += c * s;
        }
        Some(off)
    }
}

/// Wire form of a [`Shape`].
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct ShapeRepr {
    dims: Vec<usize>,
    #[serde(default)]
    strides: Option<Vec<usize>>,
    #[serde(default)]
    len: Option<usize>,
}

#[cfg(feature = "serde")]
impl TryFrom<ShapeRepr> for Shape {
    type Error = SynthError;

    fn try_from(repr: ShapeRepr) -> Result<Self> {
        // The buffer being described already exists, so no budget applies here.
        let shape = Shape::new(&repr.dims, usize::MAX)?;
        if repr.strides.as_deref().is_some_and(|s| s != shape.strides()) {
            return Err(SynthError::config(format!(
                "strides {:?} do not match dims {:?}",
                repr.strides.unwrap_or_default(),
                repr.dims
            )));
        }
        if repr.len.is_some_and(|len| len != shape.len()) {
            return Err(SynthError::config(format!(
                "len {:?} does not match dims {:?} ({} cells)",
                repr.len,
                repr.dims,
                shape.len()
            )));
        }
        Ok(shape)
    }
}

#[cfg(feature = "serde")]
impl From<Shape> for ShapeRepr {
    fn from(shape: Shape) -> Self {
        Self {
            dims: shape.dims.to_vec(),
            strides: Some(shape.strides.to_vec()),
            len: Some(shape.len),
        }
    }
}

// ─── Tensor ──────────────────────────────────────────────────────────────────

/// Dense tensor with a validated [`Shape`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(
        try_from = "TensorRepr<T>",
        bound(deserialize = "T: Copy + serde::Deserialize<'de>")
    )
)]
pub struct Tensor<T> {
    shape: Shape,
    data: Vec<T>,
}

/// Wire form of a [`Tensor`]; the buffer length is checked against the shape.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct TensorRepr<T> {
    shape: Shape,
    data: Vec<T>,
}

#[cfg(feature = "serde")]
impl<T: Copy> TryFrom<TensorRepr<T>> for Tensor<T> {
    type Error = SynthError;

    fn try_from(repr: TensorRepr<T>) -> Result<Self> {
        Tensor::from_vec(repr.shape, repr.data)
    }
}

/// Empirical observation counts.
pub type CountTensor = Tensor<u64>;

/// Unnormalised probability mass.
pub type MassTensor = Tensor<f64>;

impl<T: Copy> Tensor<T> {
    /// Tensor with every cell set to `value`.
    pub fn filled(shape: Shape, value: T) -> Self {
        let data = vec![value; shape.len()];
        Self { shape, data }
    }

    /// Wrap an existing buffer; its length must match the shape.
    pub fn from_vec(shape: Shape, data: Vec<T>) -> Result<Self> {
        if data.len() != shape.len() {
            return Err(SynthError::config(format!(
                "buffer holds {} cells, shape {:?} needs {}",
                data.len(),
                shape.dims(),
                shape.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Shape of the tensor.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Axis lengths.
    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True only for a tensor with no cells (never produced by this crate).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat row-major cells.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable flat row-major cells.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Cell at `coords`.
    pub fn get(&self, coords: &[usize]) -> Option<T> {
        self.shape.offset(coords).map(|i| self.data[i])
    }

    /// Apply `f` to every cell, producing a new tensor of the same shape.
    pub fn map<U: Copy, F: FnMut(T) -> U>(&self, f: F) -> Tensor<U> {
        Tensor { shape: self.shape.clone(), data: self.data.iter().copied().map(f).collect() }
    }

    /// Consume into the flat buffer.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T: Copy + Default + AddAssign> Tensor<T> {
    /// Sum of every cell.
    pub fn sum(&self) -> T {
        let mut acc = T::default();
        for &x in &self.data {
            acc += x;
        }
        acc
    }
}

// ─── CountTensor ─────────────────────────────────────────────────────────────

impl CountTensor {
    /// Count rows of `matrix` per coordinate tuple.
    ///
    /// `dims[i]` is attribute `i`'s domain size. The cell budget is checked
    /// before allocating; every code is range-checked against its axis.
    /// The result does not depend on row order.
    ///
    /// Counts are `u64`: a cell can never exceed the row count, which always
    /// fits.
    pub fn from_matrix(matrix: &EncodedMatrix, dims: &[usize], max_cells: usize) -> Result<Self> {
        if matrix.n_cols() != dims.len() {
            return Err(SynthError::config(format!(
                "matrix has {} columns but {} domain sizes were given",
                matrix.n_cols(),
                dims.len()
            )));
        }
        let shape = Shape::new(dims, max_cells)?;
        let mut counts = Self::filled(shape, 0u64);

        for (r, row) in matrix.rows().enumerate() {
            let mut off = 0usize;
            for (axis, ((&code, &k), &s)) in row
                .iter()
                .zip(counts.shape.dims.iter())
                .zip(counts.shape.strides.iter())
                .enumerate()
            {
                let c = code as usize;
                if c >= k {
                    return Err(SynthError::config(format!(
                        "row {r}: code {code} on axis {axis} is outside [0, {k})"
                    )));
                }
                off += c * s;
            }
            counts.data[off] += 1;
        }
        Ok(counts)
    }

    /// Cast counts to floating point mass.
    pub fn to_mass(&self) -> MassTensor {
        self.map(|c| c as f64)
    }
}

// ─── MassTensor ──────────────────────────────────────────────────────────────

impl MassTensor {
    /// Uniform unit mass: the default support tensor for fitting.
    pub fn uniform(shape: Shape) -> Self {
        Self::filled(shape, 1.0)
    }

    /// Sum of absolute cell differences. Shapes must match.
    pub fn l1_distance(&self, other: &MassTensor) -> Result<f64> {
        if self.shape != other.shape {
            return Err(SynthError::config(format!(
                "cannot compare tensors of shape {:?} and {:?}",
                self.dims(),
                other.dims()
            )));
        }
        Ok(l1(&self.data, &other.data))
    }

    /// Check that every cell is finite and non-negative.
    pub fn check_non_negative(&self, what: &str) -> Result<()> {
        match self.data.iter().position(|x| !x.is_finite() || *x < 0.0) {
            Some(i) => Err(SynthError::config(format!(
                "{what} has invalid mass {} at flat index {i}",
                self.data[i]
            ))),
            None => Ok(()),
        }
    }

    /// Scale so that the cells sum to 1. A zero-mass tensor is left as is.
    pub fn normalized(&self) -> MassTensor {
        let total = self.sum();
        if total > 0.0 {
            self.map(|x| x / total)
        } else {
            self.clone()
        }
    }
}

/// L1 distance between equal-length slices.
pub(crate) fn l1(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}
