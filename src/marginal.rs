/*
 * This source code is licensed under the Business Source License 1.1.
 */

//! Cliques and marginal extraction.
//!
//! A [`Clique`] is an ordered tuple of distinct axis indices. The marginal
//! of a tensor on a clique sums over every axis *not* in the clique and
//! returns a tensor whose axes are exactly the clique's axes, in clique
//! order (not source order):
//!
//! ```text
//! T: (A, B, C)      clique (2, 0)      marginal: (C, A)
//! m[c, a] = Σ_b T[a, b, c]
//! ```
//!
//! The same walk that accumulates a marginal also drives the scaler's
//! broadcast rescale: [`Projection`] yields, for each source cell in flat
//! order, the flat index of that cell's projection onto the clique.

use core::ops::AddAssign;

use heapless::Vec as HVec;

use crate::error::{Result, SynthError};
use crate::tensor::{AxisVec, Shape, Tensor, MAX_AXES};

// ─── Clique ──────────────────────────────────────────────────────────────────

/// Ordered, duplicate-free tuple of axis indices naming a required marginal.
///
/// Serializes as a plain list of axes; deserialization goes through
/// [`Clique::new`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<usize>", into = "Vec<usize>"))]
pub struct Clique {
    axes: AxisVec,
}

impl TryFrom<Vec<usize>> for Clique {
    type Error = SynthError;

    fn try_from(axes: Vec<usize>) -> Result<Self> {
        Self::new(&axes)
    }
}

impl From<Clique> for Vec<usize> {
    fn from(clique: Clique) -> Self {
        clique.axes.to_vec()
    }
}

impl Clique {
    /// Build a clique, rejecting empty tuples, repeated axes and tuples
    /// longer than [`MAX_AXES`].
    pub fn new(axes: &[usize]) -> Result<Self> {
        if axes.is_empty() {
            return Err(SynthError::config("a clique needs at least one axis"));
        }
        let mut v: AxisVec = HVec::new();
        for (i, &a) in axes.iter().enumerate() {
            if axes[..i].contains(&a) {
                return Err(SynthError::config(format!(
                    "clique {axes:?} repeats axis {a}"
                )));
            }
            v.push(a).map_err(|_| {
                SynthError::config(format!("clique {axes:?} has more than {MAX_AXES} axes"))
            })?;
        }
        Ok(Self { axes: v })
    }

    /// Build a clique and check every axis against `n_axes` attributes.
    pub fn for_attributes(axes: &[usize], n_axes: usize) -> Result<Self> {
        let c = Self::new(axes)?;
        c.check_rank(n_axes)?;
        Ok(c)
    }

    /// The clique spanning every axis `0..n` in order.
    pub fn full(n: usize) -> Result<Self> {
        let axes: Vec<usize> = (0..n).collect();
        Self::new(&axes)
    }

    /// Axis indices in clique order.
    pub fn axes(&self) -> &[usize] {
        &self.axes
    }

    /// Number of axes.
    pub fn len(&self) -> usize {
        self.axes.len()
    }

    /// Always false: empty cliques cannot be built.
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Error unless every axis is `< n_axes`.
    pub fn check_rank(&self, n_axes: usize) -> Result<()> {
        match self.axes.iter().find(|&&a| a >= n_axes) {
            Some(a) => Err(SynthError::config(format!(
                "clique {:?} references axis {a}, but only {n_axes} attributes are declared",
                self.axes()
            ))),
            None => Ok(()),
        }
    }

    /// Shape of this clique's marginal of a tensor shaped `source`.
    pub fn projected_shape(&self, source: &Shape) -> Result<Shape> {
        self.check_rank(source.ndim())?;
        let dims: AxisVec = self.axes.iter().map(|&a| source.dims()[a]).collect();
        Ok(Shape::from_dims_unchecked(&dims))
    }
}

// ─── Projection ──────────────────────────────────────────────────────────────

/// Iterator over source cells in flat order yielding each cell's flat index
/// in the clique-projected tensor.
///
/// Walks the source with an odometer; the projected index is updated
/// incrementally, so each step is O(1) amortised.
pub struct Projection {
    dims: AxisVec,
    /// Projected-index stride contributed by each source axis (0 when the
    /// axis is summed out).
    contrib: AxisVec,
    coords: AxisVec,
    index: usize,
    remaining: usize,
}

impl Projection {
    /// Projection of `source` onto `clique`, whose marginal has shape `target`.
    ///
    /// `target` must be `clique.projected_shape(source)`.
    pub(crate) fn new(source: &Shape, clique: &Clique, target: &Shape) -> Self {
        let mut contrib: AxisVec = source.dims().iter().map(|_| 0).collect();
        for (j, &a) in clique.axes().iter().enumerate() {
            contrib[a] = target.strides()[j];
        }
        let coords: AxisVec = source.dims().iter().map(|_| 0).collect();
        let dims: AxisVec = source.dims().iter().copied().collect();
        Self { dims, contrib, coords, index: 0, remaining: source.len() }
    }
}

impl Iterator for Projection {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let out = self.index;
        // Advance the odometer, last axis fastest.
        for axis in (0..self.dims.len()).rev() {
            self.coords[axis] += 1;
            self.index += self.contrib[axis];
            if self.coords[axis] < self.dims[axis] {
                break;
            }
            self.index -= self.contrib[axis] * self.dims[axis];
            self.coords[axis] = 0;
        }
        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Projection {}

// ─── marginal ────────────────────────────────────────────────────────────────

/// Sum `tensor` over every axis not in `clique`.
///
/// The result's axes are the clique's axes in clique order. Errors if the
/// clique references an axis the tensor does not have.
pub fn marginal<T>(tensor: &Tensor<T>, clique: &Clique) -> Result<Tensor<T>>
where
    T: Copy + Default + AddAssign,
{
    let target = clique.projected_shape(tensor.shape())?;
    let mut out = vec![T::default(); target.len()];
    let proj = Projection::new(tensor.shape(), clique, &target);
    for (&x, j) in tensor.as_slice().iter().zip(proj) {
        out[j] += x;
    }
    Tensor::from_vec(target, out)
}
