/*
 * This source code is licensed under the Business Source License 1.1.
 */

//! Sequential conditional sampling from a fitted joint tensor.
//!
//! Each row is drawn one axis at a time. Axis 0 is drawn with probability
//! proportional to its marginal; that coordinate is fixed and axis 1 is drawn
//! from the conditional slice, and so on through axis `m − 1`. This samples
//! the joint exactly.
//!
//! # Prefix tables
//!
//! [`JointSampler::new`] precomputes, for each axis `d`, the tensor summed
//! over every axis after `d`:
//!
//! ```text
//! P_d[x₀, …, x_d] = Σ_{x_{d+1}, …} T[x₀, …, x_{m−1}]        P_{m−1} = T
//! ```
//!
//! With the prefix `x₀..x_{d−1}` fixed, the conditional weights for axis `d`
//! are the contiguous run `P_d[prefix, 0..k_d]`. Building the tables costs
//! one pass over the tensor; every draw afterwards costs O(Σ kᵢ) and walks
//! the axes in an explicit loop, never by recursion.
//!
//! # Degenerate slices
//!
//! A conditional run with zero (or non-finite) total mass falls back to a
//! uniform draw over the axis domain. The fallback is counted per axis and
//! reported once as [`SynthWarning::SamplingFallback`]; sampling never fails.
//!
//! # Concurrency
//!
//! The sampler only reads the fitted tensor. With the `parallel` feature,
//! [`JointSampler::sample_par`] splits rows into fixed-size chunks drawn on
//! rayon worker threads, each chunk from its own seeded RNG stream, so the
//! output depends only on the seed.

use rand::Rng;
use tracing::{info, warn};

use crate::error::{Result, SynthError, SynthWarning};
use crate::matrix::EncodedMatrix;
use crate::tensor::{AxisVec, MassTensor, MAX_AXES};

/// Rows per independently seeded chunk in [`JointSampler::sample_par`].
#[cfg(feature = "parallel")]
pub const PARALLEL_CHUNK_ROWS: usize = 4096;

/// Encoded rows together with any fallback warnings raised while drawing.
#[derive(Clone, Debug)]
pub struct Sample {
    /// `n × m` matrix of codes; column `i` lies in `[0, kᵢ)`.
    pub matrix: EncodedMatrix,
    /// Non-fatal conditions raised during sampling.
    pub warnings: Vec<SynthWarning>,
}

/// Per-axis count of uniform fallbacks.
type FallbackCounts = [u64; MAX_AXES];

/// Reusable sampler over one fitted tensor.
///
/// Borrowing the tensor keeps it read-only for the sampler's lifetime; the
/// same sampler may serve any number of [`JointSampler::sample`] calls.
#[derive(Clone, Debug)]
pub struct JointSampler<'a> {
    tensor: &'a MassTensor,
    dims: AxisVec,
    /// `prefix[d]` is `P_d` for `d < m − 1`; `P_{m−1}` is the tensor itself.
    prefix: Vec<Vec<f64>>,
}

impl<'a> JointSampler<'a> {
    /// Build the prefix tables for `tensor`.
    pub fn new(tensor: &'a MassTensor) -> Self {
        let dims: AxisVec = tensor.dims().iter().copied().collect();
        let m = dims.len();

        // Build P_{m-2} down to P_0, each from the level above.
        let mut prefix: Vec<Vec<f64>> = Vec::with_capacity(m.saturating_sub(1));
        for d in (0..m.saturating_sub(1)).rev() {
            let k_next = dims[d + 1];
            let above = prefix.last().map_or(tensor.as_slice(), Vec::as_slice);
            let level: Vec<f64> = above.chunks_exact(k_next).map(|run| run.iter().sum()).collect();
            prefix.push(level);
        }
        prefix.reverse();

        Self { tensor, dims, prefix }
    }

    /// Number of axes `m`.
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total mass of the tensor.
    pub fn total_mass(&self) -> f64 {
        self.level(0).iter().sum()
    }

    fn level(&self, d: usize) -> &[f64] {
        if d + 1 == self.dims.len() {
            self.tensor.as_slice()
        } else {
            &self.prefix[d]
        }
    }

    /// Draw `n` rows using `rng`.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Sample> {
        let mut matrix = self.alloc(n)?;
        let mut fallbacks: FallbackCounts = [0; MAX_AXES];
        let m = self.ndim();
        for row in matrix.as_mut_slice().chunks_exact_mut(m) {
            self.draw_row(rng, row, &mut fallbacks);
        }
        Ok(self.finish(matrix, &fallbacks))
    }

    /// Draw `n` rows on the rayon thread pool. Output depends only on `seed`.
    #[cfg(feature = "parallel")]
    pub fn sample_par(&self, n: usize, seed: u64) -> Result<Sample> {
        use rand::rngs::StdRng;
        use rand::SeedableRng;
        use rayon::prelude::*;

        let mut matrix = self.alloc(n)?;
        let m = self.ndim();
        let fallbacks = matrix
            .as_mut_slice()
            .par_chunks_mut(PARALLEL_CHUNK_ROWS * m)
            .enumerate()
            .map(|(chunk, rows)| {
                let mut rng = StdRng::seed_from_u64(chunk_seed(seed, chunk as u64));
                let mut local: FallbackCounts = [0; MAX_AXES];
                for row in rows.chunks_exact_mut(m) {
                    self.draw_row(&mut rng, row, &mut local);
                }
                local
            })
            .reduce(
                || [0; MAX_AXES],
                |mut a, b| {
                    for (x, y) in a.iter_mut().zip(b) {
                        *x += y;
                    }
                    a
                },
            );
        Ok(self.finish(matrix, &fallbacks))
    }

    fn alloc(&self, n: usize) -> Result<EncodedMatrix> {
        let m = self.ndim();
        let cells = n.checked_mul(m).ok_or_else(|| {
            SynthError::config(format!("cannot allocate {n} rows of {m} codes"))
        })?;
        EncodedMatrix::from_vec(m, vec![0u32; cells])
    }

    /// Fill one row, axis by axis.
    fn draw_row<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        row: &mut [u32],
        fallbacks: &mut FallbackCounts,
    ) {
        let mut p = 0usize;
        for (d, slot) in row.iter_mut().enumerate() {
            let k = self.dims[d];
            let weights = &self.level(d)[p * k..(p + 1) * k];
            let v = match weighted_index(weights, rng) {
                Some(v) => v,
                None => {
                    fallbacks[d] += 1;
                    rng.gen_range(0..k)
                }
            };
            *slot = v as u32;
            p = p * k + v;
        }
    }

    fn finish(&self, matrix: EncodedMatrix, fallbacks: &FallbackCounts) -> Sample {
        let mut warnings = Vec::new();
        for (axis, &draws) in fallbacks.iter().enumerate().take(self.ndim()) {
            if draws > 0 {
                let w = SynthWarning::SamplingFallback { axis, draws };
                warn!(axis, draws, "{}", w);
                warnings.push(w);
            }
        }
        info!(
            rows = matrix.n_rows(),
            axes = self.ndim(),
            fallbacks = warnings.len(),
            "joint sample drawn"
        );
        Sample { matrix, warnings }
    }
}

/// Draw `n` rows from `tensor`. Convenience wrapper over [`JointSampler`].
pub fn sample<R: Rng + ?Sized>(n: usize, tensor: &MassTensor, rng: &mut R) -> Result<Sample> {
    JointSampler::new(tensor).sample(n, rng)
}

/// Index drawn with probability proportional to `weights`, or `None` when
/// the run has no usable mass.
fn weighted_index<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return None;
    }
    let u = rng.gen::<f64>() * total;
    let mut acc = 0.0;
    let mut last_positive = None;
    for (i, &w) in weights.iter().enumerate() {
        if w > 0.0 {
            acc += w;
            last_positive = Some(i);
            if u < acc {
                return Some(i);
            }
        }
    }
    // Rounding left u at the very top of the range.
    last_positive
}

/// SplitMix64 step used to derive independent per-chunk seeds.
#[cfg(feature = "parallel")]
fn chunk_seed(seed: u64, chunk: u64) -> u64 {
    let mut z = seed.wrapping_add(chunk.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
