//! Linear-algebra kernels behind a selectable execution strategy
//!
//! The dense operations every layer builds on:
//!
//! - [`Backend::matmul`] - Cache-blocked dense matrix multiplication
//! - [`Backend::transpose`] - Row-major matrix transpose
//!
//! Both are available in two numerically interchangeable variants selected
//! at configuration time: a single-threaded blocked reference kernel and a
//! rayon-parallel kernel that distributes output rows across threads. The
//! variants agree elementwise within floating tolerance but are not
//! guaranteed bit-identical; within one variant results are deterministic.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{InferirError, Result};

/// Tile size for cache-efficient blocked matmul
const TILE_SIZE: usize = 64;

/// Linear-algebra execution strategy
///
/// Selected once by configuration and passed down through the layer entry
/// points; the math code never branches on build flags or globals.
///
/// # Examples
///
/// ```
/// use inferir::Backend;
///
/// let backend = Backend::default();
/// assert_eq!(backend, Backend::Reference);
///
/// // 2x2 identity times a 2x2 matrix
/// let a = vec![1.0, 0.0, 0.0, 1.0];
/// let b = vec![3.0, 4.0, 5.0, 6.0];
/// let c = backend.matmul(&a, &b, 2, 2, 2).unwrap();
/// assert_eq!(c, vec![3.0, 4.0, 5.0, 6.0]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Backend {
    /// Single-threaded cache-blocked reference kernel
    #[default]
    Reference,
    /// Rayon-parallel kernel, output rows distributed across threads
    Parallel,
}

impl Backend {
    /// Dense matrix multiplication `C = A·B`
    ///
    /// `A` is `(m, k)`, `B` is `(k, n)`, and the returned `C` is `(m, n)`,
    /// all row-major. The output is freshly allocated and fully overwritten,
    /// never accumulated into.
    ///
    /// # Arguments
    ///
    /// * `a` - Left matrix, `m * k` elements row-major
    /// * `b` - Right matrix, `k * n` elements row-major
    /// * `m` - Rows of `a` and of the result
    /// * `n` - Columns of `b` and of the result
    /// * `k` - Columns of `a`, rows of `b`
    ///
    /// # Errors
    ///
    /// Returns `Err` if any dimension is zero or a buffer length doesn't
    /// match its declared shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use inferir::Backend;
    ///
    /// // (2x3)·(3x1)
    /// let a = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    /// let b = vec![1.0, 1.0, 1.0];
    /// let c = Backend::Reference.matmul(&a, &b, 2, 1, 3).unwrap();
    /// assert_eq!(c, vec![6.0, 15.0]);
    /// ```
    pub fn matmul(self, a: &[f32], b: &[f32], m: usize, n: usize, k: usize) -> Result<Vec<f32>> {
        if m == 0 || n == 0 || k == 0 {
            return Err(InferirError::InvalidShape {
                reason: format!("Matmul dimensions cannot be zero (m={m}, n={n}, k={k})"),
            });
        }
        if a.len() != m * k {
            return Err(InferirError::DataShapeMismatch {
                data_size: a.len(),
                shape: vec![m, k],
                expected: m * k,
            });
        }
        if b.len() != k * n {
            return Err(InferirError::DataShapeMismatch {
                data_size: b.len(),
                shape: vec![k, n],
                expected: k * n,
            });
        }

        let out = match self {
            Self::Reference => matmul_blocked(a, b, m, n, k),
            Self::Parallel => matmul_parallel(a, b, m, n, k),
        };
        Ok(out)
    }

    /// Matrix transpose
    ///
    /// For `src` of shape `(rows, cols)` the result has shape `(cols, rows)`
    /// with `dst[j * rows + i] = src[i * cols + j]`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a dimension is zero or `src.len() != rows * cols`.
    ///
    /// # Examples
    ///
    /// ```
    /// use inferir::Backend;
    ///
    /// let src = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]; // 2x3
    /// let dst = Backend::Reference.transpose(&src, 2, 3).unwrap();
    /// assert_eq!(dst, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]); // 3x2
    /// ```
    pub fn transpose(self, src: &[f32], rows: usize, cols: usize) -> Result<Vec<f32>> {
        if rows == 0 || cols == 0 {
            return Err(InferirError::InvalidShape {
                reason: format!("Transpose dimensions cannot be zero (rows={rows}, cols={cols})"),
            });
        }
        if src.len() != rows * cols {
            return Err(InferirError::DataShapeMismatch {
                data_size: src.len(),
                shape: vec![rows, cols],
                expected: rows * cols,
            });
        }

        let out = match self {
            Self::Reference => transpose_scalar(src, rows, cols),
            Self::Parallel => transpose_parallel(src, rows, cols),
        };
        Ok(out)
    }
}

/// Blocked triple loop, tiles of [`TILE_SIZE`] in every dimension
///
/// Accumulation over the shared dimension runs in ascending order for each
/// output element, matching the naive triple loop exactly.
fn matmul_blocked(a: &[f32], b: &[f32], m: usize, n: usize, k: usize) -> Vec<f32> {
    let mut c = vec![0.0f32; m * n];

    for ii in (0..m).step_by(TILE_SIZE) {
        let i_end = (ii + TILE_SIZE).min(m);
        for kk in (0..k).step_by(TILE_SIZE) {
            let k_end = (kk + TILE_SIZE).min(k);
            for jj in (0..n).step_by(TILE_SIZE) {
                let j_end = (jj + TILE_SIZE).min(n);

                for i in ii..i_end {
                    for p in kk..k_end {
                        let a_ip = a[i * k + p];
                        let b_row = &b[p * n + jj..p * n + j_end];
                        let c_row = &mut c[i * n + jj..i * n + j_end];
                        for (c_val, &b_val) in c_row.iter_mut().zip(b_row) {
                            *c_val += a_ip * b_val;
                        }
                    }
                }
            }
        }
    }

    c
}

/// Row-parallel variant: each output row is an independent rayon task
///
/// Per-row accumulation order is identical to the blocked kernel, so the two
/// variants differ only in scheduling.
fn matmul_parallel(a: &[f32], b: &[f32], m: usize, n: usize, k: usize) -> Vec<f32> {
    let mut c = vec![0.0f32; m * n];

    c.par_chunks_mut(n).enumerate().for_each(|(i, c_row)| {
        for p in 0..k {
            let a_ip = a[i * k + p];
            let b_row = &b[p * n..(p + 1) * n];
            for (c_val, &b_val) in c_row.iter_mut().zip(b_row) {
                *c_val += a_ip * b_val;
            }
        }
    });

    c
}

fn transpose_scalar(src: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut dst = vec![0.0f32; rows * cols];
    for i in 0..rows {
        for j in 0..cols {
            dst[j * rows + i] = src[i * cols + j];
        }
    }
    dst
}

/// Parallel over destination rows: row `j` of the output gathers column `j`
/// of the source, so writes never alias.
fn transpose_parallel(src: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut dst = vec![0.0f32; rows * cols];
    dst.par_chunks_mut(rows).enumerate().for_each(|(j, dst_row)| {
        for (i, dst_val) in dst_row.iter_mut().enumerate() {
            *dst_val = src[i * cols + j];
        }
    });
    dst
}
