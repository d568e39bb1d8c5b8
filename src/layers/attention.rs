//! Attention mechanisms
//!
//! Three state-free entry points, all pure functions over borrowed inputs
//! and parameters:
//!
//! - [`scaled_dot_attention`] - one head, causal mask always applied
//! - [`multi_head_attention`] - causal self-attention across all heads
//! - [`cross_attention`] - decoder queries attending over encoder output,
//!   never masked
//!
//! Causality lives in the single-head primitive itself rather than in an
//! optional flag: every self-attention path through this module is causal,
//! and only the cross-attention path sees the full key/value sequence.
//!
//! # References
//!
//! "Attention is All You Need" - Vaswani et al., 2017

use rayon::prelude::*;

use crate::backend::Backend;
use crate::error::{InferirError, Result};
use crate::ops;
use crate::params::AttentionParams;
use crate::tensor::Tensor;

use super::matrix_dims;

/// Single-head scaled dot-product attention with a causal mask
///
/// Computes:
/// ```text
/// Attention(X) = softmax(mask(Q @ K.T / sqrt(d_k))) @ V
/// ```
/// where `Q`, `K`, `V` come from projecting `X (L, d_model)` through one
/// head's fused weight block `w_head (d_model, 3*d_k)` and de-interleaving
/// the `[Q | K | V]` column groups. The causal mask is always applied; token
/// `i` never attends past itself.
///
/// # Arguments
///
/// * `input` - Token embeddings, rank-2 `(L, d_model)`
/// * `w_head` - One head's weight block, `d_model * 3 * d_k` elements
/// * `d_k` - Head width
/// * `backend` - Linear-algebra strategy
///
/// # Returns
///
/// The head output, shape `(L, d_k)`.
///
/// # Errors
///
/// Returns `Err` if the input is not rank-2, `d_k` is zero, or `w_head` has
/// the wrong length for the input width.
pub fn scaled_dot_attention(
    input: &Tensor<f32>,
    w_head: &[f32],
    d_k: usize,
    backend: Backend,
) -> Result<Tensor<f32>> {
    let (seq_len, d_model) = matrix_dims(input)?;
    if d_k == 0 {
        return Err(InferirError::InvalidShape {
            reason: "d_k must be > 0".to_string(),
        });
    }
    if w_head.len() != d_model * 3 * d_k {
        return Err(InferirError::DataShapeMismatch {
            data_size: w_head.len(),
            shape: vec![d_model, 3 * d_k],
            expected: d_model * 3 * d_k,
        });
    }

    let head = attend_causal(input.data(), w_head, seq_len, d_model, d_k, backend)?;
    Tensor::from_vec(vec![seq_len, d_k], head)
}

/// Multi-head causal self-attention
///
/// Runs [`scaled_dot_attention`] per head on that head's weight block,
/// writes each head's `(L, d_k)` output into its column block of an
/// `(L, d_model)` concatenation buffer, then applies the output projection
/// `w_o`. Under [`Backend::Parallel`] the heads run as independent rayon
/// tasks; head outputs land in disjoint column blocks, so the result does
/// not depend on scheduling.
///
/// # Errors
///
/// Returns `Err` if the input is not rank-2 or its width doesn't match
/// `params.d_model()`.
pub fn multi_head_attention(
    input: &Tensor<f32>,
    params: &AttentionParams,
    backend: Backend,
) -> Result<Tensor<f32>> {
    let (seq_len, d_model) = matrix_dims(input)?;
    if d_model != params.d_model() {
        return Err(InferirError::InvalidShape {
            reason: format!(
                "Input width {d_model} doesn't match params d_model {}",
                params.d_model()
            ),
        });
    }

    let d_k = params.d_k();
    let heads = run_heads(params.num_heads(), backend, |h| {
        let w_head = params.head_block(h)?;
        attend_causal(input.data(), w_head, seq_len, d_model, d_k, backend)
    })?;

    let concat = concat_heads(&heads, seq_len, d_k, d_model);
    let projected = backend.matmul(&concat, params.w_o(), seq_len, d_model, d_model)?;
    Tensor::from_vec(vec![seq_len, d_model], projected)
}

/// Cross-attention: decoder queries over encoder keys and values
///
/// `queries (L_dec, d_model)` provides `Q`; `context (L_enc, d_model)`
/// provides `K` and `V`. Scores are `(L_dec, L_enc)` and are never masked;
/// every encoder position stays visible to every query. Concatenation and
/// output projection follow [`multi_head_attention`].
///
/// # Errors
///
/// Returns `Err` if either tensor is not rank-2 or either width doesn't
/// match `params.d_model()`.
pub fn cross_attention(
    queries: &Tensor<f32>,
    context: &Tensor<f32>,
    params: &AttentionParams,
    backend: Backend,
) -> Result<Tensor<f32>> {
    let (l_dec, q_width) = matrix_dims(queries)?;
    let (l_enc, kv_width) = matrix_dims(context)?;
    let d_model = params.d_model();
    if q_width != d_model {
        return Err(InferirError::InvalidShape {
            reason: format!("Query width {q_width} doesn't match params d_model {d_model}"),
        });
    }
    if kv_width != d_model {
        return Err(InferirError::InvalidShape {
            reason: format!("Context width {kv_width} doesn't match params d_model {d_model}"),
        });
    }

    let d_k = params.d_k();
    let heads = run_heads(params.num_heads(), backend, |h| {
        let w_head = params.head_block(h)?;
        let (w_q, w_k, w_v) = split_head_columns(w_head, d_model, d_k);
        let q = backend.matmul(queries.data(), &w_q, l_dec, d_k, d_model)?;
        let k = backend.matmul(context.data(), &w_k, l_enc, d_k, d_model)?;
        let v = backend.matmul(context.data(), &w_v, l_enc, d_k, d_model)?;
        attend(&q, &k, &v, l_dec, l_enc, d_k, None, backend)
    })?;

    let concat = concat_heads(&heads, l_dec, d_k, d_model);
    let projected = backend.matmul(&concat, params.w_o(), l_dec, d_model, d_model)?;
    Tensor::from_vec(vec![l_dec, d_model], projected)
}

/// Project one head and attend causally over its own sequence
fn attend_causal(
    x: &[f32],
    w_head: &[f32],
    seq_len: usize,
    d_model: usize,
    d_k: usize,
    backend: Backend,
) -> Result<Vec<f32>> {
    let (q, k, v) = project_qkv(x, w_head, seq_len, d_model, d_k, backend)?;
    let mask = ops::causal_mask(seq_len);
    attend(&q, &k, &v, seq_len, seq_len, d_k, Some(&mask), backend)
}

/// Fused QKV projection followed by de-interleaving into Q, K, V
///
/// One matmul produces `(seq_len, 3*d_k)` rows of `[q | k | v]`; the column
/// groups are then copied out into three `(seq_len, d_k)` matrices.
fn project_qkv(
    x: &[f32],
    w_head: &[f32],
    seq_len: usize,
    d_model: usize,
    d_k: usize,
    backend: Backend,
) -> Result<(Vec<f32>, Vec<f32>, Vec<f32>)> {
    let qkv = backend.matmul(x, w_head, seq_len, 3 * d_k, d_model)?;

    let mut q = vec![0.0f32; seq_len * d_k];
    let mut k = vec![0.0f32; seq_len * d_k];
    let mut v = vec![0.0f32; seq_len * d_k];
    for i in 0..seq_len {
        let row = &qkv[i * 3 * d_k..(i + 1) * 3 * d_k];
        q[i * d_k..(i + 1) * d_k].copy_from_slice(&row[..d_k]);
        k[i * d_k..(i + 1) * d_k].copy_from_slice(&row[d_k..2 * d_k]);
        v[i * d_k..(i + 1) * d_k].copy_from_slice(&row[2 * d_k..]);
    }
    Ok((q, k, v))
}

/// Split a head block's `[Q | K | V]` column groups into three standalone
/// `(d_model, d_k)` weight matrices
fn split_head_columns(w_head: &[f32], d_model: usize, d_k: usize) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
    let mut w_q = vec![0.0f32; d_model * d_k];
    let mut w_k = vec![0.0f32; d_model * d_k];
    let mut w_v = vec![0.0f32; d_model * d_k];
    for i in 0..d_model {
        let row = &w_head[i * 3 * d_k..(i + 1) * 3 * d_k];
        w_q[i * d_k..(i + 1) * d_k].copy_from_slice(&row[..d_k]);
        w_k[i * d_k..(i + 1) * d_k].copy_from_slice(&row[d_k..2 * d_k]);
        w_v[i * d_k..(i + 1) * d_k].copy_from_slice(&row[2 * d_k..]);
    }
    (w_q, w_k, w_v)
}

/// Score, scale, optionally mask, softmax, and weight the values
///
/// `q` is `(l_q, d_k)`, `k` and `v` are `(l_kv, d_k)`; the result is
/// `(l_q, d_k)`. Masking happens strictly before the softmax.
fn attend(
    q: &[f32],
    k: &[f32],
    v: &[f32],
    l_q: usize,
    l_kv: usize,
    d_k: usize,
    mask: Option<&[f32]>,
    backend: Backend,
) -> Result<Vec<f32>> {
    let k_t = backend.transpose(k, l_kv, d_k)?;
    let mut scores = backend.matmul(q, &k_t, l_q, l_kv, d_k)?;
    ops::scale_scores(&mut scores, d_k);
    ops::apply_mask(&mut scores, mask)?;
    let weights = ops::softmax_rows(&scores, l_q, l_kv)?;
    backend.matmul(&weights, v, l_q, d_k, l_kv)
}

/// Run the per-head closure for every head, serially or via rayon
fn run_heads<F>(num_heads: usize, backend: Backend, per_head: F) -> Result<Vec<Vec<f32>>>
where
    F: Fn(usize) -> Result<Vec<f32>> + Sync + Send,
{
    match backend {
        Backend::Reference => (0..num_heads).map(per_head).collect(),
        Backend::Parallel => (0..num_heads).into_par_iter().map(per_head).collect(),
    }
}

/// Stitch per-head `(seq_len, d_k)` outputs into the `(seq_len, d_model)`
/// concatenation buffer, head `h` filling columns `h*d_k..(h+1)*d_k`
fn concat_heads(heads: &[Vec<f32>], seq_len: usize, d_k: usize, d_model: usize) -> Vec<f32> {
    let mut concat = vec![0.0f32; seq_len * d_model];
    for (h, head) in heads.iter().enumerate() {
        for i in 0..seq_len {
            let dst_start = i * d_model + h * d_k;
            concat[dst_start..dst_start + d_k].copy_from_slice(&head[i * d_k..(i + 1) * d_k]);
        }
    }
    concat
}
