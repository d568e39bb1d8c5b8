//! Transformer layer forward passes
//!
//! Core building blocks composed by the encoder and decoder layers:
//!
//! - [`layer_norm`] - Per-token normalization with learned scale/shift
//! - [`feed_forward`] - Two affine transforms with GELU between them
//! - [`scaled_dot_attention`] / [`multi_head_attention`] /
//!   [`cross_attention`] - The attention engine
//! - [`EncoderLayer`] / [`DecoderLayer`] and the [`Encoder`] / [`Decoder`]
//!   stacks
//!
//! Every forward pass borrows its parameters immutably and allocates only
//! call-local intermediates, so populated layers can be shared across
//! threads.
//!
//! ## Example
//!
//! ```
//! use inferir::layers::layer_norm;
//! use inferir::params::LayerNormParams;
//! use inferir::Tensor;
//!
//! let params = LayerNormParams::new(4).unwrap();
//! let input = Tensor::from_vec(vec![1, 4], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
//! let normalized = layer_norm(&input, &params).unwrap();
//! assert_eq!(normalized.shape(), &[1, 4]);
//! ```

use crate::backend::Backend;
use crate::error::{InferirError, Result};
use crate::ops;
use crate::params::{FeedForwardParams, LayerNormParams};
use crate::tensor::Tensor;

mod attention;
pub use attention::{cross_attention, multi_head_attention, scaled_dot_attention};
mod block;
pub use block::{Decoder, DecoderLayer, Encoder, EncoderLayer, ModelConfig};

/// Require a rank-2 tensor and return its `(rows, cols)`
fn matrix_dims(input: &Tensor<f32>) -> Result<(usize, usize)> {
    let shape = input.shape();
    if shape.len() != 2 {
        return Err(InferirError::InvalidShape {
            reason: format!("Expected rank-2 tensor, got rank {}", shape.len()),
        });
    }
    Ok((shape[0], shape[1]))
}

/// Layer normalization forward pass
///
/// Normalizes each token (row) independently over its `d_model` features:
/// ```text
/// y = (x - mean(x)) / sqrt(variance(x)) * gamma + beta
/// ```
/// The population variance carries the [`ops::EPSILON`] floor when it is
/// exactly zero, so a constant row normalizes to `beta` instead of NaN. No
/// statistics cross token boundaries.
///
/// # Errors
///
/// Returns `Err` if the input is not rank-2 or its width doesn't match
/// `params.d_model()`.
///
/// # References
///
/// Layer Normalization: <https://arxiv.org/abs/1607.06450>
pub fn layer_norm(input: &Tensor<f32>, params: &LayerNormParams) -> Result<Tensor<f32>> {
    let (rows, cols) = matrix_dims(input)?;
    if cols != params.d_model() {
        return Err(InferirError::InvalidShape {
            reason: format!(
                "Input width {cols} doesn't match params d_model {}",
                params.d_model()
            ),
        });
    }

    let gamma = params.gamma();
    let beta = params.beta();
    let mut output = Vec::with_capacity(input.size());
    for row in input.data().chunks(cols) {
        let (mean, variance) = ops::mean_variance(row);
        let inv_std = 1.0 / variance.sqrt();
        for (j, &x) in row.iter().enumerate() {
            let normalized = (x - mean) * inv_std;
            output.push(normalized * gamma[j] + beta[j]);
        }
    }

    debug_assert!(
        output.iter().all(|&x| x.is_finite()),
        "layer norm produced NaN or Inf values"
    );

    Tensor::from_vec(vec![rows, cols], output)
}

/// Feed-forward block forward pass
///
/// `H = GELU(X·W1 + B1)`; `Out = H·W2 + B2`. The hidden width is
/// `params.d_ff()`; no normalization or dropout happens inside the block.
///
/// # Errors
///
/// Returns `Err` if the input is not rank-2 or its width doesn't match
/// `params.d_model()`.
pub fn feed_forward(
    input: &Tensor<f32>,
    params: &FeedForwardParams,
    backend: Backend,
) -> Result<Tensor<f32>> {
    let (rows, cols) = matrix_dims(input)?;
    if cols != params.d_model() {
        return Err(InferirError::InvalidShape {
            reason: format!(
                "Input width {cols} doesn't match params d_model {}",
                params.d_model()
            ),
        });
    }

    let d_ff = params.d_ff();
    let mut hidden = backend.matmul(input.data(), params.w1(), rows, d_ff, cols)?;
    ops::add_bias(&mut hidden, params.b1(), rows, d_ff)?;
    ops::gelu(&mut hidden);

    let mut out = backend.matmul(&hidden, params.w2(), rows, cols, d_ff)?;
    ops::add_bias(&mut out, params.b2(), rows, cols)?;
    Tensor::from_vec(vec![rows, cols], out)
}
