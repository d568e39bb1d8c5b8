//! # Inferir
//!
//! Pure Rust transformer forward-pass kernels: attention, layer
//! normalization, and feed-forward blocks composed into encoder and decoder
//! layers.
//!
//! Inferir (Spanish: "to infer") is an inference-time numerical library. It
//! computes forward passes only: no gradients, no optimizer, no training
//! state. All tensors are 32-bit floats in row-major order, every shape is
//! caller-supplied, and every forward entry point is a pure function over
//! borrowed parameters.
//!
//! ## Features
//!
//! - **Attention engine**: single-head causal attention, multi-head
//!   self-attention, and cross-attention over separate key/value sources
//! - **Layer stack**: post-norm encoder and decoder layers plus `Encoder` /
//!   `Decoder` stacks chaining them
//! - **Selectable backend**: cache-blocked reference kernels or
//!   rayon-parallel execution, chosen by configuration
//! - **Validated parameters**: every dimension invariant checked at
//!   construction, never mid-computation
//!
//! ## Example
//!
//! ```
//! use inferir::layers::{Encoder, ModelConfig};
//! use inferir::{Backend, Tensor};
//!
//! let config = ModelConfig {
//!     d_model: 8,
//!     d_ff: 32,
//!     num_heads: 2,
//!     num_layers: 2,
//!     backend: Backend::Reference,
//! };
//!
//! // Zero-initialized weights; loaders fill them in through the
//! // params_mut() accessors.
//! let encoder = Encoder::new(&config).unwrap();
//!
//! // Three tokens, eight features each
//! let input = Tensor::from_vec(vec![3, 8], vec![0.1; 24]).unwrap();
//! let output = encoder.forward(&input).unwrap();
//! assert_eq!(output.shape(), &[3, 8]);
//! ```
//!
//! ## Architecture
//!
//! Leaves first:
//! - [`ops`]: elementwise and reduction kernels (softmax, GELU, masking,
//!   mean/variance, bias and residual adds)
//! - [`backend`]: dense matmul and transpose behind the [`Backend`] strategy
//! - [`params`]: owned, validated weight containers
//! - [`layers`]: the attention engine, layer norm, feed-forward, and the
//!   encoder/decoder compositions
//!
//! Numerical contracts worth knowing: masking always happens before
//! softmax; softmax subtracts the row max and divides by `sum + EPSILON`;
//! zero variance is floored to `EPSILON`; self-attention is causal by
//! construction while cross-attention never masks.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
// Clippy allows (MUST come after deny/warn to override them)
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // usize -> f32 for dims far below 2^24
#![allow(clippy::must_use_candidate)] // Not all methods need #[must_use]
#![allow(clippy::missing_panics_doc)] // Allow missing Panics doc sections
#![allow(clippy::doc_markdown)] // Allow technical terms without backticks
#![allow(clippy::float_cmp)] // Allow float comparisons in tests
#![allow(clippy::uninlined_format_args)] // Prefer explicit format args
#![allow(clippy::similar_names)] // w_q/w_k/w_v are the domain vocabulary
#![allow(clippy::many_single_char_names)] // m/n/k are the matmul contract

pub mod backend;
pub mod error;
pub mod layers;
pub mod ops;
pub mod params;
pub mod tensor;

// Re-exports for convenience
pub use backend::Backend;
pub use error::{InferirError, Result};
pub use tensor::Tensor;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
