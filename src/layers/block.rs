//! Encoder and decoder layer composition
//!
//! Post-norm residual wiring: each sub-layer's input is added to its output
//! before the following normalization. Stages run strictly in sequence and
//! any shape violation propagates immediately; there is no partial output.
//!
//! [`Encoder`] and [`Decoder`] chain `num_layers` identically-shaped layers;
//! the decoder feeds the same encoder output to every layer's
//! cross-attention.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::error::{InferirError, Result};
use crate::ops;
use crate::params::{DecoderLayerParams, EncoderLayerParams};
use crate::tensor::Tensor;

use super::attention::{cross_attention, multi_head_attention};
use super::{feed_forward, layer_norm};

/// Stack configuration
///
/// Carries every dimension the layers need plus the linear-algebra backend
/// choice; nothing here changes after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Embedding width of each token
    pub d_model: usize,
    /// Hidden width of the feed-forward blocks
    pub d_ff: usize,
    /// Number of attention heads
    pub num_heads: usize,
    /// Number of stacked layers
    pub num_layers: usize,
    /// Linear-algebra execution strategy
    pub backend: Backend,
}

/// One encoder layer
///
/// `Out = LayerNorm2(Y1 + FFN(Y1))` where `Y1 = LayerNorm1(X + SelfAttn(X))`.
/// Self-attention here is causal by construction (the single-head primitive
/// always masks), so each token summarizes its prefix only.
#[derive(Debug, Clone)]
pub struct EncoderLayer {
    params: EncoderLayerParams,
    backend: Backend,
}

impl EncoderLayer {
    /// Create an encoder layer with zero-initialized weights
    ///
    /// `config.num_layers` is not consulted here; it belongs to the stacks.
    ///
    /// # Errors
    ///
    /// Returns `Err` on any dimension violation in the parameter bundle.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        Ok(Self {
            params: EncoderLayerParams::new(config.d_model, config.d_ff, config.num_heads)?,
            backend: config.backend,
        })
    }

    /// Wrap an already-populated parameter bundle
    #[must_use]
    pub fn from_params(params: EncoderLayerParams, backend: Backend) -> Self {
        Self { params, backend }
    }

    /// Borrow the layer's parameters
    #[must_use]
    pub fn params(&self) -> &EncoderLayerParams {
        &self.params
    }

    /// Mutable parameter access, for loaders
    pub fn params_mut(&mut self) -> &mut EncoderLayerParams {
        &mut self.params
    }

    /// Forward pass over `input (L, d_model)`
    ///
    /// # Errors
    ///
    /// Returns `Err` if the input is not rank-2 with width `d_model`.
    pub fn forward(&self, input: &Tensor<f32>) -> Result<Tensor<f32>> {
        let shape = input.shape().to_vec();

        let mut h1 = multi_head_attention(input, self.params.attn(), self.backend)?.into_data();
        ops::add(&mut h1, input.data())?;
        let y1 = layer_norm(&Tensor::from_vec(shape.clone(), h1)?, self.params.norm1())?;

        let mut h2 = feed_forward(&y1, self.params.ffn(), self.backend)?.into_data();
        ops::add(&mut h2, y1.data())?;
        layer_norm(&Tensor::from_vec(shape, h2)?, self.params.norm2())
    }
}

/// One decoder layer
///
/// Masked self-attention, then cross-attention over the encoder output,
/// then the feed-forward block, each followed by residual add and
/// normalization:
/// ```text
/// Y1  = LayerNorm1(X_dec + SelfAttn(X_dec))
/// Y2  = LayerNorm2(Y1 + CrossAttn(Y1, X_enc))
/// Out = LayerNorm3(Y2 + FFN(Y2))
/// ```
#[derive(Debug, Clone)]
pub struct DecoderLayer {
    params: DecoderLayerParams,
    backend: Backend,
}

impl DecoderLayer {
    /// Create a decoder layer with zero-initialized weights
    ///
    /// # Errors
    ///
    /// Returns `Err` on any dimension violation in the parameter bundle.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        Ok(Self {
            params: DecoderLayerParams::new(config.d_model, config.d_ff, config.num_heads)?,
            backend: config.backend,
        })
    }

    /// Wrap an already-populated parameter bundle
    #[must_use]
    pub fn from_params(params: DecoderLayerParams, backend: Backend) -> Self {
        Self { params, backend }
    }

    /// Borrow the layer's parameters
    #[must_use]
    pub fn params(&self) -> &DecoderLayerParams {
        &self.params
    }

    /// Mutable parameter access, for loaders
    pub fn params_mut(&mut self) -> &mut DecoderLayerParams {
        &mut self.params
    }

    /// Forward pass over `input (L_dec, d_model)` attending to
    /// `encoder_output (L_enc, d_model)`
    ///
    /// # Errors
    ///
    /// Returns `Err` if either tensor is not rank-2 with width `d_model`.
    pub fn forward(
        &self,
        input: &Tensor<f32>,
        encoder_output: &Tensor<f32>,
    ) -> Result<Tensor<f32>> {
        let shape = input.shape().to_vec();

        let mut a1 = multi_head_attention(input, self.params.self_attn(), self.backend)?.into_data();
        ops::add(&mut a1, input.data())?;
        let y1 = layer_norm(&Tensor::from_vec(shape.clone(), a1)?, self.params.norm1())?;

        let mut a2 =
            cross_attention(&y1, encoder_output, self.params.cross_attn(), self.backend)?.into_data();
        ops::add(&mut a2, y1.data())?;
        let y2 = layer_norm(&Tensor::from_vec(shape.clone(), a2)?, self.params.norm2())?;

        let mut f = feed_forward(&y2, self.params.ffn(), self.backend)?.into_data();
        ops::add(&mut f, y2.data())?;
        layer_norm(&Tensor::from_vec(shape, f)?, self.params.norm3())
    }
}

/// Stack of encoder layers
///
/// Chains `num_layers` encoder layers; each layer's output feeds the next.
#[derive(Debug, Clone)]
pub struct Encoder {
    layers: Vec<EncoderLayer>,
    config: ModelConfig,
}

impl Encoder {
    /// Create a stack of zero-initialized encoder layers
    ///
    /// # Errors
    ///
    /// Returns `Err` if `config.num_layers` is zero or any layer dimension
    /// is invalid.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        require_layers(config)?;
        let layers = (0..config.num_layers)
            .map(|_| EncoderLayer::new(config))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            layers,
            config: *config,
        })
    }

    /// Create a stack with uniform random weights
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::new`].
    pub fn random<R: Rng>(config: &ModelConfig, rng: &mut R) -> Result<Self> {
        require_layers(config)?;
        let layers = (0..config.num_layers)
            .map(|_| {
                EncoderLayerParams::random(config.d_model, config.d_ff, config.num_heads, rng)
                    .map(|params| EncoderLayer::from_params(params, config.backend))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            layers,
            config: *config,
        })
    }

    /// Stack configuration
    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Borrow the stacked layers in order
    #[must_use]
    pub fn layers(&self) -> &[EncoderLayer] {
        &self.layers
    }

    /// Mutable access to one layer, for loaders
    ///
    /// # Errors
    ///
    /// Returns `Err` if `index` is out of range.
    pub fn layer_mut(&mut self, index: usize) -> Result<&mut EncoderLayer> {
        let num_layers = self.layers.len();
        self.layers
            .get_mut(index)
            .ok_or_else(|| InferirError::InvalidShape {
                reason: format!("Layer index {index} out of range for {num_layers} layers"),
            })
    }

    /// Run the full stack over `input (L, d_model)`
    ///
    /// # Errors
    ///
    /// Returns `Err` if the input is not rank-2 with width `d_model`.
    pub fn forward(&self, input: &Tensor<f32>) -> Result<Tensor<f32>> {
        let mut x = input.clone();
        for layer in &self.layers {
            x = layer.forward(&x)?;
        }
        Ok(x)
    }
}

/// Stack of decoder layers
///
/// Every layer cross-attends over the same encoder output.
#[derive(Debug, Clone)]
pub struct Decoder {
    layers: Vec<DecoderLayer>,
    config: ModelConfig,
}

impl Decoder {
    /// Create a stack of zero-initialized decoder layers
    ///
    /// # Errors
    ///
    /// Returns `Err` if `config.num_layers` is zero or any layer dimension
    /// is invalid.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        require_layers(config)?;
        let layers = (0..config.num_layers)
            .map(|_| DecoderLayer::new(config))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            layers,
            config: *config,
        })
    }

    /// Create a stack with uniform random weights
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::new`].
    pub fn random<R: Rng>(config: &ModelConfig, rng: &mut R) -> Result<Self> {
        require_layers(config)?;
        let layers = (0..config.num_layers)
            .map(|_| {
                DecoderLayerParams::random(config.d_model, config.d_ff, config.num_heads, rng)
                    .map(|params| DecoderLayer::from_params(params, config.backend))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            layers,
            config: *config,
        })
    }

    /// Stack configuration
    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Borrow the stacked layers in order
    #[must_use]
    pub fn layers(&self) -> &[DecoderLayer] {
        &self.layers
    }

    /// Mutable access to one layer, for loaders
    ///
    /// # Errors
    ///
    /// Returns `Err` if `index` is out of range.
    pub fn layer_mut(&mut self, index: usize) -> Result<&mut DecoderLayer> {
        let num_layers = self.layers.len();
        self.layers
            .get_mut(index)
            .ok_or_else(|| InferirError::InvalidShape {
                reason: format!("Layer index {index} out of range for {num_layers} layers"),
            })
    }

    /// Run the full stack over `input (L_dec, d_model)` attending to
    /// `encoder_output (L_enc, d_model)`
    ///
    /// # Errors
    ///
    /// Returns `Err` if either tensor is not rank-2 with width `d_model`.
    pub fn forward(
        &self,
        input: &Tensor<f32>,
        encoder_output: &Tensor<f32>,
    ) -> Result<Tensor<f32>> {
        let mut x = input.clone();
        for layer in &self.layers {
            x = layer.forward(&x, encoder_output)?;
        }
        Ok(x)
    }
}

fn require_layers(config: &ModelConfig) -> Result<()> {
    if config.num_layers == 0 {
        return Err(InferirError::InvalidShape {
            reason: "num_layers must be > 0".to_string(),
        });
    }
    Ok(())
}
