//! Transformer parameter containers
//!
//! Owned, validated weight structures for the attention, normalization, and
//! feed-forward building blocks, plus the per-layer bundles the encoder and
//! decoder compositions consume. Construction validates every dimension
//! invariant up front; the forward entry points then borrow parameters
//! immutably, so a populated struct can be shared across concurrent forward
//! calls.
//!
//! Weights start at zero (`new`) or uniform in `[-0.05, 0.05)` (`random`,
//! with a caller-supplied [`rand::Rng`] so seeding stays in the caller's
//! hands). Normalization parameters always start as the identity transform.
//! Loaders populate weights through the `_mut` accessors.

use rand::Rng;

use crate::error::{InferirError, Result};

/// Random init spread: uniform `(r - 0.5) * 0.1` keeps early activations small
const INIT_SCALE: f32 = 0.1;

fn uniform_init<R: Rng>(weights: &mut [f32], rng: &mut R) {
    for w in weights.iter_mut() {
        *w = (rng.gen::<f32>() - 0.5) * INIT_SCALE;
    }
}

/// Projection weights for one attention block, all heads fused
///
/// `w_qkv` is conceptually `(d_model, 3*d_model)` but physically laid out
/// per-head-contiguous: head `h` owns a row-major `(d_model, 3*d_k)` block
/// starting at `h * d_model * 3 * d_k`, and within a block row `i` holds the
/// `[Q | K | V]` column groups. Element `(h, i, c)` therefore lives at
/// `h * d_model * 3 * d_k + i * 3 * d_k + c`. [`Self::head_block`] hands out
/// one head's block as a plain slice; blocks never overlap.
#[derive(Debug, Clone)]
pub struct AttentionParams {
    /// Model embedding width
    d_model: usize,
    /// Number of attention heads
    num_heads: usize,
    /// Per-head width, `d_model / num_heads`
    d_k: usize,
    /// Fused QKV projection, per-head-contiguous blocks
    w_qkv: Vec<f32>,
    /// Output projection `(d_model, d_model)`
    w_o: Vec<f32>,
}

impl AttentionParams {
    /// Create zero-initialized attention parameters
    ///
    /// # Errors
    ///
    /// Returns `Err` if `d_model` or `num_heads` is zero, or if `d_model` is
    /// not divisible by `num_heads` (truncating `d_k` silently would corrupt
    /// every head offset).
    ///
    /// # Examples
    ///
    /// ```
    /// use inferir::params::AttentionParams;
    ///
    /// let params = AttentionParams::new(8, 2).unwrap();
    /// assert_eq!(params.d_k(), 4);
    /// assert_eq!(params.w_qkv().len(), 8 * 3 * 8);
    /// ```
    pub fn new(d_model: usize, num_heads: usize) -> Result<Self> {
        let d_k = Self::validate(d_model, num_heads)?;
        Ok(Self {
            d_model,
            num_heads,
            d_k,
            w_qkv: vec![0.0; d_model * 3 * d_model],
            w_o: vec![0.0; d_model * d_model],
        })
    }

    /// Create attention parameters with uniform random weights
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::new`].
    pub fn random<R: Rng>(d_model: usize, num_heads: usize, rng: &mut R) -> Result<Self> {
        let mut params = Self::new(d_model, num_heads)?;
        uniform_init(&mut params.w_qkv, rng);
        uniform_init(&mut params.w_o, rng);
        Ok(params)
    }

    fn validate(d_model: usize, num_heads: usize) -> Result<usize> {
        if d_model == 0 {
            return Err(InferirError::InvalidShape {
                reason: "d_model must be > 0".to_string(),
            });
        }
        if num_heads == 0 {
            return Err(InferirError::InvalidShape {
                reason: "num_heads must be > 0".to_string(),
            });
        }
        if d_model % num_heads != 0 {
            return Err(InferirError::InvalidShape {
                reason: format!("d_model {d_model} is not divisible by num_heads {num_heads}"),
            });
        }
        Ok(d_model / num_heads)
    }

    /// Model embedding width
    #[must_use]
    pub fn d_model(&self) -> usize {
        self.d_model
    }

    /// Number of attention heads
    #[must_use]
    pub fn num_heads(&self) -> usize {
        self.num_heads
    }

    /// Per-head width
    #[must_use]
    pub fn d_k(&self) -> usize {
        self.d_k
    }

    /// Fused QKV projection weights (see the type docs for the layout)
    #[must_use]
    pub fn w_qkv(&self) -> &[f32] {
        &self.w_qkv
    }

    /// Mutable QKV projection weights, for loaders
    pub fn w_qkv_mut(&mut self) -> &mut [f32] {
        &mut self.w_qkv
    }

    /// Output projection weights, `(d_model, d_model)` row-major
    #[must_use]
    pub fn w_o(&self) -> &[f32] {
        &self.w_o
    }

    /// Mutable output projection weights, for loaders
    pub fn w_o_mut(&mut self) -> &mut [f32] {
        &mut self.w_o
    }

    /// Borrow head `h`'s `(d_model, 3*d_k)` weight block
    ///
    /// # Errors
    ///
    /// Returns `Err` if `head >= num_heads`.
    ///
    /// # Examples
    ///
    /// ```
    /// use inferir::params::AttentionParams;
    ///
    /// let params = AttentionParams::new(4, 2).unwrap();
    /// let block = params.head_block(1).unwrap();
    /// assert_eq!(block.len(), 4 * 3 * 2);
    /// ```
    pub fn head_block(&self, head: usize) -> Result<&[f32]> {
        if head >= self.num_heads {
            return Err(InferirError::InvalidShape {
                reason: format!(
                    "Head index {head} out of range for {} heads",
                    self.num_heads
                ),
            });
        }
        let block = self.d_model * 3 * self.d_k;
        Ok(&self.w_qkv[head * block..(head + 1) * block])
    }
}

/// Learned scale and shift for layer normalization
///
/// Starts as the identity transform: `gamma` all ones, `beta` all zeros.
#[derive(Debug, Clone)]
pub struct LayerNormParams {
    d_model: usize,
    /// Scale, length `d_model`
    gamma: Vec<f32>,
    /// Shift, length `d_model`
    beta: Vec<f32>,
}

impl LayerNormParams {
    /// Create identity-initialized normalization parameters
    ///
    /// # Errors
    ///
    /// Returns `Err` if `d_model` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use inferir::params::LayerNormParams;
    ///
    /// let params = LayerNormParams::new(4).unwrap();
    /// assert_eq!(params.gamma(), &[1.0, 1.0, 1.0, 1.0]);
    /// assert_eq!(params.beta(), &[0.0, 0.0, 0.0, 0.0]);
    /// ```
    pub fn new(d_model: usize) -> Result<Self> {
        if d_model == 0 {
            return Err(InferirError::InvalidShape {
                reason: "d_model must be > 0".to_string(),
            });
        }
        Ok(Self {
            d_model,
            gamma: vec![1.0; d_model],
            beta: vec![0.0; d_model],
        })
    }

    /// Feature width this normalization covers
    #[must_use]
    pub fn d_model(&self) -> usize {
        self.d_model
    }

    /// Scale parameters
    #[must_use]
    pub fn gamma(&self) -> &[f32] {
        &self.gamma
    }

    /// Mutable scale parameters, for loaders
    pub fn gamma_mut(&mut self) -> &mut [f32] {
        &mut self.gamma
    }

    /// Shift parameters
    #[must_use]
    pub fn beta(&self) -> &[f32] {
        &self.beta
    }

    /// Mutable shift parameters, for loaders
    pub fn beta_mut(&mut self) -> &mut [f32] {
        &mut self.beta
    }
}

/// Weights for the position-wise feed-forward block
#[derive(Debug, Clone)]
pub struct FeedForwardParams {
    d_model: usize,
    d_ff: usize,
    /// First projection `(d_model, d_ff)`
    w1: Vec<f32>,
    /// First bias, length `d_ff`
    b1: Vec<f32>,
    /// Second projection `(d_ff, d_model)`
    w2: Vec<f32>,
    /// Second bias, length `d_model`
    b2: Vec<f32>,
}

impl FeedForwardParams {
    /// Create zero-initialized feed-forward parameters
    ///
    /// # Errors
    ///
    /// Returns `Err` if `d_model` or `d_ff` is zero.
    pub fn new(d_model: usize, d_ff: usize) -> Result<Self> {
        if d_model == 0 || d_ff == 0 {
            return Err(InferirError::InvalidShape {
                reason: format!("Feed-forward dims must be > 0 (d_model={d_model}, d_ff={d_ff})"),
            });
        }
        Ok(Self {
            d_model,
            d_ff,
            w1: vec![0.0; d_model * d_ff],
            b1: vec![0.0; d_ff],
            w2: vec![0.0; d_ff * d_model],
            b2: vec![0.0; d_model],
        })
    }

    /// Create feed-forward parameters with uniform random weights
    ///
    /// Biases stay at zero.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::new`].
    pub fn random<R: Rng>(d_model: usize, d_ff: usize, rng: &mut R) -> Result<Self> {
        let mut params = Self::new(d_model, d_ff)?;
        uniform_init(&mut params.w1, rng);
        uniform_init(&mut params.w2, rng);
        Ok(params)
    }

    /// Model embedding width
    #[must_use]
    pub fn d_model(&self) -> usize {
        self.d_model
    }

    /// Hidden width of the block
    #[must_use]
    pub fn d_ff(&self) -> usize {
        self.d_ff
    }

    /// First projection weights `(d_model, d_ff)`
    #[must_use]
    pub fn w1(&self) -> &[f32] {
        &self.w1
    }

    /// Mutable first projection weights, for loaders
    pub fn w1_mut(&mut self) -> &mut [f32] {
        &mut self.w1
    }

    /// First bias, length `d_ff`
    #[must_use]
    pub fn b1(&self) -> &[f32] {
        &self.b1
    }

    /// Mutable first bias, for loaders
    pub fn b1_mut(&mut self) -> &mut [f32] {
        &mut self.b1
    }

    /// Second projection weights `(d_ff, d_model)`
    #[must_use]
    pub fn w2(&self) -> &[f32] {
        &self.w2
    }

    /// Mutable second projection weights, for loaders
    pub fn w2_mut(&mut self) -> &mut [f32] {
        &mut self.w2
    }

    /// Second bias, length `d_model`
    #[must_use]
    pub fn b2(&self) -> &[f32] {
        &self.b2
    }

    /// Mutable second bias, for loaders
    pub fn b2_mut(&mut self) -> &mut [f32] {
        &mut self.b2
    }
}

/// Parameter bundle for one encoder layer
///
/// Self-attention, two normalizations, and the feed-forward block, all sized
/// consistently at construction.
#[derive(Debug, Clone)]
pub struct EncoderLayerParams {
    attn: AttentionParams,
    norm1: LayerNormParams,
    ffn: FeedForwardParams,
    norm2: LayerNormParams,
}

impl EncoderLayerParams {
    /// Create a zero-initialized encoder layer bundle
    ///
    /// # Errors
    ///
    /// Returns `Err` on any dimension violation in the sub-structures.
    pub fn new(d_model: usize, d_ff: usize, num_heads: usize) -> Result<Self> {
        Ok(Self {
            attn: AttentionParams::new(d_model, num_heads)?,
            norm1: LayerNormParams::new(d_model)?,
            ffn: FeedForwardParams::new(d_model, d_ff)?,
            norm2: LayerNormParams::new(d_model)?,
        })
    }

    /// Create an encoder layer bundle with uniform random weights
    ///
    /// Normalization parameters stay at identity.
    ///
    /// # Errors
    ///
    /// Returns `Err` on any dimension violation in the sub-structures.
    pub fn random<R: Rng>(d_model: usize, d_ff: usize, num_heads: usize, rng: &mut R) -> Result<Self> {
        Ok(Self {
            attn: AttentionParams::random(d_model, num_heads, rng)?,
            norm1: LayerNormParams::new(d_model)?,
            ffn: FeedForwardParams::random(d_model, d_ff, rng)?,
            norm2: LayerNormParams::new(d_model)?,
        })
    }

    /// Self-attention parameters
    #[must_use]
    pub fn attn(&self) -> &AttentionParams {
        &self.attn
    }

    /// Mutable self-attention parameters, for loaders
    pub fn attn_mut(&mut self) -> &mut AttentionParams {
        &mut self.attn
    }

    /// Post-attention normalization parameters
    #[must_use]
    pub fn norm1(&self) -> &LayerNormParams {
        &self.norm1
    }

    /// Mutable post-attention normalization parameters, for loaders
    pub fn norm1_mut(&mut self) -> &mut LayerNormParams {
        &mut self.norm1
    }

    /// Feed-forward parameters
    #[must_use]
    pub fn ffn(&self) -> &FeedForwardParams {
        &self.ffn
    }

    /// Mutable feed-forward parameters, for loaders
    pub fn ffn_mut(&mut self) -> &mut FeedForwardParams {
        &mut self.ffn
    }

    /// Post-feed-forward normalization parameters
    #[must_use]
    pub fn norm2(&self) -> &LayerNormParams {
        &self.norm2
    }

    /// Mutable post-feed-forward normalization parameters, for loaders
    pub fn norm2_mut(&mut self) -> &mut LayerNormParams {
        &mut self.norm2
    }
}

/// Parameter bundle for one decoder layer
///
/// Masked self-attention, cross-attention over the encoder output, three
/// normalizations, and the feed-forward block.
#[derive(Debug, Clone)]
pub struct DecoderLayerParams {
    self_attn: AttentionParams,
    cross_attn: AttentionParams,
    norm1: LayerNormParams,
    norm2: LayerNormParams,
    norm3: LayerNormParams,
    ffn: FeedForwardParams,
}

impl DecoderLayerParams {
    /// Create a zero-initialized decoder layer bundle
    ///
    /// # Errors
    ///
    /// Returns `Err` on any dimension violation in the sub-structures.
    pub fn new(d_model: usize, d_ff: usize, num_heads: usize) -> Result<Self> {
        Ok(Self {
            self_attn: AttentionParams::new(d_model, num_heads)?,
            cross_attn: AttentionParams::new(d_model, num_heads)?,
            norm1: LayerNormParams::new(d_model)?,
            norm2: LayerNormParams::new(d_model)?,
            norm3: LayerNormParams::new(d_model)?,
            ffn: FeedForwardParams::new(d_model, d_ff)?,
        })
    }

    /// Create a decoder layer bundle with uniform random weights
    ///
    /// Normalization parameters stay at identity.
    ///
    /// # Errors
    ///
    /// Returns `Err` on any dimension violation in the sub-structures.
    pub fn random<R: Rng>(d_model: usize, d_ff: usize, num_heads: usize, rng: &mut R) -> Result<Self> {
        Ok(Self {
            self_attn: AttentionParams::random(d_model, num_heads, rng)?,
            cross_attn: AttentionParams::random(d_model, num_heads, rng)?,
            norm1: LayerNormParams::new(d_model)?,
            norm2: LayerNormParams::new(d_model)?,
            norm3: LayerNormParams::new(d_model)?,
            ffn: FeedForwardParams::random(d_model, d_ff, rng)?,
        })
    }

    /// Masked self-attention parameters
    #[must_use]
    pub fn self_attn(&self) -> &AttentionParams {
        &self.self_attn
    }

    /// Mutable self-attention parameters, for loaders
    pub fn self_attn_mut(&mut self) -> &mut AttentionParams {
        &mut self.self_attn
    }

    /// Cross-attention parameters
    #[must_use]
    pub fn cross_attn(&self) -> &AttentionParams {
        &self.cross_attn
    }

    /// Mutable cross-attention parameters, for loaders
    pub fn cross_attn_mut(&mut self) -> &mut AttentionParams {
        &mut self.cross_attn
    }

    /// Post-self-attention normalization parameters
    #[must_use]
    pub fn norm1(&self) -> &LayerNormParams {
        &self.norm1
    }

    /// Mutable post-self-attention normalization parameters, for loaders
    pub fn norm1_mut(&mut self) -> &mut LayerNormParams {
        &mut self.norm1
    }

    /// Post-cross-attention normalization parameters
    #[must_use]
    pub fn norm2(&self) -> &LayerNormParams {
        &self.norm2
    }

    /// Mutable post-cross-attention normalization parameters, for loaders
    pub fn norm2_mut(&mut self) -> &mut LayerNormParams {
        &mut self.norm2
    }

    /// Final normalization parameters
    #[must_use]
    pub fn norm3(&self) -> &LayerNormParams {
        &self.norm3
    }

    /// Mutable final normalization parameters, for loaders
    pub fn norm3_mut(&mut self) -> &mut LayerNormParams {
        &mut self.norm3
    }

    /// Feed-forward parameters
    #[must_use]
    pub fn ffn(&self) -> &FeedForwardParams {
        &self.ffn
    }

    /// Mutable feed-forward parameters, for loaders
    pub fn ffn_mut(&mut self) -> &mut FeedForwardParams {
        &mut self.ffn
    }
}
