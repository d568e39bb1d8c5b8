//! Reference-vector tests for the forward-pass entry points
//!
//! Every public stage is pinned to independently computed expected values:
//! - Single-head, multi-head, and cross-attention
//! - Feed-forward block
//! - Full encoder and decoder layers
//! - Encoder/decoder stack wiring
//!
//! Weights and inputs come from small modular patterns so each fixture is
//! reproducible by hand.

use rand::rngs::StdRng;
use rand::SeedableRng;

use inferir::layers::{
    cross_attention, feed_forward, multi_head_attention, scaled_dot_attention, Decoder,
    DecoderLayer, Encoder, EncoderLayer, ModelConfig,
};
use inferir::params::{
    AttentionParams, DecoderLayerParams, EncoderLayerParams, FeedForwardParams,
};
use inferir::{Backend, Tensor};

/// Weight pattern: 0.01 * (((offset + t) * 7 % 11) - 5), values in [-0.05, 0.05]
fn pat(offset: usize, len: usize) -> Vec<f32> {
    (0..len)
        .map(|t| 0.01 * (((offset + t) * 7 % 11) as f32 - 5.0))
        .collect()
}

/// Activation pattern: 0.1 * (((offset + t) * 3 % 7) - 3), values in [-0.3, 0.3]
fn xpat(offset: usize, len: usize) -> Vec<f32> {
    (0..len)
        .map(|t| 0.1 * (((offset + t) * 3 % 7) as f32 - 3.0))
        .collect()
}

fn assert_close(got: &[f32], want: &[f32], tol: f32) {
    assert_eq!(got.len(), want.len(), "length mismatch");
    for (i, (g, w)) in got.iter().zip(want).enumerate() {
        assert!((g - w).abs() < tol, "index {}: got {} expected {}", i, g, w);
    }
}

// ============================================================================
// ATTENTION
// ============================================================================

#[test]
fn test_single_head_attention_matches_reference() {
    let input = Tensor::from_vec(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).expect("test");
    // Rows hold [Q | K | V] column groups:
    // W_q = [[0.1, 0.2], [0.3, 0.4]], W_k = [[0.5, 0.6], [0.7, 0.8]],
    // W_v = [[0.9, 1.0], [1.1, 1.2]]
    let w_head = vec![
        0.1, 0.2, 0.5, 0.6, 0.9, 1.0, //
        0.3, 0.4, 0.7, 0.8, 1.1, 1.2,
    ];

    let out = scaled_dot_attention(&input, &w_head, 2, Backend::Reference).expect("test");

    assert_eq!(out.shape(), &[2, 2]);
    assert_close(
        out.data(),
        &[3.099_969, 3.399_966, 7.095_908, 7.795_498],
        1e-4,
    );
    // Position 0 sees only itself, so its output is V row 0 = [3.1, 3.4]
    // up to the softmax epsilon
    assert_close(&out.data()[..2], &[3.1, 3.4], 1e-3);
}

#[test]
fn test_multi_head_attention_matches_reference() {
    let input =
        Tensor::from_vec(vec![2, 4], (1..=8).map(|v| v as f32).collect()).expect("test");

    let mut params = AttentionParams::new(4, 2).expect("test");
    {
        let w_qkv = params.w_qkv_mut();
        for h in 0..2 {
            for i in 0..4 {
                for j in 0..6 {
                    w_qkv[h * 24 + i * 6 + j] = ((i * 12 + h * 6 + j) as f32 + 1.0) * 0.01;
                }
            }
        }
    }
    for i in 0..4 {
        params.w_o_mut()[i * 4 + i] = 1.0;
    }

    let out = multi_head_attention(&input, &params, Backend::Reference).expect("test");

    assert_eq!(out.shape(), &[2, 4]);
    assert_close(
        out.data(),
        &[
            2.899_971, 2.999_970, 3.499_965, 3.599_964, //
            6.579_934, 6.839_932, 8.139_919, 8.399_916,
        ],
        1e-3,
    );
}

#[test]
fn test_cross_attention_matches_reference() {
    let queries =
        Tensor::from_vec(vec![2, 4], vec![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0])
            .expect("test");
    let context = Tensor::from_vec(
        vec![3, 4],
        vec![2.0, 2.0, 0.0, 0.0, 0.0, 0.0, 2.0, 2.0, 1.0, 1.0, 1.0, 1.0],
    )
    .expect("test");

    let mut params = AttentionParams::new(4, 2).expect("test");
    for (t, w) in params.w_qkv_mut().iter_mut().enumerate() {
        *w = t as f32 * 0.01;
    }
    for i in 0..4 {
        params.w_o_mut()[i * 4 + i] = 0.1;
    }

    let out = cross_attention(&queries, &context, &params, Backend::Reference).expect("test");

    assert_eq!(out.shape(), &[2, 4]);
    assert_close(
        out.data(),
        &[
            0.052_706, 0.056_706, 0.151_289, 0.155_289, //
            0.053_356, 0.057_356, 0.151_924, 0.155_924,
        ],
        1e-4,
    );
}

// ============================================================================
// FEED-FORWARD
// ============================================================================

#[test]
fn test_feed_forward_matches_reference() {
    let input = Tensor::from_vec(vec![1, 2], vec![1.0, 2.0]).expect("test");

    let mut params = FeedForwardParams::new(2, 4).expect("test");
    params
        .w1_mut()
        .copy_from_slice(&[1.0, 0.0, 0.5, 0.5, 0.0, 1.0, 0.5, 0.5]);
    params.b1_mut().copy_from_slice(&[1.0; 4]);
    params.w2_mut().copy_from_slice(&[0.5; 8]);
    params.b2_mut().copy_from_slice(&[2.0; 2]);

    let out = feed_forward(&input, &params, Backend::Reference).expect("test");

    assert_close(out.data(), &[6.960_396, 6.960_396], 1e-4);
}

// ============================================================================
// ENCODER LAYER
// ============================================================================

fn patterned_encoder_params() -> EncoderLayerParams {
    let mut params = EncoderLayerParams::new(4, 8, 2).expect("test");
    params.attn_mut().w_qkv_mut().copy_from_slice(&pat(0, 48));
    params.attn_mut().w_o_mut().copy_from_slice(&pat(100, 16));
    for j in 0..4 {
        params.norm1_mut().gamma_mut()[j] = 1.0 + 0.1 * j as f32;
        params.norm1_mut().beta_mut()[j] = 0.05 * j as f32;
        params.norm2_mut().gamma_mut()[j] = 1.0 - 0.05 * j as f32;
        params.norm2_mut().beta_mut()[j] = 0.02 * j as f32;
    }
    params.ffn_mut().w1_mut().copy_from_slice(&pat(200, 32));
    params.ffn_mut().w2_mut().copy_from_slice(&pat(300, 32));
    for j in 0..8 {
        params.ffn_mut().b1_mut()[j] = 0.01 * j as f32;
    }
    for j in 0..4 {
        params.ffn_mut().b2_mut()[j] = -0.02 * j as f32;
    }
    params
}

#[test]
fn test_encoder_layer_matches_reference() {
    let input = Tensor::from_vec(vec![3, 4], xpat(0, 12)).expect("test");
    let layer = EncoderLayer::from_params(patterned_encoder_params(), Backend::Reference);

    let out = layer.forward(&input).expect("test");

    assert_eq!(out.shape(), &[3, 4]);
    assert_close(
        out.data(),
        &[
            -1.201_388, 0.071_415, 1.432_471, -0.279_935, //
            1.096_271, -0.604_612, 0.801_298, -1.031_970, //
            -0.600_183, 1.137_446, -1.139_320, 0.684_137,
        ],
        1e-4,
    );
}

#[test]
fn test_encoder_layer_backends_agree() {
    let input = Tensor::from_vec(vec![3, 4], xpat(0, 12)).expect("test");

    let reference = EncoderLayer::from_params(patterned_encoder_params(), Backend::Reference)
        .forward(&input)
        .expect("test");
    let parallel = EncoderLayer::from_params(patterned_encoder_params(), Backend::Parallel)
        .forward(&input)
        .expect("test");

    assert_close(reference.data(), parallel.data(), 1e-4);
}

// ============================================================================
// DECODER LAYER
// ============================================================================

#[test]
fn test_decoder_layer_matches_reference() {
    let mut params = DecoderLayerParams::new(4, 8, 2).expect("test");
    params
        .self_attn_mut()
        .w_qkv_mut()
        .copy_from_slice(&pat(400, 48));
    params
        .self_attn_mut()
        .w_o_mut()
        .copy_from_slice(&pat(500, 16));
    params
        .cross_attn_mut()
        .w_qkv_mut()
        .copy_from_slice(&pat(600, 48));
    params
        .cross_attn_mut()
        .w_o_mut()
        .copy_from_slice(&pat(700, 16));
    for j in 0..4 {
        params.norm1_mut().gamma_mut()[j] = 1.0 + 0.1 * j as f32;
        params.norm1_mut().beta_mut()[j] = 0.05 * j as f32;
        params.norm2_mut().gamma_mut()[j] = 1.0 - 0.05 * j as f32;
        params.norm2_mut().beta_mut()[j] = 0.02 * j as f32;
        params.norm3_mut().gamma_mut()[j] = 1.0 + 0.02 * j as f32;
        params.norm3_mut().beta_mut()[j] = -0.01 * j as f32;
    }
    params.ffn_mut().w1_mut().copy_from_slice(&pat(800, 32));
    params.ffn_mut().w2_mut().copy_from_slice(&pat(900, 32));
    for j in 0..8 {
        params.ffn_mut().b1_mut()[j] = 0.01 * j as f32;
    }
    for j in 0..4 {
        params.ffn_mut().b2_mut()[j] = -0.02 * j as f32;
    }

    let decoder_input = Tensor::from_vec(vec![2, 4], xpat(5, 8)).expect("test");
    let encoder_output = Tensor::from_vec(vec![3, 4], xpat(11, 12)).expect("test");
    let layer = DecoderLayer::from_params(params, Backend::Reference);

    let out = layer.forward(&decoder_input, &encoder_output).expect("test");

    assert_eq!(out.shape(), &[2, 4]);
    assert_close(
        out.data(),
        &[
            -0.663_780, 1.225_731, -1.329_535, 0.724_134, //
            1.140_678, -0.760_110, 0.828_810, -1.324_726,
        ],
        1e-4,
    );
}

// ============================================================================
// STACKS
// ============================================================================

#[test]
fn test_encoder_decoder_pipeline() {
    let config = ModelConfig {
        d_model: 8,
        d_ff: 16,
        num_heads: 2,
        num_layers: 2,
        backend: Backend::Reference,
    };
    let mut rng = StdRng::seed_from_u64(42);
    let encoder = Encoder::random(&config, &mut rng).expect("test");
    let decoder = Decoder::random(&config, &mut rng).expect("test");

    let source = Tensor::from_vec(vec![5, 8], xpat(0, 40)).expect("test");
    let target = Tensor::from_vec(vec![3, 8], xpat(3, 24)).expect("test");

    let memory = encoder.forward(&source).expect("test");
    let out = decoder.forward(&target, &memory).expect("test");

    assert_eq!(memory.shape(), &[5, 8]);
    assert_eq!(out.shape(), &[3, 8]);
    assert!(out.data().iter().all(|v| v.is_finite()));
}

#[test]
fn test_pipeline_parallel_backend_stays_close() {
    let reference_config = ModelConfig {
        d_model: 8,
        d_ff: 16,
        num_heads: 4,
        num_layers: 2,
        backend: Backend::Reference,
    };
    let parallel_config = ModelConfig {
        backend: Backend::Parallel,
        ..reference_config
    };

    let mut rng = StdRng::seed_from_u64(7);
    let reference = Encoder::random(&reference_config, &mut rng).expect("test");
    let mut rng = StdRng::seed_from_u64(7);
    let parallel = Encoder::random(&parallel_config, &mut rng).expect("test");

    let input = Tensor::from_vec(vec![6, 8], xpat(1, 48)).expect("test");
    let a = reference.forward(&input).expect("test");
    let b = parallel.forward(&input).expect("test");

    assert_close(a.data(), b.data(), 1e-4);
}
