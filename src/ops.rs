//! Elementwise and reduction kernels
//!
//! Slice-level building blocks shared by the attention engine and the layer
//! forward passes:
//!
//! - [`add_bias`] - Broadcast a bias vector over every row
//! - [`causal_mask`] - Lower-triangular mask generator
//! - [`add`] - In-place elementwise add (the residual connection)
//! - [`scale_scores`] - Multiply attention scores by `1/sqrt(d_k)`
//! - [`apply_mask`] - Set masked-out scores to `-inf` before softmax
//! - [`softmax_rows`] - Numerically stable row-wise softmax
//! - [`mean_variance`] - Population mean and variance of a slice
//! - [`gelu`] - In-place tanh-approximation GELU
//!
//! All kernels take explicit `(rows, cols)` shape arguments where a shape
//! matters; none of them infers a shape from a buffer length. Mask
//! application must happen before softmax, never after.

use crate::error::{InferirError, Result};

/// Degeneracy floor shared by the softmax denominator and the variance floor
///
/// Keeps fully-masked softmax rows and zero-variance normalization finite
/// without ever escalating them as errors.
pub const EPSILON: f32 = 1e-5;

/// Tanh-approximation GELU cubic coefficient
const GELU_COEFF: f32 = 0.044_715;

/// `sqrt(2 / pi)` for the tanh-approximation GELU
const SQRT_2_OVER_PI: f32 = 0.797_884_56;

/// Add a bias vector to every row of a row-major matrix in place
///
/// # Arguments
///
/// * `matrix` - `rows * cols` elements, row-major
/// * `bias` - `cols` elements, broadcast over the rows
///
/// # Errors
///
/// Returns `Err` if `matrix.len() != rows * cols` or `bias.len() != cols`.
///
/// # Examples
///
/// ```
/// use inferir::ops::add_bias;
///
/// let mut m = vec![1.0, 2.0, 3.0, 4.0];
/// add_bias(&mut m, &[10.0, 20.0], 2, 2).unwrap();
/// assert_eq!(m, vec![11.0, 22.0, 13.0, 24.0]);
/// ```
pub fn add_bias(matrix: &mut [f32], bias: &[f32], rows: usize, cols: usize) -> Result<()> {
    if matrix.len() != rows * cols {
        return Err(InferirError::DataShapeMismatch {
            data_size: matrix.len(),
            shape: vec![rows, cols],
            expected: rows * cols,
        });
    }
    if bias.len() != cols {
        return Err(InferirError::DataShapeMismatch {
            data_size: bias.len(),
            shape: vec![cols],
            expected: cols,
        });
    }

    for row in matrix.chunks_mut(cols) {
        for (val, &b) in row.iter_mut().zip(bias) {
            *val += b;
        }
    }
    Ok(())
}

/// Build a causal (lower-triangular) mask for sequence length `len`
///
/// `mask[i * len + j]` is `1.0` when `j <= i` and `0.0` otherwise, so token
/// `i` may attend to itself and to earlier positions only.
///
/// # Examples
///
/// ```
/// use inferir::ops::causal_mask;
///
/// let mask = causal_mask(2);
/// assert_eq!(mask, vec![1.0, 0.0, 1.0, 1.0]);
/// ```
#[must_use]
pub fn causal_mask(len: usize) -> Vec<f32> {
    let mut mask = vec![0.0f32; len * len];
    for i in 0..len {
        for j in 0..=i {
            mask[i * len + j] = 1.0;
        }
    }
    mask
}

/// Elementwise in-place add: `acc[i] += other[i]`
///
/// The residual-connection primitive used by the layer compositions.
///
/// # Errors
///
/// Returns `Err` if the slices have different lengths.
///
/// # Examples
///
/// ```
/// use inferir::ops::add;
///
/// let mut a = vec![1.0, 2.0, 3.0];
/// add(&mut a, &[4.0, 5.0, 6.0]).unwrap();
/// assert_eq!(a, vec![5.0, 7.0, 9.0]);
/// ```
pub fn add(acc: &mut [f32], other: &[f32]) -> Result<()> {
    if acc.len() != other.len() {
        return Err(InferirError::InvalidShape {
            reason: format!(
                "Residual add requires equal lengths, got {} and {}",
                acc.len(),
                other.len()
            ),
        });
    }
    for (a, &b) in acc.iter_mut().zip(other) {
        *a += b;
    }
    Ok(())
}

/// Scale attention scores by `1/sqrt(d_k)` in place
///
/// `d_k` is guaranteed positive by the parameter constructors; the scale is
/// applied to every element regardless of shape.
///
/// # Examples
///
/// ```
/// use inferir::ops::scale_scores;
///
/// let mut scores = vec![1.0, 2.0, 3.0, 4.0];
/// scale_scores(&mut scores, 4);
/// assert_eq!(scores, vec![0.5, 1.0, 1.5, 2.0]);
/// ```
pub fn scale_scores(scores: &mut [f32], d_k: usize) {
    debug_assert!(d_k > 0, "d_k must be positive");
    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 / (d_k as f32).sqrt();
    for s in scores.iter_mut() {
        *s *= scale;
    }
}

/// Set scores to `-inf` wherever the mask is zero, in place
///
/// `None` is an explicit no-op (unmasked attention). Must run before
/// [`softmax_rows`] so masked positions exponentiate to exactly zero.
///
/// # Errors
///
/// Returns `Err` if a mask is present and its length differs from the
/// scores length.
///
/// # Examples
///
/// ```
/// use inferir::ops::apply_mask;
///
/// let mut scores = vec![1.0, 2.0, 3.0, 4.0];
/// apply_mask(&mut scores, Some(&[1.0, 0.0, 1.0, 0.0])).unwrap();
/// assert_eq!(scores[0], 1.0);
/// assert_eq!(scores[1], f32::NEG_INFINITY);
/// ```
pub fn apply_mask(scores: &mut [f32], mask: Option<&[f32]>) -> Result<()> {
    let Some(mask) = mask else {
        return Ok(());
    };

    if mask.len() != scores.len() {
        return Err(InferirError::InvalidShape {
            reason: format!(
                "Mask length {} doesn't match scores length {}",
                mask.len(),
                scores.len()
            ),
        });
    }
    for (score, &m) in scores.iter_mut().zip(mask) {
        if m == 0.0 {
            *score = f32::NEG_INFINITY;
        }
    }
    Ok(())
}

/// Row-wise numerically stable softmax
///
/// Per row: subtract the row max, exponentiate, sum, divide by
/// `(sum + EPSILON)`. A fully masked row (max is `-inf`) yields all zeros
/// rather than NaN. For finite input each output row sums to within `1e-4`
/// of 1.
///
/// # Errors
///
/// Returns `Err` if a dimension is zero or `scores.len() != rows * cols`.
///
/// # Examples
///
/// ```
/// use inferir::ops::softmax_rows;
///
/// let weights = softmax_rows(&[0.0, 1.0, 2.0, 3.0], 2, 2).unwrap();
/// let row_sum: f32 = weights[..2].iter().sum();
/// assert!((row_sum - 1.0).abs() < 1e-4);
/// ```
pub fn softmax_rows(scores: &[f32], rows: usize, cols: usize) -> Result<Vec<f32>> {
    if rows == 0 || cols == 0 {
        return Err(InferirError::InvalidShape {
            reason: format!("Softmax dimensions cannot be zero (rows={rows}, cols={cols})"),
        });
    }
    if scores.len() != rows * cols {
        return Err(InferirError::DataShapeMismatch {
            data_size: scores.len(),
            shape: vec![rows, cols],
            expected: rows * cols,
        });
    }

    let mut weights = Vec::with_capacity(scores.len());
    for row in scores.chunks(cols) {
        let max_val = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        // A row with no finite score has nothing to attend to; exp(-inf - -inf)
        // would be NaN, so short-circuit to zero weights.
        if max_val == f32::NEG_INFINITY {
            weights.resize(weights.len() + cols, 0.0);
            continue;
        }

        let exp_vals: Vec<f32> = row.iter().map(|&x| (x - max_val).exp()).collect();
        let sum_exp: f32 = exp_vals.iter().sum();
        for &exp_val in &exp_vals {
            weights.push(exp_val / (sum_exp + EPSILON));
        }
    }

    debug_assert!(
        weights.iter().all(|&w| w.is_finite()),
        "softmax produced NaN or Inf values"
    );

    Ok(weights)
}

/// Population mean and variance of a slice
///
/// Divides by `len`, not `len - 1`. A variance of exactly zero is floored to
/// [`EPSILON`] so downstream normalization never divides by zero; an empty
/// slice yields `(0.0, EPSILON)`.
///
/// # Examples
///
/// ```
/// use inferir::ops::mean_variance;
///
/// let (mean, variance) = mean_variance(&[0.0, 1.0, 2.0, 3.0, 4.0]);
/// assert!((mean - 2.0).abs() < 1e-6);
/// assert!((variance - 2.0).abs() < 1e-6);
/// ```
#[must_use]
pub fn mean_variance(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, EPSILON);
    }

    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let mut variance = values
        .iter()
        .map(|&x| {
            let diff = x - mean;
            diff * diff
        })
        .sum::<f32>()
        / n;

    if variance == 0.0 {
        variance = EPSILON;
    }
    (mean, variance)
}

/// Apply the tanh-approximation GELU elementwise in place
///
/// `0.5 * x * (1 + tanh(sqrt(2/pi) * (x + 0.044715 * x^3)))`, the form used
/// by GPT-2/BERT-family models.
///
/// # Examples
///
/// ```
/// use inferir::ops::gelu;
///
/// let mut data = vec![-1.0, 0.0, 1.0];
/// gelu(&mut data);
/// assert!((data[0] + 0.158808).abs() < 1e-5);
/// assert_eq!(data[1], 0.0);
/// assert!((data[2] - 0.841192).abs() < 1e-5);
/// ```
pub fn gelu(data: &mut [f32]) {
    for x in data.iter_mut() {
        let x3 = *x * *x * *x;
        let inner = SQRT_2_OVER_PI * (*x + GELU_COEFF * x3);
        *x = 0.5 * *x * (1.0 + inner.tanh());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_bias() {
        let mut m = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        add_bias(&mut m, &[0.5, -0.5, 1.0], 2, 3).expect("add_bias");
        assert_eq!(m, vec![1.5, 1.5, 4.0, 4.5, 4.5, 7.0]);
    }

    #[test]
    fn test_add_bias_rejects_wrong_bias_len() {
        let mut m = vec![0.0; 6];
        assert!(add_bias(&mut m, &[1.0, 2.0], 2, 3).is_err());
    }

    #[test]
    fn test_add_bias_rejects_wrong_matrix_len() {
        let mut m = vec![0.0; 5];
        assert!(add_bias(&mut m, &[1.0, 2.0, 3.0], 2, 3).is_err());
    }

    #[test]
    fn test_causal_mask_len_3() {
        let mask = causal_mask(3);
        #[rustfmt::skip]
        let expected = vec![
            1.0, 0.0, 0.0,
            1.0, 1.0, 0.0,
            1.0, 1.0, 1.0,
        ];
        assert_eq!(mask, expected);
    }

    #[test]
    fn test_add_residual() {
        let mut acc = vec![1.0, -2.0, 3.0];
        add(&mut acc, &[0.5, 0.5, 0.5]).expect("add");
        assert_eq!(acc, vec![1.5, -1.5, 3.5]);
    }

    #[test]
    fn test_add_rejects_length_mismatch() {
        let mut acc = vec![1.0, 2.0];
        assert!(add(&mut acc, &[1.0]).is_err());
    }

    #[test]
    fn test_scale_scores_by_inverse_sqrt() {
        let mut scores = vec![1.0, 2.0, 3.0, 4.0];
        scale_scores(&mut scores, 4);
        assert_eq!(scores, vec![0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn test_apply_mask_sets_neg_infinity() {
        let mut scores = vec![1.0, 2.0, 3.0, 4.0];
        apply_mask(&mut scores, Some(&[1.0, 0.0, 1.0, 0.0])).expect("apply_mask");
        assert_eq!(scores[0], 1.0);
        assert_eq!(scores[1], f32::NEG_INFINITY);
        assert_eq!(scores[2], 3.0);
        assert_eq!(scores[3], f32::NEG_INFINITY);
    }

    #[test]
    fn test_apply_mask_none_is_noop() {
        let mut scores = vec![1.0, 2.0];
        apply_mask(&mut scores, None).expect("apply_mask");
        assert_eq!(scores, vec![1.0, 2.0]);
    }

    #[test]
    fn test_apply_mask_rejects_length_mismatch() {
        let mut scores = vec![1.0, 2.0];
        assert!(apply_mask(&mut scores, Some(&[1.0])).is_err());
    }

    #[test]
    fn test_softmax_rows_fixture() {
        let weights = softmax_rows(&[0.0, 1.0, 2.0, 3.0], 2, 2).expect("softmax");
        // exp(0)/(exp(0)+exp(1)) with the epsilon denominator
        for row in weights.chunks(2) {
            assert!((row[0] - 0.268_939_5).abs() < 1e-6);
            assert!((row[1] - 0.731_053_2).abs() < 1e-6);
        }
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let weights = softmax_rows(&[-3.0, 0.5, 2.0, 10.0, 10.0, 10.0], 2, 3).expect("softmax");
        for row in weights.chunks(3) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4, "row sum {sum}");
        }
    }

    #[test]
    fn test_softmax_rows_masked_positions_are_zero() {
        let mut scores = vec![0.0f32; 9];
        apply_mask(&mut scores, Some(&causal_mask(3))).expect("apply_mask");
        let weights = softmax_rows(&scores, 3, 3).expect("softmax");

        // Row 0 attends only to itself; the epsilon denominator shows up
        // in the sixth decimal.
        assert!((weights[0] - 0.999_99).abs() < 2e-5);
        assert_eq!(weights[1], 0.0);
        assert_eq!(weights[2], 0.0);
        // Row 1 splits evenly across two visible positions
        assert!((weights[3] - 0.5).abs() < 1e-5);
        assert!((weights[4] - 0.5).abs() < 1e-5);
        assert_eq!(weights[5], 0.0);
        // Row 2 sees everything
        for &w in &weights[6..9] {
            assert!((w - 1.0 / 3.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_softmax_rows_fully_masked_row_is_zeros() {
        let scores = vec![
            f32::NEG_INFINITY,
            f32::NEG_INFINITY,
            1.0,
            2.0,
        ];
        let weights = softmax_rows(&scores, 2, 2).expect("softmax");
        assert_eq!(&weights[..2], &[0.0, 0.0]);
        assert!(weights[2..].iter().all(|&w| w.is_finite() && w > 0.0));
    }

    #[test]
    fn test_softmax_rows_rejects_bad_len() {
        assert!(softmax_rows(&[1.0, 2.0, 3.0], 2, 2).is_err());
        assert!(softmax_rows(&[], 0, 2).is_err());
    }

    #[test]
    fn test_mean_variance_fixture() {
        let (mean, variance) = mean_variance(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!((mean - 2.0).abs() < 1e-6);
        assert!((variance - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_mean_variance_constant_input_gets_floor() {
        let (mean, variance) = mean_variance(&[5.0, 5.0, 5.0]);
        assert!((mean - 5.0).abs() < 1e-6);
        assert_eq!(variance, EPSILON);
    }

    #[test]
    fn test_mean_variance_empty() {
        let (mean, variance) = mean_variance(&[]);
        assert_eq!(mean, 0.0);
        assert_eq!(variance, EPSILON);
    }

    #[test]
    fn test_gelu_fixture_points() {
        let mut data = vec![-2.0, -1.0, -0.5, 0.0, 0.5, 1.0, 2.0, 3.0];
        gelu(&mut data);
        let expected = [
            -0.045_402_3,
            -0.158_808_0,
            -0.154_286_0,
            0.0,
            0.345_714_0,
            0.841_192_0,
            1.954_597_7,
            2.996_362_6,
        ];
        for (got, want) in data.iter().zip(&expected) {
            assert!((got - want).abs() < 1e-5, "got {got}, want {want}");
        }
    }

    #[test]
    fn test_gelu_saturates_at_large_magnitudes() {
        // Identity for large positive input, zero for large negative
        let mut data = vec![10.0, -10.0];
        gelu(&mut data);
        assert!((data[0] - 10.0).abs() < 1e-4);
        assert!(data[1].abs() < 1e-4);
    }
}
