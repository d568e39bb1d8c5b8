//! Tensor implementation
//!
//! This module provides the core `Tensor` type, a dense N-dimensional array
//! stored as a flat row-major buffer. Shapes are always caller-supplied and
//! validated at construction; no operation ever infers a shape from a buffer
//! length.

use std::fmt;

use num_traits::Num;
use serde::{Deserialize, Serialize};

use crate::error::{InferirError, Result};

/// N-dimensional tensor stored in row-major order
///
/// Each tensor owns its storage; no tensor borrows another tensor's buffer.
/// The layer and attention entry points work with rank-2 tensors of `f32`,
/// where `shape[0]` is the sequence length and `shape[1]` the feature width.
///
/// # Examples
///
/// ```
/// use inferir::Tensor;
///
/// // Create a 2×3 tensor
/// let t = Tensor::from_vec(vec![2, 3], vec![
///     1.0, 2.0, 3.0,
///     4.0, 5.0, 6.0,
/// ]).unwrap();
///
/// assert_eq!(t.shape(), &[2, 3]);
/// assert_eq!(t.ndim(), 2);
/// assert_eq!(t.size(), 6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor<T: Num> {
    /// Flattened data in row-major order
    data: Vec<T>,
    /// Shape of the tensor
    shape: Vec<usize>,
}

impl<T: Num + Clone> Tensor<T> {
    /// Create a new tensor from a vector and shape
    ///
    /// # Arguments
    ///
    /// * `shape` - Dimensions of the tensor
    /// * `data` - Flattened data in row-major order
    ///
    /// # Errors
    ///
    /// Returns `Err` if:
    /// - Shape is empty
    /// - Data size doesn't match shape
    /// - Shape contains zero
    ///
    /// # Examples
    ///
    /// ```
    /// use inferir::Tensor;
    ///
    /// let t = Tensor::from_vec(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    /// assert_eq!(t.shape(), &[2, 2]);
    /// ```
    pub fn from_vec(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        // Validate shape
        if shape.is_empty() {
            return Err(InferirError::InvalidShape {
                reason: "Shape cannot be empty".to_string(),
            });
        }

        if shape.contains(&0) {
            return Err(InferirError::InvalidShape {
                reason: "Shape dimensions cannot be zero".to_string(),
            });
        }

        // Calculate expected size
        let expected_size = shape.iter().product();

        // Validate data size
        if data.len() != expected_size {
            return Err(InferirError::DataShapeMismatch {
                data_size: data.len(),
                shape: shape.clone(),
                expected: expected_size,
            });
        }

        Ok(Self { data, shape })
    }

    /// Create a zero-filled tensor of the given shape
    ///
    /// # Errors
    ///
    /// Returns `Err` if the shape is empty or contains zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use inferir::Tensor;
    ///
    /// let t = Tensor::<f32>::zeros(vec![2, 4]).unwrap();
    /// assert_eq!(t.size(), 8);
    /// assert!(t.data().iter().all(|&x| x == 0.0));
    /// ```
    pub fn zeros(shape: Vec<usize>) -> Result<Self> {
        if shape.is_empty() {
            return Err(InferirError::InvalidShape {
                reason: "Shape cannot be empty".to_string(),
            });
        }

        if shape.contains(&0) {
            return Err(InferirError::InvalidShape {
                reason: "Shape dimensions cannot be zero".to_string(),
            });
        }

        let size = shape.iter().product();
        Ok(Self {
            data: vec![T::zero(); size],
            shape,
        })
    }

    /// Get the shape of the tensor
    ///
    /// # Examples
    ///
    /// ```
    /// use inferir::Tensor;
    ///
    /// let t = Tensor::from_vec(vec![3, 4], vec![0.0; 12]).unwrap();
    /// assert_eq!(t.shape(), &[3, 4]);
    /// ```
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the number of dimensions
    ///
    /// # Examples
    ///
    /// ```
    /// use inferir::Tensor;
    ///
    /// let t = Tensor::from_vec(vec![2, 3, 4], vec![0.0; 24]).unwrap();
    /// assert_eq!(t.ndim(), 3);
    /// ```
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Get the total number of elements
    ///
    /// # Examples
    ///
    /// ```
    /// use inferir::Tensor;
    ///
    /// let t = Tensor::from_vec(vec![2, 3], vec![0.0; 6]).unwrap();
    /// assert_eq!(t.size(), 6);
    /// ```
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Get a reference to the underlying data
    ///
    /// # Examples
    ///
    /// ```
    /// use inferir::Tensor;
    ///
    /// let t = Tensor::from_vec(vec![2], vec![1.0, 2.0]).unwrap();
    /// assert_eq!(t.data(), &[1.0, 2.0]);
    /// ```
    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    ///
    /// Used by weight loaders and in-place kernels. The shape is fixed at
    /// construction and cannot be changed through this accessor.
    ///
    /// # Examples
    ///
    /// ```
    /// use inferir::Tensor;
    ///
    /// let mut t = Tensor::<f32>::zeros(vec![2]).unwrap();
    /// t.data_mut()[0] = 3.0;
    /// assert_eq!(t.data(), &[3.0, 0.0]);
    /// ```
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consume the tensor and return its data buffer
    #[must_use]
    pub fn into_data(self) -> Vec<T> {
        self.data
    }
}

impl<T: Num + Clone + fmt::Display> fmt::Display for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor(shape={:?}, data=[", self.shape)?;
        for (i, val) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{val}")?;
        }
        write!(f, "])")
    }
}
