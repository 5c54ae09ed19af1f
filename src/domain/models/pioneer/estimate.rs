//! Scalar and vector estimates.
//!
//! An expert reports either a single real number or a fixed-length vector.
//! All arithmetic the detection tests need (differences, norms, dot products,
//! weighted combinations) is defined component-wise here so the tests never
//! branch on the shape of the value.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tolerance under which a distance or movement is treated as zero.
pub const EPSILON: f64 = 1e-12;

/// A single expert estimate: a scalar or a fixed-length vector.
///
/// Serialized untagged, so `10.5` and `[1.0, 2.0]` are both valid JSON inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Estimate {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl Estimate {
    /// The estimate's components as a slice (a scalar is a 1-element slice).
    pub fn components(&self) -> &[f64] {
        match self {
            Self::Scalar(v) => std::slice::from_ref(v),
            Self::Vector(v) => v,
        }
    }

    /// Number of components.
    pub fn dimension(&self) -> usize {
        self.components().len()
    }

    pub fn is_finite(&self) -> bool {
        self.components().iter().all(|v| v.is_finite())
    }

    /// Build an estimate of the same shape as `self` from raw components.
    fn with_components(&self, values: Vec<f64>) -> Self {
        match self {
            Self::Scalar(_) => Self::Scalar(values.first().copied().unwrap_or(0.0)),
            Self::Vector(_) => Self::Vector(values),
        }
    }

    /// Component-wise `self - other`.
    pub fn sub(&self, other: &Self) -> Self {
        let values = self
            .components()
            .iter()
            .zip(other.components())
            .map(|(a, b)| a - b)
            .collect();
        self.with_components(values)
    }

    /// Euclidean norm (absolute value for scalars).
    pub fn norm(&self) -> f64 {
        match self {
            Self::Scalar(v) => v.abs(),
            Self::Vector(v) => v.iter().map(|x| x * x).sum::<f64>().sqrt(),
        }
    }

    /// Distance between two estimates of the same dimension.
    pub fn distance(&self, other: &Self) -> f64 {
        self.sub(other).norm()
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.components()
            .iter()
            .zip(other.components())
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Weighted combination `Σ w_k · x_k` of same-dimension estimates.
    ///
    /// Returns `None` for an empty input.
    pub fn weighted_sum<'a, I>(items: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, &'a Self)>,
    {
        let mut iter = items.into_iter();
        let (w0, first) = iter.next()?;
        let mut acc: Vec<f64> = first.components().iter().map(|v| w0 * v).collect();
        for (w, estimate) in iter {
            for (slot, v) in acc.iter_mut().zip(estimate.components()) {
                *slot += w * v;
            }
        }
        Some(first.with_components(acc))
    }

    /// Unweighted arithmetic mean of same-dimension estimates.
    pub fn mean<'a, I>(items: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Self>,
    {
        let items: Vec<&Self> = items.into_iter().collect();
        if items.is_empty() {
            return None;
        }
        let w = 1.0 / items.len() as f64;
        Self::weighted_sum(items.into_iter().map(|e| (w, e)))
    }
}

impl From<f64> for Estimate {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<f64>> for Estimate {
    fn from(value: Vec<f64>) -> Self {
        Self::Vector(value)
    }
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{v:.4}"),
            Self::Vector(values) => {
                let parts: Vec<String> = values.iter().map(|v| format!("{v:.4}")).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}
