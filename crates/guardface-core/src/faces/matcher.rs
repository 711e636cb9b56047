use serde::Serialize;

use crate::errors::{AppError, AppResult};

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchConfig {
    pub threshold: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl MatchConfig {
    pub fn decide(&self, score: f32) -> Decision {
        decide(score, self.threshold)
    }
}

/// Raw dot product of two embeddings.
///
/// Equals cosine similarity only when both inputs are unit length; inputs are
/// never re-normalized here.
pub fn similarity(lhs: &[f32], rhs: &[f32]) -> AppResult<f32> {
    if lhs.len() != rhs.len() {
        return Err(AppError::DimensionMismatch {
            context: "compared",
            expected: lhs.len(),
            found: rhs.len(),
        });
    }

    Ok(lhs.iter().zip(rhs.iter()).map(|(l, r)| l * r).sum())
}

pub fn decide(score: f32, threshold: f32) -> Decision {
    if score >= threshold {
        Decision::Accept
    } else {
        Decision::Reject
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_unit_vectors_score_one() {
        let v = [0.6_f32, 0.8];
        assert!((similarity(&v, &v).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert_eq!(similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn non_unit_inputs_are_not_renormalized() {
        let score = similarity(&[2.0, 0.0], &[3.0, 0.0]).unwrap();
        assert_eq!(score, 6.0);
    }

    #[test]
    fn unequal_lengths_are_a_dimension_mismatch() {
        let err = similarity(&[1.0, 0.0], &[1.0]).unwrap_err();
        assert!(matches!(
            err,
            AppError::DimensionMismatch {
                expected: 2,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn threshold_is_inclusive() {
        assert_eq!(decide(0.8, 0.8), Decision::Accept);
        assert_eq!(decide(0.8 - 1e-6, 0.8), Decision::Reject);
        assert_eq!(decide(0.95, 0.8), Decision::Accept);
    }

    #[test]
    fn default_threshold_applies() {
        let config = MatchConfig::default();
        assert_eq!(config.decide(0.81), Decision::Accept);
        assert_eq!(config.decide(0.79), Decision::Reject);
    }
}
