use std::time::Duration;

use image::RgbImage;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{AppError, AppResult};
use crate::faces::extractor::{decode_image, l2_normalize, FaceEmbeddingBackend};
use crate::faces::matcher::{similarity, Decision, MatchConfig};
use crate::faces::store::{KeyValueService, ReferenceStore, DEFAULT_REFERENCE_TTL};

pub const MESSAGE_ENROLLED: &str = "first-time enrollment and recognition succeeded";
pub const MESSAGE_MATCHED: &str = "recognition succeeded";
pub const MESSAGE_MISMATCHED: &str = "face does not match";
pub const MESSAGE_NO_FACE: &str = "no face detected";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognitionConfig {
    pub matching: MatchConfig,
    pub reference_ttl: Duration,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            matching: MatchConfig::default(),
            reference_ttl: DEFAULT_REFERENCE_TTL,
        }
    }
}

/// Terminal state of a single recognition request.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutcome {
    /// No reference existed; the presented face became the reference.
    Enrolled { guard_id: String },
    Matched { guard_id: String, similarity: f32 },
    Mismatched { guard_id: String, similarity: f32 },
    NoFaceDetected { guard_id: String },
}

impl RecognitionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            RecognitionOutcome::Enrolled { .. } | RecognitionOutcome::Matched { .. }
        )
    }

    pub fn guard_id(&self) -> &str {
        match self {
            RecognitionOutcome::Enrolled { guard_id }
            | RecognitionOutcome::Matched { guard_id, .. }
            | RecognitionOutcome::Mismatched { guard_id, .. }
            | RecognitionOutcome::NoFaceDetected { guard_id } => guard_id,
        }
    }

    pub fn similarity(&self) -> Option<f32> {
        match self {
            RecognitionOutcome::Enrolled { .. } => Some(1.0),
            RecognitionOutcome::Matched { similarity, .. }
            | RecognitionOutcome::Mismatched { similarity, .. } => Some(*similarity),
            RecognitionOutcome::NoFaceDetected { .. } => None,
        }
    }

    pub fn result(&self) -> RecognitionResult {
        let (guard_id, message) = match self {
            RecognitionOutcome::Enrolled { guard_id } => (Some(guard_id.clone()), MESSAGE_ENROLLED),
            RecognitionOutcome::Matched { guard_id, .. } => {
                (Some(guard_id.clone()), MESSAGE_MATCHED)
            }
            RecognitionOutcome::Mismatched { .. } => (None, MESSAGE_MISMATCHED),
            RecognitionOutcome::NoFaceDetected { .. } => (None, MESSAGE_NO_FACE),
        };
        RecognitionResult {
            success: self.is_accepted(),
            guard_id,
            similarity: self.similarity(),
            message: message.to_string(),
        }
    }
}

/// Response record handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionResult {
    pub success: bool,
    #[serde(rename = "guardId", skip_serializing_if = "Option::is_none")]
    pub guard_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
    pub message: String,
}

/// Enroll-or-compare state machine.
///
/// The backend is shared read-only; references are re-read from the store on
/// every request.
pub struct Recognizer<B, K> {
    backend: B,
    store: ReferenceStore<K>,
    config: RecognitionConfig,
}

impl<B, K> Recognizer<B, K>
where
    B: FaceEmbeddingBackend,
    K: KeyValueService,
{
    pub fn new(backend: B, store: ReferenceStore<K>, config: RecognitionConfig) -> Self {
        Self {
            backend,
            store,
            config,
        }
    }

    pub fn store(&self) -> &ReferenceStore<K> {
        &self.store
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    pub fn recognize(&self, guard_id: &str, image_bytes: &[u8]) -> AppResult<RecognitionOutcome> {
        validate_guard_id(guard_id)?;
        let image = decode_image(image_bytes)?;
        self.recognize_image(guard_id, &image)
    }

    pub fn recognize_image(
        &self,
        guard_id: &str,
        image: &RgbImage,
    ) -> AppResult<RecognitionOutcome> {
        validate_guard_id(guard_id)?;
        match self.backend.detect_and_embed(image)? {
            Some(embedding) => self.recognize_embedding(guard_id, embedding),
            None => {
                debug!(guard_id, "no face detected");
                Ok(RecognitionOutcome::NoFaceDetected {
                    guard_id: guard_id.to_string(),
                })
            }
        }
    }

    /// Runs the pipeline from normalization onward on a raw model embedding.
    pub fn recognize_embedding(
        &self,
        guard_id: &str,
        mut embedding: Vec<f32>,
    ) -> AppResult<RecognitionOutcome> {
        validate_guard_id(guard_id)?;
        let expected = self.store.embedding_dim();
        if embedding.len() != expected {
            return Err(AppError::DimensionMismatch {
                context: "computed",
                expected,
                found: embedding.len(),
            });
        }
        l2_normalize(&mut embedding)?;

        if !self.store.exists(guard_id)? && self.try_enroll(guard_id, &embedding)? {
            return Ok(RecognitionOutcome::Enrolled {
                guard_id: guard_id.to_string(),
            });
        }

        // The reference can expire or be removed between `exists` and `get`.
        let reference = match self.store.get(guard_id) {
            Ok(reference) => reference,
            Err(AppError::ReferenceNotFound { .. }) => {
                debug!(guard_id, "reference vanished before comparison");
                if self.try_enroll(guard_id, &embedding)? {
                    return Ok(RecognitionOutcome::Enrolled {
                        guard_id: guard_id.to_string(),
                    });
                }
                self.store.get(guard_id)?
            }
            Err(err) => return Err(err),
        };
        let score = similarity(&embedding, &reference)?;
        let decision = self.config.matching.decide(score);
        debug!(
            guard_id,
            similarity = score,
            threshold = self.config.matching.threshold,
            ?decision,
            "compared against reference"
        );

        Ok(match decision {
            Decision::Accept => RecognitionOutcome::Matched {
                guard_id: guard_id.to_string(),
                similarity: score,
            },
            Decision::Reject => RecognitionOutcome::Mismatched {
                guard_id: guard_id.to_string(),
                similarity: score,
            },
        })
    }

    /// Returns false when another writer stored a reference first.
    fn try_enroll(&self, guard_id: &str, embedding: &[f32]) -> AppResult<bool> {
        let ttl = self.config.reference_ttl;
        if self.store.put_if_absent(guard_id, embedding, ttl)? {
            info!(guard_id, ttl_secs = ttl.as_secs(), "enrolled first-seen guard");
            return Ok(true);
        }
        warn!(
            guard_id,
            "reference appeared during enrollment; comparing against it"
        );
        Ok(false)
    }
}

/// Any non-empty string is a valid guard id; it is used verbatim in the key.
pub fn validate_guard_id(guard_id: &str) -> AppResult<()> {
    if guard_id.is_empty() {
        return Err(AppError::InvalidGuardId {
            guard_id: guard_id.to_string(),
            message: "guard id cannot be empty".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faces::store::InMemoryKeyValue;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedBackend {
        replies: Mutex<VecDeque<Option<Vec<f32>>>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Option<Vec<f32>>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    impl FaceEmbeddingBackend for ScriptedBackend {
        fn detect_and_embed(&self, _image: &RgbImage) -> AppResult<Option<Vec<f32>>> {
            Ok(self.replies.lock().unwrap().pop_front().flatten())
        }
    }

    fn recognizer(
        replies: Vec<Option<Vec<f32>>>,
    ) -> Recognizer<ScriptedBackend, InMemoryKeyValue> {
        Recognizer::new(
            ScriptedBackend::new(replies),
            ReferenceStore::new(InMemoryKeyValue::new(), 2),
            RecognitionConfig::default(),
        )
    }

    #[test]
    fn enrollment_normalizes_before_storing() {
        let recognizer = recognizer(vec![Some(vec![3.0, 4.0])]);
        let outcome = recognizer
            .recognize_image("g1", &RgbImage::new(1, 1))
            .unwrap();
        assert_eq!(
            outcome,
            RecognitionOutcome::Enrolled {
                guard_id: "g1".into()
            }
        );

        let stored = recognizer.store().get("g1").unwrap();
        assert!((stored[0] - 0.6).abs() < 1e-6);
        assert!((stored[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn no_face_leaves_store_untouched() {
        let recognizer = recognizer(vec![None]);
        let outcome = recognizer
            .recognize_image("g1", &RgbImage::new(1, 1))
            .unwrap();
        assert!(!outcome.is_accepted());
        assert_eq!(outcome.result().message, MESSAGE_NO_FACE);
        assert!(!recognizer.store().exists("g1").unwrap());
    }

    #[test]
    fn computed_dimension_mismatch_is_fatal() {
        let recognizer = recognizer(vec![]);
        let err = recognizer
            .recognize_embedding("g1", vec![1.0, 0.0, 0.0])
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::DimensionMismatch {
                context: "computed",
                expected: 2,
                found: 3
            }
        ));
        assert!(!recognizer.store().exists("g1").unwrap());
    }

    #[test]
    fn zero_embedding_is_rejected_before_lookup() {
        let recognizer = recognizer(vec![]);
        let err = recognizer
            .recognize_embedding("g1", vec![0.0, 0.0])
            .unwrap_err();
        assert!(matches!(err, AppError::DegenerateEmbedding));
    }

    #[test]
    fn empty_guard_id_is_rejected() {
        let recognizer = recognizer(vec![Some(vec![1.0, 0.0])]);
        let err = recognizer.recognize_embedding("", vec![1.0, 0.0]).unwrap_err();
        assert!(matches!(err, AppError::InvalidGuardId { .. }));
        assert!(validate_guard_id("EMP-0042").is_ok());
    }

    #[test]
    fn guard_ids_with_spaces_enroll_and_match() {
        let recognizer = recognizer(vec![]);
        let outcome = recognizer
            .recognize_embedding("Zhang Wei", vec![1.0, 0.0])
            .unwrap();
        assert_eq!(
            outcome,
            RecognitionOutcome::Enrolled {
                guard_id: "Zhang Wei".into()
            }
        );
        assert!(recognizer
            .store()
            .service()
            .exists("guard:Zhang Wei")
            .unwrap());

        let outcome = recognizer
            .recognize_embedding("Zhang Wei", vec![1.0, 0.0])
            .unwrap();
        assert!(outcome.is_accepted());
    }

    #[test]
    fn result_fields_follow_outcome() {
        let enrolled = RecognitionOutcome::Enrolled {
            guard_id: "g1".into(),
        }
        .result();
        assert!(enrolled.success);
        assert_eq!(enrolled.guard_id.as_deref(), Some("g1"));
        assert_eq!(enrolled.similarity, Some(1.0));
        assert_eq!(enrolled.message, MESSAGE_ENROLLED);

        let mismatched = RecognitionOutcome::Mismatched {
            guard_id: "g1".into(),
            similarity: 0.31,
        }
        .result();
        assert!(!mismatched.success);
        assert_eq!(mismatched.guard_id, None);
        assert_eq!(mismatched.similarity, Some(0.31));
        assert_eq!(mismatched.message, MESSAGE_MISMATCHED);
    }

    #[test]
    fn result_serializes_with_wire_names() {
        let matched = RecognitionOutcome::Matched {
            guard_id: "g1".into(),
            similarity: 0.5,
        }
        .result();
        let json = serde_json::to_value(&matched).unwrap();
        assert_eq!(json["guardId"], "g1");
        assert_eq!(json["success"], true);
        assert_eq!(json["similarity"], 0.5);

        let no_face = RecognitionOutcome::NoFaceDetected {
            guard_id: "g1".into(),
        }
        .result();
        let json = serde_json::to_value(&no_face).unwrap();
        let object = json.as_object().unwrap();
        assert!(!object.contains_key("guardId"));
        assert!(!object.contains_key("similarity"));
    }
}
