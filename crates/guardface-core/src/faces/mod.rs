pub mod bootstrap;
pub mod codec;
pub mod extractor;
pub mod matcher;
pub mod recognition;
pub mod store;

pub use bootstrap::{bootstrap_references, decode_reference_file, BootstrapConfig, BootstrapReport};

pub use codec::CodecError;

pub use extractor::{
    decode_image, l2_normalize, DlibBackend, FaceEmbeddingBackend, FaceModelPaths,
    DEFAULT_EMBEDDING_DIM,
};

pub use matcher::{decide, similarity, Decision, MatchConfig, DEFAULT_SIMILARITY_THRESHOLD};

pub use recognition::{
    validate_guard_id, RecognitionConfig, RecognitionOutcome, RecognitionResult, Recognizer,
};

pub use store::{
    reference_key, InMemoryKeyValue, KeyValueService, ReferenceStore, DEFAULT_REFERENCE_TTL,
};

#[cfg(feature = "redis")]
pub use store::{RedisEndpoint, RedisKeyValue};
