use std::io::Cursor;
use std::path::PathBuf;

use image::{DynamicImage, ImageDecoder, ImageError, ImageReader, RgbImage};

use crate::errors::{AppError, AppResult};

pub const LANDMARK_ENV: &str = "LANDMARK_MODEL_PATH";
pub const ENCODER_ENV: &str = "MODEL_PATH";
/// Descriptor length of the dlib ResNet encoder.
pub const DEFAULT_EMBEDDING_DIM: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceModelPaths {
    pub landmark: PathBuf,
    pub encoder: PathBuf,
}

impl FaceModelPaths {
    pub fn resolve(landmark: Option<PathBuf>, encoder: Option<PathBuf>) -> AppResult<Self> {
        let landmark = landmark.ok_or(AppError::MissingModel {
            kind: "landmark predictor",
            flag: "--landmark-model",
            env: LANDMARK_ENV,
        })?;
        let encoder = encoder.ok_or(AppError::MissingModel {
            kind: "face encoding network",
            flag: "--encoder-model",
            env: ENCODER_ENV,
        })?;
        Ok(Self { landmark, encoder })
    }
}

/// External face detector and embedding model.
///
/// Returns `Ok(None)` when the image holds no detectable face; errors are
/// reserved for malformed input or a failing model.
pub trait FaceEmbeddingBackend {
    fn detect_and_embed(&self, image: &RgbImage) -> AppResult<Option<Vec<f32>>>;
}

impl<B: FaceEmbeddingBackend + ?Sized> FaceEmbeddingBackend for &B {
    fn detect_and_embed(&self, image: &RgbImage) -> AppResult<Option<Vec<f32>>> {
        (**self).detect_and_embed(image)
    }
}

/// Decodes an encoded image and rotates it upright according to its EXIF
/// orientation tag.
pub fn decode_image(bytes: &[u8]) -> AppResult<RgbImage> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| AppError::ImageDecode {
            source: ImageError::IoError(err),
        })?;
    let mut decoder = reader
        .into_decoder()
        .map_err(|source| AppError::ImageDecode { source })?;
    let orientation = decoder
        .orientation()
        .map_err(|source| AppError::ImageDecode { source })?;
    let mut image =
        DynamicImage::from_decoder(decoder).map_err(|source| AppError::ImageDecode { source })?;
    image.apply_orientation(orientation);
    Ok(image.to_rgb8())
}

/// Scales `embedding` to unit length in place.
pub fn l2_normalize(embedding: &mut [f32]) -> AppResult<()> {
    let magnitude = embedding
        .iter()
        .map(|value| value * value)
        .sum::<f32>()
        .sqrt();
    if !magnitude.is_finite() || magnitude <= f32::EPSILON {
        return Err(AppError::DegenerateEmbedding);
    }
    for value in embedding.iter_mut() {
        *value /= magnitude;
    }
    Ok(())
}

#[cfg(feature = "dlib")]
mod dlib_backend {
    use dlib_face_recognition::{
        FaceDetector, FaceDetectorTrait, FaceEncoderNetwork, FaceEncoderTrait, ImageMatrix,
        LandmarkPredictor, LandmarkPredictorTrait,
    };
    use image::RgbImage;
    use tracing::debug;

    use super::{FaceEmbeddingBackend, FaceModelPaths};
    use crate::errors::{AppError, AppResult};

    pub struct DlibBackend {
        detector: FaceDetector,
        predictor: LandmarkPredictor,
        encoder: FaceEncoderNetwork,
        jitters: u32,
    }

    impl DlibBackend {
        pub fn new(models: &FaceModelPaths, jitters: u32) -> AppResult<Self> {
            debug!(path = %models.landmark.display(), "loading landmark model");
            let predictor = LandmarkPredictor::open(&models.landmark).map_err(|message| {
                AppError::ModelLoad {
                    path: models.landmark.clone(),
                    message,
                }
            })?;
            debug!(path = %models.encoder.display(), "loading encoder model");
            let encoder = FaceEncoderNetwork::open(&models.encoder).map_err(|message| {
                AppError::ModelLoad {
                    path: models.encoder.clone(),
                    message,
                }
            })?;

            Ok(Self {
                detector: FaceDetector::new(),
                predictor,
                encoder,
                jitters: jitters.max(1),
            })
        }
    }

    impl FaceEmbeddingBackend for DlibBackend {
        fn detect_and_embed(&self, image: &RgbImage) -> AppResult<Option<Vec<f32>>> {
            // dlib is built against image 0.24; hand it the same pixels.
            let (width, height) = image.dimensions();
            let legacy = image024::RgbImage::from_raw(width, height, image.as_raw().clone())
                .ok_or_else(|| {
                    AppError::BackendUnavailable("RGB buffer does not match image size".into())
                })?;
            let matrix = ImageMatrix::from_image(&legacy);

            let locations = self.detector.face_locations(&matrix);
            let Some(rect) = locations.iter().next() else {
                return Ok(None);
            };
            if locations.len() > 1 {
                debug!(faces = locations.len(), "multiple faces detected; using the first");
            }

            let landmarks = vec![self.predictor.face_landmarks(&matrix, rect)];
            let encodings = self
                .encoder
                .get_face_encodings(&matrix, &landmarks, self.jitters);

            Ok(encodings
                .iter()
                .next()
                .map(|encoding| encoding.as_ref().iter().map(|value| *value as f32).collect()))
        }
    }
}

#[cfg(feature = "dlib")]
pub use dlib_backend::DlibBackend;

#[cfg(not(feature = "dlib"))]
pub struct DlibBackend {
    _private: (),
}

#[cfg(not(feature = "dlib"))]
impl DlibBackend {
    pub fn new(models: &FaceModelPaths, _jitters: u32) -> AppResult<Self> {
        let _ = models;
        Err(AppError::BackendUnavailable(
            "dlib backend disabled at compile time".into(),
        ))
    }
}

#[cfg(not(feature = "dlib"))]
impl FaceEmbeddingBackend for DlibBackend {
    fn detect_and_embed(&self, _image: &RgbImage) -> AppResult<Option<Vec<f32>>> {
        Err(AppError::BackendUnavailable(
            "dlib backend disabled at compile time".into(),
        ))
    }
}
