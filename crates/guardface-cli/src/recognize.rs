use guardface_core::faces::{
    validate_guard_id, FaceEmbeddingBackend, KeyValueService, RecognitionConfig,
    RecognitionResult, Recognizer, ReferenceStore,
};
use tracing::info;

use crate::cli::RecognizeArgs;
use crate::config::load_settings;
use crate::errors::AppResult;
use crate::runtime::{connect_store, load_backend, model_paths, read_image, recognition_config};

pub fn run_recognize(args: &RecognizeArgs) -> AppResult<RecognitionResult> {
    validate_guard_id(&args.guard_id)?;
    let settings = load_settings(&args.config)?.resolved;
    let image = read_image(&args.image)?;
    let config = recognition_config(&settings, args.threshold)?;
    let models = model_paths(
        &settings,
        args.landmark_model.clone(),
        args.encoder_model.clone(),
    )?;
    let backend = load_backend(&models, &settings)?;
    let store = connect_store(&settings)?;

    recognize_with(backend, store, config, &args.guard_id, &image)
}

pub fn recognize_with<B, K>(
    backend: B,
    store: ReferenceStore<K>,
    config: RecognitionConfig,
    guard_id: &str,
    image: &[u8],
) -> AppResult<RecognitionResult>
where
    B: FaceEmbeddingBackend,
    K: KeyValueService,
{
    let recognizer = Recognizer::new(backend, store, config);
    let outcome = recognizer.recognize(guard_id, image)?;
    info!(
        guard_id,
        accepted = outcome.is_accepted(),
        similarity = outcome.similarity(),
        "recognition finished"
    );
    Ok(outcome.result())
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardface_core::errors::AppError;
    use guardface_core::faces::InMemoryKeyValue;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    struct FixedBackend(Option<Vec<f32>>);

    impl FaceEmbeddingBackend for FixedBackend {
        fn detect_and_embed(&self, _image: &RgbImage) -> AppResult<Option<Vec<f32>>> {
            Ok(self.0.clone())
        }
    }

    fn photo() -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(4, 4))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn first_photo_enrolls_then_matches() {
        let kv = InMemoryKeyValue::new();
        let first = recognize_with(
            FixedBackend(Some(vec![0.0, 2.0])),
            ReferenceStore::new(&kv, 2),
            RecognitionConfig::default(),
            "g1",
            &photo(),
        )
        .unwrap();
        assert!(first.success);
        assert_eq!(first.similarity, Some(1.0));
        assert_eq!(kv.len().unwrap(), 1);

        let second = recognize_with(
            FixedBackend(Some(vec![1.0, 0.0])),
            ReferenceStore::new(&kv, 2),
            RecognitionConfig::default(),
            "g1",
            &photo(),
        )
        .unwrap();
        assert!(!second.success);
        assert_eq!(second.guard_id, None);
        assert_eq!(second.similarity, Some(0.0));
    }

    #[test]
    fn invalid_guard_id_fails_before_loading_anything() {
        let args = RecognizeArgs {
            guard_id: String::new(),
            image: "/nonexistent/photo.jpg".into(),
            threshold: None,
            landmark_model: None,
            encoder_model: None,
            config: Default::default(),
        };
        let err = run_recognize(&args).unwrap_err();
        assert!(matches!(err, AppError::InvalidGuardId { .. }));
    }
}
