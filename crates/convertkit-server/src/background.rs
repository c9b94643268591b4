//! Background removal for `POST /api/remove-bg`.
//!
//! Segmentation runs on the pure-Rust Tract backend of `imgly-bgremove`
//! and is compiled in with the `remove-bg` cargo feature. Without it the
//! endpoint still exists and answers `501 FEATURE_DISABLED`.

#[cfg(not(feature = "remove-bg"))]
use crate::error::ServerError;

/// Model used when `--bg-model` is not given.
pub const DEFAULT_BG_MODEL: &str = "imgly--isnet-general-onnx";

#[cfg(feature = "remove-bg")]
pub use enabled::remove_background;

#[cfg(feature = "remove-bg")]
mod enabled {
    use std::path::PathBuf;

    use convertkit_core::decode_image;
    use imgly_bgremove::{
        BackendFactory, BackendType, BackgroundRemovalProcessor, BgRemovalError,
        InferenceBackend, ModelManager, ModelSource, ModelSpec, OutputFormat,
        ProcessorConfigBuilder, TractBackend,
    };
    use tracing::debug;

    use crate::error::ServerError;

    /// Hands out Tract backends only, so no native runtime is linked.
    #[derive(Debug)]
    struct TractBackendFactory;

    impl BackendFactory for TractBackendFactory {
        fn create_backend(
            &self,
            backend_type: BackendType,
            model_manager: ModelManager,
        ) -> imgly_bgremove::Result<Box<dyn InferenceBackend>> {
            match backend_type {
                BackendType::Tract => {
                    Ok(Box::new(TractBackend::with_model_manager(model_manager)))
                }
                other => Err(BgRemovalError::invalid_config(format!(
                    "backend {other:?} is not built into this server"
                ))),
            }
        }

        fn available_backends(&self) -> Vec<BackendType> {
            vec![BackendType::Tract]
        }
    }

    /// An existing path is loaded as an external model directory; anything
    /// else is treated as the id of a downloaded model in the cache.
    fn model_spec(model: &str) -> ModelSpec {
        let path = PathBuf::from(model);
        let source = if path.exists() {
            ModelSource::External(path)
        } else {
            ModelSource::Downloaded(model.to_string())
        };
        ModelSpec {
            source,
            variant: None,
        }
    }

    /// Cut the subject out of `bytes` and return it as a transparent PNG.
    ///
    /// Blocking: loads the model and runs inference on the calling thread.
    pub fn remove_background(bytes: &[u8], model: &str) -> Result<Vec<u8>, ServerError> {
        let image = decode_image(bytes)?.into_dynamic().ok_or_else(|| {
            ServerError::Internal("decoded buffer does not match its size".into())
        })?;

        let config = ProcessorConfigBuilder::new()
            .model_spec(model_spec(model))
            .backend_type(BackendType::Tract)
            .output_format(OutputFormat::Png)
            .build()?;
        let mut processor =
            BackgroundRemovalProcessor::with_factory(config, Box::new(TractBackendFactory))?;

        debug!(
            model,
            width = image.width(),
            height = image.height(),
            "removing background"
        );
        let result = processor.process_image(&image)?;
        Ok(result.to_bytes(OutputFormat::Png, 100)?)
    }

}

/// Stand-in used when the server is built without `remove-bg`.
#[cfg(not(feature = "remove-bg"))]
pub fn remove_background(_bytes: &[u8], _model: &str) -> Result<Vec<u8>, ServerError> {
    Err(ServerError::FeatureDisabled("remove-bg"))
}

#[cfg(all(test, not(feature = "remove-bg")))]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_build_reports_feature() {
        let err = remove_background(&[], DEFAULT_BG_MODEL).unwrap_err();
        assert!(matches!(err, ServerError::FeatureDisabled("remove-bg")));
    }
}
