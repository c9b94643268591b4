//! Multipart upload collection and form field parsing.

use std::collections::HashMap;

use axum::extract::Multipart;
use tracing::debug;

use crate::error::ServerError;

/// Target size used when a resize request omits `kb`.
pub const DEFAULT_TARGET_KB: f64 = 50.0;

/// Form field carrying uploaded files.
const FILE_FIELD: &str = "file";

/// Text form fields the tools read. Other parts are skipped unread.
const TEXT_FIELDS: &[&str] = &["kb"];

/// Files and text fields read from one multipart request.
#[derive(Debug, Default)]
pub struct Upload {
    files: Vec<Vec<u8>>,
    fields: HashMap<String, String>,
}

impl Upload {
    /// Drain `multipart` into memory.
    ///
    /// Every non-empty `file` part is kept in order. Browsers send an empty
    /// part when no file was chosen, so those are skipped. Known text fields
    /// are read as UTF-8; any other part is ignored.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ServerError> {
        let mut upload = Upload::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == FILE_FIELD {
                let file_name = field.file_name().map(str::to_owned);
                let data = field.bytes().await?;
                if data.is_empty() {
                    debug!(?file_name, "skipping empty file part");
                    continue;
                }
                debug!(?file_name, bytes = data.len(), "received file");
                upload.files.push(data.to_vec());
            } else if TEXT_FIELDS.contains(&name.as_str()) {
                let value = field.text().await?;
                upload.fields.insert(name, value);
            } else {
                debug!(field = %name, "skipping unknown form part");
            }
        }

        Ok(upload)
    }

    /// Value of a text field, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The uploaded file, for tools that take exactly one.
    ///
    /// Extra files are ignored; the first is used.
    pub fn into_file(self) -> Result<Vec<u8>, ServerError> {
        self.files
            .into_iter()
            .next()
            .ok_or_else(|| ServerError::InvalidRequest("No file uploaded".to_string()))
    }

    /// All uploaded files in request order; at least one is required.
    pub fn into_files(self) -> Result<Vec<Vec<u8>>, ServerError> {
        if self.files.is_empty() {
            return Err(ServerError::InvalidRequest("No file uploaded".to_string()));
        }
        Ok(self.files)
    }
}

/// Parse the `kb` form field into a target size in kilobytes.
///
/// A missing field yields [`DEFAULT_TARGET_KB`]. The value is trimmed and
/// must be a finite number; zero and negative targets are rejected here so
/// they never reach the encoder.
pub fn parse_target_kb(raw: Option<&str>) -> Result<f64, ServerError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_TARGET_KB);
    };

    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ServerError::InvalidRequest(format!("kb must be a number, got {raw:?}")))?;

    if !value.is_finite() {
        return Err(ServerError::InvalidRequest(format!(
            "kb must be a finite number, got {raw:?}"
        )));
    }
    if value <= 0.0 {
        return Err(ServerError::InvalidTarget(format!(
            "{value} KB (must be a positive number)"
        )));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_kb_uses_default() {
        assert_eq!(parse_target_kb(None).unwrap(), DEFAULT_TARGET_KB);
    }

    #[test]
    fn test_kb_is_trimmed() {
        assert_eq!(parse_target_kb(Some(" 120 ")).unwrap(), 120.0);
        assert_eq!(parse_target_kb(Some("7.5")).unwrap(), 7.5);
    }

    #[test]
    fn test_kb_rejects_garbage() {
        for raw in ["", "abc", "50kb", "NaN", "inf", "-inf"] {
            assert!(
                matches!(parse_target_kb(Some(raw)), Err(ServerError::InvalidRequest(_))),
                "{raw:?} should be rejected as malformed"
            );
        }
    }

    #[test]
    fn test_kb_rejects_non_positive() {
        for raw in ["0", "-1", "-0.5"] {
            assert!(
                matches!(parse_target_kb(Some(raw)), Err(ServerError::InvalidTarget(_))),
                "{raw:?} should be an invalid target"
            );
        }
    }

    #[test]
    fn test_into_file_requires_upload() {
        let upload = Upload::default();
        assert!(matches!(
            upload.into_file(),
            Err(ServerError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_into_files_keeps_order() {
        let upload = Upload {
            files: vec![vec![1], vec![2], vec![3]],
            fields: HashMap::new(),
        };
        assert_eq!(upload.into_files().unwrap(), vec![vec![1], vec![2], vec![3]]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_positive_numbers_round_trip(kb in 0.001f64..1.0e6) {
            let parsed = parse_target_kb(Some(&kb.to_string())).unwrap();
            prop_assert_eq!(parsed, kb);
        }

        #[test]
        fn prop_never_panics(raw in "\\PC{0,16}") {
            let _ = parse_target_kb(Some(&raw));
        }
    }
}
