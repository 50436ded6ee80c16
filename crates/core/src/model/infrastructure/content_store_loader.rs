use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::Engine;
use serde::Deserialize;

use crate::model::domain::model_loader::{ModelDescriptor, ModelError, ModelLoader};
use crate::shared::constants::kernel_size_for;

/// On-the-wire model artifact: a JSON document with the weight tensor
/// base64-encoded as little-endian f32 values.
#[derive(Deserialize)]
struct ModelArtifact {
    name: String,
    architecture: String,
    #[serde(rename = "inputScale")]
    input_scale: u32,
    #[serde(rename = "outputScale")]
    output_scale: u32,
    #[serde(rename = "weightData")]
    weight_data: String,
}

/// Loads model artifacts by key, checking local locations before the store.
///
/// Resolution order:
/// 1. Caller-supplied local directory (development / pre-packaged installs)
/// 2. Per-user cache directory
/// 3. HTTP download from the content store, written to the cache
///
/// The cache is an optimization only: a failed cache write is logged and
/// the downloaded document is used directly.
pub struct ContentStoreLoader {
    base_url: String,
    local_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
}

impl ContentStoreLoader {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            local_dir: None,
            cache_dir: None,
        }
    }

    /// Directory checked before cache and store.
    pub fn with_local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_dir = Some(dir.into());
        self
    }

    /// Override the cache directory (used by tests).
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    fn document_name(key: &str) -> String {
        format!("{key}.json")
    }

    fn cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join("clearscale").join("models")))
    }

    fn fetch_document(&self, key: &str) -> Result<String, ModelError> {
        let name = Self::document_name(key);

        if let Some(dir) = &self.local_dir {
            let path = dir.join(&name);
            if path.exists() {
                return fs::read_to_string(&path).map_err(|e| ModelError::Fetch {
                    key: key.to_string(),
                    reason: format!("failed to read {}: {e}", path.display()),
                });
            }
        }

        let cache_dir = self.cache_dir();
        if let Some(dir) = &cache_dir {
            let cached = dir.join(&name);
            if cached.exists() {
                if let Ok(text) = fs::read_to_string(&cached) {
                    return Ok(text);
                }
            }
        }

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), name);
        let text = download(key, &url)?;

        if let Some(dir) = &cache_dir {
            if let Err(e) = write_cache(dir, &name, &text) {
                log::warn!("model cache write failed for {key}: {e}");
            }
        }

        Ok(text)
    }
}

impl ModelLoader for ContentStoreLoader {
    fn load(&self, model_key: &str) -> Result<ModelDescriptor, ModelError> {
        let document = self.fetch_document(model_key)?;
        parse_descriptor(model_key, &document)
    }
}

fn download(key: &str, url: &str) -> Result<String, ModelError> {
    let response = reqwest::blocking::get(url).map_err(|e| ModelError::Fetch {
        key: key.to_string(),
        reason: format!("request to {url} failed: {e}"),
    })?;

    if !response.status().is_success() {
        return Err(ModelError::Fetch {
            key: key.to_string(),
            reason: format!("{url} returned status {}", response.status()),
        });
    }

    response.text().map_err(|e| ModelError::Fetch {
        key: key.to_string(),
        reason: format!("failed to read body from {url}: {e}"),
    })
}

/// Write to a temp file first, then rename for atomicity.
fn write_cache(dir: &Path, name: &str, text: &str) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let dest = dir.join(name);
    let temp = dest.with_extension("part");
    let mut file = fs::File::create(&temp)?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    drop(file);
    fs::rename(&temp, &dest)
}

/// Parse and validate an artifact document into a descriptor.
fn parse_descriptor(key: &str, document: &str) -> Result<ModelDescriptor, ModelError> {
    let format_err = |reason: String| ModelError::Format {
        key: key.to_string(),
        reason,
    };

    let artifact: ModelArtifact = serde_json::from_str(document)
        .map_err(|e| format_err(format!("not a valid model document: {e}")))?;

    let kernel_size = kernel_size_for(&artifact.architecture).ok_or_else(|| {
        format_err(format!(
            "unrecognized architecture tag '{}'",
            artifact.architecture
        ))
    })?;

    if artifact.input_scale == 0 {
        return Err(format_err("inputScale must be >= 1".to_string()));
    }
    if artifact.output_scale < artifact.input_scale
        || artifact.output_scale % artifact.input_scale != 0
    {
        return Err(format_err(format!(
            "outputScale {} is not an integer multiple of inputScale {}",
            artifact.output_scale, artifact.input_scale
        )));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(artifact.weight_data.as_bytes())
        .map_err(|e| format_err(format!("weightData is not valid base64: {e}")))?;

    if bytes.is_empty() {
        return Err(format_err("weightData is empty".to_string()));
    }
    if bytes.len() % 4 != 0 {
        return Err(format_err(format!(
            "weightData length {} is not a whole number of f32 values",
            bytes.len()
        )));
    }

    let weights: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    let factor = artifact.output_scale / artifact.input_scale;
    let expected = (factor * factor * kernel_size * kernel_size) as usize;
    if weights.len() != expected {
        return Err(format_err(format!(
            "expected {expected} weights for '{}' at x{factor}, got {}",
            artifact.architecture,
            weights.len()
        )));
    }

    Ok(ModelDescriptor {
        name: artifact.name,
        architecture_tag: artifact.architecture,
        weights,
        input_scale: artifact.input_scale,
        output_scale: artifact.output_scale,
        kernel_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn encode_weights(weights: &[f32]) -> String {
        let bytes: Vec<u8> = weights.iter().flat_map(|w| w.to_le_bytes()).collect();
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    /// A well-formed fsrcnn-lite x2 artifact: 2^2 * 3 * 3 = 36 weights.
    fn valid_document() -> String {
        let weights = vec![0.25f32; 36];
        format!(
            r#"{{"name":"fsrcnn-lite-x2","architecture":"fsrcnn-lite","inputScale":1,"outputScale":2,"weightData":"{}"}}"#,
            encode_weights(&weights)
        )
    }

    #[test]
    fn test_parse_valid_document() {
        let m = parse_descriptor("fsrcnn-lite-x2", &valid_document()).unwrap();
        assert_eq!(m.name, "fsrcnn-lite-x2");
        assert_eq!(m.architecture_tag, "fsrcnn-lite");
        assert_eq!(m.scale_factor(), 2);
        assert_eq!(m.kernel_size, 3);
        assert_eq!(m.weights.len(), 36);
        assert!((m.weights[0] - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_parse_rejects_unknown_architecture() {
        let doc = valid_document().replace("fsrcnn-lite", "mystery-net");
        let err = parse_descriptor("k", &doc).unwrap_err();
        assert!(matches!(err, ModelError::Format { .. }));
        assert!(err.to_string().contains("mystery-net"));
    }

    #[test]
    fn test_parse_rejects_empty_weights() {
        let doc = r#"{"name":"m","architecture":"fsrcnn-lite","inputScale":1,"outputScale":2,"weightData":""}"#;
        let err = parse_descriptor("k", doc).unwrap_err();
        assert!(matches!(err, ModelError::Format { .. }));
    }

    #[test]
    fn test_parse_rejects_wrong_weight_count() {
        let doc = format!(
            r#"{{"name":"m","architecture":"fsrcnn-lite","inputScale":1,"outputScale":2,"weightData":"{}"}}"#,
            encode_weights(&[0.5f32; 10])
        );
        let err = parse_descriptor("k", &doc).unwrap_err();
        assert!(err.to_string().contains("expected 36 weights"));
    }

    #[test]
    fn test_parse_rejects_bad_base64() {
        let doc = r#"{"name":"m","architecture":"fsrcnn-lite","inputScale":1,"outputScale":2,"weightData":"!!not-base64!!"}"#;
        assert!(matches!(
            parse_descriptor("k", doc),
            Err(ModelError::Format { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_non_integer_scale() {
        // outputScale 3 over inputScale 2 is not an integer factor
        let doc = format!(
            r#"{{"name":"m","architecture":"fsrcnn-lite","inputScale":2,"outputScale":3,"weightData":"{}"}}"#,
            encode_weights(&[0.5f32; 9])
        );
        let err = parse_descriptor("k", &doc).unwrap_err();
        assert!(err.to_string().contains("integer multiple"));
    }

    #[test]
    fn test_parse_rejects_garbage_json() {
        assert!(matches!(
            parse_descriptor("k", "not json"),
            Err(ModelError::Format { .. })
        ));
    }

    #[test]
    fn test_load_from_local_dir() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("fsrcnn-lite-x2.json"), valid_document()).unwrap();

        let loader = ContentStoreLoader::new("http://invalid.nonexistent.example.com")
            .with_local_dir(tmp.path())
            .with_cache_dir(tmp.path().join("cache"));
        let m = loader.load("fsrcnn-lite-x2").unwrap();
        assert_eq!(m.scale_factor(), 2);
    }

    #[test]
    fn test_load_missing_key_from_empty_store_is_fetch_error() {
        let tmp = TempDir::new().unwrap();
        let loader = ContentStoreLoader::new("http://invalid.nonexistent.example.com")
            .with_local_dir(tmp.path())
            .with_cache_dir(tmp.path().join("cache"));
        let err = loader.load("missing-model").unwrap_err();
        assert!(matches!(err, ModelError::Fetch { .. }));
    }

    #[test]
    fn test_load_prefers_cache_over_store() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        fs::create_dir_all(&cache).unwrap();
        fs::write(cache.join("fsrcnn-lite-x2.json"), valid_document()).unwrap();

        let loader = ContentStoreLoader::new("http://invalid.nonexistent.example.com")
            .with_cache_dir(&cache);
        assert!(loader.load("fsrcnn-lite-x2").is_ok());
    }

    #[test]
    fn test_write_cache_is_atomic() {
        let tmp = TempDir::new().unwrap();
        write_cache(tmp.path(), "m.json", "{}").unwrap();
        assert!(tmp.path().join("m.json").exists());
        assert!(!tmp.path().join("m.part").exists());
    }
}
