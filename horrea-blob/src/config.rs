use std::path::PathBuf;

use serde::Deserialize;

use crate::{BlobError, BlobResult};

/// Environment variable prefix read by [`BlobConfig::from_env`]
pub const ENV_PREFIX: &str = "HORREA_";

/// Which storage implementation backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    #[default]
    Local,
    ObjectStore,
}

impl BackendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendMode::Local => "local",
            BackendMode::ObjectStore => "object_store",
        }
    }
}

impl std::str::FromStr for BackendMode {
    type Err = BlobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(BackendMode::Local),
            "object_store" | "s3" => Ok(BackendMode::ObjectStore),
            other => Err(BlobError::configuration(format!("unknown backend mode {other:?}"))),
        }
    }
}

/// Object storage parameters, reserved for a future backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ObjectStoreParams {
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
}

/// Configuration for blob transfers
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Storage implementation to construct at startup
    pub backend: BackendMode,

    /// Directory holding one file per identity in local mode
    pub local_directory: PathBuf,

    /// Size of each chunk emitted on fetch
    pub chunk_size_bytes: usize,

    /// Largest declared size accepted for a single blob
    pub max_blob_bytes: u64,

    /// Bytes that may be buffered across all concurrent transfers
    pub max_inflight_bytes: u64,

    pub object_store: ObjectStoreParams,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            backend: BackendMode::Local,
            local_directory: std::env::temp_dir().join("horrea"),
            chunk_size_bytes: 64 * 1024,            // 64KiB
            max_blob_bytes: 256 * 1024 * 1024,      // 256MiB
            max_inflight_bytes: 1024 * 1024 * 1024, // 1GiB
            object_store: ObjectStoreParams::default(),
        }
    }
}

impl BlobConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from `HORREA_*` process environment variables.
    pub fn from_env() -> BlobResult<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Load overrides from key/value pairs, ignoring keys without the prefix.
    pub fn from_vars<I, K, V>(vars: I) -> BlobResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::default();
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value: String = value.into();
            match name {
                "BACKEND" => config.backend = value.parse()?,
                "LOCAL_DIRECTORY" => config.local_directory = PathBuf::from(value),
                "CHUNK_SIZE_KIB" => {
                    config.chunk_size_bytes = parse_number::<usize>(name, &value)?
                        .checked_mul(1024)
                        .ok_or_else(|| {
                            BlobError::configuration(format!("{ENV_PREFIX}{name} is too large, got {value:?}"))
                        })?;
                }
                "MAX_BLOB_BYTES" => config.max_blob_bytes = parse_number(name, &value)?,
                "MAX_INFLIGHT_BYTES" => config.max_inflight_bytes = parse_number(name, &value)?,
                "OBJECT_ENDPOINT" => config.object_store.endpoint = Some(value),
                "OBJECT_BUCKET" => config.object_store.bucket = Some(value),
                "OBJECT_REGION" => config.object_store.region = Some(value),
                _ => {}
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Check the limits are usable together.
    pub fn validate(&self) -> BlobResult<()> {
        if self.chunk_size_bytes == 0 {
            return Err(BlobError::configuration("chunk size must be non-zero"));
        }
        if self.max_inflight_bytes == 0 {
            return Err(BlobError::configuration("in-flight budget must be non-zero"));
        }
        if self.max_blob_bytes > self.max_inflight_bytes {
            return Err(BlobError::configuration(format!(
                "max blob size {} exceeds in-flight budget {}",
                self.max_blob_bytes, self.max_inflight_bytes
            )));
        }
        Ok(())
    }

    pub fn with_backend(mut self, backend: BackendMode) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_local_directory<P: Into<PathBuf>>(mut self, directory: P) -> Self {
        self.local_directory = directory.into();
        self
    }

    /// Set the emitted chunk size
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size_bytes = bytes;
        self
    }

    /// Set max blob size
    pub fn with_max_blob_bytes(mut self, bytes: u64) -> Self {
        self.max_blob_bytes = bytes;
        self
    }

    pub fn with_max_inflight_bytes(mut self, bytes: u64) -> Self {
        self.max_inflight_bytes = bytes;
        self
    }

    pub fn with_object_store(mut self, params: ObjectStoreParams) -> Self {
        self.object_store = params;
        self
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> BlobResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BlobError::configuration(format!("{ENV_PREFIX}{name} must be a number, got {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BlobConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.backend, BackendMode::Local);
        assert_eq!(config.chunk_size_bytes, 64 * 1024);
    }

    #[test]
    fn test_from_vars_applies_prefixed_overrides() {
        let config = BlobConfig::from_vars([
            ("HORREA_BACKEND", "object_store"),
            ("HORREA_LOCAL_DIRECTORY", "/srv/horrea"),
            ("HORREA_CHUNK_SIZE_KIB", "128"),
            ("HORREA_MAX_BLOB_BYTES", "1000"),
            ("HORREA_MAX_INFLIGHT_BYTES", "4000"),
            ("HORREA_OBJECT_BUCKET", "blobs"),
            ("PATH", "/usr/bin"),
        ])
        .unwrap();

        assert_eq!(config.backend, BackendMode::ObjectStore);
        assert_eq!(config.local_directory, PathBuf::from("/srv/horrea"));
        assert_eq!(config.chunk_size_bytes, 128 * 1024);
        assert_eq!(config.max_blob_bytes, 1000);
        assert_eq!(config.max_inflight_bytes, 4000);
        assert_eq!(config.object_store.bucket.as_deref(), Some("blobs"));
        assert_eq!(config.object_store.endpoint, None);
    }

    #[test]
    fn test_from_vars_rejects_bad_values() {
        let bad_number = BlobConfig::from_vars([("HORREA_CHUNK_SIZE_KIB", "lots")]);
        assert!(matches!(bad_number, Err(BlobError::Configuration { .. })));

        let bad_mode = BlobConfig::from_vars([("HORREA_BACKEND", "tape")]);
        assert!(matches!(bad_mode, Err(BlobError::Configuration { .. })));

        let zero_chunk = BlobConfig::from_vars([("HORREA_CHUNK_SIZE_KIB", "0")]);
        assert!(matches!(zero_chunk, Err(BlobError::Configuration { .. })));

        let overflow = usize::MAX.to_string();
        let huge_chunk = BlobConfig::from_vars([("HORREA_CHUNK_SIZE_KIB", overflow)]);
        assert!(matches!(huge_chunk, Err(BlobError::Configuration { .. })));
    }

    #[test]
    fn test_blob_cap_must_fit_budget() {
        let config = BlobConfig::new()
            .with_max_blob_bytes(2048)
            .with_max_inflight_bytes(1024);
        assert!(matches!(config.validate(), Err(BlobError::Configuration { .. })));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: BlobConfig = serde_json::from_str(
            r#"{"backend": "local", "local_directory": "/data/blobs", "chunk_size_bytes": 4096}"#,
        )
        .unwrap();

        assert_eq!(config.local_directory, PathBuf::from("/data/blobs"));
        assert_eq!(config.chunk_size_bytes, 4096);
        assert_eq!(config.max_blob_bytes, BlobConfig::default().max_blob_bytes);
    }
}
