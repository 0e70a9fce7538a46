//! Schema fingerprinting.

use sha2::{Digest, Sha256};

use gridcast_core::SchemaVersion;

use crate::config::FeatureConfig;
use crate::error::{FeatureError, FeatureResult};

const PREFIX: &str = "fs-";
const HEX_CHARS: usize = 16;

/// Fingerprint of a feature definition set: `fs-` + 16 hex chars of the
/// SHA-256 of its normalized JSON encoding.
pub fn schema_version_of(config: &FeatureConfig) -> FeatureResult<SchemaVersion> {
    let canonical = serde_json::to_vec(&config.normalized())
        .map_err(|e| FeatureError::validation(format!("feature config not encodable: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    let digest = format!("{:x}", hasher.finalize());

    Ok(SchemaVersion::new(format!("{PREFIX}{}", &digest[..HEX_CHARS])))
}
