//! Cache key derivation for generated documents.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::pipeline::{GenerationOptions, Template};

/// Prefix shared by every artifact key.
pub const ARTIFACT_KEY_PREFIX: &str = "artifact:";

/// Hex characters of the digest kept in the key.
const DIGEST_HEX_LEN: usize = 32;

/// Deterministic key for `(template id, template version, input, options)`.
///
/// Shaped `artifact:{template_id}:{digest}` so every document of a template
/// can be invalidated with one prefix. JSON maps serialize with sorted keys,
/// so field order in the input never changes the key.
pub fn cache_key(template: &Template, input: &Value, options: &GenerationOptions) -> String {
    let mut hasher = Sha256::new();
    hasher.update(template.id.as_bytes());
    hasher.update([0u8]);
    hasher.update(template.version.to_le_bytes());
    hasher.update([0u8]);
    hasher.update(input.to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(serde_json::to_vec(options).unwrap_or_default());

    let digest = hex::encode(hasher.finalize());
    format!(
        "{}{}",
        template_key_prefix(&template.id),
        &digest[..DIGEST_HEX_LEN]
    )
}

/// Prefix covering every artifact of one template.
pub fn template_key_prefix(template_id: &str) -> String {
    format!("{ARTIFACT_KEY_PREFIX}{template_id}:")
}
