use sha2::{Digest, Sha256};

/// Stable entity id: `ent_` + first 16 hex chars of
/// sha256(provider \0 dataset \0 key).
///
/// The same (provider, dataset, key) always yields the same id across runs,
/// which is what lets the decision-maker cache and parity diffs line up.
pub fn entity_id(provider: &str, dataset: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provider.trim().to_lowercase().as_bytes());
    hasher.update([0u8]);
    hasher.update(dataset.trim().to_lowercase().as_bytes());
    hasher.update([0u8]);
    hasher.update(key.trim().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("ent_{}", &digest[..16])
}
