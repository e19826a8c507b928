use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of a byte buffer as lowercase hex
pub fn compute_sha256(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    let hash_str = format!("{:x}", hash);
    tracing::debug!("Hash computed: {}", hash_str);
    hash_str
}
