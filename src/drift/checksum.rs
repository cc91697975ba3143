use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest, and of the ledger's checksum column.
pub const CHECKSUM_LEN: usize = 64;

/// SHA-256 of `content` as lowercase hex. Digest equality is the only signal
/// that a migration is unchanged.
pub fn digest(content: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_ref());
    let result = hasher.finalize();
    format!("{:x}", result)
}
