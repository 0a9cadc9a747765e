//! Content hashing for deterministic rendering verification.
//!
//! Frames are hashed with SHA-256 so preview and export can detect
//! changed output cheaply, and tests can assert bit-exact frames.
//! Generated shader source is fingerprinted the same way so front-ends
//! can key compiled programs by content.

use sha2::{Digest, Sha256};

use crate::frame::FrameBuffer;

/// A content hash digest (SHA-256, 32 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash {
    bytes: [u8; 32],
}

impl ContentHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the hash as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn finish(hasher: Sha256) -> ContentHash {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    ContentHash::from_bytes(bytes)
}

/// Compute the content hash of a single frame buffer.
pub fn hash_frame(frame: &FrameBuffer) -> ContentHash {
    let mut hasher = Sha256::new();
    // Dimensions are part of the digest so equal bytes at different sizes differ.
    hasher.update(frame.width.to_le_bytes());
    hasher.update(frame.height.to_le_bytes());
    hasher.update([frame.format as u8]);
    hasher.update(&frame.data);
    finish(hasher)
}

/// Fingerprint a vertex/fragment shader pair.
pub fn hash_shader(vertex: &str, fragment: &str) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update((vertex.len() as u64).to_le_bytes());
    hasher.update(vertex.as_bytes());
    hasher.update(fragment.as_bytes());
    finish(hasher)
}
