use crate::Name;
use bytes::Bytes;

/// Byte length of the placeholder digest attached to republished objects.
pub const PLACEHOLDER_DIGEST_SIZE: usize = 32;

/// An all-zero digest standing in for a real signature. Objects
/// republished under a rename prefix carry this instead of being
/// re-signed.
pub fn placeholder_signature() -> Bytes {
    Bytes::from_static(&[0u8; PLACEHOLDER_DIGEST_SIZE])
}

/// A named immutable payload. Never mutated or deleted once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentObject {
    pub name: Name,
    pub payload: Bytes,
    pub content_type: String,
    pub signature: Option<Bytes>,
}

impl ContentObject {
    pub fn new(name: Name, payload: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            name,
            payload: payload.into(),
            content_type: content_type.into(),
            signature: None,
        }
    }

    pub fn with_signature(mut self, signature: Bytes) -> Self {
        self.signature = Some(signature);
        self
    }
}
