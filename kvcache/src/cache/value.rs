//! Value encoding at the adapter boundary
//!
//! The store only sees bytes. Callers pick the representation by choosing
//! the value type they read and write through [`CacheService`](super::CacheService).

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::CacheError;

/// A value that can be stored in the cache
pub trait CacheValue: Sized {
    fn encode(&self) -> Result<Vec<u8>, CacheError>;

    fn decode(bytes: Vec<u8>) -> Result<Self, CacheError>;
}

impl CacheValue for Vec<u8> {
    fn encode(&self) -> Result<Vec<u8>, CacheError> {
        Ok(self.clone())
    }

    fn decode(bytes: Vec<u8>) -> Result<Self, CacheError> {
        Ok(bytes)
    }
}

impl CacheValue for String {
    fn encode(&self) -> Result<Vec<u8>, CacheError> {
        Ok(self.as_bytes().to_vec())
    }

    fn decode(bytes: Vec<u8>) -> Result<Self, CacheError> {
        String::from_utf8(bytes).map_err(|e| CacheError::Serialization(e.to_string()))
    }
}

/// Integers are stored as decimal text, the same form the store uses for
/// counters, so a value written by `increment` can be read back as `i64`.
impl CacheValue for i64 {
    fn encode(&self) -> Result<Vec<u8>, CacheError> {
        Ok(self.to_string().into_bytes())
    }

    fn decode(bytes: Vec<u8>) -> Result<Self, CacheError> {
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        text.trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| CacheError::Serialization(e.to_string()))
    }
}

/// Structured values serialized with MessagePack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgPack<T>(pub T);

impl<T> MsgPack<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Serialize + DeserializeOwned> CacheValue for MsgPack<T> {
    fn encode(&self) -> Result<Vec<u8>, CacheError> {
        rmp_serde::to_vec(&self.0).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn decode(bytes: Vec<u8>) -> Result<Self, CacheError> {
        rmp_serde::from_slice(&bytes)
            .map(MsgPack)
            .map_err(|e| CacheError::Serialization(e.to_string()))
    }
}
