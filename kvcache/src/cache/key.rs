//! Key normalization
//!
//! Every caller-supplied key is rewritten before it reaches the store.
//! Characters that are awkward in store keys (path separators, whitespace,
//! control characters) are percent-escaped, and so is `%` itself. Escaping
//! the escape character keeps the mapping injective: two different keys can
//! never produce the same store key.

use std::borrow::Cow;
use std::fmt::Write;

use super::error::CacheError;

const ESCAPE: char = '%';

fn needs_escape(c: char) -> bool {
    c == ESCAPE || c == '/' || c == '\\' || c.is_whitespace() || c.is_control()
}

/// Sanitize a key for the store
///
/// Returns the key unchanged (borrowed) when nothing needs escaping.
pub fn sanitize_key(key: &str) -> Result<Cow<'_, str>, CacheError> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key must not be empty".to_string()));
    }

    if !key.chars().any(needs_escape) {
        return Ok(Cow::Borrowed(key));
    }

    let mut out = String::with_capacity(key.len() + 8);
    let mut buf = [0u8; 4];
    for c in key.chars() {
        if needs_escape(c) {
            for byte in c.encode_utf8(&mut buf).bytes() {
                // Writing to a String cannot fail
                let _ = write!(out, "{ESCAPE}{byte:02X}");
            }
        } else {
            out.push(c);
        }
    }
    Ok(Cow::Owned(out))
}
