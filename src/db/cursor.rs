use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{de::DeserializeOwned, Serialize};

use super::StoreError;
use crate::models::Cursor;

/// Wraps a store-specific resume key into an opaque, URL-safe cursor
pub fn encode<K: Serialize>(key: &K) -> Result<Cursor, StoreError> {
    let json = serde_json::to_vec(key)
        .map_err(|e| StoreError::Transport(format!("Cursor serialization error: {}", e)))?;
    Ok(Cursor::new(URL_SAFE_NO_PAD.encode(json)))
}

/// Reverses [`encode`]. Anything the store did not mint is a validation failure.
pub fn decode<K: DeserializeOwned>(cursor: &Cursor) -> Result<K, StoreError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor.as_str())
        .map_err(|_| StoreError::Validation("Malformed cursor".to_string()))?;
    serde_json::from_slice(&bytes).map_err(|_| StoreError::Validation("Malformed cursor".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct IdKey {
        id: String,
    }

    #[test]
    fn test_cursor_is_url_safe() {
        let cursor = encode(&IdKey {
            id: "a/b+c?d".to_string(),
        })
        .unwrap();
        assert!(cursor
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_decode_garbage_is_validation_error() {
        let err = decode::<IdKey>(&Cursor::new("not a cursor!")).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_decode_wrong_shape_is_validation_error() {
        let cursor = encode(&serde_json::json!({ "offset": 3 })).unwrap();
        let err = decode::<IdKey>(&cursor).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }
}
