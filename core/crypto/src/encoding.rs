//! Base64 transport encoding for ciphertext, IVs, salts, and exported keys.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use zerokey_common::{Error, Result};

/// Encode bytes as standard padded base64.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard padded base64.
///
/// # Errors
/// - `InvalidInput` if the text is not valid base64
pub fn decode(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|_| Error::InvalidInput("Malformed base64".to_string()))
}

/// Decode base64 into a fixed-size array.
///
/// # Errors
/// - `InvalidInput` if the text is malformed or has the wrong decoded length
pub fn decode_array<const N: usize>(text: &str) -> Result<[u8; N]> {
    let bytes = decode(text)?;
    bytes.as_slice().try_into().map_err(|_| {
        Error::InvalidInput(format!(
            "Expected {} decoded bytes, got {}",
            N,
            bytes.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let text = encode(b"zerokey");
        assert_eq!(text, "emVyb2tleQ==");
        assert_eq!(decode(&text).unwrap(), b"zerokey");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode("not base64!"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_decode_array_length_checked() {
        let text = encode(&[7u8; 12]);
        let arr: [u8; 12] = decode_array(&text).unwrap();
        assert_eq!(arr, [7u8; 12]);
        assert!(decode_array::<16>(&text).is_err());
    }
}
