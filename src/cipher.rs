//! Cipher seams for the handshake payload and the manifest payloads
//!
//! The game encrypts both the asset-hash handshake and every manifest payload.
//! The primitives themselves are supplied by the embedding application; this
//! crate only depends on the two traits below. [`PlaintextCipher`] passes data
//! through untouched, which is what test servers and mirrors serving decrypted
//! payloads need.

/// Encrypts handshake request bodies and decrypts handshake responses
pub trait PayloadCipher: Send + Sync {
    /// Encrypt a JSON request body into its wire form
    fn encrypt(&self, plaintext: &str) -> crate::Result<String>;

    /// Decrypt a response body into JSON
    fn decrypt(&self, ciphertext: &str) -> crate::Result<String>;
}

/// Decrypts a manifest payload extracted from the manifest container
pub trait ManifestCipher: Send + Sync {
    /// Decrypt one payload
    fn decrypt(&self, payload: &[u8]) -> crate::Result<Vec<u8>>;
}

/// Identity cipher for unencrypted endpoints and payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextCipher;

impl PayloadCipher for PlaintextCipher {
    fn encrypt(&self, plaintext: &str) -> crate::Result<String> {
        Ok(plaintext.to_string())
    }

    fn decrypt(&self, ciphertext: &str) -> crate::Result<String> {
        Ok(ciphertext.to_string())
    }
}

impl ManifestCipher for PlaintextCipher {
    fn decrypt(&self, payload: &[u8]) -> crate::Result<Vec<u8>> {
        Ok(payload.to_vec())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext_cipher_is_identity() {
        let cipher = PlaintextCipher;
        let body = r#"{"asset_version":"0"}"#;
        assert_eq!(PayloadCipher::encrypt(&cipher, body).unwrap(), body);
        assert_eq!(PayloadCipher::decrypt(&cipher, body).unwrap(), body);
        assert_eq!(
            ManifestCipher::decrypt(&cipher, &[1, 2, 3]).unwrap(),
            vec![1, 2, 3]
        );
    }
}
