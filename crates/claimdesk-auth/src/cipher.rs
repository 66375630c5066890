//! AES-256-GCM encryption of sensitive customer fields.
//!
//! Ciphertexts are stored as `base64(nonce || ciphertext || tag)` with a
//! fresh random 96-bit nonce per encryption, so equal plaintexts never
//! produce equal stored values and tampering is detected on decrypt.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::AuthError;

const NONCE_LEN: usize = 12;

/// Encrypts and decrypts string fields with one 256-bit key.
#[derive(Clone)]
pub struct FieldCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher").finish_non_exhaustive()
    }
}

impl FieldCipher {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Build from a base64-encoded 32-byte key (the configuration format).
    pub fn from_base64_key(encoded: &str) -> Result<Self, AuthError> {
        let key = decode_key(encoded)?;
        Ok(Self::new(&key))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, AuthError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| AuthError::Crypto(format!("AES-GCM encrypt: {e}")))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(combined))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, AuthError> {
        let combined = STANDARD
            .decode(encoded)
            .map_err(|e| AuthError::Crypto(format!("base64 decode: {e}")))?;

        if combined.len() <= NONCE_LEN {
            return Err(AuthError::Crypto("ciphertext too short".into()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| AuthError::Crypto(format!("AES-GCM decrypt: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| AuthError::Crypto(format!("decrypted field is not UTF-8: {e}")))
    }
}

/// Decode a base64 key and check it is exactly 256 bits.
pub fn decode_key(encoded: &str) -> Result<[u8; 32], AuthError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| AuthError::InvalidKey(format!("base64 decode: {e}")))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| AuthError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))
}

/// Generate a random key, base64-encoded, for first-time setup.
pub fn generate_key() -> String {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    STANDARD.encode(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multibyte_value_round_trips() {
        let cipher = FieldCipher::new(&[42u8; 32]);
        let ssn = "123-45-6789 Zoë Ñúñez 日本";
        let encrypted = cipher.encrypt(ssn).unwrap();
        assert!(!encrypted.contains("6789"));
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), ssn);
    }

    #[test]
    fn equal_plaintexts_encrypt_differently() {
        let cipher = FieldCipher::new(&[7u8; 32]);
        let a = cipher.encrypt("078-05-1120").unwrap();
        let b = cipher.encrypt("078-05-1120").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails_decrypt() {
        let encrypted = FieldCipher::new(&[42u8; 32]).encrypt("secret").unwrap();
        assert!(FieldCipher::new(&[99u8; 32]).decrypt(&encrypted).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_decrypt() {
        let cipher = FieldCipher::new(&[42u8; 32]);
        let mut raw = STANDARD.decode(cipher.encrypt("secret").unwrap()).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert!(cipher.decrypt(&STANDARD.encode(raw)).is_err());
    }

    #[test]
    fn generated_key_decodes() {
        let key = generate_key();
        assert!(FieldCipher::from_base64_key(&key).is_ok());
        assert!(decode_key("c2hvcnQ=").is_err());
    }
}
