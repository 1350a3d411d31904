//! Encrypted session envelopes.
//!
//! A session is serialized to JSON and sealed with AES-256-GCM under the
//! server's session key. The envelope is `base64(nonce || ciphertext)` with a
//! fresh 12-byte nonce per seal. The same envelope is stored in the
//! `sessions` collection and in the `shopify_session_data` cookie.
//!
//! Session ids are sealed the same way for the `shopify_app_session`
//! cookie, so a client cannot name a session it was not given.

use crate::auth::Session;
use crate::config::EncryptionKey;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::Rng;
use thiserror::Error;

const NONCE_SIZE: usize = 12;
const SESSION_ID_PREFIX: &[u8] = b"sid:";

/// Errors from sealing or opening an envelope.
///
/// Callers resolving a session treat every variant as "no session".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Serialization or encryption failed.
    #[error("Failed to seal session envelope")]
    Seal,

    /// The envelope is not valid base64 or is too short.
    #[error("Malformed session envelope")]
    Malformed,

    /// Authentication tag check failed (wrong key or tampered data).
    #[error("Session envelope failed to decrypt")]
    Decrypt,

    /// The plaintext is not a valid session.
    #[error("Session envelope does not contain a valid session: {0}")]
    Payload(String),
}

/// Seals and opens session envelopes with one key.
#[derive(Clone)]
pub struct SessionCipher {
    cipher: Aes256Gcm,
}

impl SessionCipher {
    /// Creates a cipher for `key`.
    #[must_use]
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
        }
    }

    /// Encrypts a session into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Seal`] if serialization or encryption fails.
    pub fn seal(&self, session: &Session) -> Result<String, EnvelopeError> {
        let plaintext = serde_json::to_vec(session).map_err(|_| EnvelopeError::Seal)?;
        self.seal_bytes(&plaintext)
    }

    /// Decrypts an envelope back into a session.
    ///
    /// # Errors
    ///
    /// Returns an [`EnvelopeError`] describing why the envelope was rejected.
    pub fn open(&self, envelope: &str) -> Result<Session, EnvelopeError> {
        let plaintext = self.open_bytes(envelope)?;
        serde_json::from_slice(&plaintext).map_err(|e| EnvelopeError::Payload(e.to_string()))
    }

    /// Seals a session id for the `shopify_app_session` cookie.
    ///
    /// The id is bound to a fixed prefix so a sealed id and a sealed session
    /// cannot stand in for each other.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Seal`] if encryption fails.
    pub fn seal_id(&self, session_id: &str) -> Result<String, EnvelopeError> {
        let mut plaintext = SESSION_ID_PREFIX.to_vec();
        plaintext.extend_from_slice(session_id.as_bytes());
        self.seal_bytes(&plaintext)
    }

    /// Opens a sealed session id.
    ///
    /// # Errors
    ///
    /// Returns an [`EnvelopeError`] if the value was not produced by
    /// [`SessionCipher::seal_id`] under this key.
    pub fn open_id(&self, sealed: &str) -> Result<String, EnvelopeError> {
        let plaintext = self.open_bytes(sealed)?;
        let id = plaintext
            .strip_prefix(SESSION_ID_PREFIX)
            .ok_or_else(|| EnvelopeError::Payload("not a sealed session id".to_string()))?;
        String::from_utf8(id.to_vec())
            .ok()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| EnvelopeError::Payload("empty or non-UTF-8 session id".to_string()))
    }

    fn seal_bytes(&self, plaintext: &[u8]) -> Result<String, EnvelopeError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| EnvelopeError::Seal)?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(ciphertext);
        Ok(BASE64.encode(combined))
    }

    fn open_bytes(&self, envelope: &str) -> Result<Vec<u8>, EnvelopeError> {
        let combined = BASE64
            .decode(envelope.trim())
            .map_err(|_| EnvelopeError::Malformed)?;
        if combined.len() <= NONCE_SIZE {
            return Err(EnvelopeError::Malformed);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| EnvelopeError::Decrypt)
    }
}

impl std::fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionCipher(*****)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShopDomain;

    fn cipher(byte: &str) -> SessionCipher {
        SessionCipher::new(&EncryptionKey::from_hex(&byte.repeat(32)).unwrap())
    }

    fn session() -> Session {
        Session::offline(
            ShopDomain::new("test-shop").unwrap(),
            "shpat_abc".to_string(),
            "read_orders".to_string(),
        )
    }

    #[test]
    fn test_seal_then_open_returns_same_session() {
        let cipher = cipher("11");
        let envelope = cipher.seal(&session()).unwrap();
        assert_eq!(cipher.open(&envelope).unwrap(), session());
    }

    #[test]
    fn test_envelope_does_not_leak_plaintext() {
        let envelope = cipher("11").seal(&session()).unwrap();
        assert!(!envelope.contains("shpat_abc"));
        let raw = BASE64.decode(&envelope).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("shpat_abc"));
    }

    #[test]
    fn test_nonce_is_fresh_per_seal() {
        let cipher = cipher("11");
        assert_ne!(cipher.seal(&session()).unwrap(), cipher.seal(&session()).unwrap());
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let envelope = cipher("11").seal(&session()).unwrap();
        assert_eq!(cipher("22").open(&envelope), Err(EnvelopeError::Decrypt));
    }

    #[test]
    fn test_open_tampered_envelope_fails() {
        let cipher = cipher("11");
        let mut raw = BASE64.decode(cipher.seal(&session()).unwrap()).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert_eq!(cipher.open(&BASE64.encode(raw)), Err(EnvelopeError::Decrypt));
    }

    #[test]
    fn test_open_garbage_is_malformed() {
        let cipher = cipher("11");
        assert_eq!(cipher.open("%%%"), Err(EnvelopeError::Malformed));
        assert_eq!(cipher.open(""), Err(EnvelopeError::Malformed));
        assert_eq!(
            cipher.open(&BASE64.encode([0u8; NONCE_SIZE])),
            Err(EnvelopeError::Malformed)
        );
    }

    #[test]
    fn test_open_non_session_payload_fails() {
        let cipher = cipher("11");
        let nonce = [7u8; NONCE_SIZE];
        let ciphertext = cipher
            .cipher
            .encrypt(Nonce::from_slice(&nonce), b"{\"not\":\"a session\"}".as_slice())
            .unwrap();
        let mut combined = nonce.to_vec();
        combined.extend(ciphertext);

        assert!(matches!(
            cipher.open(&BASE64.encode(combined)),
            Err(EnvelopeError::Payload(_))
        ));
    }

    #[test]
    fn test_sealed_id_opens_to_same_id() {
        let cipher = cipher("11");
        let sealed = cipher.seal_id("offline_test-shop.myshopify.com").unwrap();
        assert!(!sealed.contains("test-shop"));
        assert_eq!(
            cipher.open_id(&sealed).unwrap(),
            "offline_test-shop.myshopify.com"
        );
    }

    #[test]
    fn test_plain_or_foreign_id_is_rejected() {
        let foreign = cipher("22").seal_id("offline_test-shop.myshopify.com").unwrap();
        let cipher = cipher("11");
        assert_eq!(
            cipher.open_id("test-shop.myshopify.com"),
            Err(EnvelopeError::Malformed)
        );
        assert_eq!(cipher.open_id(&foreign), Err(EnvelopeError::Decrypt));
    }

    #[test]
    fn test_session_envelope_is_not_a_sealed_id() {
        let cipher = cipher("11");
        let envelope = cipher.seal(&session()).unwrap();
        assert!(matches!(
            cipher.open_id(&envelope),
            Err(EnvelopeError::Payload(_))
        ));

        let sealed = cipher.seal_id("offline_test-shop.myshopify.com").unwrap();
        assert!(matches!(cipher.open(&sealed), Err(EnvelopeError::Payload(_))));
    }
}
