//! Key derivation and authenticated envelopes.
//!
//! The pre-shared password never leaves the client process: it is stretched
//! into a 256-bit key with Argon2id and used only in memory. Every message
//! and reaction body is sealed as an XChaCha20-Poly1305 envelope whose
//! associated data binds the claimed sender and the payload kind, so a
//! ciphertext cut from one context cannot be pasted into another without
//! failing authentication.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::constants::{
    AAD_KIND_MESSAGE, AAD_KIND_REACTION, KDF_CONTEXT_REACTION_NONCE, KDF_CONTEXT_SALT,
    NONCE_SIZE, SYMMETRIC_KEY_SIZE, TAG_SIZE,
};
use crate::error::CryptoError;
use crate::types::MessageId;

pub type SymmetricKey = [u8; SYMMETRIC_KEY_SIZE];

/// Argon2id work factor.
///
/// The defaults follow the argon2 crate's recommended interactive profile;
/// tests use [`KdfParams::insecure_fast`] to keep suites quick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost_kib: u32,
    /// Number of passes.
    pub t_cost: u32,
    /// Degree of parallelism.
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost_kib: 19 * 1024,
            t_cost: 2,
            p_cost: 1,
        }
    }
}

impl KdfParams {
    /// Minimal work factor. Test-only: offers no brute-force resistance.
    pub fn insecure_fast() -> Self {
        Self {
            m_cost_kib: 8,
            t_cost: 1,
            p_cost: 1,
        }
    }
}

/// Derive the shared symmetric key from the pre-shared password and salt.
///
/// Deterministic for fixed inputs; a different password or salt yields a
/// different key. This is the sole authentication between the two
/// participants; the relay authenticates nothing.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<SymmetricKey, CryptoError> {
    let argon_params = argon2::Params::new(
        params.m_cost_kib,
        params.t_cost,
        params.p_cost,
        Some(SYMMETRIC_KEY_SIZE),
    )
    .map_err(|_| CryptoError::KeyDerivationFailed)?;

    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon_params,
    );

    // Argon2 requires salts of at least 8 bytes; participants exchange
    // short human-friendly salts, so normalize through BLAKE3 first.
    let salt = blake3::derive_key(KDF_CONTEXT_SALT, salt);

    let mut key = [0u8; SYMMETRIC_KEY_SIZE];
    argon2
        .hash_password_into(password, &salt, &mut key)
        .map_err(|_| CryptoError::KeyDerivationFailed)?;
    Ok(key)
}

/// One sealed payload: fresh nonce plus ciphertext (tag appended).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    #[serde(with = "crate::protocol::base64_bytes")]
    pub nonce: Vec<u8>,
    #[serde(with = "crate::protocol::base64_bytes")]
    pub ciphertext: Vec<u8>,
}

pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Seal `plaintext` with a fresh random nonce.
pub fn seal(
    key: &SymmetricKey,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Envelope, CryptoError> {
    seal_with_nonce(key, generate_nonce(), plaintext, aad)
}

/// Seal with a caller-supplied nonce.
///
/// Only reaction envelopes use this, with a nonce derived deterministically
/// from the reaction triple (see [`reaction_nonce`]): the same triple always
/// produces byte-identical output, which is what lets the relay merge
/// duplicate reactions without decrypting them. Nonce reuse across
/// *different* plaintexts would break confidentiality; never call this with
/// anything but a triple-derived nonce.
pub fn seal_with_nonce(
    key: &SymmetricKey,
    nonce: [u8; NONCE_SIZE],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Envelope, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let ciphertext = cipher
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::EncryptionFailed)?;

    Ok(Envelope {
        nonce: nonce.to_vec(),
        ciphertext,
    })
}

/// Open an envelope. Fails on any bit flip in nonce, ciphertext, or aad.
pub fn open(
    key: &SymmetricKey,
    envelope: &Envelope,
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if envelope.nonce.len() != NONCE_SIZE {
        return Err(CryptoError::InvalidNonceLength);
    }
    // Anything shorter than a bare tag cannot be a valid sealing.
    if envelope.ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let cipher = XChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(
            XNonce::from_slice(&envelope.nonce),
            Payload {
                msg: &envelope.ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Deterministic nonce for a reaction envelope (BLAKE3 XOF).
///
/// Keyed by the symmetric key and the full `(message_id, emoji, sender)`
/// triple, so distinct triples get distinct nonces while resends of the same
/// reaction reproduce the exact same envelope bytes.
pub fn reaction_nonce(
    key: &SymmetricKey,
    message_id: MessageId,
    emoji: &str,
    sender: &str,
) -> [u8; NONCE_SIZE] {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_REACTION_NONCE);
    hasher.update(key);
    hasher.update(&message_id.0.to_le_bytes());
    hasher.update(&(sender.len() as u64).to_le_bytes());
    hasher.update(sender.as_bytes());
    hasher.update(emoji.as_bytes());

    let mut nonce = [0u8; NONCE_SIZE];
    hasher.finalize_xof().fill(&mut nonce);
    nonce
}

/// Associated-data builders binding sender identity and payload kind.
pub mod aad {
    use super::{AAD_KIND_MESSAGE, AAD_KIND_REACTION};

    pub fn message(sender: &str) -> Vec<u8> {
        let mut aad = Vec::with_capacity(AAD_KIND_MESSAGE.len() + sender.len());
        aad.extend_from_slice(AAD_KIND_MESSAGE);
        aad.extend_from_slice(sender.as_bytes());
        aad
    }

    pub fn reaction(sender: &str) -> Vec<u8> {
        let mut aad = Vec::with_capacity(AAD_KIND_REACTION.len() + sender.len());
        aad.extend_from_slice(AAD_KIND_REACTION);
        aad.extend_from_slice(sender.as_bytes());
        aad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(password: &[u8], salt: &[u8]) -> SymmetricKey {
        derive_key(password, salt, &KdfParams::insecure_fast()).unwrap()
    }

    #[test]
    fn test_derive_key_deterministic() {
        // Salts shorter than Argon2's 8-byte minimum are fine after
        // normalization.
        let k1 = test_key(b"pw1", b"abc");
        let k2 = test_key(b"pw1", b"abc");
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_different_password_different_key() {
        let k1 = test_key(b"pw1", b"abcdefgh");
        let k2 = test_key(b"pw2", b"abcdefgh");
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_different_salt_different_key() {
        let k1 = test_key(b"pw1", b"salt-one");
        let k2 = test_key(b"pw1", b"salt-two");
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = test_key(b"pw1", b"abcdefgh");
        let aad = aad::message("alice");

        let envelope = seal(&key, b"hi", &aad).unwrap();
        let plaintext = open(&key, &envelope, &aad).unwrap();

        assert_eq!(plaintext, b"hi");
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = test_key(b"pw1", b"abcdefgh");
        let wrong = test_key(b"wrong", b"abcdefgh");
        let aad = aad::message("alice");

        let envelope = seal(&key, b"hi", &aad).unwrap();
        assert!(matches!(
            open(&wrong, &envelope, &aad),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = test_key(b"pw1", b"abcdefgh");
        let aad = aad::message("alice");

        let mut envelope = seal(&key, b"hi", &aad).unwrap();
        let len = envelope.ciphertext.len();
        envelope.ciphertext[len - 1] ^= 0xFF;

        assert!(open(&key, &envelope, &aad).is_err());
    }

    #[test]
    fn test_tampered_nonce_fails() {
        let key = test_key(b"pw1", b"abcdefgh");
        let aad = aad::message("alice");

        let mut envelope = seal(&key, b"hi", &aad).unwrap();
        envelope.nonce[0] ^= 0x01;

        assert!(open(&key, &envelope, &aad).is_err());
    }

    #[test]
    fn test_aad_mismatch_fails() {
        let key = test_key(b"pw1", b"abcdefgh");

        // Sealed as a message from alice; cannot be opened as a reaction,
        // nor re-attributed to another sender.
        let envelope = seal(&key, b"hi", &aad::message("alice")).unwrap();
        assert!(open(&key, &envelope, &aad::reaction("alice")).is_err());
        assert!(open(&key, &envelope, &aad::message("mallory")).is_err());
    }

    #[test]
    fn test_bad_nonce_length_rejected() {
        let key = test_key(b"pw1", b"abcdefgh");
        let envelope = Envelope {
            nonce: vec![0u8; 12],
            ciphertext: vec![1, 2, 3],
        };
        assert!(matches!(
            open(&key, &envelope, b""),
            Err(CryptoError::InvalidNonceLength)
        ));
    }

    #[test]
    fn test_truncated_ciphertext_rejected() {
        let key = test_key(b"pw1", b"abcdefgh");
        let envelope = Envelope {
            nonce: vec![0u8; NONCE_SIZE],
            ciphertext: vec![1u8; TAG_SIZE - 1],
        };
        assert!(matches!(
            open(&key, &envelope, b""),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_reaction_nonce_deterministic() {
        let key = test_key(b"pw1", b"abcdefgh");

        let n1 = reaction_nonce(&key, MessageId(3), "😊", "B");
        let n2 = reaction_nonce(&key, MessageId(3), "😊", "B");
        assert_eq!(n1, n2);
    }

    #[test]
    fn test_reaction_nonce_distinct_per_triple() {
        let key = test_key(b"pw1", b"abcdefgh");

        let base = reaction_nonce(&key, MessageId(3), "😊", "B");
        assert_ne!(base, reaction_nonce(&key, MessageId(4), "😊", "B"));
        assert_ne!(base, reaction_nonce(&key, MessageId(3), "👍", "B"));
        assert_ne!(base, reaction_nonce(&key, MessageId(3), "😊", "A"));
    }

    #[test]
    fn test_duplicate_reaction_envelope_identical() {
        let key = test_key(b"pw1", b"abcdefgh");
        let nonce = reaction_nonce(&key, MessageId(3), "😊", "B");
        let aad = aad::reaction("B");

        let e1 = seal_with_nonce(&key, nonce, "😊".as_bytes(), &aad).unwrap();
        let e2 = seal_with_nonce(&key, nonce, "😊".as_bytes(), &aad).unwrap();

        assert_eq!(e1, e2);
    }
}
