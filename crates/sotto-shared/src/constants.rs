/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Poly1305 authentication tag size in bytes
pub const TAG_SIZE: usize = 16;

/// Maximum encoded wire frame size in bytes (1 MiB)
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Default relay listen port
pub const DEFAULT_PORT: u16 = 7878;

/// A conversation is exactly two participants; the relay admits no more.
pub const MAX_SESSIONS: usize = 2;

/// Default idle timeout in seconds before a delivery is flagged unread
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Key derivation context (BLAKE3) for deterministic reaction nonces
pub const KDF_CONTEXT_REACTION_NONCE: &str = "sotto-reaction-nonce-v1";

/// Key derivation context (BLAKE3) for normalizing user salts for Argon2
pub const KDF_CONTEXT_SALT: &str = "sotto-kdf-salt-v1";

/// Associated-data prefixes binding payload kind into the AEAD tag
pub const AAD_KIND_MESSAGE: &[u8] = b"sotto:message:";
pub const AAD_KIND_REACTION: &[u8] = b"sotto:reaction:";
