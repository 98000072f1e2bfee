use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use common_crypto::{decrypt_field, encrypt_field};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const SESSION_COOKIE_NAME: &str = "cp_session";

/// Derives a 32-byte AES key from the configured `NEXTAUTH_SECRET`. The
/// secret itself may be any length >= 32 bytes; hashing gives a fixed-size
/// key regardless of what the operator picked.
pub fn derive_session_key(secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"control-plane-session-key");
    hasher.update(secret.as_bytes());
    let digest = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPayload {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
}

impl SessionPayload {
    pub fn into_pair(self) -> (Uuid, Uuid) {
        (self.tenant_id, self.user_id)
    }
}

pub fn encode_session_cookie(key: &[u8; 32], tenant_id: Uuid, user_id: Uuid, issued_at: DateTime<Utc>) -> String {
    let payload = SessionPayload { tenant_id, user_id, issued_at };
    let json = serde_json::to_vec(&payload).expect("session payload always serializes");
    let ciphertext = encrypt_field(key, &json).expect("encryption with a fixed-size key cannot fail");
    BASE64_STANDARD.encode(ciphertext)
}

pub fn decode_session_cookie(key: &[u8; 32], cookie_value: &str) -> Option<SessionPayload> {
    let ciphertext = BASE64_STANDARD.decode(cookie_value).ok()?;
    let plaintext = decrypt_field(key, &ciphertext).ok()?;
    serde_json::from_slice(&plaintext).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let key = derive_session_key("a-long-enough-secret-value-000000");
        let tenant_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let cookie = encode_session_cookie(&key, tenant_id, user_id, Utc::now());
        let decoded = decode_session_cookie(&key, &cookie).expect("decode");
        assert_eq!(decoded.tenant_id, tenant_id);
        assert_eq!(decoded.user_id, user_id);
    }

    #[test]
    fn tampered_cookie_rejected() {
        let key = derive_session_key("a-long-enough-secret-value-000000");
        let mut cookie = encode_session_cookie(&key, Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        cookie.push('x');
        assert!(decode_session_cookie(&key, &cookie).is_none());
    }

    #[test]
    fn wrong_key_rejected() {
        let key_a = derive_session_key("secret-a-is-long-enough-00000000");
        let key_b = derive_session_key("secret-b-is-long-enough-00000000");
        let cookie = encode_session_cookie(&key_a, Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        assert!(decode_session_cookie(&key_b, &cookie).is_none());
    }
}
