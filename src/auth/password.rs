use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// `salt$hex(hmac_sha256(key = salt, password))`
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = Uuid::new_v4().simple().to_string();
    let mut mac = keyed(&salt)?;
    mac.update(password.as_bytes());
    Ok(format!("{}${}", salt, hex::encode(mac.finalize().into_bytes())))
}

/// Checks `password` against a stored hash. The digest comparison goes
/// through `Mac::verify_slice`, which runs in constant time.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let (salt, expected) = match stored.split_once('$') {
        Some(parts) => parts,
        None => return false,
    };
    let expected = match hex::decode(expected) {
        Ok(expected) => expected,
        Err(_) => return false,
    };
    let mut mac = match keyed(salt) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(password.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

fn keyed(salt: &str) -> Result<HmacSha256, AuthError> {
    HmacSha256::new_from_slice(salt.as_bytes()).map_err(|_| AuthError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_matching_password() {
        let stored = hash_password("password123").unwrap();
        assert!(verify_password("password123", &stored));
        assert!(!verify_password("password124", &stored));
    }

    #[test]
    fn salts_differ_per_hash() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn rejects_malformed_hashes() {
        assert!(!verify_password("pw", "no-separator"));
        assert!(!verify_password("pw", "salt$short"));
        assert!(!verify_password("pw", "salt$abcd"));
    }

    #[test]
    fn truncated_digests_do_not_verify() {
        let stored = hash_password("pw").unwrap();
        assert!(!verify_password("pw", &stored[..stored.len() - 2]));
    }
}
