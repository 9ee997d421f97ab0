use crate::error::BrokerageError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const MAX_USERNAME_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 6;

/// Trims a username and checks it is 1 to 32 characters of `[A-Za-z0-9_.-]`.
pub fn normalize_username(raw: &str) -> Result<String, BrokerageError> {
    let username = raw.trim();
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(BrokerageError::InvalidCredentials(format!(
            "username must be 1 to {MAX_USERNAME_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(BrokerageError::InvalidCredentials(
            "username may only contain letters, digits, '_', '.' and '-'".to_string(),
        ));
    }
    Ok(username.to_string())
}

pub fn check_password_strength(password: &str) -> Result<(), BrokerageError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(BrokerageError::InvalidCredentials(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Hashes a password with a fresh random salt. The result is
/// `salt$hex(HMAC-SHA256(salt, password))`.
pub fn hash_password(password: &str) -> Result<String, BrokerageError> {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let mut mac = keyed(&salt)?;
    mac.update(password.as_bytes());
    Ok(format!("{salt}${}", hex::encode(mac.finalize().into_bytes())))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, tag)) = stored.split_once('$') else {
        return false;
    };
    let Ok(expected) = hex::decode(tag) else {
        return false;
    };
    let Ok(mut mac) = keyed(salt) else {
        return false;
    };
    mac.update(password.as_bytes());
    // Constant-time comparison.
    mac.verify_slice(&expected).is_ok()
}

fn keyed(salt: &str) -> Result<HmacSha256, BrokerageError> {
    HmacSha256::new_from_slice(salt.as_bytes())
        .map_err(|e| BrokerageError::PasswordHash(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_round_trip() {
        let stored = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &stored));
        assert!(!verify_password("hunter23", &stored));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(
            hash_password("same-password").unwrap(),
            hash_password("same-password").unwrap()
        );
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "no-separator"));
        assert!(!verify_password("anything", "salt$not-hex"));
    }

    #[test]
    fn test_tampered_digest_never_verifies() {
        let stored = hash_password("hunter22").unwrap();
        let (salt, tag) = stored.split_once('$').unwrap();
        let flipped = if tag.starts_with('0') { "1" } else { "0" };
        let tampered = format!("{salt}${flipped}{}", &tag[1..]);
        assert!(!verify_password("hunter22", &tampered));
        assert!(!verify_password("hunter22", &format!("{salt}${}", &tag[2..])));
    }

    #[test]
    fn test_username_rules() {
        assert_eq!(normalize_username("  ada_l ").unwrap(), "ada_l");
        assert!(normalize_username("").is_err());
        assert!(normalize_username("has space").is_err());
        assert!(normalize_username(&"x".repeat(33)).is_err());
        assert!(check_password_strength("short").is_err());
    }
}
