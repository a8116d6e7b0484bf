//! Password digests and auth tokens.

use log::warn;
use pbkdf2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Params, Pbkdf2};
use rand::RngCore;

const ROUNDS: u32 = 10_000;
/// Stored hashes asking for more work than this are rejected unverified.
const MAX_ROUNDS: u32 = 1_000_000;
const OUTPUT_LEN: usize = 32;
const SALT_LEN: usize = 16;
const TOKEN_LEN: usize = 20;
const MIN_PASSWORD_LEN: usize = 8;

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0_u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// PHC string, `$pbkdf2-sha256$i=10000,l=32$<salt>$<hash>`
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::encode_b64(&random_bytes::<SALT_LEN>())?;
    let params = Params { rounds: ROUNDS, output_length: OUTPUT_LEN };
    let hash = Pbkdf2.hash_password_customized(password.as_bytes(), None, None, params, &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(hash) = PasswordHash::new(stored) else {
        return false;
    };
    match Params::try_from(&hash) {
        Ok(params) if params.rounds <= MAX_ROUNDS => {}
        Ok(params) => {
            warn!("refusing to verify a hash with {} rounds", params.rounds);
            return false;
        }
        Err(_) => return false,
    }
    Pbkdf2.verify_password(password.as_bytes(), &hash).is_ok()
}

/// 40 hex characters.
pub fn generate_token() -> String {
    to_hex(&random_bytes::<TOKEN_LEN>())
}

/// Password strength problems, empty when acceptable.
pub fn password_problems(password: &str, username: &str) -> Vec<&'static str> {
    let mut problems = vec![];
    if password.chars().count() < MIN_PASSWORD_LEN {
        problems.push("This password is too short. It must contain at least 8 characters.");
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.");
    }
    if !username.is_empty() && password.eq_ignore_ascii_case(username) {
        problems.push("The password is too similar to the username.");
    }
    problems
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
        && !email.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let stored = hash_password("correct horse").unwrap();
        assert!(stored.starts_with("$pbkdf2-sha256$i=10000,l=32$"));
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("wrong horse", &stored));
        assert_ne!(stored, hash_password("correct horse").unwrap());
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$1$00$00"));
        assert!(!verify_password("x", "sha256$1$zz$00"));
    }

    #[test]
    fn excessive_rounds_are_not_verified() {
        let stored = hash_password("correct horse").unwrap();
        let greedy = stored.replace("i=10000", "i=4000000000");
        assert!(!verify_password("correct horse", &greedy));
    }

    #[test]
    fn tokens_are_hex() {
        let token = generate_token();
        assert_eq!(token.len(), 40);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn password_rules() {
        assert!(password_problems("s3cure-pass", "alice").is_empty());
        assert_eq!(password_problems("1234567", "alice").len(), 2);
        assert_eq!(password_problems("alicealice", "AliceAlice").len(), 1);
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("chef@yum.ai"));
        assert!(!is_valid_email("chef@localhost"));
        assert!(!is_valid_email("chef.yum.ai"));
        assert!(!is_valid_email("chef @yum.ai"));
        assert!(!is_valid_email("a@b@c.d"));
    }
}
