use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use color_eyre::eyre::eyre;
use rand::RngCore;

const MIN_PASSWORD_LENGTH: usize = 8;

/// Hashes a password with Argon2id into a PHC string for storage.
pub(crate) fn hash_password(password: &str) -> color_eyre::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| eyre!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is malformed.
pub(crate) fn verify_password(password: &str, hash: &str) -> color_eyre::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| eyre!("Stored password hash is invalid: {e}"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// A fresh 40 character hex token key.
pub(crate) fn generate_token_key() -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Checks a candidate password against the account it belongs to. Returns
/// every rule it breaks.
pub(crate) fn password_problems(password: &str, username: &str, email: &str) -> Vec<String> {
    let mut problems = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }

    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }

    let lowered = password.to_lowercase();
    let email_local = email.split('@').next().unwrap_or_default().to_lowercase();
    if lowered == username.to_lowercase() || (!email_local.is_empty() && lowered == email_local) {
        problems.push("The password is too similar to the account details.".to_string());
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_token_key_shape() {
        let key = generate_token_key();

        assert_eq!(key.len(), 40);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_token_key());
    }

    #[test]
    fn test_password_problems() {
        assert!(password_problems("s3cret-sauce", "julia", "julia@example.com").is_empty());

        let short = password_problems("abc", "julia", "julia@example.com");
        assert_eq!(short.len(), 1);
        assert!(short[0].contains("too short"));

        let numeric = password_problems("1234567890", "julia", "julia@example.com");
        assert_eq!(numeric, vec!["This password is entirely numeric.".to_string()]);

        let similar = password_problems("JuliaChild", "juliachild", "chef@example.com");
        assert_eq!(similar.len(), 1);

        let like_email = password_problems("thechefjulia", "julia", "thechefjulia@example.com");
        assert_eq!(like_email.len(), 1);
    }
}
