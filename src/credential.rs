// API key generation

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;

/// Literal tag every generated key starts with
pub const KEY_PREFIX: &str = "booker_";

/// Number of random bytes behind each key (256 bits)
const KEY_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Secure random not available: {0}")]
    NoSecureRandom(#[from] rand::Error),
}

/// Generate a new `booker_<base64url>` key from the OS secure RNG
pub fn generate() -> Result<String, CredentialError> {
    generate_with(&mut OsRng)
}

/// Generate a key from any RNG; a failing RNG fails the call
pub fn generate_with<R: RngCore + ?Sized>(rng: &mut R) -> Result<String, CredentialError> {
    let mut bytes = [0u8; KEY_BYTES];
    rng.try_fill_bytes(&mut bytes)?;
    Ok(format!("{}{}", KEY_PREFIX, URL_SAFE_NO_PAD.encode(bytes)))
}
