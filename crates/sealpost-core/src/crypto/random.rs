//! OS randomness for salts and nonces.

use crate::error::{Result, SealError};

/// Fill `buf` from the operating system's CSPRNG.
pub fn fill_random(buf: &mut [u8]) -> Result<()> {
    getrandom::getrandom(buf)
        .map_err(|e| SealError::Crypto(format!("Failed to generate random bytes: {}", e)))
}

/// A fixed-size array of fresh random bytes.
pub fn random_array<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    fill_random(&mut bytes)?;
    Ok(bytes)
}
