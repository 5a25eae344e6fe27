use anyhow::Context;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, TryRngCore};

/// Raw identifier width in bytes (256 bits of entropy).
const TRACKING_ID_BYTES: usize = 32;

/// Mint a new opaque tracking identifier.
///
/// Draws 256 bits from the OS entropy source and encodes them URL-safe with
/// no padding. The only failure mode is the entropy source itself, which
/// callers treat as a hard registration error.
pub fn new_tracking_id() -> anyhow::Result<String> {
    let mut buf = [0u8; TRACKING_ID_BYTES];
    OsRng
        .try_fill_bytes(&mut buf)
        .context("entropy source unavailable")?;
    Ok(URL_SAFE_NO_PAD.encode(buf))
}
