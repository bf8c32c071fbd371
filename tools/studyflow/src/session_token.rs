use crate::runtime::{Clock, RandomSource};
use sha2::{Digest, Sha256};
use std::time::UNIX_EPOCH;

pub const TOKEN_LEN: usize = 64;

/// New opaque session token: hex SHA-256 over fresh random bytes and the clock.
pub fn mint(clock: &dyn Clock, random: &dyn RandomSource) -> String {
    let mut entropy = [0u8; 32];
    random.fill_bytes(&mut entropy);
    let nanos = clock
        .now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut digest = Sha256::new();
    digest.update(entropy);
    digest.update(nanos.to_le_bytes());
    hex(&digest.finalize())
}

/// Only tokens this module could have minted reach the store.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
