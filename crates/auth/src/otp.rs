//! Numeric one-time passwords.

use rand::Rng;

/// Random decimal code of `len` digits (leading zeros allowed).
pub fn generate_otp(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
