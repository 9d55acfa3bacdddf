//! Album access pin generation

use rand::Rng;

/// Length of an album access pin
pub const ACCESS_PIN_LENGTH: usize = 6;

const PIN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a 6-character uppercase alphanumeric access pin
pub fn generate_access_pin() -> String {
    generate_access_pin_with(&mut rand::rng())
}

pub fn generate_access_pin_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ACCESS_PIN_LENGTH)
        .map(|_| PIN_ALPHABET[rng.random_range(0..PIN_ALPHABET.len())] as char)
        .collect()
}

pub fn is_valid_access_pin(pin: &str) -> bool {
    pin.len() == ACCESS_PIN_LENGTH && pin.bytes().all(|b| PIN_ALPHABET.contains(&b))
}
