//! Object identifiers: 11 characters, a leading letter followed by
//! letters or digits.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;

pub const UID_LENGTH: usize = 11;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHANUMERIC: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

static UID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9]{10}$").unwrap());

/// Generate a random UID.
pub fn generate_uid() -> String {
    let mut rng = rand::thread_rng();
    let mut uid = String::with_capacity(UID_LENGTH);
    uid.push(LETTERS[rng.gen_range(0..LETTERS.len())] as char);
    for _ in 1..UID_LENGTH {
        uid.push(ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())] as char);
    }
    uid
}

pub fn is_valid_uid(value: &str) -> bool {
    UID_PATTERN.is_match(value)
}
