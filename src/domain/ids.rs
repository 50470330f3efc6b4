use rand::Rng;
use uuid::Uuid;

/// Length of post, comment, reaction and share identifiers.
pub const PUBLIC_ID_LEN: usize = 25;
pub const MAX_SLUG_LEN: usize = 64;

/// Prefix of client-generated comment ids that stand in for a row until the
/// server assigns a real one.
pub const TEMP_ID_PREFIX: &str = "tmp-";

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const LETTERS: usize = 26;

pub fn new_public_id() -> String {
    let mut rng = rand::thread_rng();
    let mut id = String::with_capacity(PUBLIC_ID_LEN);
    id.push(ALPHABET[rng.gen_range(0..LETTERS)] as char);
    for _ in 1..PUBLIC_ID_LEN {
        id.push(ALPHABET[rng.gen_range(0..ALPHABET.len())] as char);
    }
    id
}

/// Fixed-length lowercase alphanumeric token starting with a letter.
pub fn is_valid_public_id(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == PUBLIC_ID_LEN
        && bytes[0].is_ascii_lowercase()
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Lowercase alphanumerics and hyphens, no leading or trailing hyphen.
pub fn is_valid_slug(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_SLUG_LEN
        && !value.starts_with('-')
        && !value.ends_with('-')
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

pub fn new_temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4())
}

pub fn is_temp_id(value: &str) -> bool {
    value.starts_with(TEMP_ID_PREFIX)
}
