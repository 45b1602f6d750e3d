//! Short public identifiers handed out in place of backend file references.

use rand::Rng;

/// Number of characters in every short ID.
pub const SHORT_ID_LEN: usize = 6;

/// The 62-symbol alphabet short IDs are drawn from.
pub const SHORT_ID_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Source of candidate short IDs.
///
/// The store only ever asks for candidates; collision checks and retries
/// happen on its side, so an implementation is free to repeat itself.
pub trait ShortIdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Draws each character uniformly from [`SHORT_ID_ALPHABET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomShortIds;

impl ShortIdGenerator for RandomShortIds {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..SHORT_ID_LEN)
            .map(|_| SHORT_ID_ALPHABET[rng.gen_range(0..SHORT_ID_ALPHABET.len())] as char)
            .collect()
    }
}

/// Whether `id` has the shape of a short ID (length and alphabet).
pub fn is_valid_short_id(id: &str) -> bool {
    id.len() == SHORT_ID_LEN && id.bytes().all(|b| b.is_ascii_alphanumeric())
}
