use std::sync::Arc;

use rand::Rng;

pub const INVITE_CODE_LEN: usize = 8;
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Produces candidate invite codes. Uniqueness is checked by the caller.
pub type InviteCodeGenerator = Arc<dyn Fn() -> String + Send + Sync>;

pub fn random_invite_code() -> String {
    let mut rng = rand::rng();
    (0..INVITE_CODE_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn random_generator() -> InviteCodeGenerator {
    Arc::new(random_invite_code)
}
