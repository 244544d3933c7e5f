//! Token generation

use rand::rngs::OsRng;
use rand::RngCore;

/// Stable prefix for visual identification of engram tokens
pub const TOKEN_PREFIX: &str = "egm_";

const TOKEN_ENTROPY_BYTES: usize = 32;

/// Generate an opaque token: the stable prefix plus 64 hex characters
/// (256 bits from the OS entropy source)
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{}{}", TOKEN_PREFIX, hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_have_the_documented_shape() {
        let token = generate_token();
        assert!(token.starts_with(TOKEN_PREFIX));
        assert_eq!(token.len(), TOKEN_PREFIX.len() + TOKEN_ENTROPY_BYTES * 2);
        assert!(token[TOKEN_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_do_not_repeat() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
    }
}
