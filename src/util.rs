//! Small helpers: local session id generation.

use rand::distr::Alphanumeric;
use rand::{rng, Rng};

/// Generates a random 5-character alphanumeric session id, used once per
/// connection as `sessid_local` and never reused for its lifetime.
pub fn random_sessid() -> String {
    rng().sample_iter(Alphanumeric).take(5).map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessid_has_expected_length() {
        let id = random_sessid();
        assert_eq!(id.len(), 5);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
