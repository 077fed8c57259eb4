//! Known scam creators

use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::warn;

/// Creator wallets seen launching rug pulls. Extended at runtime from
/// `safety.extra_blacklist`.
pub const KNOWN_SCAM_CREATORS: &[&str] = &[];

#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    creators: HashSet<Pubkey>,
}

impl Blacklist {
    /// Built-in list plus `extra` addresses. Unparseable entries are logged and skipped.
    pub fn new(extra: &[String]) -> Self {
        let creators = KNOWN_SCAM_CREATORS
            .iter()
            .copied()
            .chain(extra.iter().map(String::as_str))
            .filter_map(|address| match Pubkey::from_str(address) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!("Ignoring blacklist entry {}: {}", address, e);
                    None
                }
            })
            .collect();

        Self { creators }
    }

    pub fn contains(&self, creator: &Pubkey) -> bool {
        self.creators.contains(creator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_entries() {
        let scammer = Pubkey::new_unique();
        let list = Blacklist::new(&[scammer.to_string(), "not-a-key".to_string()]);

        assert!(list.contains(&scammer));
        assert!(!list.contains(&Pubkey::new_unique()));
        assert_eq!(list.creators.len(), KNOWN_SCAM_CREATORS.len() + 1);
    }
}
