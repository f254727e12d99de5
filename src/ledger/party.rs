//! Party identities and the two-person pair that scopes a ledger.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::LedgerError;

/// Canonical identity of one member of a pair. Comparison is
/// case-insensitive; the stored form is trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(String);

impl PartyId {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive match against a raw, possibly unnormalized identity.
    pub fn matches(&self, raw: &str) -> bool {
        self.0 == raw.trim().to_lowercase()
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartyId {
    fn from(raw: &str) -> Self {
        PartyId::new(raw)
    }
}

/// Join codes avoid lookalike characters (no I, O, 0, 1).
const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const JOIN_CODE_LEN: usize = 7;

/// Generates a short invite code for the pair handshake.
pub fn join_code() -> String {
    let entropy = Uuid::new_v4();
    entropy
        .as_bytes()
        .iter()
        .take(JOIN_CODE_LEN)
        .map(|b| JOIN_CODE_ALPHABET[*b as usize % JOIN_CODE_ALPHABET.len()] as char)
        .collect()
}

/// The two-party relationship owning a ledger. A pair transiently holds one
/// member while the second has not yet joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub id: String,
    pub code: String,
    pub members: Vec<PartyId>,
}

impl Pair {
    /// Creates a pending pair with its creator as the only member.
    pub fn new(creator: PartyId) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            code: join_code(),
            members: vec![creator],
        }
    }

    /// Deterministic, order-independent pair id for two known members.
    pub fn derive_id(a: &PartyId, b: &PartyId) -> String {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        format!("{lo}:{hi}")
    }

    /// Adds the second member. Joining a complete pair or joining twice is
    /// a validation error.
    pub fn join(&mut self, member: PartyId) -> Result<(), LedgerError> {
        if self.members.contains(&member) {
            return Err(LedgerError::validation(format!(
                "{member} already belongs to pair {}",
                self.id
            )));
        }
        if self.is_complete() {
            return Err(LedgerError::validation(format!(
                "pair {} already has two members",
                self.id
            )));
        }
        self.members.push(member);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.members.len() == 2
    }

    pub fn contains(&self, party: &PartyId) -> bool {
        self.members.contains(party)
    }

    /// The other member of a complete pair, if `party` belongs to it.
    pub fn partner_of(&self, party: &PartyId) -> Option<&PartyId> {
        if !self.contains(party) {
            return None;
        }
        self.members.iter().find(|m| *m != party)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn party_ids_normalize_case_and_whitespace() {
        let a = PartyId::new("  Ada@Example.COM ");
        assert_eq!(a.as_str(), "ada@example.com");
        assert!(a.matches("ADA@example.com"));
        assert_eq!(a, PartyId::new("ada@example.com"));
    }

    #[test]
    fn derived_pair_id_is_order_independent() {
        let a = PartyId::new("ada@example.com");
        let b = PartyId::new("brian@example.com");
        assert_eq!(Pair::derive_id(&a, &b), Pair::derive_id(&b, &a));
    }

    #[test]
    fn pair_forms_through_join() {
        let ada = PartyId::new("ada@example.com");
        let brian = PartyId::new("brian@example.com");
        let mut pair = Pair::new(ada.clone());
        assert!(!pair.is_complete());
        assert!(pair.partner_of(&ada).is_none());

        pair.join(brian.clone()).unwrap();
        assert!(pair.is_complete());
        assert_eq!(pair.partner_of(&ada), Some(&brian));
        assert_eq!(pair.partner_of(&brian), Some(&ada));

        let err = pair.join(PartyId::new("carol@example.com"));
        assert!(err.is_err());
    }

    #[test]
    fn join_codes_use_the_safe_alphabet() {
        let code = join_code();
        assert_eq!(code.len(), JOIN_CODE_LEN);
        assert!(code
            .bytes()
            .all(|c| JOIN_CODE_ALPHABET.contains(&c)));
    }
}
