//! Marking: token counts per place, as an immutable value type.
//!
//! Markings are keys in the verifier's visited set and parent map, so the
//! canonical form matters: entries are kept sorted by place id and zero
//! counts are omitted. Two markings are equal iff they assign the same
//! count to every place, with absent keys reading as 0.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Assignment of non-negative token counts to places.
///
/// Stored as a sorted map with zero counts omitted, which makes equality
/// and hashing canonical regardless of construction order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Marking(BTreeMap<String, u64>);

// Manual impl: explicit zero counts in a document must not break the
// canonical zero-omitting form
impl<'de> Deserialize<'de> for Marking {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, u64>::deserialize(deserializer)?;
        Ok(Marking(raw.into_iter().filter(|(_, n)| *n > 0).collect()))
    }
}

impl Marking {
    /// The empty marking (0 tokens everywhere)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of tokens at a place; absent keys read as 0
    pub fn tokens(&self, place_id: &str) -> u64 {
        self.0.get(place_id).copied().unwrap_or(0)
    }

    /// Return a new marking with the count at `place_id` replaced.
    ///
    /// Markings are immutable values; mutation always goes through a copy.
    pub fn with_tokens(&self, place_id: &str, count: u64) -> Self {
        let mut inner = self.0.clone();
        if count == 0 {
            inner.remove(place_id);
        } else {
            inner.insert(place_id.to_string(), count);
        }
        Marking(inner)
    }

    /// Set a count in place during construction. Zero counts are dropped.
    pub(crate) fn set(&mut self, place_id: &str, count: u64) {
        if count == 0 {
            self.0.remove(place_id);
        } else {
            self.0.insert(place_id.to_string(), count);
        }
    }

    /// Iterate over (place id, count) pairs in sorted order (non-zero only)
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// True if no place holds a token
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of places holding at least one token
    pub fn occupied_places(&self) -> usize {
        self.0.len()
    }

    /// Total token count across all places
    pub fn total_tokens(&self) -> u64 {
        self.0.values().sum()
    }

    /// True if `other` has at least as many tokens on every place as self.
    ///
    /// Used as a cheap growth signal for the boundedness heuristic.
    pub fn covered_by(&self, other: &Marking) -> bool {
        self.0.iter().all(|(id, n)| other.tokens(id) >= *n)
    }
}

impl<P: Into<String>> FromIterator<(P, u64)> for Marking {
    fn from_iter<I: IntoIterator<Item = (P, u64)>>(iter: I) -> Self {
        let mut marking = Marking::default();
        for (id, count) in iter {
            let id = id.into();
            marking.set(&id, count);
        }
        marking
    }
}

impl std::fmt::Display for Marking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (id, n)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", id, n)?;
        }
        write!(f, "}}")
    }
}
