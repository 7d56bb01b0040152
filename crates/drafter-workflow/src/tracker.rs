//! Per-field generation tracking
//!
//! Every generation start and every edit of a field takes a fresh number
//! from one monotonic sequence. A completion is accepted only if its ticket
//! still holds the latest number for its field, so the last-started
//! generation wins and any edit supersedes pending results.

use std::collections::{BTreeMap, BTreeSet};

/// Identifies one started generation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket {
    field: String,
    sequence: u64,
}

impl Ticket {
    /// Target field
    #[inline]
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Sequence number
    #[inline]
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// In-flight generation bookkeeping for one wizard instance
#[derive(Debug, Default)]
pub struct GenerationTracker {
    next_sequence: u64,
    latest: BTreeMap<String, u64>,
    in_flight: BTreeSet<String>,
}

impl GenerationTracker {
    /// Create tracker
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of a generation for a field
    pub fn begin(&mut self, field: &str) -> Ticket {
        let sequence = self.bump(field);
        self.in_flight.insert(field.to_string());
        Ticket {
            field: field.to_string(),
            sequence,
        }
    }

    /// Record a direct edit of a field
    ///
    /// Pending generations for the field will be discarded.
    pub fn edit(&mut self, field: &str) {
        self.bump(field);
        self.in_flight.remove(field);
    }

    /// Resolve a completed generation
    ///
    /// Returns true if the result should be merged.
    pub fn finish(&mut self, ticket: &Ticket) -> bool {
        let current = self.latest.get(&ticket.field) == Some(&ticket.sequence);
        if current {
            self.in_flight.remove(&ticket.field);
        }
        current
    }

    /// Check if a field has a generation whose result would be merged
    #[inline]
    #[must_use]
    pub fn is_in_flight(&self, field: &str) -> bool {
        self.in_flight.contains(field)
    }

    /// Check if any field has a generation in flight
    #[inline]
    #[must_use]
    pub fn has_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Fields with a generation in flight, in name order
    pub fn in_flight(&self) -> impl Iterator<Item = &str> {
        self.in_flight.iter().map(String::as_str)
    }

    fn bump(&mut self, field: &str) -> u64 {
        self.next_sequence += 1;
        self.latest.insert(field.to_string(), self.next_sequence);
        self.next_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn last_started_wins() {
        let mut tracker = GenerationTracker::new();
        let first = tracker.begin("techBackground");
        let second = tracker.begin("techBackground");

        assert!(first.sequence() < second.sequence());
        assert!(!tracker.finish(&first));
        assert!(tracker.is_in_flight("techBackground"));
        assert!(tracker.finish(&second));
        assert!(!tracker.has_in_flight());
    }

    #[test]
    fn edit_supersedes_pending_generation() {
        let mut tracker = GenerationTracker::new();
        let ticket = tracker.begin("techBackground");
        tracker.edit("techBackground");

        assert!(!tracker.is_in_flight("techBackground"));
        assert!(!tracker.finish(&ticket));
    }

    #[test]
    fn fields_are_independent() {
        let mut tracker = GenerationTracker::new();
        let effects = tracker.begin("beneficialEffects");
        let points = tracker.begin("protectionPoints");
        tracker.edit("protectionPoints");

        assert!(tracker.finish(&effects));
        assert!(!tracker.finish(&points));
    }

    proptest! {
        #[test]
        fn prop_only_latest_ticket_is_accepted(starts in 1..20usize, edit_after in any::<bool>()) {
            let mut tracker = GenerationTracker::new();
            let tickets: Vec<Ticket> = (0..starts).map(|_| tracker.begin("field")).collect();
            if edit_after {
                tracker.edit("field");
            }

            let accepted: Vec<bool> = tickets.iter().map(|t| tracker.finish(t)).collect();
            let expected: Vec<bool> = (0..starts)
                .map(|i| !edit_after && i == starts - 1)
                .collect();
            prop_assert_eq!(accepted, expected);
        }
    }
}
