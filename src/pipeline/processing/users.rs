//! Current-state user dimension.
//!
//! One row per non-null `user_id`, taken from that user's latest event. The
//! aggregation is a reduce-by-key with an explicit tie-break, so the result
//! does not depend on how events are partitioned or ordered.

use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::domain::{NormalizedEvent, UserDim};
use crate::pipeline::processing::ordering::nulls_last;

#[derive(Debug, Clone, PartialEq, Eq)]
struct UserCandidate {
    ts: Option<NaiveDateTime>,
    row: UserDim,
}

impl UserCandidate {
    fn from_event(event: &NormalizedEvent) -> Option<Self> {
        Some(Self {
            ts: event.ts,
            row: UserDim {
                user_id: event.user_id?,
                first_name: event.first_name.clone(),
                last_name: event.last_name.clone(),
                gender: event.gender.clone(),
                level: event.level.clone(),
            },
        })
    }

    /// `Less` means `self` should replace `other` as the user's current row.
    ///
    /// Latest `ts` first (a null `ts` is older than any timestamp). Ties at
    /// the same `ts` go to the smallest (level, first_name, last_name,
    /// gender), nulls last.
    fn precedence(&self, other: &Self) -> Ordering {
        other
            .ts
            .cmp(&self.ts)
            .then_with(|| nulls_last(&self.row.level, &other.row.level))
            .then_with(|| nulls_last(&self.row.first_name, &other.row.first_name))
            .then_with(|| nulls_last(&self.row.last_name, &other.row.last_name))
            .then_with(|| nulls_last(&self.row.gender, &other.row.gender))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserBuildStats {
    pub events_without_user: usize,
    /// Users whose latest timestamp was shared by rows with differing attributes
    pub tied_users: usize,
}

#[derive(Debug, Default)]
pub struct UserDimensionBuilder {
    current: BTreeMap<i32, UserCandidate>,
    tied: BTreeMap<i32, bool>,
    stats: UserBuildStats,
}

impl UserDimensionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one partition of events into the per-user state.
    pub fn accumulate<'e>(&mut self, events: impl IntoIterator<Item = &'e NormalizedEvent>) {
        for event in events {
            let Some(candidate) = UserCandidate::from_event(event) else {
                self.stats.events_without_user += 1;
                continue;
            };
            let user_id = candidate.row.user_id;
            match self.current.entry(user_id) {
                Entry::Vacant(slot) => {
                    slot.insert(candidate);
                    self.tied.insert(user_id, false);
                }
                Entry::Occupied(mut slot) => {
                    let existing = slot.get();
                    let same_ts = existing.ts == candidate.ts;
                    if same_ts && existing.row != candidate.row {
                        self.tied.insert(user_id, true);
                    } else if candidate.ts > existing.ts {
                        self.tied.insert(user_id, false);
                    }
                    if candidate.precedence(existing) == Ordering::Less {
                        slot.insert(candidate);
                    }
                }
            }
        }
    }

    /// Users sorted by `user_id`.
    pub fn finish(self) -> (Vec<UserDim>, UserBuildStats) {
        let mut stats = self.stats;
        stats.tied_users = self.tied.values().filter(|tied| **tied).count();
        let users = self.current.into_values().map(|c| c.row).collect();
        (users, stats)
    }
}

/// Build the user dimension from a complete event stream.
pub fn build_users<'e>(
    events: impl IntoIterator<Item = &'e NormalizedEvent>,
) -> (Vec<UserDim>, UserBuildStats) {
    let mut builder = UserDimensionBuilder::new();
    builder.accumulate(events);
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2018, 11, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
    }

    fn event(user_id: Option<i32>, ts: Option<NaiveDateTime>, level: &str, first: &str) -> NormalizedEvent {
        NormalizedEvent {
            user_id,
            ts,
            level: Some(level.to_string()),
            first_name: Some(first.to_string()),
            last_name: Some("Smith".to_string()),
            gender: Some("F".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_latest_event_wins() {
        let events = vec![
            event(Some(7), at(10), "free", "Old"),
            event(Some(7), at(12), "paid", "New"),
            event(Some(7), at(11), "free", "Mid"),
        ];
        let (users, stats) = build_users(&events);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, 7);
        assert_eq!(users[0].level.as_deref(), Some("paid"));
        assert_eq!(users[0].first_name.as_deref(), Some("New"));
        assert_eq!(stats.tied_users, 0);
    }

    #[test]
    fn test_null_user_ids_are_skipped() {
        let events = vec![event(None, at(1), "free", "Ghost"), event(Some(3), at(1), "free", "A")];
        let (users, stats) = build_users(&events);
        assert_eq!(users.len(), 1);
        assert_eq!(stats.events_without_user, 1);
    }

    #[test]
    fn test_tie_at_max_ts_is_resolved_deterministically() {
        let a = event(Some(5), at(9), "paid", "Ann");
        let b = event(Some(5), at(9), "free", "Ann");
        let (forward, stats) = build_users(&[a.clone(), b.clone()]);
        let (backward, _) = build_users(&[b, a]);
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].level.as_deref(), Some("free"));
        assert_eq!(stats.tied_users, 1);
    }

    #[test]
    fn test_tie_flag_cleared_by_later_event() {
        let events = vec![
            event(Some(5), at(9), "paid", "Ann"),
            event(Some(5), at(9), "free", "Ann"),
            event(Some(5), at(10), "paid", "Ann"),
        ];
        let (users, stats) = build_users(&events);
        assert_eq!(users[0].level.as_deref(), Some("paid"));
        assert_eq!(stats.tied_users, 0);
    }

    #[test]
    fn test_null_ts_user_still_gets_a_row() {
        let events = vec![event(Some(9), None, "paid", "B"), event(Some(9), None, "free", "A")];
        let (users, _) = build_users(&events);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].level.as_deref(), Some("free"));
    }

    #[test]
    fn test_timestamped_row_beats_null_ts() {
        let events = vec![event(Some(9), at(1), "paid", "B"), event(Some(9), None, "free", "A")];
        let (users, _) = build_users(&events);
        assert_eq!(users[0].level.as_deref(), Some("paid"));
    }

    #[test]
    fn test_accumulate_across_partitions_matches_single_pass() {
        let all: Vec<_> = (0..30)
            .map(|i| event(Some(i % 4), at((i * 7 % 24) as u32), if i % 2 == 0 { "free" } else { "paid" }, "X"))
            .collect();
        let (single, _) = build_users(&all);

        let mut builder = UserDimensionBuilder::new();
        for chunk in all.chunks(7).rev() {
            builder.accumulate(chunk);
        }
        let (chunked, _) = builder.finish();
        assert_eq!(single, chunked);
        assert_eq!(single.len(), 4);
    }
}
