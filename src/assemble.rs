// src/assemble.rs
// Final assembly: dedup by uid (last write wins, first-seen position) and
// report the accepted count. An empty outcome is a warning, not an error.

use std::collections::HashMap;

use metrics::counter;
use tracing::{info, warn};

use crate::event::Event;

#[derive(Debug)]
pub struct Assembled {
    /// Deterministic order: first-seen position per uid, latest payload.
    pub events: Vec<Event>,
    pub duplicates: usize,
}

impl Assembled {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

pub fn assemble(events: Vec<Event>) -> Assembled {
    let mut out: Vec<Event> = Vec::with_capacity(events.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(events.len());
    let mut duplicates = 0usize;

    for event in events {
        match index.get(&event.uid) {
            // Same identity: the later record replaces the earlier one, in
            // place, so re-runs are idempotent and order stays stable.
            Some(&i) => {
                out[i] = event;
                duplicates += 1;
            }
            None => {
                index.insert(event.uid.clone(), out.len());
                out.push(event);
            }
        }
    }

    counter!("calendar_dedup_total").increment(duplicates as u64);
    if out.is_empty() {
        warn!("no events accepted");
    } else {
        info!(events = out.len(), duplicates, "calendar assembled");
    }

    Assembled {
        events: out,
        duplicates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DayKind;
    use chrono::TimeZone;
    use chrono_tz::Asia::Shanghai;

    fn ev(uid: &str, title: &str) -> Event {
        Event {
            uid: uid.to_string(),
            title: title.to_string(),
            start: Shanghai.with_ymd_and_hms(2025, 3, 17, 20, 30, 0).unwrap(),
            day_kind: DayKind::Timed,
            duration_minutes: 30,
            raw_description_parts: vec![],
            enriched_description: None,
        }
    }

    #[test]
    fn last_write_wins_per_uid() {
        let out = assemble(vec![ev("A", "X"), ev("A", "Y")]);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].title, "Y");
        assert_eq!(out.duplicates, 1);
    }

    #[test]
    fn surviving_event_keeps_first_seen_position() {
        let out = assemble(vec![ev("A", "a1"), ev("B", "b"), ev("A", "a2")]);
        let uids: Vec<&str> = out.events.iter().map(|e| e.uid.as_str()).collect();
        assert_eq!(uids, vec!["A", "B"]);
        assert_eq!(out.events[0].title, "a2");
    }

    #[test]
    fn empty_input_is_a_reportable_empty_result() {
        let out = assemble(vec![]);
        assert!(out.is_empty());
        assert_eq!(out.duplicates, 0);
    }

    #[test]
    fn assembly_is_idempotent() {
        let batch = vec![ev("A", "a"), ev("B", "b"), ev("A", "a2")];
        let once = assemble(batch.clone());
        let twice = assemble(batch);
        assert_eq!(once.events, twice.events);
    }
}
