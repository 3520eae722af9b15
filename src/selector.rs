// src/selector.rs
use std::collections::HashSet;

use crate::ingest::IncidentRecord;
use crate::state::DedupState;

/// Default number of notifications sent per cycle.
pub const DEFAULT_BATCH_CAP: usize = 5;

/// Outcome of filtering one fetch against the delivered ids.
#[derive(Debug, Default)]
pub struct Selection<'a> {
    /// Records to deliver this cycle, in fetch order.
    pub batch: Vec<&'a IncidentRecord>,
    /// New records left for a later cycle because of the cap.
    pub pending: usize,
}

impl Selection<'_> {
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub fn new_total(&self) -> usize {
        self.batch.len() + self.pending
    }
}

/// Keep fetch order, drop known ids (and repeats inside the same response),
/// take at most `cap`. Nothing here mutates `state`.
pub fn select_new<'a>(raw: &'a [IncidentRecord], state: &DedupState, cap: usize) -> Selection<'a> {
    let mut seen_now: HashSet<&str> = HashSet::new();
    let mut sel = Selection::default();

    for rec in raw {
        if state.contains(&rec.id) || !seen_now.insert(rec.id.as_str()) {
            continue;
        }
        if sel.batch.len() < cap {
            sel.batch.push(rec);
        } else {
            sel.pending += 1;
        }
    }
    sel
}
