use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{DaySnapshot, StoredSnapshot};
use crate::snapshot::short_digest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    New,
    Changed,
}

/// One extracted snapshot that must be (re)written, with digests for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub snapshot: DaySnapshot,
    pub old_digest: Option<String>,
    pub new_digest: String,
}

/// Return the extracted snapshots whose payload is absent from, or differs
/// byte-for-byte from, the stored payload for the same (user, date).
///
/// Input order is preserved. Stored entries without a matching extraction are
/// ignored.
#[must_use]
pub fn detect_changes(extracted: &[DaySnapshot], stored: &[StoredSnapshot]) -> Vec<Change> {
    let index: HashMap<(&str, NaiveDate), Option<&str>> = stored
        .iter()
        .map(|s| ((s.user.as_str(), s.date), s.payload.as_deref()))
        .collect();

    extracted
        .iter()
        .filter_map(|snapshot| {
            let previous = index
                .get(&(snapshot.user.as_str(), snapshot.date))
                .copied()
                .flatten();
            match previous {
                Some(old) if old == snapshot.payload => None,
                Some(old) => Some(Change {
                    kind: ChangeKind::Changed,
                    snapshot: snapshot.clone(),
                    old_digest: Some(short_digest(old)),
                    new_digest: short_digest(&snapshot.payload),
                }),
                None => Some(Change {
                    kind: ChangeKind::New,
                    snapshot: snapshot.clone(),
                    old_digest: None,
                    new_digest: short_digest(&snapshot.payload),
                }),
            }
        })
        .collect()
}

/// Treat every extracted snapshot as changed, skipping the comparison.
#[must_use]
pub fn force_all(extracted: &[DaySnapshot], stored: &[StoredSnapshot]) -> Vec<Change> {
    let index: HashMap<(&str, NaiveDate), Option<&str>> = stored
        .iter()
        .map(|s| ((s.user.as_str(), s.date), s.payload.as_deref()))
        .collect();

    extracted
        .iter()
        .map(|snapshot| {
            let old = index
                .get(&(snapshot.user.as_str(), snapshot.date))
                .copied()
                .flatten();
            Change {
                kind: if old.is_some() {
                    ChangeKind::Changed
                } else {
                    ChangeKind::New
                },
                snapshot: snapshot.clone(),
                old_digest: old.map(short_digest),
                new_digest: short_digest(&snapshot.payload),
            }
        })
        .collect()
}
