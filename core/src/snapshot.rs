//! Canonical encoding of day records into snapshot payloads.
//!
//! Extraction and storage both go through [`encode`], so two equal records
//! always produce the same bytes and the change detector can compare payloads
//! directly.

use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::error::PawError;
use crate::models::{DayRecord, DaySnapshot};

pub fn encode(day: &DayRecord) -> Result<DaySnapshot> {
    let payload = serde_json::to_string(day).map_err(|source| PawError::Encode {
        user: day.user.clone(),
        date: day.date,
        source,
    })?;
    Ok(DaySnapshot {
        user: day.user.clone(),
        date: day.date,
        payload,
    })
}

pub fn encode_all(days: &[DayRecord]) -> Result<Vec<DaySnapshot>> {
    days.iter().map(encode).collect()
}

pub fn decode(snapshot: &DaySnapshot) -> Result<DayRecord> {
    let day: DayRecord =
        serde_json::from_str(&snapshot.payload).map_err(|source| PawError::Decode {
            user: snapshot.user.clone(),
            date: snapshot.date,
            source,
        })?;
    Ok(day)
}

/// First 12 hex chars of the payload's SHA-256, for logs and summaries.
#[must_use]
pub fn short_digest(payload: &str) -> String {
    let digest = Sha256::digest(payload.as_bytes());
    digest.iter().take(6).map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::*;
    use crate::models::{Exercise, Meal, Note, NutrientTotals};

    fn sample_day() -> DayRecord {
        let mut metrics = BTreeMap::new();
        metrics.insert("minutes".to_string(), 30.0);
        metrics.insert("calories burned".to_string(), 250.0);
        let mut measurements = BTreeMap::new();
        measurements.insert("Weight".to_string(), 82.5);
        DayRecord {
            user: "alice".to_string(),
            date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            meals: vec![
                None,
                Some(Meal {
                    name: "breakfast".to_string(),
                    entries: Vec::new(),
                    totals: NutrientTotals {
                        calories: Some(350.0),
                        ..NutrientTotals::default()
                    },
                }),
            ],
            exercises: vec![
                vec![Exercise {
                    name: "Running".to_string(),
                    metrics,
                }],
                Vec::new(),
            ],
            goals: None,
            notes: Some(Note {
                kind: "food".to_string(),
                body: "noted".to_string(),
            }),
            water: 1000.0,
            measurements,
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let a = encode(&sample_day()).unwrap();
        let b = encode(&sample_day().clone()).unwrap();
        assert_eq!(a.payload, b.payload);
        assert_eq!(a.user, "alice");
    }

    #[test]
    fn test_encode_orders_map_keys() {
        let snapshot = encode(&sample_day()).unwrap();
        let burned = snapshot.payload.find("calories burned").unwrap();
        let minutes = snapshot.payload.find("minutes").unwrap();
        assert!(burned < minutes);
    }

    #[test]
    fn test_decode_restores_record() {
        let day = sample_day();
        let snapshot = encode(&day).unwrap();
        assert_eq!(decode(&snapshot).unwrap(), day);
    }

    #[test]
    fn test_decode_failure_names_key() {
        let snapshot = DaySnapshot {
            user: "bob".to_string(),
            date: NaiveDate::from_ymd_opt(2021, 3, 4).unwrap(),
            payload: "{not json".to_string(),
        };
        let err = decode(&snapshot).unwrap_err();
        let paw = err.downcast_ref::<PawError>().unwrap();
        assert!(matches!(paw, PawError::Decode { user, .. } if user == "bob"));
        assert!(err.to_string().contains("2021-03-04"));
    }

    #[test]
    fn test_short_digest_length_and_stability() {
        let d1 = short_digest("AAA");
        assert_eq!(d1.len(), 12);
        assert_eq!(d1, short_digest("AAA"));
        assert_ne!(d1, short_digest("BBB"));
    }
}
