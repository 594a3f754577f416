//! Envelope selection: reporting-year filter, latest-per-country policy and
//! modification cut-off.
//!
//! All functions keep the input order; the latest-per-country policy depends
//! on it for ties.

use chrono::{DateTime, Utc};

use crate::model::Envelope;

/// Keep, for each country code, the envelope with the greatest `status_date`.
///
/// Countries appear in first-seen order. On equal dates the earlier envelope
/// wins, and an envelope without a status date only wins when it is the
/// first of its country.
pub fn select_latest_per_country(envelopes: Vec<Envelope>) -> Vec<Envelope> {
    let mut latest: Vec<Envelope> = Vec::new();
    for env in envelopes {
        match latest.iter_mut().find(|e| e.country_code == env.country_code) {
            Some(current) => {
                if env.status_date > current.status_date {
                    *current = env;
                }
            }
            None => latest.push(env),
        }
    }
    latest
}

/// Envelopes whose reporting period starts exactly in `year`.
pub fn filter_by_year(envelopes: Vec<Envelope>, year: i32) -> Vec<Envelope> {
    envelopes
        .into_iter()
        .filter(|e| e.period_start_year == Some(year))
        .collect()
}

/// Envelopes whose status changed strictly after `cutoff`. Envelopes without a
/// status date are dropped.
pub fn filter_modified_after(envelopes: Vec<Envelope>, cutoff: DateTime<Utc>) -> Vec<Envelope> {
    envelopes
        .into_iter()
        .filter(|e| e.status_date.is_some_and(|d| d > cutoff))
        .collect()
}

/// Year filter followed, when `latest` is set, by the latest-per-country policy.
pub fn select_envelopes(envelopes: Vec<Envelope>, year: Option<i32>, latest: bool) -> Vec<Envelope> {
    let envelopes = match year {
        Some(y) => filter_by_year(envelopes, y),
        None => envelopes,
    };
    if latest {
        select_latest_per_country(envelopes)
    } else {
        envelopes
    }
}
