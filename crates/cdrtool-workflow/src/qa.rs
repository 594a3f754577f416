//! Push envelopes into the automatic QA workflow under an activation cap.
//!
//! The external workflow engine has its own concurrency limit, so the driver
//! counts envelopes it has put into QA (plus those already there) and stops
//! touching the remainder once the count reaches the cap. A later run picks
//! up where this one stopped.

use cdrtool_client::Repository;
use cdrtool_core::{Credentials, EnvelopeHistory};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::EnvelopeFailure;

#[derive(Debug, Clone, Copy)]
pub struct QaPolicy {
    pub max_activations: usize,
    /// Skip envelopes whose last completed QA run is at or after this instant.
    pub qa_after: Option<DateTime<Utc>>,
}

impl Default for QaPolicy {
    fn default() -> Self {
        Self {
            max_activations: 3,
            qa_after: None,
        }
    }
}

/// What to do with one envelope given its workflow history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QaDecision {
    /// QA is running (or its feedback is being deleted); counts toward the cap.
    AlreadyRunning { since: Option<DateTime<Utc>> },
    /// QA already completed after the cutoff.
    RecentlyChecked { at: DateTime<Utc> },
    /// Activate and complete the current work item.
    Activate { workitem_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QaOutcome {
    AlreadyRunning,
    RecentlyChecked,
    Activated,
    Failed(String),
}

#[derive(Debug, Default)]
pub struct QaReport {
    /// Envelope URL and outcome, for every envelope examined.
    pub outcomes: Vec<(String, QaOutcome)>,
    /// Envelopes counted against the cap.
    pub active_count: usize,
    /// Envelopes left untouched because the cap was reached.
    pub untouched: Vec<String>,
}

impl QaReport {
    pub fn failures(&self) -> Vec<EnvelopeFailure> {
        self.outcomes
            .iter()
            .filter_map(|(url, outcome)| match outcome {
                QaOutcome::Failed(reason) => Some(EnvelopeFailure {
                    url: url.clone(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// Decide from the history alone. `None` when the history is empty.
pub fn decide(history: &EnvelopeHistory, policy: &QaPolicy) -> Option<QaDecision> {
    let current = history.current()?;
    if current.is_running_qa() {
        return Some(QaDecision::AlreadyRunning {
            since: current.modified,
        });
    }
    if let Some(cutoff) = policy.qa_after
        && let Some(at) = history.latest_completed_qa()
        && at >= cutoff
    {
        return Some(QaDecision::RecentlyChecked { at });
    }
    Some(QaDecision::Activate {
        workitem_id: current.id.clone(),
    })
}

pub async fn activate_qa<R: Repository + ?Sized>(
    repo: &R,
    envelope_urls: &[String],
    policy: &QaPolicy,
    auth: &Credentials,
) -> QaReport {
    let mut report = QaReport::default();
    let total = envelope_urls.len();

    for (index, url) in envelope_urls.iter().enumerate() {
        if report.active_count >= policy.max_activations {
            info!(max = policy.max_activations, "reached maximum number of activations");
            report.untouched = envelope_urls[index..].to_vec();
            break;
        }

        let history = match repo.get_history(url, Some(auth)).await {
            Ok(h) => h,
            Err(e) => {
                warn!(url = %url, error = %e, "cannot read workflow history");
                report.outcomes.push((url.clone(), QaOutcome::Failed(e.to_string())));
                continue;
            }
        };
        if let Some(current) = history.current() {
            info!(
                index = index + 1,
                total,
                url = %url,
                country = %history.country_code,
                year = ?history.period_start_year,
                activity = %current.activity_id,
                status = %current.activity_status,
                "envelope workflow state"
            );
        }

        let outcome = match decide(&history, policy) {
            None => {
                warn!(url = %url, "empty workflow history");
                QaOutcome::Failed("empty workflow history".into())
            }
            Some(QaDecision::AlreadyRunning { since }) => {
                info!(url = %url, since = ?since, "already running QA, skipping");
                report.active_count += 1;
                QaOutcome::AlreadyRunning
            }
            Some(QaDecision::RecentlyChecked { at }) => {
                info!(url = %url, at = %at.format("%Y-%m-%d"), "QA already run, skipping");
                QaOutcome::RecentlyChecked
            }
            Some(QaDecision::Activate { workitem_id }) => {
                info!(url = %url, workitem = %workitem_id, "activating QA");
                match repo.activate_workitem(url, &workitem_id, auth).await {
                    Err(e) => {
                        warn!(url = %url, error = %e, "activation failed");
                        QaOutcome::Failed(e.to_string())
                    }
                    Ok(()) => {
                        // Activation alone may start work remotely.
                        report.active_count += 1;
                        match repo.complete_workitem(url, &workitem_id, auth).await {
                            Ok(()) => QaOutcome::Activated,
                            Err(e) => {
                                warn!(url = %url, error = %e, "starting QA failed");
                                QaOutcome::Failed(e.to_string())
                            }
                        }
                    }
                }
            }
        };
        report.outcomes.push((url.clone(), outcome));
    }

    info!(
        active = report.active_count,
        untouched = report.untouched.len(),
        "QA activation finished"
    );
    report
}
