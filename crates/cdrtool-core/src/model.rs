//! Typed projections of the repository's envelope API.
//!
//! Every projection is fetched fresh per invocation and never persisted.
//! Missing keys become explicit empty/`None` values instead of lookup failures.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::wire;

/// A versioned submission package tracked by a repository instance.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Envelope {
    #[serde(deserialize_with = "wire::text")]
    pub url: String,
    #[serde(deserialize_with = "wire::text")]
    pub title: String,
    #[serde(deserialize_with = "wire::text")]
    pub description: String,
    #[serde(deserialize_with = "wire::text")]
    pub country_code: String,
    #[serde(deserialize_with = "wire::flag")]
    pub is_released: bool,
    #[serde(deserialize_with = "wire::date")]
    pub reporting_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "wire::date")]
    pub modified_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "wire::year")]
    pub period_start_year: Option<i32>,
    #[serde(deserialize_with = "wire::year")]
    pub period_end_year: Option<i32>,
    #[serde(deserialize_with = "wire::text")]
    pub period_description: String,
    #[serde(rename = "isBlockedByQCError", deserialize_with = "wire::flag")]
    pub is_blocked_by_qc_error: bool,
    #[serde(rename = "hasUnknownQC", deserialize_with = "wire::flag")]
    pub has_unknown_qc: bool,
    #[serde(deserialize_with = "wire::text")]
    pub status: String,
    #[serde(deserialize_with = "wire::date")]
    pub status_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "wire::text")]
    pub creator: String,
    pub files: Vec<EnvelopeFile>,
    #[serde(deserialize_with = "wire::text_list")]
    pub obligations: Vec<String>,
}

impl Envelope {
    /// First obligation code listed on the envelope, if any.
    pub fn obligation(&self) -> Option<&str> {
        self.obligations.first().map(String::as_str)
    }
}

/// A file owned by an envelope.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvelopeFile {
    #[serde(deserialize_with = "wire::text")]
    pub url: String,
    #[serde(deserialize_with = "wire::text")]
    pub title: String,
    #[serde(deserialize_with = "wire::text")]
    pub content_type: String,
    #[serde(rename = "schemaURL", deserialize_with = "wire::text")]
    pub schema_url: String,
    #[serde(deserialize_with = "wire::date")]
    pub upload_date: Option<DateTime<Utc>>,
}

impl EnvelopeFile {
    /// Last path segment of the file URL.
    pub fn file_name(&self) -> &str {
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }
}

/// Workflow activity identifiers the tool reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Activity {
    Draft,
    AutomaticQa,
    DeleteAutomaticQaFeedback,
    Other(String),
}

impl From<String> for Activity {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Draft" => Self::Draft,
            "AutomaticQA" => Self::AutomaticQa,
            "DeleteAutomaticQAFeedback" => Self::DeleteAutomaticQaFeedback,
            _ => Self::Other(raw),
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => f.write_str("Draft"),
            Self::AutomaticQa => f.write_str("AutomaticQA"),
            Self::DeleteAutomaticQaFeedback => f.write_str("DeleteAutomaticQAFeedback"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ActivityStatus {
    Inactive,
    Active,
    Complete,
    Other(String),
}

impl From<String> for ActivityStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "inactive" => Self::Inactive,
            "active" => Self::Active,
            "complete" => Self::Complete,
            _ => Self::Other(raw),
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => f.write_str("inactive"),
            Self::Active => f.write_str("active"),
            Self::Complete => f.write_str("complete"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// One entry of an envelope's workflow history.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkItem {
    #[serde(deserialize_with = "wire::text")]
    pub id: String,
    pub activity_id: Activity,
    pub activity_status: ActivityStatus,
    #[serde(default, deserialize_with = "wire::date")]
    pub modified: Option<DateTime<Utc>>,
}

impl WorkItem {
    /// True while the external QA engine is working on the envelope.
    pub fn is_running_qa(&self) -> bool {
        matches!(
            (&self.activity_id, &self.activity_status),
            (Activity::AutomaticQa, ActivityStatus::Active)
                | (Activity::DeleteAutomaticQaFeedback, _)
        )
    }
}

/// The `history` projection of one envelope.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvelopeHistory {
    #[serde(deserialize_with = "wire::text")]
    pub country_code: String,
    #[serde(deserialize_with = "wire::year")]
    pub period_start_year: Option<i32>,
    #[serde(deserialize_with = "wire::text_list")]
    pub obligations: Vec<String>,
    pub history: Vec<WorkItem>,
}

impl EnvelopeHistory {
    /// The last history entry is the envelope's current workflow state.
    pub fn current(&self) -> Option<&WorkItem> {
        self.history.last()
    }

    /// Timestamp of the most recent completed automatic QA run.
    pub fn latest_completed_qa(&self) -> Option<DateTime<Utc>> {
        self.history
            .iter()
            .filter(|wi| {
                wi.activity_id == Activity::AutomaticQa
                    && wi.activity_status == ActivityStatus::Complete
            })
            .filter_map(|wi| wi.modified)
            .max()
    }
}

/// A feedback item posted on an envelope, manual or automatic.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Feedback {
    #[serde(deserialize_with = "wire::text")]
    pub activity_id: String,
    #[serde(deserialize_with = "wire::text")]
    pub title: String,
    #[serde(deserialize_with = "wire::text")]
    pub feedback_status: String,
    #[serde(deserialize_with = "wire::text")]
    pub feedback_message: String,
    #[serde(deserialize_with = "wire::text")]
    pub posting_date: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Attachment {
    #[serde(deserialize_with = "wire::text")]
    pub url: String,
}

/// The `feedbacks` projection of one envelope.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvelopeFeedbacks {
    #[serde(deserialize_with = "wire::text")]
    pub country_code: String,
    #[serde(deserialize_with = "wire::year")]
    pub period_start_year: Option<i32>,
    #[serde(deserialize_with = "wire::text_list")]
    pub obligations: Vec<String>,
    pub feedbacks: Vec<Feedback>,
}

/// Envelope `url` as returned by `manage_addEnvelope`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EnvelopeRef {
    #[serde(deserialize_with = "wire::text")]
    pub url: String,
}

/// Top-level response body of every `/api/envelopes` call and of
/// `manage_addEnvelope`.
///
/// `envelopes` has no default: a body without it is a malformed response.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeListing<T> {
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
    pub envelopes: Vec<T>,
}

impl<T> EnvelopeListing<T> {
    /// Server-reported errors rendered as plain strings.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| match e {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}
