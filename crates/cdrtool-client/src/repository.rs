//! The remote repository as seen by the orchestration code.
//!
//! Reads take optional credentials (released envelopes are public); every
//! call that mutates remote state requires them.

use std::path::Path;

use async_trait::async_trait;
use cdrtool_core::{Credentials, Envelope, EnvelopeFeedbacks, EnvelopeHistory, EnvelopeQuery};

use crate::RepoError;

/// Metadata for a new envelope, posted to `manage_addEnvelope`.
#[derive(Debug, Clone, Default)]
pub struct NewEnvelope {
    pub country_code: String,
    pub obligation: u32,
    pub title: String,
    pub description: String,
    pub year: Option<i32>,
    pub end_year: Option<i32>,
    pub part_of_year: String,
    pub locality: String,
}

impl NewEnvelope {
    /// Form fields in the order the endpoint documents them.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let year = |y: Option<i32>| y.map(|v| v.to_string()).unwrap_or_default();
        vec![
            ("title", self.title.clone()),
            ("descr", self.description.clone()),
            ("year", year(self.year)),
            ("endyear", year(self.end_year)),
            ("partofyear", self.part_of_year.clone()),
            ("locality", self.locality.clone()),
        ]
    }
}

#[async_trait]
pub trait Repository: Send + Sync {
    /// Search envelopes of one obligation on a named repository instance.
    /// `query.reporting_year` and `query.latest` are applied to the result.
    async fn query_envelopes(
        &self,
        repo: &str,
        query: &EnvelopeQuery,
        auth: Option<&Credentials>,
    ) -> Result<Vec<Envelope>, RepoError>;

    async fn get_envelope(
        &self,
        envelope_url: &str,
        auth: Option<&Credentials>,
    ) -> Result<Envelope, RepoError>;

    async fn get_history(
        &self,
        envelope_url: &str,
        auth: Option<&Credentials>,
    ) -> Result<EnvelopeHistory, RepoError>;

    async fn get_feedbacks(
        &self,
        envelope_url: &str,
        auth: Option<&Credentials>,
    ) -> Result<EnvelopeFeedbacks, RepoError>;

    async fn fetch_attachment(
        &self,
        attachment_url: &str,
        auth: Option<&Credentials>,
    ) -> Result<Vec<u8>, RepoError>;

    /// Create an envelope and return its URL.
    async fn create_envelope(
        &self,
        repo: &str,
        envelope: &NewEnvelope,
        auth: &Credentials,
    ) -> Result<String, RepoError>;

    async fn activate_workitem(
        &self,
        envelope_url: &str,
        workitem_id: &str,
        auth: &Credentials,
    ) -> Result<(), RepoError>;

    async fn complete_workitem(
        &self,
        envelope_url: &str,
        workitem_id: &str,
        auth: &Credentials,
    ) -> Result<(), RepoError>;

    /// Download `file_url` into `dest`, returning the number of bytes written.
    async fn download_file(
        &self,
        file_url: &str,
        dest: &Path,
        auth: Option<&Credentials>,
    ) -> Result<u64, RepoError>;

    /// Upload `local` into an envelope under `file_name`.
    async fn upload_file(
        &self,
        envelope_url: &str,
        file_name: &str,
        local: &Path,
        auth: &Credentials,
    ) -> Result<(), RepoError>;

    async fn delete_envelope(&self, envelope_url: &str, auth: &Credentials) -> Result<(), RepoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_fields_leave_missing_years_empty() {
        let env = NewEnvelope {
            country_code: "it".into(),
            obligation: 680,
            title: "2019 [copy of https://cdr/x]".into(),
            year: Some(2019),
            ..NewEnvelope::default()
        };
        let fields = env.form_fields();
        assert_eq!(fields[0], ("title", "2019 [copy of https://cdr/x]".to_string()));
        assert_eq!(fields[2], ("year", "2019".to_string()));
        assert_eq!(fields[3], ("endyear", String::new()));
        assert_eq!(fields.len(), 6);
    }
}
