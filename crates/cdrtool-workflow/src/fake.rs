//! In-memory repository recording every remote call.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use cdrtool_client::{NewEnvelope, RepoError, Repository};
use cdrtool_core::{
    Activity, ActivityStatus, Credentials, Envelope, EnvelopeFeedbacks, EnvelopeFile,
    EnvelopeHistory, EnvelopeQuery, WorkItem,
};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Query(String, Option<String>),
    GetEnvelope(String),
    History(String),
    Feedbacks(String),
    Attachment(String),
    Create(String, String),
    Activate(String, String),
    Complete(String, String),
    Download(String),
    Upload(String, String),
    Delete(String),
}

#[derive(Default)]
pub struct FakeRepository {
    envelopes: Vec<Envelope>,
    histories: HashMap<String, EnvelopeHistory>,
    feedbacks: HashMap<String, EnvelopeFeedbacks>,
    attachments: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    calls: Mutex<Vec<Call>>,
    downloads: Mutex<Vec<PathBuf>>,
    forms: Mutex<Vec<Vec<(&'static str, String)>>>,
    created: Mutex<usize>,
}

impl FakeRepository {
    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelopes.push(envelope);
        self
    }

    pub fn with_history(mut self, url: &str, history: EnvelopeHistory) -> Self {
        self.histories.insert(url.to_string(), history);
        self
    }

    pub fn with_feedbacks(mut self, url: &str, feedbacks: EnvelopeFeedbacks) -> Self {
        self.feedbacks.insert(url.to_string(), feedbacks);
        self
    }

    pub fn with_attachment(mut self, url: &str, body: &str) -> Self {
        self.attachments.insert(url.to_string(), body.as_bytes().to_vec());
        self
    }

    /// Make the operation `op` fail for `key` (a URL, or a file name for uploads).
    pub fn failing(mut self, op: &str, key: &str) -> Self {
        self.failing.insert(format!("{op}:{key}"));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn downloaded_paths(&self) -> Vec<PathBuf> {
        self.downloads.lock().unwrap().clone()
    }

    /// Form fields of every create-envelope call, in call order.
    pub fn posted_forms(&self) -> Vec<Vec<(&'static str, String)>> {
        self.forms.lock().unwrap().clone()
    }

    fn record(&self, op: &str, key: &str, call: Call) -> Result<(), RepoError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.contains(&format!("{op}:{key}")) {
            return Err(RepoError::request(key, 500, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for FakeRepository {
    async fn query_envelopes(
        &self,
        repo: &str,
        query: &EnvelopeQuery,
        _auth: Option<&Credentials>,
    ) -> Result<Vec<Envelope>, RepoError> {
        self.record(
            "query",
            repo,
            Call::Query(repo.to_string(), query.country_code.clone()),
        )?;
        Ok(self
            .envelopes
            .iter()
            .filter(|e| {
                query
                    .country_code
                    .as_deref()
                    .is_none_or(|cc| cc.eq_ignore_ascii_case(&e.country_code))
            })
            .cloned()
            .collect())
    }

    async fn get_envelope(
        &self,
        envelope_url: &str,
        _auth: Option<&Credentials>,
    ) -> Result<Envelope, RepoError> {
        self.record("envelope", envelope_url, Call::GetEnvelope(envelope_url.to_string()))?;
        self.envelopes
            .iter()
            .find(|e| e.url == envelope_url)
            .cloned()
            .ok_or_else(|| RepoError::parse(envelope_url, "no such envelope"))
    }

    async fn get_history(
        &self,
        envelope_url: &str,
        _auth: Option<&Credentials>,
    ) -> Result<EnvelopeHistory, RepoError> {
        self.record("history", envelope_url, Call::History(envelope_url.to_string()))?;
        self.histories
            .get(envelope_url)
            .cloned()
            .ok_or_else(|| RepoError::parse(envelope_url, "no history"))
    }

    async fn get_feedbacks(
        &self,
        envelope_url: &str,
        _auth: Option<&Credentials>,
    ) -> Result<EnvelopeFeedbacks, RepoError> {
        self.record("feedbacks", envelope_url, Call::Feedbacks(envelope_url.to_string()))?;
        self.feedbacks
            .get(envelope_url)
            .cloned()
            .ok_or_else(|| RepoError::parse(envelope_url, "no feedbacks"))
    }

    async fn fetch_attachment(
        &self,
        attachment_url: &str,
        _auth: Option<&Credentials>,
    ) -> Result<Vec<u8>, RepoError> {
        self.record("attachment", attachment_url, Call::Attachment(attachment_url.to_string()))?;
        Ok(self
            .attachments
            .get(attachment_url)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_envelope(
        &self,
        repo: &str,
        envelope: &NewEnvelope,
        _auth: &Credentials,
    ) -> Result<String, RepoError> {
        self.record(
            "create",
            &envelope.title,
            Call::Create(repo.to_string(), envelope.title.clone()),
        )?;
        self.forms.lock().unwrap().push(envelope.form_fields());
        let mut created = self.created.lock().unwrap();
        *created += 1;
        Ok(format!(
            "https://cdrtest/{}/{}/env{}",
            envelope.country_code, envelope.obligation, *created
        ))
    }

    async fn activate_workitem(
        &self,
        envelope_url: &str,
        workitem_id: &str,
        _auth: &Credentials,
    ) -> Result<(), RepoError> {
        self.record(
            "activate",
            envelope_url,
            Call::Activate(envelope_url.to_string(), workitem_id.to_string()),
        )
    }

    async fn complete_workitem(
        &self,
        envelope_url: &str,
        workitem_id: &str,
        _auth: &Credentials,
    ) -> Result<(), RepoError> {
        self.record(
            "complete",
            envelope_url,
            Call::Complete(envelope_url.to_string(), workitem_id.to_string()),
        )
    }

    async fn download_file(
        &self,
        file_url: &str,
        dest: &Path,
        _auth: Option<&Credentials>,
    ) -> Result<u64, RepoError> {
        self.record("download", file_url, Call::Download(file_url.to_string()))?;
        self.downloads.lock().unwrap().push(dest.to_path_buf());
        let body = format!("content of {file_url}");
        std::fs::write(dest, &body)?;
        Ok(body.len() as u64)
    }

    async fn upload_file(
        &self,
        envelope_url: &str,
        file_name: &str,
        local: &Path,
        _auth: &Credentials,
    ) -> Result<(), RepoError> {
        assert!(local.exists(), "upload source must exist while uploading");
        self.record(
            "upload",
            file_name,
            Call::Upload(envelope_url.to_string(), file_name.to_string()),
        )
    }

    async fn delete_envelope(&self, envelope_url: &str, _auth: &Credentials) -> Result<(), RepoError> {
        self.record("delete", envelope_url, Call::Delete(envelope_url.to_string()))
    }
}

pub fn creds() -> Credentials {
    Credentials::new("user", "pwd")
}

/// An envelope with `files` files named `file<N>.xml`.
pub fn envelope(url: &str, country: &str, year: i32, files: usize) -> Envelope {
    Envelope {
        url: url.to_string(),
        title: format!("Envelope {country} {year}"),
        country_code: country.to_string(),
        period_start_year: Some(year),
        files: (0..files)
            .map(|i| EnvelopeFile {
                url: format!("{url}/file{i}.xml"),
                title: format!("file{i}.xml"),
                ..EnvelopeFile::default()
            })
            .collect(),
        ..Envelope::default()
    }
}

pub fn work_item(
    id: &str,
    activity: Activity,
    status: ActivityStatus,
    modified: Option<DateTime<Utc>>,
) -> WorkItem {
    WorkItem {
        id: id.to_string(),
        activity_id: activity,
        activity_status: status,
        modified,
    }
}

pub fn history(items: Vec<WorkItem>) -> EnvelopeHistory {
    EnvelopeHistory {
        country_code: "IT".into(),
        period_start_year: Some(2019),
        obligations: vec!["680".into()],
        history: items,
    }
}
