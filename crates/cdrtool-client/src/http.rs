//! HTTP client for the repository envelope API.

use std::path::Path;

use async_trait::async_trait;
use cdrtool_core::model::{EnvelopeListing, EnvelopeRef};
use cdrtool_core::select::select_envelopes;
use cdrtool_core::urls::{
    FEEDBACK_FIELDS, HISTORY_FIELDS, add_envelope_url, base_url_for_host,
    envelope_projection_url, split_envelope_url, workitem_url,
};
use cdrtool_core::{Credentials, Envelope, EnvelopeFeedbacks, EnvelopeHistory, EnvelopeQuery, Settings};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::{NewEnvelope, RepoError, Repository};

/// Envelope API client shared by every repository instance named in
/// [`Settings`].
///
/// Credentials go into an `Authorization: Basic` header per request; request
/// URLs never carry them, so they are safe to log.
pub struct RepositoryClient {
    client: reqwest::Client,
    settings: Settings,
}

impl RepositoryClient {
    pub fn new(settings: Settings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Root URL of a repository instance. A configured root URL with an
    /// explicit scheme is used as is; for a bare host the scheme is https
    /// whenever credentials are about to be sent or the settings force it.
    fn api_root(&self, repo: &str, auth: Option<&Credentials>) -> Result<String, RepoError> {
        let host = self.settings.repository_host(repo)?;
        if host.contains("://") {
            return Ok(host.trim_end_matches('/').to_string());
        }
        let secure = self.settings.force_secure || auth.is_some();
        Ok(base_url_for_host(host, None, secure))
    }

    fn with_auth(builder: RequestBuilder, auth: Option<&Credentials>) -> RequestBuilder {
        match auth {
            Some(c) => builder.basic_auth(c.user(), Some(c.password())),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, url: &str) -> Result<Response, RepoError> {
        let resp = builder.send().await?;
        let status = resp.status();
        debug!(url, status = status.as_u16(), "response");
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RepoError::request(url, status.as_u16(), &body));
        }
        Ok(resp)
    }

    async fn get_listing<T: DeserializeOwned>(
        &self,
        url: &str,
        auth: Option<&Credentials>,
    ) -> Result<Vec<T>, RepoError> {
        let resp = self
            .send(Self::with_auth(self.client.get(url), auth), url)
            .await?;
        let body = resp.text().await?;
        let listing: EnvelopeListing<T> =
            serde_json::from_str(&body).map_err(|e| RepoError::parse(url, e.to_string()))?;
        Ok(listing.envelopes)
    }

    async fn get_single<T: DeserializeOwned>(
        &self,
        envelope_url: &str,
        fields: &str,
        auth: Option<&Credentials>,
    ) -> Result<T, RepoError> {
        let url = envelope_projection_url(envelope_url, fields)?;
        self.get_listing(url.as_str(), auth)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::parse(url.as_str(), format!("no envelope {envelope_url}")))
    }

    async fn call_workitem(
        &self,
        envelope_url: &str,
        method: &str,
        workitem_id: &str,
        auth: &Credentials,
    ) -> Result<(), RepoError> {
        let url = workitem_url(envelope_url, method, workitem_id, method == "completeWorkitem")?;
        info!(envelope = envelope_url, workitem_id, method, "workflow call");
        self.send(Self::with_auth(self.client.get(url.as_str()), Some(auth)), url.as_str())
            .await?;
        Ok(())
    }
}

/// Interpret a `manage_addEnvelope` response: 201 with an empty error list
/// and one envelope is the only success.
pub fn created_envelope_url(url: &str, status: u16, body: &str) -> Result<String, RepoError> {
    if status != StatusCode::CREATED.as_u16() {
        return Err(RepoError::Clone {
            errors: vec![format!("http response {status}")],
        });
    }
    let listing: EnvelopeListing<EnvelopeRef> =
        serde_json::from_str(body).map_err(|e| RepoError::parse(url, e.to_string()))?;
    let errors = listing.error_messages();
    if !errors.is_empty() {
        return Err(RepoError::Clone { errors });
    }
    listing
        .envelopes
        .into_iter()
        .next()
        .map(|e| e.url)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| RepoError::parse(url, "no envelope in creation response"))
}

#[async_trait]
impl Repository for RepositoryClient {
    async fn query_envelopes(
        &self,
        repo: &str,
        query: &EnvelopeQuery,
        auth: Option<&Credentials>,
    ) -> Result<Vec<Envelope>, RepoError> {
        let root = self.api_root(repo, auth)?;
        let url = if query.fields.is_empty() {
            EnvelopeQuery {
                fields: self.settings.envelope_fields.clone(),
                ..query.clone()
            }
            .to_url(&root)?
        } else {
            query.to_url(&root)?
        };

        info!(url = %url, "querying envelopes");
        let envelopes: Vec<Envelope> = self.get_listing(url.as_str(), auth).await?;
        let fetched = envelopes.len();
        let envelopes = select_envelopes(envelopes, query.reporting_year, query.latest);
        info!(fetched, selected = envelopes.len(), "envelopes received");
        Ok(envelopes)
    }

    async fn get_envelope(
        &self,
        envelope_url: &str,
        auth: Option<&Credentials>,
    ) -> Result<Envelope, RepoError> {
        let fields = self.settings.fields_param();
        self.get_single(envelope_url, &fields, auth).await
    }

    async fn get_history(
        &self,
        envelope_url: &str,
        auth: Option<&Credentials>,
    ) -> Result<EnvelopeHistory, RepoError> {
        self.get_single(envelope_url, HISTORY_FIELDS, auth).await
    }

    async fn get_feedbacks(
        &self,
        envelope_url: &str,
        auth: Option<&Credentials>,
    ) -> Result<EnvelopeFeedbacks, RepoError> {
        self.get_single(envelope_url, FEEDBACK_FIELDS, auth).await
    }

    async fn fetch_attachment(
        &self,
        attachment_url: &str,
        auth: Option<&Credentials>,
    ) -> Result<Vec<u8>, RepoError> {
        let resp = self
            .send(Self::with_auth(self.client.get(attachment_url), auth), attachment_url)
            .await?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn create_envelope(
        &self,
        repo: &str,
        envelope: &NewEnvelope,
        auth: &Credentials,
    ) -> Result<String, RepoError> {
        let obligation = self.settings.obligation(envelope.obligation)?;
        let root = self.api_root(repo, Some(auth))?;
        let url = add_envelope_url(&root, &envelope.country_code, &obligation.path);

        info!(url = %url, title = %envelope.title, "creating envelope");
        let resp = Self::with_auth(self.client.post(&url), Some(auth))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&envelope.form_fields())
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        created_envelope_url(&url, status, &body)
    }

    async fn activate_workitem(
        &self,
        envelope_url: &str,
        workitem_id: &str,
        auth: &Credentials,
    ) -> Result<(), RepoError> {
        self.call_workitem(envelope_url, "activateWorkitem", workitem_id, auth)
            .await
    }

    async fn complete_workitem(
        &self,
        envelope_url: &str,
        workitem_id: &str,
        auth: &Credentials,
    ) -> Result<(), RepoError> {
        self.call_workitem(envelope_url, "completeWorkitem", workitem_id, auth)
            .await
    }

    async fn download_file(
        &self,
        file_url: &str,
        dest: &Path,
        auth: Option<&Credentials>,
    ) -> Result<u64, RepoError> {
        let mut resp = self
            .send(Self::with_auth(self.client.get(file_url), auth), file_url)
            .await?;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        debug!(url = file_url, bytes = written, "downloaded");
        Ok(written)
    }

    async fn upload_file(
        &self,
        envelope_url: &str,
        file_name: &str,
        local: &Path,
        auth: &Credentials,
    ) -> Result<(), RepoError> {
        let upload_err = |reason: String| RepoError::Upload {
            file: file_name.to_string(),
            reason,
        };
        let data = tokio::fs::read(local)
            .await
            .map_err(|e| upload_err(e.to_string()))?;
        let size = data.len();
        let form = Form::new().part("file", Part::bytes(data).file_name(file_name.to_string()));
        let url = format!("{}/manage_addDocument", envelope_url.trim_end_matches('/'));

        let resp = Self::with_auth(self.client.post(&url), Some(auth))
            .multipart(form)
            .send()
            .await
            .map_err(|e| upload_err(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(upload_err(format!("http response {}", status.as_u16())));
        }
        info!(envelope = envelope_url, file = file_name, bytes = size, "uploaded");
        Ok(())
    }

    async fn delete_envelope(&self, envelope_url: &str, auth: &Credentials) -> Result<(), RepoError> {
        let (parent, code) = split_envelope_url(envelope_url);
        let form = [
            ("ids:list", code.as_str()),
            ("manage_delObjects:method", "Delete"),
        ];
        info!(envelope = envelope_url, "deleting envelope");
        self.send(
            Self::with_auth(self.client.post(&parent), Some(auth)).form(&form),
            &parent,
        )
        .await?;
        Ok(())
    }
}
