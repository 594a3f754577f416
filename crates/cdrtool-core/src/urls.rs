//! URL construction for the repository REST and RPC endpoints.

use chrono::NaiveDate;
use url::Url;

use crate::credentials::Credentials;
use crate::settings::{MappingError, Settings};

/// Path of the envelope search endpoint, relative to a repository root.
pub const ENVELOPES_API: &str = "/api/envelopes";

/// Projection used when reading an envelope's workflow history.
pub const HISTORY_FIELDS: &str = "history,countryCode,periodStartYear,obligations";

/// Projection used when reading an envelope's feedback items.
pub const FEEDBACK_FIELDS: &str = "feedbacks,countryCode,periodStartYear,obligations";

/// Root URL of a repository host.
///
/// The scheme is https whenever credentials are given or `force_secure` is
/// set, so a password is never sent over plain http. Credentials, when
/// present, are embedded in the authority.
pub fn base_url_for_host(host: &str, credentials: Option<&Credentials>, force_secure: bool) -> String {
    let scheme = if force_secure || credentials.is_some() {
        "https"
    } else {
        "http"
    };
    match credentials {
        Some(c) => format!("{scheme}://{}:{}@{host}", c.user(), c.password()),
        None => format!("{scheme}://{host}"),
    }
}

impl Settings {
    /// Root URL of a named repository instance (`CDR`, `CDRTEST`, ...).
    pub fn base_url(
        &self,
        repo: &str,
        credentials: Option<&Credentials>,
        force_secure: bool,
    ) -> Result<String, MappingError> {
        let host = self.repository_host(repo)?;
        Ok(base_url_for_host(host, credentials, force_secure))
    }
}

/// `scheme://authority` of an envelope URL, i.e. the root of the repository
/// instance that hosts it.
pub fn extract_base_url(envelope_url: &str) -> Result<String, url::ParseError> {
    let url = Url::parse(envelope_url)?;
    let host = url.host_str().ok_or(url::ParseError::EmptyHost)?;
    Ok(match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    })
}

/// Split an envelope URL into its parent collection (with trailing slash)
/// and the envelope id, as needed by `manage_delObjects`.
pub fn split_envelope_url(envelope_url: &str) -> (String, String) {
    let trimmed = envelope_url.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, code)) => (format!("{parent}/"), code.to_string()),
        None => (String::new(), trimmed.to_string()),
    }
}

/// Filters for an envelope search.
///
/// `obligation`, `country_code`, `is_released` and `reporting_date_start`
/// become query parameters, and only when set. `reporting_year` and `latest`
/// are applied to the response by the envelope selector.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeQuery {
    pub obligation: u32,
    pub country_code: Option<String>,
    pub is_released: Option<bool>,
    pub reporting_date_start: Option<NaiveDate>,
    pub reporting_year: Option<i32>,
    pub latest: bool,
    pub fields: Vec<String>,
}

impl EnvelopeQuery {
    pub fn new(obligation: u32) -> Self {
        Self {
            obligation,
            ..Self::default()
        }
    }

    /// Build the search URL against a repository root.
    pub fn to_url(&self, base_url: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("{}{ENVELOPES_API}", base_url.trim_end_matches('/')))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("obligations", &self.obligation.to_string());
            if let Some(cc) = &self.country_code {
                query.append_pair("countryCode", cc);
            }
            if let Some(released) = self.is_released {
                query.append_pair("isReleased", if released { "1" } else { "0" });
            }
            if let Some(start) = self.reporting_date_start {
                query.append_pair("reportingDateStart", &start.format("%Y-%m-%d").to_string());
            }
            if !self.fields.is_empty() {
                query.append_pair("fields", &self.fields.join(","));
            }
        }
        Ok(url)
    }
}

/// URL selecting a single envelope by its own URL, with a field projection.
pub fn envelope_projection_url(envelope_url: &str, fields: &str) -> Result<Url, url::ParseError> {
    let base = extract_base_url(envelope_url)?;
    let mut url = Url::parse(&format!("{base}{ENVELOPES_API}"))?;
    url.query_pairs_mut()
        .append_pair("url", envelope_url)
        .append_pair("fields", fields);
    Ok(url)
}

/// `manage_addEnvelope` endpoint for a country/obligation collection.
pub fn add_envelope_url(base_url: &str, country_code: &str, obligation_path: &str) -> String {
    format!(
        "{}/{}/{}/manage_addEnvelope",
        base_url.trim_end_matches('/'),
        country_code.to_ascii_lowercase(),
        obligation_path.trim_matches('/')
    )
}

/// Workflow RPC endpoint (`activateWorkitem`, `completeWorkitem`) on an envelope.
pub fn workitem_url(
    envelope_url: &str,
    method: &str,
    workitem_id: &str,
    with_release_flag: bool,
) -> Result<Url, url::ParseError> {
    let envelope_url = envelope_url.trim_end_matches('/');
    let mut url = Url::parse(&format!("{envelope_url}/{method}"))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("workitem_id", workitem_id);
        if with_release_flag {
            query.append_pair("release_and_finish", "0");
        }
        query.append_pair("DestinationURL", envelope_url);
    }
    Ok(url)
}
