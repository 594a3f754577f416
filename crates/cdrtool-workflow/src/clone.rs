//! Copy envelopes, with their files, into another repository instance.

use cdrtool_client::{NewEnvelope, RepoError, Repository};
use cdrtool_core::{Credentials, Envelope, EnvelopeFile};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::EnvelopeFailure;

/// Provenance record for one cloned envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloneResult {
    #[serde(rename = "Obligation")]
    pub obligation: u32,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "ReportingYear")]
    pub reporting_year: Option<i32>,
    #[serde(rename = "CDREnvelope")]
    pub source_envelope_url: String,
    #[serde(rename = "CDRTESTEnvelope")]
    pub dest_envelope_url: String,
    /// Files attempted, whether or not each upload succeeded.
    #[serde(rename = "FileCount")]
    pub file_count: usize,
}

/// Where clones are created.
#[derive(Debug, Clone, Copy)]
pub struct CloneTarget<'a> {
    pub repo: &'a str,
    pub obligation: u32,
    pub auth: &'a Credentials,
}

#[derive(Debug, Default)]
pub struct CloneReport {
    pub results: Vec<CloneResult>,
    /// Source envelopes skipped for having no files.
    pub skipped: Vec<String>,
    pub failures: Vec<EnvelopeFailure>,
    pub failed_uploads: usize,
}

fn clone_title(source: &Envelope) -> String {
    format!("{} [copy of {}]", source.title, source.url)
}

/// Clone every envelope in order. Creation or activation failures abandon
/// that envelope only; file transfer failures abandon that file only.
pub async fn clone_envelopes<R: Repository + ?Sized>(
    repo: &R,
    envelopes: &[Envelope],
    target: &CloneTarget<'_>,
) -> CloneReport {
    let mut report = CloneReport::default();
    let total = envelopes.len();

    for (index, source) in envelopes.iter().enumerate() {
        info!(index = index + 1, total, url = %source.url, "processing envelope");
        if source.files.is_empty() {
            info!(url = %source.url, "no files in the envelope, skipping");
            report.skipped.push(source.url.clone());
            continue;
        }

        // 1. Create the destination envelope. Only title and year are
        // carried over; the remaining form fields stay empty.
        let new_envelope = NewEnvelope {
            country_code: source.country_code.to_lowercase(),
            obligation: target.obligation,
            title: clone_title(source),
            year: source.period_start_year,
            ..NewEnvelope::default()
        };
        let dest = match repo.create_envelope(target.repo, &new_envelope, target.auth).await {
            Ok(url) => url,
            Err(e) => {
                warn!(url = %source.url, error = %e, "envelope creation failed");
                report.failures.push(EnvelopeFailure::new(&source.url, &e));
                continue;
            }
        };
        info!(source = %source.url, dest = %dest, "created envelope");

        let mut result = CloneResult {
            obligation: target.obligation,
            country: source.country_code.clone(),
            reporting_year: source.period_start_year,
            source_envelope_url: source.url.clone(),
            dest_envelope_url: dest.clone(),
            file_count: 0,
        };

        // 2. Activate it so files can be added. The envelope exists either
        // way, so a failure still yields a row pointing at it.
        if let Err(e) = repo.activate_workitem(&dest, "0", target.auth).await {
            warn!(url = %dest, error = %e, "activation failed, files not copied");
            report.failures.push(EnvelopeFailure::new(&dest, &e));
            report.results.push(result);
            continue;
        }

        // 3. Copy files in their original order.
        let files = source.files.len();
        for (file_index, file) in source.files.iter().enumerate() {
            info!(index = file_index + 1, total = files, file = file.file_name(), "copying file");
            if let Err(e) = transfer_file(repo, file, &dest, target.auth).await {
                warn!(file = %file.url, error = %e, "file copy failed");
                report.failed_uploads += 1;
            }
        }
        result.file_count = files;
        report.results.push(result);
    }

    info!(
        cloned = report.results.len(),
        skipped = report.skipped.len(),
        failed = report.failures.len(),
        "clone finished"
    );
    report
}

/// Download one file to a temporary location and upload it to `dest`.
/// The temporary file is removed when this returns, on every path.
async fn transfer_file<R: Repository + ?Sized>(
    repo: &R,
    file: &EnvelopeFile,
    dest: &str,
    auth: &Credentials,
) -> Result<(), RepoError> {
    let scratch = NamedTempFile::new()?;
    let bytes = repo.download_file(&file.url, scratch.path(), None).await?;
    debug!(file = %file.url, bytes, "downloaded");
    repo.upload_file(dest, file.file_name(), scratch.path(), auth)
        .await
        .map_err(|e| match e {
            RepoError::Upload { .. } => e,
            other => RepoError::Upload {
                file: file.file_name().to_string(),
                reason: other.to_string(),
            },
        })
}
