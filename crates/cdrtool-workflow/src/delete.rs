use cdrtool_client::Repository;
use cdrtool_core::Credentials;
use tracing::{info, warn};

use crate::EnvelopeFailure;

#[derive(Debug, Default)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    pub declined: Vec<String>,
    pub failures: Vec<EnvelopeFailure>,
}

/// Delete each envelope for which `confirm` returns true.
pub async fn delete_envelopes<R, F>(
    repo: &R,
    envelope_urls: &[String],
    auth: &Credentials,
    mut confirm: F,
) -> DeleteReport
where
    R: Repository + ?Sized,
    F: FnMut(usize, &str) -> bool,
{
    let mut report = DeleteReport::default();
    let total = envelope_urls.len();

    for (index, url) in envelope_urls.iter().enumerate() {
        if url.is_empty() {
            continue;
        }
        info!(index = index + 1, total, url = %url, "deleting envelope");
        if !confirm(index, url.as_str()) {
            report.declined.push(url.clone());
            continue;
        }
        match repo.delete_envelope(url, auth).await {
            Ok(()) => report.deleted.push(url.clone()),
            Err(e) => {
                warn!(url = %url, error = %e, "delete failed");
                report.failures.push(EnvelopeFailure::new(url, &e));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{Call, FakeRepository, creds};

    #[tokio::test]
    async fn deletes_only_confirmed_envelopes() {
        let urls: Vec<String> = vec!["https://t/a".into(), "https://t/b".into(), "https://t/c".into()];
        let repo = FakeRepository::default().failing("delete", "https://t/c");
        let report = delete_envelopes(&repo, &urls, &creds(), |i, _| i != 1).await;

        assert_eq!(report.deleted, vec!["https://t/a".to_string()]);
        assert_eq!(report.declined, vec!["https://t/b".to_string()]);
        assert_eq!(report.failures[0].url, "https://t/c");
        assert_eq!(
            repo.calls(),
            vec![
                Call::Delete("https://t/a".into()),
                Call::Delete("https://t/c".into())
            ]
        );
    }
}
