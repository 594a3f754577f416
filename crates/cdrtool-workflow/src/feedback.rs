//! Flatten QA feedback into one row per reported error.

use cdrtool_client::Repository;
use cdrtool_core::Credentials;
use cdrtool_extract::ErrorTableExtractor;
use serde::Serialize;
use tracing::{info, warn};

use crate::EnvelopeFailure;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FeedbackErrorRow {
    pub country: String,
    pub obligation_number: String,
    pub envelope: String,
    pub feedback_message: String,
    pub feedback_status: String,
    pub reporting_year: Option<i32>,
    /// Title of the feedback item.
    pub manual_feedback: String,
    pub posting_date: String,
    pub error_code: String,
    pub error_level: String,
    pub error_message: String,
}

#[derive(Debug, Default)]
pub struct FeedbackReport {
    pub rows: Vec<FeedbackErrorRow>,
    /// Envelopes with no feedback at all.
    pub without_feedback: Vec<String>,
    pub failures: Vec<EnvelopeFailure>,
}

pub async fn collect_feedback_errors<R, E>(
    repo: &R,
    extractor: &E,
    envelope_urls: &[String],
    auth: Option<&Credentials>,
) -> FeedbackReport
where
    R: Repository + ?Sized,
    E: ErrorTableExtractor + ?Sized,
{
    let mut report = FeedbackReport::default();
    let total = envelope_urls.len();

    for (index, url) in envelope_urls.iter().enumerate() {
        info!(index = index + 1, total, url = %url, "collecting feedback");
        let envelope = match repo.get_feedbacks(url, auth).await {
            Ok(f) => f,
            Err(e) => {
                warn!(url = %url, error = %e, "cannot read feedback");
                report.failures.push(EnvelopeFailure::new(url, &e));
                continue;
            }
        };
        let obligation = envelope.obligations.first().cloned().unwrap_or_default();
        if envelope.feedbacks.is_empty() {
            info!(
                obligation = %obligation,
                country = %envelope.country_code,
                year = ?envelope.period_start_year,
                "no feedback found"
            );
            report.without_feedback.push(url.clone());
            continue;
        }

        for feedback in &envelope.feedbacks {
            info!(title = %feedback.title, attachments = feedback.attachments.len(), "feedback");
            for attachment in &feedback.attachments {
                let body = match repo.fetch_attachment(&attachment.url, auth).await {
                    Ok(b) => b,
                    Err(e) => {
                        warn!(url = %attachment.url, error = %e, "cannot fetch attachment");
                        report.failures.push(EnvelopeFailure::new(&attachment.url, &e));
                        continue;
                    }
                };
                let errors = extractor.extract(&body);
                info!(url = %attachment.url, rows = errors.len(), "parsed attachment");
                report.rows.extend(errors.into_iter().map(|err| FeedbackErrorRow {
                    country: envelope.country_code.clone(),
                    obligation_number: obligation.clone(),
                    envelope: url.clone(),
                    feedback_message: feedback.feedback_message.clone(),
                    feedback_status: feedback.feedback_status.clone(),
                    reporting_year: envelope.period_start_year,
                    manual_feedback: feedback.title.clone(),
                    posting_date: feedback.posting_date.clone(),
                    error_code: err.code,
                    error_level: err.level,
                    error_message: err.message,
                }));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeRepository;
    use cdrtool_core::{Attachment, EnvelopeFeedbacks, Feedback};
    use cdrtool_extract::BulletTableExtractor;

    const REPORT: &str = r#"<table>
        <tr><td class="bullet"><div class="BLOCKER"><a>M7</a></div></td>
            <td><span class="largeText">Zone code missing</span></td></tr>
        <tr><td class="bullet"><div class="WARNING"><a>M9</a></div></td></tr>
    </table>"#;

    fn feedbacks(attachments: &[&str]) -> EnvelopeFeedbacks {
        EnvelopeFeedbacks {
            country_code: "IT".into(),
            period_start_year: Some(2019),
            obligations: vec!["680".into()],
            feedbacks: vec![Feedback {
                activity_id: "AutomaticQA".into(),
                title: "AutomaticQA result for: Data quality".into(),
                feedback_status: "BLOCKER".into(),
                feedback_message: "Blockers found".into(),
                posting_date: "2021-07-23T07:54:10Z".into(),
                attachments: attachments
                    .iter()
                    .map(|u| Attachment { url: u.to_string() })
                    .collect(),
            }],
        }
    }

    #[tokio::test]
    async fn one_row_per_error_record() {
        let urls = vec!["https://cdrtest/it/env1".to_string()];
        let repo = FakeRepository::default()
            .with_feedbacks(&urls[0], feedbacks(&["https://cdrtest/it/env1/fb/qa.html"]))
            .with_attachment("https://cdrtest/it/env1/fb/qa.html", REPORT);

        let report = collect_feedback_errors(&repo, &BulletTableExtractor, &urls, None).await;

        assert_eq!(report.rows.len(), 2);
        let first = &report.rows[0];
        assert_eq!(first.country, "IT");
        assert_eq!(first.obligation_number, "680");
        assert_eq!(first.envelope, urls[0]);
        assert_eq!(first.reporting_year, Some(2019));
        assert_eq!(first.manual_feedback, "AutomaticQA result for: Data quality");
        assert_eq!(first.error_code, "M7");
        assert_eq!(first.error_message, "Zone code missing");
        assert_eq!(report.rows[1].error_level, "WARNING");
        assert_eq!(report.rows[1].error_message, "");
    }

    #[tokio::test]
    async fn envelopes_without_feedback_or_failing_are_skipped() {
        let urls = vec![
            "https://cdrtest/it/none".to_string(),
            "https://cdrtest/it/broken".to_string(),
            "https://cdrtest/it/env1".to_string(),
        ];
        let mut empty = feedbacks(&[]);
        empty.feedbacks.clear();
        let repo = FakeRepository::default()
            .with_feedbacks(&urls[0], empty)
            .with_feedbacks(&urls[2], feedbacks(&["https://a/bad", "https://a/good"]))
            .with_attachment("https://a/good", REPORT)
            .failing("attachment", "https://a/bad");

        let report = collect_feedback_errors(&repo, &BulletTableExtractor, &urls, None).await;

        assert_eq!(report.without_feedback, vec![urls[0].clone()]);
        let failed: Vec<&str> = report.failures.iter().map(|f| f.url.as_str()).collect();
        assert_eq!(failed, vec!["https://cdrtest/it/broken", "https://a/bad"]);
        assert_eq!(report.rows.len(), 2);
    }
}
