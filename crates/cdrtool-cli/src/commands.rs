//! One function per subcommand. Each wires arguments to the workflow crate
//! and writes the resulting rows.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use anyhow::Context;
use cdrtool_client::{Repository, RepositoryClient};
use cdrtool_core::select::filter_modified_after;
use cdrtool_core::wire::format_wire_date;
use cdrtool_core::{Credentials, Envelope, EnvelopeQuery, Settings};
use cdrtool_extract::{
    BulletTableExtractor, FeatureDiff, diff_identifier_sets, extract_identifiers,
};
use cdrtool_workflow::{
    CloneTarget, QaPolicy, activate_qa, clone_envelopes, collect_feedback_errors,
    delete_envelopes, query_countries,
};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{
    ActivateQaArgs, BatchDeleteArgs, CloneArgs, DeleteArgs, DiffIdsArgs, EnvelopeQaArgs,
    ListFilesArgs, Selection,
};
use crate::output::{Sink, read_column, write_rows};

const SOURCE_REPO: &str = "CDR";
const TEST_REPO: &str = "CDRTEST";

fn query_for(selection: &Selection) -> EnvelopeQuery {
    let mut query = EnvelopeQuery::new(selection.obligation);
    query.is_released = Some(!selection.draft);
    query.reporting_year = Some(selection.year);
    query.latest = !selection.all;
    query
}

fn wire_date(ts: Option<DateTime<Utc>>) -> String {
    ts.as_ref().map(format_wire_date).unwrap_or_default()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct FileRow {
    country: String,
    reporting_year: Option<i32>,
    envelope: String,
    status: String,
    status_date: String,
    file_url: String,
    content_type: String,
    upload_date: String,
}

fn file_rows(envelopes: &[Envelope]) -> Vec<FileRow> {
    envelopes
        .iter()
        .flat_map(|env| {
            env.files.iter().map(move |file| FileRow {
                country: env.country_code.clone(),
                reporting_year: env.period_start_year,
                envelope: env.url.clone(),
                status: env.status.clone(),
                status_date: wire_date(env.status_date),
                file_url: file.url.clone(),
                content_type: file.content_type.clone(),
                upload_date: wire_date(file.upload_date),
            })
        })
        .collect()
}

pub async fn list_files(
    client: &RepositoryClient,
    args: &ListFilesArgs,
    auth: Option<&Credentials>,
) -> anyhow::Result<()> {
    let query = query_for(&args.selection);
    let envelopes = query_countries(client, &args.repo, &query, &args.selection.countries, auth)
        .await
        .context("querying envelopes")?;
    info!(count = envelopes.len(), "found envelopes");
    let rows = file_rows(&envelopes);
    write_rows(&rows, &Sink::resolve(args.out.as_deref(), Local::now()), b',')
}

pub async fn clone_cdrtest(
    client: &RepositoryClient,
    args: &CloneArgs,
    auth: &Credentials,
) -> anyhow::Result<()> {
    let query = query_for(&args.selection);
    info!(
        obligation = args.selection.obligation,
        year = args.selection.year,
        countries = ?args.selection.countries,
        "extracting envelope metadata from CDR"
    );
    let envelopes = query_countries(client, SOURCE_REPO, &query, &args.selection.countries, None)
        .await
        .context("querying CDR envelopes")?;
    info!(count = envelopes.len(), "found envelopes");
    if envelopes.is_empty() {
        return Ok(());
    }

    let target = CloneTarget {
        repo: TEST_REPO,
        obligation: args.selection.obligation,
        auth,
    };
    let report = clone_envelopes(client, &envelopes, &target).await;
    if report.failed_uploads > 0 {
        warn!(count = report.failed_uploads, "some files were not copied");
    }
    write_rows(
        &report.results,
        &Sink::resolve(args.out.as_deref(), Local::now()),
        b',',
    )
}

/// Ask on stderr, read the answer from stdin. Anything but y/yes declines.
fn confirm(question: &str) -> bool {
    eprint!("{question} [y/N] ");
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

async fn delete_listed<R: Repository + ?Sized>(
    repo: &R,
    urls: &[String],
    auth: &Credentials,
    yes: bool,
) -> anyhow::Result<()> {
    let total = urls.len();
    let report = delete_envelopes(repo, urls, auth, |index, url| {
        yes || confirm(&format!("Delete envelope {} of {total} {url}?", index + 1))
    })
    .await;
    info!(
        deleted = report.deleted.len(),
        declined = report.declined.len(),
        failed = report.failures.len(),
        "deletion finished"
    );
    Ok(())
}

pub async fn delete_from_file(
    client: &RepositoryClient,
    args: &DeleteArgs,
    auth: &Credentials,
) -> anyhow::Result<()> {
    let urls = read_column(&args.file, &args.field)?;
    info!(file = %args.file.display(), count = urls.len(), "found envelopes");
    delete_listed(client, &urls, auth, args.yes).await
}

/// Only draft CDRTEST envelopes are candidates for batch deletion.
fn batch_delete_query(args: &BatchDeleteArgs) -> EnvelopeQuery {
    let mut query = EnvelopeQuery::new(args.obligation);
    query.is_released = Some(false);
    query.reporting_year = Some(args.year);
    query
}

pub async fn batch_delete(
    client: &RepositoryClient,
    args: &BatchDeleteArgs,
    auth: &Credentials,
) -> anyhow::Result<()> {
    let query = batch_delete_query(args);
    let mut envelopes = query_countries(client, TEST_REPO, &query, &args.countries, Some(auth))
        .await
        .context("querying CDRTEST envelopes")?;
    info!(count = envelopes.len(), "found envelopes");

    if let Some(cutoff) = args.modified_after {
        envelopes = filter_modified_after(envelopes, cutoff);
        info!(count = envelopes.len(), after = %cutoff, "filtered by modification date");
    }
    for env in &envelopes {
        info!(
            country = %env.country_code,
            year = ?env.period_start_year,
            modified = %wire_date(env.status_date),
            url = %env.url,
            "candidate"
        );
    }
    let urls: Vec<String> = envelopes.into_iter().map(|e| e.url).collect();
    delete_listed(client, &urls, auth, args.yes).await
}

pub async fn envelope_qa(
    client: &RepositoryClient,
    args: &EnvelopeQaArgs,
    auth: Option<&Credentials>,
) -> anyhow::Result<()> {
    let urls = read_column(&args.file, &args.field)?;
    let report = collect_feedback_errors(client, &BulletTableExtractor, &urls, auth).await;
    info!(
        rows = report.rows.len(),
        without_feedback = report.without_feedback.len(),
        failed = report.failures.len(),
        "feedback collected"
    );
    write_rows(
        &report.rows,
        &Sink::resolve(args.out.as_deref(), Local::now()),
        b';',
    )
}

pub async fn activate(
    client: &RepositoryClient,
    args: &ActivateQaArgs,
    auth: &Credentials,
) -> anyhow::Result<()> {
    let urls = read_column(&args.file, &args.field)?;
    let policy = QaPolicy {
        max_activations: args.max_activations,
        qa_after: args.qa_after,
    };
    let report = activate_qa(client, &urls, &policy, auth).await;
    if !report.untouched.is_empty() {
        info!(
            remaining = report.untouched.len(),
            "activation cap reached; run again later for the remaining envelopes"
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DiffRow<'a> {
    feature: &'a str,
    side: &'static str,
    identifier: &'a str,
}

fn diff_rows(diffs: &[FeatureDiff]) -> Vec<DiffRow<'_>> {
    diffs
        .iter()
        .flat_map(|d| {
            let left = d.left_only.iter().map(|id| DiffRow {
                feature: &d.feature,
                side: "left",
                identifier: id,
            });
            let right = d.right_only.iter().map(|id| DiffRow {
                feature: &d.feature,
                side: "right",
                identifier: id,
            });
            left.chain(right)
        })
        .collect()
}

fn print_diff(diffs: &[FeatureDiff]) {
    for d in diffs {
        let verdict = if d.is_complete_match() { "match" } else { "DIFFERENT" };
        println!(
            "{}: left {} right {} {verdict}",
            d.feature, d.left_count, d.right_count
        );
        if !d.left_only.is_empty() {
            println!("  only in left:  {}", d.left_only.join(", "));
        }
        if !d.right_only.is_empty() {
            println!("  only in right: {}", d.right_only.join(", "));
        }
    }
}

pub fn diff_ids(settings: &Settings, args: &DiffIdsArgs) -> anyhow::Result<()> {
    let features: BTreeMap<String, String> = match &args.features {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => settings.features.clone(),
    };

    let read = |path: &std::path::Path| -> anyhow::Result<_> {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        extract_identifiers(&bytes, &features, settings)
            .with_context(|| format!("extracting identifiers from {}", path.display()))
    };
    let left = read(args.left.as_path())?;
    let right = read(args.right.as_path())?;

    let diffs = diff_identifier_sets(&left, &right);
    print_diff(&diffs);

    if let Some(out) = args.out.as_deref() {
        write_rows(&diff_rows(&diffs), &Sink::resolve(Some(out), Local::now()), b',')?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdrtool_core::EnvelopeFile;

    #[test]
    fn one_file_row_per_file() {
        let env = Envelope {
            url: "https://cdr/it/env1".into(),
            country_code: "IT".into(),
            period_start_year: Some(2019),
            status: "Released".into(),
            files: vec![
                EnvelopeFile {
                    url: "https://cdr/it/env1/a.xml".into(),
                    content_type: "text/xml".into(),
                    ..EnvelopeFile::default()
                },
                EnvelopeFile {
                    url: "https://cdr/it/env1/b.xml".into(),
                    ..EnvelopeFile::default()
                },
            ],
            ..Envelope::default()
        };
        let rows = file_rows(&[env, Envelope::default()]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].file_url, "https://cdr/it/env1/a.xml");
        assert_eq!(rows[0].status_date, "");
        assert_eq!(rows[1].envelope, "https://cdr/it/env1");
    }

    #[test]
    fn query_follows_selection_flags() {
        let selection = Selection {
            obligation: 680,
            year: 2019,
            countries: vec![],
            all: false,
            draft: true,
        };
        let query = query_for(&selection);
        assert_eq!(query.is_released, Some(false));
        assert_eq!(query.reporting_year, Some(2019));
        assert!(query.latest);
    }

    #[test]
    fn batch_delete_queries_drafts_only() {
        let args = BatchDeleteArgs {
            obligation: 680,
            year: 2019,
            countries: vec!["IT".into()],
            modified_after: None,
            yes: true,
        };
        let query = batch_delete_query(&args);
        assert_eq!(query.is_released, Some(false));
        assert_eq!(query.reporting_year, Some(2019));
        let url = query.to_url("https://cdrtest.eionet.europa.eu").unwrap();
        assert!(url.query_pairs().any(|(k, v)| k == "isReleased" && v == "0"));
    }

    #[test]
    fn diff_rows_list_both_sides() {
        let diffs = vec![FeatureDiff {
            feature: "AQD_Station".into(),
            left_count: 2,
            right_count: 2,
            left_only: vec!["1".into()],
            right_only: vec!["3".into()],
        }];
        let rows = diff_rows(&diffs);
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].side, rows[0].identifier), ("left", "1"));
        assert_eq!((rows[1].side, rows[1].identifier), ("right", "3"));
    }

    #[test]
    fn diff_ids_writes_differences() {
        let dir = tempfile::tempdir().unwrap();
        let doc = |ids: &[&str]| {
            let members: String = ids
                .iter()
                .map(|id| {
                    format!(
                        "<aqd:AQD_Zone><am:inspireId><base:Identifier><base:localId>{id}</base:localId>\
                         </base:Identifier></am:inspireId></aqd:AQD_Zone>"
                    )
                })
                .collect();
            format!(
                r#"<root xmlns:aqd="http://dd.eionet.europa.eu/schemaset/id2011850eu-1.0"
                    xmlns:am="http://inspire.ec.europa.eu/schemas/am/3.0"
                    xmlns:base="http://inspire.ec.europa.eu/schemas/base/3.3">{members}</root>"#
            )
        };
        let left = dir.path().join("left.xml");
        let right = dir.path().join("right.xml");
        let out = dir.path().join("diff.csv");
        std::fs::write(&left, doc(&["Z1", "Z2"])).unwrap();
        std::fs::write(&right, doc(&["Z2", "Z3"])).unwrap();

        let args = DiffIdsArgs {
            left,
            right,
            out: Some(out.to_string_lossy().into_owned()),
            features: None,
        };
        diff_ids(&Settings::default(), &args).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            text,
            "Feature,Side,Identifier\nAQD_Zone,left,Z1\nAQD_Zone,right,Z3\n"
        );
    }
}
