use cdrtool_client::{RepoError, Repository};
use cdrtool_core::select::select_envelopes;
use cdrtool_core::{Credentials, Envelope, EnvelopeQuery};
use tracing::info;

/// Run `query` once per country code, concatenating results in request
/// order, then apply its year and latest-per-country selection to the whole.
/// An empty `countries` list means one query without a country filter.
///
/// The first failing query aborts the listing.
pub async fn query_countries<R: Repository + ?Sized>(
    repo: &R,
    repo_name: &str,
    query: &EnvelopeQuery,
    countries: &[String],
    auth: Option<&Credentials>,
) -> Result<Vec<Envelope>, RepoError> {
    let mut per_query = query.clone();
    per_query.reporting_year = None;
    per_query.latest = false;

    let mut envelopes = Vec::new();
    if countries.is_empty() {
        per_query.country_code = None;
        envelopes = repo.query_envelopes(repo_name, &per_query, auth).await?;
    } else {
        for country in countries {
            per_query.country_code = Some(country.clone());
            let found = repo.query_envelopes(repo_name, &per_query, auth).await?;
            info!(country = %country, count = found.len(), "queried envelopes");
            envelopes.extend(found);
        }
    }

    let selected = select_envelopes(envelopes, query.reporting_year, query.latest);
    info!(
        repo = repo_name,
        obligation = query.obligation,
        count = selected.len(),
        "envelopes selected"
    );
    Ok(selected)
}
