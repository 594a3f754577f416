//! Immutable configuration tables, loaded once at start-up and passed by
//! reference to whatever needs them.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Lookup failures against the configuration tables.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("unknown repository {0:?}")]
    UnknownRepository(String),
    #[error("unknown obligation number {0}")]
    UnknownObligation(u32),
    #[error("namespace prefix {0:?} is not in the standard namespace table")]
    UnknownNamespace(String),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("reading settings file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("parsing settings file {path}: {source}")]
    Json {
        path: std::path::PathBuf,
        source: serde_json::Error,
    },
}

/// A reporting obligation: its code, its ROD number and the sub-path of the
/// country collection that holds its envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    pub code: String,
    pub number: u32,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Repository name (`CDR`, `CDRTEST`, ...) to host, or to a root URL
    /// with an explicit scheme that the HTTP client uses unchanged.
    pub repositories: BTreeMap<String, String>,
    pub obligations: Vec<Obligation>,
    /// Canonical prefix to namespace URI.
    pub namespaces: BTreeMap<String, String>,
    /// Field projection requested for envelope queries.
    pub envelope_fields: Vec<String>,
    /// Feature type name to selection path, used by `diff-ids`.
    pub features: BTreeMap<String, String>,
    /// Use https even for anonymous requests.
    pub force_secure: bool,
}

const REPOSITORIES: &[(&str, &str)] = &[
    ("CDR", "cdr.eionet.europa.eu"),
    ("BDR", "bdr.eionet.europa.eu"),
    ("CDRTEST", "cdrtest.eionet.europa.eu"),
    ("CDRSANDBOX", "cdrsandbox.eionet.europa.eu"),
];

const OBLIGATIONS: &[(&str, u32, &str)] = &[
    ("aqd:b", 670, "eu/aqd/b"),
    ("aqd:c", 671, "eu/aqd/c"),
    ("aqd:d", 672, "eu/aqd/d"),
    ("aqd:e1a", 673, "eu/aqd/e1a"),
    ("aqd:g", 679, "eu/aqd/g"),
    ("aqd:h", 680, "eu/aqd/h"),
    ("aqd:i", 681, "eu/aqd/i"),
    ("aqd:j", 682, "eu/aqd/j"),
    ("aqd:k", 683, "eu/aqd/k"),
    ("aqd:b_pre", 693, "eu/aqd/b_preliminary"),
    ("aqd:c_pre", 694, "eu/aqd/c_preliminary"),
];

const NAMESPACES: &[(&str, &str)] = &[
    ("aqd", "http://dd.eionet.europa.eu/schemaset/id2011850eu-1.0"),
    ("am", "http://inspire.ec.europa.eu/schemas/am/3.0"),
    ("base", "http://inspire.ec.europa.eu/schemas/base/3.3"),
    ("base2", "http://inspire.ec.europa.eu/schemas/base2/1.0"),
    ("ef", "http://inspire.ec.europa.eu/schemas/ef/3.0"),
    ("ompr", "http://inspire.ec.europa.eu/schemas/ompr/2.0"),
    ("gml", "http://www.opengis.net/gml/3.2"),
    ("gmd", "http://www.isotc211.org/2005/gmd"),
    ("gco", "http://www.isotc211.org/2005/gco"),
    ("om", "http://www.opengis.net/om/2.0"),
    ("sam", "http://www.opengis.net/sampling/2.0"),
    ("sams", "http://www.opengis.net/samplingSpatial/2.0"),
    ("swe", "http://www.opengis.net/swe/2.0"),
    ("xlink", "http://www.w3.org/1999/xlink"),
    ("xsi", "http://www.w3.org/2001/XMLSchema-instance"),
];

const ENVELOPE_FIELDS: &[&str] = &[
    "url",
    "title",
    "description",
    "countryCode",
    "isReleased",
    "reportingDate",
    "modifiedDate",
    "periodStartYear",
    "periodEndYear",
    "periodDescription",
    "isBlockedByQCError",
    "status",
    "statusDate",
    "creator",
    "hasUnknownQC",
    "files",
    "obligations",
];

const FEATURES: &[(&str, &str)] = &[
    ("AQD_Network", "//aqd:AQD_Network/ef:inspireId/base:Identifier/base:localId"),
    ("AQD_Station", "//aqd:AQD_Station/ef:inspireId/base:Identifier/base:localId"),
    ("AQD_SamplingPoint", "//aqd:AQD_SamplingPoint/ef:inspireId/base:Identifier/base:localId"),
    ("AQD_Sample", "//aqd:AQD_Sample/aqd:inspireId/base:Identifier/base:localId"),
    ("AQD_SamplingPointProcess", "//aqd:AQD_SamplingPointProcess/ompr:inspireId/base:Identifier/base:localId"),
    ("AQD_Zone", "//aqd:AQD_Zone/am:inspireId/base:Identifier/base:localId"),
    ("AQD_AssessmentRegime", "//aqd:AQD_AssessmentRegime/aqd:inspireId/base:Identifier/base:localId"),
    ("AQD_Attainment", "//aqd:AQD_Attainment/aqd:inspireId/base:Identifier/base:localId"),
];

impl Default for Settings {
    fn default() -> Self {
        Self {
            repositories: REPOSITORIES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            obligations: OBLIGATIONS
                .iter()
                .map(|(code, number, path)| Obligation {
                    code: code.to_string(),
                    number: *number,
                    path: path.to_string(),
                })
                .collect(),
            namespaces: NAMESPACES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            envelope_fields: ENVELOPE_FIELDS.iter().map(|f| f.to_string()).collect(),
            features: FEATURES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            force_secure: true,
        }
    }
}

impl Settings {
    /// Built-in tables, overlaid with the JSON file at `path` when given.
    /// Keys missing from the file keep their built-in value.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&raw).map_err(|source| SettingsError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        info!(path = %path.display(), repositories = settings.repositories.len(), "loaded settings");
        Ok(settings)
    }

    /// Host name of a repository instance.
    pub fn repository_host(&self, repo: &str) -> Result<&str, MappingError> {
        self.repositories
            .get(&repo.to_ascii_uppercase())
            .map(String::as_str)
            .ok_or_else(|| MappingError::UnknownRepository(repo.to_string()))
    }

    /// Obligation entry for a ROD obligation number.
    pub fn obligation(&self, number: u32) -> Result<&Obligation, MappingError> {
        self.obligations
            .iter()
            .find(|o| o.number == number)
            .ok_or(MappingError::UnknownObligation(number))
    }

    /// Standard URI bound to a canonical namespace prefix.
    pub fn namespace(&self, prefix: &str) -> Result<&str, MappingError> {
        self.namespaces
            .get(prefix)
            .map(String::as_str)
            .ok_or_else(|| MappingError::UnknownNamespace(prefix.to_string()))
    }

    /// The envelope field projection as the comma-joined query value.
    pub fn fields_param(&self) -> String {
        self.envelope_fields.join(",")
    }
}
