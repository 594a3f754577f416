//! Content extraction: QA error tables from HTML feedback attachments and
//! feature identifiers from XML reporting documents.

pub mod diff;
pub mod error;
pub mod feedback;
pub mod identifiers;

pub use diff::{FeatureDiff, diff_identifier_sets};
pub use error::ExtractError;
pub use feedback::{BulletTableExtractor, ErrorRecord, ErrorTableExtractor, extract_error_rows};
pub use identifiers::{IdentifierSet, SelectionPath, extract_identifiers};
