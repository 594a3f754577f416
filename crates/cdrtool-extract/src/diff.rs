use std::collections::BTreeSet;

use crate::IdentifierSet;

/// Comparison of one feature type across two documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureDiff {
    pub feature: String,
    pub left_count: usize,
    pub right_count: usize,
    /// Sorted identifiers present only on the left.
    pub left_only: Vec<String>,
    pub right_only: Vec<String>,
}

impl FeatureDiff {
    pub fn is_complete_match(&self) -> bool {
        self.left_only.is_empty() && self.right_only.is_empty()
    }
}

/// Per-feature set differences over the union of feature types, ordered by
/// feature name. Counts are the raw list lengths, duplicates included.
pub fn diff_identifier_sets(left: &IdentifierSet, right: &IdentifierSet) -> Vec<FeatureDiff> {
    let features: BTreeSet<&String> = left.keys().chain(right.keys()).collect();
    let empty = Vec::new();

    features
        .into_iter()
        .map(|feature| {
            let l = left.get(feature).unwrap_or(&empty);
            let r = right.get(feature).unwrap_or(&empty);
            let ls: BTreeSet<&String> = l.iter().collect();
            let rs: BTreeSet<&String> = r.iter().collect();
            FeatureDiff {
                feature: feature.clone(),
                left_count: l.len(),
                right_count: r.len(),
                left_only: ls.difference(&rs).map(|s| s.to_string()).collect(),
                right_only: rs.difference(&ls).map(|s| s.to_string()).collect(),
            }
        })
        .collect()
}
