//! Feature identifiers in XML reporting documents.
//!
//! A selection path is a small absolute XPath subset:
//!
//! ```text
//! //aqd:AQD_Station/ef:inspireId/base:Identifier/base:localId
//! //aqd:AQD_Zone/@gml:id
//! /gml:FeatureCollection/gml:featureMember/*/am:name/text()
//! ```
//!
//! Steps are joined by `/` (child) or `//` (descendant). Prefixes are the
//! canonical ones from the settings namespace table and are matched by URI,
//! so a document that binds the same URI to another prefix still matches.

use std::collections::BTreeMap;

use cdrtool_core::{MappingError, Settings};
use roxmltree::{Document, Node};
use tracing::{debug, warn};

use crate::ExtractError;

/// Feature type name to identifiers, in document order.
pub type IdentifierSet = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Name {
    prefix: Option<String>,
    local: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Test {
    AnyElement,
    Element(Name),
    Attribute(Name),
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: Test,
}

/// A parsed, not yet namespace-resolved, selection path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPath {
    steps: Vec<Step>,
}

impl SelectionPath {
    pub fn parse(path: &str) -> Result<Self, ExtractError> {
        let Some(mut rest) = path.strip_prefix('/') else {
            return Err(ExtractError::invalid_path(path, "path must start with '/'"));
        };
        let mut steps = Vec::new();
        loop {
            let axis = match rest.strip_prefix('/') {
                Some(r) => {
                    rest = r;
                    Axis::Descendant
                }
                None => Axis::Child,
            };
            let (raw, next) = match rest.find('/') {
                Some(i) => (&rest[..i], Some(&rest[i + 1..])),
                None => (rest, None),
            };
            if raw.is_empty() {
                return Err(ExtractError::invalid_path(path, "empty step"));
            }
            if let Some(last) = steps.last()
                && matches!(last, Step { test: Test::Attribute(_) | Test::Text, .. })
            {
                return Err(ExtractError::invalid_path(
                    path,
                    "attribute and text() steps must come last",
                ));
            }
            steps.push(Step {
                axis,
                test: parse_test(path, raw)?,
            });
            match next {
                Some(r) => rest = r,
                None => break,
            }
        }
        Ok(Self { steps })
    }

    /// Canonical prefixes used by the path, in order of appearance.
    pub fn prefixes(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for step in &self.steps {
            let name = match &step.test {
                Test::Element(n) | Test::Attribute(n) => n,
                _ => continue,
            };
            if let Some(p) = name.prefix.as_deref()
                && !out.contains(&p)
            {
                out.push(p);
            }
        }
        out
    }

    /// Bind every prefix to its standard namespace URI.
    fn resolve<'s>(&'s self, settings: &'s Settings) -> Result<Vec<Resolved<'s>>, MappingError> {
        let uri = |name: &'s Name| -> Result<Option<&'s str>, MappingError> {
            name.prefix.as_deref().map(|p| settings.namespace(p)).transpose()
        };
        self.steps
            .iter()
            .map(|step| {
                let test = match &step.test {
                    Test::AnyElement => ResolvedTest::AnyElement,
                    Test::Text => ResolvedTest::Text,
                    Test::Element(n) => ResolvedTest::Element(uri(n)?, &n.local),
                    Test::Attribute(n) => ResolvedTest::Attribute(uri(n)?, &n.local),
                };
                Ok(Resolved {
                    axis: step.axis,
                    test,
                })
            })
            .collect()
    }
}

fn parse_test(path: &str, raw: &str) -> Result<Test, ExtractError> {
    if raw == "*" {
        return Ok(Test::AnyElement);
    }
    if raw == "text()" {
        return Ok(Test::Text);
    }
    if let Some(attr) = raw.strip_prefix('@') {
        return Ok(Test::Attribute(parse_name(path, attr)?));
    }
    Ok(Test::Element(parse_name(path, raw)?))
}

fn parse_name(path: &str, raw: &str) -> Result<Name, ExtractError> {
    let valid = |s: &str| {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
    };
    let (prefix, local) = match raw.split_once(':') {
        Some((p, l)) => (Some(p), l),
        None => (None, raw),
    };
    if !valid(local) || prefix.is_some_and(|p| !valid(p)) {
        return Err(ExtractError::invalid_path(path, format!("bad name {raw:?}")));
    }
    Ok(Name {
        prefix: prefix.map(str::to_string),
        local: local.to_string(),
    })
}

struct Resolved<'s> {
    axis: Axis,
    test: ResolvedTest<'s>,
}

enum ResolvedTest<'s> {
    AnyElement,
    Element(Option<&'s str>, &'s str),
    Attribute(Option<&'s str>, &'s str),
    Text,
}

fn element_matches(node: &Node<'_, '_>, test: &ResolvedTest<'_>) -> bool {
    if !node.is_element() {
        return false;
    }
    match test {
        ResolvedTest::AnyElement => true,
        ResolvedTest::Element(ns, local) => {
            let tag = node.tag_name();
            tag.name() == *local && tag.namespace() == *ns
        }
        _ => false,
    }
}

/// Nodes reached from `context` along `axis`, in document order.
fn axis_nodes<'a, 'i>(context: &[Node<'a, 'i>], axis: Axis) -> Vec<Node<'a, 'i>> {
    let mut nodes: Vec<Node<'a, 'i>> = match axis {
        Axis::Child => context.iter().flat_map(|n| n.children()).collect(),
        Axis::Descendant => context
            .iter()
            .flat_map(|n| n.descendants().skip(1))
            .collect(),
    };
    // Overlapping context subtrees can reach a node twice.
    nodes.sort();
    nodes.dedup();
    nodes
}

fn evaluate(doc: &Document<'_>, steps: &[Resolved<'_>]) -> Vec<String> {
    let mut current = vec![doc.root()];
    let mut values = Vec::new();

    for (i, step) in steps.iter().enumerate() {
        let last = i + 1 == steps.len();
        match &step.test {
            ResolvedTest::Attribute(ns, local) => {
                // `/@a` reads the context elements; `//@a` also their descendants.
                let owners = match step.axis {
                    Axis::Child => current.clone(),
                    Axis::Descendant => {
                        let mut owners = current.clone();
                        owners.extend(axis_nodes(&current, Axis::Descendant));
                        owners.sort();
                        owners.dedup();
                        owners
                    }
                };
                for node in owners.iter().filter(|n| n.is_element()) {
                    let found = node
                        .attributes()
                        .find(|a| a.name() == *local && a.namespace() == *ns);
                    if let Some(attr) = found {
                        values.push(attr.value().to_string());
                    }
                }
            }
            ResolvedTest::Text => {
                values.extend(
                    axis_nodes(&current, step.axis)
                        .iter()
                        .filter(|n| n.is_text())
                        .filter_map(|n| n.text())
                        .map(str::to_string),
                );
            }
            test => {
                let next: Vec<Node<'_, '_>> = axis_nodes(&current, step.axis)
                    .into_iter()
                    .filter(|n| element_matches(n, test))
                    .collect();
                if last {
                    values.extend(next.iter().map(element_text));
                }
                current = next;
            }
        }
    }

    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn element_text(node: &Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// Select identifiers for every feature type in `features` (name to path).
///
/// A path using a prefix missing from the namespace table yields an empty
/// list for that feature and a warning; malformed input or paths fail.
pub fn extract_identifiers(
    xml: &[u8],
    features: &BTreeMap<String, String>,
    settings: &Settings,
) -> Result<IdentifierSet, ExtractError> {
    let text = std::str::from_utf8(xml)?;
    let doc = Document::parse(text)?;

    let mut out = IdentifierSet::new();
    for (feature, raw) in features {
        let path = SelectionPath::parse(raw)?;
        let ids = match path.resolve(settings) {
            Ok(steps) => evaluate(&doc, &steps),
            Err(MappingError::UnknownNamespace(prefix)) => {
                warn!(
                    feature = %feature,
                    prefix = %prefix,
                    "namespace prefix not in the standard table; feature yields no identifiers"
                );
                Vec::new()
            }
            Err(e) => {
                warn!(feature = %feature, error = %e, "cannot resolve selection path");
                Vec::new()
            }
        };
        debug!(feature = %feature, count = ids.len(), "extracted identifiers");
        out.insert(feature.clone(), ids);
    }
    Ok(out)
}
