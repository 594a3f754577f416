//! QA feedback error tables.
//!
//! The QA engine publishes its findings as HTML attachments with no
//! documented schema. The layout-dependent part lives behind
//! [`ErrorTableExtractor`] so a layout change only touches one impl.
//!
//! Current layout: each finding is a table row holding a
//! `<td class="bullet">` cell. Inside it, `<div class="LEVEL"><a>CODE</a></div>`
//! carries the level and code; an optional `<span class="largeText">` in any
//! cell of the row carries the message.

use std::collections::HashSet;

use scraper::node::Text;
use scraper::{ElementRef, Html};

/// One finding scraped from a QA attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub code: String,
    pub level: String,
    pub message: String,
}

pub trait ErrorTableExtractor: Send + Sync {
    fn extract(&self, html: &[u8]) -> Vec<ErrorRecord>;
}

/// Extractor for the `td.bullet` row layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct BulletTableExtractor;

impl ErrorTableExtractor for BulletTableExtractor {
    fn extract(&self, html: &[u8]) -> Vec<ErrorRecord> {
        let text = String::from_utf8_lossy(html);
        let document = Html::parse_document(&text);

        // Parents of bullet cells, each once, in document order.
        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        for node in document.tree.root().descendants() {
            let Some(cell) = ElementRef::wrap(node) else {
                continue;
            };
            if !is_bullet_cell(&cell) {
                continue;
            }
            if let Some(parent) = cell.parent().and_then(ElementRef::wrap)
                && seen.insert(parent.id())
            {
                rows.push(parent);
            }
        }

        rows.into_iter().filter_map(|row| parse_row(&row)).collect()
    }
}

/// Scrape error rows from a QA attachment using the current layout.
pub fn extract_error_rows(html: &[u8]) -> Vec<ErrorRecord> {
    BulletTableExtractor.extract(html)
}

fn parse_row(row: &ElementRef<'_>) -> Option<ErrorRecord> {
    let markers: Vec<ElementRef<'_>> = child_elements(row)
        .filter(is_bullet_cell)
        .flat_map(|cell| child_elements(&cell).filter(|e| e.value().name() == "div").collect::<Vec<_>>())
        .collect();

    let code = markers
        .iter()
        .flat_map(|div| child_elements(div).filter(|e| e.value().name() == "a").collect::<Vec<_>>())
        .find_map(|a| first_text(&a))?;

    let level = markers
        .iter()
        .find_map(|div| div.value().attr("class"))
        .unwrap_or_default();

    let message = child_elements(row)
        .filter(|e| e.value().name() == "td")
        .flat_map(|td| {
            child_elements(&td)
                .filter(|e| e.value().name() == "span" && e.value().attr("class") == Some("largeText"))
                .collect::<Vec<_>>()
        })
        .find_map(|span| first_text(&span))
        .unwrap_or_default();

    Some(ErrorRecord {
        code: strip_line_breaks(&code),
        level: strip_line_breaks(level),
        message: strip_line_breaks(&message),
    })
}

fn is_bullet_cell(el: &ElementRef<'_>) -> bool {
    el.value().name() == "td" && el.value().attr("class") == Some("bullet")
}

fn child_elements<'a>(el: &ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + use<'a> {
    el.children().filter_map(ElementRef::wrap)
}

/// First direct text child, the way an XPath `text()` step picks it.
fn first_text(el: &ElementRef<'_>) -> Option<String> {
    el.children()
        .filter_map(|n| n.value().as_text())
        .map(text_of)
        .next()
}

fn text_of(t: &Text) -> String {
    let s: &str = t;
    s.to_owned()
}

fn strip_line_breaks(s: &str) -> String {
    s.trim_matches(|c| c == '\r' || c == '\n').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const QA_REPORT: &str = r##"<html><body>
      <div class="feedbacktext">
        <table class="maintable hover">
          <tr>
            <td class="bullet"><div class="BLOCKER"><a href="#D1">D1</a></div></td>
            <td><span class="largeText">
Station identifiers are not unique
</span></td>
          </tr>
          <tr>
            <td class="bullet"><div class="WARNING"><a href="#D5">D5
</a></div></td>
            <td>no message here</td>
          </tr>
          <tr>
            <td class="bullet"><div class="INFO"></div></td>
            <td><span class="largeText">row without a code</span></td>
          </tr>
          <tr>
            <td class="other"><div class="BLOCKER"><a>X9</a></div></td>
          </tr>
        </table>
      </div>
    </body></html>"##;

    #[test]
    fn extracts_bullet_rows() {
        let rows = extract_error_rows(QA_REPORT.as_bytes());
        assert_eq!(
            rows,
            vec![
                ErrorRecord {
                    code: "D1".into(),
                    level: "BLOCKER".into(),
                    message: "Station identifiers are not unique".into(),
                },
                ErrorRecord {
                    code: "D5".into(),
                    level: "WARNING".into(),
                    message: String::new(),
                },
            ]
        );
    }

    #[test]
    fn tolerates_malformed_markup() {
        let html = r#"<table><tr><td class="bullet"><div class="ERROR"><a>E1</a>
            <td><span class="largeText">unclosed everything"#;
        let rows = extract_error_rows(html.as_bytes());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].code, "E1");
        assert_eq!(rows[0].level, "ERROR");
    }

    #[test]
    fn class_must_match_exactly() {
        let html = r#"<table><tr><td class="bullet big"><div class="ERROR"><a>E1</a></div></td></tr></table>"#;
        assert!(extract_error_rows(html.as_bytes()).is_empty());
    }

    #[test]
    fn non_html_input_yields_nothing() {
        assert!(extract_error_rows(b"plain text attachment").is_empty());
        assert!(extract_error_rows(&[0xff, 0xfe, 0x00]).is_empty());
    }
}
