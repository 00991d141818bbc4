//! Record-syntax conversion: the back-end's XML envelope in, one of
//! XML/MARC21/GRS-1/SUTRS out, per §4.7.
//!
//! `xmltree` holds a tiny DOM plus the subset-of-XPath evaluator the
//! per-database field specs are written against (see DESIGN.md for why this
//! is hand-rolled rather than pulled from a general XPath crate: nothing in
//! the retrieval pack reaches for one). `marc`, `grs1`, and `sutrs` each
//! render one output syntax from that tree.

mod grs1;
mod marc;
mod sutrs;
mod xmltree;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{DatabaseConfig, FieldSpec};
use crate::diagnostics::code;
use crate::error::{GatewayError, Result};

pub(crate) use marc::first_record as first_marc_record;
pub use xmltree::XmlNode;

/// The four record syntaxes the gateway advertises to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSyntax {
    Xml,
    Usmarc,
    Grs1,
    Sutrs,
}

impl fmt::Display for RecordSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordSyntax::Xml => "xml",
            RecordSyntax::Usmarc => "usmarc",
            RecordSyntax::Grs1 => "grs1",
            RecordSyntax::Sutrs => "sutrs",
        };
        f.write_str(s)
    }
}

impl RecordSyntax {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "xml" => Some(RecordSyntax::Xml),
            "usmarc" | "marc21" => Some(RecordSyntax::Usmarc),
            "grs1" | "grs-1" => Some(RecordSyntax::Grs1),
            "sutrs" => Some(RecordSyntax::Sutrs),
            _ => None,
        }
    }
}

/// A rendered record, ready to be wrapped into the outbound `Record` PDU.
pub enum RenderedRecord {
    Xml(String),
    Marc21(Vec<u8>),
    Grs1(String),
    Sutrs(String),
}

/// The syntaxes a database can currently produce: XML is always available as
/// a passthrough; the others need a configured field-mapping list.
pub fn supported_syntaxes(db: &DatabaseConfig) -> Vec<RecordSyntax> {
    let mut syntaxes: Vec<RecordSyntax> = std::iter::once(RecordSyntax::Xml)
        .chain(db.record.keys().copied().filter(|s| *s != RecordSyntax::Xml))
        .collect();
    syntaxes.sort();
    syntaxes.dedup();
    syntaxes
}

fn unsupported(db: &DatabaseConfig) -> GatewayError {
    let supported = supported_syntaxes(db)
        .iter()
        .map(RecordSyntax::to_string)
        .collect::<Vec<_>>()
        .join(",");
    GatewayError::protocol(code::RECORD_SYNTAX_NOT_SUPPORTED, supported)
}

/// Apply the `option.explicit_availability` patch: every MARC `952` field
/// missing a `$q` subfield gets an empty one added.
fn apply_explicit_availability(tree: &mut XmlNode) {
    tree.for_each_mut(&mut |node| {
        if node.local_name() != "datafield" || node.attr("tag") != Some("952") {
            return;
        }
        let has_q = node
            .children
            .iter()
            .any(|c| c.local_name() == "subfield" && c.attr("code") == Some("q"));
        if !has_q {
            let mut subfield = XmlNode::new("subfield");
            subfield.attrs.push(("code".to_string(), "q".to_string()));
            node.children.push(subfield);
        }
    });
}

/// Convert a back-end's `marcxml` record envelope into `syntax`, per the
/// database's field-mapping configuration.
///
/// `marcxml` is the already-extracted `/doc/str[@name='marcxml']` payload
/// (or the bare record XML for back-ends that don't wrap it); callers are
/// responsible for that extraction (see `session::fetch`).
pub fn convert(marcxml: &str, syntax: RecordSyntax, db: &DatabaseConfig) -> Result<RenderedRecord> {
    if syntax != RecordSyntax::Xml && !db.record.contains_key(&syntax) {
        return Err(unsupported(db));
    }

    let mut tree = xmltree::parse(marcxml)
        .map_err(|e| GatewayError::Other(anyhow::anyhow!("malformed record XML: {e}")))?;

    if db.explicit_availability {
        apply_explicit_availability(&mut tree);
    }

    match syntax {
        RecordSyntax::Xml => Ok(RenderedRecord::Xml(tree.to_xml_string())),
        RecordSyntax::Usmarc => {
            let specs: &[FieldSpec] = db.record.get(&syntax).map(Vec::as_slice).unwrap_or(&[]);
            let bytes = marc::convert(specs, &tree, &tree.to_xml_string())?;
            Ok(RenderedRecord::Marc21(bytes))
        }
        RecordSyntax::Grs1 => {
            let specs: &[FieldSpec] = db.record.get(&syntax).map(Vec::as_slice).unwrap_or(&[]);
            Ok(RenderedRecord::Grs1(grs1::convert(specs, &tree)))
        }
        RecordSyntax::Sutrs => Ok(RenderedRecord::Sutrs(sutrs::convert(&tree))),
    }
}

/// Extract the inner `marcxml` payload from a back-end's record envelope
/// (`/doc/str[@name='marcxml']`), per §4.5. Envelopes that don't match the
/// wrapper shape are assumed to already be bare record XML.
pub fn extract_marcxml(envelope_xml: &str) -> String {
    let Ok(tree) = xmltree::parse(envelope_xml) else {
        return envelope_xml.to_string();
    };
    let hits = xmltree::select_text(&tree, "str[@name='marcxml']");
    hits.into_iter().next().unwrap_or_else(|| envelope_xml.to_string())
}

pub(crate) fn trim_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim_matches(|c: char| c == '\n' || c == '\r');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
