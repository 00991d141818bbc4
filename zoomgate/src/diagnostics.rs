//! BIB-1 diagnostic codes and cross-diagnostic-set translation.
//!
//! A `Diagnostic` is what the session dispatcher attaches to a reply's
//! `STATUS`/`ERR_CODE`/`ERR_STR` slots. The gateway itself only ever raises
//! BIB-1 codes; back-end failures arrive tagged with whichever diagnostic
//! set the back-end speaks (`DiagSet`) and are translated here before they
//! reach the client.

use std::fmt;

/// The diagnostic set a raw back-end error was reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagSet {
    Bib1,
    Srw,
    Zoom,
}

/// A client-facing BIB-1 diagnostic: a numeric code plus free-text
/// additional info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: u16,
    pub addinfo: String,
}

impl Diagnostic {
    pub fn new(code: u16, addinfo: impl Into<String>) -> Self {
        Self {
            code,
            addinfo: addinfo.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BIB-1 diagnostic {} ({})", self.code, self.addinfo)
    }
}

/// BIB-1 attribute-set OID, the only attribute set this gateway accepts.
pub const BIB1_OID: &str = "1.2.840.10003.3.1";

pub mod code {
    pub const PRESENT_OUT_OF_RANGE: u16 = 13;
    pub const RESULT_SET_ID_NOT_ALLOWED: u16 = 18;
    pub const NONAMEDRESULTSETS_VIOLATION: u16 = 22;
    pub const UNSPECIFIED_ERROR: u16 = 100;
    pub const CONNECT_FAILED: u16 = 109;
    pub const TOO_MANY_DATABASES: u16 = 111;
    pub const UNSUPPORTED_ATTRIBUTE_TYPE: u16 = 113;
    pub const UNSUPPORTED_USE_ATTRIBUTE: u16 = 114;
    pub const UNSUPPORTED_RELATION: u16 = 117;
    pub const UNSUPPORTED_POSITION: u16 = 119;
    pub const UNSUPPORTED_TRUNCATION: u16 = 120;
    pub const UNSUPPORTED_ATTRIBUTE_SET: u16 = 121;
    pub const UNSUPPORTED_COMPLETENESS: u16 = 122;
    pub const RESULT_SET_NOT_FOUND: u16 = 128;
    pub const DATABASE_UNAVAILABLE: u16 = 235;
    pub const ILLEGAL_SORT_ELEMENT: u16 = 237;
    pub const RECORD_SYNTAX_NOT_SUPPORTED: u16 = 238;
    pub const CONFIG_ERROR: u16 = 1;
    pub const CREDENTIALS_BAD: u16 = 1014;
}

/// `info:srw/diagnostic/1/<n>` -> BIB-1. Unmapped SRW codes fall back to 100.
///
/// The pairs below cover the common SRW-1 diagnostics that an SRU back-end
/// is likely to raise in the course of a Type-1-derived CQL search.
const SRW_TO_BIB1: &[(u32, u16)] = &[
    (1, code::UNSPECIFIED_ERROR),
    (4, code::UNSUPPORTED_ATTRIBUTE_TYPE),
    (6, code::UNSUPPORTED_ATTRIBUTE_TYPE),
    (10, code::UNSUPPORTED_ATTRIBUTE_TYPE),
    (16, code::UNSUPPORTED_USE_ATTRIBUTE),
    (19, code::UNSUPPORTED_RELATION),
    (20, code::UNSUPPORTED_RELATION),
    (26, code::UNSUPPORTED_COMPLETENESS),
    (28, code::UNSUPPORTED_TRUNCATION),
    (29, code::UNSUPPORTED_TRUNCATION),
    (50, code::RESULT_SET_NOT_FOUND),
    (51, code::RESULT_SET_NOT_FOUND),
    (61, code::ILLEGAL_SORT_ELEMENT),
    (80, code::RECORD_SYNTAX_NOT_SUPPORTED),
];

/// Translate a raw back-end failure into a client-facing BIB-1 `Diagnostic`.
///
/// - `Bib1` passes through verbatim.
/// - `Srw` is mapped via the fixed table above, defaulting to 100.
/// - `Zoom` maps `CONNECT` failures to 109, everything else to 100.
pub fn translate_backend_error(set: DiagSet, code: u32, message: &str) -> Diagnostic {
    match set {
        DiagSet::Bib1 => Diagnostic::new(code as u16, message.to_string()),
        DiagSet::Srw => {
            let mapped = SRW_TO_BIB1
                .iter()
                .find(|(srw, _)| *srw == code)
                .map(|(_, bib1)| *bib1)
                .unwrap_or(code::UNSPECIFIED_ERROR);
            Diagnostic::new(mapped, message.to_string())
        }
        DiagSet::Zoom => {
            if message.to_ascii_lowercase().contains("connect") {
                Diagnostic::new(code::CONNECT_FAILED, message.to_string())
            } else {
                Diagnostic::new(code::UNSPECIFIED_ERROR, message.to_string())
            }
        }
    }
}

/// Parse an SRW diagnostic URI (`info:srw/diagnostic/1/<n>`) into its
/// numeric suffix, for the heuristic fallback described in the Present/Fetch
/// handler when the back-end is too old to report per-record errors itself.
pub fn parse_srw_diagnostic_uri(uri: &str) -> Option<u32> {
    uri.rsplit('/').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bib1_passes_through_verbatim() {
        let d = translate_backend_error(DiagSet::Bib1, 109, "connect failed");
        assert_eq!(d.code, 109);
    }

    #[test]
    fn srw_maps_via_table() {
        let d = translate_backend_error(DiagSet::Srw, 16, "bad use attribute");
        assert_eq!(d.code, code::UNSUPPORTED_USE_ATTRIBUTE);
    }

    #[test]
    fn srw_unmapped_falls_back_to_100() {
        let d = translate_backend_error(DiagSet::Srw, 9999, "whatever");
        assert_eq!(d.code, code::UNSPECIFIED_ERROR);
    }

    #[test]
    fn zoom_connect_maps_to_109() {
        let d = translate_backend_error(DiagSet::Zoom, 1, "CONNECT");
        assert_eq!(d.code, code::CONNECT_FAILED);
    }

    #[test]
    fn zoom_connect_prefix_message_maps_to_109() {
        let d = translate_backend_error(DiagSet::Zoom, 1, "CONNECT: connection refused");
        assert_eq!(d.code, code::CONNECT_FAILED);
    }

    #[test]
    fn zoom_other_maps_to_100() {
        let d = translate_backend_error(DiagSet::Zoom, 2, "timeout");
        assert_eq!(d.code, code::UNSPECIFIED_ERROR);
    }

    #[test]
    fn parses_srw_diagnostic_uri_suffix() {
        assert_eq!(
            parse_srw_diagnostic_uri("info:srw/diagnostic/1/16"),
            Some(16)
        );
    }
}
