//! Shared BIB-1 attribute interpretation (§4.3), independent of which
//! dialect the result gets rendered into.

use crate::config::DatabaseConfig;
use crate::diagnostics::code;
use crate::error::{GatewayError, Result};
use crate::rpn::{attr_type, AttrTerm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truncation {
    None,
    Right,
    Left,
    Both,
    /// `#` -> `?` (attribute value 101).
    Substitute,
    /// `#` -> `?`, then `\?\d?` -> `*` (attribute value 104, Z39.58 CCL-style).
    Ccl,
}

/// The dialect-independent meaning of a term's attribute list.
pub struct Interpreted {
    pub use_attr: Option<u16>,
    pub relation: Option<u16>,
    pub truncation: Truncation,
    pub left_anchor: bool,
    pub right_anchor: bool,
}

pub fn interpret(term: &AttrTerm) -> Result<Interpreted> {
    let mut relation = None;
    let mut truncation = Truncation::None;
    let mut left_anchor = false;
    let mut right_anchor = false;

    for attr in &term.attributes {
        match attr.attribute_type {
            attr_type::USE => {}
            attr_type::RELATION => relation = Some(attr.value),
            attr_type::POSITION => match attr.value {
                1 | 2 => left_anchor = true,
                3 => {}
                _ => return Err(GatewayError::protocol(code::UNSUPPORTED_POSITION, attr.value.to_string())),
            },
            attr_type::STRUCTURE => {}
            attr_type::TRUNCATION => {
                truncation = match attr.value {
                    1 => Truncation::Right,
                    2 => Truncation::Left,
                    3 => Truncation::Both,
                    100 => Truncation::None,
                    101 => Truncation::Substitute,
                    104 => Truncation::Ccl,
                    _ => return Err(GatewayError::protocol(code::UNSUPPORTED_TRUNCATION, attr.value.to_string())),
                };
            }
            attr_type::COMPLETENESS => match attr.value {
                2 | 3 => {
                    left_anchor = true;
                    right_anchor = true;
                }
                1 => {}
                _ => return Err(GatewayError::protocol(code::UNSUPPORTED_COMPLETENESS, attr.value.to_string())),
            },
            other => return Err(GatewayError::protocol(code::UNSUPPORTED_ATTRIBUTE_TYPE, other.to_string())),
        }
    }

    Ok(Interpreted {
        use_attr: term.use_attr(),
        relation,
        truncation,
        left_anchor,
        right_anchor,
    })
}

/// Resolve a Use-attribute value to a back-end index/field name.
///
/// An empty `search.map` means "no mapping configured": use the integer
/// literally (a documented configuration contract, see DESIGN.md). A
/// non-empty map that doesn't cover this value is diagnostic 114.
pub fn resolve_index(db: &DatabaseConfig, use_attr: Option<u16>) -> Result<Option<String>> {
    let Some(use_attr) = use_attr else {
        return Ok(None);
    };
    let map_configured = db.search.as_ref().map(|s| !s.map.is_empty()).unwrap_or(false);
    if !map_configured {
        return Ok(Some(use_attr.to_string()));
    }
    db.use_map(use_attr)
        .map(|index| Some(index.to_string()))
        .ok_or_else(|| GatewayError::protocol(code::UNSUPPORTED_USE_ATTRIBUTE, use_attr.to_string()))
}

/// Apply truncation decoration to the raw term text (`*` markers; the
/// substitute/CCL rewrites act on the text itself rather than bracketing
/// it).
pub fn decorate_truncation(raw: &str, truncation: Truncation) -> String {
    match truncation {
        Truncation::None => raw.to_string(),
        Truncation::Right => format!("{raw}*"),
        Truncation::Left => format!("*{raw}"),
        Truncation::Both => format!("*{raw}*"),
        Truncation::Substitute => raw.replace('#', "?"),
        Truncation::Ccl => ccl_rewrite(raw),
    }
}

fn ccl_rewrite(raw: &str) -> String {
    let substituted = raw.replace('#', "?");
    let mut out = String::with_capacity(substituted.len());
    let chars: Vec<char> = substituted.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '?' {
            if i + 1 < chars.len() && chars[i + 1].is_ascii_digit() {
                out.push('*');
                i += 2;
                continue;
            }
            out.push('*');
            i += 1;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Apply anchor decoration (`^` markers) and quote the term if it contains
/// whitespace or any of `"`, `/`, `=`.
pub fn decorate_anchors_and_quote(term: &str, left_anchor: bool, right_anchor: bool) -> String {
    let mut decorated = term.to_string();
    if right_anchor {
        decorated.push('^');
    }
    if left_anchor {
        decorated = format!("^{decorated}");
    }
    if decorated.chars().any(char::is_whitespace) || decorated.contains(['"', '/', '=']) {
        format!("\"{decorated}\"")
    } else {
        decorated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpn::{Attr, RpnNode};

    fn term_with(attrs: Vec<Attr>) -> AttrTerm {
        match RpnNode::term(attrs, "war") {
            RpnNode::Term(t) => t,
            _ => unreachable!(),
        }
    }

    #[test]
    fn unknown_attribute_type_is_113() {
        let term = term_with(vec![Attr {
            attribute_type: 99,
            value: 1,
        }]);
        let err = interpret(&term).unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(d) if d.code == code::UNSUPPORTED_ATTRIBUTE_TYPE));
    }

    #[test]
    fn ccl_rewrite_collapses_digit_wildcard() {
        assert_eq!(ccl_rewrite("colo#r"), "colo*r");
        assert_eq!(ccl_rewrite("wom#n"), "wom*n");
    }
}
