//! The sort planner (§4.8): extracts a dialect-neutral `SortKey` from each
//! request key, then renders either a YAZ sortspec string or a CQL
//! `sortby` clause, and composes the PQF/CQL search that will populate
//! `OUTPUT`.

use crate::config::DatabaseConfig;
use crate::diagnostics::code;
use crate::error::{GatewayError, Result};
use crate::query_builder::{self, RsidLookup};
use crate::rpn::{attr_type, Attr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Respect,
    Ignore,
}

/// One sort key, already resolved to an access point, independent of
/// SORTFIELD/ELEMENTSPEC/SORT_ATTR origin.
#[derive(Debug, Clone)]
pub struct SortKey {
    /// Literal sort field (from `SORTFIELD`/`ELEMENTSPEC_TYPE`) or a BIB-1
    /// Use-attribute value (from `SORT_ATTR`), not yet mapped to an index.
    pub field: SortField,
    pub direction: Direction,
    pub case: Case,
}

#[derive(Debug, Clone)]
pub enum SortField {
    Literal(String),
    UseAttribute(u16),
}

/// One incoming sort-sequence element, as the request frame carries it.
pub struct SortRequestKey {
    pub sortfield: Option<String>,
    pub elementspec_type: Option<String>,
    pub sort_attrs: Vec<Attr>,
    pub relation: i32,
    pub case: i32,
}

/// Extract a `SortKey` from a request element, per the shared pass
/// described in the "two code paths" design note.
pub fn extract_key(request: &SortRequestKey) -> Result<SortKey> {
    let field = if let Some(sortfield) = &request.sortfield {
        SortField::Literal(sortfield.clone())
    } else if let Some(elementspec) = &request.elementspec_type {
        SortField::Literal(elementspec.clone())
    } else {
        let use_attr = request
            .sort_attrs
            .iter()
            .find(|a| a.attribute_type == attr_type::USE)
            .map(|a| a.value)
            .ok_or_else(|| GatewayError::protocol(code::ILLEGAL_SORT_ELEMENT, "missing Use attribute"))?;
        SortField::UseAttribute(use_attr)
    };

    let direction = if request.relation == 0 {
        Direction::Descending
    } else {
        Direction::Ascending
    };
    let case = if request.case == 0 {
        Case::Respect
    } else {
        Case::Ignore
    };

    Ok(SortKey { field, direction, case })
}

/// Render one `SortKey` as a YAZ sortspec fragment, e.g. `1=4 <s`.
pub fn render_yaz(key: &SortKey) -> String {
    let field = match &key.field {
        SortField::Literal(literal) => literal.clone(),
        SortField::UseAttribute(use_attr) => format!("1={use_attr}"),
    };
    let direction = match key.direction {
        Direction::Ascending => '>',
        Direction::Descending => '<',
    };
    let case = match key.case {
        Case::Respect => 's',
        Case::Ignore => 'i',
    };
    format!("{field} {direction}{case}")
}

/// Render one `SortKey` as a CQL sortspec fragment, e.g.
/// `title/sort.descending/sort.ignoreCase/sort.missingOmit`.
pub fn render_cql(key: &SortKey, db: &DatabaseConfig) -> Result<String> {
    let index = match &key.field {
        SortField::Literal(literal) => literal.clone(),
        SortField::UseAttribute(use_attr) => query_builder::resolve_index(db, Some(*use_attr))?
            .unwrap_or_else(|| use_attr.to_string()),
    };
    let direction = match key.direction {
        Direction::Ascending => "sort.ascending",
        Direction::Descending => "sort.descending",
    };
    let case = match key.case {
        Case::Respect => "sort.respectCase",
        Case::Ignore => "sort.ignoreCase",
    };
    Ok(format!("{index}/{direction}/{case}/sort.missingOmit"))
}

pub fn render_yaz_sortspec(keys: &[SortKey]) -> String {
    keys.iter().map(render_yaz).collect::<Vec<_>>().join(" ")
}

pub fn render_cql_sortspec(keys: &[SortKey], db: &DatabaseConfig) -> Result<String> {
    let rendered: Result<Vec<String>> = keys.iter().map(|k| render_cql(k, db)).collect();
    Ok(rendered?.join(" "))
}

/// Compose the PQF query for the re-search path: `@or` over `@set "name"`
/// clauses for every input set, with the YAZ sortspec attached.
pub fn compose_pqf(input_sets: &[String], sortspec: &str) -> String {
    let rsids = input_sets
        .iter()
        .map(|name| crate::rpn::RpnNode::Rsid(name.clone()))
        .reduce(crate::rpn::RpnNode::or)
        .expect("sort requires at least one input set");
    let query = query_builder::compile_pqf(&rsids);
    format!("{query} sortby {sortspec}")
}

/// Compose the CQL query for the re-search path (§4.8 CQL path): `(A or B
/// or ...)`, each term either `cql.resultSetId="rsid"` or the original
/// `qtext` in parentheses, plus a native `sortby` clause or an attached YAZ
/// sortspec depending on the back-end's advertised SRU version.
pub fn compose_cql(
    input_sets: &[String],
    db: &DatabaseConfig,
    sets: &dyn RsidLookup,
    keys: &[SortKey],
    sru_version: Option<(u8, u8)>,
) -> Result<String> {
    let mut terms = Vec::with_capacity(input_sets.len());
    for name in input_sets {
        let (rsid, qtext) = sets
            .lookup(name)
            .ok_or_else(|| GatewayError::protocol(code::RESULT_SET_NOT_FOUND, name.clone()))?;
        terms.push(match rsid {
            Some(rsid) => format!("cql.resultSetId=\"{rsid}\""),
            None => format!("({qtext})"),
        });
    }
    let unioned = if terms.len() == 1 {
        terms.into_iter().next().unwrap()
    } else {
        format!("({})", terms.join(" or "))
    };

    let native_sort = sru_version.map(|(major, minor)| (major, minor) >= (1, 2)).unwrap_or(false);
    if native_sort {
        Ok(format!("{unioned} sortby {}", render_cql_sortspec(keys, db)?))
    } else {
        Ok(format!("{unioned} sortby {}", render_yaz_sortspec(keys)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(field: &str, relation: i32, case: i32) -> SortKey {
        extract_key(&SortRequestKey {
            sortfield: Some(field.to_string()),
            elementspec_type: None,
            sort_attrs: vec![],
            relation,
            case,
        })
        .unwrap()
    }

    #[test]
    fn yaz_sortspec_scenario() {
        let k = key("title", 0, 0);
        assert_eq!(render_yaz(&k), "title <s");
    }

    #[test]
    fn missing_use_attribute_is_illegal_sort_element() {
        let request = SortRequestKey {
            sortfield: None,
            elementspec_type: None,
            sort_attrs: vec![],
            relation: 1,
            case: 0,
        };
        let err = extract_key(&request).unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(d) if d.code == code::ILLEGAL_SORT_ELEMENT));
    }
}
