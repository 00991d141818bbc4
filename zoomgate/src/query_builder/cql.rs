//! RPN -> CQL rendering, for databases with `search.querytype = "cql"`.

use crate::config::{DatabaseConfig, ResultSetIdPolicy};
use crate::diagnostics::code;
use crate::error::{GatewayError, Result};
use crate::rpn::RpnNode;

use super::term::{decorate_anchors_and_quote, decorate_truncation, interpret, resolve_index};
use super::RsidLookup;

pub fn compile(node: &RpnNode, db: &DatabaseConfig, sets: &dyn RsidLookup) -> Result<String> {
    match node {
        RpnNode::Term(term) => compile_term(term, db),
        RpnNode::Rsid(setname) => compile_rsid(setname, db, sets),
        RpnNode::And(a, b) => Ok(format!("({} and {})", compile(a, db, sets)?, compile(b, db, sets)?)),
        RpnNode::Or(a, b) => Ok(format!("({} or {})", compile(a, db, sets)?, compile(b, db, sets)?)),
        RpnNode::AndNot(a, b) => Ok(format!("({} not {})", compile(a, db, sets)?, compile(b, db, sets)?)),
    }
}

fn compile_term(term: &crate::rpn::AttrTerm, db: &DatabaseConfig) -> Result<String> {
    let interpreted = interpret(term)?;
    let index = resolve_index(db, interpreted.use_attr)?;

    let truncated = decorate_truncation(&term.term, interpreted.truncation);
    let decorated = decorate_anchors_and_quote(&truncated, interpreted.left_anchor, interpreted.right_anchor);

    let relation = interpreted.relation.map(relation_symbol).transpose()?;

    Ok(match (index, relation) {
        (Some(index), Some(rel)) => format!("{index} {rel} {decorated}"),
        (Some(index), None) => format!("{index} = {decorated}"),
        (None, Some(rel)) => format!("cql.serverChoice {rel} {decorated}"),
        (None, None) => format!("cql.serverChoice = {decorated}"),
    })
}

fn relation_symbol(relation: u16) -> Result<&'static str> {
    Ok(match relation {
        1 => "<",
        2 => "<=",
        3 => "=",
        4 => ">=",
        5 => ">",
        6 => "<>",
        100 => "=/phonetic",
        101 => "=/stem",
        102 => "=/relevant",
        other => return Err(GatewayError::protocol(code::UNSUPPORTED_RELATION, other.to_string())),
    })
}

fn compile_rsid(setname: &str, db: &DatabaseConfig, sets: &dyn RsidLookup) -> Result<String> {
    let (rsid, qtext) = sets
        .lookup(setname)
        .ok_or_else(|| GatewayError::protocol(code::RESULT_SET_NOT_FOUND, setname.to_string()))?;

    if let Some(rsid) = rsid {
        if db.resultsetid != ResultSetIdPolicy::Search {
            return Ok(format!("cql.resultSetId=\"{rsid}\""));
        }
    }

    if db.resultsetid != ResultSetIdPolicy::Id {
        return Ok(format!("({qtext})"));
    }

    Err(GatewayError::protocol(code::RESULT_SET_ID_NOT_ALLOWED, setname.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QueryType, SearchConfig, UseMapping};
    use crate::rpn::{Attr, RpnNode};
    use std::collections::HashMap;

    fn books_db() -> DatabaseConfig {
        let mut map = HashMap::new();
        map.insert(4, UseMapping { index: "title".into() });
        DatabaseConfig {
            search: Some(SearchConfig {
                querytype: Some(QueryType::Cql),
                map,
            }),
            ..Default::default()
        }
    }

    struct NoSets;
    impl RsidLookup for NoSets {
        fn lookup(&self, _setname: &str) -> Option<(Option<&str>, &str)> {
            None
        }
    }

    #[test]
    fn simple_search_scenario() {
        let db = books_db();
        let node = RpnNode::term(
            vec![
                Attr {
                    attribute_type: 1,
                    value: 4,
                },
                Attr {
                    attribute_type: 2,
                    value: 3,
                },
                Attr {
                    attribute_type: 5,
                    value: 1,
                },
            ],
            "war",
        );
        assert_eq!(compile(&node, &db, &NoSets).unwrap(), "title = war*");
    }

    #[test]
    fn and_of_terms_is_parenthesized_infix() {
        let db = books_db();
        let a = RpnNode::term(vec![], "a");
        let b = RpnNode::term(vec![], "b");
        let compiled = compile(&RpnNode::and(a, b), &db, &NoSets).unwrap();
        assert!(compiled.starts_with('(') && compiled.ends_with(')'));
        assert!(compiled.contains(" and "));
    }

    #[test]
    fn right_truncation_with_no_index_uses_server_choice() {
        let db = books_db();
        let node = RpnNode::term(
            vec![Attr {
                attribute_type: 5,
                value: 1,
            }],
            "term",
        );
        assert_eq!(compile(&node, &db, &NoSets).unwrap(), "cql.serverChoice = term*");
    }

    #[test]
    fn rsid_reuse_with_known_rsid() {
        let db = books_db();
        struct WithRsid;
        impl RsidLookup for WithRsid {
            fn lookup(&self, _setname: &str) -> Option<(Option<&str>, &str)> {
                Some((Some("rs42"), "title = war*"))
            }
        }
        let node = RpnNode::and(
            RpnNode::Rsid("default".into()),
            RpnNode::term(
                vec![Attr {
                    attribute_type: 1,
                    value: 4,
                }],
                "peace",
            ),
        );
        let compiled = compile(&node, &db, &WithRsid).unwrap();
        assert_eq!(compiled, "(cql.resultSetId=\"rs42\" and title = peace)");
    }
}
