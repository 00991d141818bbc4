//! End-to-end scenarios against the query compiler, sort planner, database
//! resolver, and record converter -- the pieces of the gateway that don't
//! require a live back-end to exercise.

use std::collections::HashMap;

use zoomgate::config::{DatabaseConfig, QueryType, SearchConfig, UseMapping};
use zoomgate::query_builder::{compile_cql, compile_solr, RsidLookup};
use zoomgate::rpn::{Attr, RpnNode};
use zoomgate::sort;

struct NoSets;
impl RsidLookup for NoSets {
    fn lookup(&self, _setname: &str) -> Option<(Option<&str>, &str)> {
        None
    }
}

struct OneSet {
    rsid: Option<&'static str>,
    qtext: &'static str,
}
impl RsidLookup for OneSet {
    fn lookup(&self, _setname: &str) -> Option<(Option<&str>, &str)> {
        Some((self.rsid, self.qtext))
    }
}

fn db(querytype: QueryType, map: &[(u16, &str)]) -> DatabaseConfig {
    let mut m = HashMap::new();
    for (k, v) in map {
        m.insert(*k, UseMapping { index: (*v).to_string() });
    }
    DatabaseConfig {
        search: Some(SearchConfig {
            querytype: Some(querytype),
            map: m,
        }),
        ..Default::default()
    }
}

/// Scenario 1: simple search against `books` (CQL, Use=4 -> title).
#[test]
fn scenario_1_simple_search() {
    let books = db(QueryType::Cql, &[(4, "title")]);
    let node = RpnNode::term(
        vec![
            Attr { attribute_type: 1, value: 4 },
            Attr { attribute_type: 2, value: 3 },
            Attr { attribute_type: 5, value: 1 },
        ],
        "war",
    );
    assert_eq!(compile_cql(&node, &books, &NoSets).unwrap(), "title = war*");
}

/// Scenario 2: range query against `cdrom` (Solr, Use=30 -> year).
#[test]
fn scenario_2_range_query_solr() {
    let cdrom = db(QueryType::Solr, &[(30, "year")]);
    let node = RpnNode::term(
        vec![
            Attr { attribute_type: 1, value: 30 },
            Attr { attribute_type: 2, value: 2 },
        ],
        "2000",
    );
    assert_eq!(compile_solr(&node, &cdrom, &NoSets).unwrap(), "year:[* TO 2000]");
}

/// Scenario 3: RSID reuse, policy=fallback, rsid known.
#[test]
fn scenario_3_rsid_reuse_with_known_rsid() {
    let books = db(QueryType::Cql, &[(4, "title")]);
    let sets = OneSet {
        rsid: Some("rs42"),
        qtext: "title = war*",
    };
    let node = RpnNode::and(
        RpnNode::Rsid("default".into()),
        RpnNode::term(vec![Attr { attribute_type: 1, value: 4 }], "peace"),
    );
    let compiled = compile_cql(&node, &books, &sets).unwrap();
    assert_eq!(compiled, "(cql.resultSetId=\"rs42\" and title = peace)");
}

/// Scenario 4: sort via re-search because the back-end advertises SRU 1.1.
#[test]
fn scenario_4_sort_via_research_sru_1_1() {
    let books = db(QueryType::Cql, &[(4, "title")]);
    let sets = SetMap(HashMap::from([
        ("A".to_string(), (None, "title = war*".to_string())),
        ("B".to_string(), (None, "title = peace*".to_string())),
    ]));

    let key = sort::extract_key(&sort::SortRequestKey {
        sortfield: Some("title".into()),
        elementspec_type: None,
        sort_attrs: vec![],
        relation: 0,
        case: 0,
    })
    .unwrap();

    let compiled = sort::compose_cql(
        &["A".to_string(), "B".to_string()],
        &books,
        &sets,
        &[key],
        Some((1, 1)),
    )
    .unwrap();

    assert_eq!(compiled, "((title = war*) or (title = peace*)) sortby title <s");
}

struct SetMap(HashMap<String, (Option<&'static str>, String)>);
impl RsidLookup for SetMap {
    fn lookup(&self, setname: &str) -> Option<(Option<&str>, &str)> {
        self.0.get(setname).map(|(rsid, qtext)| (*rsid, qtext.as_str()))
    }
}

/// Scenario 5: unsupported syntax request against a `usmarc`-only database.
#[test]
fn scenario_5_unsupported_syntax_lists_sorted_supported_syntaxes() {
    use zoomgate::record::{convert, RecordSyntax};

    let mut usmarc_only = DatabaseConfig::default();
    usmarc_only.record.insert(RecordSyntax::Usmarc, vec![]);

    let err = convert("<doc/>", RecordSyntax::Grs1, &usmarc_only).unwrap_err();
    let diagnostic = err.as_diagnostic().expect("protocol diagnostic");
    assert_eq!(diagnostic.code, 238);
    assert_eq!(diagnostic.addinfo, "usmarc,xml");
}

/// Scenario 6: a virtual database missing the required `address` key.
#[test]
fn scenario_6_virtual_database_missing_address() {
    use zoomgate::config::GatewayConfig;
    use zoomgate::database;

    let cfg = GatewayConfig::default();
    let err = database::resolve(&cfg, &["cfg:timeout=30".to_string()]).unwrap_err();
    let diagnostic = err.as_diagnostic().expect("protocol diagnostic");
    assert_eq!(diagnostic.code, 1);
    assert_eq!(diagnostic.addinfo, "cfg:timeout=30");
}
