//! Named result sets: the per-session registry Search/Sort publish into and
//! RSID/sort-by-re-search reads back out of.

use std::collections::HashMap;

use crate::backends::Cursor;
use crate::config::DatabaseConfig;
use crate::query_builder::RsidLookup;

/// A materialized hit list bound to a client-visible set-name.
#[derive(Debug, Clone)]
pub struct ResultSet {
    pub db_name: String,
    pub db_config: DatabaseConfig,
    pub setname: String,
    /// The compiled query text that produced this set, kept so a sort
    /// against an SRU back-end below 1.2 can re-submit it.
    pub qtext: String,
    pub cursor: Cursor,
    pub rsid: Option<String>,
    pub hits: u64,
}

/// Per-session set-name -> ResultSet map. A name may be rebound; the prior
/// `ResultSet` (and its cursor) is simply dropped, per the "double-binding"
/// invariant.
#[derive(Default)]
pub struct ResultSetRegistry {
    sets: HashMap<String, ResultSet>,
}

impl ResultSetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, set: ResultSet) {
        self.sets.insert(set.setname.clone(), set);
    }

    pub fn get(&self, setname: &str) -> Option<&ResultSet> {
        self.sets.get(setname)
    }

    pub fn clear(&mut self) {
        self.sets.clear();
    }
}

impl RsidLookup for ResultSetRegistry {
    fn lookup(&self, setname: &str) -> Option<(Option<&str>, &str)> {
        self.get(setname).map(|set| (set.rsid.as_deref(), set.qtext.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(name: &str) -> ResultSet {
        ResultSet {
            db_name: "books".into(),
            db_config: DatabaseConfig::default(),
            setname: name.into(),
            qtext: "title = war".into(),
            cursor: Cursor("c1".into()),
            rsid: Some("rs1".into()),
            hits: 1,
        }
    }

    #[test]
    fn rebinding_a_setname_drops_the_prior_set() {
        let mut registry = ResultSetRegistry::new();
        registry.publish(set("default"));
        let mut second = set("default");
        second.cursor = Cursor("c2".into());
        registry.publish(second);
        assert_eq!(registry.get("default").unwrap().cursor, Cursor("c2".into()));
    }
}
