//! The Type-1/RPN query compiler (§4.3): a pure traversal over `RpnNode`
//! with two emission modes, CQL and Solr. Dispatch by dialect lives in
//! `session::search`, which picks `compile_cql`/`compile_solr` from the
//! resolved database's `querytype`.

mod cql;
mod pqf;
mod solr;
mod term;

pub use cql::compile as compile_cql;
pub use pqf::compile as compile_pqf;
pub use solr::compile as compile_solr;
pub use term::{decorate_anchors_and_quote, decorate_truncation, interpret, resolve_index, Truncation};

/// Resolves a set-name to `(rsid, original query text)` for `@set`/RSID
/// emission (§4.3) without the query compiler needing to know about the
/// session's full result-set registry.
pub trait RsidLookup {
    fn lookup(&self, setname: &str) -> Option<(Option<&str>, &str)>;
}
