//! The internal Type-1/RPN query tree.
//!
//! The original implementation monkey-patches `_toCQL`/`_toSolr` methods
//! onto each Z3950-RPN node class. Here the tree is a plain tagged sum type
//! and the query compiler (`query_builder`) is a pure traversal function
//! over it -- no open-ended extension needed, and no dependency on any
//! particular wire encoding. `wire::from_z39_query` builds one of these from
//! the `z39` crate's decoded `SearchRequest`/`SortRequest` query structures.

/// A single BIB-1 attribute: `(attributeType, attributeValue)`. Any
/// attribute whose set is not BIB-1 is rejected by the compiler (diagnostic
/// 121) before it ever becomes an `Attr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr {
    pub attribute_type: u16,
    pub value: u16,
}

/// BIB-1 attribute types (Z39.50 attribute set BIB-1, OID 1.2.840.10003.3.1).
pub mod attr_type {
    pub const USE: u16 = 1;
    pub const RELATION: u16 = 2;
    pub const POSITION: u16 = 3;
    pub const STRUCTURE: u16 = 4;
    pub const TRUNCATION: u16 = 5;
    pub const COMPLETENESS: u16 = 6;
}

/// A term plus its attribute list, e.g. `@attr 1=4 @attr 2=3 war`.
#[derive(Debug, Clone)]
pub struct AttrTerm {
    pub attributes: Vec<Attr>,
    pub term: String,
}

impl AttrTerm {
    /// The (first) Use attribute's value, if present.
    pub fn use_attr(&self) -> Option<u16> {
        self.attributes
            .iter()
            .find(|a| a.attribute_type == attr_type::USE)
            .map(|a| a.value)
    }

    pub fn attr(&self, attribute_type: u16) -> Option<u16> {
        self.attributes
            .iter()
            .find(|a| a.attribute_type == attribute_type)
            .map(|a| a.value)
    }
}

/// The Type-1 RPN query tree.
#[derive(Debug, Clone)]
pub enum RpnNode {
    Term(AttrTerm),
    /// A reference to a previously materialized result set, e.g.
    /// `@set "default"`.
    Rsid(String),
    And(Box<RpnNode>, Box<RpnNode>),
    Or(Box<RpnNode>, Box<RpnNode>),
    AndNot(Box<RpnNode>, Box<RpnNode>),
}

impl RpnNode {
    pub fn term(attributes: Vec<Attr>, term: impl Into<String>) -> Self {
        RpnNode::Term(AttrTerm {
            attributes,
            term: term.into(),
        })
    }

    pub fn and(a: RpnNode, b: RpnNode) -> Self {
        RpnNode::And(Box::new(a), Box::new(b))
    }

    pub fn or(a: RpnNode, b: RpnNode) -> Self {
        RpnNode::Or(Box::new(a), Box::new(b))
    }
}
