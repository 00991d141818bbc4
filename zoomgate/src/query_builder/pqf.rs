//! RPN -> PQF rendering, for databases with no configured `search.querytype`
//! (raw Type-1/PQF passthrough) and for the sort planner's re-search path.

use crate::rpn::RpnNode;

pub fn compile(node: &RpnNode) -> String {
    match node {
        RpnNode::Term(term) => compile_term(term),
        RpnNode::Rsid(setname) => format!("@set \"{setname}\""),
        RpnNode::And(a, b) => format!("@and {} {}", compile(a), compile(b)),
        RpnNode::Or(a, b) => format!("@or {} {}", compile(a), compile(b)),
        RpnNode::AndNot(a, b) => format!("@not {} {}", compile(a), compile(b)),
    }
}

fn compile_term(term: &crate::rpn::AttrTerm) -> String {
    let mut out = String::new();
    for attr in &term.attributes {
        out.push_str("@attr ");
        out.push_str(&attr.attribute_type.to_string());
        out.push('=');
        out.push_str(&attr.value.to_string());
        out.push(' ');
    }
    if term.term.chars().any(char::is_whitespace) {
        out.push('"');
        out.push_str(&term.term);
        out.push('"');
    } else {
        out.push_str(&term.term);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpn::{Attr, RpnNode};

    #[test]
    fn term_renders_attrs_then_literal() {
        let node = RpnNode::term(
            vec![Attr {
                attribute_type: 1,
                value: 4,
            }],
            "war",
        );
        assert_eq!(compile(&node), "@attr 1=4 war");
    }

    #[test]
    fn boolean_nodes_render_prefix_notation() {
        let a = RpnNode::term(vec![], "a");
        let b = RpnNode::term(vec![], "b");
        assert_eq!(compile(&RpnNode::and(a, b)), "@and a b");
    }
}
