//! SUTRS rendering: a recursive, tab-indented `name = value` dump of the
//! record tree. Single-element sequences are unwrapped rather than wrapped
//! in a braced block.

use std::collections::BTreeMap;

use super::xmltree::XmlNode;

pub fn convert(source: &XmlNode) -> String {
    let mut out = String::new();
    dump(source, 0, &mut out);
    out
}

fn dump(node: &XmlNode, level: usize, out: &mut String) {
    let indent = "\t".repeat(level);

    if node.children.is_empty() {
        out.push_str(&indent);
        out.push_str(node.local_name());
        out.push_str(" = ");
        out.push_str(node.text.trim());
        out.push('\n');
        return;
    }

    let mut groups: BTreeMap<&str, Vec<&XmlNode>> = BTreeMap::new();
    for child in &node.children {
        groups.entry(child.local_name()).or_default().push(child);
    }

    out.push_str(&indent);
    out.push_str(node.local_name());
    out.push_str(" = {\n");
    for siblings in groups.values() {
        if siblings.len() == 1 {
            dump(siblings[0], level + 1, out);
        } else {
            for sibling in siblings {
                dump(sibling, level + 1, out);
            }
        }
    }
    out.push_str(&indent);
    out.push_str("}\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::xmltree::parse;

    #[test]
    fn scalar_leaf_renders_as_assignment() {
        let tree = parse("<title>War and Peace</title>").unwrap();
        assert_eq!(convert(&tree), "title = War and Peace\n");
    }

    #[test]
    fn nested_record_renders_braced_block() {
        let tree = parse("<record><title>War and Peace</title></record>").unwrap();
        assert_eq!(convert(&tree), "record = {\n\ttitle = War and Peace\n}\n");
    }
}
