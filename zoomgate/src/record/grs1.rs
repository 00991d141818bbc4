//! GRS-1 rendering: one `"tag data\n"` line per field-spec hit.

use crate::config::FieldSpec;

use super::xmltree::{select_text, XmlNode};

pub fn convert(specs: &[FieldSpec], source: &XmlNode) -> String {
    let mut out = String::new();
    for spec in specs {
        for raw in select_text(source, &spec.xpath) {
            let Some(value) = super::trim_empty(&raw) else {
                continue;
            };
            out.push_str(&spec.content);
            out.push(' ');
            out.push_str(&value.replace(['\n', '\r'], " "));
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::xmltree::parse;

    #[test]
    fn emits_one_line_per_hit() {
        let tree = parse("<record><title>War and Peace</title></record>").unwrap();
        let specs = vec![FieldSpec {
            xpath: "title".into(),
            content: "245".into(),
        }];
        assert_eq!(convert(&specs, &tree), "245 War and Peace\n");
    }

    #[test]
    fn collapses_internal_newlines() {
        let tree = parse("<record><note>line one\nline two</note></record>").unwrap();
        let specs = vec![FieldSpec {
            xpath: "note".into(),
            content: "500".into(),
        }];
        assert_eq!(convert(&specs, &tree), "500 line one line two\n");
    }
}
