//! A minimal DOM over `quick_xml` events, plus the slice of XPath the
//! gateway's field specs are written in: `name[@attr='value']/.../text()` or
//! `.../@attr`, with namespace prefixes ignored (the back-ends this gateway
//! talks to don't vary prefixes, only local names).

use quick_xml::events::Event;
use quick_xml::reader::Reader;

#[derive(Debug, Clone, Default)]
pub struct XmlNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: String,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The element name with any `prefix:` stripped.
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.rsplit(':').next().unwrap_or(k) == key)
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated text of this node and (recursively) its children.
    pub fn text_content(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.text_content());
        }
        out
    }

    /// Depth-first mutable visit of this node and all descendants.
    pub fn for_each_mut(&mut self, f: &mut impl FnMut(&mut XmlNode)) {
        f(self);
        for child in &mut self.children {
            child.for_each_mut(f);
        }
    }

    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        write_node(self, &mut out);
        out
    }
}

fn write_node(node: &XmlNode, out: &mut String) {
    out.push('<');
    out.push_str(&node.name);
    for (k, v) in &node.attrs {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        out.push_str(&escape(v));
        out.push('"');
    }
    if node.children.is_empty() && node.text.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    out.push_str(&escape(&node.text));
    for child in &node.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(&node.name);
    out.push('>');
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn parse(xml: &str) -> Result<XmlNode, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<XmlNode> = vec![XmlNode::new("#root")];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| e.to_string())? {
            Event::Start(e) => {
                let mut node = XmlNode::new(decode(e.name().as_ref()));
                for attr in e.attributes().flatten() {
                    let key = decode(attr.key.as_ref());
                    let value = attr.unescape_value().unwrap_or_default().to_string();
                    node.attrs.push((key, value));
                }
                stack.push(node);
            }
            Event::Empty(e) => {
                let mut node = XmlNode::new(decode(e.name().as_ref()));
                for attr in e.attributes().flatten() {
                    let key = decode(attr.key.as_ref());
                    let value = attr.unescape_value().unwrap_or_default().to_string();
                    node.attrs.push((key, value));
                }
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Event::End(_) => {
                if stack.len() > 1 {
                    let finished = stack.pop().unwrap();
                    stack.last_mut().unwrap().children.push(finished);
                }
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape().unwrap_or_default());
                }
            }
            Event::CData(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut root = stack.pop().ok_or("empty document")?;
    if root.children.len() == 1 {
        Ok(root.children.remove(0))
    } else {
        root.name = "#root".to_string();
        Ok(root)
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_string()
}

/// One path segment: an element-name match plus zero or more
/// `[@attr='value']` predicates.
struct Segment<'a> {
    name: &'a str,
    predicates: Vec<(&'a str, &'a str)>,
}

fn parse_segment(raw: &str) -> Segment<'_> {
    let mut predicates = Vec::new();
    let name_end = raw.find('[').unwrap_or(raw.len());
    let name = &raw[..name_end];
    let mut rest = &raw[name_end..];
    while let Some(open) = rest.find('[') {
        if let Some(close) = rest[open..].find(']') {
            let inner = &rest[open + 1..open + close];
            if let Some(eq) = inner.find('=') {
                let attr = inner[..eq].trim().trim_start_matches('@');
                let value = inner[eq + 1..].trim().trim_matches(|c| c == '\'' || c == '"');
                predicates.push((attr, value));
            }
            rest = &rest[open + close + 1..];
        } else {
            break;
        }
    }
    Segment { name, predicates }
}

fn matches_segment(node: &XmlNode, seg: &Segment<'_>) -> bool {
    if !seg.name.is_empty() && node.local_name() != seg.name {
        return false;
    }
    seg.predicates
        .iter()
        .all(|(attr, value)| node.attr(attr) == Some(*value))
}

/// Evaluate the gateway's XPath subset against `root`, returning the
/// matched text values (or attribute values, for a trailing `@attr` step).
pub fn select_text(root: &XmlNode, path: &str) -> Vec<String> {
    let path = path.trim_start_matches('/');
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let want_attr = segments
        .last()
        .and_then(|s| s.strip_prefix('@'))
        .map(str::to_string);
    if want_attr.is_some() {
        segments.pop();
    }
    if segments.last() == Some(&"text()") {
        segments.pop();
    }

    let mut current = vec![root];
    for raw in segments {
        let seg = parse_segment(raw);
        current = current
            .into_iter()
            .flat_map(|n| n.children.iter().filter(|c| matches_segment(c, &seg)))
            .collect();
    }

    match want_attr {
        Some(attr) => current.iter().filter_map(|n| n.attr(&attr)).map(str::to_string).collect(),
        None => current.iter().map(|n| n.text_content()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_named_str_element() {
        let tree = parse(r#"<doc><str name="marcxml">inner &amp; text</str></doc>"#).unwrap();
        let found = select_text(&tree, "str[@name='marcxml']");
        assert_eq!(found, vec!["inner & text".to_string()]);
    }

    #[test]
    fn selects_subfield_by_code() {
        let tree = parse(
            r#"<record><datafield tag="245"><subfield code="a">Title</subfield><subfield code="b">sub</subfield></datafield></record>"#,
        )
        .unwrap();
        let found = select_text(&tree, "datafield[@tag='245']/subfield[@code='a']");
        assert_eq!(found, vec!["Title".to_string()]);
    }

    #[test]
    fn roundtrips_to_xml_string() {
        let tree = parse("<a><b>1</b></a>").unwrap();
        assert_eq!(tree.to_xml_string(), "<a><b>1</b></a>");
    }
}
