//! MARC21 (ISO 2709 binary) rendering.
//!
//! Walks the database's field-spec list in order, resolving each entry's
//! xpath against the record tree and folding the hits into a `marctk`
//! record per the tag/indicator/subfield grammar in `content`.

use crate::config::FieldSpec;
use crate::error::{GatewayError, Result};

use super::xmltree::{select_text, XmlNode};

const FULL: &str = "full";

/// `marctk::Record::from_xml` yields one `Result<Record, _>` per `<record>`
/// element in the document; a Fetch always carries exactly one.
pub(crate) fn first_record(xml: &str) -> Result<marctk::Record> {
    marctk::Record::from_xml(xml)
        .next()
        .ok_or_else(|| GatewayError::Other(anyhow::anyhow!("no MARC record in XML")))?
        .map_err(|e| GatewayError::Other(anyhow::anyhow!("malformed MARC-XML: {e}")))
}

pub fn convert(specs: &[FieldSpec], source: &XmlNode, source_xml: &str) -> Result<Vec<u8>> {
    if specs.iter().any(|s| s.content == FULL) {
        let record = first_record(source_xml)?;
        return record
            .to_binary()
            .map_err(|e| GatewayError::Other(anyhow::anyhow!("marc21 serialization failed: {e}")));
    }

    let mut record = marctk::Record::new();

    for spec in specs {
        for raw in select_text(source, &spec.xpath) {
            let Some(value) = super::trim_empty(&raw) else {
                continue;
            };
            apply_content_spec(&mut record, &spec.content, &value)?;
        }
    }

    record
        .to_binary()
        .map_err(|e| GatewayError::Other(anyhow::anyhow!("marc21 serialization failed: {e}")))
}

/// Parse `content` as `tag[/i1[/i2]][$subtag]` and fold `value` into it.
fn apply_content_spec(record: &mut marctk::Record, content: &str, value: &str) -> Result<()> {
    let (tag_spec, subtag) = match content.split_once('$') {
        Some((tag, sub)) => (tag, Some(sub)),
        None => (content, None),
    };

    let mut parts = tag_spec.split('/');
    let tag = parts.next().unwrap_or_default();
    let ind1 = parts.next().and_then(|s| s.chars().next()).unwrap_or(' ');
    let ind2 = parts.next().and_then(|s| s.chars().next()).unwrap_or(' ');

    if tag.starts_with("00") {
        record.control_fields.push(marctk::Controlfield::new(tag, value));
        return Ok(());
    }

    let subtag = subtag.unwrap_or("a");

    let existing = record
        .fields
        .iter_mut()
        .find(|f| f.tag == tag && !f.subfields.iter().any(|sf| sf.code == subtag));

    match existing {
        Some(field) => field.subfields.push(marctk::Subfield::new(subtag, value)),
        None => {
            let mut field = marctk::Field::new(tag);
            field.ind1 = ind1;
            field.ind2 = ind2;
            field.subfields.push(marctk::Subfield::new(subtag, value));
            record.fields.push(field);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::xmltree::parse;

    #[test]
    fn control_tag_appends_one_field_per_hit() {
        let tree = parse("<record><id>12345</id></record>").unwrap();
        let specs = vec![FieldSpec {
            xpath: "id".into(),
            content: "001".into(),
        }];
        let bytes = convert(&specs, &tree, &tree.to_xml_string()).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn repeated_tag_with_new_subfield_reuses_field() {
        let mut record = marctk::Record::new();
        apply_content_spec(&mut record, "245/1/0$a", "War and Peace").unwrap();
        apply_content_spec(&mut record, "245/1/0$b", "a novel").unwrap();
        assert_eq!(record.fields.len(), 1);
        assert_eq!(record.fields[0].subfields.len(), 2);
    }

    #[test]
    fn repeated_subfield_code_starts_a_new_field() {
        let mut record = marctk::Record::new();
        apply_content_spec(&mut record, "700$a", "Tolstoy, Leo").unwrap();
        apply_content_spec(&mut record, "700$a", "Maude, Louise").unwrap();
        assert_eq!(record.fields.len(), 2);
    }
}
