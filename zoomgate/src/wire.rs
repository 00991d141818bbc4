//! Adapts the decoded Z39.50 PDU structures the `z39` crate hands us into
//! calls against `Session`, and folds the typed result back into a reply
//! PDU. This is the one place that knows about `z39::message::*`; every
//! other module works purely in terms of the gateway's own types.
//!
//! Field coverage beyond what's exercised in Init/Search/Present
//! (`result_count`, `search_status`, `reset_set_start_point`,
//! `number_of_records_requested`, `preferred_record_syntax`) follows the
//! shape the `z39` crate's own reference server uses; Scan/Sort/Delete/Close
//! field names follow the same flattening convention extended to the
//! remaining ASN.1 operations -- see DESIGN.md for the specific choices.
//!
//! `handle_message` is the session's one failure barrier (§4.1): a
//! `GatewayError` whose `as_diagnostic()` is `Some` becomes a normal
//! diagnostic-bearing reply; `None` means a programmer error, and this
//! worker propagates it out as `Err(String)` rather than build a reply,
//! which is what `Z39Server` treats as fatal to the session.

use std::fmt;

use z39::bib1;
use z39::message::*;
use z39::server::Z39Worker;

use crate::diagnostics::{self, Diagnostic};
use crate::error::GatewayError;
use crate::record::RecordSyntax;
use crate::rpn::{attr_type, Attr, AttrTerm, RpnNode};
use crate::session::{FetchedRecord, ScanStatus, Session};
use crate::sort::SortRequestKey;

pub struct Worker {
    session: Session,
    runtime: tokio::runtime::Handle,
}

impl fmt::Display for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zoomgate-session")
    }
}

impl Worker {
    pub fn new(session: Session, runtime: tokio::runtime::Handle) -> Self {
        Self { session, runtime }
    }

    fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }
}

impl Z39Worker for Worker {
    fn handle_message(&mut self, msg: Message) -> Result<Message, String> {
        tracing::debug!(worker = %self, "handling inbound PDU");

        let payload = match &msg.payload {
            MessagePayload::InitializeRequest(req) => self.handle_init(req)?,
            MessagePayload::SearchRequest(req) => self.handle_search(req)?,
            MessagePayload::PresentRequest(req) => self.handle_present(req)?,
            MessagePayload::ScanRequest(req) => self.handle_scan(req)?,
            MessagePayload::SortRequest(req) => self.handle_sort(req)?,
            MessagePayload::DeleteResultSetRequest(req) => self.handle_delete(req)?,
            MessagePayload::CloseRequest(req) => self.handle_close(req)?,
            other => return Err(format!("{self}: unsupported message type: {other:?}")),
        };

        Ok(Message::from_payload(payload))
    }
}

impl Worker {
    fn handle_init(&mut self, req: &InitializeRequest) -> Result<MessagePayload, String> {
        let (username, password) = extract_credentials(req);

        match self.block_on(self.session.init(username, password)) {
            Ok(outcome) => {
                let mut response = InitializeResponse::default();
                response.implementation_id = Some(outcome.implementation_id.to_string());
                response.implementation_name = Some(outcome.implementation_name.to_string());
                response.implementation_version = Some(outcome.implementation_version.to_string());
                response.result = Some(true);
                Ok(MessagePayload::InitializeResponse(response))
            }
            Err(err) => {
                report(&err, "init")?;
                let mut response = InitializeResponse::default();
                response.result = Some(false);
                Ok(MessagePayload::InitializeResponse(response))
            }
        }
    }

    fn handle_search(&mut self, req: &SearchRequest) -> Result<MessagePayload, String> {
        let mut response = SearchResponse::default();

        let rpn = match translate_query(&req.query) {
            Ok(rpn) => rpn,
            Err(err) => {
                report(&err, "search: query translation")?;
                response.search_status = false;
                return Ok(MessagePayload::SearchResponse(response));
            }
        };

        let outcome = self.block_on(self.session.search(&req.database_names, &req.result_set_name, &rpn));

        match outcome {
            Ok(outcome) => {
                response.result_count = outcome.hits as u32;
                response.search_status = true;
            }
            Err(err) => {
                report(&err, "search")?;
                response.search_status = false;
            }
        }

        Ok(MessagePayload::SearchResponse(response))
    }

    fn handle_present(&mut self, req: &PresentRequest) -> Result<MessagePayload, String> {
        let mut response = PresentResponse::default();

        let start = req.reset_set_start_point;
        let number = req.number_of_records_requested;

        if let Err(err) = self.session.present(&req.result_set_id, start, number) {
            report(&err, "present")?;
            return Ok(MessagePayload::PresentResponse(response));
        }

        let requested_syntax = requested_record_syntax(req);
        let mut records = Vec::with_capacity(number as usize);

        for offset in start..start + number {
            let fetched = self.block_on(self.session.fetch(&req.result_set_id, offset, &requested_syntax, None));
            match fetched {
                Ok(record) => records.push(to_name_plus_record(record)),
                Err(err) => {
                    report(&err, "present: fetch")?;
                    break;
                }
            }
        }

        response.number_of_records_returned = records.len() as u32;
        if !records.is_empty() {
            response.records = Some(Records::ResponseRecords(records));
        }

        Ok(MessagePayload::PresentResponse(response))
    }

    fn handle_scan(&mut self, req: &ScanRequest) -> Result<MessagePayload, String> {
        let mut response = ScanResponse::default();

        let attr_term = match &req.term_list_and_start_point {
            Operand::AttrTerm(attr_term) => attr_term,
            other => {
                report(
                    &GatewayError::protocol(
                        crate::diagnostics::code::UNSUPPORTED_ATTRIBUTE_TYPE,
                        format!("scan term must be an attributes+term operand, got {other:?}"),
                    ),
                    "scan: term translation",
                )?;
                response.scan_status = ScanResponseStatus::Failure as i32;
                return Ok(MessagePayload::ScanResponse(response));
            }
        };

        let rpn = match translate_attr_term(attr_term) {
            Ok(rpn) => rpn,
            Err(err) => {
                report(&err, "scan: term translation")?;
                response.scan_status = ScanResponseStatus::Failure as i32;
                return Ok(MessagePayload::ScanResponse(response));
            }
        };

        let number = req.number_of_terms_requested;
        let position = req.preferred_position_in_response;
        let step_size = req.step_size.unwrap_or(0);

        match self.block_on(self.session.scan(&req.database_names, &rpn, number, position, step_size)) {
            Ok(outcome) => {
                response.number_of_entries_returned = outcome.entries.len() as u32;
                response.scan_status = match outcome.status {
                    ScanStatus::Success => ScanResponseStatus::Success as i32,
                    ScanStatus::Partial => ScanResponseStatus::PartialLast as i32,
                };
                response.entries = Some(ListEntries {
                    entries: outcome
                        .entries
                        .into_iter()
                        .map(|e| Entry::TermInfo(TermInfo {
                            term: Term::General(e.term.into_bytes().into()),
                            global_occurrences: Some(e.occurrence as u32),
                        }))
                        .collect(),
                });
            }
            Err(err) => {
                report(&err, "scan")?;
                response.scan_status = ScanResponseStatus::Failure as i32;
            }
        }

        Ok(MessagePayload::ScanResponse(response))
    }

    fn handle_sort(&mut self, req: &SortRequest) -> Result<MessagePayload, String> {
        let mut response = SortResponse::default();

        let keys: Vec<SortRequestKey> = req.sort_sequence.iter().map(translate_sort_key).collect();

        match self.block_on(self.session.sort(&req.input_result_set_names, &req.sort_output_result_set_name, &keys)) {
            Ok(_) => {
                response.sort_status = SortResponseStatus::Success as i32;
            }
            Err(err) => {
                report(&err, "sort")?;
                response.sort_status = SortResponseStatus::Failure as i32;
            }
        }

        Ok(MessagePayload::SortResponse(response))
    }

    fn handle_delete(&mut self, _req: &DeleteResultSetRequest) -> Result<MessagePayload, String> {
        self.session.delete();

        let mut response = DeleteResultSetResponse::default();
        response.delete_operation_status = DeleteOperationStatus::Success as i32;
        Ok(MessagePayload::DeleteResultSetResponse(response))
    }

    fn handle_close(&mut self, _req: &CloseRequest) -> Result<MessagePayload, String> {
        self.session.close();

        let mut response = CloseResponse::default();
        response.close_reason = CloseReason::Finished as i32;
        Ok(MessagePayload::CloseResponse(response))
    }
}

/// Pull the username/password the client supplied at Init out of whichever
/// `IdAuthentication` shape it sent. `Open` is YAZ's `user/password` packing
/// convention (no slash means "password blank, not absent" so a present
/// but unparseable Open string still counts as a username with no password);
/// anything else (anonymous, or a form this gateway doesn't model) yields
/// `(None, None)`, same as the wire carried no credentials at all.
fn extract_credentials(req: &InitializeRequest) -> (Option<String>, Option<String>) {
    match &req.id_authentication {
        Some(IdAuthentication::IdPass(pass)) => (Some(pass.user_id.clone()), Some(pass.password.clone())),
        Some(IdAuthentication::Open(s)) => match s.split_once('/') {
            Some((user, pass)) => (Some(user.to_string()), Some(pass.to_string())),
            None => (Some(s.clone()), None),
        },
        _ => (None, None),
    }
}

fn requested_record_syntax(req: &PresentRequest) -> String {
    match req.preferred_record_syntax.as_ref() {
        Some(oid) if **oid == OID_MARCXML => "xml".to_string(),
        _ => "usmarc".to_string(),
    }
}

fn to_name_plus_record(record: FetchedRecord) -> NamePlusRecord {
    let (bytes, direct_reference) = match record {
        FetchedRecord::Marc21(bytes) => (bytes, marc21_identifier()),
        FetchedRecord::Xml(xml) => (xml.into_bytes(), marcxml_identifier()),
        FetchedRecord::Grs1(text) | FetchedRecord::Sutrs(text) => (text.into_bytes(), marcxml_identifier()),
    };

    let mut external = ExternalMessage::new(Encoding::OctetAligned(octet_string(bytes)));
    external.direct_reference = Some(direct_reference);
    NamePlusRecord::new(Record::RetrievalRecord(External(external)))
}

/// Report a failed `Session` call. Reportable diagnostics (`Protocol`/
/// `Backend`) are logged and returned to the caller, which folds them into
/// a normal diagnostic-bearing reply. A `None` diagnostic means a
/// programmer error (`Io`/`Config`/`Other`); those are fatal and this
/// returns `Err`, which `handle_message` propagates straight out, killing
/// the session rather than reporting it as if it were the client's fault.
fn report(err: &GatewayError, op: &str) -> Result<(), String> {
    match err.as_diagnostic() {
        Some(Diagnostic { code, addinfo }) => {
            tracing::warn!(op, code, addinfo, "request failed");
            Ok(())
        }
        None => {
            tracing::error!(op, error = %err, "programmer error in session handler");
            Err(format!("fatal error in {op}: {err}"))
        }
    }
}

/// Translate a decoded Type-1 `Query` into the gateway's internal
/// `RpnNode`, validating BIB-1-only attribute sets along the way (§3, §9).
fn translate_query(query: &Query) -> Result<RpnNode, GatewayError> {
    match query {
        Query::Type1(rpn_query) => translate_structure(&rpn_query.rpn),
        other => Err(GatewayError::protocol(
            crate::diagnostics::code::UNSUPPORTED_ATTRIBUTE_SET,
            format!("unsupported query type: {other:?}"),
        )),
    }
}

fn translate_structure(structure: &RpnStructure) -> Result<RpnNode, GatewayError> {
    match structure {
        RpnStructure::Op(op) => translate_operand(op),
        RpnStructure::RpnOp(op) => {
            let a = translate_structure(&op.rpn1)?;
            let b = translate_structure(&op.rpn2)?;
            match op.op {
                Operator::And => Ok(RpnNode::and(a, b)),
                Operator::Or => Ok(RpnNode::or(a, b)),
                Operator::AndNot => Ok(RpnNode::AndNot(Box::new(a), Box::new(b))),
            }
        }
    }
}

fn translate_operand(op: &Operand) -> Result<RpnNode, GatewayError> {
    match op {
        Operand::AttrTerm(attr_term) => translate_attr_term(attr_term),
        Operand::ResultSet(setname) => Ok(RpnNode::Rsid(setname.clone())),
        other => Err(GatewayError::protocol(
            crate::diagnostics::code::UNSUPPORTED_ATTRIBUTE_TYPE,
            format!("unsupported RPN operand: {other:?}"),
        )),
    }
}

fn translate_attr_term(attr_term: &AttributesPlusTerm) -> Result<RpnNode, GatewayError> {
    let mut attrs = Vec::with_capacity(attr_term.attributes.len());
    for attr in &attr_term.attributes {
        attrs.push(translate_attr(attr)?);
    }
    let term = translate_term(&attr_term.term)?;
    Ok(RpnNode::term(attrs, term))
}

/// Two distinct failure modes (§3, §9): an attribute whose attribute-*set*
/// OID isn't BIB-1 -> 121 ("Unsupported attribute set"); a structurally
/// BIB-1 attribute whose attribute-*type* number doesn't match one of the
/// six kinds this gateway models -> 113 ("Unsupported attribute type").
/// `attribute_set` is only present when the PDU bothered to repeat it
/// (Z39.50 lets later elements in an `AttributesPlusTerm` omit it and
/// inherit the first one's), so a missing field means "still BIB-1" here,
/// not "unknown" -- only an explicit, different OID trips the 121 path.
fn translate_attr(attr: &AttributeElement) -> Result<Attr, GatewayError> {
    if let Some(oid) = &attr.attribute_set {
        if oid.to_string() != diagnostics::BIB1_OID {
            return Err(GatewayError::protocol(
                crate::diagnostics::code::UNSUPPORTED_ATTRIBUTE_SET,
                format!("non-BIB-1 attribute set: {oid}"),
            ));
        }
    }

    let kind: bib1::Attribute = attr.attribute_type.try_into().map_err(|_| {
        GatewayError::protocol(
            crate::diagnostics::code::UNSUPPORTED_ATTRIBUTE_TYPE,
            format!("attribute type {} is not a known BIB-1 kind", attr.attribute_type),
        )
    })?;

    let attribute_type = match kind {
        bib1::Attribute::Use => attr_type::USE,
        bib1::Attribute::Relation => attr_type::RELATION,
        bib1::Attribute::Position => attr_type::POSITION,
        bib1::Attribute::Structure => attr_type::STRUCTURE,
        bib1::Attribute::Truncation => attr_type::TRUNCATION,
        bib1::Attribute::Completeness => attr_type::COMPLETENESS,
    };

    let value = match attr.attribute_value {
        AttributeValue::Numeric(n) => n as u16,
        _ => {
            return Err(GatewayError::protocol(
                crate::diagnostics::code::UNSUPPORTED_ATTRIBUTE_TYPE,
                "non-numeric attribute value",
            ))
        }
    };

    Ok(Attr { attribute_type, value })
}

fn translate_term(term: &Term) -> Result<String, GatewayError> {
    match term {
        Term::General(bytes) => Ok(String::from_utf8_lossy(bytes).to_string()),
        Term::CharacterString(s) => Ok(s.to_string()),
        Term::Numeric(n) => Ok(n.to_string()),
        other => Err(GatewayError::protocol(
            crate::diagnostics::code::UNSUPPORTED_ATTRIBUTE_TYPE,
            format!("unsupported term kind: {other:?}"),
        )),
    }
}

/// `SortKeySpec`'s `sort_element` CHOICE carries either a generic `SortKey`
/// (literal sortfield/elementspec) or a BIB-1 `SortAttr` list; either way we
/// fold it down to the gateway's dialect-neutral `SortRequestKey` so
/// `sort::extract_key` doesn't need to know about wire-level CHOICE shapes.
fn translate_sort_key(key: &SortKeySpec) -> SortRequestKey {
    let (sortfield, elementspec_type, sort_attrs) = match &key.sort_element {
        SortElement::GenericSortKey(GenericSortKey::SortField(field)) => (Some(field.clone()), None, Vec::new()),
        SortElement::GenericSortKey(GenericSortKey::ElementSpec(spec)) => (None, Some(spec.clone()), Vec::new()),
        SortElement::DatabaseSpecific(specs) => {
            let attrs = specs
                .iter()
                .flat_map(|s| s.attributes.iter())
                .filter_map(|attr| translate_attr(attr).ok())
                .collect();
            (None, None, attrs)
        }
    };

    SortRequestKey {
        sortfield,
        elementspec_type,
        sort_attrs,
        relation: key.sort_relation,
        case: key.case_sensitivity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_attr_term_into_rpn_node() {
        let attr_term = AttributesPlusTerm {
            attributes: vec![],
            term: Term::General("war".as_bytes().to_vec().into()),
        };
        let node = translate_attr_term(&attr_term).unwrap();
        match node {
            RpnNode::Term(AttrTerm { term, .. }) => assert_eq!(term, "war"),
            _ => panic!("expected a term node"),
        }
    }

    #[test]
    fn unknown_bib1_attribute_type_is_113() {
        let attr = AttributeElement {
            attribute_set: None,
            attribute_type: 99,
            attribute_value: AttributeValue::Numeric(1),
        };
        let err = translate_attr(&attr).unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(d) if d.code == crate::diagnostics::code::UNSUPPORTED_ATTRIBUTE_TYPE));
    }

    #[test]
    fn non_bib1_attribute_set_is_121() {
        let attr = AttributeElement {
            attribute_set: Some(Box::new(Oid::from("1.2.840.10003.3.2"))),
            attribute_type: 1,
            attribute_value: AttributeValue::Numeric(4),
        };
        let err = translate_attr(&attr).unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(d) if d.code == crate::diagnostics::code::UNSUPPORTED_ATTRIBUTE_SET));
    }

    #[test]
    fn extract_credentials_reads_idpass() {
        let mut req = InitializeRequest::default();
        req.id_authentication = Some(IdAuthentication::IdPass(IdPass {
            group_id: None,
            user_id: "alice".to_string(),
            password: "hunter2".to_string(),
        }));
        let (user, pass) = extract_credentials(&req);
        assert_eq!(user.as_deref(), Some("alice"));
        assert_eq!(pass.as_deref(), Some("hunter2"));
    }

    #[test]
    fn extract_credentials_splits_open_form() {
        let mut req = InitializeRequest::default();
        req.id_authentication = Some(IdAuthentication::Open("alice/hunter2".to_string()));
        let (user, pass) = extract_credentials(&req);
        assert_eq!(user.as_deref(), Some("alice"));
        assert_eq!(pass.as_deref(), Some("hunter2"));
    }

    #[test]
    fn extract_credentials_absent_yields_none() {
        let req = InitializeRequest::default();
        let (user, pass) = extract_credentials(&req);
        assert!(user.is_none());
        assert!(pass.is_none());
    }
}
