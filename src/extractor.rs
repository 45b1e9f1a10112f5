// 🧾 Document Extractor - CFDI Nómina XML → normalized record set
// Streams namespaced XML events and projects them into the five tuple families

use crate::records::{
    Emitter, Movement, MovementType, Payslip, Receiver, RecordSet, TransactionKind,
};
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Fixed namespace of the Nómina 1.2 payroll complement
pub const NOMINA_NS: &str = "http://www.sat.gob.mx/nomina12";

/// Canonical UUID shape (8-4-4-4-12 hex groups), case-insensitive
const UUID_PATTERN: &str =
    "[A-Fa-f0-9]{8}-[A-Fa-f0-9]{4}-[A-Fa-f0-9]{4}-[A-Fa-f0-9]{4}-[A-Fa-f0-9]{12}";

// ============================================================================
// ERROR TAXONOMY
// ============================================================================

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The source identifier carries no UUID, so the payslip has no key
    #[error("no UUID found in source name '{source_name}'")]
    MalformedInput { source_name: String },

    /// A document without this element is not a payroll CFDI
    #[error("required element '{element}' not found")]
    MissingElement { element: &'static str },

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed XML attribute: {0}")]
    Attr(#[from] AttrError),
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Scalar attributes of the nomina12:Nomina element
///
/// Totals default to "0" when absent or empty; everything else passes through
/// verbatim. Amounts stay as decimal strings so no precision is lost before
/// the database interprets them.
#[derive(Debug)]
struct PayrollHeader {
    initial_payment_date: String,
    final_payment_date: String,
    payment_date: String,
    days_paid: String,
    payroll_type: String,
    total_deductions: String,
    total_other_payments: String,
    total_perceptions: String,
    version: String,
}

/// Extract one payroll document into a deduplicated record set
///
/// `source_name` is the file name (or any source identifier) that carries the
/// document UUID; it is checked before any XML is parsed. The CFDI base
/// namespace is taken from the root element because it differs between CFDI
/// 3.3 and 4.0, while the payroll namespace is fixed.
pub fn extract_payroll(xml: &str, source_name: &str) -> Result<RecordSet, ExtractError> {
    let payslip_uuid = find_uuid(source_name).ok_or_else(|| ExtractError::MalformedInput {
        source_name: source_name.to_string(),
    })?;

    let mut reader = NsReader::from_str(xml);

    let mut cfdi_ns: Option<Vec<u8>> = None;
    let mut header: Option<PayrollHeader> = None;
    let mut emitter: Option<Emitter> = None;
    let mut receiver: Option<Receiver> = None;
    let mut records = RecordSet::new();

    loop {
        match reader.read_resolved_event()? {
            (_, Event::Eof) => break,
            (resolved, Event::Start(e)) | (resolved, Event::Empty(e)) => {
                let ns: Option<&[u8]> = match resolved {
                    ResolveResult::Bound(Namespace(n)) => Some(n),
                    _ => None,
                };

                // The first element is the root; its namespace is the CFDI
                // base namespace for every later lookup.
                if cfdi_ns.is_none() {
                    cfdi_ns = Some(ns.unwrap_or_default().to_vec());
                    continue;
                }

                let local = e.local_name();
                if ns == Some(NOMINA_NS.as_bytes()) {
                    match local.as_ref() {
                        b"Nomina" if header.is_none() => header = Some(read_header(&e)?),
                        b"Percepcion" => normalize_movement(
                            &e,
                            &payslip_uuid,
                            TransactionKind::Perception,
                            &mut records,
                        )?,
                        b"Deduccion" => normalize_movement(
                            &e,
                            &payslip_uuid,
                            TransactionKind::Deduction,
                            &mut records,
                        )?,
                        _ => {}
                    }
                } else if ns == cfdi_ns.as_deref() {
                    match local.as_ref() {
                        b"Emisor" if emitter.is_none() => emitter = Some(read_emitter(&e)?),
                        b"Receptor" if receiver.is_none() => receiver = Some(read_receiver(&e)?),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    let header = header.ok_or(ExtractError::MissingElement { element: "Nomina" })?;
    let emitter = emitter.ok_or(ExtractError::MissingElement { element: "Emisor" })?;
    let receiver = receiver.ok_or(ExtractError::MissingElement { element: "Receptor" })?;

    records.add_payslip(Payslip {
        uuid: payslip_uuid,
        emitter_rfc: emitter.rfc.clone(),
        receiver_rfc: receiver.rfc.clone(),
        initial_payment_date: header.initial_payment_date,
        final_payment_date: header.final_payment_date,
        payment_date: header.payment_date,
        days_paid: header.days_paid,
        payroll_type: header.payroll_type,
        total_deductions: header.total_deductions,
        total_other_payments: header.total_other_payments,
        total_perceptions: header.total_perceptions,
        version: header.version,
    });
    records.add_emitter(emitter);
    records.add_receiver(receiver);

    Ok(records)
}

fn read_header(e: &BytesStart) -> Result<PayrollHeader, ExtractError> {
    Ok(PayrollHeader {
        initial_payment_date: attr_or_default(e, "FechaInicialPago")?,
        final_payment_date: attr_or_default(e, "FechaFinalPago")?,
        payment_date: attr_or_default(e, "FechaPago")?,
        days_paid: attr_or_default(e, "NumDiasPagados")?,
        payroll_type: attr_or_default(e, "TipoNomina")?,
        total_deductions: attr_or_zero(e, "TotalDeducciones")?,
        total_other_payments: attr_or_zero(e, "TotalOtrosPagos")?,
        total_perceptions: attr_or_zero(e, "TotalPercepciones")?,
        version: attr_or_default(e, "Version")?,
    })
}

fn read_emitter(e: &BytesStart) -> Result<Emitter, ExtractError> {
    Ok(Emitter {
        rfc: attr_or_default(e, "Rfc")?,
        name: attr_or_default(e, "Nombre")?,
        fiscal_regime: attr_or_default(e, "RegimenFiscal")?,
    })
}

fn read_receiver(e: &BytesStart) -> Result<Receiver, ExtractError> {
    Ok(Receiver {
        rfc: attr_or_default(e, "Rfc")?,
        name: attr_or_default(e, "Nombre")?,
        cfdi_use: attr_or_default(e, "UsoCFDI")?,
        // Only present on CFDI 4.0 receivers; absence becomes NULL downstream
        fiscal_address: attr(e, "DomicilioFiscalReceptor")?,
        fiscal_regime: attr(e, "RegimenFiscalReceptor")?,
    })
}

// ============================================================================
// MOVEMENT NORMALIZER
// ============================================================================

/// Project one Percepcion/Deduccion element onto the shared movement shape
///
/// Every element yields its own Movement row; only full-tuple duplicates
/// collapse in the record set. The trailing "0" is the reserved amount column.
fn normalize_movement(
    e: &BytesStart,
    payslip_uuid: &str,
    kind: TransactionKind,
    records: &mut RecordSet,
) -> Result<(), ExtractError> {
    let movement_type_id = attr_or_default(e, "Clave")?;
    let concept = attr_or_default(e, "Concepto")?;
    let exempt_amount = attr_or_zero(e, "ImporteExento")?;
    let taxable_amount = attr_or_zero(e, "ImporteGravado")?;
    let sub_type = attr_or_default(e, kind.sub_type_attr())?;

    records.add_movement_type(MovementType {
        id: movement_type_id.clone(),
        concept,
        kind,
        sub_type,
    });
    records.add_movement(Movement {
        payslip_uuid: payslip_uuid.to_string(),
        movement_type_id,
        exempt_amount,
        taxable_amount,
        amount: "0".to_string(),
    });

    Ok(())
}

// ============================================================================
// ATTRIBUTE POLICY
// ============================================================================

/// Verbatim attribute value, None when absent
fn attr(e: &BytesStart, name: &str) -> Result<Option<String>, ExtractError> {
    match e.try_get_attribute(name)? {
        Some(a) => Ok(Some(a.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Verbatim attribute value, empty string when absent
fn attr_or_default(e: &BytesStart, name: &str) -> Result<String, ExtractError> {
    Ok(attr(e, name)?.unwrap_or_default())
}

/// Optional numeric attribute: absent or empty → "0", anything else verbatim
fn attr_or_zero(e: &BytesStart, name: &str) -> Result<String, ExtractError> {
    Ok(match attr(e, name)? {
        Some(value) if !value.is_empty() => value,
        _ => "0".to_string(),
    })
}

fn find_uuid(source_name: &str) -> Option<String> {
    static UUID_RE: OnceLock<Regex> = OnceLock::new();
    let re = UUID_RE.get_or_init(|| Regex::new(UUID_PATTERN).expect("UUID pattern is valid"));
    re.find(source_name).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE_40: &str = "files/1fa85f64-5717-4562-b3fc-2c963f66afa6.xml";
    const UUID_40: &str = "1fa85f64-5717-4562-b3fc-2c963f66afa6";

    /// CFDI 4.0 payslip with one perception and one deduction
    const CFDI_40: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<cfdi:Comprobante xmlns:cfdi="http://www.sat.gob.mx/cfd/4" Version="4.0">
  <cfdi:Emisor Rfc="AAA010101AAA" Nombre="EMPRESA SA DE CV" RegimenFiscal="601"/>
  <cfdi:Receptor Rfc="XAXX010101000" Nombre="JUAN PEREZ" UsoCFDI="CN01" DomicilioFiscalReceptor="64000" RegimenFiscalReceptor="605"/>
  <cfdi:Complemento>
    <nomina12:Nomina xmlns:nomina12="http://www.sat.gob.mx/nomina12" Version="1.2"
                     TipoNomina="O" FechaPago="2024-01-15" FechaInicialPago="2024-01-01"
                     FechaFinalPago="2024-01-15" NumDiasPagados="15"
                     TotalPercepciones="1000.00" TotalDeducciones="150.00">
      <nomina12:Emisor RegistroPatronal="B5510768108"/>
      <nomina12:Percepciones TotalGravado="1000.00" TotalExento="0.00">
        <nomina12:Percepcion TipoPercepcion="001" Clave="001" Concepto="Sueldos"
                             ImporteGravado="1000.00" ImporteExento="0.00"/>
      </nomina12:Percepciones>
      <nomina12:Deducciones>
        <nomina12:Deduccion TipoDeduccion="002" Clave="002" Concepto="ISR"
                            ImporteGravado="150.00"/>
      </nomina12:Deducciones>
    </nomina12:Nomina>
  </cfdi:Complemento>
</cfdi:Comprobante>"#;

    /// CFDI 3.3 variant: different base namespace, no receiver fiscal fields
    const CFDI_33: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<cfdi:Comprobante xmlns:cfdi="http://www.sat.gob.mx/cfd/3" Version="3.3">
  <cfdi:Emisor Rfc="AAA010101AAA" Nombre="EMPRESA SA DE CV" RegimenFiscal="601"/>
  <cfdi:Receptor Rfc="XAXX010101000" Nombre="JUAN PEREZ" UsoCFDI="P01"/>
  <cfdi:Complemento>
    <nomina12:Nomina xmlns:nomina12="http://www.sat.gob.mx/nomina12" Version="1.2"
                     TipoNomina="O" FechaPago="2020-06-15" FechaInicialPago="2020-06-01"
                     FechaFinalPago="2020-06-15" NumDiasPagados="15"
                     TotalPercepciones="850.50">
      <nomina12:Percepciones>
        <nomina12:Percepcion TipoPercepcion="001" Clave="001" Concepto="Sueldos"
                             ImporteGravado="850.50" ImporteExento="0.00"/>
      </nomina12:Percepciones>
    </nomina12:Nomina>
  </cfdi:Complemento>
</cfdi:Comprobante>"#;

    #[test]
    fn test_one_emitter_one_receiver() {
        let records = extract_payroll(CFDI_40, SOURCE_40).unwrap();

        assert_eq!(records.emitters.len(), 1, "Exactly one emitter per document");
        assert_eq!(records.receivers.len(), 1, "Exactly one receiver per document");
        assert_eq!(records.payslips.len(), 1);

        let emitter = records.emitters.iter().next().unwrap();
        assert_eq!(emitter.rfc, "AAA010101AAA");
        assert_eq!(emitter.name, "EMPRESA SA DE CV");
        assert_eq!(emitter.fiscal_regime, "601");

        let receiver = records.receivers.iter().next().unwrap();
        assert_eq!(receiver.rfc, "XAXX010101000");
        assert_eq!(receiver.cfdi_use, "CN01");
        assert_eq!(receiver.fiscal_address.as_deref(), Some("64000"));
        assert_eq!(receiver.fiscal_regime.as_deref(), Some("605"));

        let payslip = records.payslips.iter().next().unwrap();
        assert_eq!(payslip.uuid, UUID_40);
        assert_eq!(payslip.emitter_rfc, "AAA010101AAA");
        assert_eq!(payslip.receiver_rfc, "XAXX010101000");
        assert_eq!(payslip.payment_date, "2024-01-15");
        assert_eq!(payslip.days_paid, "15");
        assert_eq!(payslip.payroll_type, "O");
        assert_eq!(payslip.version, "1.2");
    }

    #[test]
    fn test_cfdi_33_base_namespace_is_resolved_from_root() {
        let records = extract_payroll(CFDI_33, SOURCE_40).unwrap();

        assert_eq!(records.emitters.len(), 1);
        let receiver = records.receivers.iter().next().unwrap();
        assert_eq!(receiver.cfdi_use, "P01");
        assert_eq!(
            receiver.fiscal_address, None,
            "3.3 receivers carry no fiscal address; must stay NULL, not empty"
        );
        assert_eq!(receiver.fiscal_regime, None);
    }

    #[test]
    fn test_optional_totals_default_to_zero_and_pass_through_verbatim() {
        // TotalOtrosPagos absent, TotalDeducciones explicitly empty
        let xml = CFDI_40.replace(
            r#"TotalPercepciones="1000.00" TotalDeducciones="150.00""#,
            r#"TotalPercepciones="1234.5600" TotalDeducciones="""#,
        );
        let records = extract_payroll(&xml, SOURCE_40).unwrap();

        let payslip = records.payslips.iter().next().unwrap();
        assert_eq!(payslip.total_other_payments, "0", "Absent attribute yields zero");
        assert_eq!(payslip.total_deductions, "0", "Empty attribute yields zero");
        assert_eq!(
            payslip.total_perceptions, "1234.5600",
            "Present values are preserved byte-for-byte, no rounding"
        );
    }

    #[test]
    fn test_movement_count_equals_source_elements() {
        // Second perception shares Clave 001 but has a different amount
        let xml = CFDI_40.replace(
            "</nomina12:Percepciones>",
            r#"<nomina12:Percepcion TipoPercepcion="001" Clave="001" Concepto="Sueldos"
                   ImporteGravado="250.00" ImporteExento="0.00"/></nomina12:Percepciones>"#,
        );
        let records = extract_payroll(&xml, SOURCE_40).unwrap();

        assert_eq!(
            records.movements.len(),
            3,
            "Duplicate codes still produce distinct movement rows"
        );
        // Same (code, concept, kind, sub_type) collapses to one catalog entry
        assert_eq!(records.movement_types.len(), 2);
    }

    #[test]
    fn test_fully_identical_movements_collapse() {
        let duplicate = r#"<nomina12:Percepcion TipoPercepcion="001" Clave="001" Concepto="Sueldos"
                             ImporteGravado="1000.00" ImporteExento="0.00"/>"#;
        let xml = CFDI_40.replace(
            "</nomina12:Percepciones>",
            &format!("{}</nomina12:Percepciones>", duplicate),
        );
        let records = extract_payroll(&xml, SOURCE_40).unwrap();

        assert_eq!(records.movements.len(), 2, "Attribute-identical rows collapse to one");
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let first = extract_payroll(CFDI_40, SOURCE_40).unwrap();
        let second = extract_payroll(CFDI_40, SOURCE_40).unwrap();

        assert_eq!(first, second, "Extraction is a pure function of its input");
    }

    #[test]
    fn test_source_without_uuid_fails_before_parsing() {
        // Content is not even XML; the UUID check must reject first
        let err = extract_payroll("definitely not xml", "files/nomina.xml").unwrap_err();

        match err {
            ExtractError::MalformedInput { source_name } => {
                assert_eq!(source_name, "files/nomina.xml")
            }
            other => panic!("Expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_elements() {
        let no_nomina = r#"<cfdi:Comprobante xmlns:cfdi="http://www.sat.gob.mx/cfd/4">
            <cfdi:Emisor Rfc="AAA010101AAA"/><cfdi:Receptor Rfc="XAXX010101000"/>
        </cfdi:Comprobante>"#;
        match extract_payroll(no_nomina, SOURCE_40).unwrap_err() {
            ExtractError::MissingElement { element } => assert_eq!(element, "Nomina"),
            other => panic!("Expected MissingElement, got {:?}", other),
        }

        let no_emitter = CFDI_40.replace(
            r#"<cfdi:Emisor Rfc="AAA010101AAA" Nombre="EMPRESA SA DE CV" RegimenFiscal="601"/>"#,
            "",
        );
        match extract_payroll(&no_emitter, SOURCE_40).unwrap_err() {
            ExtractError::MissingElement { element } => assert_eq!(element, "Emisor"),
            other => panic!("Expected MissingElement, got {:?}", other),
        }

        let no_receiver = CFDI_40.replace(
            r#"<cfdi:Receptor Rfc="XAXX010101000" Nombre="JUAN PEREZ" UsoCFDI="CN01" DomicilioFiscalReceptor="64000" RegimenFiscalReceptor="605"/>"#,
            "",
        );
        match extract_payroll(&no_receiver, SOURCE_40).unwrap_err() {
            ExtractError::MissingElement { element } => assert_eq!(element, "Receptor"),
            other => panic!("Expected MissingElement, got {:?}", other),
        }
    }

    #[test]
    fn test_nomina_emisor_does_not_shadow_cfdi_emisor() {
        // The complement carries its own nomina12:Emisor (RegistroPatronal
        // only); the extractor must keep the one in the CFDI base namespace.
        let records = extract_payroll(CFDI_40, SOURCE_40).unwrap();
        let emitter = records.emitters.iter().next().unwrap();

        assert_eq!(emitter.rfc, "AAA010101AAA");
        assert_eq!(emitter.fiscal_regime, "601");
    }

    #[test]
    fn test_end_to_end_movement_tuples() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<cfdi:Comprobante xmlns:cfdi="http://www.sat.gob.mx/cfd/4" Version="4.0">
  <cfdi:Emisor Rfc="AAA010101AAA" Nombre="EMPRESA SA DE CV" RegimenFiscal="601"/>
  <cfdi:Receptor Rfc="XAXX010101000" Nombre="JUAN PEREZ" UsoCFDI="CN01"/>
  <cfdi:Complemento>
    <nomina12:Nomina xmlns:nomina12="http://www.sat.gob.mx/nomina12" Version="1.2"
                     TipoNomina="O" FechaPago="2024-01-15" FechaInicialPago="2024-01-01"
                     FechaFinalPago="2024-01-15" NumDiasPagados="15">
      <nomina12:Percepciones>
        <nomina12:Percepcion Clave="001" Concepto="Sueldos"
                             ImporteExento="0" ImporteGravado="1000"/>
      </nomina12:Percepciones>
      <nomina12:Deducciones>
        <nomina12:Deduccion Clave="002" Concepto="ISR" ImporteGravado="150"/>
      </nomina12:Deducciones>
    </nomina12:Nomina>
  </cfdi:Complemento>
</cfdi:Comprobante>"#;

        let records = extract_payroll(xml, SOURCE_40).unwrap();

        let movements: Vec<&Movement> = records.movements.iter().collect();
        assert_eq!(movements.len(), 2);
        assert!(records.movements.contains(&Movement {
            payslip_uuid: UUID_40.to_string(),
            movement_type_id: "001".to_string(),
            exempt_amount: "0".to_string(),
            taxable_amount: "1000".to_string(),
            amount: "0".to_string(),
        }));
        assert!(records.movements.contains(&Movement {
            payslip_uuid: UUID_40.to_string(),
            movement_type_id: "002".to_string(),
            exempt_amount: "0".to_string(),
            taxable_amount: "150".to_string(),
            amount: "0".to_string(),
        }));

        // Sub-type attributes are absent, so both catalog entries carry ""
        assert!(records.movement_types.contains(&MovementType {
            id: "001".to_string(),
            concept: "Sueldos".to_string(),
            kind: TransactionKind::Perception,
            sub_type: String::new(),
        }));
        assert!(records.movement_types.contains(&MovementType {
            id: "002".to_string(),
            concept: "ISR".to_string(),
            kind: TransactionKind::Deduction,
            sub_type: String::new(),
        }));
    }

    #[test]
    fn test_uuid_match_is_case_insensitive() {
        let source = "files/1FA85F64-5717-4562-B3FC-2C963F66AFA6.xml";
        let records = extract_payroll(CFDI_40, source).unwrap();

        let payslip = records.payslips.iter().next().unwrap();
        assert_eq!(payslip.uuid, "1FA85F64-5717-4562-B3FC-2C963F66AFA6");
    }
}
