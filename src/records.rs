// 📋 Record Model - Normalized payroll tuples
// Five entity categories + deduplicating record set

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// TRANSACTION KIND
// ============================================================================

/// Which family a movement belongs to on the payslip
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Earning line item (nomina12:Percepcion)
    Perception,
    /// Withholding line item (nomina12:Deduccion)
    Deduction,
}

impl TransactionKind {
    /// Single-letter code stored in movement_type.transaction_type
    pub fn code(&self) -> &'static str {
        match self {
            TransactionKind::Perception => "P",
            TransactionKind::Deduction => "D",
        }
    }

    /// XML local name of the repeated element for this kind
    pub fn element_tag(&self) -> &'static str {
        match self {
            TransactionKind::Perception => "Percepcion",
            TransactionKind::Deduction => "Deduccion",
        }
    }

    /// Attribute carrying the document-declared sub-type classification
    pub fn sub_type_attr(&self) -> &'static str {
        match self {
            TransactionKind::Perception => "TipoPercepcion",
            TransactionKind::Deduction => "TipoDeduccion",
        }
    }
}

// ============================================================================
// ENTITY TUPLES
// ============================================================================

/// Issuing employer, keyed by RFC (Mexican taxpayer id)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Emitter {
    pub rfc: String,
    pub name: String,
    pub fiscal_regime: String,
}

/// Paid employee, keyed by RFC
///
/// Fiscal address and regime only exist on CFDI 4.0 receivers; absence is
/// preserved as None so the loader writes NULL instead of an empty string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Receiver {
    pub rfc: String,
    pub name: String,
    pub cfdi_use: String,
    pub fiscal_address: Option<String>,
    pub fiscal_regime: Option<String>,
}

/// One payroll receipt, keyed by the document UUID taken from the file name
///
/// References emitter/receiver by RFC, not by surrogate id. Dates and amounts
/// stay as the exact strings found in the document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Payslip {
    pub uuid: String,
    pub emitter_rfc: String,
    pub receiver_rfc: String,
    pub initial_payment_date: String,
    pub final_payment_date: String,
    pub payment_date: String,
    pub days_paid: String,
    pub payroll_type: String,
    pub total_deductions: String,
    pub total_other_payments: String,
    pub total_perceptions: String,
    pub version: String,
}

/// Catalog entry shared by perceptions and deductions
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MovementType {
    pub id: String,
    pub concept: String,
    pub kind: TransactionKind,
    pub sub_type: String,
}

/// One perception/deduction line on a payslip
///
/// `amount` is a reserved column that is always "0"; the source documents
/// never populate it and the target schema keeps it for a future computed
/// value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Movement {
    pub payslip_uuid: String,
    pub movement_type_id: String,
    pub exempt_amount: String,
    pub taxable_amount: String,
    pub amount: String,
}

// ============================================================================
// CATEGORIES
// ============================================================================

/// The five load targets, in insert order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Emitter,
    Receiver,
    Payslip,
    MovementType,
    Movement,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Emitter,
        Category::Receiver,
        Category::Payslip,
        Category::MovementType,
        Category::Movement,
    ];

    /// Target table name
    pub fn table(&self) -> &'static str {
        match self {
            Category::Emitter => "emitter",
            Category::Receiver => "receiver",
            Category::Payslip => "payslip",
            Category::MovementType => "movement_type",
            Category::Movement => "movements",
        }
    }

    /// Column list, in the order `row()` produces values
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Category::Emitter => &["id", "name", "fiscal_regime"],
            Category::Receiver => &["id", "name", "cfdi_use", "fiscal_address", "fiscal_regime"],
            Category::Payslip => &[
                "id",
                "emitter_id",
                "receiver_id",
                "initial_payment_date",
                "final_payment_date",
                "payment_date",
                "days_paid",
                "type",
                "total_deductions",
                "total_other_payments",
                "total_perceptions",
                "version",
            ],
            Category::MovementType => &["id", "concept", "transaction_type", "transaction_sub_type"],
            Category::Movement => &[
                "payslip_id",
                "movement_type_id",
                "exempt_amount",
                "taxable_amount",
                "amount",
            ],
        }
    }
}

/// One tuple flattened for the loader; None becomes SQL NULL
pub type Row = Vec<Option<String>>;

impl Emitter {
    pub fn row(&self) -> Row {
        vec![
            Some(self.rfc.clone()),
            Some(self.name.clone()),
            Some(self.fiscal_regime.clone()),
        ]
    }
}

impl Receiver {
    pub fn row(&self) -> Row {
        vec![
            Some(self.rfc.clone()),
            Some(self.name.clone()),
            Some(self.cfdi_use.clone()),
            self.fiscal_address.clone(),
            self.fiscal_regime.clone(),
        ]
    }
}

impl Payslip {
    pub fn row(&self) -> Row {
        vec![
            Some(self.uuid.clone()),
            Some(self.emitter_rfc.clone()),
            Some(self.receiver_rfc.clone()),
            Some(self.initial_payment_date.clone()),
            Some(self.final_payment_date.clone()),
            Some(self.payment_date.clone()),
            Some(self.days_paid.clone()),
            Some(self.payroll_type.clone()),
            Some(self.total_deductions.clone()),
            Some(self.total_other_payments.clone()),
            Some(self.total_perceptions.clone()),
            Some(self.version.clone()),
        ]
    }
}

impl MovementType {
    pub fn row(&self) -> Row {
        vec![
            Some(self.id.clone()),
            Some(self.concept.clone()),
            Some(self.kind.code().to_string()),
            Some(self.sub_type.clone()),
        ]
    }
}

impl Movement {
    pub fn row(&self) -> Row {
        vec![
            Some(self.payslip_uuid.clone()),
            Some(self.movement_type_id.clone()),
            Some(self.exempt_amount.clone()),
            Some(self.taxable_amount.clone()),
            Some(self.amount.clone()),
        ]
    }
}

// ============================================================================
// RECORD SET
// ============================================================================

/// Deduplicating container for everything extracted from one or more documents
///
/// BTreeSet keeps iteration order deterministic, so batches reach the loader
/// in a stable order and two extractions of the same document compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    pub emitters: BTreeSet<Emitter>,
    pub receivers: BTreeSet<Receiver>,
    pub payslips: BTreeSet<Payslip>,
    pub movement_types: BTreeSet<MovementType>,
    pub movements: BTreeSet<Movement>,
}

impl RecordSet {
    pub fn new() -> Self {
        RecordSet::default()
    }

    pub fn add_emitter(&mut self, emitter: Emitter) {
        self.emitters.insert(emitter);
    }

    pub fn add_receiver(&mut self, receiver: Receiver) {
        self.receivers.insert(receiver);
    }

    pub fn add_payslip(&mut self, payslip: Payslip) {
        self.payslips.insert(payslip);
    }

    pub fn add_movement_type(&mut self, movement_type: MovementType) {
        self.movement_types.insert(movement_type);
    }

    pub fn add_movement(&mut self, movement: Movement) {
        self.movements.insert(movement);
    }

    /// Fold another record set into this one (cross-document dedup)
    pub fn merge(&mut self, other: RecordSet) {
        self.emitters.extend(other.emitters);
        self.receivers.extend(other.receivers);
        self.payslips.extend(other.payslips);
        self.movement_types.extend(other.movement_types);
        self.movements.extend(other.movements);
    }

    /// Total tuple count across all categories
    pub fn len(&self) -> usize {
        self.emitters.len()
            + self.receivers.len()
            + self.payslips.len()
            + self.movement_types.len()
            + self.movements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-empty categories with their rows, in insert order
    pub fn batches(&self) -> Vec<(Category, Vec<Row>)> {
        let mut batches = Vec::new();

        for category in Category::ALL {
            let rows: Vec<Row> = match category {
                Category::Emitter => self.emitters.iter().map(Emitter::row).collect(),
                Category::Receiver => self.receivers.iter().map(Receiver::row).collect(),
                Category::Payslip => self.payslips.iter().map(Payslip::row).collect(),
                Category::MovementType => {
                    self.movement_types.iter().map(MovementType::row).collect()
                }
                Category::Movement => self.movements.iter().map(Movement::row).collect(),
            };

            if !rows.is_empty() {
                batches.push((category, rows));
            }
        }

        batches
    }
}
