use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Display suffix distinguishing raw material lines from item lines.
/// Stripped again before name-matching against the raw material catalog.
pub const RAW_MATERIAL_SUFFIX: &str = " (Raw Material)";

/// Returns the display description for a raw material catalog entry.
pub fn raw_display_name(name: &str) -> String {
    format!("{}{}", name, RAW_MATERIAL_SUFFIX)
}

/// Strips the raw material display suffix, if present, for catalog matching.
pub fn strip_raw_suffix(description: &str) -> &str {
    description
        .strip_suffix(RAW_MATERIAL_SUFFIX)
        .unwrap_or(description)
        .trim()
}

/// Line identifier, tagged by origin.
///
/// `Persisted` ids are assigned by the backend and stable across saves.
/// `Temporary` tokens are allocated client-side at creation time and are
/// never sent to the backend as a real id: a temporary line serializes as
/// `id: null`, the create signal. Reconciliation branches on the tag, not on
/// a magnitude heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineId {
    Temporary(u64),
    Persisted(i64),
}

impl LineId {
    pub fn is_temporary(&self) -> bool {
        matches!(self, LineId::Temporary(_))
    }

    /// The server-assigned id, if this line has been persisted.
    pub fn persisted(&self) -> Option<i64> {
        match self {
            LineId::Persisted(id) => Some(*id),
            LineId::Temporary(_) => None,
        }
    }

    /// Numeric fallback used when ordering lines without a sequence.
    /// Temporary tokens start at a high base, so unsaved lines sort after
    /// persisted ones.
    pub fn order_hint(&self) -> i64 {
        match self {
            LineId::Persisted(id) => *id,
            LineId::Temporary(token) => *token as i64,
        }
    }

    /// Numeric value carried on the wire when this id is referenced as a
    /// parent: persisted lines use their server id, temporary lines their
    /// token (the backend re-keys children of freshly created items).
    pub fn wire_ref(&self) -> i64 {
        match self {
            LineId::Persisted(id) => *id,
            LineId::Temporary(token) => *token as i64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineKind {
    Item,
    RawMaterial,
}

/// A single quotation line: a top-level item or a raw material nested under
/// its parent item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotationLine {
    pub id: LineId,
    pub kind: LineKind,
    /// Owning item line; always `Some` for raw material lines.
    pub parent_item_id: Option<LineId>,
    pub description: String,
    /// Secondary descriptive text resolved from the matching catalog entry.
    /// Display-only, never edited directly.
    pub long_description: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    /// Derived `quantity * unit_price`; recomputed on every mutation.
    pub total: Decimal,
    pub sequence: Option<i32>,
    pub removed: bool,
    pub source_item_id: Option<i64>,
    pub source_raw_id: Option<i64>,
}

impl QuotationLine {
    pub fn is_raw(&self) -> bool {
        self.kind == LineKind::RawMaterial
    }

    pub fn recompute_total(&mut self) {
        self.total = self.unit_price * Decimal::from(self.quantity);
    }

    /// Ordering key: sequence when present, id-derived fallback otherwise.
    pub fn sort_key(&self) -> i64 {
        match self.sequence {
            Some(seq) => i64::from(seq),
            None => self.id.order_hint(),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
    Finalized,
}

/// Quotation header fields the core needs to round-trip a save. The service
/// owns everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotationHeader {
    pub id: i64,
    pub name: String,
    pub date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub status: QuotationStatus,
}

/// Item catalog entry, used for display enrichment and merge-matching only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: i64,
    pub item_name: String,
    #[serde(default)]
    pub item_price: Option<Decimal>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Raw material catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMaterial {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub description: Option<String>,
}
