//! Wire shapes exchanged with the quotation service. Field names follow the
//! backend's JSON contract (camelCase); semantic fields map onto
//! [`crate::models::QuotationLine`].

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{QuotationLine, QuotationStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationLineDto {
    /// Persisted line id; `null` signals "create" to the backend.
    pub id: Option<i64>,
    pub item_description: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,
    #[serde(default)]
    pub is_raw_material: Option<bool>,
    #[serde(default)]
    pub parent_item_id: Option<i64>,
    #[serde(default)]
    pub item_id: Option<i64>,
    #[serde(default)]
    pub raw_id: Option<i64>,
    #[serde(default)]
    pub sequence: Option<i32>,
    #[serde(default)]
    pub removed: Option<bool>,
}

impl QuotationLineDto {
    pub fn is_raw(&self) -> bool {
        self.is_raw_material.unwrap_or(false)
    }

    pub fn is_removed(&self) -> bool {
        self.removed.unwrap_or(false)
    }

    pub fn from_line(line: &QuotationLine) -> Self {
        Self {
            id: line.id.persisted(),
            item_description: line.description.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            total: Some(line.total),
            is_raw_material: Some(line.is_raw()),
            parent_item_id: line.parent_item_id.map(|p| p.wire_ref()),
            item_id: line.source_item_id,
            raw_id: line.source_raw_id,
            sequence: line.sequence,
            removed: Some(line.removed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRef {
    pub id: i64,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRef {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Full quotation as fetched from the service, optionally including removed
/// lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationDto {
    pub id: i64,
    pub name: String,
    pub date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub status: QuotationStatus,
    #[serde(default)]
    pub customer: Option<CustomerRef>,
    #[serde(default)]
    pub linked_catalogs: Vec<CatalogRef>,
    #[serde(default)]
    pub items: Vec<QuotationLineDto>,
}

/// List entry for the quotation picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationSummaryDto {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub status: Option<QuotationStatus>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Save payload for `PUT /quotations/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationUpdate {
    pub name: String,
    pub date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub status: QuotationStatus,
    pub customer_id: Option<i64>,
    pub catalog_ids: Vec<i64>,
    pub items: Vec<QuotationLineDto>,
}
