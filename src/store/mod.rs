//! In-memory line store for the currently open quotation.
//!
//! Owns the ordered active list and the parallel soft-removed list, and is
//! the only place line mutations happen, so the parent/child and
//! total-derivation invariants are enforced in one aggregate.

use rust_decimal::Decimal;
use tracing::debug;

use crate::errors::ServiceError;
use crate::models::{
    raw_display_name, CatalogItem, LineId, LineKind, QuotationLine, RawMaterial,
};

/// Temporary tokens start high so id-ordered fallbacks place unsaved lines
/// after persisted ones.
const TEMP_TOKEN_BASE: u64 = 1 << 40;

#[derive(Debug, Default)]
pub struct LineStore {
    active: Vec<QuotationLine>,
    removed: Vec<QuotationLine>,
    editing: Option<LineId>,
    next_temp_token: u64,
}

impl LineStore {
    pub fn new() -> Self {
        Self {
            active: Vec::new(),
            removed: Vec::new(),
            editing: None,
            next_temp_token: TEMP_TOKEN_BASE,
        }
    }

    /// Rebuilds the store from hydrated server state. Any in-progress edit
    /// is discarded.
    pub fn from_parts(active: Vec<QuotationLine>, removed: Vec<QuotationLine>) -> Self {
        let max_token = active
            .iter()
            .chain(removed.iter())
            .filter_map(|l| match l.id {
                LineId::Temporary(t) => Some(t),
                LineId::Persisted(_) => None,
            })
            .max();
        Self {
            active,
            removed,
            editing: None,
            next_temp_token: max_token.map_or(TEMP_TOKEN_BASE, |t| t + 1),
        }
    }

    pub fn active(&self) -> &[QuotationLine] {
        &self.active
    }

    pub fn removed_lines(&self) -> &[QuotationLine] {
        &self.removed
    }

    pub fn editing(&self) -> Option<LineId> {
        self.editing
    }

    pub fn find(&self, id: LineId) -> Option<&QuotationLine> {
        self.active
            .iter()
            .find(|l| l.id == id)
            .or_else(|| self.removed.iter().find(|l| l.id == id))
    }

    fn next_temp_id(&mut self) -> LineId {
        let token = self.next_temp_token;
        self.next_temp_token += 1;
        LineId::Temporary(token)
    }

    /// Adds an item line, or increments the quantity of the active line that
    /// already references this catalog item (by foreign key, or by
    /// description when the key is absent). The existing rate is kept unless
    /// an explicit one is supplied. Returns the line id and whether the add
    /// merged into an existing line.
    pub fn add_item(
        &mut self,
        item: &CatalogItem,
        quantity: u32,
        rate: Option<Decimal>,
    ) -> Result<(LineId, bool), ServiceError> {
        if quantity == 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".into(),
            ));
        }

        if let Some(existing) = self.active.iter_mut().find(|l| {
            !l.is_raw()
                && (l.source_item_id == Some(item.id) || l.description == item.item_name)
        }) {
            existing.quantity += quantity;
            if let Some(rate) = rate {
                existing.unit_price = rate.max(Decimal::ZERO);
            }
            existing.recompute_total();
            debug!(line = ?existing.id, quantity = existing.quantity, "merged item line");
            return Ok((existing.id, true));
        }

        let id = self.next_temp_id();
        let mut line = QuotationLine {
            id,
            kind: LineKind::Item,
            parent_item_id: None,
            description: item.item_name.clone(),
            long_description: item.description.clone(),
            quantity,
            unit_price: rate
                .or(item.item_price)
                .unwrap_or(Decimal::ZERO)
                .max(Decimal::ZERO),
            total: Decimal::ZERO,
            sequence: Some(self.active.len() as i32),
            removed: false,
            source_item_id: Some(item.id),
            source_raw_id: None,
        };
        line.recompute_total();
        self.active.push(line);
        Ok((id, false))
    }

    /// Adds a raw material line under the most recently added active item
    /// line, or increments the matching raw already present under that
    /// parent. Fails when no active item line exists to own it.
    pub fn add_raw_material(
        &mut self,
        raw: &RawMaterial,
        quantity: u32,
        rate: Option<Decimal>,
    ) -> Result<(LineId, bool), ServiceError> {
        if quantity == 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".into(),
            ));
        }

        let parent_id = self
            .active
            .iter()
            .rev()
            .find(|l| !l.is_raw())
            .map(|l| l.id)
            .ok_or_else(|| {
                ServiceError::ValidationError("Add an item line before raw materials".into())
            })?;

        let display = raw_display_name(&raw.name);
        if let Some(existing) = self.active.iter_mut().find(|l| {
            l.is_raw()
                && l.parent_item_id == Some(parent_id)
                && (l.source_raw_id == Some(raw.id) || l.description == display)
        }) {
            existing.quantity += quantity;
            if let Some(rate) = rate {
                existing.unit_price = rate.max(Decimal::ZERO);
            }
            existing.recompute_total();
            debug!(line = ?existing.id, quantity = existing.quantity, "merged raw line");
            return Ok((existing.id, true));
        }

        let id = self.next_temp_id();
        let mut line = QuotationLine {
            id,
            kind: LineKind::RawMaterial,
            parent_item_id: Some(parent_id),
            description: display,
            long_description: raw.description.clone(),
            quantity,
            unit_price: rate
                .or(raw.price)
                .unwrap_or(Decimal::ZERO)
                .max(Decimal::ZERO),
            total: Decimal::ZERO,
            sequence: Some(self.active.len() as i32),
            removed: false,
            source_item_id: None,
            source_raw_id: Some(raw.id),
        };
        line.recompute_total();
        self.active.push(line);
        Ok((id, false))
    }

    /// Decrements the line's quantity by one. Quantity never drops below 1:
    /// at 1 this is a no-op (remove is the way to drop the line). Returns
    /// whether a decrement happened.
    pub fn decrement(&mut self, id: LineId) -> Result<bool, ServiceError> {
        let line = self
            .active
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("Line {:?} not found", id)))?;
        if line.quantity <= 1 {
            return Ok(false);
        }
        line.quantity -= 1;
        line.recompute_total();
        Ok(true)
    }

    /// Enters edit mode for the given active line. Starting a new edit
    /// replaces any edit already in progress; only one line is ever in edit
    /// mode.
    pub fn start_edit(&mut self, id: LineId) -> Result<(), ServiceError> {
        if !self.active.iter().any(|l| l.id == id) {
            return Err(ServiceError::NotFound(format!("Line {:?} not found", id)));
        }
        self.editing = Some(id);
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Clamps edited values to the model invariants: quantity >= 1,
    /// rate >= 0.
    pub fn clamp_edit(quantity: u32, rate: Decimal) -> (u32, Decimal) {
        (quantity.max(1), rate.max(Decimal::ZERO))
    }

    /// Applies an edit to the line currently in edit mode and leaves edit
    /// mode. The values are clamped, and the total recomputed.
    pub fn save_edit(
        &mut self,
        id: LineId,
        quantity: u32,
        rate: Decimal,
    ) -> Result<(), ServiceError> {
        if self.editing != Some(id) {
            return Err(ServiceError::InvalidOperation(
                "Line is not in edit mode".into(),
            ));
        }
        let (quantity, rate) = Self::clamp_edit(quantity, rate);
        let line = self
            .active
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("Line {:?} not found", id)))?;
        line.quantity = quantity;
        line.unit_price = rate;
        line.recompute_total();
        self.editing = None;
        Ok(())
    }

    /// Moves a line from the active list to the removed list. Children of a
    /// removed item are not cascaded: they keep their `parent_item_id` and
    /// stay hidden until the parent reappears.
    pub fn remove_local(&mut self, id: LineId) -> Result<(), ServiceError> {
        let idx = self
            .active
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("Line {:?} not found", id)))?;
        let mut line = self.active.remove(idx);
        line.removed = true;
        if self.editing == Some(id) {
            self.editing = None;
        }
        self.removed.push(line);
        Ok(())
    }

    /// Moves a removed line back to the active list, re-inserted at the
    /// position its sequence (or id) dictates so a subsequent save keeps its
    /// original order.
    pub fn undo_local(&mut self, id: LineId) -> Result<(), ServiceError> {
        let idx = self
            .removed
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("Removed line {:?} not found", id)))?;
        let mut line = self.removed.remove(idx);
        line.removed = false;
        let pos = self
            .active
            .iter()
            .position(|l| l.sort_key() > line.sort_key())
            .unwrap_or(self.active.len());
        self.active.insert(pos, line);
        Ok(())
    }

    /// Grand total over active item lines. Raw material lines never
    /// contribute: their cost is folded into the parent item's rate by
    /// business convention.
    pub fn grand_total(&self) -> Decimal {
        self.active
            .iter()
            .filter(|l| !l.is_raw())
            .map(|l| l.total)
            .sum()
    }
}
