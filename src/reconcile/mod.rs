//! Load-time enrichment and save-time diffing between the local line store
//! and the last fetched server state.
//!
//! The server owns persisted ids, but add/remove/undo stay fully client-side
//! for responsiveness; the save model reconciles "what the user did since
//! load" against "what the server had" in one pass, without a round trip per
//! click.

use std::collections::{HashMap, HashSet};

use crate::dto::{QuotationDto, QuotationLineDto, QuotationUpdate};
use crate::models::{
    strip_raw_suffix, CatalogItem, LineId, LineKind, QuotationHeader, QuotationLine,
    QuotationStatus, RawMaterial,
};

/// Fallback token base for server lines arriving without an id.
const HYDRATE_TEMP_BASE: u64 = 1 << 40;

/// Result of hydrating a fetched quotation: enriched line partitions plus
/// the header fields needed to round-trip a save. The line lists double as
/// the new "last known server state" baseline.
#[derive(Debug, Clone)]
pub struct HydratedQuotation {
    pub header: QuotationHeader,
    pub customer_id: Option<i64>,
    pub linked_catalog_ids: Vec<i64>,
    pub active: Vec<QuotationLine>,
    pub removed: Vec<QuotationLine>,
}

impl HydratedQuotation {
    /// All lines, active first, as the reconciliation baseline.
    pub fn baseline(&self) -> Vec<QuotationLine> {
        let mut all = self.active.clone();
        all.extend(self.removed.iter().cloned());
        all
    }
}

/// Hydrates a server quotation: partitions lines into active/removed, orders
/// each partition by sequence (id fallback), and resolves missing foreign
/// keys by exact name match against the catalogs. Unresolvable lines keep a
/// blank long description and no foreign key; that is a degraded state, not
/// an error.
pub fn hydrate(
    dto: &QuotationDto,
    items: &[CatalogItem],
    raws: &[RawMaterial],
) -> HydratedQuotation {
    let mut active = Vec::new();
    let mut removed = Vec::new();

    for (idx, line_dto) in dto.items.iter().enumerate() {
        let line = line_from_dto(line_dto, idx, items, raws);
        if line.removed {
            removed.push(line);
        } else {
            active.push(line);
        }
    }

    active.sort_by_key(QuotationLine::sort_key);
    removed.sort_by_key(QuotationLine::sort_key);

    HydratedQuotation {
        header: QuotationHeader {
            id: dto.id,
            name: dto.name.clone(),
            date: dto.date,
            expiry_date: dto.expiry_date,
            status: dto.status,
        },
        customer_id: dto.customer.as_ref().map(|c| c.id),
        linked_catalog_ids: dto.linked_catalogs.iter().map(|c| c.id).collect(),
        active,
        removed,
    }
}

fn line_from_dto(
    dto: &QuotationLineDto,
    idx: usize,
    items: &[CatalogItem],
    raws: &[RawMaterial],
) -> QuotationLine {
    let id = match dto.id {
        Some(id) => LineId::Persisted(id),
        None => LineId::Temporary(HYDRATE_TEMP_BASE + idx as u64),
    };
    let kind = if dto.is_raw() {
        LineKind::RawMaterial
    } else {
        LineKind::Item
    };

    let (source_item_id, source_raw_id, long_description) = match kind {
        LineKind::RawMaterial => {
            let resolved = dto
                .raw_id
                .and_then(|rid| raws.iter().find(|r| r.id == rid))
                .or_else(|| {
                    let name = strip_raw_suffix(&dto.item_description);
                    raws.iter().find(|r| r.name == name)
                });
            (
                None,
                resolved.map(|r| r.id).or(dto.raw_id),
                resolved.and_then(|r| r.description.clone()),
            )
        }
        LineKind::Item => {
            let resolved = dto
                .item_id
                .and_then(|iid| items.iter().find(|i| i.id == iid))
                .or_else(|| items.iter().find(|i| i.item_name == dto.item_description));
            (
                resolved.map(|i| i.id).or(dto.item_id),
                None,
                resolved.and_then(|i| i.description.clone()),
            )
        }
    };

    let mut line = QuotationLine {
        id,
        kind,
        parent_item_id: dto.parent_item_id.map(LineId::Persisted),
        description: dto.item_description.clone(),
        long_description,
        quantity: dto.quantity.max(1),
        unit_price: dto.unit_price,
        total: rust_decimal::Decimal::ZERO,
        sequence: dto.sequence,
        removed: dto.is_removed(),
        source_item_id,
        source_raw_id,
    };
    line.recompute_total();
    line
}

fn refresh_fields(target: &mut QuotationLine, source: &QuotationLine) {
    target.kind = source.kind;
    target.parent_item_id = source.parent_item_id;
    target.description = source.description.clone();
    target.long_description = source.long_description.clone();
    target.quantity = source.quantity;
    target.unit_price = source.unit_price;
    target.source_item_id = source.source_item_id;
    target.source_raw_id = source.source_raw_id;
    target.recompute_total();
}

/// Diffs the local working sets against the last known server state and
/// produces the minimal, sequence-consistent upsert set.
///
/// Ordering follows the local active order first, then appends removed lines
/// not already represented; sequences are renumbered densely over the final
/// combined order. Server lines present in neither local list are dropped:
/// true deletion is implicit via absence. Removal takes precedence when a
/// persisted id appears in both local lists.
///
/// The result is a fixed point: running the function again with its own
/// output as the server state yields the same line set and sequences.
pub fn build_save_model(
    active: &[QuotationLine],
    removed: &[QuotationLine],
    last_server: &[QuotationLine],
) -> Vec<QuotationLine> {
    let mut working: HashMap<i64, QuotationLine> = last_server
        .iter()
        .filter_map(|l| l.id.persisted().map(|id| (id, l.clone())))
        .collect();

    let mut removed_keys: HashSet<i64> = HashSet::new();
    let mut removed_order: Vec<i64> = Vec::new();
    let mut synthesized_removed: Vec<QuotationLine> = Vec::new();

    for line in removed {
        match line.id.persisted() {
            Some(id) => {
                let entry = working.entry(id).or_insert_with(|| line.clone());
                refresh_fields(entry, line);
                entry.removed = true;
                if removed_keys.insert(id) {
                    removed_order.push(id);
                }
            }
            None => {
                let mut synthesized = line.clone();
                synthesized.removed = true;
                synthesized_removed.push(synthesized);
            }
        }
    }

    for line in active {
        if let Some(id) = line.id.persisted() {
            let entry = working.entry(id).or_insert_with(|| line.clone());
            refresh_fields(entry, line);
            // Removal takes precedence: a line cannot be active locally and
            // removed in the outgoing payload at the same time.
            entry.removed = removed_keys.contains(&id);
        }
    }

    let mut out: Vec<QuotationLine> = Vec::with_capacity(active.len() + removed.len());
    let mut emitted: HashSet<i64> = HashSet::new();

    for line in active {
        match line.id.persisted() {
            Some(id) => {
                if emitted.insert(id) {
                    out.push(working[&id].clone());
                }
            }
            None => {
                let mut fresh = line.clone();
                fresh.removed = false;
                out.push(fresh);
            }
        }
    }

    for id in removed_order {
        if emitted.insert(id) {
            out.push(working[&id].clone());
        }
    }
    out.extend(synthesized_removed);

    for (seq, line) in out.iter_mut().enumerate() {
        line.sequence = Some(seq as i32);
        line.recompute_total();
    }
    out
}

/// Wraps the reconciled lines and header fields into the update payload,
/// forcing the finalized status the save flow requires.
pub fn build_update_payload(
    header: &QuotationHeader,
    customer_id: Option<i64>,
    catalog_ids: &[i64],
    lines: &[QuotationLine],
) -> QuotationUpdate {
    QuotationUpdate {
        name: header.name.clone(),
        date: header.date,
        expiry_date: header.expiry_date,
        status: QuotationStatus::Finalized,
        customer_id,
        catalog_ids: catalog_ids.to_vec(),
        items: lines.iter().map(QuotationLineDto::from_line).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{CatalogRef, CustomerRef};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn line_dto(
        id: Option<i64>,
        description: &str,
        quantity: u32,
        unit_price: Decimal,
        is_raw: bool,
        parent: Option<i64>,
        sequence: Option<i32>,
        removed: bool,
    ) -> QuotationLineDto {
        QuotationLineDto {
            id,
            item_description: description.into(),
            quantity,
            unit_price,
            total: None,
            is_raw_material: Some(is_raw),
            parent_item_id: parent,
            item_id: None,
            raw_id: None,
            sequence,
            removed: Some(removed),
        }
    }

    fn quotation_dto(items: Vec<QuotationLineDto>) -> QuotationDto {
        QuotationDto {
            id: 7,
            name: "Q-7".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            expiry_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            status: QuotationStatus::Draft,
            customer: Some(CustomerRef {
                id: 4,
                full_name: Some("Acme".into()),
            }),
            linked_catalogs: vec![CatalogRef {
                id: 2,
                name: None,
            }],
            items,
        }
    }

    fn catalogs() -> (Vec<CatalogItem>, Vec<RawMaterial>) {
        (
            vec![CatalogItem {
                id: 5,
                item_name: "Widget".into(),
                item_price: Some(dec!(10)),
                description: Some("A standard widget".into()),
            }],
            vec![RawMaterial {
                id: 9,
                name: "Steel Rod".into(),
                price: Some(dec!(5)),
                description: Some("8mm rod".into()),
            }],
        )
    }

    fn plain_line(id: LineId, seq: Option<i32>, qty: u32, price: Decimal) -> QuotationLine {
        let mut line = QuotationLine {
            id,
            kind: LineKind::Item,
            parent_item_id: None,
            description: "Widget".into(),
            long_description: None,
            quantity: qty,
            unit_price: price,
            total: Decimal::ZERO,
            sequence: seq,
            removed: false,
            source_item_id: None,
            source_raw_id: None,
        };
        line.recompute_total();
        line
    }

    #[test]
    fn hydrate_partitions_and_sorts_by_sequence() {
        let (items, raws) = catalogs();
        let dto = quotation_dto(vec![
            line_dto(Some(3), "Widget", 1, dec!(10), false, None, Some(1), false),
            line_dto(Some(2), "Widget", 1, dec!(10), false, None, Some(0), false),
            line_dto(Some(4), "Old", 1, dec!(1), false, None, Some(2), true),
        ]);
        let hydrated = hydrate(&dto, &items, &raws);

        assert_eq!(hydrated.active.len(), 2);
        assert_eq!(hydrated.active[0].id, LineId::Persisted(2));
        assert_eq!(hydrated.active[1].id, LineId::Persisted(3));
        assert_eq!(hydrated.removed.len(), 1);
        assert!(hydrated.removed[0].removed);
        assert_eq!(hydrated.customer_id, Some(4));
        assert_eq!(hydrated.linked_catalog_ids, vec![2]);
    }

    #[test]
    fn hydrate_falls_back_to_id_order_without_sequence() {
        let (items, raws) = catalogs();
        let dto = quotation_dto(vec![
            line_dto(Some(30), "Widget", 1, dec!(10), false, None, None, false),
            line_dto(Some(20), "Widget", 1, dec!(10), false, None, None, false),
        ]);
        let hydrated = hydrate(&dto, &items, &raws);
        assert_eq!(hydrated.active[0].id, LineId::Persisted(20));
        assert_eq!(hydrated.active[1].id, LineId::Persisted(30));
    }

    #[test]
    fn hydrate_resolves_foreign_keys_by_name() {
        let (items, raws) = catalogs();
        let dto = quotation_dto(vec![
            line_dto(Some(1), "Widget", 2, dec!(10), false, None, Some(0), false),
            line_dto(
                Some(2),
                "Steel Rod (Raw Material)",
                1,
                dec!(5),
                true,
                Some(1),
                Some(1),
                false,
            ),
        ]);
        let hydrated = hydrate(&dto, &items, &raws);

        let item = &hydrated.active[0];
        assert_eq!(item.source_item_id, Some(5));
        assert_eq!(item.long_description.as_deref(), Some("A standard widget"));

        let raw = &hydrated.active[1];
        assert_eq!(raw.source_raw_id, Some(9));
        assert_eq!(raw.long_description.as_deref(), Some("8mm rod"));
        assert_eq!(raw.parent_item_id, Some(LineId::Persisted(1)));
    }

    #[test]
    fn hydrate_tolerates_unresolvable_lines() {
        let (items, raws) = catalogs();
        let dto = quotation_dto(vec![line_dto(
            Some(1),
            "Discontinued Part",
            1,
            dec!(3),
            false,
            None,
            Some(0),
            false,
        )]);
        let hydrated = hydrate(&dto, &items, &raws);
        let line = &hydrated.active[0];
        assert_eq!(line.source_item_id, None);
        assert_eq!(line.long_description, None);
        // Degraded but functional: the line is still present with a total.
        assert_eq!(line.total, dec!(3));
    }

    #[test]
    fn hydrate_recomputes_stale_totals() {
        let (items, raws) = catalogs();
        let mut stale = line_dto(Some(1), "Widget", 2, dec!(10), false, None, Some(0), false);
        stale.total = Some(dec!(999));
        let hydrated = hydrate(&quotation_dto(vec![stale]), &items, &raws);
        assert_eq!(hydrated.active[0].total, dec!(20));
    }

    #[test]
    fn save_model_marks_new_lines_with_temporary_ids() {
        let server = vec![plain_line(LineId::Persisted(1), Some(0), 1, dec!(10))];
        let active = vec![
            plain_line(LineId::Persisted(1), Some(0), 1, dec!(10)),
            plain_line(LineId::Temporary(1 << 40), Some(1), 2, dec!(7)),
        ];
        let model = build_save_model(&active, &[], &server);

        assert_eq!(model.len(), 2);
        assert_eq!(model[0].id, LineId::Persisted(1));
        assert!(model[1].id.is_temporary());
        assert!(!model[1].removed);
        assert_eq!(model[0].sequence, Some(0));
        assert_eq!(model[1].sequence, Some(1));
    }

    #[test]
    fn save_model_drops_lines_absent_from_both_sets() {
        let server = vec![
            plain_line(LineId::Persisted(1), Some(0), 1, dec!(10)),
            plain_line(LineId::Persisted(2), Some(1), 1, dec!(20)),
        ];
        let active = vec![plain_line(LineId::Persisted(1), Some(0), 1, dec!(10))];
        let model = build_save_model(&active, &[], &server);

        assert_eq!(model.len(), 1);
        assert_eq!(model[0].id, LineId::Persisted(1));
    }

    #[test]
    fn save_model_appends_removed_lines_after_active() {
        let server = vec![
            plain_line(LineId::Persisted(1), Some(0), 1, dec!(10)),
            plain_line(LineId::Persisted(2), Some(1), 1, dec!(20)),
        ];
        let active = vec![plain_line(LineId::Persisted(2), Some(1), 3, dec!(20))];
        let mut gone = plain_line(LineId::Persisted(1), Some(0), 1, dec!(10));
        gone.removed = true;
        let model = build_save_model(&active, &[gone], &server);

        assert_eq!(model.len(), 2);
        assert_eq!(model[0].id, LineId::Persisted(2));
        assert!(!model[0].removed);
        assert_eq!(model[0].quantity, 3);
        assert_eq!(model[1].id, LineId::Persisted(1));
        assert!(model[1].removed);
        assert_eq!(model[0].sequence, Some(0));
        assert_eq!(model[1].sequence, Some(1));
    }

    #[test]
    fn save_model_synthesizes_removed_temporary_lines() {
        let mut gone = plain_line(LineId::Temporary((1 << 40) + 3), Some(1), 1, dec!(5));
        gone.removed = true;
        let model = build_save_model(&[], &[gone], &[]);

        assert_eq!(model.len(), 1);
        assert!(model[0].id.is_temporary());
        assert!(model[0].removed);
        assert_eq!(model[0].sequence, Some(0));
    }

    #[test]
    fn removal_takes_precedence_over_active() {
        // A line appearing in both working sets must not go out as active.
        let server = vec![plain_line(LineId::Persisted(1), Some(0), 1, dec!(10))];
        let active = vec![plain_line(LineId::Persisted(1), Some(0), 1, dec!(10))];
        let mut gone = plain_line(LineId::Persisted(1), Some(0), 1, dec!(10));
        gone.removed = true;
        let model = build_save_model(&active, &[gone], &server);

        assert_eq!(model.len(), 1);
        assert!(model[0].removed);
    }

    #[test]
    fn save_model_is_idempotent() {
        let server = vec![
            plain_line(LineId::Persisted(1), Some(0), 1, dec!(10)),
            plain_line(LineId::Persisted(2), Some(1), 1, dec!(20)),
        ];
        let active = vec![
            plain_line(LineId::Persisted(2), Some(1), 4, dec!(20)),
            plain_line(LineId::Temporary(1 << 40), Some(2), 1, dec!(3)),
        ];
        let mut gone = plain_line(LineId::Persisted(1), Some(0), 1, dec!(10));
        gone.removed = true;

        let first = build_save_model(&active, &[gone.clone()], &server);
        let second = build_save_model(&active, &[gone], &first);
        assert_eq!(first, second);
    }

    #[test]
    fn undo_before_save_restores_position_and_clears_removed_flag() {
        // A persisted raw is removed, then undone, before any save: the
        // payload must carry removed=false and its original position.
        let (items, raws) = catalogs();
        let dto = quotation_dto(vec![
            line_dto(Some(1), "Widget", 2, dec!(10), false, None, Some(0), false),
            line_dto(
                Some(2),
                "Steel Rod (Raw Material)",
                1,
                dec!(5),
                true,
                Some(1),
                Some(1),
                false,
            ),
            line_dto(Some(3), "Widget B", 1, dec!(4), false, None, Some(2), false),
        ]);
        let hydrated = hydrate(&dto, &items, &raws);
        let baseline = hydrated.baseline();

        let mut store =
            crate::store::LineStore::from_parts(hydrated.active, hydrated.removed);
        store.remove_local(LineId::Persisted(2)).unwrap();
        store.undo_local(LineId::Persisted(2)).unwrap();

        let model = build_save_model(store.active(), store.removed_lines(), &baseline);
        assert_eq!(model.len(), 3);
        assert_eq!(model[1].id, LineId::Persisted(2));
        assert!(!model[1].removed);
        assert_eq!(model[1].sequence, Some(1));
    }

    #[test]
    fn update_payload_forces_finalized_status() {
        let header = QuotationHeader {
            id: 7,
            name: "Q-7".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            expiry_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            status: QuotationStatus::Draft,
        };
        let lines = vec![plain_line(LineId::Temporary(1 << 40), Some(0), 1, dec!(2))];
        let payload = build_update_payload(&header, Some(4), &[1, 2], &lines);

        assert_eq!(payload.status, QuotationStatus::Finalized);
        assert_eq!(payload.customer_id, Some(4));
        assert_eq!(payload.catalog_ids, vec![1, 2]);
        assert_eq!(payload.items.len(), 1);
        assert_eq!(payload.items[0].id, None);
    }
}
