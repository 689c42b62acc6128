//! Pure projection from the flat line lists to the hierarchical render
//! model consumed by both the interactive table and the PDF export. Any
//! divergence between those two consumers is a defect, so both go through
//! this module.

use rust_decimal::Decimal;

use crate::models::QuotationLine;

/// A raw material row nested under its item, with its derived letter label.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedChild {
    /// `a`, `b`, ... `z`, `aa`, `ab`, ... recomputed fresh on every
    /// projection; never stored.
    pub label: String,
    pub line: QuotationLine,
    pub removed: bool,
}

/// A numbered item row with its ordered raw material children.
#[derive(Debug, Clone, PartialEq)]
pub struct LineGroup {
    /// 1-based serial number of the item row.
    pub number: usize,
    pub item: QuotationLine,
    pub children: Vec<ProjectedChild>,
}

/// Letter label for the Nth (0-indexed) child of an item.
pub fn child_label(index: usize) -> String {
    let mut label = String::new();
    let mut n = index;
    loop {
        label.insert(0, (b'a' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    label
}

/// Groups active item lines with their raw material children, in sequence
/// order. Removed raws are included (flagged) only when `show_removed` is
/// set. Raw lines whose parent is not an active item are excluded entirely:
/// orphans are never shown as top-level rows.
pub fn project(
    active: &[QuotationLine],
    removed: &[QuotationLine],
    show_removed: bool,
) -> Vec<LineGroup> {
    let mut raws: Vec<(&QuotationLine, bool)> = active
        .iter()
        .filter(|l| l.is_raw())
        .map(|l| (l, false))
        .collect();
    if show_removed {
        raws.extend(removed.iter().filter(|l| l.is_raw()).map(|l| (l, true)));
    }

    active
        .iter()
        .filter(|l| !l.is_raw())
        .enumerate()
        .map(|(idx, item)| {
            let mut children: Vec<(&QuotationLine, bool)> = raws
                .iter()
                .filter(|(raw, _)| raw.parent_item_id == Some(item.id))
                .copied()
                .collect();
            children.sort_by_key(|(raw, _)| raw.sort_key());

            LineGroup {
                number: idx + 1,
                item: item.clone(),
                children: children
                    .into_iter()
                    .enumerate()
                    .map(|(child_idx, (raw, was_removed))| ProjectedChild {
                        label: child_label(child_idx),
                        line: raw.clone(),
                        removed: was_removed,
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Grand total over the projected item rows; identical by construction to
/// the store's active non-raw sum.
pub fn grand_total(groups: &[LineGroup]) -> Decimal {
    groups.iter().map(|g| g.item.total).sum()
}
