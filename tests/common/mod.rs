#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use quoteline::client::{LineEdit, QuotationApi};
use quoteline::dto::{
    CatalogRef, CustomerRef, QuotationDto, QuotationLineDto, QuotationSummaryDto, QuotationUpdate,
};
use quoteline::errors::ServiceError;
use quoteline::events;
use quoteline::models::{CatalogItem, QuotationStatus, RawMaterial};
use quoteline::session::QuotationSession;

/// Wire ids at or above this are client-side tokens for unsaved lines.
pub const TEMP_WIRE_THRESHOLD: i64 = 1 << 40;

/// In-memory stand-in for the quotation service, with enough backend
/// behavior (id assignment, soft-remove flags, line updates) to exercise the
/// full session flows.
#[derive(Default)]
pub struct MockState {
    pub quotation: Option<QuotationDto>,
    pub items: Vec<CatalogItem>,
    pub raws: Vec<RawMaterial>,
    pub next_line_id: i64,
    pub updates: Vec<QuotationUpdate>,
    pub line_edits: Vec<(i64, LineEdit)>,
    pub fail_line_edit: bool,
}

pub struct MockApi {
    pub state: Arc<Mutex<MockState>>,
}

impl MockApi {
    fn with_quotation<T>(
        &self,
        id: i64,
        f: impl FnOnce(&mut MockState, &mut QuotationDto) -> T,
    ) -> Result<T, ServiceError> {
        let mut state = self.state.lock().unwrap();
        match state.quotation.take() {
            Some(mut quotation) if quotation.id == id => {
                let out = f(&mut *state, &mut quotation);
                state.quotation = Some(quotation);
                Ok(out)
            }
            other => {
                state.quotation = other;
                Err(ServiceError::NotFound(format!("quotation {}", id)))
            }
        }
    }
}

#[async_trait]
impl QuotationApi for MockApi {
    async fn list_quotations(&self) -> Result<Vec<QuotationSummaryDto>, ServiceError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .quotation
            .iter()
            .map(|q| QuotationSummaryDto {
                id: q.id,
                name: q.name.clone(),
                status: Some(q.status),
                date: Some(q.date),
            })
            .collect())
    }

    async fn fetch_quotation(
        &self,
        id: i64,
        include_removed: bool,
    ) -> Result<QuotationDto, ServiceError> {
        self.with_quotation(id, |_, q| {
            let mut out = q.clone();
            if !include_removed {
                out.items.retain(|l| !l.is_removed());
            }
            out
        })
    }

    async fn update_quotation(
        &self,
        id: i64,
        payload: &QuotationUpdate,
    ) -> Result<QuotationDto, ServiceError> {
        self.with_quotation(id, |state, q| {
            state.updates.push(payload.clone());

            // Assign ids to created lines in order; a temp-token parent
            // reference resolves to the most recent preceding item line,
            // mirroring how the composer attaches raws.
            let mut last_item_id = None;
            let mut lines = Vec::with_capacity(payload.items.len());
            for dto in &payload.items {
                let mut line = dto.clone();
                if line.id.is_none() {
                    line.id = Some(state.next_line_id);
                    state.next_line_id += 1;
                }
                if !line.is_raw() {
                    last_item_id = line.id;
                } else if line.parent_item_id.map_or(false, |p| p >= TEMP_WIRE_THRESHOLD) {
                    line.parent_item_id = last_item_id;
                }
                lines.push(line);
            }

            q.name = payload.name.clone();
            q.date = payload.date;
            q.expiry_date = payload.expiry_date;
            q.status = payload.status;
            q.customer = payload.customer_id.map(|cid| CustomerRef {
                id: cid,
                full_name: None,
            });
            q.linked_catalogs = payload
                .catalog_ids
                .iter()
                .map(|&cid| CatalogRef {
                    id: cid,
                    name: None,
                })
                .collect();
            q.items = lines;
            q.clone()
        })
    }

    async fn update_line(&self, line_id: i64, edit: &LineEdit) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_line_edit {
            return Err(ServiceError::ExternalServiceError(
                "line update rejected".into(),
            ));
        }
        state.line_edits.push((line_id, edit.clone()));
        if let Some(q) = state.quotation.as_mut() {
            if let Some(line) = q.items.iter_mut().find(|l| l.id == Some(line_id)) {
                line.quantity = edit.quantity;
                line.unit_price = edit.unit_price;
                line.total = Some(edit.unit_price * Decimal::from(edit.quantity));
            }
        }
        Ok(())
    }

    async fn remove_line(&self, line_id: i64) -> Result<(), ServiceError> {
        set_removed(&self.state, line_id, true)
    }

    async fn undo_remove_line(&self, line_id: i64) -> Result<(), ServiceError> {
        set_removed(&self.state, line_id, false)
    }

    async fn list_items(&self) -> Result<Vec<CatalogItem>, ServiceError> {
        Ok(self.state.lock().unwrap().items.clone())
    }

    async fn list_raw_materials(&self) -> Result<Vec<RawMaterial>, ServiceError> {
        Ok(self.state.lock().unwrap().raws.clone())
    }
}

fn set_removed(
    state: &Arc<Mutex<MockState>>,
    line_id: i64,
    removed: bool,
) -> Result<(), ServiceError> {
    let mut state = state.lock().unwrap();
    let line = state
        .quotation
        .as_mut()
        .and_then(|q| q.items.iter_mut().find(|l| l.id == Some(line_id)))
        .ok_or_else(|| ServiceError::NotFound(format!("line {}", line_id)))?;
    line.removed = Some(removed);
    Ok(())
}

pub fn widget() -> CatalogItem {
    CatalogItem {
        id: 5,
        item_name: "Widget".into(),
        item_price: Some(dec!(40.00)),
        description: Some("A standard widget".into()),
    }
}

pub fn gadget() -> CatalogItem {
    CatalogItem {
        id: 6,
        item_name: "Gadget".into(),
        item_price: Some(dec!(15.00)),
        description: None,
    }
}

pub fn steel() -> RawMaterial {
    RawMaterial {
        id: 9,
        name: "Steel Rod".into(),
        price: Some(dec!(5.00)),
        description: Some("8mm rod".into()),
    }
}

pub fn item_line(id: i64, description: &str, quantity: u32, rate: Decimal, seq: i32) -> QuotationLineDto {
    QuotationLineDto {
        id: Some(id),
        item_description: description.into(),
        quantity,
        unit_price: rate,
        total: None,
        is_raw_material: Some(false),
        parent_item_id: None,
        item_id: None,
        raw_id: None,
        sequence: Some(seq),
        removed: Some(false),
    }
}

pub fn raw_line(
    id: i64,
    description: &str,
    parent: i64,
    quantity: u32,
    rate: Decimal,
    seq: i32,
) -> QuotationLineDto {
    QuotationLineDto {
        id: Some(id),
        item_description: description.into(),
        quantity,
        unit_price: rate,
        total: None,
        is_raw_material: Some(true),
        parent_item_id: Some(parent),
        item_id: None,
        raw_id: None,
        sequence: Some(seq),
        removed: Some(false),
    }
}

/// Quotation 7: one Widget item (id 11, qty 2 @ 10) with one Steel Rod raw
/// child (id 12, qty 1 @ 5). Grand total 20.
pub fn seeded_quotation() -> QuotationDto {
    QuotationDto {
        id: 7,
        name: "Q-7".into(),
        date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        expiry_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
        status: QuotationStatus::Draft,
        customer: Some(CustomerRef {
            id: 4,
            full_name: Some("Acme".into()),
        }),
        linked_catalogs: vec![CatalogRef { id: 2, name: None }],
        items: vec![
            item_line(11, "Widget", 2, dec!(10), 0),
            raw_line(12, "Steel Rod (Raw Material)", 11, 1, dec!(5), 1),
        ],
    }
}

pub struct TestHarness {
    pub state: Arc<Mutex<MockState>>,
    pub session: QuotationSession,
}

impl TestHarness {
    /// Builds a session over the mock service with catalogs preloaded.
    pub async fn with_quotation(quotation: QuotationDto) -> Self {
        let state = Arc::new(Mutex::new(MockState {
            quotation: Some(quotation),
            items: vec![widget(), gadget()],
            raws: vec![steel()],
            next_line_id: 100,
            ..MockState::default()
        }));
        let api = Arc::new(MockApi {
            state: Arc::clone(&state),
        });
        let (events, mut event_rx) = events::channel(16);
        tokio::spawn(async move { while event_rx.recv().await.is_some() {} });

        let mut session = QuotationSession::new(api, events);
        session
            .load_catalogs()
            .await
            .expect("mock catalogs always load");
        Self { state, session }
    }

    pub async fn seeded() -> Self {
        Self::with_quotation(seeded_quotation()).await
    }

    pub fn server_line(&self, line_id: i64) -> QuotationLineDto {
        let state = self.state.lock().unwrap();
        state
            .quotation
            .as_ref()
            .and_then(|q| q.items.iter().find(|l| l.id == Some(line_id)))
            .cloned()
            .expect("line exists on the mock server")
    }

    pub fn last_update(&self) -> QuotationUpdate {
        let state = self.state.lock().unwrap();
        state.updates.last().cloned().expect("a save was issued")
    }
}
