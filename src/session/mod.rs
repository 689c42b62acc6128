//! Orchestrates one open quotation: catalog lookups, the line store, the
//! reconciliation engine and the service client.
//!
//! All methods run on the caller's task in response to discrete user
//! actions; persisted-line operations round-trip to the service before any
//! local state changes, so a failed request leaves the prior state
//! untouched.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};

use crate::client::{LineEdit, QuotationApi};
use crate::dto::QuotationSummaryDto;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{CatalogItem, LineId, QuotationHeader, QuotationLine, RawMaterial};
use crate::projector::{self, LineGroup};
use crate::reconcile::{self, HydratedQuotation};
use crate::store::LineStore;

/// State of the quotation currently being composed.
#[derive(Debug)]
struct OpenQuotation {
    header: QuotationHeader,
    customer_id: Option<i64>,
    linked_catalog_ids: Vec<i64>,
    store: LineStore,
    /// Last known server state, the diff baseline for the next save.
    baseline: Vec<QuotationLine>,
}

pub struct QuotationSession {
    api: Arc<dyn QuotationApi>,
    events: EventSender,
    items: Vec<CatalogItem>,
    raws: Vec<RawMaterial>,
    open: Option<OpenQuotation>,
}

impl QuotationSession {
    pub fn new(api: Arc<dyn QuotationApi>, events: EventSender) -> Self {
        Self {
            api,
            events,
            items: Vec::new(),
            raws: Vec::new(),
            open: None,
        }
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn raw_materials(&self) -> &[RawMaterial] {
        &self.raws
    }

    pub fn quotation_id(&self) -> Option<i64> {
        self.open.as_ref().map(|o| o.header.id)
    }

    pub fn header(&self) -> Option<&QuotationHeader> {
        self.open.as_ref().map(|o| &o.header)
    }

    pub fn customer_id(&self) -> Option<i64> {
        self.open.as_ref().and_then(|o| o.customer_id)
    }

    pub fn linked_catalog_ids(&self) -> &[i64] {
        self.open
            .as_ref()
            .map(|o| o.linked_catalog_ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn active_lines(&self) -> &[QuotationLine] {
        self.open.as_ref().map(|o| o.store.active()).unwrap_or(&[])
    }

    pub fn removed_lines(&self) -> &[QuotationLine] {
        self.open
            .as_ref()
            .map(|o| o.store.removed_lines())
            .unwrap_or(&[])
    }

    pub fn grand_total(&self) -> Decimal {
        self.open
            .as_ref()
            .map(|o| o.store.grand_total())
            .unwrap_or(Decimal::ZERO)
    }

    /// Hierarchical render model for the table view and the PDF export.
    pub fn project(&self, show_removed: bool) -> Vec<LineGroup> {
        match &self.open {
            Some(open) => projector::project(
                open.store.active(),
                open.store.removed_lines(),
                show_removed,
            ),
            None => Vec::new(),
        }
    }

    fn open_mut(&mut self) -> Result<&mut OpenQuotation, ServiceError> {
        self.open
            .as_mut()
            .ok_or_else(|| ServiceError::InvalidOperation("No quotation is open".into()))
    }

    /// Loads both catalogs; they are used for merge-matching and display
    /// enrichment only and never mutated here.
    #[instrument(skip(self))]
    pub async fn load_catalogs(&mut self) -> Result<(), ServiceError> {
        let (items, raws) =
            tokio::try_join!(self.api.list_items(), self.api.list_raw_materials())?;
        info!(items = items.len(), raws = raws.len(), "Loaded catalogs");
        self.items = items;
        self.raws = raws;
        Ok(())
    }

    pub async fn list_quotations(&self) -> Result<Vec<QuotationSummaryDto>, ServiceError> {
        self.api.list_quotations().await
    }

    /// Fetches and hydrates a quotation, replacing any previously open one.
    #[instrument(skip(self))]
    pub async fn open(&mut self, quotation_id: i64) -> Result<(), ServiceError> {
        let dto = self.api.fetch_quotation(quotation_id, true).await?;
        let hydrated = reconcile::hydrate(&dto, &self.items, &self.raws);
        self.apply_hydrated(hydrated);
        info!(quotation_id, "Opened quotation");
        self.events
            .send_or_log(Event::QuotationOpened(quotation_id))
            .await;
        Ok(())
    }

    pub fn close(&mut self) {
        self.open = None;
    }

    fn apply_hydrated(&mut self, hydrated: HydratedQuotation) {
        let baseline = hydrated.baseline();
        self.open = Some(OpenQuotation {
            header: hydrated.header,
            customer_id: hydrated.customer_id,
            linked_catalog_ids: hydrated.linked_catalog_ids,
            store: LineStore::from_parts(hydrated.active, hydrated.removed),
            baseline,
        });
    }

    /// Re-fetches the server's authoritative copy and reconciles drift:
    /// server lines replace the local persisted ones, while client-only
    /// temporary lines (and the local customer/catalog selections, which
    /// only round-trip at save time) are carried over.
    async fn refresh(&mut self) -> Result<(), ServiceError> {
        let quotation_id = self
            .quotation_id()
            .ok_or_else(|| ServiceError::InvalidOperation("No quotation is open".into()))?;
        let dto = self.api.fetch_quotation(quotation_id, true).await?;
        let hydrated = reconcile::hydrate(&dto, &self.items, &self.raws);
        let baseline = hydrated.baseline();

        let open = self.open_mut()?;
        let mut active = hydrated.active;
        let mut removed = hydrated.removed;
        active.extend(
            open.store
                .active()
                .iter()
                .filter(|l| l.id.is_temporary())
                .cloned(),
        );
        removed.extend(
            open.store
                .removed_lines()
                .iter()
                .filter(|l| l.id.is_temporary())
                .cloned(),
        );
        open.header = hydrated.header;
        open.store = LineStore::from_parts(active, removed);
        open.baseline = baseline;
        Ok(())
    }

    /// Adds (or merges) an item line from the catalog selection.
    #[instrument(skip(self))]
    pub async fn add_item(
        &mut self,
        item_id: Option<i64>,
        quantity: u32,
        rate: Option<Decimal>,
    ) -> Result<LineId, ServiceError> {
        let item_id =
            item_id.ok_or_else(|| ServiceError::ValidationError("Please select an item".into()))?;
        let item = self
            .items
            .iter()
            .find(|i| i.id == item_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not in catalog", item_id)))?;

        let open = self.open_mut()?;
        let quotation_id = open.header.id;
        let (line_id, merged) = open.store.add_item(&item, quantity, rate)?;
        info!(quotation_id, ?line_id, merged, "Added item line");
        self.events
            .send_or_log(Event::LineAdded {
                quotation_id,
                line_id,
                merged,
            })
            .await;
        Ok(line_id)
    }

    /// Adds (or merges) a raw material line under the most recent item.
    #[instrument(skip(self))]
    pub async fn add_raw_material(
        &mut self,
        raw_id: Option<i64>,
        quantity: u32,
        rate: Option<Decimal>,
    ) -> Result<LineId, ServiceError> {
        let raw_id = raw_id.ok_or_else(|| {
            ServiceError::ValidationError("Please select a raw material".into())
        })?;
        let raw = self
            .raws
            .iter()
            .find(|r| r.id == raw_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Raw material {} not in catalog", raw_id))
            })?;

        let open = self.open_mut()?;
        let quotation_id = open.header.id;
        let (line_id, merged) = open.store.add_raw_material(&raw, quantity, rate)?;
        info!(quotation_id, ?line_id, merged, "Added raw material line");
        self.events
            .send_or_log(Event::LineAdded {
                quotation_id,
                line_id,
                merged,
            })
            .await;
        Ok(line_id)
    }

    /// Decrements a line's quantity by one; a no-op at quantity 1.
    pub fn decrement(&mut self, line_id: LineId) -> Result<bool, ServiceError> {
        self.open_mut()?.store.decrement(line_id)
    }

    pub fn start_edit(&mut self, line_id: LineId) -> Result<(), ServiceError> {
        self.open_mut()?.store.start_edit(line_id)
    }

    pub fn cancel_edit(&mut self) {
        if let Some(open) = self.open.as_mut() {
            open.store.cancel_edit();
        }
    }

    /// Commits the in-progress edit. Persisted lines round-trip the clamped
    /// values to the service first; the local line only changes once the
    /// service accepted them.
    #[instrument(skip(self))]
    pub async fn save_edit(
        &mut self,
        line_id: LineId,
        quantity: u32,
        rate: Decimal,
    ) -> Result<(), ServiceError> {
        let open = self.open_mut()?;
        if open.store.editing() != Some(line_id) {
            return Err(ServiceError::InvalidOperation(
                "Line is not in edit mode".into(),
            ));
        }
        let (quantity, rate) = LineStore::clamp_edit(quantity, rate);

        if let Some(server_id) = line_id.persisted() {
            let edit = LineEdit {
                quantity,
                unit_price: rate,
            };
            self.api.update_line(server_id, &edit).await?;
        }
        self.open_mut()?.store.save_edit(line_id, quantity, rate)
    }

    /// Soft-removes a line. Temporary lines move lists locally; persisted
    /// lines round-trip to the service and then refresh from its
    /// authoritative copy.
    #[instrument(skip(self))]
    pub async fn remove_line(&mut self, line_id: LineId) -> Result<(), ServiceError> {
        let quotation_id = self
            .quotation_id()
            .ok_or_else(|| ServiceError::InvalidOperation("No quotation is open".into()))?;

        match line_id.persisted() {
            None => self.open_mut()?.store.remove_local(line_id)?,
            Some(server_id) => {
                self.api.remove_line(server_id).await?;
                self.refresh().await?;
            }
        }
        info!(quotation_id, ?line_id, "Removed line");
        self.events
            .send_or_log(Event::LineRemoved {
                quotation_id,
                line_id,
            })
            .await;
        Ok(())
    }

    /// Restores a soft-removed line, the inverse of [`Self::remove_line`].
    #[instrument(skip(self))]
    pub async fn undo_line(&mut self, line_id: LineId) -> Result<(), ServiceError> {
        let quotation_id = self
            .quotation_id()
            .ok_or_else(|| ServiceError::InvalidOperation("No quotation is open".into()))?;

        match line_id.persisted() {
            None => self.open_mut()?.store.undo_local(line_id)?,
            Some(server_id) => {
                self.api.undo_remove_line(server_id).await?;
                self.refresh().await?;
            }
        }
        info!(quotation_id, ?line_id, "Restored line");
        self.events
            .send_or_log(Event::LineRestored {
                quotation_id,
                line_id,
            })
            .await;
        Ok(())
    }

    pub fn set_customer(&mut self, customer_id: Option<i64>) -> Result<(), ServiceError> {
        self.open_mut()?.customer_id = customer_id;
        Ok(())
    }

    pub fn toggle_catalog(&mut self, catalog_id: i64) -> Result<(), ServiceError> {
        let open = self.open_mut()?;
        if let Some(pos) = open.linked_catalog_ids.iter().position(|&c| c == catalog_id) {
            open.linked_catalog_ids.remove(pos);
        } else {
            open.linked_catalog_ids.push(catalog_id);
        }
        Ok(())
    }

    /// Builds the reconciled save model, submits it with the finalized
    /// status, and adopts the server's returned copy as the new baseline.
    #[instrument(skip(self))]
    pub async fn finalize_and_save(&mut self) -> Result<(), ServiceError> {
        let (quotation_id, payload, line_count) = {
            let open = self
                .open
                .as_ref()
                .ok_or_else(|| ServiceError::InvalidOperation("No quotation is open".into()))?;
            let model = reconcile::build_save_model(
                open.store.active(),
                open.store.removed_lines(),
                &open.baseline,
            );
            let payload = reconcile::build_update_payload(
                &open.header,
                open.customer_id,
                &open.linked_catalog_ids,
                &model,
            );
            (open.header.id, payload, model.len())
        };

        let dto = self.api.update_quotation(quotation_id, &payload).await?;
        let hydrated = reconcile::hydrate(&dto, &self.items, &self.raws);
        self.apply_hydrated(hydrated);
        info!(quotation_id, line_count, "Finalized and saved quotation");
        self.events
            .send_or_log(Event::QuotationSaved {
                quotation_id,
                line_count,
            })
            .await;
        Ok(())
    }
}
