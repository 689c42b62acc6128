//! PDF export of a quotation. Renders the same hierarchical projection the
//! table view shows, so the document can never disagree with the screen.

use std::fs;
use std::path::{Path, PathBuf};

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use crate::errors::ServiceError;
use crate::models::QuotationHeader;
use crate::projector::{self, LineGroup};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 15.0;
const LINE_HEIGHT_MM: f32 = 6.0;
const BODY_SIZE: f32 = 10.0;
const HEADER_SIZE: f32 = 16.0;

// Column x positions, measured from the left edge.
const COL_LABEL: f32 = MARGIN_MM;
const COL_DESCRIPTION: f32 = 30.0;
const COL_QUANTITY: f32 = 130.0;
const COL_RATE: f32 = 150.0;
const COL_TOTAL: f32 = 175.0;

/// Rendering options for the export.
#[derive(Debug, Clone, Copy)]
pub struct PdfOptions {
    /// When false, raw material rows render a dash for their rate. The rows
    /// themselves always print.
    pub show_raw_prices: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            show_raw_prices: true,
        }
    }
}

pub struct PdfExporter {
    output_dir: PathBuf,
}

struct PageCursor {
    doc: PdfDocumentReference,
    layer: printpdf::PdfLayerReference,
    y: f32,
}

impl PageCursor {
    /// Advances one text row, starting a fresh page when the current one is
    /// full.
    fn advance(&mut self) {
        self.y -= LINE_HEIGHT_MM;
        if self.y < MARGIN_MM {
            let (page, layer) =
                self.doc
                    .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "content");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT_MM - MARGIN_MM;
        }
    }

    fn text(&self, text: &str, size: f32, x: f32, font: &IndirectFontRef) {
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }
}

fn money(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

impl PdfExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Renders the quotation to PDF bytes.
    pub fn render(
        &self,
        header: &QuotationHeader,
        groups: &[LineGroup],
        options: PdfOptions,
    ) -> Result<Vec<u8>, ServiceError> {
        let (doc, page, layer) = PdfDocument::new(
            format!("Quotation {}", header.name),
            Mm(PAGE_WIDTH_MM),
            Mm(PAGE_HEIGHT_MM),
            "content",
        );
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ServiceError::PdfError(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ServiceError::PdfError(e.to_string()))?;

        let layer = doc.get_page(page).get_layer(layer);
        let mut cursor = PageCursor {
            doc,
            layer,
            y: PAGE_HEIGHT_MM - MARGIN_MM,
        };

        cursor.text(&format!("Quotation: {}", header.name), HEADER_SIZE, MARGIN_MM, &bold);
        cursor.advance();
        cursor.text(
            &format!("Date: {}    Valid until: {}", header.date, header.expiry_date),
            BODY_SIZE,
            MARGIN_MM,
            &regular,
        );
        cursor.advance();
        cursor.text(
            &format!("Status: {}", header.status),
            BODY_SIZE,
            MARGIN_MM,
            &regular,
        );
        cursor.advance();
        cursor.advance();

        cursor.text("#", BODY_SIZE, COL_LABEL, &bold);
        cursor.text("Description", BODY_SIZE, COL_DESCRIPTION, &bold);
        cursor.text("Qty", BODY_SIZE, COL_QUANTITY, &bold);
        cursor.text("Rate", BODY_SIZE, COL_RATE, &bold);
        cursor.text("Amount", BODY_SIZE, COL_TOTAL, &bold);
        cursor.advance();

        for group in groups {
            cursor.text(&group.number.to_string(), BODY_SIZE, COL_LABEL, &regular);
            cursor.text(&group.item.description, BODY_SIZE, COL_DESCRIPTION, &regular);
            cursor.text(
                &group.item.quantity.to_string(),
                BODY_SIZE,
                COL_QUANTITY,
                &regular,
            );
            cursor.text(&money(group.item.unit_price), BODY_SIZE, COL_RATE, &regular);
            cursor.text(&money(group.item.total), BODY_SIZE, COL_TOTAL, &regular);
            cursor.advance();

            if let Some(long) = group
                .item
                .long_description
                .as_deref()
                .filter(|d| !d.is_empty())
            {
                cursor.text(long, BODY_SIZE, COL_DESCRIPTION, &regular);
                cursor.advance();
            }

            for child in &group.children {
                let description = if child.removed {
                    format!("{} [removed]", child.line.description)
                } else {
                    child.line.description.clone()
                };
                cursor.text(&format!("{})", child.label), BODY_SIZE, COL_LABEL + 5.0, &regular);
                cursor.text(&description, BODY_SIZE, COL_DESCRIPTION + 5.0, &regular);
                cursor.text(
                    &child.line.quantity.to_string(),
                    BODY_SIZE,
                    COL_QUANTITY,
                    &regular,
                );
                let rate = if options.show_raw_prices {
                    money(child.line.unit_price)
                } else {
                    "-".to_string()
                };
                cursor.text(&rate, BODY_SIZE, COL_RATE, &regular);
                // Raw totals never print: their cost is folded into the
                // parent item's rate.
                cursor.text("-", BODY_SIZE, COL_TOTAL, &regular);
                cursor.advance();
            }
        }

        cursor.advance();
        cursor.text("Grand total", BODY_SIZE, COL_RATE, &bold);
        cursor.text(&money(projector::grand_total(groups)), BODY_SIZE, COL_TOTAL, &bold);

        cursor
            .doc
            .save_to_bytes()
            .map_err(|e| ServiceError::PdfError(e.to_string()))
    }

    /// Renders and writes `quotation-<id>.pdf` into the output directory.
    #[instrument(skip(self, header, groups))]
    pub fn export(
        &self,
        header: &QuotationHeader,
        groups: &[LineGroup],
        options: PdfOptions,
    ) -> Result<PathBuf, ServiceError> {
        let bytes = self.render(header, groups, options)?;
        fs::create_dir_all(&self.output_dir)
            .map_err(|e| ServiceError::PdfError(e.to_string()))?;
        let path = self.output_dir.join(format!("quotation-{}.pdf", header.id));
        write_bytes(&path, &bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "Exported quotation PDF");
        Ok(path)
    }
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), ServiceError> {
    fs::write(path, bytes)
        .map_err(|e| ServiceError::PdfError(format!("writing {}: {}", path.display(), e)))
}
