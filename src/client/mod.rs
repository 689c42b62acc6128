//! Async boundary to the external quotation/item/raw-material services.
//!
//! [`QuotationApi`] is the seam the session depends on; tests substitute an
//! in-memory implementation, production uses [`HttpQuotationClient`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::AppConfig;
use crate::dto::{QuotationDto, QuotationSummaryDto, QuotationUpdate};
use crate::errors::ServiceError;
use crate::models::{CatalogItem, RawMaterial};

/// Per-line edit payload for persisted lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEdit {
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[async_trait]
pub trait QuotationApi: Send + Sync {
    async fn list_quotations(&self) -> Result<Vec<QuotationSummaryDto>, ServiceError>;

    /// Fetches a quotation; `include_removed` asks the service to include
    /// soft-removed lines so undo stays possible after a reload.
    async fn fetch_quotation(
        &self,
        id: i64,
        include_removed: bool,
    ) -> Result<QuotationDto, ServiceError>;

    /// Replaces the quotation's line set and header fields; returns the
    /// server's authoritative copy.
    async fn update_quotation(
        &self,
        id: i64,
        payload: &QuotationUpdate,
    ) -> Result<QuotationDto, ServiceError>;

    async fn update_line(&self, line_id: i64, edit: &LineEdit) -> Result<(), ServiceError>;

    async fn remove_line(&self, line_id: i64) -> Result<(), ServiceError>;

    async fn undo_remove_line(&self, line_id: i64) -> Result<(), ServiceError>;

    async fn list_items(&self) -> Result<Vec<CatalogItem>, ServiceError>;

    async fn list_raw_materials(&self) -> Result<Vec<RawMaterial>, ServiceError>;
}

/// Reqwest-backed client for the quotation service REST API.
#[derive(Debug, Clone)]
pub struct HttpQuotationClient {
    http: Client,
    base_url: Url,
}

impl HttpQuotationClient {
    pub fn new(config: &AppConfig) -> Result<Self, ServiceError> {
        let mut base = config.api_base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| ServiceError::ConfigError(format!("Invalid API base URL: {}", e)))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path)
            .map_err(|e| ServiceError::InternalError(format!("Invalid endpoint {}: {}", path, e)))
    }

    async fn check(response: Response) -> Result<Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let path = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(format!("{} not found", path)));
        }
        Err(ServiceError::ExternalServiceError(format!(
            "{} returned {}: {}",
            path, status, body
        )))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ServiceError> {
        let response = self.http.get(url).send().await?;
        Ok(Self::check(response).await?.json::<T>().await?)
    }
}

#[async_trait]
impl QuotationApi for HttpQuotationClient {
    async fn list_quotations(&self) -> Result<Vec<QuotationSummaryDto>, ServiceError> {
        self.get_json(self.endpoint("quotations")?).await
    }

    async fn fetch_quotation(
        &self,
        id: i64,
        include_removed: bool,
    ) -> Result<QuotationDto, ServiceError> {
        let mut url = self.endpoint(&format!("quotations/{}", id))?;
        if include_removed {
            url.query_pairs_mut().append_pair("includeRemoved", "true");
        }
        self.get_json(url).await
    }

    async fn update_quotation(
        &self,
        id: i64,
        payload: &QuotationUpdate,
    ) -> Result<QuotationDto, ServiceError> {
        let url = self.endpoint(&format!("quotations/{}", id))?;
        let response = self.http.put(url).json(payload).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn update_line(&self, line_id: i64, edit: &LineEdit) -> Result<(), ServiceError> {
        let url = self.endpoint(&format!("quotation-lines/{}", line_id))?;
        let response = self.http.put(url).json(edit).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn remove_line(&self, line_id: i64) -> Result<(), ServiceError> {
        let url = self.endpoint(&format!("quotation-lines/{}/remove", line_id))?;
        let response = self.http.post(url).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn undo_remove_line(&self, line_id: i64) -> Result<(), ServiceError> {
        let url = self.endpoint(&format!("quotation-lines/{}/undo", line_id))?;
        let response = self.http.post(url).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn list_items(&self) -> Result<Vec<CatalogItem>, ServiceError> {
        self.get_json(self.endpoint("items")?).await
    }

    async fn list_raw_materials(&self) -> Result<Vec<RawMaterial>, ServiceError> {
        self.get_json(self.endpoint("raw-materials")?).await
    }
}
