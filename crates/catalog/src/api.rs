//! REST API client for the catalog HTTP endpoints.
//!
//! Wraps property lookup, resource search and resource value reads and
//! writes using [`reqwest`], and implements the engine's catalog ports.

use async_trait::async_trait;

use curio_core::error::CoreError;
use curio_core::filter::SearchFilterGroup;
use curio_core::ports::{
    PropertyService, ResourceSearch, ResourceSnapshot, ResourceValueStore, ResourceWrite,
    ResourceWriteOutcome,
};
use curio_core::property::{Property, PropertyKey, PropertyPoolMask};
use curio_core::types::DbId;

use crate::messages::{
    PropertyRef, ResourceValues, ResourceValuesWrite, SearchRequest, SearchResponse, ValuesQuery,
    WriteRequest, WriteResponse,
};

/// HTTP client for the catalog service.
#[derive(Clone)]
pub struct CatalogApi {
    client: reqwest::Client,
    api_url: String,
}

/// Errors from the catalog REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum CatalogApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The catalog returned a non-2xx status code.
    #[error("Catalog API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl From<CatalogApiError> for CoreError {
    fn from(err: CatalogApiError) -> Self {
        CoreError::External(err.to_string())
    }
}

impl CatalogApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://localhost:5000`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// `GET /properties?pools=<mask>`.
    pub async fn list_properties(
        &self,
        mask: PropertyPoolMask,
    ) -> Result<Vec<Property>, CatalogApiError> {
        let response = self
            .client
            .get(format!("{}/properties", self.api_url))
            .query(&[("pools", mask.bits())])
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `POST /resources/search`. Ids come back in the catalog's order.
    pub async fn search_resources(
        &self,
        filter: &SearchFilterGroup,
    ) -> Result<Vec<DbId>, CatalogApiError> {
        let response = self
            .client
            .post(format!("{}/resources/search", self.api_url))
            .json(&SearchRequest { filter })
            .send()
            .await?;

        let body: SearchResponse = Self::parse_response(response).await?;
        Ok(body.resource_ids)
    }

    /// `POST /resources/values/query`.
    pub async fn query_values(
        &self,
        resource_ids: &[DbId],
        keys: &[PropertyKey],
    ) -> Result<Vec<ResourceValues>, CatalogApiError> {
        let body = ValuesQuery {
            resource_ids,
            properties: keys.iter().copied().map(PropertyRef::from).collect(),
        };
        let response = self
            .client
            .post(format!("{}/resources/values/query", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `POST /resources/values`. One result per written resource.
    pub async fn post_values(
        &self,
        writes: Vec<ResourceValuesWrite>,
    ) -> Result<WriteResponse, CatalogApiError> {
        let response = self
            .client
            .post(format!("{}/resources/values", self.api_url))
            .json(&WriteRequest { writes })
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`CatalogApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, CatalogApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(CatalogApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CatalogApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

#[async_trait]
impl PropertyService for CatalogApi {
    async fn get_properties(&self, mask: PropertyPoolMask) -> Result<Vec<Property>, CoreError> {
        let properties = self.list_properties(mask).await?;
        tracing::debug!(pools = mask.bits(), count = properties.len(), "Fetched properties");
        Ok(properties)
    }
}

#[async_trait]
impl ResourceSearch for CatalogApi {
    async fn search(&self, filter: &SearchFilterGroup) -> Result<Vec<DbId>, CoreError> {
        Ok(self.search_resources(filter).await?)
    }
}

#[async_trait]
impl ResourceValueStore for CatalogApi {
    async fn read_values(
        &self,
        resource_ids: &[DbId],
        keys: &[PropertyKey],
    ) -> Result<Vec<ResourceSnapshot>, CoreError> {
        let values = self.query_values(resource_ids, keys).await?;
        Ok(values.into_iter().map(ResourceValues::into_snapshot).collect())
    }

    async fn write_values(
        &self,
        writes: Vec<ResourceWrite>,
    ) -> Result<Vec<ResourceWriteOutcome>, CoreError> {
        let writes = writes.into_iter().map(ResourceValuesWrite::from).collect();
        let response = self.post_values(writes).await?;
        Ok(response.results.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let api = CatalogApi::new("http://catalog:5000/".to_string());
        assert_eq!(api.api_url, "http://catalog:5000");
    }

    #[test]
    fn api_error_maps_to_external() {
        let err: CoreError = CatalogApiError::ApiError {
            status: 503,
            body: "down".to_string(),
        }
        .into();
        assert!(matches!(err, CoreError::External(msg) if msg.contains("503")));
    }
}
