//! reqwest-backed catalog client.
//!
//! # Invariants
//! - Every request carries the configured API key and asks for JSON output.
//! - The API key never appears in log records.

use super::dto::parse_book_list;
use super::{CatalogClient, CatalogError, CatalogResult};
use crate::config::CatalogConfig;
use crate::model::book::BookSummary;
use log::{error, info};
use reqwest::blocking::Client;
use std::time::Instant;

const BEST_SELLER_PATH: &str = "api/bestSeller.api";
const SEARCH_PATH: &str = "api/search.api";

/// Blocking HTTP client for the catalog service.
///
/// Calls block the current thread; the coordinator runs them on its
/// network worker.
pub struct HttpCatalogClient {
    config: CatalogConfig,
    client: Client,
}

impl HttpCatalogClient {
    pub fn new(config: CatalogConfig) -> CatalogResult<Self> {
        config
            .validate()
            .map_err(|err| CatalogError::Config(err.to_string()))?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| CatalogError::Config(err.to_string()))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn fetch(
        &self,
        op: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> CatalogResult<Vec<BookSummary>> {
        let started_at = Instant::now();
        let mut params = vec![
            ("key", self.config.api_key.clone()),
            ("output", "json".to_string()),
        ];
        params.extend(query.iter().map(|(name, value)| (*name, value.clone())));

        let response = self
            .client
            .get(self.endpoint(path))
            .query(&params)
            .send()
            .map_err(|err| {
                let err = err.without_url();
                error!(
                    "event=catalog_request module=catalog status=error op={} duration_ms={} error_code=transport error={}",
                    op,
                    started_at.elapsed().as_millis(),
                    err
                );
                CatalogError::Network(err.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(
                "event=catalog_request module=catalog status=error op={} duration_ms={} error_code=http_status http_status={}",
                op,
                started_at.elapsed().as_millis(),
                status.as_u16()
            );
            return Err(CatalogError::Response {
                status: status.as_u16(),
            });
        }

        let body = response.text().map_err(|err| {
            let err = err.without_url();
            error!(
                "event=catalog_request module=catalog status=error op={} duration_ms={} error_code=transport error={}",
                op,
                started_at.elapsed().as_millis(),
                err
            );
            CatalogError::Network(err.to_string())
        })?;
        let books = parse_book_list(&body).inspect_err(|err| {
            error!(
                "event=catalog_request module=catalog status=error op={} error_code=decode error={}",
                op, err
            );
        })?;

        info!(
            "event=catalog_request module=catalog status=ok op={} duration_ms={} count={}",
            op,
            started_at.elapsed().as_millis(),
            books.len()
        );
        Ok(books)
    }
}

impl CatalogClient for HttpCatalogClient {
    fn best_sellers(&self) -> CatalogResult<Vec<BookSummary>> {
        self.fetch(
            "best_sellers",
            BEST_SELLER_PATH,
            &[(
                "categoryId",
                self.config.best_seller_category_id.to_string(),
            )],
        )
    }

    fn search(&self, keyword: &str) -> CatalogResult<Vec<BookSummary>> {
        self.fetch("search", SEARCH_PATH, &[("query", keyword.to_string())])
    }
}
