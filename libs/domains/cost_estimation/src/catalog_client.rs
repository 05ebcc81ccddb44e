//! HTTP pricing catalog client.
//!
//! `POST {endpoint}/v1/prices/match` with the [`CatalogQuery`] as JSON body and
//! the API key in `X-Api-Key`. The body of a 200 response is either a
//! [`CatalogPrice`] or `null`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::catalog::{CatalogError, CatalogPrice, CatalogQuery, CatalogResult, PricingCatalog};

const MATCH_PATH: &str = "/v1/prices/match";

pub struct HttpPricingCatalog {
    client: Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpPricingCatalog {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cost-estimator/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: format!("{}{MATCH_PATH}", endpoint.trim_end_matches('/')),
            api_key: api_key.to_string(),
            timeout,
        })
    }

    fn transport_error(&self, error: reqwest::Error) -> CatalogError {
        if error.is_timeout() {
            CatalogError::Timeout(self.timeout)
        } else {
            CatalogError::Transient(error.to_string())
        }
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl PricingCatalog for HttpPricingCatalog {
    async fn query(&self, query: &CatalogQuery) -> CatalogResult<Option<CatalogPrice>> {
        let response = self
            .client
            .post(&self.url)
            .header("X-Api-Key", &self.api_key)
            .json(query)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        debug!(
            status = %status,
            service = %query.service,
            family = %query.product_family,
            "Catalog responded"
        );

        match status {
            s if s.is_success() => response.json::<Option<CatalogPrice>>().await.map_err(|e| {
                if e.is_decode() {
                    CatalogError::InvalidResponse(e.to_string())
                } else {
                    self.transport_error(e)
                }
            }),
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                CatalogError::Unauthorized(format!("catalog returned {status}")),
            ),
            StatusCode::TOO_MANY_REQUESTS => Err(CatalogError::RateLimited {
                retry_after: retry_after(&response),
            }),
            s if s.is_server_error() => {
                Err(CatalogError::Transient(format!("catalog returned {s}")))
            }
            s => Err(CatalogError::InvalidResponse(format!("unexpected status {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::collections::BTreeMap;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn query() -> CatalogQuery {
        CatalogQuery {
            service: "AmazonEC2".into(),
            product_family: "Storage Snapshot".into(),
            product_attributes: BTreeMap::from([("region".to_string(), "us-east-1".to_string())]),
            price_attributes: BTreeMap::new(),
        }
    }

    async fn catalog_responding(template: ResponseTemplate) -> (MockServer, HttpPricingCatalog) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MATCH_PATH))
            .and(header("X-Api-Key", "test-key"))
            .respond_with(template)
            .mount(&server)
            .await;
        let catalog =
            HttpPricingCatalog::new(&server.uri(), "test-key", Duration::from_secs(5)).unwrap();
        (server, catalog)
    }

    #[tokio::test]
    async fn test_matched_price() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MATCH_PATH))
            .and(body_partial_json(json!({
                "service": "AmazonEC2",
                "productFamily": "Storage Snapshot",
                "productAttributes": {"region": "us-east-1"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "unitPrice": "0.05",
                "currency": "USD",
                "unit": "GB-Mo"
            })))
            .expect(1)
            .mount(&server)
            .await;
        let endpoint = format!("{}/", server.uri());
        let catalog =
            HttpPricingCatalog::new(&endpoint, "test-key", Duration::from_secs(5)).unwrap();

        let price = catalog.query(&query()).await.unwrap().unwrap();

        assert_eq!(price.unit_price, dec!(0.05));
        assert_eq!(price.unit, "GB-Mo");
    }

    #[tokio::test]
    async fn test_null_body_is_not_found() {
        let (_server, catalog) =
            catalog_responding(ResponseTemplate::new(200).set_body_json(json!(null))).await;

        assert_eq!(catalog.query(&query()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_404_is_not_found() {
        let (_server, catalog) = catalog_responding(ResponseTemplate::new(404)).await;

        assert_eq!(catalog.query(&query()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let (_server, catalog) = catalog_responding(ResponseTemplate::new(401)).await;

        let err = catalog.query(&query()).await.unwrap_err();

        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let (_server, catalog) =
            catalog_responding(ResponseTemplate::new(429).insert_header("Retry-After", "3")).await;

        let err = catalog.query(&query()).await.unwrap_err();

        assert!(matches!(
            err,
            CatalogError::RateLimited {
                retry_after: Some(d)
            } if d == Duration::from_secs(3)
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let (_server, catalog) = catalog_responding(ResponseTemplate::new(503)).await;

        let err = catalog.query(&query()).await.unwrap_err();

        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let body = ResponseTemplate::new(200).set_body_string("<html>oops</html>");
        let (_server, catalog) = catalog_responding(body).await;

        let err = catalog.query(&query()).await.unwrap_err();

        assert!(matches!(err, CatalogError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;
        let catalog =
            HttpPricingCatalog::new(&server.uri(), "test-key", Duration::from_millis(50)).unwrap();

        let err = catalog.query(&query()).await.unwrap_err();

        assert!(matches!(err, CatalogError::Timeout(_)));
    }
}
