//! Block store backed by an HTTP block gateway
//!
//! Reads `GET` the source URL for an address. Writes `POST` the block to the
//! sink URL, then optionally `POST` the pin URL so the remote end keeps it.

use super::{BlockStore, UrlResolver};
use crate::model::Address;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

/// Remote content-addressed store reached through pluggable URL resolvers
pub struct HttpStore {
    client: reqwest::Client,
    source: Arc<dyn UrlResolver>,
    sink: Arc<dyn UrlResolver>,
    pin: Option<Arc<dyn UrlResolver>>,
}

impl HttpStore {
    pub fn new(
        source: Arc<dyn UrlResolver>,
        sink: Arc<dyn UrlResolver>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpStore {
            client,
            source,
            sink,
            pin: None,
        })
    }

    /// Set the resolver for the pinning endpoint
    pub fn with_pin(mut self, pin: Arc<dyn UrlResolver>) -> Self {
        self.pin = Some(pin);
        self
    }
}

#[async_trait]
impl BlockStore for HttpStore {
    async fn put(&self, block: Bytes) -> Result<Address> {
        let address = Address::digest(&block);
        let url = self.sink.url(&address);
        tracing::debug!(%url, address = %address.short(), "submitting block");

        let response = self.client.post(&url).body(block).send().await?;
        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "block submission to {} failed: {}",
                url,
                response.status()
            )));
        }
        Ok(address)
    }

    async fn get(&self, address: &Address) -> Result<Bytes> {
        let url = self.source.url(address);
        tracing::debug!(%url, "fetching block");

        let response = self.client.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                return Err(Error::NotFound(address.to_hex()))
            }
            status if !status.is_success() => {
                return Err(Error::Http(format!("fetch from {} failed: {}", url, status)))
            }
            _ => {}
        }

        let block = response.bytes().await?;
        if !address.verify(&block) {
            return Err(Error::Corruption(format!(
                "gateway returned bytes that do not hash to {}",
                address
            )));
        }
        Ok(block)
    }

    async fn contains(&self, address: &Address) -> Result<bool> {
        let url = self.source.url(address);
        let response = self.client.head(&url).send().await?;
        Ok(response.status().is_success())
    }

    async fn pin(&self, address: &Address) -> Result<()> {
        let Some(pin) = &self.pin else {
            return Ok(());
        };
        let url = pin.url(address);
        tracing::debug!(%url, "pinning block");

        let response = self.client.post(&url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "pin request to {} failed: {}",
                url,
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UrlTemplate;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> HttpStore {
        let source = UrlTemplate::new(format!("{}/block/{{address}}", server.uri()));
        let sink = UrlTemplate::new(format!("{}/put", server.uri()));
        HttpStore::new(Arc::new(source), Arc::new(sink), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_get_checks_hash() {
        let server = MockServer::start().await;
        let block = b"encrypted block".to_vec();
        let good = Address::digest(&block);
        let bad = Address::digest(b"something else");
        for address in [good, bad] {
            Mock::given(method("GET"))
                .and(path(format!("/block/{}", address.to_hex())))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(block.clone()))
                .mount(&server)
                .await;
        }

        let store = store(&server);
        assert_eq!(store.get(&good).await.unwrap().as_ref(), block.as_slice());
        assert!(matches!(store.get(&bad).await, Err(Error::Corruption(_))));
    }

    #[tokio::test]
    async fn test_missing_blocks() {
        let server = MockServer::start().await;
        let gone = Address::digest(b"gone");
        let missing = Address::digest(b"missing");
        let broken = Address::digest(b"broken");
        for (address, status) in [(gone, 410), (missing, 404), (broken, 500)] {
            Mock::given(method("GET"))
                .and(path(format!("/block/{}", address.to_hex())))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;
        }

        let store = store(&server);
        assert!(matches!(store.get(&gone).await, Err(Error::NotFound(_))));
        assert!(matches!(store.get(&missing).await, Err(Error::NotFound(_))));
        assert!(matches!(store.get(&broken).await, Err(Error::Http(_))));
    }

    #[tokio::test]
    async fn test_put_reports_sink_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/put"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = store(&server).put(Bytes::from_static(b"block")).await;
        assert!(matches!(result, Err(Error::Http(_))));
    }

    #[tokio::test]
    async fn test_put_returns_address_and_pin_is_optional() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/put"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = store(&server);
        let block = Bytes::from_static(b"block");
        let address = store.put(block.clone()).await.unwrap();
        assert_eq!(address, Address::digest(&block));

        // without a pin resolver nothing is sent
        store.pin(&address).await.unwrap();
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body, block.to_vec());
    }

    #[tokio::test]
    async fn test_pin_posts_to_resolver() {
        let server = MockServer::start().await;
        let address = Address::digest(b"block");
        Mock::given(method("POST"))
            .and(path(format!("/pin/{}", address.to_hex())))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let pin = UrlTemplate::new(format!("{}/pin/{{address}}", server.uri()));
        let store = store(&server).with_pin(Arc::new(pin));
        store.pin(&address).await.unwrap();

        let unpinnable = Address::digest(b"other");
        assert!(matches!(store.pin(&unpinnable).await, Err(Error::Http(_))));
    }

    #[tokio::test]
    async fn test_contains_uses_head() {
        let server = MockServer::start().await;
        let present = Address::digest(b"present");
        Mock::given(method("HEAD"))
            .and(path(format!("/block/{}", present.to_hex())))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = store(&server);
        assert!(store.contains(&present).await.unwrap());
        assert!(!store.contains(&Address::digest(b"absent")).await.unwrap());
    }
}
