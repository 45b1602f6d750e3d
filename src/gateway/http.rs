use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use super::{ContentFetcher, FetchError, FetchedContent};

/// Fetches signed download URLs over HTTP, streaming the body.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = resp.bytes_stream().map_err(|e| std::io::Error::other(e.without_url()));

        Ok(FetchedContent {
            status,
            content_type,
            body: Box::pin(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transport_error_omits_url() {
        let fetcher = HttpFetcher::new().unwrap();
        // Nothing listens on port 1
        let err = fetcher
            .fetch("http://127.0.0.1:1/file/bot123:SECRETTOKEN/documents/a.bin")
            .await
            .err()
            .unwrap();

        assert!(matches!(err, FetchError::Http(_)));
        let message = err.to_string();
        assert!(!message.contains("SECRETTOKEN"), "{message}");
    }
}
