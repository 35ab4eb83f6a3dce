//! HTTP client for the remote API.

use super::{RemoteApi, RemoteError, RemoteResult};
use crate::{Error, Fields, Record, RecordId};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// [`RemoteApi`] over JSON/HTTP.
///
/// Routes are `{base_url}/{resource}` and `{base_url}/{resource}/{id}`, with
/// `POST {base_url}/{resource}/random` for batch generation.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: String,
    collection: Url,
}

impl HttpRemote {
    /// Create a client. Fails if the URL is not an absolute hierarchical one
    /// or the TLS backend cannot be initialized.
    pub fn new(
        base_url: impl Into<String>,
        resource: impl Into<String>,
        timeout: Duration,
    ) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        let resource = resource.into();
        let collection = Url::parse(&format!("{}/{}", base_url, resource.trim_matches('/')))
            .map_err(|e| Error::Config(format!("invalid remote URL {base_url}: {e}")))?;
        if collection.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "remote URL {base_url} cannot carry a path"
            )));
        }

        Ok(Self {
            client,
            base_url,
            collection,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> Url {
        self.collection.clone()
    }

    /// `{collection}/{segment}` with the segment percent-encoded, so text ids
    /// containing `/`, `?` or `#` stay one path segment.
    fn child_url(&self, segment: &str) -> Url {
        let mut url = self.collection.clone();
        // Checked in `new`: the collection URL can always take segments.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(segment);
        }
        url
    }

    fn record_url(&self, id: &RecordId) -> Url {
        self.child_url(&id.to_string())
    }

    /// Map non-2xx to an error and decode the body.
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> RemoteResult<T> {
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn check_status(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn list(&self) -> RemoteResult<Vec<Record>> {
        let response = self.client.get(self.collection_url()).send().await?;
        Self::handle_response(response).await
    }

    async fn get(&self, id: &RecordId) -> RemoteResult<Option<Record>> {
        let response = self.client.get(self.record_url(id)).send().await?;
        match Self::handle_response(response).await {
            Ok(record) => Ok(Some(record)),
            Err(RemoteError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create(&self, fields: &Fields) -> RemoteResult<Record> {
        let response = self
            .client
            .post(self.collection_url())
            .json(fields)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn update(&self, id: &RecordId, changes: &Fields) -> RemoteResult<Record> {
        let response = self
            .client
            .put(self.record_url(id))
            .json(changes)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn delete(&self, id: &RecordId) -> RemoteResult<()> {
        let response = self.client.delete(self.record_url(id)).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn generate_batch(&self) -> RemoteResult<Vec<Record>> {
        let response = self.client.post(self.child_url("random")).send().await?;
        Self::handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(base: &str, resource: &str) -> HttpRemote {
        HttpRemote::new(base, resource, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn urls_are_normalized() {
        let remote = remote("http://localhost:3000/api/", "/contacts/");
        assert_eq!(remote.base_url(), "http://localhost:3000/api");
        assert_eq!(
            remote.collection_url().as_str(),
            "http://localhost:3000/api/contacts"
        );
        assert_eq!(
            remote.record_url(&RecordId::Int(42)).as_str(),
            "http://localhost:3000/api/contacts/42"
        );
        assert_eq!(
            remote.child_url("random").as_str(),
            "http://localhost:3000/api/contacts/random"
        );
    }

    #[test]
    fn text_ids_are_one_escaped_segment() {
        let remote = remote("http://localhost:3000/api", "contacts");
        let url = remote.record_url(&RecordId::from("a/b?c#d"));

        assert_eq!(url.as_str(), "http://localhost:3000/api/contacts/a%2Fb%3Fc%23d");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path_segments().map(|s| s.count()), Some(3));
    }

    #[test]
    fn unusable_base_url_is_config_error() {
        let result = HttpRemote::new("not a url", "contacts", Duration::from_secs(1));
        assert!(matches!(result, Err(Error::Config(_))));

        let result = HttpRemote::new("mailto:someone", "contacts", Duration::from_secs(1));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        // Port 9 (discard) on localhost is almost never listening
        let remote = remote("http://127.0.0.1:9/api", "contacts");
        let result = remote.list().await;
        assert!(matches!(result, Err(RemoteError::Transport(_))));
    }
}
