use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;

use super::RemoteStore;
use crate::timeline::Timeline;

/// Remote store reached over HTTP: `GET {base_url}/users/{id}/timelines`.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, timeout: Duration, token: Option<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid remote base URL '{}'", base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Remote base URL '{}' cannot carry a path", base_url);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("futurecast/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    pub fn timelines_url(&self, user_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                anyhow::anyhow!("Remote base URL '{}' cannot carry a path", self.base_url)
            })?
            .pop_if_empty()
            .extend(["users", user_id, "timelines"]);
        Ok(url)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch_timelines(&self, user_id: &str) -> Result<Vec<Timeline>> {
        let url = self.timelines_url(user_id)?;
        let mut request = self
            .client
            .get(url.clone())
            .header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        request
            .send()
            .await
            .with_context(|| format!("Failed to send timeline request to {}", url))?
            .error_for_status()
            .context("Remote timeline store returned error status")?
            .json::<Vec<Timeline>>()
            .await
            .context("Failed to parse remote timelines")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::fixtures;
    use chrono::Utc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and return the raw request.
    async fn serve_once(
        status: &'static str,
        body: String,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });
        (base, handle)
    }

    #[test]
    fn test_timelines_url_joins_segments() {
        let store =
            HttpRemoteStore::new("https://api.example.com", Duration::from_secs(5), None).unwrap();
        assert_eq!(
            store.timelines_url("u-1").unwrap().as_str(),
            "https://api.example.com/users/u-1/timelines"
        );

        let nested =
            HttpRemoteStore::new("https://api.example.com/v1/", Duration::from_secs(5), None)
                .unwrap();
        assert_eq!(
            nested.timelines_url("a/b").unwrap().as_str(),
            "https://api.example.com/v1/users/a%2Fb/timelines"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(HttpRemoteStore::new("not a url", Duration::from_secs(5), None).is_err());
        assert!(
            HttpRemoteStore::new("mailto:me@example.com", Duration::from_secs(5), None).is_err()
        );
    }

    #[tokio::test]
    async fn test_fetch_sends_bearer_token_and_parses_body() {
        let body = serde_json::to_string(&vec![fixtures::timeline("r1", "Remote", Utc::now())])
            .unwrap();
        let (base, server) = serve_once("200 OK", body).await;
        let store = HttpRemoteStore::new(
            &base,
            Duration::from_secs(5),
            Some("secret-token".to_string()),
        )
        .unwrap();

        let timelines = store.fetch_timelines("u-7").await.unwrap();

        assert_eq!(timelines.len(), 1);
        assert_eq!(timelines[0].id, "r1");
        let request = server.await.unwrap();
        assert!(request.starts_with("GET /users/u-7/timelines"));
        assert!(request.to_lowercase().contains("authorization: bearer secret-token"));
    }

    #[tokio::test]
    async fn test_fetch_error_status_is_error() {
        let (base, server) = serve_once("500 Internal Server Error", "{}".to_string()).await;
        let store = HttpRemoteStore::new(&base, Duration::from_secs(5), None).unwrap();

        let err = store.fetch_timelines("u-7").await.unwrap_err();

        assert!(err.to_string().contains("error status"));
        server.await.unwrap();
    }
}
