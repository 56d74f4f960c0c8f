//! Minimal HTTP/1.1 JSON transport.
//!
//! One TCP connection per request, driven in the background while the
//! response is read. Plain `http://` only: the API server is expected to
//! be reached through a local proxy or an insecure port.

use std::time::Duration;

use bytes::Bytes;
use http::{Method, StatusCode, Uri, header};
use http_body_util::{BodyExt, Full};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ClusterError, ClusterResult};
use crate::wire::Status;

/// A fully-read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    /// Decode a successful JSON body, or turn an error response into a
    /// `ClusterError` (404 → `NotFound`, 409 → `AlreadyExists`).
    pub fn json<T: DeserializeOwned>(&self, what: &str) -> ClusterResult<T> {
        self.check(what)?;
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Fail on a non-2xx status, discarding the body otherwise.
    pub fn check(&self, what: &str) -> ClusterResult<()> {
        if self.status.is_success() {
            return Ok(());
        }
        let message = serde_json::from_slice::<Status>(&self.body)
            .ok()
            .and_then(|s| s.message)
            .unwrap_or_else(|| String::from_utf8_lossy(&self.body).trim().to_string());

        Err(match self.status {
            StatusCode::NOT_FOUND => ClusterError::NotFound(what.to_string()),
            StatusCode::CONFLICT => ClusterError::AlreadyExists(what.to_string()),
            status => ClusterError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }
}

/// Sends JSON requests with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get(&self, url: &str) -> ClusterResult<HttpResponse> {
        self.send(Method::GET, url, None).await
    }

    pub async fn delete(&self, url: &str) -> ClusterResult<HttpResponse> {
        self.send(Method::DELETE, url, None).await
    }

    pub async fn post_json<T: Serialize>(&self, url: &str, body: &T) -> ClusterResult<HttpResponse> {
        let body = serde_json::to_vec(body)?;
        self.send(Method::POST, url, Some(body)).await
    }

    pub async fn put_json<T: Serialize>(&self, url: &str, body: &T) -> ClusterResult<HttpResponse> {
        let body = serde_json::to_vec(body)?;
        self.send(Method::PUT, url, Some(body)).await
    }

    /// Send a request and read the whole response body.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> ClusterResult<HttpResponse> {
        let uri: Uri = url
            .parse()
            .map_err(|e| ClusterError::Transport(format!("invalid url {url}: {e}")))?;
        if uri.scheme_str() != Some("http") {
            return Err(ClusterError::Transport(format!(
                "unsupported url scheme in {url} (only http:// is supported)"
            )));
        }
        let authority = uri
            .authority()
            .ok_or_else(|| ClusterError::Transport(format!("url without host: {url}")))?
            .clone();
        let address = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));
        // The request line carries origin-form; the authority goes in Host.
        let target = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        debug!(%method, %uri, "api request");

        let request = async {
            let stream = tokio::net::TcpStream::connect(&address)
                .await
                .map_err(|e| ClusterError::Transport(format!("connect {address}: {e}")))?;

            let io = hyper_util::rt::TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| ClusterError::Transport(format!("handshake {address}: {e}")))?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    debug!(error = %e, "api connection closed with error");
                }
            });

            let mut builder = http::Request::builder()
                .method(method.clone())
                .uri(target.as_str())
                .header(header::HOST, authority.as_str())
                .header(header::USER_AGENT, "rcpilot/0.1")
                .header(header::ACCEPT, "application/json");
            if body.is_some() {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
            }
            let req = builder
                .body(Full::new(Bytes::from(body.unwrap_or_default())))
                .map_err(|e| ClusterError::Transport(format!("build request: {e}")))?;

            let resp = sender
                .send_request(req)
                .await
                .map_err(|e| ClusterError::Transport(format!("{method} {uri}: {e}")))?;
            let status = resp.status();
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| ClusterError::Transport(format!("read body: {e}")))?
                .to_bytes();

            debug!(%status, bytes = body.len(), "api response");
            Ok::<_, ClusterError>(HttpResponse { status, body })
        };

        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ClusterError::Timeout(self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn response(status: StatusCode, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn maps_status_codes() {
        let not_found = response(StatusCode::NOT_FOUND, "{}");
        assert!(not_found.check("svc-a").unwrap_err().is_not_found());

        let conflict = response(StatusCode::CONFLICT, "{}");
        assert!(matches!(
            conflict.check("svc-a"),
            Err(ClusterError::AlreadyExists(_))
        ));

        let failed = response(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"kind": "Status", "message": "spec.replicas: Invalid value", "code": 422}"#,
        );
        match failed.check("svc-a") {
            Err(ClusterError::Api { status, message }) => {
                assert_eq!(status, 422);
                assert_eq!(message, "spec.replicas: Invalid value");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn non_json_error_body_is_kept() {
        let resp = response(StatusCode::BAD_GATEWAY, "upstream down\n");
        match resp.check("x") {
            Err(ClusterError::Api { message, .. }) => assert_eq!(message, "upstream down"),
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_https() {
        let transport = HttpTransport::new(Duration::from_secs(1));
        let err = transport.get("https://example.com/api").await.unwrap_err();
        assert!(matches!(err, ClusterError::Transport(_)));
    }

    #[tokio::test]
    async fn round_trips_against_a_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            assert!(request.starts_with("GET /api/v1/namespaces/default/pods"));
            let body = r#"{"items": []}"#;
            let reply = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
        });

        let transport = HttpTransport::new(Duration::from_secs(5));
        let resp = transport
            .get(&format!("http://{addr}/api/v1/namespaces/default/pods"))
            .await
            .unwrap();
        let list: crate::wire::PodList = resp.json("pods").unwrap();
        assert!(list.items.is_empty());
    }

    #[tokio::test]
    async fn connection_refused_is_a_transport_error() {
        // Bind then drop to obtain a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(Duration::from_secs(2));
        let err = transport.get(&format!("http://{addr}/")).await.unwrap_err();
        assert!(matches!(err, ClusterError::Transport(_)));
    }
}
