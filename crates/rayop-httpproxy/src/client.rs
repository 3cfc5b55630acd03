//! Ray Serve proxy health client

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use tracing::{debug, trace};

use rayop_common::RAY_SERVE_PROXY_HEALTH_PATH;

use crate::error::ProxyError;

/// Deadline for one health probe, connection through body
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Probes the proxy actor of one Ray pod
#[async_trait]
pub trait HttpProxyClient: Send + Sync {
    /// Build the underlying HTTP client
    fn init_client(&mut self) -> Result<(), ProxyError>;

    /// Point the client at a pod's proxy
    fn set_host_ip(&mut self, host_ip: &str, pod_namespace: &str, pod_name: &str, port: u16);

    /// GET the proxy health endpoint; any non-200 answer is an error
    async fn check_proxy_actor_health(&self) -> Result<(), ProxyError>;
}

/// Reach the pod through the API server's pod proxy instead of its IP
#[derive(Clone, Debug)]
struct ApiServerProxy {
    host: String,
    client: reqwest::Client,
}

/// [`HttpProxyClient`] over `reqwest`
#[derive(Clone, Debug, Default)]
pub struct RayHttpProxyClient {
    client: Option<reqwest::Client>,
    proxy_url: Option<String>,
    api_server: Option<ApiServerProxy>,
}

impl RayHttpProxyClient {
    /// Client probing pods directly on their IP
    pub fn new() -> Self {
        Self::default()
    }

    /// Client probing pods through the API server proxy at `api_server_host`
    ///
    /// `client` must already carry the API server credentials.
    pub fn with_kubernetes_proxy(api_server_host: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client: None,
            proxy_url: None,
            api_server: Some(ApiServerProxy {
                host: api_server_host.into(),
                client,
            }),
        }
    }

    /// Base URL of the proxy, set by `set_host_ip`
    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }
}

#[async_trait]
impl HttpProxyClient for RayHttpProxyClient {
    fn init_client(&mut self) -> Result<(), ProxyError> {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(ProxyError::ClientBuild)?;
        self.client = Some(client);
        Ok(())
    }

    fn set_host_ip(&mut self, host_ip: &str, pod_namespace: &str, pod_name: &str, port: u16) {
        let url = match &self.api_server {
            Some(proxy) => {
                self.client = Some(proxy.client.clone());
                format!(
                    "{}/api/v1/namespaces/{pod_namespace}/pods/{pod_name}:{port}/proxy/",
                    proxy.host.trim_end_matches('/')
                )
            }
            None if host_ip.contains(':') => format!("http://[{host_ip}]:{port}/"),
            None => format!("http://{host_ip}:{port}/"),
        };
        self.proxy_url = Some(url);
    }

    async fn check_proxy_actor_health(&self) -> Result<(), ProxyError> {
        let client = self
            .client
            .as_ref()
            .ok_or(ProxyError::NotInitialized("call init_client first"))?;
        let base = self
            .proxy_url
            .as_deref()
            .ok_or(ProxyError::NotInitialized("call set_host_ip first"))?;
        let url = format!("{base}{RAY_SERVE_PROXY_HEALTH_PATH}");

        debug!(url = %url, "checking proxy actor health");
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|source| ProxyError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response
                .text()
                .await
                .map_err(|source| ProxyError::BodyRead {
                    status: status.as_u16(),
                    source,
                })?;
            return Err(ProxyError::UnhealthyStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            });
        }

        // A healthy answer's body is drained without being kept
        let mut drained = 0usize;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(chunk) => drained += chunk.len(),
                Err(e) => {
                    debug!(
                        url = %url,
                        drained,
                        error = %e,
                        "stopped draining healthy proxy response"
                    );
                    break;
                }
            }
        }
        trace!(url = %url, drained, "proxy actor healthy");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Instant;

    use axum::body::{Body, Bytes};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use axum::Router;
    use rayop_common::DEFAULT_SERVING_PORT;

    use super::*;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn client_for(addr: SocketAddr) -> RayHttpProxyClient {
        let mut client = RayHttpProxyClient::new();
        client.init_client().unwrap();
        client.set_host_ip(&addr.ip().to_string(), "default", "raycluster-head", addr.port());
        client
    }

    #[tokio::test]
    async fn healthy_proxy_returns_ok() {
        let big_body = "x".repeat(256 * 1024);
        let router = Router::new().route(
            "/-/healthz",
            get(move || {
                let body = big_body.clone();
                async move { body }
            }),
        );
        let addr = serve(router).await;

        client_for(addr).check_proxy_actor_health().await.unwrap();
    }

    #[tokio::test]
    async fn truncated_healthy_body_still_counts_as_healthy() {
        let router = Router::new().route(
            "/-/healthz",
            get(|| async {
                // the head and first chunk go out before the stream fails
                let head = futures::stream::once(async {
                    Ok::<_, std::io::Error>(Bytes::from_static(b"success"))
                });
                let failure = futures::stream::once(async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "proxy went away"))
                });
                Body::from_stream(head.chain(failure))
            }),
        );
        let addr = serve(router).await;

        client_for(addr).check_proxy_actor_health().await.unwrap();
    }

    #[tokio::test]
    async fn unhealthy_status_reports_code_and_body() {
        let router = Router::new().route(
            "/-/healthz",
            get(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "proxy actor is draining") }),
        );
        let addr = serve(router).await;

        let err = client_for(addr)
            .check_proxy_actor_health()
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::UnhealthyStatus { status: 503, .. }));
        let message = err.to_string();
        assert!(message.contains("503"), "{message}");
        assert!(message.contains("proxy actor is draining"), "{message}");
    }

    #[tokio::test]
    async fn missing_route_is_unhealthy() {
        let addr = serve(Router::new()).await;

        let err = client_for(addr)
            .check_proxy_actor_health()
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::UnhealthyStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        // bind then drop to get a port nobody listens on
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let started = Instant::now();
        let err = client_for(addr)
            .check_proxy_actor_health()
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::Transport { .. }));
        assert!(started.elapsed() < PROBE_TIMEOUT + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn silent_proxy_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // accept connections and never answer
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let started = Instant::now();
        let err = client_for(addr)
            .check_proxy_actor_health()
            .await
            .unwrap_err();

        assert!(err.is_timeout(), "{err}");
        let elapsed = started.elapsed();
        assert!(elapsed >= PROBE_TIMEOUT, "{elapsed:?}");
        assert!(elapsed < PROBE_TIMEOUT + Duration::from_secs(2), "{elapsed:?}");
    }

    #[tokio::test]
    async fn probe_before_init_fails() {
        let mut client = RayHttpProxyClient::new();
        client.set_host_ip("10.0.0.1", "default", "pod", 8000);
        assert!(matches!(
            client.check_proxy_actor_health().await,
            Err(ProxyError::NotInitialized(_))
        ));

        let mut client = RayHttpProxyClient::new();
        client.init_client().unwrap();
        assert!(matches!(
            client.check_proxy_actor_health().await,
            Err(ProxyError::NotInitialized(_))
        ));
    }

    #[test]
    fn direct_urls() {
        let mut client = RayHttpProxyClient::new();
        client.set_host_ip("10.1.2.3", "default", "pod", DEFAULT_SERVING_PORT);
        assert_eq!(client.proxy_url(), Some("http://10.1.2.3:8000/"));

        client.set_host_ip("fd00::12", "default", "pod", DEFAULT_SERVING_PORT);
        assert_eq!(client.proxy_url(), Some("http://[fd00::12]:8000/"));
    }

    #[test]
    fn api_server_proxy_url() {
        let mut client =
            RayHttpProxyClient::with_kubernetes_proxy("https://10.96.0.1:443/", reqwest::Client::new());
        client.set_host_ip("10.1.2.3", "ray-system", "rayservice-head-abc", DEFAULT_SERVING_PORT);
        assert_eq!(
            client.proxy_url(),
            Some("https://10.96.0.1:443/api/v1/namespaces/ray-system/pods/rayservice-head-abc:8000/proxy/")
        );
        assert!(client.client.is_some());
    }
}
