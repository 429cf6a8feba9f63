use std::time::Duration;

use async_trait::async_trait;
use dew_core::ServerStats;

use crate::error::RconError;

/// Something that can produce a fresh stats snapshot.
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn fetch(&self) -> Result<ServerStats, RconError>;
}

/// Polls a server's HTTP stats endpoint.
pub struct HttpStatsSource {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpStatsSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl StatsSource for HttpStatsSource {
    async fn fetch(&self) -> Result<ServerStats, RconError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RconError::StatsTimeout(self.timeout)
                } else {
                    RconError::StatsRequest(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RconError::StatsStatus(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RconError::StatsRequest(e.to_string()))?;
        ServerStats::from_json(&body).map_err(|e| RconError::StatsDecode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{addr}/")
    }

    fn source(url: String) -> HttpStatsSource {
        HttpStatsSource::new(reqwest::Client::new(), url, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn fetch_decodes_players() {
        let url = serve(Router::new().route(
            "/",
            get(|| async { r#"{"name":"srv","numPlayers":1,"players":[{"name":"A","serviceTag":"T","uid":"aa"}]}"# }),
        ))
        .await;

        let stats = source(url).fetch().await.unwrap();
        assert_eq!(stats.name, "srv");
        assert_eq!(stats.players.len(), 1);
        assert_eq!(stats.players[0].uid, "aa");
    }

    #[tokio::test]
    async fn fetch_reports_decode_error() {
        let url = serve(Router::new().route("/", get(|| async { "<html>oops</html>" }))).await;
        let err = source(url).fetch().await.unwrap_err();
        assert!(matches!(err, RconError::StatsDecode(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn fetch_reports_bad_status() {
        let url = serve(Router::new().route(
            "/",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
        ))
        .await;
        let err = source(url).fetch().await.unwrap_err();
        assert!(matches!(err, RconError::StatsStatus(503)), "got: {err:?}");
    }

    #[tokio::test]
    async fn fetch_times_out() {
        let url = serve(Router::new().route(
            "/",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "{}"
            }),
        ))
        .await;
        let source = HttpStatsSource::new(reqwest::Client::new(), url, Duration::from_millis(100));
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, RconError::StatsTimeout(_)), "got: {err:?}");
    }
}
