use std::sync::Arc;
use std::time::Duration;

use gridfall_types::api::{
    AchievementsQuery, AchievementsResponse, ApiErrorBody, ClaimAchievementRequest,
    ClaimAchievementResponse, DailyClaimResponse, DailyRewardsResponse, ExchangeRequest,
    ExchangeResponse, ExchangeStatusResponse, Reason, SessionStartRequest, SessionStartResponse,
    SpinResponse,
};
use gridfall_types::SessionStats;
use rand::{Rng, RngCore};
use reqwest::{Client as HttpClient, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::{Error, Result};

/// Default timeout for connections and requests.
const TIMEOUT: Duration = Duration::from_secs(30);

/// Supplies the bearer credential. Implemented by the authentication
/// collaborator; `None` means the player is not signed in.
pub trait CredentialSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Fixed-token credential source for tools and tests.
pub struct StaticCredentials(String);

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Arc<Self> {
        Arc::new(Self(token.into()))
    }
}

impl CredentialSource for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Retry policy for transient HTTP failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request (including the first attempt).
    pub max_attempts: usize,
    /// Initial backoff delay after the first retryable failure.
    pub initial_backoff: Duration,
    /// Maximum backoff delay between attempts.
    pub max_backoff: Duration,
    /// Whether non-idempotent requests (e.g., POST) may be retried.
    pub retry_non_idempotent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            retry_non_idempotent: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Authenticated HTTP interface to the economy backend.
#[derive(Clone)]
pub struct Gateway {
    base_url: Url,
    http: HttpClient,
    credentials: Arc<dyn CredentialSource>,
    retry: RetryPolicy,
}

/// "Equal jitter": delay is in [backoff/2, backoff].
fn jittered_backoff(rng: &mut impl RngCore, backoff: Duration) -> Duration {
    let backoff_ms = backoff.as_millis() as u64;
    if backoff_ms <= 1 {
        return backoff;
    }
    let half_ms = backoff_ms / 2;
    let jitter_ms = rng.gen_range(0..=half_ms);
    Duration::from_millis(half_ms.saturating_add(jitter_ms))
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

impl Gateway {
    pub fn new(config: GatewayConfig, credentials: Arc<dyn CredentialSource>) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidScheme(scheme.to_string())),
        }
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(Error::Build)?;
        Ok(Self {
            base_url,
            http,
            credentials,
            retry: config.retry,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.credentials.bearer_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_with_retry(
        &self,
        method: Method,
        make_request: impl Fn() -> RequestBuilder,
    ) -> Result<reqwest::Response> {
        let max_attempts = if method == Method::GET || self.retry.retry_non_idempotent {
            self.retry.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 0usize;
        let mut backoff = self.retry.initial_backoff;
        loop {
            attempt += 1;
            match make_request().send().await {
                Ok(response) => {
                    if !is_retryable_status(response.status()) || attempt >= max_attempts {
                        return Ok(response);
                    }
                }
                Err(err) => {
                    if attempt >= max_attempts || !is_retryable_error(&err) {
                        return Err(Error::Offline(err));
                    }
                }
            }
            let delay = jittered_backoff(&mut rand::thread_rng(), backoff);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying request");
            sleep(delay).await;
            backoff = backoff.saturating_mul(2).min(self.retry.max_backoff);
        }
    }

    /// Maps a non-success response into the error taxonomy: 401 and
    /// `unauthorized` reasons become session expiry, a parseable envelope
    /// becomes a classified domain rejection, anything else is generic.
    async fn failure(response: reqwest::Response) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let envelope: Option<ApiErrorBody> = serde_json::from_str(&body).ok();
        let reason = envelope.as_ref().and_then(|b| b.reason());
        if status == StatusCode::UNAUTHORIZED || reason == Some(Reason::Unauthorized) {
            return Error::Unauthorized;
        }
        match envelope {
            Some(envelope) => Error::Api {
                status,
                message: envelope.error.message,
                reason,
            },
            None => Error::Failed(status),
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        response.json::<T>().await.map_err(Error::InvalidBody)
    }

    async fn expect_success(response: reqwest::Response) -> Result<()> {
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        let response = self
            .send_with_retry(Method::GET, || self.authorized(self.http.get(url.clone())))
            .await?;
        Self::decode(response).await
    }

    async fn post_json<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path)?;
        let response = self
            .send_with_retry(Method::POST, || {
                self.authorized(self.http.post(url.clone()).json(body))
            })
            .await?;
        Self::decode(response).await
    }

    // --- Economy endpoints ---

    pub async fn spin(&self) -> Result<SpinResponse> {
        let url = self.url("spin")?;
        let response = self
            .send_with_retry(Method::POST, || self.authorized(self.http.post(url.clone())))
            .await?;
        Self::decode(response).await
    }

    pub async fn exchange_status(&self) -> Result<ExchangeStatusResponse> {
        self.get_json("exchange/status").await
    }

    pub async fn exchange(&self, request: ExchangeRequest) -> Result<ExchangeResponse> {
        self.post_json("exchange", &request).await
    }

    pub async fn my_achievements(&self, query: &AchievementsQuery) -> Result<AchievementsResponse> {
        let url = self.url("achievements/mine")?;
        let response = self
            .send_with_retry(Method::GET, || {
                self.authorized(self.http.get(url.clone()).query(query))
            })
            .await?;
        Self::decode(response).await
    }

    pub async fn claim_achievement(&self, uuid: Uuid) -> Result<ClaimAchievementResponse> {
        self.post_json("achievements/claim", &ClaimAchievementRequest { uuid })
            .await
    }

    pub async fn daily_rewards_status(&self) -> Result<DailyRewardsResponse> {
        self.get_json("daily-rewards/status").await
    }

    pub async fn claim_daily_reward(&self) -> Result<DailyClaimResponse> {
        let url = self.url("daily-rewards/claim")?;
        let response = self
            .send_with_retry(Method::POST, || self.authorized(self.http.post(url.clone())))
            .await?;
        Self::decode(response).await
    }

    // --- Session endpoints ---

    pub async fn start_session(
        &self,
        request: &SessionStartRequest,
    ) -> Result<SessionStartResponse> {
        self.post_json("session/start", request).await
    }

    pub async fn session_heartbeat(&self, stats: &SessionStats) -> Result<()> {
        let url = self.url("session/heartbeat")?;
        let response = self
            .send_with_retry(Method::POST, || {
                self.authorized(self.http.post(url.clone()).json(stats))
            })
            .await?;
        Self::expect_success(response).await
    }

    pub async fn end_session(&self, stats: &SessionStats) -> Result<()> {
        let url = self.url("session/end")?;
        let response = self
            .send_with_retry(Method::POST, || {
                self.authorized(self.http.post(url.clone()).json(stats))
            })
            .await?;
        Self::expect_success(response).await
    }

    /// Best-effort send that survives the caller's teardown: the request is
    /// dispatched on a detached task and the response is never awaited. Used
    /// for the final end-of-session report on page unload.
    pub fn send_keepalive(&self, path: &str, body: serde_json::Value) {
        let url = match self.url(path) {
            Ok(url) => url,
            Err(err) => {
                warn!(path, error = %err, "keepalive dropped: bad path");
                return;
            }
        };
        let request = self.authorized(self.http.post(url).json(&body));
        tokio::spawn(async move {
            match request.send().await {
                Ok(response) => debug!(status = %response.status(), "keepalive delivered"),
                Err(err) => debug!(error = %err, "keepalive dropped"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn jitter_stays_within_equal_jitter_window() {
        let mut rng = rand::thread_rng();
        let backoff = Duration::from_millis(400);
        for _ in 0..64 {
            let delay = jittered_backoff(&mut rng, backoff);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= backoff);
        }
    }

    #[test]
    fn tiny_backoff_skips_jitter() {
        let mut rng = StepRng::new(0, 1);
        assert_eq!(
            jittered_backoff(&mut rng, Duration::from_millis(1)),
            Duration::from_millis(1)
        );
    }

    #[test]
    fn rejects_non_http_scheme() {
        let result = Gateway::new(
            GatewayConfig::new("ftp://example.com"),
            StaticCredentials::new("t"),
        );
        assert!(matches!(result, Err(Error::InvalidScheme(_))));
    }
}
