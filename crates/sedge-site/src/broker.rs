//! REST client for the external timer broker.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use sedge_core::TimerService;
use sedge_core::TimerServiceError;
use url::Url;

/// [`TimerService`] implementation speaking the broker's REST surface:
/// `POST /timers` to create, `PUT /timers/{id}` to refresh, and
/// `DELETE /timers/{id}` to cancel. The broker answers create and update
/// with the timer's id.
pub struct HttpTimerService {
    client: Client,
    base_url: Url,
}

impl HttpTimerService {
    /// Create a client for the broker at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, TimerServiceError> {
        let base_url = Url::parse(base_url).map_err(|e| TimerServiceError::Request {
            reason: format!("invalid broker url '{base_url}': {e}"),
        })?;
        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    fn timer_url(&self, timer_id: Option<&str>) -> Result<Url, TimerServiceError> {
        let path = match timer_id {
            None => "timers".to_string(),
            Some(id) => format!("timers/{id}"),
        };
        self.base_url.join(&path).map_err(|e| TimerServiceError::Request {
            reason: format!("cannot build timer url: {e}"),
        })
    }

    fn timer_body(
        callback_uri: &str,
        expiry_seconds: i64,
        tags: &BTreeMap<String, u32>,
        payload: &str,
    ) -> serde_json::Value {
        serde_json::json!({
            "expiry-seconds": expiry_seconds,
            "callback-uri": callback_uri,
            "opaque": payload,
            "tags": tags,
        })
    }

    async fn read_timer_id(response: reqwest::Response) -> Result<String, TimerServiceError> {
        let status = response.status();
        if !status.is_success() {
            return Err(TimerServiceError::Status { status: status.as_u16() });
        }

        let body: serde_json::Value = response.json().await.map_err(|e| TimerServiceError::Request {
            reason: format!("unreadable broker response: {e}"),
        })?;
        body.get("timer-id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or(TimerServiceError::Request {
                reason: "broker response carried no timer-id".to_string(),
            })
    }
}

#[async_trait]
impl TimerService for HttpTimerService {
    async fn create(
        &self,
        callback_uri: &str,
        expiry_seconds: i64,
        tags: &BTreeMap<String, u32>,
        payload: &str,
    ) -> Result<String, TimerServiceError> {
        let url = self.timer_url(None)?;
        let body = Self::timer_body(callback_uri, expiry_seconds, tags, payload);

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TimerServiceError::Request { reason: e.to_string() })?;
        Self::read_timer_id(response).await
    }

    async fn update(
        &self,
        timer_id: &str,
        callback_uri: &str,
        expiry_seconds: i64,
        tags: &BTreeMap<String, u32>,
        payload: &str,
    ) -> Result<String, TimerServiceError> {
        let url = self.timer_url(Some(timer_id))?;
        let body = Self::timer_body(callback_uri, expiry_seconds, tags, payload);

        let response = self
            .client
            .put(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TimerServiceError::Request { reason: e.to_string() })?;
        Self::read_timer_id(response).await
    }

    async fn delete(&self, timer_id: &str) -> Result<(), TimerServiceError> {
        let url = self.timer_url(Some(timer_id))?;

        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| TimerServiceError::Request { reason: e.to_string() })?;

        // A timer that already fired or was already cancelled is fine.
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(TimerServiceError::Status { status: status.as_u16() })
        }
    }
}
