// src/schedule/http_backend.rs

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Appointment;
use super::controller::{BackendError, ScheduleBackend, UpdateAck};
use crate::models::{ApiOk, ScheduleUpdateRequest};

/// `ScheduleBackend` over the server's JSON API.
#[derive(Debug, Clone)]
pub struct HttpScheduleBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpScheduleBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn transport(e: reqwest::Error) -> BackendError {
    BackendError::Transport(e.to_string())
}

#[async_trait]
impl ScheduleBackend for HttpScheduleBackend {
    async fn update_slot(
        &self,
        id: Uuid,
        scheduled_date: DateTime<Utc>,
        time_label: &str,
    ) -> Result<UpdateAck, BackendError> {
        let url = format!("{}/api/v1/requests/{id}/schedule", self.base_url);
        let resp = self
            .client
            .patch(url)
            .json(&ScheduleUpdateRequest {
                scheduled_date,
                scheduled_time: time_label.to_string(),
            })
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(transport)?;

        // A non-2xx status is a failure whatever the body says.
        match serde_json::from_str::<UpdateAck>(&body) {
            Ok(ack) if status.is_success() => Ok(ack),
            Ok(ack) => Ok(UpdateAck {
                success: false,
                error: ack.error,
            }),
            Err(e) if status.is_success() => Err(BackendError::Decode(e.to_string())),
            Err(_) => Err(BackendError::Status(status.as_u16())),
        }
    }

    async fn list_appointments(&self) -> Result<Vec<Appointment>, BackendError> {
        let url = format!("{}/api/v1/schedule/appointments", self.base_url);
        let resp = self.client.get(url).send().await.map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        let body: ApiOk<Vec<Appointment>> = resp
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(body.data)
    }
}
