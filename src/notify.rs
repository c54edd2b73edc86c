// src/notify.rs

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{EmailConfig, TelegramConfig};
use crate::models::Urgency;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("http error: {0}")]
    Http(String),
    #[error("{channel} answered with status {status}")]
    Status { channel: &'static str, status: u16 },
    #[error("telegram refused the message: {0}")]
    Telegram(String),
}

/// What the office needs to know about a new intake.
#[derive(Debug, Clone)]
pub struct IntakeNotice {
    pub patient_name: String,
    pub phone: String,
    pub city: String,
    pub care_type: String,
    pub urgency: Urgency,
    pub preferred_date: Option<DateTime<Utc>>,
    pub preferred_time: Option<String>,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "error")]
pub enum ChannelOutcome {
    Sent,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub email: ChannelOutcome,
    pub telegram: ChannelOutcome,
}

pub fn subject(notice: &IntakeNotice) -> String {
    let prefix = match notice.urgency {
        Urgency::High => "[URGENT] ",
        Urgency::Normal | Urgency::Low => "",
    };
    format!("{prefix}Nouvelle demande de soins: {}", notice.patient_name)
}

pub fn build_message(notice: &IntakeNotice) -> String {
    let when = match (&notice.preferred_date, &notice.preferred_time) {
        (Some(d), Some(t)) => format!("{} ({t})", d.format("%d/%m/%Y")),
        (Some(d), None) => d.format("%d/%m/%Y").to_string(),
        (None, Some(t)) => t.clone(),
        (None, None) => "non précisé".to_string(),
    };

    let mut lines = vec![
        format!("Patient: {}", notice.patient_name),
        format!("Téléphone: {}", notice.phone),
        format!("Ville: {}", notice.city),
        format!("Soin: {}", notice.care_type),
        format!("Urgence: {}", notice.urgency.as_str()),
        format!("Disponibilité: {when}"),
    ];
    if let Some(details) = notice.details.as_deref().filter(|d| !d.trim().is_empty()) {
        lines.push(format!("Détails: {}", details.trim()));
    }
    lines.join("\n")
}

#[derive(Debug, Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    text: String,
}

#[derive(Debug, Serialize)]
struct TelegramPayload<'a> {
    chat_id: &'a str,
    text: String,
}

#[derive(Debug, Deserialize)]
struct TelegramReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends intake notices to the office by email and Telegram, one after the other.
#[derive(Debug, Clone)]
pub struct Notifier {
    client: reqwest::Client,
    email: Option<EmailConfig>,
    telegram: Option<TelegramConfig>,
}

impl Notifier {
    pub fn new(
        email: Option<EmailConfig>,
        telegram: Option<TelegramConfig>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Http(e.to_string()))?;
        Ok(Self {
            client,
            email,
            telegram,
        })
    }

    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            email: None,
            telegram: None,
        }
    }

    /// Best effort: a failing channel is logged and does not stop the other one.
    pub async fn dispatch(&self, notice: &IntakeNotice) -> DispatchReport {
        let email = match &self.email {
            None => ChannelOutcome::Skipped,
            Some(cfg) => match self.send_email(cfg, notice).await {
                Ok(()) => ChannelOutcome::Sent,
                Err(e) => {
                    tracing::warn!(error = %e, "intake email not sent");
                    ChannelOutcome::Failed(e.to_string())
                }
            },
        };

        let telegram = match &self.telegram {
            None => ChannelOutcome::Skipped,
            Some(cfg) => match self.send_telegram(cfg, notice).await {
                Ok(()) => ChannelOutcome::Sent,
                Err(e) => {
                    tracing::warn!(error = %e, "intake telegram message not sent");
                    ChannelOutcome::Failed(e.to_string())
                }
            },
        };

        DispatchReport { email, telegram }
    }

    async fn send_email(&self, cfg: &EmailConfig, notice: &IntakeNotice) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&cfg.api_url)
            .bearer_auth(&cfg.api_key)
            .json(&EmailPayload {
                from: &cfg.from,
                to: vec![cfg.to.as_str()],
                subject: subject(notice),
                text: build_message(notice),
            })
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(NotifyError::Status {
                channel: "email",
                status: resp.status().as_u16(),
            });
        }
        tracing::info!(to = %cfg.to, "intake email sent");
        Ok(())
    }

    async fn send_telegram(
        &self,
        cfg: &TelegramConfig,
        notice: &IntakeNotice,
    ) -> Result<(), NotifyError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            cfg.api_base.trim_end_matches('/'),
            cfg.bot_token
        );
        let resp = self
            .client
            .post(url)
            .json(&TelegramPayload {
                chat_id: &cfg.chat_id,
                text: format!("{}\n\n{}", subject(notice), build_message(notice)),
            })
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        let status = resp.status();
        let reply: TelegramReply = resp.json().await.map_err(|_| NotifyError::Status {
            channel: "telegram",
            status: status.as_u16(),
        })?;
        if !reply.ok {
            return Err(NotifyError::Telegram(
                reply.description.unwrap_or_else(|| "no description".into()),
            ));
        }
        tracing::info!(chat_id = %cfg.chat_id, "intake telegram message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notice(urgency: Urgency) -> IntakeNotice {
        IntakeNotice {
            patient_name: "Jeanne Martin".into(),
            phone: "+33612345678".into(),
            city: "Lyon".into(),
            care_type: "Pansement".into(),
            urgency,
            preferred_date: Some(Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap()),
            preferred_time: Some("9h00".into()),
            details: Some("  plaie au genou ".into()),
        }
    }

    fn email_cfg(server: &MockServer) -> EmailConfig {
        EmailConfig {
            api_url: format!("{}/emails", server.uri()),
            api_key: "key-123".into(),
            from: "site@cabinet.fr".into(),
            to: "cabinet@cabinet.fr".into(),
        }
    }

    fn telegram_cfg(server: &MockServer) -> TelegramConfig {
        TelegramConfig {
            api_base: server.uri(),
            bot_token: "TOKEN".into(),
            chat_id: "42".into(),
        }
    }

    #[test]
    fn message_lists_the_intake() {
        let msg = build_message(&notice(Urgency::Normal));
        assert!(msg.contains("Patient: Jeanne Martin"));
        assert!(msg.contains("Disponibilité: 03/01/2024 (9h00)"));
        assert!(msg.contains("Détails: plaie au genou"));
        assert!(!subject(&notice(Urgency::Normal)).starts_with("[URGENT]"));
        assert!(subject(&notice(Urgency::High)).starts_with("[URGENT]"));
    }

    #[test]
    fn message_without_preference_says_so() {
        let mut n = notice(Urgency::Low);
        n.preferred_date = None;
        n.preferred_time = None;
        n.details = None;
        let msg = build_message(&n);
        assert!(msg.contains("Disponibilité: non précisé"));
        assert!(!msg.contains("Détails"));
    }

    #[tokio::test]
    async fn unconfigured_channels_are_skipped() {
        let report = Notifier::disabled().dispatch(&notice(Urgency::Normal)).await;
        assert_eq!(report.email, ChannelOutcome::Skipped);
        assert_eq!(report.telegram, ChannelOutcome::Skipped);
    }

    #[tokio::test]
    async fn sends_both_channels() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer key-123"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = Notifier::new(
            Some(email_cfg(&server)),
            Some(telegram_cfg(&server)),
            Duration::from_secs(2),
        )
        .expect("notifier");
        let report = notifier.dispatch(&notice(Urgency::High)).await;

        assert_eq!(report.email, ChannelOutcome::Sent);
        assert_eq!(report.telegram, ChannelOutcome::Sent);
    }

    #[tokio::test]
    async fn email_failure_does_not_stop_telegram() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "description": "Bad Request: chat not found",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = Notifier::new(
            Some(email_cfg(&server)),
            Some(telegram_cfg(&server)),
            Duration::from_secs(2),
        )
        .expect("notifier");
        let report = notifier.dispatch(&notice(Urgency::Normal)).await;

        assert!(matches!(report.email, ChannelOutcome::Failed(ref e) if e.contains("500")));
        assert!(matches!(report.telegram, ChannelOutcome::Failed(ref e) if e.contains("chat not found")));
    }
}
