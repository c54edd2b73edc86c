use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
    pub to: String,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub api_base: String,
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub email: Option<EmailConfig>,
    pub telegram: Option<TelegramConfig>,
    pub notify_timeout: Duration,
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(5);
        let notify_timeout_secs = env::var("NOTIFY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(10);

        // A channel is enabled only when every one of its settings is present.
        let email = match (
            non_empty("EMAIL_API_URL"),
            non_empty("EMAIL_API_KEY"),
            non_empty("EMAIL_FROM"),
            non_empty("EMAIL_TO"),
        ) {
            (Some(api_url), Some(api_key), Some(from), Some(to)) => Some(EmailConfig {
                api_url,
                api_key,
                from,
                to,
            }),
            _ => None,
        };

        let telegram = match (non_empty("TELEGRAM_BOT_TOKEN"), non_empty("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig {
                api_base: non_empty("TELEGRAM_API_BASE")
                    .unwrap_or_else(|| "https://api.telegram.org".to_string()),
                bot_token,
                chat_id,
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            bind_addr,
            db_max_connections,
            email,
            telegram,
            notify_timeout: Duration::from_secs(notify_timeout_secs),
        })
    }
}
