use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::ai::GroqConfig;
use crate::channel::TwilioConfig;
use crate::db::DbConfig;
use crate::notify::MailConfig;
use crate::scheduler::RetryPolicy;
use crate::webhook::ProcessorConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    pub visibility_timeout: Duration,
}

/// Process configuration read from the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database: DbConfig<'static>,
    pub twilio: TwilioConfig,
    pub groq: GroqConfig,
    pub mail: MailConfig,
    pub scheduler: SchedulerConfig,
    pub processor: ProcessorConfig,
    /// Inbound messages processed concurrently by the webhook dispatcher.
    pub dispatch_concurrency: usize,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn optional(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    /// Load from the environment. `.env` should already be loaded by the
    /// caller.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database = DbConfig::from_env().map_err(|reason| ConfigError::Invalid {
            name: "DB_*",
            reason,
        })?;

        let twilio = TwilioConfig {
            account_sid: required("TWILIO_ACCOUNT_SID")?,
            auth_token: required("TWILIO_AUTH_TOKEN")?,
            whatsapp_from: required("TWILIO_WHATSAPP_FROM")?,
            api_base: optional("TWILIO_API_BASE", "https://api.twilio.com"),
            timeout: Duration::from_secs(15),
        };

        let groq = GroqConfig {
            api_key: required("GROQ_API_KEY")?,
            base_url: optional("GROQ_BASE_URL", "https://api.groq.com/openai/v1"),
            model: optional("GROQ_MODEL", "llama3-70b-8192"),
            temperature: 0.7,
            max_tokens: 1024,
            timeout: Duration::from_secs(parsed("AI_TIMEOUT_SECS", 30u64)?),
        };

        let notify_timeout = Duration::from_secs(parsed("NOTIFY_TIMEOUT_SECS", 10u64)?);
        let mail = MailConfig {
            api_url: required("MAIL_API_URL")?,
            api_key: required("MAIL_API_KEY")?,
            from: optional("MAIL_FROM", "Careloop <no-reply@careloop.health>"),
            timeout: notify_timeout,
        };

        let scheduler = SchedulerConfig {
            poll_interval: Duration::from_millis(parsed("SCHEDULER_POLL_MS", 1000u64)?),
            retry: RetryPolicy {
                max_attempts: parsed("SCHEDULER_MAX_ATTEMPTS", 3u32)?.max(1),
                base_backoff: Duration::from_secs(parsed("SCHEDULER_RETRY_BACKOFF_SECS", 5u64)?),
            },
            visibility_timeout: Duration::from_secs(parsed(
                "SCHEDULER_VISIBILITY_TIMEOUT_SECS",
                300u64,
            )?),
        };

        let processor = ProcessorConfig {
            context_window: 8,
            escalation_delay: Duration::from_secs(parsed("ESCALATION_FOLLOW_UP_DELAY_SECS", 60u64)?),
            notify_timeout,
        };

        Ok(Self {
            bind_addr: parsed("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            database,
            twilio,
            groq,
            mail,
            scheduler,
            processor,
            dispatch_concurrency: parsed("INBOUND_MAX_IN_FLIGHT", 16usize)?.max(1),
        })
    }
}
