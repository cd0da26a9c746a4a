use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            "supabase" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

/// Tunables for slot generation and booking.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub slot_duration_minutes: i64,
    pub sequence_retry_attempts: u32,
    pub reference_retry_attempts: u32,
    pub reject_past_dates: bool,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            slot_duration_minutes: 30,
            sequence_retry_attempts: 3,
            reference_retry_attempts: 3,
            reject_past_dates: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub notification_webhook_url: Option<String>,
    /// Upper bound for one notification delivery, address lookup included.
    pub notification_timeout_seconds: u64,
    /// JSON file of patients, doctors and treatments for the in-memory directory.
    pub directory_seed_file: Option<String>,
    pub port: u16,
    pub scheduling: SchedulingConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = SchedulingConfig::default();

        let mut config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            storage_backend: StorageBackend::Memory,
            notification_webhook_url: env::var("NOTIFICATION_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            notification_timeout_seconds: parse_var("NOTIFICATION_TIMEOUT_SECONDS", 10),
            directory_seed_file: env::var("DIRECTORY_SEED_FILE")
                .ok()
                .filter(|path| !path.trim().is_empty()),
            port: parse_var("PORT", 3000),
            scheduling: SchedulingConfig {
                slot_duration_minutes: parse_var("SLOT_DURATION_MINUTES", defaults.slot_duration_minutes),
                sequence_retry_attempts: parse_var("SEQUENCE_RETRY_ATTEMPTS", defaults.sequence_retry_attempts),
                reference_retry_attempts: parse_var("REFERENCE_RETRY_ATTEMPTS", defaults.reference_retry_attempts),
                reject_past_dates: parse_var("REJECT_PAST_DATES", defaults.reject_past_dates),
            },
        };

        config.storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse().unwrap_or_else(|e: String| {
                warn!("{}, falling back to in-memory storage", e);
                StorageBackend::Memory
            }),
            Err(_) if config.is_configured() => StorageBackend::Supabase,
            Err(_) => StorageBackend::Memory,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}
