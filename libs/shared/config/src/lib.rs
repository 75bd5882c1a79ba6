use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SLOT_CHECK_CONCURRENCY: usize = 8;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    /// Upper bound for a single store round-trip.
    pub store_timeout_secs: u64,
    /// Fixed offset of the clinic's operating timezone from UTC, in minutes.
    pub clinic_utc_offset_minutes: i32,
    pub slot_check_concurrency: usize,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
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
            store_timeout_secs: parse_or_default("STORE_TIMEOUT_SECS", DEFAULT_STORE_TIMEOUT_SECS),
            clinic_utc_offset_minutes: parse_or_default("CLINIC_UTC_OFFSET_MINUTES", 0),
            slot_check_concurrency: parse_or_default("SLOT_CHECK_CONCURRENCY", DEFAULT_SLOT_CHECK_CONCURRENCY),
            port: parse_or_default("PORT", DEFAULT_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            store_timeout_secs: DEFAULT_STORE_TIMEOUT_SECS,
            clinic_utc_offset_minutes: 0,
            slot_check_concurrency: DEFAULT_SLOT_CHECK_CONCURRENCY,
            port: DEFAULT_PORT,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
