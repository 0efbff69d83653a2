use std::env;
use std::str::FromStr;

use chrono::{FixedOffset, Offset, Utc};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub admin_email: String,
    pub clinic_utc_offset_minutes: i32,
    pub holiday_profile: String,
    pub overlap_policy: String,
    pub realtime_debounce_ms: u64,
    pub realtime_error_log_cooldown_secs: u64,
    pub session_expiry_margin_secs: i64,
    pub preferences_path: String,
    pub api_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            admin_email: String::new(),
            clinic_utc_offset_minutes: -180,
            holiday_profile: "br_national".to_string(),
            overlap_policy: "disabled".to_string(),
            realtime_debounce_ms: 200,
            realtime_error_log_cooldown_secs: 60,
            session_expiry_margin_secs: 60,
            preferences_path: ".clinic-agenda/preferences.json".to_string(),
            api_port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

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
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            admin_email: env::var("CLINIC_ADMIN_EMAIL").unwrap_or_default(),
            clinic_utc_offset_minutes: parse_or("CLINIC_UTC_OFFSET_MINUTES", defaults.clinic_utc_offset_minutes),
            holiday_profile: env::var("HOLIDAY_PROFILE")
                .unwrap_or(defaults.holiday_profile),
            overlap_policy: env::var("APPOINTMENT_OVERLAP_POLICY")
                .unwrap_or(defaults.overlap_policy),
            realtime_debounce_ms: parse_or("REALTIME_DEBOUNCE_MS", defaults.realtime_debounce_ms),
            realtime_error_log_cooldown_secs: parse_or(
                "REALTIME_ERROR_LOG_COOLDOWN_SECS",
                defaults.realtime_error_log_cooldown_secs,
            ),
            session_expiry_margin_secs: parse_or("SESSION_EXPIRY_MARGIN_SECS", defaults.session_expiry_margin_secs),
            preferences_path: env::var("PREFERENCES_PATH")
                .unwrap_or(defaults.preferences_path),
            api_port: parse_or("API_PORT", defaults.api_port),
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

    /// Wall-clock offset used to decide which calendar day an appointment falls on.
    pub fn clinic_timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.clinic_utc_offset_minutes * 60).unwrap_or_else(|| {
            warn!(
                "CLINIC_UTC_OFFSET_MINUTES out of range ({}), falling back to UTC",
                self.clinic_utc_offset_minutes
            );
            Utc.fix()
        })
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
