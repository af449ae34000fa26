use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_RATING_WINDOW_SIZE: u64 = 50;
pub const DEFAULT_RATING_CHECKPOINT_INTERVAL: u64 = 10;
pub const DEFAULT_DOCUMENTATION_WINDOW_SIZE: u64 = 30;
pub const DEFAULT_TURN_WINDOW_DAYS: i64 = 90;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub rating_window_size: u64,
    pub rating_checkpoint_interval: u64,
    pub documentation_window_size: u64,
    pub turn_window_days: i64,
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
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            rating_window_size: positive_from_env("BADGE_RATING_WINDOW", DEFAULT_RATING_WINDOW_SIZE),
            rating_checkpoint_interval: positive_from_env(
                "BADGE_RATING_CHECKPOINT_INTERVAL",
                DEFAULT_RATING_CHECKPOINT_INTERVAL,
            ),
            documentation_window_size: positive_from_env(
                "BADGE_DOCUMENTATION_WINDOW",
                DEFAULT_DOCUMENTATION_WINDOW_SIZE,
            ),
            turn_window_days: positive_from_env("BADGE_TURN_WINDOW_DAYS", DEFAULT_TURN_WINDOW_DAYS),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_service_role_key.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            rating_window_size: DEFAULT_RATING_WINDOW_SIZE,
            rating_checkpoint_interval: DEFAULT_RATING_CHECKPOINT_INTERVAL,
            documentation_window_size: DEFAULT_DOCUMENTATION_WINDOW_SIZE,
            turn_window_days: DEFAULT_TURN_WINDOW_DAYS,
        }
    }
}

// Zero and unparsable values fall back to the default.
fn positive_from_env<T>(key: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value > T::default() => value,
            _ => {
                warn!("{} has invalid value '{}', using default {}", key, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tunables() {
        let config = AppConfig::default();
        assert_eq!(config.rating_window_size, 50);
        assert_eq!(config.rating_checkpoint_interval, 10);
        assert_eq!(config.documentation_window_size, 30);
        assert_eq!(config.turn_window_days, 90);
        assert!(!config.is_configured());
    }

    #[test]
    fn test_invalid_tunable_falls_back() {
        env::set_var("BADGE_TEST_WINDOW_INVALID", "not-a-number");
        assert_eq!(positive_from_env("BADGE_TEST_WINDOW_INVALID", 30u64), 30);

        env::set_var("BADGE_TEST_WINDOW_ZERO", "0");
        assert_eq!(positive_from_env("BADGE_TEST_WINDOW_ZERO", 30u64), 30);

        env::set_var("BADGE_TEST_WINDOW_VALID", "45");
        assert_eq!(positive_from_env("BADGE_TEST_WINDOW_VALID", 30u64), 45);
    }
}
