use std::path::PathBuf;

use anyhow::Context;
use chrono::FixedOffset;

/// Placeholder JWT secrets that should never reach production.
pub const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// `None` keeps everything in memory.
    pub db_path: Option<PathBuf>,
    pub seed_demo: bool,
    pub demo_admin_password: String,
    pub calendar: FixedOffset,
    pub session_sweep_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = var("LANGIFY_PORT", "3000")
            .parse()
            .context("LANGIFY_PORT must be a port number")?;
        let offset_minutes: i32 = var("LANGIFY_DAY_OFFSET_MINUTES", "0")
            .parse()
            .context("LANGIFY_DAY_OFFSET_MINUTES must be an integer")?;
        let calendar = FixedOffset::east_opt(offset_minutes * 60)
            .context("LANGIFY_DAY_OFFSET_MINUTES is out of range")?;
        let session_sweep_secs = var("LANGIFY_SESSION_SWEEP_SECS", "30")
            .parse()
            .context("LANGIFY_SESSION_SWEEP_SECS must be a number of seconds")?;

        Ok(Self {
            host: var("LANGIFY_HOST", "0.0.0.0"),
            port,
            jwt_secret: var("LANGIFY_JWT_SECRET", "dev-secret-change-me"),
            db_path: lookup("LANGIFY_DB_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            seed_demo: matches!(
                var("LANGIFY_SEED_DEMO", "false").to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            ),
            demo_admin_password: var("LANGIFY_DEMO_ADMIN_PASSWORD", "adminpass"),
            calendar,
            session_sweep_secs,
        })
    }

    pub fn has_placeholder_secret(&self) -> bool {
        self.jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.db_path.is_none());
        assert!(!config.seed_demo);
        assert_eq!(config.calendar.local_minus_utc(), 0);
        assert_eq!(config.session_sweep_secs, 30);
        assert!(config.has_placeholder_secret());
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("LANGIFY_PORT", "8080"),
            ("LANGIFY_DB_PATH", "langify.db"),
            ("LANGIFY_SEED_DEMO", "TRUE"),
            ("LANGIFY_DAY_OFFSET_MINUTES", "-300"),
            ("LANGIFY_JWT_SECRET", "a-real-secret"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, Some(PathBuf::from("langify.db")));
        assert!(config.seed_demo);
        assert_eq!(config.calendar.local_minus_utc(), -300 * 60);
        assert!(!config.has_placeholder_secret());
    }

    #[test]
    fn rejects_garbage() {
        assert!(config(&[("LANGIFY_PORT", "http")]).is_err());
        assert!(config(&[("LANGIFY_DAY_OFFSET_MINUTES", "100000")]).is_err());
    }
}
