//! Server configuration from the environment.

use equeue_core::defaults::BACKEND_PORT;
use equeue_core::{Error, Result};

/// HTTP server and database settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Key required by the admin routes. `None` locks them entirely.
    pub internal_api_key: Option<String>,
    /// CORS origin whitelist. Empty allows any origin.
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    /// Read configuration from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DB_USER`, `DB_PASSWORD`, `DB_HOST`, `DB_PORT`, `DB_NAME` | required | Database connection parts |
    /// | `DB_SSLMODE` | `disable` | Postgres `sslmode` |
    /// | `DATABASE_URL` | composed | Overrides the composed URL |
    /// | `HOST` | `0.0.0.0` | Bind address |
    /// | `BACKEND_PORT` | `8080` | Bind port |
    /// | `INTERNAL_API_KEY` | unset | Key for `/api/admin/*` |
    /// | `ALLOWED_ORIGINS` | unset | Comma-separated CORS origins |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = match non_empty("DATABASE_URL") {
            Some(url) => url,
            None => {
                let required = |key: &str| {
                    non_empty(key).ok_or_else(|| Error::Config(format!("{key} is not set")))
                };
                format!(
                    "postgres://{}:{}@{}:{}/{}?sslmode={}",
                    required("DB_USER")?,
                    required("DB_PASSWORD")?,
                    required("DB_HOST")?,
                    required("DB_PORT")?,
                    required("DB_NAME")?,
                    non_empty("DB_SSLMODE").unwrap_or_else(|| "disable".to_string()),
                )
            }
        };

        let port = match non_empty("BACKEND_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("BACKEND_PORT '{raw}' is not a port")))?,
            None => BACKEND_PORT,
        };

        let allowed_origins = non_empty("ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url,
            host: non_empty("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            internal_api_key: non_empty("INTERNAL_API_KEY"),
            allowed_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const DB_PARTS: [(&str, &str); 5] = [
        ("DB_USER", "queue"),
        ("DB_PASSWORD", "secret"),
        ("DB_HOST", "db"),
        ("DB_PORT", "5432"),
        ("DB_NAME", "clinic"),
    ];

    #[test]
    fn test_composes_database_url() {
        let config = AppConfig::from_lookup(lookup(&DB_PARTS)).unwrap();
        assert_eq!(
            config.database_url,
            "postgres://queue:secret@db:5432/clinic?sslmode=disable"
        );
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert!(config.internal_api_key.is_none());
        assert!(config.allowed_origins.is_empty());
    }

    #[test]
    fn test_database_url_override() {
        let config =
            AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x@y/z")])).unwrap();
        assert_eq!(config.database_url, "postgres://x@y/z");
    }

    #[test]
    fn test_missing_part_is_config_error() {
        let err = AppConfig::from_lookup(lookup(&DB_PARTS[..4])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("DB_NAME")));
    }

    #[test]
    fn test_port_and_origins() {
        let mut pairs = DB_PARTS.to_vec();
        pairs.push(("BACKEND_PORT", "9090"));
        pairs.push(("ALLOWED_ORIGINS", "http://a.local, http://b.local,"));
        pairs.push(("INTERNAL_API_KEY", "k"));
        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.allowed_origins, vec!["http://a.local", "http://b.local"]);
        assert_eq!(config.internal_api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_bad_port() {
        let mut pairs = DB_PARTS.to_vec();
        pairs.push(("BACKEND_PORT", "eighty"));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&pairs)),
            Err(Error::Config(_))
        ));
    }
}
