// src/settings.rs
use crate::error::{IngestError, IngestResult};
use sqlx::postgres::PgConnectOptions;
use std::fmt;

const DEFAULT_PORT: u16 = 5432;

/// Connection parameters read from `DB_NAME`, `DB_USER`, `DB_PASSWORD`,
/// `DB_HOST` and `DB_PORT`.
#[derive(Clone, PartialEq, Eq)]
pub struct DbSettings {
    pub name: String,
    pub user: String,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
}

impl fmt::Debug for DbSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbSettings")
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl DbSettings {
    /// Read settings from the process environment. Call `dotenvy::dotenv()`
    /// first to pick up a `.env` file.
    pub fn from_env() -> IngestResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> IngestResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| IngestError::Settings(format!("{} is not set", key)))
        };

        let port = match get("DB_PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw.trim().parse().map_err(|_| {
                IngestError::Settings(format!("DB_PORT `{}` is not a valid port", raw))
            })?,
        };

        Ok(Self {
            name: required("DB_NAME")?,
            user: required("DB_USER")?,
            password: get("DB_PASSWORD"),
            host: required("DB_HOST")?,
            port,
        })
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        let opts = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.name);
        match &self.password {
            Some(p) => opts.password(p),
            None => opts,
        }
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
        move |k| map.get(k).cloned()
    }

    #[test]
    fn reads_all_fields() {
        let s = DbSettings::from_lookup(lookup(&[
            ("DB_NAME", "covid"),
            ("DB_USER", "loader"),
            ("DB_PASSWORD", "secret"),
            ("DB_HOST", "localhost"),
            ("DB_PORT", "5433"),
        ]))
        .unwrap();
        assert_eq!(s.port, 5433);
        assert_eq!(s.password.as_deref(), Some("secret"));
        assert!(!format!("{:?}", s).contains("secret"));
    }

    #[test]
    fn port_defaults_and_password_is_optional() {
        let s = DbSettings::from_lookup(lookup(&[
            ("DB_NAME", "covid"),
            ("DB_USER", "loader"),
            ("DB_HOST", "db"),
        ]))
        .unwrap();
        assert_eq!(s.port, 5432);
        assert_eq!(s.password, None);
    }

    #[test]
    fn missing_or_bad_values_are_settings_errors() {
        let missing = DbSettings::from_lookup(lookup(&[("DB_NAME", "covid")])).unwrap_err();
        assert!(matches!(missing, IngestError::Settings(ref m) if m.contains("DB_USER")));

        let bad_port = DbSettings::from_lookup(lookup(&[
            ("DB_NAME", "covid"),
            ("DB_USER", "loader"),
            ("DB_HOST", "db"),
            ("DB_PORT", "postgres"),
        ]))
        .unwrap_err();
        assert!(matches!(bad_port, IngestError::Settings(_)));
    }
}
