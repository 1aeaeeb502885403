use std::{env, fmt, str::FromStr, time::Duration};

use crate::errors::LoaderError;

pub const DEFAULT_DATASET_URL: &str = "https://people.sc.fsu.edu/~jburkardt/data/csv/hw_200.csv";

/// Settings for one loader run.  Built once at startup, never mutated.
#[derive(Clone, PartialEq)]
pub struct LoaderConfig {
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub table_name: String,
    pub dataset_url: String,
    /// Skip the first line of the source file.
    pub dataset_has_header: bool,
    pub health_check: bool,
    pub connect_timeout: Duration,
    pub connect_attempts: u32,
    /// Wait before retry `i` (0-based) is `(i + 1) * retry_base`.
    pub retry_base: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            db_host: "localhost".to_string(),
            db_port: 5432,
            db_name: "postgres".to_string(),
            db_user: "postgres".to_string(),
            db_password: "postgres".to_string(),
            table_name: "employees".to_string(),
            dataset_url: DEFAULT_DATASET_URL.to_string(),
            dataset_has_header: false,
            health_check: false,
            connect_timeout: Duration::from_secs(5),
            connect_attempts: 3,
            retry_base: Duration::from_secs(2),
        }
    }
}

impl LoaderConfig {
    /// Read the settings from the process environment.  Every key is optional.
    pub fn from_env() -> Result<Self, LoaderError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup, falling back to the
    /// defaults for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LoaderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LoaderConfig::default();
        if let Some(v) = lookup("DB_HOST") {
            config.db_host = v;
        }
        if let Some(v) = lookup("DB_PORT") {
            config.db_port = parse_number("DB_PORT", &v)?;
        }
        if let Some(v) = lookup("DB_NAME") {
            config.db_name = v;
        }
        if let Some(v) = lookup("DB_USER") {
            config.db_user = v;
        }
        if let Some(v) = lookup("DB_PASSWORD") {
            config.db_password = v;
        }
        if let Some(v) = lookup("TABLE_NAME") {
            config.table_name = v;
        }
        if let Some(v) = lookup("DATASET_URL") {
            config.dataset_url = v;
        }
        if let Some(v) = lookup("DATASET_HAS_HEADER") {
            config.dataset_has_header = is_true(&v);
        }
        if let Some(v) = lookup("HEALTH_CHECK") {
            config.health_check = is_true(&v);
        }
        if let Some(v) = lookup("DB_CONNECT_TIMEOUT") {
            config.connect_timeout = Duration::from_secs(parse_number("DB_CONNECT_TIMEOUT", &v)?);
        }
        if let Some(v) = lookup("DB_CONNECT_ATTEMPTS") {
            config.connect_attempts = parse_number("DB_CONNECT_ATTEMPTS", &v)?;
        }
        Ok(config)
    }

    pub fn pg_config(&self) -> postgres::Config {
        let mut config = postgres::Config::new();
        config
            .host(&self.db_host)
            .port(self.db_port)
            .dbname(&self.db_name)
            .user(&self.db_user)
            .password(&self.db_password)
            .connect_timeout(self.connect_timeout);
        config
    }
}

impl fmt::Debug for LoaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderConfig")
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &"***")
            .field("table_name", &self.table_name)
            .field("dataset_url", &self.dataset_url)
            .field("dataset_has_header", &self.dataset_has_header)
            .field("health_check", &self.health_check)
            .field("connect_timeout", &self.connect_timeout)
            .field("connect_attempts", &self.connect_attempts)
            .field("retry_base", &self.retry_base)
            .finish()
    }
}

fn is_true(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> Result<T, LoaderError> {
    value.trim().parse::<T>().map_err(|_| LoaderError::Config {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = LoaderConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, LoaderConfig::default());
        assert_eq!(config.db_host, "localhost");
        assert_eq!(config.db_port, 5432);
        assert_eq!(config.table_name, "employees");
        assert_eq!(config.dataset_url, DEFAULT_DATASET_URL);
        assert_eq!(config.connect_attempts, 3);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(!config.health_check);
    }

    #[test]
    fn overrides_from_lookup() {
        let config = LoaderConfig::from_lookup(lookup_from(&[
            ("DB_HOST", "db"),
            ("DB_PORT", "6543"),
            ("DB_NAME", "warehouse"),
            ("DB_USER", "loader"),
            ("DB_PASSWORD", "secret"),
            ("TABLE_NAME", "measurements"),
            ("DATASET_URL", "http://example.com/hw.csv"),
            ("HEALTH_CHECK", "TRUE"),
            ("DB_CONNECT_ATTEMPTS", "5"),
            ("DB_CONNECT_TIMEOUT", "10"),
        ]))
        .unwrap();
        assert_eq!(config.db_host, "db");
        assert_eq!(config.db_port, 6543);
        assert_eq!(config.db_name, "warehouse");
        assert_eq!(config.db_user, "loader");
        assert_eq!(config.db_password, "secret");
        assert_eq!(config.table_name, "measurements");
        assert_eq!(config.dataset_url, "http://example.com/hw.csv");
        assert!(config.health_check);
        assert_eq!(config.connect_attempts, 5);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn health_check_only_on_true() {
        for (value, expected) in [("true", true), ("True", true), ("1", false), ("yes", false)] {
            let config = LoaderConfig::from_lookup(lookup_from(&[("HEALTH_CHECK", value)])).unwrap();
            assert_eq!(config.health_check, expected, "HEALTH_CHECK={value}");
        }
    }

    #[test]
    fn bad_port_is_an_error() {
        let err = LoaderConfig::from_lookup(lookup_from(&[("DB_PORT", "fivefour")])).unwrap_err();
        match err {
            LoaderError::Config { key, value } => {
                assert_eq!(key, "DB_PORT");
                assert_eq!(value, "fivefour");
            }
            e => panic!("unexpected error {e:?}"),
        }
    }

    #[test]
    fn debug_hides_password() {
        let config = LoaderConfig::from_lookup(lookup_from(&[("DB_PASSWORD", "hunter2")])).unwrap();
        let out = format!("{:?}", config);
        assert!(!out.contains("hunter2"));
        assert!(out.contains("db_password"));
    }

    #[test]
    fn pg_config_carries_settings() {
        let config = LoaderConfig::default();
        let pg = config.pg_config();
        assert_eq!(pg.get_ports(), &[5432]);
        assert_eq!(pg.get_dbname(), Some("postgres"));
        assert_eq!(pg.get_user(), Some("postgres"));
        assert_eq!(pg.get_connect_timeout(), Some(&Duration::from_secs(5)));
    }
}
