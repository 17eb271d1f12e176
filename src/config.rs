use std::time::Duration;

use anyhow::Context;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Settings {
    pub max_connections: u32,
    pub fetch_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut settings = Self::default();

        if let Some(raw) = lookup("SUBRANK_MAX_CONNECTIONS") {
            settings.max_connections = raw
                .trim()
                .parse()
                .with_context(|| format!("SUBRANK_MAX_CONNECTIONS is not a number: {raw}"))?;
        }
        if let Some(raw) = lookup("SUBRANK_FETCH_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("SUBRANK_FETCH_TIMEOUT_SECS is not a number: {raw}"))?;
            settings.fetch_timeout = Duration::from_secs(secs.max(1));
        }

        Ok(settings)
    }
}

pub fn database_url() -> anyhow::Result<String> {
    std::env::var("DATABASE_URL").context("DATABASE_URL must be set to a production Postgres instance")
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
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.max_connections, 5);
        assert_eq!(settings.fetch_timeout, Duration::from_secs(10));
    }

    #[test]
    fn overrides_are_parsed() {
        let settings = Settings::from_lookup(lookup(&[
            ("SUBRANK_MAX_CONNECTIONS", "12"),
            ("SUBRANK_FETCH_TIMEOUT_SECS", "0"),
        ]))
        .unwrap();
        assert_eq!(settings.max_connections, 12);
        assert_eq!(settings.fetch_timeout, Duration::from_secs(1));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Settings::from_lookup(lookup(&[("SUBRANK_MAX_CONNECTIONS", "many")])).is_err());
    }
}
