use std::{env, fs, path::Path, time::Duration};

use crate::{errors::Error, Result};

const DEFAULT_DATABASE_NAME: &str = "restricted_bot";
const DEFAULT_PURGE_INTERVAL_SECS: u64 = 3600;
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Where redeem codes and premium records live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo {
        uri: String,
        database: String,
        /// UTC offset, in minutes, of the wall-clock times already stored.
        time_offset_minutes: i32,
    },
    /// Process-local; state is lost on restart.
    Memory,
}

/// Typed configuration, read from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    /// Users allowed to run `/gen`, `/codestats` and `/cleanexpired`.
    pub admin_user_ids: Vec<i64>,
    pub store: StoreBackend,
    pub purge_interval: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_bot_token = lookup("BOT_TOKEN").and_then(non_empty).ok_or_else(|| {
            Error::Config("BOT_TOKEN environment variable is required".to_string())
        })?;

        let admin_user_ids = parse_csv_i64(lookup("OWNER_ID"));
        if admin_user_ids.is_empty() {
            return Err(Error::Config(
                "OWNER_ID environment variable is required".to_string(),
            ));
        }

        let backend = lookup("STORE_BACKEND")
            .and_then(non_empty)
            .unwrap_or_else(|| "mongo".to_string());
        let store = match backend.trim().to_lowercase().as_str() {
            "mongo" | "mongodb" => {
                let uri = lookup("MONGO_DB").and_then(non_empty).ok_or_else(|| {
                    Error::Config("MONGO_DB environment variable is required".to_string())
                })?;
                let database = lookup("MONGO_DB_NAME")
                    .and_then(non_empty)
                    .unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string());
                let time_offset_minutes = lookup("MONGO_TIME_OFFSET_MINUTES")
                    .and_then(non_empty)
                    .map(|raw| parse_offset_minutes(&raw))
                    .transpose()?
                    .unwrap_or(0);
                StoreBackend::Mongo {
                    uri,
                    database,
                    time_offset_minutes,
                }
            }
            "memory" => StoreBackend::Memory,
            other => {
                return Err(Error::Config(format!(
                    "unknown STORE_BACKEND: {other} (expected mongo or memory)"
                )))
            }
        };

        let purge_secs = lookup("CODE_PURGE_INTERVAL_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_PURGE_INTERVAL_SECS);

        Ok(Self {
            telegram_bot_token,
            admin_user_ids,
            store,
            purge_interval: Duration::from_secs(purge_secs),
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        return &s[1..s.len() - 1];
    }
    s
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split([',', ' '])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn parse_offset_minutes(raw: &str) -> Result<i32> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|m| (-MAX_OFFSET_MINUTES..=MAX_OFFSET_MINUTES).contains(m))
        .ok_or_else(|| {
            Error::Config(format!(
                "MONGO_TIME_OFFSET_MINUTES must be minutes within ±{MAX_OFFSET_MINUTES}, got {raw}"
            ))
        })
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn loads_mongo_config_with_defaults() {
        let cfg = load(&[
            ("BOT_TOKEN", "123:abc"),
            ("OWNER_ID", "11, 22"),
            ("MONGO_DB", "mongodb://localhost:27017"),
        ])
        .unwrap();

        assert_eq!(cfg.telegram_bot_token, "123:abc");
        assert_eq!(cfg.admin_user_ids, vec![11, 22]);
        assert_eq!(
            cfg.store,
            StoreBackend::Mongo {
                uri: "mongodb://localhost:27017".to_string(),
                database: "restricted_bot".to_string(),
                time_offset_minutes: 0,
            }
        );
        assert_eq!(cfg.purge_interval, Duration::from_secs(3600));
    }

    #[test]
    fn memory_backend_needs_no_mongo_uri() {
        let cfg = load(&[
            ("BOT_TOKEN", "t"),
            ("OWNER_ID", "1"),
            ("STORE_BACKEND", "memory"),
            ("CODE_PURGE_INTERVAL_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(cfg.store, StoreBackend::Memory);
        assert_eq!(cfg.purge_interval, Duration::from_secs(60));
    }

    #[test]
    fn missing_required_values_are_config_errors() {
        assert!(matches!(
            load(&[("OWNER_ID", "1"), ("MONGO_DB", "x")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            load(&[("BOT_TOKEN", "t"), ("OWNER_ID", "abc"), ("MONGO_DB", "x")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            load(&[("BOT_TOKEN", "t"), ("OWNER_ID", "1")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            load(&[("BOT_TOKEN", "t"), ("OWNER_ID", "1"), ("STORE_BACKEND", "redis")]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn reads_stored_time_offset() {
        let base = [
            ("BOT_TOKEN", "t"),
            ("OWNER_ID", "1"),
            ("MONGO_DB", "mongodb://db"),
        ];
        let with = |offset: &str| {
            let mut pairs = base.to_vec();
            pairs.push(("MONGO_TIME_OFFSET_MINUTES", offset));
            load(&pairs)
        };

        match with("330").unwrap().store {
            StoreBackend::Mongo {
                time_offset_minutes,
                ..
            } => assert_eq!(time_offset_minutes, 330),
            other => panic!("unexpected backend {other:?}"),
        }
        match with(" -300 ").unwrap().store {
            StoreBackend::Mongo {
                time_offset_minutes,
                ..
            } => assert_eq!(time_offset_minutes, -300),
            other => panic!("unexpected backend {other:?}"),
        }
        assert!(matches!(with("5h"), Err(Error::Config(_))));
        assert!(matches!(with("1000"), Err(Error::Config(_))));
    }

    #[test]
    fn strips_matching_quotes_only() {
        assert_eq!(strip_quotes("\"abc\""), "abc");
        assert_eq!(strip_quotes("'abc'"), "abc");
        assert_eq!(strip_quotes("\"abc"), "\"abc");
    }
}
