use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_address: SocketAddr,
    pub images_dir: PathBuf,
    pub cors_origins: Vec<String>,
    pub face_verify_program: String,
    pub face_model: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database_url: try_load(&lookup, "DATABASE_URL", "postgres://localhost:5432/attendance")?,
            database_max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", "5")?,
            bind_address: try_load(&lookup, "BIND_ADDRESS", "0.0.0.0:8000")?,
            images_dir: try_load(&lookup, "IMAGES_DIR", "images")?,
            cors_origins: try_load::<String, _>(&lookup, "CORS_ORIGINS", "http://localhost:8080")?
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect(),
            face_verify_program: try_load(&lookup, "FACE_VERIFY_PROGRAM", "deepface-verify")?,
            face_model: try_load(&lookup, "FACE_MODEL", "VGG-Face")?,
        })
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| {
        log::info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.database_url, "postgres://localhost:5432/attendance");
        assert_eq!(config.bind_address.port(), 8000);
        assert_eq!(config.images_dir, PathBuf::from("images"));
        assert_eq!(config.cors_origins, vec!["http://localhost:8080".to_string()]);
        assert_eq!(config.face_model, "VGG-Face");
    }

    #[test]
    fn origins_are_comma_separated() {
        let config = config_from(&[(
            "CORS_ORIGINS",
            "http://localhost:8080, https://attendance.example.com,",
        )])
        .unwrap();
        assert_eq!(
            config.cors_origins,
            vec![
                "http://localhost:8080".to_string(),
                "https://attendance.example.com".to_string()
            ]
        );
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = config_from(&[("BIND_ADDRESS", "localhost")]).unwrap_err();
        assert!(err.to_string().contains("BIND_ADDRESS"));
        assert!(config_from(&[("DATABASE_MAX_CONNECTIONS", "many")]).is_err());
    }
}
