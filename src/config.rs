use std::{env, path::PathBuf};

use thiserror::Error;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_MONGO_DB: &str = "RoomSplit";
const DEFAULT_PROFILE_URL: &str = "https://randomuser.me/api";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("ROOMSPLIT_PORT must be a port number, got {0:?}")]
    InvalidPort(String),
    #[error("unknown store backend {0:?} (expected json, mongo or memory)")]
    UnknownBackend(String),
    #[error("MONGODB_URI is required when ROOMSPLIT_STORE=mongo")]
    MissingMongoUri,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StoreBackend {
    Json { data_dir: PathBuf },
    Mongo { uri: String, database: String },
    Memory,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    pub profile_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("ROOMSPLIT_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup("ROOMSPLIT_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };
        let backend = lookup("ROOMSPLIT_STORE").unwrap_or_else(|| "json".to_string());
        let store = match backend.to_lowercase().as_str() {
            "json" => StoreBackend::Json {
                data_dir: lookup("ROOMSPLIT_DATA_DIR")
                    .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
                    .into(),
            },
            "mongo" | "mongodb" => StoreBackend::Mongo {
                uri: lookup("MONGODB_URI").ok_or(ConfigError::MissingMongoUri)?,
                database: lookup("ROOMSPLIT_MONGO_DB")
                    .unwrap_or_else(|| DEFAULT_MONGO_DB.to_string()),
            },
            "memory" => StoreBackend::Memory,
            _ => return Err(ConfigError::UnknownBackend(backend)),
        };
        let profile_url =
            lookup("ROOMSPLIT_PROFILE_URL").unwrap_or_else(|| DEFAULT_PROFILE_URL.to_string());

        Ok(Config {
            host,
            port,
            store,
            profile_url,
        })
    }
}
