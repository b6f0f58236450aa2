use std::{collections::HashMap, env, error::Error, time::Duration};

use uuid::Uuid;

use crate::api::DEFAULT_MAX_CAPTURE_BODY_BYTES;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub owner_tokens: HashMap<String, Uuid>,
    pub max_capture_body_bytes: usize,
    pub outbound_timeout: Option<Duration>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        let database_url = match env::var("DATABASE_URL") {
            Ok(raw) if !raw.trim().is_empty() => Some(raw),
            Ok(_) | Err(env::VarError::NotPresent) => None,
            Err(err) => return Err(Box::new(err)),
        };
        let bind_addr = env::var("BIND_ADDR")?;
        let owner_tokens = match env::var("OWNER_TOKENS") {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(env::VarError::NotPresent) => HashMap::new(),
            Err(err) => return Err(Box::new(err)),
        };
        let max_capture_body_bytes = match env::var("MAX_CAPTURE_BODY_BYTES") {
            Ok(raw) => raw.parse::<usize>()?,
            Err(env::VarError::NotPresent) => DEFAULT_MAX_CAPTURE_BODY_BYTES,
            Err(err) => return Err(Box::new(err)),
        };
        let outbound_timeout = match env::var("OUTBOUND_TIMEOUT_MS") {
            Ok(raw) => Some(Duration::from_millis(raw.parse::<u64>()?)),
            Err(env::VarError::NotPresent) => None,
            Err(err) => return Err(Box::new(err)),
        };

        Ok(Self {
            database_url,
            bind_addr,
            owner_tokens,
            max_capture_body_bytes,
            outbound_timeout,
        })
    }
}
