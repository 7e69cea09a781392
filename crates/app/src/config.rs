use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::loader::LoaderConfig;
use crate::paginate::DEFAULT_PAGE_SIZE;
use crate::service::DEFAULT_MAX_CONTENT_LEN;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub auth_secret: Option<String>,
    pub cors_allow_origins: Vec<String>,
    pub max_content_len: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub loader: LoaderConfig,
    pub notify_buffer: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid socket address: {0}")]
    InvalidSocket(String),
    #[error("invalid integer for {0}: {1}")]
    InvalidNumber(&'static str, String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr_raw = read_string("AGORA_HTTP_ADDR", "127.0.0.1:8080");
        let http_addr = http_addr_raw
            .parse()
            .map_err(|_| ConfigError::InvalidSocket(http_addr_raw.clone()))?;
        let database_url = read_optional_string("AGORA_DATABASE_URL");
        let db_max_connections = read_number("AGORA_DB_MAX_CONNECTIONS", 5)?;
        let auth_secret = read_optional_string("AGORA_AUTH_SECRET");
        let cors_allow_origins = read_list("AGORA_CORS_ALLOW_ORIGINS");
        let max_content_len = read_number("AGORA_MAX_CONTENT_LEN", DEFAULT_MAX_CONTENT_LEN)?;
        let default_page_size = read_number("AGORA_DEFAULT_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        let max_page_size = read_number("AGORA_MAX_PAGE_SIZE", 100)?;
        let loader_max_batch = read_number("AGORA_LOADER_MAX_BATCH", 100)?;
        let loader_wait_micros = read_number("AGORA_LOADER_WAIT_MICROS", 500)?;
        let notify_buffer = read_number("AGORA_NOTIFY_BUFFER", 64)?;

        let config = Self {
            http_addr,
            database_url,
            db_max_connections,
            auth_secret,
            cors_allow_origins,
            max_content_len,
            default_page_size,
            max_page_size,
            loader: LoaderConfig {
                max_batch: loader_max_batch,
                wait: Duration::from_micros(loader_wait_micros),
            },
            notify_buffer,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_content_len == 0 {
            return Err(ConfigError::InvalidValue(
                "AGORA_MAX_CONTENT_LEN",
                "must be positive".to_string(),
            ));
        }
        if self.max_page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "AGORA_MAX_PAGE_SIZE",
                "must be positive".to_string(),
            ));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::InvalidValue(
                "AGORA_DEFAULT_PAGE_SIZE",
                format!("{} is outside 1..={}", self.default_page_size, self.max_page_size),
            ));
        }
        if self.loader.max_batch == 0 {
            return Err(ConfigError::InvalidValue(
                "AGORA_LOADER_MAX_BATCH",
                "must be positive".to_string(),
            ));
        }
        if self.notify_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "AGORA_NOTIFY_BUFFER",
                "must be positive".to_string(),
            ));
        }
        if self.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "AGORA_DB_MAX_CONNECTIONS",
                "must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolves the `first` argument of a comment listing.
    pub fn page_size(&self, requested: Option<usize>) -> Result<usize, String> {
        match requested {
            None => Ok(self.default_page_size),
            Some(first) if (1..=self.max_page_size).contains(&first) => Ok(first),
            Some(first) => Err(format!(
                "first must be between 1 and {}, got {first}",
                self.max_page_size
            )),
        }
    }
}

/// Loads `.env` from the working directory without overriding variables
/// that are already set.
pub fn load_dotenv() -> Result<(), std::io::Error> {
    let path = Path::new(".env");
    if !path.exists() {
        return Ok(());
    }
    let contents = std::fs::read_to_string(path)?;
    for (key, value) in contents.lines().filter_map(parse_dotenv_line) {
        if std::env::var_os(&key).is_some() {
            continue;
        }
        // Safety: main calls this before any task is spawned, so the idle
        // runtime workers are the only other threads and they never read
        // the environment.
        unsafe {
            std::env::set_var(key, value);
        }
    }
    Ok(())
}

fn read_string(key: &'static str, default: &'static str) -> String {
    read_optional_string(key).unwrap_or_else(|| default.to_string())
}

fn read_number<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
{
    match read_optional_string(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber(key, raw)),
    }
}

fn read_optional_string(key: &'static str) -> Option<String> {
    let value = std::env::var(key).ok()?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn read_list(key: &'static str) -> Vec<String> {
    read_optional_string(key)
        .map(|raw| parse_list(&raw))
        .unwrap_or_default()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_dotenv_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, raw) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let raw = raw.trim();
    let value = if let Some(inner) = quoted(raw, '"') {
        unescape(inner)
    } else if let Some(inner) = quoted(raw, '\'') {
        inner.to_string()
    } else {
        raw.to_string()
    };
    Some((key.to_string(), value))
}

fn quoted(raw: &str, quote: char) -> Option<&str> {
    raw.strip_prefix(quote)?.strip_suffix(quote)
}

fn unescape(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            output.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => output.push('\n'),
            Some('r') => output.push('\r'),
            Some('t') => output.push('\t'),
            Some(escaped @ ('\\' | '"')) => output.push(escaped),
            Some(other) => {
                output.push('\\');
                output.push(other);
            }
            None => output.push('\\'),
        }
    }
    output
}
