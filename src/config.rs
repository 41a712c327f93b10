//! Application configuration.
//!
//! Layered, lowest precedence first: built-in defaults, an optional
//! `rebar.{toml,json,ini,yaml}` file, a `.env` file, then `REBAR__*`
//! environment variables (`REBAR__SERVER__PORT=8080`,
//! `REBAR__CORS__ALLOWED_ORIGINS=https://a.example,https://b.example`).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::router::Route;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub rest: RestConfig,
    pub cors: CorsConfig,
    /// Explicit routes, tried in order before the naming convention.
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_owned(), port: 3000 }
    }
}

/// Pagination defaults for REST repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    pub page_size: u64,
    pub max_page_size: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self { page_size: 20, max_page_size: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// `*` allows every origin.
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    /// Preflight cache lifetime in seconds.
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                .map(str::to_owned)
                .to_vec(),
            allowed_headers: ["content-type", "authorization"].map(str::to_owned).to_vec(),
            max_age: 86_400,
        }
    }
}

impl Config {
    /// Loads `rebar.*` from the working directory plus `.env` and environment.
    pub fn load() -> Result<Self> {
        Self::load_from("rebar")
    }

    /// Like [`load`](Config::load) with a custom file stem, e.g. `config/app`.
    pub fn load_from(file_stem: &str) -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }

        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(
                config::Environment::with_prefix("REBAR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .with_list_parse_key("cors.allowed_methods")
                    .with_list_parse_key("cors.allowed_headers"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// `host:port` for [`Server::bind`](crate::Server::bind).
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
