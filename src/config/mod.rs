// Configuration module entry point
// Loads the process configuration once and holds the per-process state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, DatabaseConfig, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig,
    StaticFilesConfig,
};

/// Environment variables read by earlier deployments, mapped onto config keys
const LEGACY_ENV: [(&str, &str); 3] = [
    ("PORT", "server.port"),
    ("dbName", "database.name"),
    ("connectionStringAtlas", "database.connection_string"),
];

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// Sources, lowest priority first: defaults, the config file (optional),
    /// `PROXY_*` environment variables, then the legacy variable names.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("PROXY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("http.api_prefix", "/api/")?
            .set_default("http.server_name", "mongo-rest-proxy")?
            .set_default("http.enable_cors", true)?
            .set_default("http.max_body_size", 52_428_800)? // 50MB
            .set_default("static_files.dir", "./static")?
            .set_default("static_files.error_page", "./static/error.html")?
            .set_default("logging.access_log", true)?
            .set_default("logging.log_params", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.read_timeout", 300)?;

        for (var, key) in LEGACY_ENV {
            builder = builder.set_override_option(key, std::env::var(var).ok())?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
