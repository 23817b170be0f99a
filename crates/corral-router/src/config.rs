// ABOUTME: Configuration loading and validation for a corral-based server.
// ABOUTME: Reads environment variables for bind address, template and static directories, and admin token.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CORRAL_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("CORRAL_VIEW_EXT must not be empty")]
    EmptyViewExtension,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub views_dir: PathBuf,
    pub view_ext: String,
    pub static_dir: PathBuf,
    pub static_prefix: String,
    pub admin_token: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - CORRAL_BIND: socket address to bind (default: 127.0.0.1:8080)
    /// - CORRAL_VIEWS_DIR: template directory (default: views)
    /// - CORRAL_VIEW_EXT: template file suffix (default: .html)
    /// - CORRAL_STATIC_DIR: directory served as static files (default: static)
    /// - CORRAL_STATIC_PREFIX: URL prefix for static files (default: /static)
    /// - CORRAL_ADMIN_TOKEN: bearer token guarding admin routes (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_str = std::env::var("CORRAL_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str))?;

        let views_dir = std::env::var("CORRAL_VIEWS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("views"));

        let view_ext = std::env::var("CORRAL_VIEW_EXT").unwrap_or_else(|_| ".html".to_string());
        if view_ext.is_empty() {
            return Err(ConfigError::EmptyViewExtension);
        }

        let static_dir = std::env::var("CORRAL_STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("static"));

        let static_prefix =
            std::env::var("CORRAL_STATIC_PREFIX").unwrap_or_else(|_| "/static".to_string());

        let admin_token = std::env::var("CORRAL_ADMIN_TOKEN").ok().filter(|t| !t.is_empty());

        Ok(Self {
            bind,
            views_dir,
            view_ext,
            static_dir,
            static_prefix,
            admin_token,
        })
    }
}
