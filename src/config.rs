//! Typed configuration for collaborator implementations.
//!
//! Connection parameters and credentials live in explicit settings structs
//! handed to collaborator constructors, never in process-wide state, so
//! the engine stays testable with fakes and a service can load, validate,
//! and scope its configuration once at startup.

use serde::Deserialize;

/// Language-model provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    /// Provider API key.
    pub api_key: String,
    /// Model identifier to request.
    pub model: String,
    /// Sampling temperature, when the provider supports it.
    #[serde(default)]
    pub temperature: Option<f32>,
}

/// Relational database connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database host name.
    pub host: String,
    /// Database port.
    #[serde(default = "default_db_port")]
    pub port: u16,
    /// Role to connect as.
    pub user: String,
    /// Role password.
    pub password: String,
    /// Database name.
    pub dbname: String,
}

fn default_db_port() -> u16 {
    5432
}

/// Outbound e-mail (SMTP) settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpSettings {
    /// SMTP server host name.
    pub server: String,
    /// SMTP server port.
    pub port: u16,
    /// Sender address, also used as the login.
    pub sender: String,
    /// Sender password.
    pub password: String,
}

/// Top-level settings for a service embedding the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Model provider settings.
    pub model: ModelSettings,
    /// Database settings.
    pub database: DatabaseSettings,
    /// SMTP settings.
    pub smtp: SmtpSettings,
}

impl Settings {
    /// Parse settings from a JSON document.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
