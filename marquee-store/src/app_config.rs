use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub hold_rules: HoldRules,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HoldRules {
    /// Seconds a hold survives without an extension. The storefront
    /// countdown renders this window.
    pub hold_ttl_seconds: u64,
    /// Worst-case staleness of pushed availability after expiry.
    pub sweep_interval_seconds: u64,
    /// Extensions allowed per booking attempt; 0 disables the cap.
    #[serde(default = "default_max_extensions")]
    pub max_extensions: u32,
}

fn default_max_extensions() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifierConfig {
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_event_buffer() -> usize {
    128
}

impl HoldRules {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.hold_ttl_seconds as i64)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of MARQUEE)
            // Eg.. `MARQUEE__SERVER__PORT=9000` would set the server port
            .add_source(config::Environment::with_prefix("MARQUEE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
