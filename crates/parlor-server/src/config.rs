//! Server configuration.
//!
//! One JSON document of shape `{server: {...}, database: {postgres: {...}}}`,
//! loaded from an optional file with `PARLOR_*` environment-variable
//! overrides on top. Defaults are usable out of the box for local runs.
//! The postgres section is carried for the persistence collaborator; the
//! in-process stub ignores it.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Game and admin listener settings.
    pub server: ServerConfig,
    /// Persistence collaborator settings.
    pub database: DatabaseConfig,
}

/// Listener and room-default settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the game listener binds to.
    pub http_address: String,
    /// Address the admin endpoint binds to.
    pub rpc_address: String,
    /// Name given to rooms created over the wire.
    pub default_room_name: String,
    /// Game type installed in rooms created over the wire.
    pub default_game_type: String,
    /// Capacity of rooms created over the wire.
    pub default_max_players: usize,
    /// Client heartbeat interval; the read deadline is twice this.
    pub heartbeat_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_address: "127.0.0.1:8080".to_string(),
            rpc_address: "127.0.0.1:8081".to_string(),
            default_room_name: "New Room".to_string(),
            default_game_type: "slot_machine".to_string(),
            default_max_players: 4,
            heartbeat_interval_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Heartbeat interval as a duration.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

/// Persistence collaborator settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection settings.
    pub postgres: PostgresConfig,
}

/// Postgres connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// Host name.
    pub host: String,
    /// Port.
    pub port: u16,
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
    /// Database name.
    pub dbname: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "parlor".to_string(),
            password: String::new(),
            dbname: "parlor".to_string(),
        }
    }
}

impl Config {
    /// Load configuration: file (when given and present), then environment
    /// overrides, then defaults for everything else.
    ///
    /// # Errors
    ///
    /// `ServerError::Config` when the file or an override does not parse.
    pub fn load(path: Option<&Path>) -> Result<Self, ServerError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|err| {
                    ServerError::Config(format!("cannot read {}: {err}", path.display()))
                })?;
                serde_json::from_str(&raw).map_err(|err| {
                    ServerError::Config(format!("cannot parse {}: {err}", path.display()))
                })?
            }
            None => Self::default(),
        };

        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ServerError> {
        override_string("PARLOR_HTTP_ADDRESS", &mut self.server.http_address);
        override_string("PARLOR_RPC_ADDRESS", &mut self.server.rpc_address);
        override_string("PARLOR_DEFAULT_GAME_TYPE", &mut self.server.default_game_type);
        override_parsed("PARLOR_DEFAULT_MAX_PLAYERS", &mut self.server.default_max_players)?;
        override_parsed("PARLOR_HEARTBEAT_SECS", &mut self.server.heartbeat_interval_secs)?;

        override_string("PARLOR_PG_HOST", &mut self.database.postgres.host);
        override_parsed("PARLOR_PG_PORT", &mut self.database.postgres.port)?;
        override_string("PARLOR_PG_USER", &mut self.database.postgres.user);
        override_string("PARLOR_PG_PASSWORD", &mut self.database.postgres.password);
        override_string("PARLOR_PG_DBNAME", &mut self.database.postgres.dbname);
        Ok(())
    }
}

fn override_string(key: &str, target: &mut String) {
    if let Ok(value) = std::env::var(key) {
        *target = value;
    }
}

fn override_parsed<T: std::str::FromStr>(key: &str, target: &mut T) -> Result<(), ServerError>
where
    T::Err: std::fmt::Display,
{
    if let Ok(value) = std::env::var(key) {
        *target = value
            .parse()
            .map_err(|err| ServerError::Config(format!("{key}={value}: {err}")))?;
    }
    Ok(())
}
