use crate::client::ClientConfig;
use crate::error::ConfigError;
use crate::migration::MigrationConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database holding circuit state and the cached token.
    pub state_database_url: String,
    pub legacy_database_url: String,
    pub client: ClientConfig,
    pub migration: MigrationConfig,
    pub log_json: bool,
    pub reset_circuit: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let legacy_database_url = lookup("BRIDGE_LEGACY_DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing("BRIDGE_LEGACY_DATABASE_URL"))?;

        Ok(Self {
            state_database_url: lookup("BRIDGE_STATE_DATABASE_URL")
                .unwrap_or_else(|| "sqlite:bridge-state.db".to_string()),
            legacy_database_url,
            client: ClientConfig::from_lookup(&lookup)?,
            migration: MigrationConfig::from_lookup(&lookup)?,
            log_json: flag(&lookup, "BRIDGE_LOG_JSON"),
            reset_circuit: flag(&lookup, "BRIDGE_RESET_CIRCUIT"),
        })
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> bool {
    lookup(name).is_some_and(|value| matches!(value.trim(), "1" | "true" | "yes"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn assembles_every_section() {
        let config = AppConfig::from_lookup(|name| {
            let value = match name {
                "BRIDGE_LEGACY_DATABASE_URL" => "sqlite:legacy.db",
                "BRIDGE_API_BASE_URL" => "http://127.0.0.1:8000/api",
                "BRIDGE_API_USERNAME" => "bridge",
                "BRIDGE_API_PASSWORD" => "secret",
                "BRIDGE_DRY_RUN" => "true",
                "BRIDGE_RESET_CIRCUIT" => "1",
                _ => return None,
            };
            Some(value.to_string())
        })
        .unwrap();

        assert_eq!(config.state_database_url, "sqlite:bridge-state.db");
        assert!(config.migration.dry_run);
        assert!(config.reset_circuit);
        assert!(!config.log_json);
    }

    #[test]
    fn legacy_database_is_required() {
        let err = AppConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("BRIDGE_LEGACY_DATABASE_URL")));
    }
}
