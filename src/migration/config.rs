use chrono::NaiveDate;

use crate::error::ConfigError;
use crate::legacy::LegacyQuery;
use crate::mapping::MappingOptions;

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub batch_size: usize,
    pub dry_run: bool,
    pub purpose_id: i64,
    pub term_end: Option<NaiveDate>,
    pub max_name_len: usize,
    pub approved_only: bool,
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

impl MigrationConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("BRIDGE_BATCH_SIZE")
            && let Ok(parsed) = value.parse::<usize>()
        {
            config.batch_size = parsed.max(1);
        }
        if let Some(value) = lookup("BRIDGE_DRY_RUN")
            && let Ok(parsed) = value.parse::<bool>()
        {
            config.dry_run = parsed;
        }
        if let Some(value) = lookup("BRIDGE_PURPOSE_ID")
            && let Ok(parsed) = value.parse::<i64>()
        {
            config.purpose_id = parsed;
        }
        if let Some(value) = lookup("BRIDGE_MAX_NAME_LEN")
            && let Ok(parsed) = value.parse::<usize>()
        {
            config.max_name_len = parsed.max(1);
        }
        if let Some(value) = lookup("BRIDGE_APPROVED_ONLY")
            && let Ok(parsed) = value.parse::<bool>()
        {
            config.approved_only = parsed;
        }
        config.term_end = parse_date(&lookup, "BRIDGE_TERM_END")?;
        config.from = parse_date(&lookup, "BRIDGE_FROM")?;
        config.until = parse_date(&lookup, "BRIDGE_UNTIL")?;

        if let (Some(from), Some(until)) = (config.from, config.until)
            && from > until
        {
            return Err(ConfigError::Invalid {
                field: "BRIDGE_FROM",
                message: format!("{from} is after BRIDGE_UNTIL {until}"),
            });
        }

        Ok(config)
    }

    pub fn legacy_query(&self) -> LegacyQuery {
        LegacyQuery {
            from: self.from,
            until: self.until,
            approved_only: self.approved_only,
            room_labels: Vec::new(),
        }
    }

    pub fn mapping_options(&self) -> MappingOptions {
        MappingOptions {
            purpose_id: self.purpose_id,
            term_end: self.term_end,
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            dry_run: false,
            purpose_id: 1,
            term_end: None,
            max_name_len: 255,
            approved_only: true,
            from: None,
            until: None,
        }
    }
}

fn parse_date(
    lookup: &impl Fn(&str) -> Option<String>,
    field: &'static str,
) -> Result<Option<NaiveDate>, ConfigError> {
    match lookup(field) {
        Some(value) if !value.trim().is_empty() => NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|err| ConfigError::Invalid {
                field,
                message: err.to_string(),
            }),
        _ => Ok(None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn dates_must_be_iso() {
        let err = MigrationConfig::from_lookup(|name| {
            (name == "BRIDGE_TERM_END").then(|| "07/12/2024".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "BRIDGE_TERM_END", .. }));
    }

    #[test]
    fn batch_size_has_a_floor() {
        let config = MigrationConfig::from_lookup(|name| match name {
            "BRIDGE_BATCH_SIZE" => Some("0".to_string()),
            "BRIDGE_TERM_END" => Some("2024-07-12".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.batch_size, 1);
        assert_eq!(config.term_end, NaiveDate::from_ymd_opt(2024, 7, 12));
        assert!(config.approved_only);
    }
}
