use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PersistenceError, PersistenceResult};

/// Smallest history depth a GAO may keep; ratchet healing needs at least
/// this many frames to bridge a short desynchronisation.
pub const MIN_LEGROOM: usize = 3;

/// Configuration for the persistence core and the objects it serves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// History depth for new GAOs. Clamped to [`MIN_LEGROOM`].
    pub default_legroom: usize,
    /// Whether locally produced primitives are handed to the salmonator.
    pub remotable: bool,
    /// Maximum concurrent blocking parse/verify jobs.
    pub parse_workers: usize,
    /// Capacity of the postman's broadcast channel.
    pub notify_capacity: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_legroom: 7,
            remotable: true,
            parse_workers: 6,
            notify_capacity: 1024,
        }
    }
}

impl CoreConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> PersistenceResult<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| PersistenceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PersistenceError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> PersistenceResult<()> {
        if self.parse_workers == 0 {
            return Err(PersistenceError::Config(
                "parse_workers must be at least 1".into(),
            ));
        }
        if self.notify_capacity == 0 {
            return Err(PersistenceError::Config(
                "notify_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// `default_legroom`, raised to the protocol minimum.
    pub fn legroom(&self) -> usize {
        self.default_legroom.max(MIN_LEGROOM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let c = CoreConfig::default();
        assert_eq!(c.default_legroom, 7);
        assert!(c.remotable);
        assert_eq!(c.parse_workers, 6);
        assert_eq!(c.notify_capacity, 1024);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = CoreConfig::from_toml_str("default_legroom = 12\nremotable = false\n").unwrap();
        assert_eq!(c.default_legroom, 12);
        assert!(!c.remotable);
        assert_eq!(c.parse_workers, 6);
    }

    #[test]
    fn legroom_is_clamped() {
        let c = CoreConfig {
            default_legroom: 1,
            ..Default::default()
        };
        assert_eq!(c.legroom(), MIN_LEGROOM);
    }

    #[test]
    fn zero_workers_rejected() {
        let err = CoreConfig::from_toml_str("parse_workers = 0").unwrap_err();
        assert!(matches!(err, PersistenceError::Config(_)));
        assert!(CoreConfig::from_toml_str("notify_capacity = 0").is_err());
    }

    #[test]
    fn bad_toml_rejected() {
        assert!(matches!(
            CoreConfig::from_toml_str("default_legroom = \"many\""),
            Err(PersistenceError::Config(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_legroom = 4").unwrap();
        writeln!(file, "notify_capacity = 8").unwrap();
        let c = CoreConfig::load(file.path()).unwrap();
        assert_eq!(c.default_legroom, 4);
        assert_eq!(c.notify_capacity, 8);

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            CoreConfig::load(missing),
            Err(PersistenceError::Config(_))
        ));
    }
}
