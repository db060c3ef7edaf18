//! Configuration for a conversion run.

use record_io::Compression;
use serde::{Deserialize, Serialize};

/// Configuration for a conversion run.
///
/// The number of ranks is not configured here; it is the size of the
/// communicator the run is started on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Compression for stored arrays and the grid name.
    pub compression: Compression,

    /// Rank that reads GRIB input, writes output files and owns global fields.
    pub coordinator: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Deflate,
            coordinator: 0,
        }
    }
}

impl ConversionConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GRIB2ATLAS_COMPRESSION") {
            if let Some(compression) = Compression::parse(&val) {
                config.compression = compression;
            }
        }

        if let Ok(val) = std::env::var("GRIB2ATLAS_COORDINATOR") {
            if let Ok(rank) = val.parse() {
                config.coordinator = rank;
            }
        }

        config
    }

    /// Validate the configuration for a run on `ranks` ranks.
    pub fn validate(&self, ranks: usize) -> Result<(), String> {
        if ranks == 0 {
            return Err("ranks must be > 0".to_string());
        }

        if self.coordinator >= ranks {
            return Err(format!(
                "coordinator must be a rank in 0..{}, got {}",
                ranks, self.coordinator
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ConversionConfig::default();
        assert!(config.validate(1).is_ok());
        assert_eq!(config.compression, Compression::Deflate);
    }

    #[test]
    fn test_coordinator_must_be_a_rank() {
        let config = ConversionConfig {
            coordinator: 2,
            ..Default::default()
        };
        assert!(config.validate(0).is_err());
        assert!(config.validate(2).is_err());
        assert!(config.validate(3).is_ok());
    }

    #[test]
    fn test_serializes_for_logging() {
        let json = serde_json::to_string(&ConversionConfig::default()).unwrap();
        assert!(json.contains("\"compression\":\"deflate\""));
        assert!(!json.contains("ranks"));
    }
}
