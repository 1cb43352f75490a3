use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ConfigError;

/// Structure representing the application configuration. Contains pathing and
/// unpacking parameters. Configs are serializable and deserializable to YAML
/// using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory containing the timeslice archives (`*.tsa`)
    pub input_path: PathBuf,
    /// Directory to which decoded digi archives are written
    pub output_path: PathBuf,
    /// Channel mapping parameter file
    pub mapping_path: PathBuf,
    /// Number of trailing overlap microslices to skip per component
    pub overlap_ms: usize,
    /// Number of parallel worker threads to divide the archives amongst
    pub n_threads: i32,
}

impl Default for Config {
    /// Generate a new Config object. All paths will be empty/invalid
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            mapping_path: PathBuf::from("None"),
            overlap_ms: 1,
            n_threads: 1,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Path of the output digi archive for one timeslice
    pub fn get_output_file_name(&self, ts_index: u64) -> PathBuf {
        self.output_path.join(format!("ts_{ts_index}.digi"))
    }

    pub fn does_input_exist(&self) -> bool {
        self.input_path.exists()
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_round_trip() {
        let config = Config {
            input_path: PathBuf::from("/data/tsa"),
            output_path: PathBuf::from("/data/digi"),
            mapping_path: PathBuf::from("/data/mapping.par"),
            overlap_ms: 1,
            n_threads: 4,
        };
        let yaml_str = serde_yaml::to_string(&config).unwrap();
        let path = std::env::temp_dir().join("tof_config_roundtrip.yml");
        std::fs::write(&path, &yaml_str).unwrap();

        let read_back = Config::read_config_file(&path).unwrap();
        assert_eq!(read_back.input_path, config.input_path);
        assert_eq!(read_back.overlap_ms, 1);
        assert_eq!(read_back.n_threads, 4);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_config_file() {
        let result = Config::read_config_file(Path::new("/not/a/config.yml"));
        assert!(matches!(result, Err(ConfigError::BadFilePath(_))));
    }

    #[test]
    fn test_output_file_name() {
        let config = Config {
            output_path: PathBuf::from("/out"),
            ..Config::default()
        };
        assert_eq!(
            config.get_output_file_name(12),
            PathBuf::from("/out/ts_12.digi")
        );
    }
}
