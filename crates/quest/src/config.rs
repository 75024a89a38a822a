//! Query configuration via `quest.toml`
//!
//! Controls the BVH build (depth and bucket size) and the uniform query
//! grid. Every field has a default, so an empty file is a valid config.

use std::path::Path;

use meshstore_spatial::{BoundingBox, Point3};
use serde::{Deserialize, Serialize};

use crate::error::{QuestError, Result};

/// Config file name used by tools that keep one next to their data
pub const CONFIG_FILE_NAME: &str = "quest.toml";

/// Query configuration loaded from `quest.toml`
///
/// # Example
///
/// ```toml
/// max_levels = 5
/// max_objects = 25
/// resolution = [10, 10, 10]
/// # bounds = [-1.0, -1.0, -1.0, 1.0, 1.0, 1.0]
/// bounds_scale = 1.5
/// parallel = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Depth limit of the BVH (root is level 1)
    #[serde(default = "default_max_levels")]
    pub max_levels: usize,
    /// Bucket size at which BVH splitting stops
    #[serde(default = "default_max_objects")]
    pub max_objects: usize,
    /// Query grid cells per axis
    #[serde(default = "default_resolution")]
    pub resolution: [usize; 3],
    /// Query box as `xmin ymin zmin xmax ymax zmax`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<[f64; 6]>,
    /// Scale applied to the mesh bounds when `bounds` is absent
    #[serde(default = "default_bounds_scale")]
    pub bounds_scale: f64,
    /// Evaluate query points on the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_max_levels() -> usize {
    5
}

fn default_max_objects() -> usize {
    25
}

fn default_resolution() -> [usize; 3] {
    [10, 10, 10]
}

fn default_bounds_scale() -> f64 {
    1.5
}

fn default_parallel() -> bool {
    true
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_levels: default_max_levels(),
            max_objects: default_max_objects(),
            resolution: default_resolution(),
            bounds: None,
            bounds_scale: default_bounds_scale(),
            parallel: default_parallel(),
        }
    }
}

impl QueryConfig {
    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.max_levels < 1 {
            return Err(QuestError::invalid("max_levels", "must be at least 1"));
        }
        if self.max_objects < 1 {
            return Err(QuestError::invalid("max_objects", "must be at least 1"));
        }
        if self.resolution.iter().any(|&r| r < 1) {
            return Err(QuestError::invalid(
                "resolution",
                format!("{:?} must be at least 1 per axis", self.resolution),
            ));
        }
        if !(self.bounds_scale > 0.0 && self.bounds_scale.is_finite()) {
            return Err(QuestError::invalid(
                "bounds_scale",
                format!("{} must be positive", self.bounds_scale),
            ));
        }
        if let Some(b) = &self.bounds {
            if (0..3).any(|i| !(b[i] < b[i + 3])) {
                return Err(QuestError::invalid(
                    "bounds",
                    format!("{:?} needs min < max on every axis", b),
                ));
            }
        }
        Ok(())
    }

    /// Box to sample: `bounds` if given, else `mesh_bounds` scaled about its
    /// centroid by `bounds_scale`
    pub fn query_bounds(&self, mesh_bounds: &BoundingBox<3>) -> BoundingBox<3> {
        match self.bounds {
            Some(b) => BoundingBox::new(
                Point3::xyz(b[0], b[1], b[2]),
                Point3::xyz(b[3], b[4], b[5]),
            ),
            None => {
                let mut bbox = *mesh_bounds;
                bbox.scale(self.bounds_scale);
                bbox
            }
        }
    }

    /// Parse and validate a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: QueryConfig = toml::from_str(content)
            .map_err(|e| QuestError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Signed distance query configuration
#
# BVH depth limit (root is level 1) and bucket size at which splitting stops
max_levels = 5
max_objects = 25

# Query grid cells per axis; the grid has resolution + 1 nodes per axis
resolution = [10, 10, 10]

# Query box (xmin, ymin, zmin, xmax, ymax, zmax).
# When absent, the mesh bounding box scaled by bounds_scale is used.
# bounds = [-1.0, -1.0, -1.0, 1.0, 1.0, 1.0]
bounds_scale = 1.5

# Evaluate grid points in parallel
parallel = true
"#
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds
    /// out-of-range values.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QuestError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: QueryConfig = toml::from_str(&content).map_err(|e| {
            QuestError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                QuestError::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| QuestError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            QuestError::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_toml_parses_to_default() {
        let config = QueryConfig::from_toml_str(QueryConfig::default_toml()).unwrap();
        assert_eq!(config, QueryConfig::default());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = QueryConfig::from_toml_str("").unwrap();
        assert_eq!(config.max_levels, 5);
        assert_eq!(config.max_objects, 25);
        assert_eq!(config.resolution, [10, 10, 10]);
        assert!(config.bounds.is_none());
        assert!(config.parallel);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for bad in [
            "max_levels = 0",
            "max_objects = 0",
            "resolution = [4, 0, 4]",
            "bounds_scale = -1.0",
            "bounds = [0.0, 0.0, 0.0, 1.0, -1.0, 1.0]",
        ] {
            assert!(
                matches!(
                    QueryConfig::from_toml_str(bad),
                    Err(QuestError::InvalidParameter { .. })
                ),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            QueryConfig::from_toml_str("resolution = \"high\""),
            Err(QuestError::Config(_))
        ));
    }

    #[test]
    fn query_bounds_scales_mesh_box() {
        let mesh = BoundingBox::new(Point3::splat(-1.0), Point3::splat(1.0));
        let config = QueryConfig {
            bounds_scale: 2.0,
            ..QueryConfig::default()
        };
        let q = config.query_bounds(&mesh);
        assert_eq!(q.min(), &Point3::splat(-2.0));
        assert_eq!(q.max(), &Point3::splat(2.0));

        let explicit = QueryConfig {
            bounds: Some([0.0, 0.0, 0.0, 1.0, 2.0, 3.0]),
            ..QueryConfig::default()
        };
        assert_eq!(
            explicit.query_bounds(&mesh).max(),
            &Point3::xyz(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = QueryConfig {
            max_levels: 8,
            resolution: [4, 5, 6],
            bounds: Some([-1.0, -2.0, -3.0, 1.0, 2.0, 3.0]),
            parallel: false,
            ..QueryConfig::default()
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(QueryConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "max_levels = 9\n").unwrap();
        QueryConfig::write_default_if_missing(&path).unwrap();
        assert_eq!(QueryConfig::from_file(&path).unwrap().max_levels, 9);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let err = QueryConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
