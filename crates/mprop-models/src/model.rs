//! Segmentation model selection.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::DescriptorError;

/// Available model sizes, smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelSize {
    Tiny,
    Small,
    /// Default trade-off between speed and quality
    #[default]
    BasePlus,
    Large,
}

impl ModelSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Small => "small",
            ModelSize::BasePlus => "base_plus",
            ModelSize::Large => "large",
        }
    }

    /// Label shown to users.
    pub fn label(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "Tiny",
            ModelSize::Small => "Small",
            ModelSize::BasePlus => "Base+",
            ModelSize::Large => "Large",
        }
    }

    /// Checkpoint file relative to the model repository.
    pub fn checkpoint_file(&self) -> String {
        format!("checkpoints/sam2.1_hiera_{}.pt", self.as_str())
    }

    /// Model config file relative to the model repository.
    pub fn config_file(&self) -> String {
        let short = match self {
            ModelSize::Tiny => "t",
            ModelSize::Small => "s",
            ModelSize::BasePlus => "b+",
            ModelSize::Large => "l",
        };
        format!("sam2/configs/samurai/sam2.1_hiera_{}.yaml", short)
    }

    pub fn checkpoint_path(&self, repo: &Path) -> PathBuf {
        repo.join(self.checkpoint_file())
    }

    pub fn config_path(&self, repo: &Path) -> PathBuf {
        repo.join(self.config_file())
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for ModelSize {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tiny" | "t" => Ok(ModelSize::Tiny),
            "small" | "s" => Ok(ModelSize::Small),
            "base+" | "base_plus" | "baseplus" | "b+" => Ok(ModelSize::BasePlus),
            "large" | "l" => Ok(ModelSize::Large),
            _ => Err(DescriptorError::UnknownModel(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_paths() {
        let repo = Path::new("/opt/sam2_repo");
        assert_eq!(
            ModelSize::Large.checkpoint_path(repo),
            PathBuf::from("/opt/sam2_repo/checkpoints/sam2.1_hiera_large.pt")
        );
        assert_eq!(
            ModelSize::BasePlus.config_path(repo),
            PathBuf::from("/opt/sam2_repo/sam2/configs/samurai/sam2.1_hiera_b+.yaml")
        );
        assert_eq!(
            ModelSize::Tiny.config_file(),
            "sam2/configs/samurai/sam2.1_hiera_t.yaml"
        );
    }

    #[test]
    fn test_model_parsing() {
        assert_eq!("Base+".parse::<ModelSize>().unwrap(), ModelSize::BasePlus);
        assert_eq!("LARGE".parse::<ModelSize>().unwrap(), ModelSize::Large);
        assert!("huge".parse::<ModelSize>().is_err());
    }

    #[test]
    fn test_model_serde() {
        let json = serde_json::to_string(&ModelSize::BasePlus).unwrap();
        assert_eq!(json, "\"base_plus\"");
    }
}
