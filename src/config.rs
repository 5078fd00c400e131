//! arrsync configuration
//!
//! One TOML file lists every backend instance and, per instance, the
//! resources it should carry:
//!
//! ```toml
//! [instances.tv]
//! dialect = "sonarr"
//! base_url = "http://localhost:8989"
//! api_key = "$SONARR_API_KEY"
//!
//! [instances.tv.download_clients]
//! delete_unmanaged = { enabled = true, ignore = ["Legacy"] }
//!
//! [[instances.tv.download_clients.items]]
//! name = "qb"
//! type = "qBittorrent"
//! priority = 1
//! tags = ["4k"]
//! fields = { host = "qbittorrent", port = 8080, category = "tv" }
//! ```

use crate::paths;
use anyhow::{Context, Result};
use arrclient::{Dialect, ResourceKind};
use declarative::{DeletePolicy, DesiredResource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Root of the config file
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceConfig>,

    /// Where the config was read from
    #[serde(skip)]
    pub source: PathBuf,
}

/// One backend instance
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceConfig {
    /// sonarr, radarr, lidarr, readarr or whisparr
    pub dialect: String,

    pub base_url: String,

    /// API key; `$VAR` and `${VAR}` are expanded from the environment
    pub api_key: String,

    #[serde(default)]
    pub download_clients: Option<KindSection>,
    #[serde(default)]
    pub custom_formats: Option<KindSection>,
    #[serde(default)]
    pub quality_profiles: Option<KindSection>,
    #[serde(default)]
    pub metadata_profiles: Option<KindSection>,
    #[serde(default)]
    pub root_folders: Option<KindSection>,
    #[serde(default)]
    pub remote_path_mappings: Option<KindSection>,
}

/// Desired resources of one kind plus the knobs that apply to them
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindSection {
    #[serde(default)]
    pub items: Vec<DesiredResource>,

    /// Treat configured secret values as authoritative
    #[serde(default)]
    pub update_secrets: bool,

    #[serde(default)]
    pub delete_unmanaged: DeletePolicy,
}

impl Config {
    /// Load from the default location or an explicit path
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = paths::config_file(explicit)?;
        Self::load_from(&path)
    }

    /// Load from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Config file not found: {}\nSet {} or pass --config",
                path.display(),
                paths::ENV_CONFIG_DIR
            );
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;
        config.source = path.to_path_buf();
        Ok(config)
    }

    /// Validate every instance
    pub fn validate(&self) -> Result<()> {
        if self.instances.is_empty() {
            anyhow::bail!("No instances configured");
        }
        for (name, instance) in &self.instances {
            instance
                .validate()
                .with_context(|| format!("Invalid instance '{name}'"))?;
        }
        Ok(())
    }

    /// Instances to run, optionally narrowed to one name
    pub fn select(&self, only: Option<&str>) -> Result<Vec<(&str, &InstanceConfig)>> {
        match only {
            Some(name) => {
                let (key, instance) = self.instances.get_key_value(name).with_context(|| {
                    let known: Vec<&str> = self.instances.keys().map(String::as_str).collect();
                    format!("Unknown instance '{name}' (configured: {})", known.join(", "))
                })?;
                Ok(vec![(key.as_str(), instance)])
            }
            None => Ok(self
                .instances
                .iter()
                .map(|(name, instance)| (name.as_str(), instance))
                .collect()),
        }
    }
}

impl InstanceConfig {
    pub fn dialect(&self) -> Result<Dialect> {
        Ok(self.dialect.parse::<Dialect>()?)
    }

    /// API key with environment variables expanded
    pub fn api_key(&self) -> Result<String> {
        let expanded = shellexpand::env(&self.api_key)
            .with_context(|| format!("Could not expand api_key '{}'", self.api_key))?;
        Ok(expanded.into_owned())
    }

    pub fn section(&self, kind: ResourceKind) -> Option<&KindSection> {
        match kind {
            ResourceKind::DownloadClient => self.download_clients.as_ref(),
            ResourceKind::CustomFormat => self.custom_formats.as_ref(),
            ResourceKind::QualityProfile => self.quality_profiles.as_ref(),
            ResourceKind::MetadataProfile => self.metadata_profiles.as_ref(),
            ResourceKind::RootFolder => self.root_folders.as_ref(),
            ResourceKind::RemotePathMapping => self.remote_path_mappings.as_ref(),
        }
    }

    /// Configured sections in reconciliation order
    pub fn sections(&self) -> impl Iterator<Item = (ResourceKind, &KindSection)> {
        ResourceKind::all()
            .iter()
            .filter_map(|&kind| self.section(kind).map(|section| (kind, section)))
    }

    pub fn validate(&self) -> Result<()> {
        let dialect = self.dialect()?;

        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            anyhow::bail!("base_url cannot be empty");
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            anyhow::bail!("base_url must start with http:// or https://, got '{base_url}'");
        }
        if self.api_key.trim().is_empty() {
            anyhow::bail!("api_key cannot be empty");
        }

        for (kind, section) in self.sections() {
            if !dialect.supports(kind) {
                anyhow::bail!("{dialect} has no {kind}s; remove that section");
            }
            for item in &section.items {
                if item.name.trim().is_empty() {
                    anyhow::bail!("A {kind} has an empty name");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[instances.tv]
dialect = "Sonarr"
base_url = "http://localhost:8989"
api_key = "abc123"

[instances.tv.download_clients]
update_secrets = true
delete_unmanaged = { enabled = true, ignore = ["Legacy"] }

[[instances.tv.download_clients.items]]
name = "qb"
type = "qBittorrent"
priority = 1
remove_completed_downloads = false
tags = ["4k", 3]
fields = { host = "qbittorrent", port = 8080 }

[[instances.tv.remote_path_mappings.items]]
remote_path = "/downloads/"
host = "qbittorrent"
local_path = "/data/downloads/"

[instances.books]
dialect = "readarr"
base_url = "https://books.example"
api_key = "key"

[[instances.books.root_folders.items]]
path = "/books"
default_quality_profile = "eBook"
"#;

    fn write_config(content: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_and_validate() {
        let (_dir, path) = write_config(SAMPLE);
        let config = Config::load_from(&path).unwrap();
        config.validate().unwrap();

        assert_eq!(config.source, path);
        assert_eq!(config.instances.len(), 2);

        let tv = &config.instances["tv"];
        assert_eq!(tv.dialect().unwrap(), Dialect::Sonarr);

        let clients = tv.section(ResourceKind::DownloadClient).unwrap();
        assert!(clients.update_secrets);
        assert!(clients.delete_unmanaged.allows("Other"));
        assert!(!clients.delete_unmanaged.allows("Legacy"));

        let qb = &clients.items[0];
        assert_eq!(qb.implementation, "qBittorrent");
        assert_eq!(qb.scalars["priority"], json!(1));
        assert_eq!(qb.scalars["remove_completed_downloads"], json!(false));
        assert_eq!(qb.tags.as_ref().unwrap().len(), 2);
        assert_eq!(qb.fields.as_ref().unwrap()["port"], json!(8080));
    }

    #[test]
    fn test_identity_aliases() {
        let (_dir, path) = write_config(SAMPLE);
        let config = Config::load_from(&path).unwrap();

        let mapping = &config.instances["tv"]
            .section(ResourceKind::RemotePathMapping)
            .unwrap()
            .items[0];
        assert_eq!(mapping.name, "/downloads/");
        assert_eq!(mapping.implementation, "qbittorrent");
        assert_eq!(mapping.scalars["local_path"], json!("/data/downloads/"));

        let folder = &config.instances["books"]
            .section(ResourceKind::RootFolder)
            .unwrap()
            .items[0];
        assert_eq!(folder.name, "/books");
        assert!(folder.implementation.is_empty());
    }

    #[test]
    fn test_sections_follow_run_order() {
        let (_dir, path) = write_config(SAMPLE);
        let config = Config::load_from(&path).unwrap();
        let kinds: Vec<ResourceKind> = config.instances["tv"].sections().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![ResourceKind::DownloadClient, ResourceKind::RemotePathMapping]
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = Config::load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_invalid_toml() {
        let (_dir, path) = write_config("[instances.tv\n");
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_unknown_instance_key_rejected() {
        let (_dir, path) = write_config(
            "[instances.tv]\ndialect = \"sonarr\"\nbase_url = \"http://x\"\napi_key = \"k\"\nbase_uri = \"typo\"\n",
        );
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_instances() {
        let instance = |dialect: &str, base_url: &str| InstanceConfig {
            dialect: dialect.into(),
            base_url: base_url.into(),
            api_key: "key".into(),
            ..Default::default()
        };

        assert!(instance("prowlarr", "http://x").validate().is_err());
        assert!(instance("sonarr", "").validate().is_err());
        assert!(instance("sonarr", "localhost:8989").validate().is_err());
        assert!(instance("radarr", "http://x").validate().is_ok());

        let mut radarr = instance("radarr", "http://x");
        radarr.metadata_profiles = Some(KindSection::default());
        let err = radarr.validate().unwrap_err();
        assert!(err.to_string().contains("metadata profile"));

        let mut lidarr = instance("lidarr", "http://x");
        lidarr.metadata_profiles = Some(KindSection::default());
        assert!(lidarr.validate().is_ok());
    }

    #[test]
    fn test_validate_wraps_instance_name() {
        let mut config = Config::default();
        config.instances.insert(
            "movies".into(),
            InstanceConfig {
                dialect: "radarr".into(),
                base_url: String::new(),
                api_key: "k".into(),
                ..Default::default()
            },
        );
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("Invalid instance 'movies'"));
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_select() {
        let (_dir, path) = write_config(SAMPLE);
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.select(None).unwrap().len(), 2);
        assert_eq!(config.select(Some("books")).unwrap()[0].0, "books");
        let err = config.select(Some("music")).unwrap_err();
        assert!(err.to_string().contains("books, tv"));
    }

    #[test]
    fn test_selected_names_outlive_the_query() {
        let (_dir, path) = write_config(SAMPLE);
        let config = Config::load_from(&path).unwrap();
        let selected = {
            let query = String::from("tv");
            config.select(Some(&query)).unwrap()
        };
        assert_eq!(selected[0].0, "tv");
        assert_eq!(selected[0].1.dialect().unwrap(), Dialect::Sonarr);
    }

    #[test]
    fn test_api_key_expansion() {
        let mut instance = InstanceConfig {
            api_key: "$ARRSYNC_TEST_KEY_UNSET_98765".into(),
            ..Default::default()
        };
        assert!(instance.api_key().is_err());

        instance.api_key = "literal-key".into();
        assert_eq!(instance.api_key().unwrap(), "literal-key");
    }
}
