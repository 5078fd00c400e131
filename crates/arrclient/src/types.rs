//! Core types: dialects, resource kinds and small wire records.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported backend dialects.
///
/// All five share one REST layout; they differ in API version, in the
/// names of a few download-client fields, and in which resource kinds exist.
///
/// # Example
///
/// ```
/// use arrclient::Dialect;
///
/// let dialect: Dialect = "lidarr".parse().unwrap();
/// assert_eq!(dialect.api_version(), "v1");
/// assert_eq!(dialect.category_field(), "musicCategory");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// TV series.
    Sonarr,
    /// Movies.
    Radarr,
    /// Music.
    Lidarr,
    /// Books.
    Readarr,
    /// Adult movies, a Radarr fork.
    Whisparr,
}

impl Dialect {
    /// Lowercase identifier.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sonarr => "sonarr",
            Self::Radarr => "radarr",
            Self::Lidarr => "lidarr",
            Self::Readarr => "readarr",
            Self::Whisparr => "whisparr",
        }
    }

    /// API version segment of every endpoint path.
    #[must_use]
    pub fn api_version(&self) -> &'static str {
        match self {
            Self::Sonarr | Self::Radarr | Self::Whisparr => "v3",
            Self::Lidarr | Self::Readarr => "v1",
        }
    }

    /// Download-client field holding the category.
    #[must_use]
    pub fn category_field(&self) -> &'static str {
        match self {
            Self::Sonarr => "tvCategory",
            Self::Radarr | Self::Whisparr => "movieCategory",
            Self::Lidarr => "musicCategory",
            Self::Readarr => "bookCategory",
        }
    }

    /// Download-client field holding the priority for recent releases.
    #[must_use]
    pub fn recent_priority_field(&self) -> &'static str {
        match self {
            Self::Sonarr => "recentTvPriority",
            Self::Radarr | Self::Whisparr => "recentMoviePriority",
            Self::Lidarr => "recentMusicPriority",
            Self::Readarr => "recentBookPriority",
        }
    }

    /// Download-client field holding the priority for older releases.
    #[must_use]
    pub fn older_priority_field(&self) -> &'static str {
        match self {
            Self::Sonarr => "olderTvPriority",
            Self::Radarr | Self::Whisparr => "olderMoviePriority",
            Self::Lidarr => "olderMusicPriority",
            Self::Readarr => "olderBookPriority",
        }
    }

    /// Whether root folders carry profiles, monitoring and tags.
    #[must_use]
    pub fn has_root_folder_extras(&self) -> bool {
        matches!(self, Self::Lidarr | Self::Readarr)
    }

    /// Whether this dialect exposes a resource kind.
    #[must_use]
    pub fn supports(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::MetadataProfile => matches!(self, Self::Lidarr | Self::Readarr),
            _ => true,
        }
    }

    /// Get all dialects.
    #[must_use]
    pub fn all() -> &'static [Dialect] {
        &[
            Dialect::Sonarr,
            Dialect::Radarr,
            Dialect::Lidarr,
            Dialect::Readarr,
            Dialect::Whisparr,
        ]
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|d| d.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownDialect(s.to_string()))
    }
}

/// How a kind's schema endpoint answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaShape {
    /// No schema endpoint.
    None,
    /// A list of per-implementation templates.
    Providers,
    /// One blank resource.
    Single,
}

/// Configuration resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Download clients (`downloadclient`).
    DownloadClient,
    /// Custom formats (`customformat`).
    CustomFormat,
    /// Quality profiles (`qualityprofile`).
    QualityProfile,
    /// Metadata profiles (`metadataprofile`), Lidarr and Readarr only.
    MetadataProfile,
    /// Root folders (`rootfolder`).
    RootFolder,
    /// Remote path mappings (`remotepathmapping`).
    RemotePathMapping,
}

impl ResourceKind {
    /// Endpoint path segment.
    #[must_use]
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::DownloadClient => "downloadclient",
            Self::CustomFormat => "customformat",
            Self::QualityProfile => "qualityprofile",
            Self::MetadataProfile => "metadataprofile",
            Self::RootFolder => "rootfolder",
            Self::RemotePathMapping => "remotepathmapping",
        }
    }

    /// Human-readable label, singular.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::DownloadClient => "download client",
            Self::CustomFormat => "custom format",
            Self::QualityProfile => "quality profile",
            Self::MetadataProfile => "metadata profile",
            Self::RootFolder => "root folder",
            Self::RemotePathMapping => "remote path mapping",
        }
    }

    /// Shape of `<endpoint>/schema`.
    ///
    /// For custom formats the list holds specification templates, not
    /// whole custom formats.
    #[must_use]
    pub fn schema_shape(&self) -> SchemaShape {
        match self {
            Self::DownloadClient | Self::CustomFormat => SchemaShape::Providers,
            Self::QualityProfile | Self::MetadataProfile => SchemaShape::Single,
            Self::RootFolder | Self::RemotePathMapping => SchemaShape::None,
        }
    }

    /// All kinds, in the order an instance run reconciles them.
    ///
    /// Later kinds refer to earlier ones by name.
    #[must_use]
    pub fn all() -> &'static [ResourceKind] {
        &[
            ResourceKind::CustomFormat,
            ResourceKind::QualityProfile,
            ResourceKind::MetadataProfile,
            ResourceKind::RootFolder,
            ResourceKind::DownloadClient,
            ResourceKind::RemotePathMapping,
        ]
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A tag as returned by `GET tag`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Server-assigned id.
    pub id: i64,
    /// Tag label.
    pub label: String,
}

/// Subset of `GET system/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    /// Application name, e.g. "Sonarr".
    #[serde(default)]
    pub app_name: String,
    /// Instance name set in the UI.
    #[serde(default)]
    pub instance_name: String,
    /// Application version.
    #[serde(default)]
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_parse() {
        assert_eq!("Sonarr".parse::<Dialect>().unwrap(), Dialect::Sonarr);
        assert_eq!(" whisparr ".parse::<Dialect>().unwrap(), Dialect::Whisparr);
        assert!(matches!(
            "prowlarr".parse::<Dialect>(),
            Err(Error::UnknownDialect(_))
        ));
    }

    #[test]
    fn test_dialect_table() {
        assert_eq!(Dialect::Sonarr.api_version(), "v3");
        assert_eq!(Dialect::Readarr.api_version(), "v1");
        assert_eq!(Dialect::Whisparr.category_field(), "movieCategory");
        assert_eq!(Dialect::Readarr.recent_priority_field(), "recentBookPriority");
        assert_eq!(Dialect::Lidarr.older_priority_field(), "olderMusicPriority");
        assert!(Dialect::Lidarr.has_root_folder_extras());
        assert!(!Dialect::Radarr.has_root_folder_extras());
    }

    #[test]
    fn test_metadata_profiles_only_on_v1() {
        for dialect in Dialect::all() {
            assert_eq!(
                dialect.supports(ResourceKind::MetadataProfile),
                dialect.api_version() == "v1"
            );
            assert!(dialect.supports(ResourceKind::DownloadClient));
        }
    }

    #[test]
    fn test_kind_order_puts_dependencies_first() {
        let all = ResourceKind::all();
        let pos = |k| all.iter().position(|x| *x == k).unwrap();
        assert!(pos(ResourceKind::CustomFormat) < pos(ResourceKind::QualityProfile));
        assert!(pos(ResourceKind::QualityProfile) < pos(ResourceKind::RootFolder));
        assert!(pos(ResourceKind::MetadataProfile) < pos(ResourceKind::RootFolder));
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn test_dialect_serde() {
        let d: Dialect = serde_json::from_str("\"radarr\"").unwrap();
        assert_eq!(d, Dialect::Radarr);
        assert_eq!(serde_json::to_string(&Dialect::Lidarr).unwrap(), "\"lidarr\"");
    }

    #[test]
    fn test_system_status_defaults() {
        let status: SystemStatus =
            serde_json::from_str(r#"{"appName": "Sonarr", "version": "4.0.0"}"#).unwrap();
        assert_eq!(status.app_name, "Sonarr");
        assert!(status.instance_name.is_empty());
    }
}
