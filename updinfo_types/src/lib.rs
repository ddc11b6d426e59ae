//! Update information embedded in AppImages.
//!
//! An AppImage author describes where updates can be fetched from with a short
//! `|`-delimited string, e.g.
//! `gh-releases-zsync|owner|repo|latest|app-*-x86_64.AppImage.zsync`.
//! This crate validates such strings and turns them into [`UpdateInformation`].

mod de;
mod error;
mod grammar;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

pub use error::{ParseError, SegmentError, ValidationError};
pub use grammar::{parse, validate};

/// Field separator of the update information grammar.
pub const SEPARATOR: char = '|';

/// Suffix every zsync file url or filename pattern has to end with.
pub const ZSYNC_SUFFIX: &str = ".zsync";

/// Release name that selects the most recent non-prerelease release.
pub const LATEST_RELEASE: &str = "latest";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportMechanism {
    #[serde(rename = "zsync")]
    Zsync,
    #[serde(rename = "gh-releases-zsync")]
    GhReleasesZsync,
    #[serde(rename = "bintray-zsync")]
    BintrayZsync,
}

impl TransportMechanism {
    pub const ALL: [TransportMechanism; 3] = [
        TransportMechanism::Zsync,
        TransportMechanism::GhReleasesZsync,
        TransportMechanism::BintrayZsync,
    ];

    pub fn token(self) -> &'static str {
        match self {
            TransportMechanism::Zsync => "zsync",
            TransportMechanism::GhReleasesZsync => "gh-releases-zsync",
            TransportMechanism::BintrayZsync => "bintray-zsync",
        }
    }

    /// Looks `token` up among the known mechanisms, stopping at the first match.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tm| tm.token() == token)
    }

    /// Number of `|`-separated fields the mechanism needs, token included.
    pub fn required_fields(self) -> usize {
        match self {
            TransportMechanism::Zsync => 2,
            TransportMechanism::GhReleasesZsync | TransportMechanism::BintrayZsync => 5,
        }
    }
}

impl fmt::Display for TransportMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Parsed update information, one variant per transport mechanism.
///
/// Deserializing goes through [`parse`], so a deserialized record always
/// renders back to a valid update information string.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "transport")]
pub enum UpdateInformation {
    #[serde(rename = "zsync")]
    ZsyncDirect { file_url: String },
    #[serde(rename = "gh-releases-zsync")]
    GithubReleasesZsync {
        owner: String,
        repo: String,
        /// `latest` or an explicit release name; `*` is a wildcard.
        release_name: String,
        zsync_filename_pattern: String,
    },
    #[serde(rename = "bintray-zsync")]
    BintrayZsync {
        owner: String,
        repo: String,
        package_name: String,
        zsync_filename_pattern: String,
    },
}

impl UpdateInformation {
    pub fn transport(&self) -> TransportMechanism {
        match self {
            UpdateInformation::ZsyncDirect { .. } => TransportMechanism::Zsync,
            UpdateInformation::GithubReleasesZsync { .. } => TransportMechanism::GhReleasesZsync,
            UpdateInformation::BintrayZsync { .. } => TransportMechanism::BintrayZsync,
        }
    }

    /// The direct url or the filename pattern of the `.zsync` file.
    pub fn zsync_target(&self) -> &str {
        match self {
            UpdateInformation::ZsyncDirect { file_url } => file_url,
            UpdateInformation::GithubReleasesZsync { zsync_filename_pattern, .. }
            | UpdateInformation::BintrayZsync { zsync_filename_pattern, .. } => {
                zsync_filename_pattern
            }
        }
    }

    /// True for GitHub releases pinned to `latest`.
    ///
    /// Prereleases never count as the latest release; channels that only
    /// publish prereleases (e.g. `continuous`) have to be named explicitly.
    pub fn tracks_latest_release(&self) -> bool {
        matches!(
            self,
            UpdateInformation::GithubReleasesZsync { release_name, .. } if release_name == LATEST_RELEASE
        )
    }
}

/// Renders the canonical update information string.
impl fmt::Display for UpdateInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tm = self.transport();
        match self {
            UpdateInformation::ZsyncDirect { file_url } => write!(f, "{tm}|{file_url}"),
            UpdateInformation::GithubReleasesZsync {
                owner,
                repo,
                release_name,
                zsync_filename_pattern,
            } => write!(f, "{tm}|{owner}|{repo}|{release_name}|{zsync_filename_pattern}"),
            UpdateInformation::BintrayZsync {
                owner,
                repo,
                package_name,
                zsync_filename_pattern,
            } => write!(f, "{tm}|{owner}|{repo}|{package_name}|{zsync_filename_pattern}"),
        }
    }
}

impl FromStr for UpdateInformation {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}
