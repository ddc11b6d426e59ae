use serde::{Deserialize, Deserializer};

use crate::{ParseError, SEPARATOR, UpdateInformation, parse};

/// Wire shape of [`UpdateInformation`], checked against the grammar before use.
#[derive(Deserialize)]
#[serde(tag = "transport")]
enum Tagged {
    #[serde(rename = "zsync")]
    ZsyncDirect { file_url: String },
    #[serde(rename = "gh-releases-zsync")]
    GithubReleasesZsync {
        owner: String,
        repo: String,
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

impl TryFrom<Tagged> for UpdateInformation {
    type Error = ParseError;

    fn try_from(tagged: Tagged) -> Result<Self, Self::Error> {
        let (info, fields) = match tagged {
            Tagged::ZsyncDirect { file_url } => {
                let fields = vec![file_url.clone()];
                (UpdateInformation::ZsyncDirect { file_url }, fields)
            }
            Tagged::GithubReleasesZsync {
                owner,
                repo,
                release_name,
                zsync_filename_pattern,
            } => {
                let fields = vec![
                    owner.clone(),
                    repo.clone(),
                    release_name.clone(),
                    zsync_filename_pattern.clone(),
                ];
                let info = UpdateInformation::GithubReleasesZsync {
                    owner,
                    repo,
                    release_name,
                    zsync_filename_pattern,
                };
                (info, fields)
            }
            Tagged::BintrayZsync {
                owner,
                repo,
                package_name,
                zsync_filename_pattern,
            } => {
                let fields = vec![
                    owner.clone(),
                    repo.clone(),
                    package_name.clone(),
                    zsync_filename_pattern.clone(),
                ];
                let info = UpdateInformation::BintrayZsync {
                    owner,
                    repo,
                    package_name,
                    zsync_filename_pattern,
                };
                (info, fields)
            }
        };

        if let Some(field) = fields.into_iter().find(|f| f.contains(SEPARATOR)) {
            return Err(ParseError::SeparatorInField(field));
        }
        parse(&info.to_string())
    }
}

impl<'de> Deserialize<'de> for UpdateInformation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tagged = Tagged::deserialize(deserializer)?;
        UpdateInformation::try_from(tagged).map_err(serde::de::Error::custom)
    }
}
