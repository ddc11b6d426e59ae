use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use path_slash::PathExt as _;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};
use updinfo_elf::{ExtractError, ReadError};
use updinfo_types::UpdateInformation;
use walkdir::WalkDir;

#[derive(Serialize, Debug)]
pub struct ScanEntry {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_information: Option<UpdateInformation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl fmt::Display for ScanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.update_information, &self.error) {
            (Some(info), _) => write!(f, "{}\t{info}", self.path),
            (None, Some(err)) => write!(f, "{}\terror: {err}", self.path),
            (None, None) => write!(f, "{}\t-", self.path),
        }
    }
}

/// Reads the update information of every regular file below `dir`.
///
/// Files that are not ELF binaries are left out unless `include_all` is set.
/// Entries come back sorted by path.
pub fn scan_dir(dir: &Path, include_all: bool, progress: bool) -> Result<Vec<ScanEntry>> {
    let files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                warn!("skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    debug!(dir = %dir.display(), files = files.len(), "scanning");

    let pb = if progress {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
                .progress_chars("##-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut entries = files
        .par_iter()
        .map(|path| {
            let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
            let rel_str = rel
                .to_slash()
                .with_context(|| format!("Non UTF-8 path {}", path.display()))?
                .into_owned();
            pb.set_message(rel_str.clone());

            let entry = match updinfo_elf::read_and_parse(path) {
                Ok(info) => Some(ScanEntry {
                    path: rel_str,
                    update_information: Some(info),
                    error: None,
                }),
                Err(ReadError::Extract(e)) if e.is_not_elf() && !include_all => None,
                Err(ReadError::Extract(ExtractError::NotAnElfFile { .. })) => Some(ScanEntry {
                    path: rel_str,
                    update_information: None,
                    error: None,
                }),
                Err(e) => {
                    debug!(path = %path.display(), "no usable update information: {e}");
                    Some(ScanEntry {
                        path: rel_str,
                        update_information: None,
                        error: Some(e.to_string()),
                    })
                }
            };
            pb.inc(1);
            Ok::<_, anyhow::Error>(entry)
        })
        .filter_map(|r| r.transpose())
        .collect::<Result<Vec<_>>>()?;

    pb.finish_and_clear();
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}
