//! Archive importer - packages shipped as `.tar.gz` files.

use std::io::Cursor;
use std::path::Path;

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use tar::Archive;
use url::Url;

use crate::core::package::{PackageRecord, VcsDefinition, VcsKind};
use crate::sources::importer::{ImportError, Importer};
use crate::util::hash::{checksum_matches, sha256_bytes};

/// File recording which archive a source directory was extracted from.
pub const STAMP_FILE: &str = ".flotilla-archive";

/// Downloads and extracts a tarball into the package source directory.
#[derive(Debug, Clone)]
pub struct ArchiveImporter {
    url: String,
    sha256: Option<String>,
    strip_prefix: Option<String>,
}

impl ArchiveImporter {
    /// Create an importer from a `type = "archive"` definition.
    pub fn from_definition(vcs: &VcsDefinition) -> Result<Self, ImportError> {
        let url = vcs.url.clone().ok_or(ImportError::MissingUrl {
            kind: VcsKind::Archive,
        })?;

        Ok(ArchiveImporter {
            url,
            sha256: vcs.sha256.clone(),
            strip_prefix: vcs.strip_prefix.clone(),
        })
    }

    fn stamp(&self) -> String {
        format!("{}\n{}\n", self.url, self.sha256.as_deref().unwrap_or_default())
    }

    /// Check if `dir` holds an extraction of this exact archive.
    fn is_current(&self, dir: &Path) -> bool {
        std::fs::read_to_string(dir.join(STAMP_FILE))
            .map(|stamp| stamp == self.stamp())
            .unwrap_or(false)
    }

    fn download(&self) -> Result<Vec<u8>, ImportError> {
        if let Ok(url) = Url::parse(&self.url) {
            if url.scheme() == "file" {
                let path = url.to_file_path().map_err(|_| ImportError::Network {
                    url: self.url.clone(),
                    message: "not a valid file path".to_string(),
                })?;
                return Ok(std::fs::read(path)?);
            }
        }

        tracing::info!("downloading {}", self.url);
        let network_error = |message: String| ImportError::Network {
            url: self.url.clone(),
            message,
        };

        let response =
            reqwest::blocking::get(&self.url).map_err(|e| network_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(network_error(format!("HTTP {}", response.status())));
        }
        let bytes = response.bytes().map_err(|e| network_error(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn verify(&self, data: &[u8]) -> Result<(), ImportError> {
        let Some(expected) = &self.sha256 else {
            return Ok(());
        };

        let actual = sha256_bytes(data);
        if !checksum_matches(&actual, expected) {
            return Err(ImportError::ChecksumMismatch {
                url: self.url.clone(),
                expected: expected.clone(),
                actual,
            });
        }
        tracing::debug!("archive hash verified: {}", &actual[..16]);
        Ok(())
    }
}

impl Importer for ArchiveImporter {
    fn kind(&self) -> VcsKind {
        VcsKind::Archive
    }

    fn import(&self, pkg: &PackageRecord, only_local: bool) -> Result<(), ImportError> {
        let dir = pkg.srcdir();
        if dir.exists() && (only_local || self.is_current(dir)) {
            return Ok(());
        }

        let data = self.download()?;
        self.verify(&data)?;

        let parent = dir.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)?;
        let staging = tempfile::Builder::new()
            .prefix(".flotilla-extract")
            .tempdir_in(parent)?;

        extract_tarball(&data, staging.path(), self.strip_prefix.as_deref())
            .with_context(|| format!("failed to extract {}", self.url))?;
        std::fs::write(staging.path().join(STAMP_FILE), self.stamp())?;

        if dir.exists() {
            tracing::info!("replacing {} with a new extraction", dir.display());
            std::fs::remove_dir_all(dir)?;
        }
        std::fs::rename(staging.path(), dir)?;
        Ok(())
    }
}

/// Extract a gzipped tarball into `dest`, dropping a leading `strip_prefix`.
pub fn extract_tarball(data: &[u8], dest: &Path, strip_prefix: Option<&str>) -> Result<()> {
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(data)));
    std::fs::create_dir_all(dest)
        .with_context(|| format!("failed to create directory: {}", dest.display()))?;
    let prefix = strip_prefix.map(|p| format!("{}/", p.trim_end_matches('/')));

    for entry in archive.entries().context("failed to read archive entries")? {
        let mut entry = entry.context("failed to read archive entry")?;
        let entry_path = entry.path().context("failed to get entry path")?;
        let normalized = entry_path.to_string_lossy().replace('\\', "/");

        let relative = match &prefix {
            Some(prefix) => {
                let stripped = normalized.strip_prefix(prefix.as_str()).map(str::to_string);
                match stripped {
                    Some(stripped) => stripped,
                    // The prefix directory itself
                    None if format!("{}/", normalized.trim_end_matches('/')) == *prefix => {
                        continue
                    }
                    None => normalized,
                }
            }
            None => normalized,
        };
        if relative.is_empty() {
            continue;
        }
        if Path::new(&relative)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir | std::path::Component::RootDir))
        {
            bail!("archive entry escapes destination directory: {}", relative);
        }

        let output_path = dest.join(&relative);
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        match entry.header().entry_type() {
            tar::EntryType::Directory => {
                std::fs::create_dir_all(&output_path).with_context(|| {
                    format!("failed to create directory: {}", output_path.display())
                })?;
            }
            tar::EntryType::Regular | tar::EntryType::Continuous => {
                entry.unpack(&output_path).with_context(|| {
                    format!("failed to extract file: {}", output_path.display())
                })?;
            }
            #[cfg(unix)]
            tar::EntryType::Symlink => {
                if let Some(target) = entry.link_name().context("invalid symlink entry")? {
                    std::os::unix::fs::symlink(target.as_ref(), &output_path).with_context(
                        || format!("failed to create symlink: {}", output_path.display()),
                    )?;
                }
            }
            other => {
                tracing::debug!("skipping {:?} entry {}", other, relative);
            }
        }
    }

    Ok(())
}
