//! # Transport
//!
//! The mirroring engine never talks to the network directly. It asks a
//! [`Connection`] to retrieve one remote file to one local path, and the
//! connection owns the transfer details: schemes, partial files, retries.
//!
//! [`DefaultConnection`] handles local paths and `file://` URLs with a
//! filesystem copy and `http(s)://` URLs with a blocking `reqwest` client.
//! Transfers are written to a `.part` sibling and renamed into place, so an
//! interrupted transfer never leaves a truncated package behind. When the
//! destination already exists with exactly the expected size the transfer
//! is skipped and `0` bytes are reported.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::model::local_path;

/// Retrieves remote files to local paths
pub trait Connection: Send + Sync {
    /// Copies `src_url` to `dst_path` and returns the number of bytes
    /// transferred.
    ///
    /// `size_hint` is the expected size of the file, when known.
    fn retrieve(&self, src_url: &str, dst_path: &Path, size_hint: Option<u64>) -> Result<u64>;
}

/// Default transport for local and HTTP sources
pub struct DefaultConnection {
    client: reqwest::blocking::Client,
    retries: u32,
}

impl DefaultConnection {
    /// Default number of additional attempts after a failed transfer.
    pub const DEFAULT_RETRIES: u32 = 3;

    pub fn new(retries: u32) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("package-mirror/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, retries })
    }

    fn transfer_once(&self, src_url: &str, part_path: &Path) -> Result<u64> {
        let mut output = File::create(part_path)?;
        match local_path(src_url) {
            Some(src_path) => {
                let mut input = File::open(&src_path).map_err(|e| Error::Transport {
                    url: src_url.to_string(),
                    message: e.to_string(),
                })?;
                Ok(io::copy(&mut input, &mut output)?)
            }
            None => {
                let mut response = self
                    .client
                    .get(src_url)
                    .send()
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| Error::Transport {
                        url: src_url.to_string(),
                        message: e.to_string(),
                    })?;
                response.copy_to(&mut output).map_err(|e| Error::Transport {
                    url: src_url.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}

impl Connection for DefaultConnection {
    fn retrieve(&self, src_url: &str, dst_path: &Path, size_hint: Option<u64>) -> Result<u64> {
        if let Some(expected) = size_hint {
            if fs::metadata(dst_path).is_ok_and(|m| m.is_file() && m.len() == expected) {
                debug!("{} is up to date, skipping", dst_path.display());
                return Ok(0);
            }
        }

        if let Some(parent) = dst_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let part_path = part_path(dst_path);

        let mut attempt = 0;
        loop {
            match self.transfer_once(src_url, &part_path) {
                Ok(bytes) => {
                    if let Some(expected) = size_hint {
                        if bytes != expected {
                            warn!(
                                "size mismatch for {}: expected {} bytes, got {}",
                                src_url, expected, bytes
                            );
                        }
                    }
                    fs::rename(&part_path, dst_path)?;
                    debug!("retrieved {} ({} bytes)", src_url, bytes);
                    return Ok(bytes);
                }
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        "retrieving {} failed ({}), retry {}/{}",
                        src_url, e, attempt, self.retries
                    );
                }
                Err(e) => {
                    let _ = fs::remove_file(&part_path);
                    return Err(e);
                }
            }
        }
    }
}

fn part_path(dst_path: &Path) -> PathBuf {
    let mut name = dst_path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dst_path.with_file_name(name)
}
