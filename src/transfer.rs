use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, LazyLock};
use std::thread;
use std::time::Duration;

use regex::Regex;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::error::RefseqError;

/// Moves one remote file to local disk.
pub trait TransferClient: Send + Sync {
    /// Copies the file named by `locator` into `destination_dir` and returns
    /// the local path. A file absent at the remote end is
    /// [`RefseqError::SourceNotFound`].
    fn fetch(&self, locator: &str, destination_dir: &Path) -> Result<PathBuf, RefseqError>;
}

impl<T: TransferClient + ?Sized> TransferClient for Box<T> {
    fn fetch(&self, locator: &str, destination_dir: &Path) -> Result<PathBuf, RefseqError> {
        (**self).fetch(locator, destination_dir)
    }
}

impl<T: TransferClient + ?Sized> TransferClient for Arc<T> {
    fn fetch(&self, locator: &str, destination_dir: &Path) -> Result<PathBuf, RefseqError> {
        (**self).fetch(locator, destination_dir)
    }
}

/// Last path segment of a locator.
pub fn remote_file_name(locator: &str) -> Result<&str, RefseqError> {
    let name = locator.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    if name.is_empty() || name == "." || name == ".." || name.contains(':') {
        return Err(RefseqError::Transfer(format!(
            "locator has no file name: {locator}"
        )));
    }
    Ok(name)
}

pub fn to_rsync_locator(locator: &str) -> String {
    for scheme in ["ftp://", "https://", "http://"] {
        if let Some(rest) = locator.strip_prefix(scheme) {
            return format!("rsync://{rest}");
        }
    }
    locator.to_string()
}

pub fn to_https_locator(locator: &str) -> String {
    for scheme in ["ftp://", "rsync://"] {
        if let Some(rest) = locator.strip_prefix(scheme) {
            return format!("https://{rest}");
        }
    }
    locator.to_string()
}

#[derive(Debug, Clone)]
pub struct RsyncTransfer {
    program: Option<PathBuf>,
}

impl RsyncTransfer {
    pub fn new() -> Self {
        Self {
            program: find_in_path("rsync"),
        }
    }

    pub fn with_program(program: Option<PathBuf>) -> Self {
        Self { program }
    }

    pub fn is_available(&self) -> bool {
        self.program.is_some()
    }

    fn require_program(&self) -> Result<&Path, RefseqError> {
        self.program
            .as_deref()
            .ok_or_else(|| RefseqError::MissingTool("rsync".to_string()))
    }
}

impl Default for RsyncTransfer {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferClient for RsyncTransfer {
    fn fetch(&self, locator: &str, destination_dir: &Path) -> Result<PathBuf, RefseqError> {
        let program = self.require_program()?;
        let remote = to_rsync_locator(locator);
        let target = destination_dir.join(remote_file_name(locator)?);

        debug!(source = %remote, target = %target.display(), "rsync");
        let output = Command::new(program)
            .args(["--times", "--copy-links", "-q"])
            .arg(&remote)
            .arg(&target)
            .output()
            .map_err(|err| RefseqError::Transfer(format!("spawn {}: {err}", program.display())))?;

        if output.status.success() {
            if target.is_file() {
                return Ok(target);
            }
            return Err(RefseqError::Transfer(format!(
                "rsync reported success but produced no file for {remote}"
            )));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_rsync_failure(output.status.code(), &stderr, &remote))
    }
}

static RSYNC_NOT_FOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)no such file or directory|change_dir .* failed|link_stat .* failed").unwrap()
});

/// Exit code 23 (partial transfer) together with a missing-path message
/// means the remote file does not exist.
pub fn classify_rsync_failure(code: Option<i32>, stderr: &str, remote: &str) -> RefseqError {
    let stderr = stderr.trim();
    if code == Some(23) && RSYNC_NOT_FOUND.is_match(stderr) {
        return RefseqError::SourceNotFound(remote.to_string());
    }
    let status = code
        .map(|code| format!("exit code {code}"))
        .unwrap_or_else(|| "terminated by signal".to_string());
    if stderr.is_empty() {
        RefseqError::Transfer(format!("rsync {remote}: {status}"))
    } else {
        RefseqError::Transfer(format!("rsync {remote}: {status}: {stderr}"))
    }
}

const MAX_ATTEMPTS: u32 = 4;
const RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Clone)]
pub struct HttpTransfer {
    client: Client,
}

impl HttpTransfer {
    pub fn new(timeout: Duration) -> Result<Self, RefseqError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kraken-refseq/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| RefseqError::Transfer(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| RefseqError::Transfer(err.to_string()))?;
        Ok(Self { client })
    }

    /// GETs `url`, retrying throttled, 5xx and connection failures with a
    /// growing delay.
    fn get_with_retries(&self, url: &str) -> Result<Response, RefseqError> {
        let mut attempt: u32 = 1;
        loop {
            let reason = match self.client.get(url).send() {
                Ok(resp) if attempt < MAX_ATTEMPTS && is_retryable_status(resp.status()) => {
                    resp.status().to_string()
                }
                Ok(resp) => return Ok(resp),
                Err(err) if attempt < MAX_ATTEMPTS && is_retryable_error(&err) => err.to_string(),
                Err(err) => return Err(RefseqError::Transfer(format!("{url}: {err}"))),
            };
            debug!(url, attempt, reason = %reason, "retrying http get");
            thread::sleep(RETRY_DELAY * attempt);
            attempt += 1;
        }
    }
}

impl TransferClient for HttpTransfer {
    fn fetch(&self, locator: &str, destination_dir: &Path) -> Result<PathBuf, RefseqError> {
        let url = to_https_locator(locator);
        let target = destination_dir.join(remote_file_name(locator)?);

        debug!(url = %url, target = %target.display(), "http get");
        let mut response = self.get_with_retries(&url)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RefseqError::SourceNotFound(url));
        }
        if !status.is_success() {
            return Err(status_error(&url, status));
        }

        let mut file =
            File::create(&target).map_err(|err| RefseqError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| RefseqError::Transfer(format!("{url}: {err}")))?;
        Ok(target)
    }
}

fn status_error(url: &str, status: StatusCode) -> RefseqError {
    RefseqError::TransferStatus {
        status: status.as_u16(),
        message: format!(
            "{} for {url}",
            status.canonical_reason().unwrap_or("unexpected status")
        ),
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let file_name = format!("{name}{}", std::env::consts::EXE_SUFFIX);
    std::env::split_paths(&std::env::var_os("PATH")?)
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
}
