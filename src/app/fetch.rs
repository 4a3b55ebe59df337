use std::fs;
use std::io::copy;
use std::path::Path;

use retry::{delay::Fixed, retry, OperationResult};
use tracing::{debug, warn};

use crate::app::error::ProvisionError;

pub trait Fetcher {
    /// Downloads `url` into `destination`, replacing any existing file.
    fn download(&self, url: &str, destination: &Path) -> Result<(), ProvisionError>;
}

pub struct HttpFetcher {
    attempts: usize,
    retry_delay_ms: u64,
}

impl HttpFetcher {
    pub fn new(attempts: usize, retry_delay_ms: u64) -> Self {
        Self {
            attempts: attempts.max(1),
            retry_delay_ms,
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(3, 2000)
    }
}

impl Fetcher for HttpFetcher {
    fn download(&self, url: &str, destination: &Path) -> Result<(), ProvisionError> {
        debug!(url, destination = %destination.display(), "downloading");

        // `take` counts retries after the first try.
        let result = retry(
            Fixed::from_millis(self.retry_delay_ms).take(self.attempts - 1),
            || match ureq::get(url).call() {
                Ok(response) => OperationResult::Ok(response),
                Err(ureq::Error::StatusCode(code)) if code == 429 || code >= 500 => {
                    warn!(url, status = code, "download failed, retrying");
                    OperationResult::Retry(format!("HTTP {code}"))
                }
                Err(ureq::Error::StatusCode(code)) => OperationResult::Err(format!("HTTP {code}")),
                Err(err) => {
                    warn!(url, error = %err, "download failed, retrying");
                    OperationResult::Retry(err.to_string())
                }
            },
        );
        let mut response = result
            .map_err(|err| ProvisionError::io(format!("Download failed: {url}: {}", err.error)))?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| ProvisionError::io(format!("Failed to create {}: {err}", parent.display())))?;
        }
        let mut file = fs::File::create(destination).map_err(|err| {
            ProvisionError::io(format!("Failed to create {}: {err}", destination.display()))
        })?;
        copy(&mut response.body_mut().as_reader(), &mut file)
            .map_err(|err| ProvisionError::io(format!("Download failed: {url}: {err}")))?;
        Ok(())
    }
}

pub fn unzip(archive: &Path, destination: &Path) -> Result<(), ProvisionError> {
    let file = fs::File::open(archive)
        .map_err(|err| ProvisionError::io(format!("Failed to open zip {}: {err}", archive.display())))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|err| ProvisionError::io(format!("Failed to open zip {}: {err}", archive.display())))?;
    fs::create_dir_all(destination).map_err(|err| {
        ProvisionError::io(format!("Failed to create {}: {err}", destination.display()))
    })?;
    zip.extract(destination)
        .map_err(|err| ProvisionError::io(format!("Failed to extract {}: {err}", archive.display())))
}
