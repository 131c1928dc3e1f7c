//! Cover art downloads.

use std::fs;
use std::io::Read;
use std::path::Path;

use log::debug;

use crate::error::ArtworkError;

/// Upper bound on a downloaded cover image.
const MAX_COVER_BYTES: u64 = 20 * 1024 * 1024;

/// Fetch the image at `url` into memory.
pub fn fetch_cover(agent: &ureq::Agent, url: &str) -> Result<Vec<u8>, ArtworkError> {
    debug!("Fetching cover art from {}", url);
    let response = agent.get(url).call()?;

    let mut data = Vec::new();
    response
        .into_reader()
        .take(MAX_COVER_BYTES)
        .read_to_end(&mut data)?;

    if data.is_empty() {
        return Err(ArtworkError::Empty);
    }
    Ok(data)
}

/// Fetch the image at `url` and store it at `dest`, replacing any previous file.
pub fn download_cover(agent: &ureq::Agent, url: &str, dest: &Path) -> Result<(), ArtworkError> {
    let data = fetch_cover(agent, url)?;
    fs::write(dest, data)?;
    debug!("Cover art saved as {}", dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn agent() -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(2))
            .build()
    }

    #[test]
    fn test_unreachable_host_is_error() {
        // Port 9 (discard) is closed on loopback in test environments
        let result = fetch_cover(&agent(), "http://127.0.0.1:9/cover.jpg");
        assert!(matches!(result, Err(ArtworkError::Http(_))));
    }

    #[test]
    fn test_failed_download_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("album-cover.png");
        assert!(download_cover(&agent(), "not a url", &dest).is_err());
        assert!(!dest.exists());
    }
}
