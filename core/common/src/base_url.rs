//! Base URL handling shared by the HTTP clients.

use url::Url;

use crate::{Error, Result};

/// Parse a base URL and make sure relative joins stay below it.
///
/// # Errors
/// - `InvalidInput` if `base_url` is not an absolute URL
pub fn normalize_base_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| Error::InvalidInput(format!("Invalid base URL '{}': {}", base_url, e)))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_slash() {
        let url = normalize_base_url("https://example.com/server").unwrap();
        assert_eq!(url.as_str(), "https://example.com/server/");

        let url = normalize_base_url("https://example.com/server/").unwrap();
        assert_eq!(url.as_str(), "https://example.com/server/");
    }

    #[test]
    fn test_invalid_base_rejected() {
        assert!(matches!(
            normalize_base_url("not a url"),
            Err(Error::InvalidInput(_))
        ));
    }
}
