//! Image URL validation.
//!
//! Used before attaching externally hosted artwork to a catalog entry. The
//! check issues a real request for the image; there is no retry, so a flaky
//! network looks the same as a broken URL.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use url::Url;

/// How long the image gets to load.
pub const IMAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Known image file extensions. Informational only.
pub const IMAGE_EXTENSIONS: [&str; 13] = [
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp", ".svg", ".ico", ".tiff", ".tif", ".avif",
    ".heic", ".heif",
];

/// Error for a string that is not an http(s) URL.
pub const INVALID_URL_ERROR: &str = "invalid URL";

/// Error for a URL that did not load as an image.
pub const LOAD_FAILED_ERROR: &str = "image could not be loaded from this URL";

/// Outcome of [`ImageValidator::validate_complete_image_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageValidation {
    pub is_valid: bool,
    pub has_valid_format: bool,
    pub has_image_extension: bool,
    pub can_load: bool,
    pub error: Option<String>,
}

/// Whether `raw` parses as an http or https URL.
#[must_use]
pub fn has_valid_format(raw: &str) -> bool {
    parse_http_url(raw).is_some()
}

/// Whether `raw` mentions a known image extension anywhere.
#[must_use]
pub fn has_image_extension(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.contains(ext))
}

fn parse_http_url(raw: &str) -> Option<Url> {
    Url::parse(raw.trim())
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// Checks that a URL points at a loadable image.
#[derive(Clone)]
pub struct ImageValidator {
    client: reqwest::Client,
}

impl ImageValidator {
    /// Validator with the standard load timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(IMAGE_LOAD_TIMEOUT)
    }

    /// Validator with a custom load timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    /// Check format, extension and loadability of `raw`.
    ///
    /// An invalid format short-circuits: no request is made.
    #[tracing::instrument(skip(self))]
    pub async fn validate_complete_image_url(&self, raw: &str) -> ImageValidation {
        let has_image_extension = has_image_extension(raw);
        let Some(url) = parse_http_url(raw) else {
            return ImageValidation {
                is_valid: false,
                has_valid_format: false,
                has_image_extension,
                can_load: false,
                error: Some(INVALID_URL_ERROR.to_string()),
            };
        };

        let can_load = self.can_load(url).await;
        ImageValidation {
            is_valid: can_load,
            has_valid_format: true,
            has_image_extension,
            can_load,
            error: (!can_load).then(|| LOAD_FAILED_ERROR.to_string()),
        }
    }

    async fn can_load(&self, mut url: Url) -> bool {
        // Cache-busting parameter so a stale cached copy cannot pass.
        let millis = chrono::Utc::now().timestamp_millis();
        url.query_pairs_mut().append_pair("_test", &millis.to_string());

        match self.client.get(url).send().await {
            Ok(response) => {
                let is_image = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|ct| ct.trim().to_lowercase().starts_with("image/"));
                let ok = response.status().is_success() && is_image;
                if !ok {
                    tracing::debug!(status = %response.status(), is_image, "Image did not load");
                }
                ok
            }
            Err(e) => {
                tracing::debug!(error = %e, "Image request failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn test_format_and_extension() {
        assert!(has_valid_format("https://cdn.test/a.png"));
        assert!(has_valid_format("http://cdn.test/a"));
        assert!(!has_valid_format("ftp://cdn.test/a.png"));
        assert!(!has_valid_format("not-a-url"));
        assert!(has_image_extension("https://cdn.test/A.PNG?w=200"));
        assert!(!has_image_extension("https://cdn.test/a"));
    }

    #[tokio::test]
    async fn test_invalid_url_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = ImageValidator::new()
            .unwrap()
            .validate_complete_image_url("not-a-url")
            .await;
        assert!(!result.is_valid);
        assert!(!result.has_valid_format);
        assert!(!result.can_load);
        assert_eq!(result.error.as_deref(), Some(INVALID_URL_ERROR));
    }

    #[tokio::test]
    async fn test_loadable_image_is_valid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/covers/rally.png"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/covers/rally.png", server.uri());
        let result = ImageValidator::new()
            .unwrap()
            .validate_complete_image_url(&url)
            .await;
        assert!(result.is_valid);
        assert!(result.has_image_extension);
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn test_non_image_response_cannot_load() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page.png"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone.png"))
            .respond_with(ResponseTemplate::new(404).insert_header("content-type", "image/png"))
            .mount(&server)
            .await;

        let validator = ImageValidator::new().unwrap();
        for name in ["page.png", "gone.png"] {
            let result = validator
                .validate_complete_image_url(&format!("{}/{name}", server.uri()))
                .await;
            assert!(result.has_valid_format);
            assert!(!result.can_load);
            assert!(!result.is_valid);
            assert_eq!(result.error.as_deref(), Some(LOAD_FAILED_ERROR));
        }
    }
}
