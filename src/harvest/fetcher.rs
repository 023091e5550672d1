//! Light-tier HTTP fetcher
//!
//! This module handles the plain HTTP side of a fetch:
//! - Building the shared HTTP client with a browser-like user agent
//! - GET requests with a per-request timeout
//! - Classifying the response as usable, blocked, or a transport failure
//!
//! Escalation to the browser tier is decided by the caller from the
//! [`LightOutcome`] returned here.

use crate::config::UserAgentConfig;
use reqwest::Client;
use std::fmt;
use std::time::Duration;

/// Result of a light fetch attempt
#[derive(Debug)]
pub enum LightOutcome {
    /// The page came back with a 2xx status and no challenge markers
    Success {
        /// Final URL after redirects
        final_url: String,
        /// Page body content
        body: String,
    },

    /// The body looks like a bot-challenge interstitial
    Blocked {
        /// HTTP status code of the challenge response
        status_code: u16,
        /// The marker that matched
        marker: String,
    },

    /// Timeout, connection failure, non-2xx status, or unreadable body
    TransportError {
        /// Error description
        error: String,
        /// HTTP status code, when a response was received
        status_code: Option<u16>,
    },
}

impl LightOutcome {
    /// True when the browser tier should be tried for this URL
    pub fn should_escalate(&self) -> bool {
        !matches!(self, Self::Success { .. })
    }
}

impl fmt::Display for LightOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { final_url, .. } => write!(f, "fetched {}", final_url),
            Self::Blocked {
                status_code,
                marker,
            } => write!(f, "blocked (HTTP {}, marker {:?})", status_code, marker),
            Self::TransportError {
                error,
                status_code: Some(code),
            } => write!(f, "HTTP {}: {}", code, error),
            Self::TransportError { error, .. } => write!(f, "{}", error),
        }
    }
}

/// Decides whether a response body is a bot-challenge page
pub trait BlockDetector: Send + Sync {
    /// Returns the matched marker when `body` is a challenge page
    fn detect(&self, body: &str) -> Option<String>;
}

/// Case-insensitive substring match against a marker list
#[derive(Debug, Clone)]
pub struct MarkerBlockDetector {
    markers: Vec<String>,
}

impl MarkerBlockDetector {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }
}

impl Default for MarkerBlockDetector {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_BLOCK_MARKERS)
    }
}

impl BlockDetector for MarkerBlockDetector {
    fn detect(&self, body: &str) -> Option<String> {
        let lowered = body.to_lowercase();
        self.markers
            .iter()
            .find(|marker| lowered.contains(marker.as_str()))
            .cloned()
    }
}

/// Builds the HTTP client shared by every light fetch of a run
///
/// The client is stateless apart from its connection pool and is safe to use
/// from many tasks at once.
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.value.clone())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches `url` over plain HTTP and classifies the response
///
/// | Condition | Outcome |
/// |-----------|---------|
/// | Timeout / connect error | TransportError |
/// | Non-2xx status without challenge markers | TransportError |
/// | Any status with a challenge marker in the body | Blocked |
/// | 2xx and clean body | Success |
///
/// Challenge pages are commonly served as 200 or 403, so the body is checked
/// before the status.
pub async fn fetch_light(
    client: &Client,
    url: &str,
    timeout: Duration,
    detector: &dyn BlockDetector,
) -> LightOutcome {
    let response = match client.get(url).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => {
            let error = if e.is_timeout() {
                format!("Request timeout after {:?}", timeout)
            } else if e.is_connect() {
                "Connection refused".to_string()
            } else {
                e.to_string()
            };
            return LightOutcome::TransportError {
                error,
                status_code: None,
            };
        }
    };

    let status = response.status();
    let final_url = response.url().to_string();

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            return LightOutcome::TransportError {
                error: format!("Failed to read body: {}", e),
                status_code: Some(status.as_u16()),
            }
        }
    };

    if let Some(marker) = detector.detect(&body) {
        return LightOutcome::Blocked {
            status_code: status.as_u16(),
            marker,
        };
    }

    if !status.is_success() {
        return LightOutcome::TransportError {
            error: status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string(),
            status_code: Some(status.as_u16()),
        };
    }

    LightOutcome::Success { final_url, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client() -> Client {
        build_http_client(&UserAgentConfig::default()).unwrap()
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&UserAgentConfig::default()).is_ok());
    }

    #[test]
    fn test_marker_detection_is_case_insensitive() {
        let detector = MarkerBlockDetector::new(["Just a moment"]);
        assert_eq!(
            detector.detect("<title>JUST A MOMENT...</title>"),
            Some("just a moment".to_string())
        );
        assert_eq!(detector.detect("<h1>Jane Doe</h1>"), None);
    }

    #[test]
    fn test_blank_markers_are_ignored() {
        let detector = MarkerBlockDetector::new(["", "   "]);
        assert_eq!(detector.detect("anything at all"), None);
    }

    #[test]
    fn test_default_detector_flags_cloudflare_challenge() {
        let detector = MarkerBlockDetector::default();
        let body = r#"<html><head><title>Just a moment...</title></head>
            <body><script>window._cf_chl_opt = {};</script></body></html>"#;
        assert!(detector.detect(body).is_some());
    }

    #[test]
    fn test_default_detector_ignores_ordinary_prose() {
        let detector = MarkerBlockDetector::default();
        let body = r#"<html><body><h1>Jane Doe</h1>
            <p>Studies how access denied to public records shapes local politics.</p>
            </body></html>"#;
        assert_eq!(detector.detect(body), None);
    }

    #[test]
    fn test_default_detector_flags_cloudflare_block_page() {
        let detector = MarkerBlockDetector::default();
        let body = "<title>Access denied | faculty.example.edu used Cloudflare to restrict access</title>";
        assert_eq!(
            detector.detect(body),
            Some("used cloudflare to restrict access".to_string())
        );
    }

    #[test]
    fn test_should_escalate() {
        let ok = LightOutcome::Success {
            final_url: "https://a/x".to_string(),
            body: String::new(),
        };
        let blocked = LightOutcome::Blocked {
            status_code: 403,
            marker: "captcha".to_string(),
        };
        let failed = LightOutcome::TransportError {
            error: "timeout".to_string(),
            status_code: None,
        };
        assert!(!ok.should_escalate());
        assert!(blocked.should_escalate());
        assert!(failed.should_escalate());
    }

    #[tokio::test]
    async fn test_fetch_light_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/people/jane"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Jane</h1>"))
            .mount(&server)
            .await;

        let outcome = fetch_light(
            &test_client(),
            &format!("{}/people/jane", server.uri()),
            Duration::from_secs(5),
            &MarkerBlockDetector::default(),
        )
        .await;

        match outcome {
            LightOutcome::Success { body, .. } => assert_eq!(body, "<h1>Jane</h1>"),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_light_challenge_page_is_blocked() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_string("<title>Attention Required! | Cloudflare</title>"),
            )
            .mount(&server)
            .await;

        let outcome = fetch_light(
            &test_client(),
            &server.uri(),
            Duration::from_secs(5),
            &MarkerBlockDetector::default(),
        )
        .await;

        assert!(matches!(
            outcome,
            LightOutcome::Blocked {
                status_code: 403,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_fetch_light_server_error_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let outcome = fetch_light(
            &test_client(),
            &server.uri(),
            Duration::from_secs(5),
            &MarkerBlockDetector::default(),
        )
        .await;

        assert!(matches!(
            outcome,
            LightOutcome::TransportError {
                status_code: Some(503),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_fetch_light_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("slow")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let outcome = fetch_light(
            &test_client(),
            &server.uri(),
            Duration::from_millis(200),
            &MarkerBlockDetector::default(),
        )
        .await;

        assert!(matches!(
            outcome,
            LightOutcome::TransportError {
                status_code: None,
                ..
            }
        ));
    }
}
