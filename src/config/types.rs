use serde::Deserialize;
use std::time::Duration;

/// Marker strings that identify a bot-challenge interstitial instead of real content.
///
/// Matched case-insensitively against the light-fetch body.
pub const DEFAULT_BLOCK_MARKERS: &[&str] = &[
    "just a moment...",
    "checking your browser",
    "cf-browser-verification",
    "cf_chl_opt",
    "attention required! | cloudflare",
    "enable javascript and cookies to continue",
    "please verify you are a human",
    "captcha-delivery",
    "used cloudflare to restrict access",
];

/// Main configuration structure for Faculty-Harvest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub harvester: HarvesterConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(rename = "block-detection", default)]
    pub block_detection: BlockDetectionConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(rename = "source", default)]
    pub sources: Vec<SourceEntry>,
}

/// Concurrency and timeout settings for the two fetch tiers
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    /// Maximum number of concurrent plain HTTP fetches
    #[serde(rename = "light-concurrency")]
    pub light_concurrency: u32,

    /// Maximum number of concurrent browser contexts
    #[serde(rename = "heavy-concurrency")]
    pub heavy_concurrency: u32,

    /// Timeout for a single plain HTTP fetch (seconds)
    #[serde(rename = "light-timeout-secs")]
    pub light_timeout_secs: u64,

    /// Navigation timeout for a browser fetch (seconds)
    #[serde(rename = "heavy-timeout-secs")]
    pub heavy_timeout_secs: u64,

    /// How long a browser fetch waits for its readiness selector (seconds)
    #[serde(rename = "readiness-timeout-secs")]
    pub readiness_timeout_secs: u64,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            light_concurrency: 10,
            heavy_concurrency: 3,
            light_timeout_secs: 10,
            heavy_timeout_secs: 60,
            readiness_timeout_secs: 15,
        }
    }
}

impl HarvesterConfig {
    pub fn light_timeout(&self) -> Duration {
        Duration::from_secs(self.light_timeout_secs)
    }

    pub fn heavy_timeout(&self) -> Duration {
        Duration::from_secs(self.heavy_timeout_secs)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }
}

/// User agent sent by the light fetch tier
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    pub value: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            value: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                    AppleWebKit/537.36 (KHTML, like Gecko) \
                    Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

/// Headless browser launch options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run the browser without a visible window
    pub headless: bool,

    /// Path to a Chrome/Chromium executable (auto-detected when absent)
    pub executable: Option<String>,

    /// Disable the Chrome sandbox (needed in some containers)
    #[serde(rename = "no-sandbox")]
    pub no_sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            no_sandbox: false,
        }
    }
}

/// Block-detection marker list
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlockDetectionConfig {
    pub markers: Vec<String>,
}

impl Default for BlockDetectionConfig {
    fn default() -> Self {
        Self {
            markers: DEFAULT_BLOCK_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./faculty.sqlite".to_string(),
        }
    }
}

/// One directory site to harvest
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    /// Registry identifier (e.g., "psychology")
    pub id: String,

    /// Whether the source is harvested by default
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Override for the site's base URL
    #[serde(rename = "base-url", default)]
    pub base_url: Option<String>,

    /// CSS selector a rendered profile page must contain before extraction
    #[serde(rename = "readiness-selector", default)]
    pub readiness_selector: Option<String>,
}

fn default_true() -> bool {
    true
}
