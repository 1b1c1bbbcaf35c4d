use std::env;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-pro";

/// Process-wide configuration, read from the environment once at startup and
/// never mutated afterwards.
///
/// The API key and the two URLs are optional at load time: a missing key or
/// form endpoint surfaces as an error on first use of the endpoint that needs
/// it, so the relay can still serve the other route.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Single origin allowed to make credentialed cross-origin requests.
    pub allowed_origin: Option<String>,
    /// Gemini API key; checked on each /api/chat request.
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub gemini_model: String,
    /// Upstream form handler for /api/submit-quote.
    pub form_endpoint: Option<String>,
    pub port: u16,
    /// Upstream connect timeout. Not a whole-request timeout: chat responses
    /// stream for as long as the model keeps producing.
    pub connect_timeout_seconds: u64,
    /// In-memory cap for a multipart submission.
    pub max_upload_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            allowed_origin: None,
            gemini_api_key: None,
            gemini_api_base: DEFAULT_API_BASE.to_string(),
            gemini_model: DEFAULT_MODEL.to_string(),
            form_endpoint: None,
            port: 3000,
            connect_timeout_seconds: 120,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Lets tests exercise the parsing
    /// without mutating process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());

        Self {
            allowed_origin: var("FRONTEND_URL"),
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_api_base: var("GEMINI_API_BASE").unwrap_or(defaults.gemini_api_base),
            gemini_model: var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            form_endpoint: var("WORDPRESS_API_ENDPOINT"),
            port: var("PORT")
                .and_then(|s| s.parse::<u16>().ok())
                .unwrap_or(defaults.port),
            connect_timeout_seconds: var("REQUEST_TIMEOUT_SECONDS")
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(defaults.connect_timeout_seconds),
            max_upload_bytes: var("MAX_UPLOAD_BYTES")
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(defaults.max_upload_bytes),
        }
    }
}
