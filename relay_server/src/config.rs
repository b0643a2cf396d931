//! Relay configuration: loaded from environment variables.

#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// GitHub REST API base URL.
    pub github_api_url: String,
    /// GitHub token for status lookups on private repositories.
    pub github_token: String,
    /// GitHub webhook secret for HMAC validation.
    pub webhook_secret: String,
    /// APNs provider API base URL.
    pub apns_url: String,
    /// APNs provider authentication token.
    pub apns_auth_token: String,
    /// APNs topic (app bundle id).
    pub apns_topic: String,
    /// Upper bound on handling one inbound request.
    pub request_timeout_secs: u64,
    /// Timeout for each outbound GitHub or APNs call.
    pub upstream_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            github_api_url: "https://api.github.com".to_string(),
            github_token: String::new(),
            webhook_secret: String::new(),
            apns_url: "https://api.sandbox.push.apple.com".to_string(),
            apns_auth_token: String::new(),
            apns_topic: String::new(),
            request_timeout_secs: 30,
            upstream_timeout_secs: 10,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let github_api_url =
            std::env::var("RELAY_GITHUB_API_URL").unwrap_or(defaults.github_api_url);
        let github_token = std::env::var("RELAY_GITHUB_TOKEN").unwrap_or_default();
        let webhook_secret = std::env::var("RELAY_WEBHOOK_SECRET").unwrap_or_default();
        let apns_url = std::env::var("RELAY_APNS_URL").unwrap_or(defaults.apns_url);
        let apns_auth_token = std::env::var("RELAY_APNS_TOKEN").unwrap_or_default();
        let apns_topic = std::env::var("RELAY_APNS_TOPIC").unwrap_or_default();
        let request_timeout_secs = std::env::var("RELAY_REQUEST_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.request_timeout_secs);
        let upstream_timeout_secs = std::env::var("RELAY_UPSTREAM_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.upstream_timeout_secs);

        if webhook_secret.is_empty() {
            tracing::warn!("RELAY_WEBHOOK_SECRET not set -- webhook signature validation disabled");
        }
        if github_token.is_empty() {
            tracing::warn!("RELAY_GITHUB_TOKEN not set -- status lookups are unauthenticated");
        }
        if apns_auth_token.is_empty() {
            tracing::warn!("RELAY_APNS_TOKEN not set -- push delivery will fail");
        }

        Self {
            github_api_url,
            github_token,
            webhook_secret,
            apns_url,
            apns_auth_token,
            apns_topic,
            request_timeout_secs,
            upstream_timeout_secs,
        }
    }
}
