use std::sync::Arc;

use crate::config::Config;
use crate::middleware::auth::TokenVerifier;
use crate::middleware::route_guard::GuardConfig;

#[derive(Clone)]
pub struct AppState {
    pub http: reqwest::Client,
    pub upstream_url: String,
    pub verifier: TokenVerifier,
    pub token_cookie: String,
    pub guard: Arc<GuardConfig>,
}

/// Redirects from the page renderer go back to the browser as-is.
fn upstream_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("failed to build upstream HTTP client")
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            http: upstream_client(),
            upstream_url: config.upstream_url.trim_end_matches('/').to_string(),
            verifier: TokenVerifier::new(&config.jwt_secret),
            token_cookie: config.token_cookie.clone(),
            guard: Arc::new(config.guard.clone()),
        }
    }
}
