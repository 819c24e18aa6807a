use std::time::Duration;

use crate::middleware::route_guard::GuardConfig;
use crate::realtime::{RealtimeSettings, ReconnectPolicy, TransportMode};

pub const DEFAULT_JWT_SECRET: &str = "guidebook-dev-secret";

pub struct Config {
    pub port: u16,
    pub upstream_url: String,
    pub jwt_secret: String,
    pub token_cookie: String,
    pub guard: GuardConfig,
    pub realtime: RealtimeSettings,
}

fn env_millis(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let guard_defaults = GuardConfig::default();
        let rules = match std::env::var("GUIDEBOOK_GUARD_RULES") {
            Ok(raw) => GuardConfig::parse_rules(&raw)
                .unwrap_or_else(|e| panic!("GUIDEBOOK_GUARD_RULES is invalid: {e}")),
            Err(_) => guard_defaults.rules,
        };
        let guard = GuardConfig {
            rules,
            unauthorized_path: std::env::var("GUIDEBOOK_UNAUTHORIZED_PATH")
                .unwrap_or(guard_defaults.unauthorized_path),
        };

        let transport: TransportMode = std::env::var("GUIDEBOOK_REALTIME_TRANSPORT")
            .unwrap_or_else(|_| "websocket".to_string())
            .parse()
            .expect("GUIDEBOOK_REALTIME_TRANSPORT must be \"websocket\"");

        let defaults = ReconnectPolicy::default();
        let reconnect = ReconnectPolicy {
            initial_delay: env_millis("GUIDEBOOK_RECONNECT_INITIAL_MS", defaults.initial_delay),
            max_delay: env_millis("GUIDEBOOK_RECONNECT_MAX_MS", defaults.max_delay),
            max_attempts: std::env::var("GUIDEBOOK_RECONNECT_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok()),
            jitter: std::env::var("GUIDEBOOK_RECONNECT_JITTER")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.jitter),
        };
        if reconnect.initial_delay.is_zero() {
            panic!("GUIDEBOOK_RECONNECT_INITIAL_MS must be greater than 0");
        }
        if reconnect.max_delay < reconnect.initial_delay {
            panic!("GUIDEBOOK_RECONNECT_MAX_MS must not be below GUIDEBOOK_RECONNECT_INITIAL_MS");
        }

        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(39100),
            upstream_url: std::env::var("GUIDEBOOK_UPSTREAM_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string()),
            jwt_secret: std::env::var("GUIDEBOOK_JWT_SECRET")
                .unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string()),
            token_cookie: std::env::var("GUIDEBOOK_TOKEN_COOKIE")
                .unwrap_or_else(|_| "token".to_string()),
            guard,
            realtime: RealtimeSettings {
                endpoint: std::env::var("GUIDEBOOK_REALTIME_URL")
                    .unwrap_or_else(|_| "ws://127.0.0.1:8000/realtime".to_string()),
                transport,
                reconnect,
            },
        }
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}
