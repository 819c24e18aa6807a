use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use super::auth::resolve_identity;
use crate::models::identity::{Identity, Role};
use crate::state::AppState;

/// One guarded area of the site.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardRule {
    pub prefix: String,
    pub role: Role,
    pub login_path: String,
}

impl GuardRule {
    pub fn new(prefix: &str, role: Role, login_path: &str) -> Self {
        Self {
            prefix: normalize(prefix),
            role,
            login_path: login_path.to_string(),
        }
    }

    /// Segment-aware: `/user` covers `/user` and `/user/...`, not `/users`.
    fn covers(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return true;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

fn normalize(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardConfig {
    pub rules: Vec<GuardRule>,
    pub unauthorized_path: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                GuardRule::new("/user", Role::User, "/login"),
                GuardRule::new("/guide", Role::Guide, "/guide/login"),
            ],
            unauthorized_path: "/unauthorized".to_string(),
        }
    }
}

impl GuardConfig {
    /// Parse `prefix=role:login_path` entries separated by commas,
    /// e.g. `/user=user:/login,/guide=guide:/guide/login`.
    pub fn parse_rules(raw: &str) -> Result<Vec<GuardRule>, String> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (prefix, rest) = entry
                    .split_once('=')
                    .ok_or_else(|| format!("guard rule {entry:?} is missing '='"))?;
                let (role, login) = rest
                    .split_once(':')
                    .ok_or_else(|| format!("guard rule {entry:?} is missing ':'"))?;
                let role: Role = role.parse()?;
                let login = login.trim();
                if !login.starts_with('/') {
                    return Err(format!("guard rule {entry:?} login path must start with '/'"));
                }
                Ok(GuardRule::new(prefix, role, login))
            })
            .collect()
    }

    /// Longest matching prefix wins.
    fn rule_for(&self, path: &str) -> Option<&GuardRule> {
        self.rules
            .iter()
            .filter(|rule| rule.covers(path))
            .max_by_key(|rule| rule.prefix.len())
    }

    pub fn evaluate(&self, path: &str, identity: Option<&Identity>) -> GuardDecision {
        let Some(rule) = self.rule_for(path) else {
            return GuardDecision::Allow;
        };
        if path == rule.login_path || path == self.unauthorized_path {
            return GuardDecision::Allow;
        }
        match identity {
            None => GuardDecision::Redirect(rule.login_path.clone()),
            Some(identity) if identity.role != rule.role => {
                GuardDecision::Redirect(self.unauthorized_path.clone())
            }
            Some(_) => GuardDecision::Allow,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

/// Role-based route guard. Anonymous requests to a guarded area go to that
/// area's login page, signed-in requests with the wrong role go to the
/// unauthorized page.
pub async fn route_guard(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let identity = resolve_identity(req.headers(), &state);
    let path = req.uri().path().to_string();

    match state.guard.evaluate(&path, identity.as_ref()) {
        GuardDecision::Allow => {
            if let Some(identity) = identity {
                req.extensions_mut().insert(identity);
            }
            next.run(req).await
        }
        GuardDecision::Redirect(to) => {
            tracing::debug!(identity = ?identity, "guard redirecting {path} to {to}");
            Redirect::temporary(&to).into_response()
        }
    }
}
