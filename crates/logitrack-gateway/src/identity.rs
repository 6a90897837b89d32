//! Token authentication and role scoping.
//!
//! The gateway trusts a static token table from configuration. An empty
//! table switches authentication off entirely, which is the local-demo
//! mode: every caller acts as a console and declared agent bindings are
//! taken at face value. With a table configured, REST callers present
//! `Authorization: Bearer <token>` and WebSocket clients pass `?token=`.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use logitrack_core::config::IdentityConfig;
use logitrack_types::{AgentId, Role};

use crate::error::GatewayError;

/// Who is calling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// The caller's role.
    pub role: Role,
    /// The agent an agent-role token is bound to.
    pub agent_id: Option<AgentId>,
}

impl Identity {
    /// Console identity handed out when no token table is configured.
    pub const OPEN: Self = Self {
        role: Role::Console,
        agent_id: None,
    };

    /// Ensure this identity may act as the given agent.
    ///
    /// Consoles may act as anyone; agent tokens only as themselves.
    pub fn allow_agent(&self, agent_id: AgentId) -> Result<(), GatewayError> {
        match self.role {
            Role::Console => Ok(()),
            Role::Agent if self.agent_id == Some(agent_id) => Ok(()),
            Role::Agent => Err(GatewayError::Forbidden(format!(
                "token is not bound to agent {agent_id}"
            ))),
        }
    }

    /// Ensure this identity carries the dispatch-console role.
    pub fn require_console(&self) -> Result<(), GatewayError> {
        if self.role == Role::Console {
            Ok(())
        } else {
            Err(GatewayError::Forbidden(String::from(
                "console role required",
            )))
        }
    }
}

/// Resolve a caller identity from an optional token.
pub fn authenticate(
    config: &IdentityConfig,
    token: Option<&str>,
) -> Result<Identity, GatewayError> {
    if config.tokens.is_empty() {
        return Ok(Identity::OPEN);
    }
    let Some(token) = token else {
        return Err(GatewayError::Unauthorized(String::from(
            "missing bearer token",
        )));
    };
    config
        .tokens
        .iter()
        .find(|entry| entry.token == token)
        .map_or_else(
            || Err(GatewayError::Unauthorized(String::from("unknown token"))),
            |entry| {
                Ok(Identity {
                    role: entry.role,
                    agent_id: entry.agent_id,
                })
            },
        )
}

/// Extract a bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;
    use logitrack_core::config::TokenConfig;

    use super::*;

    fn table() -> IdentityConfig {
        IdentityConfig {
            tokens: vec![
                TokenConfig {
                    token: String::from("dispatch-1"),
                    role: Role::Console,
                    agent_id: None,
                },
                TokenConfig {
                    token: String::from("courier-3"),
                    role: Role::Agent,
                    agent_id: Some(AgentId::new(3)),
                },
            ],
        }
    }

    #[test]
    fn empty_table_hands_out_open_console() {
        let identity = authenticate(&IdentityConfig::default(), None).unwrap();
        assert_eq!(identity, Identity::OPEN);
    }

    #[test]
    fn configured_table_requires_a_known_token() {
        let config = table();
        assert!(matches!(
            authenticate(&config, None),
            Err(GatewayError::Unauthorized(_))
        ));
        assert!(matches!(
            authenticate(&config, Some("wrong")),
            Err(GatewayError::Unauthorized(_))
        ));

        let console = authenticate(&config, Some("dispatch-1")).unwrap();
        assert_eq!(console.role, Role::Console);

        let agent = authenticate(&config, Some("courier-3")).unwrap();
        assert_eq!(agent.role, Role::Agent);
        assert_eq!(agent.agent_id, Some(AgentId::new(3)));
    }

    #[test]
    fn agent_tokens_only_act_as_themselves() {
        let agent = authenticate(&table(), Some("courier-3")).unwrap();
        assert!(agent.allow_agent(AgentId::new(3)).is_ok());
        assert!(matches!(
            agent.allow_agent(AgentId::new(4)),
            Err(GatewayError::Forbidden(_))
        ));
        assert!(matches!(
            agent.require_console(),
            Err(GatewayError::Forbidden(_))
        ));

        let console = authenticate(&table(), Some("dispatch-1")).unwrap();
        assert!(console.allow_agent(AgentId::new(4)).is_ok());
        assert!(console.require_console().is_ok());
    }

    #[test]
    fn bearer_header_is_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer courier-3"));
        assert_eq!(bearer_token(&headers), Some("courier-3"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(bearer_token(&headers), None);

        headers.remove(AUTHORIZATION);
        assert_eq!(bearer_token(&headers), None);
    }
}
