//! Fixed token → session table. For local development and tests, where no
//! identity provider signs real tokens.

use std::collections::HashMap;

use async_trait::async_trait;
use domains::{AuthError, RawSession, SessionResolver};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct StaticTokenResolver {
    tokens: HashMap<String, RawSession>,
}

impl StaticTokenResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, session: RawSession) -> Self {
        self.tokens.insert(token.into(), session);
        self
    }
}

#[async_trait]
impl SessionResolver for StaticTokenResolver {
    async fn resolve(&self, token: &str) -> Result<RawSession, AuthError> {
        let session = self
            .tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken("unknown token".into()))?;
        debug!(user = %session.user_id, "static token resolved");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_tokens_only() {
        let resolver = StaticTokenResolver::new().with_token(
            "dev-admin",
            RawSession {
                user_id: "abbot-uid".into(),
                ..RawSession::default()
            },
        );

        assert_eq!(resolver.resolve("dev-admin").await.unwrap().user_id, "abbot-uid");
        assert!(resolver.resolve("guess").await.is_err());
    }
}
