//! Authorization gate consulted before any record operation.

use async_trait::async_trait;

#[async_trait]
pub trait AuthorizationGate: Send + Sync {
    /// Whether `user_id` has finished the authorization flow in this process.
    fn is_authorized(&self, user_id: &str) -> bool;

    /// URL the user opens to grant access. Carries `user_id` as OAuth state.
    fn authorization_url(&self, user_id: &str) -> String;

    /// Exchange a callback `code` for credentials. Returns false on any failure.
    async fn complete_authorization(&self, code: &str, user_id: &str) -> bool;
}

/// Gate that treats every user as authorized. Used for local storage
/// without Google credentials.
#[derive(Debug, Clone, Default)]
pub struct AllowAllGate;

#[async_trait]
impl AuthorizationGate for AllowAllGate {
    fn is_authorized(&self, _user_id: &str) -> bool {
        true
    }

    fn authorization_url(&self, _user_id: &str) -> String {
        String::new()
    }

    async fn complete_authorization(&self, _code: &str, _user_id: &str) -> bool {
        true
    }
}
