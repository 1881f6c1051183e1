//! Mock identity helpers for integration tests.
//!
//! Services behind the gateway receive an `x-user-id` header once the primary
//! session has been checked. In tests, `MockIdentity` builds these headers
//! directly so no real gateway is needed.

use http::{HeaderMap, HeaderName, HeaderValue};

use stepup_auth_types::identity::USER_ID_HEADER;
use stepup_auth_types::token::SENSITIVE_DATA_TOKEN_HEADER;
use stepup_domain::id::UserId;

/// Configurable identity injected into test requests.
pub struct MockIdentity {
    pub user_id: UserId,
    pub sensitive_token: Option<String>,
}

impl MockIdentity {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            sensitive_token: None,
        }
    }

    /// Also present a scoped token, as a client that already stepped up would.
    pub fn with_sensitive_token(mut self, token: impl Into<String>) -> Self {
        self.sensitive_token = Some(token.into());
        self
    }

    /// Return headers as if the gateway injected them.
    pub fn headers(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(
            HeaderName::from_static(USER_ID_HEADER),
            HeaderValue::from(self.user_id.0),
        );
        if let Some(token) = &self.sensitive_token {
            map.insert(
                HeaderName::from_static(SENSITIVE_DATA_TOKEN_HEADER),
                HeaderValue::from_str(token).expect("token is a valid header value"),
            );
        }
        map
    }
}
