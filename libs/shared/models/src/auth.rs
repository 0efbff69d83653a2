use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::Role;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Session issued by the hosted auth provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl Session {
    /// A session is usable only while `now + margin` is still before expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin < self.expires_at
    }
}

/// Auth provider transitions that drive the realtime lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn { session: Session, role: Role },
    SignedOut,
    TokenRefreshed(Session),
}

/// Row of the `user_roles` table.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRoleRow {
    pub role: Role,
}
