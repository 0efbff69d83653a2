use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::auth::Session;

use crate::error::DatabaseError;

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        let api_key = HeaderValue::from_str(&self.anon_key)
            .map_err(|_| DatabaseError::Unauthorized("API key contains invalid characters".to_string()))?;
        headers.insert("apikey", api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| DatabaseError::Unauthorized("Access token contains invalid characters".to_string()))?;
            headers.insert(AUTHORIZATION, bearer);
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T, DatabaseError>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T, DatabaseError>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => DatabaseError::Unauthorized(error_text),
                404 => DatabaseError::NotFound(error_text),
                code => DatabaseError::Api { status: code, message: error_text },
            });
        }

        // DELETE with `return=minimal` answers 204 with no body.
        let bytes = response.bytes().await?;
        let raw: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };

        serde_json::from_slice::<T>(raw).map_err(|e| DatabaseError::Decode {
            table: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Exchanges e-mail/password credentials for a session.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, DatabaseError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let token: TokenGrant = self.request(
            Method::POST,
            "/auth/v1/token?grant_type=password",
            None,
            Some(body),
        ).await?;

        token.into_session()
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, DatabaseError> {
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let token: TokenGrant = self.request(
            Method::POST,
            "/auth/v1/token?grant_type=refresh_token",
            None,
            Some(body),
        ).await?;

        token.into_session()
    }

    pub async fn sign_out(&self, auth_token: &str) -> Result<(), DatabaseError> {
        let _: Value = self.request(
            Method::POST,
            "/auth/v1/logout",
            Some(auth_token),
            None,
        ).await?;
        Ok(())
    }
}

#[derive(Debug, serde::Deserialize)]
struct TokenGrant {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Value,
}

impl TokenGrant {
    fn into_session(self) -> Result<Session, DatabaseError> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => chrono::DateTime::from_timestamp(at, 0),
            (None, Some(secs)) => Some(chrono::Utc::now() + chrono::Duration::seconds(secs)),
            (None, None) => None,
        }
        .ok_or_else(|| DatabaseError::Decode {
            table: "auth token".to_string(),
            message: "token grant carries no expiry".to_string(),
        })?;

        let user = shared_models::auth::User {
            id: self.user.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
            email: self.user.get("email").and_then(Value::as_str).map(str::to_string),
            role: self.user.get("role").and_then(Value::as_str).map(str::to_string),
            metadata: self.user.get("user_metadata").cloned(),
            created_at: self
                .user
                .get("created_at")
                .and_then(Value::as_str)
                .and_then(|raw| raw.parse().ok()),
        };

        if user.id.is_empty() {
            return Err(DatabaseError::Decode {
                table: "auth token".to_string(),
                message: "token grant carries no user id".to_string(),
            });
        }

        Ok(Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user,
        })
    }
}
