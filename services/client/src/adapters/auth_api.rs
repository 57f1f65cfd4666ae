//! services/client/src/adapters/auth_api.rs
//!
//! This module contains the adapter for the backend's `/api/auth` endpoints.
//! It implements the `AuthService` port from the `core` crate.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::adapters::http::{field, optional_field, to_body, ApiRequest, HttpTransport};
use decipher_core::domain::{AuthGrant, RegisterRequest, Registration, User};
use decipher_core::ports::{AuthService, ServiceError, ServiceResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `AuthService` port over HTTP.
#[derive(Clone)]
pub struct HttpAuthAdapter {
    http: HttpTransport,
}

impl HttpAuthAdapter {
    pub fn new(http: HttpTransport) -> Self {
        Self { http }
    }

    async fn call(&self, request: ApiRequest<'_>, default_message: &str) -> ServiceResult<Value> {
        self.http.execute(request).await?.envelope(default_message)
    }
}

/// Reads `data.user` and `data.token` from a successful auth envelope.
fn grant(value: &Value) -> ServiceResult<AuthGrant> {
    let token: String = field(value, "/data/token")?;
    if token.is_empty() || token == "undefined" {
        return Err(ServiceError::Malformed(
            "Response did not include a token".to_string(),
        ));
    }
    Ok(AuthGrant {
        user: field(value, "/data/user")?,
        token,
        message: optional_field(value, "/message")?,
    })
}

fn message(value: &Value) -> String {
    value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

//=========================================================================================
// `AuthService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthService for HttpAuthAdapter {
    async fn register(&self, request: &RegisterRequest) -> ServiceResult<Registration> {
        let body = to_body(request)?;
        let value = self
            .call(ApiRequest::post("/api/auth/register", body), "Registration failed")
            .await?;
        Ok(Registration {
            message: optional_field(&value, "/message")?,
            requires_verification: optional_field(&value, "/requiresVerification")?
                .unwrap_or(false),
            email: optional_field(&value, "/email")?,
        })
    }

    async fn login(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> ServiceResult<AuthGrant> {
        let body = json!({ "email": email, "password": password, "rememberMe": remember_me });
        let value = self
            .call(ApiRequest::post("/api/auth/login", body), "Login failed")
            .await?;
        grant(&value)
    }

    async fn logout(&self, token: &str) -> ServiceResult<()> {
        let request = ApiRequest::post("/api/auth/logout", json!({})).bearer(Some(token));
        let reply = self.http.execute(request).await?;
        if reply.status.is_success() {
            Ok(())
        } else {
            Err(ServiceError::rejected(format!(
                "Logout returned {}",
                reply.status
            )))
        }
    }

    async fn verify_otp(&self, email: &str, otp: &str) -> ServiceResult<AuthGrant> {
        let body = json!({ "email": email, "otp": otp });
        let value = self
            .call(
                ApiRequest::post("/api/auth/verify-otp", body),
                "OTP verification failed",
            )
            .await?;
        grant(&value)
    }

    async fn resend_verification(&self, email: &str) -> ServiceResult<String> {
        let value = self
            .call(
                ApiRequest::post("/api/auth/resend-verification", json!({ "email": email })),
                "Failed to resend verification code",
            )
            .await?;
        Ok(message(&value))
    }

    async fn forgot_password(&self, email: &str) -> ServiceResult<String> {
        let value = self
            .call(
                ApiRequest::post("/api/auth/forgot-password", json!({ "email": email })),
                "Failed to send reset link",
            )
            .await?;
        Ok(message(&value))
    }

    async fn reset_password(
        &self,
        token: &str,
        password: &str,
        confirm_password: &str,
    ) -> ServiceResult<AuthGrant> {
        let body = json!({
            "token": token,
            "password": password,
            "confirmPassword": confirm_password,
        });
        let value = self
            .call(
                ApiRequest::post("/api/auth/reset-password", body),
                "Password reset failed",
            )
            .await?;
        grant(&value)
    }

    async fn profile(&self, token: &str) -> ServiceResult<User> {
        let value = self
            .call(
                ApiRequest::get("/api/auth/profile").bearer(Some(token)),
                "Token verification failed",
            )
            .await?;
        field(&value, "/data/user")
    }

    async fn verify_email(&self, token: &str) -> ServiceResult<String> {
        let value = self
            .call(
                ApiRequest::get("/api/auth/verify-email").query("token", token),
                "Email verification failed.",
            )
            .await?;
        Ok(message(&value))
    }
}
