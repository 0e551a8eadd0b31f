#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use atrio_authz::auth::{generate_token, Claims, TokenKind};
use atrio_authz::database::models::{AccessDenialEvent, Client, Project, Role, User};
use atrio_authz::database::store::NewUser;
use atrio_authz::database::{MemoryAuthStore, SharedStore};
use atrio_authz::state::AppState;

pub const PASSWORD: &str = "correct-horse-battery";

/// In-process application over the in-memory store. Each instance is an
/// isolated universe with a freshly seeded catalog.
pub struct TestApp {
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let store: SharedStore = Arc::new(MemoryAuthStore::new());
        let state = AppState::new(store);
        state.catalog.initialize().await?;
        Ok(Self { state })
    }

    /// Create an active account. `legacy_role` fills only the legacy role
    /// column; use [`grant_role`] for real role rows.
    pub async fn user(
        &self,
        email: &str,
        legacy_role: Option<&str>,
        client_id: Option<i64>,
    ) -> Result<User> {
        let hash = bcrypt::hash(PASSWORD, 4)?;
        Ok(self
            .state
            .store
            .insert_user(NewUser {
                email,
                password_hash: &hash,
                display_name: "Test User",
                role: legacy_role,
                client_id,
            })
            .await?)
    }

    pub async fn grant_role(&self, user: &User, role_name: &str) -> Result<Role> {
        let role = self
            .state
            .catalog
            .role_by_name(role_name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("role {} is not in the catalog", role_name))?;
        self.state
            .assignments
            .assign_role(user.id, role.id, None)
            .await?;
        Ok(role)
    }

    /// Turn on one grant edge for a seeded role.
    pub async fn grant_permission(&self, role_name: &str, permission_name: &str) -> Result<()> {
        let role = self
            .state
            .catalog
            .role_by_name(role_name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("role {} is not in the catalog", role_name))?;
        let permission = self
            .state
            .store
            .permission_by_name(permission_name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("permission {} is not in the catalog", permission_name))?;
        self.state
            .catalog
            .set_grant(role.id, permission.id, true)
            .await?;
        Ok(())
    }

    pub async fn client_project(
        &self,
        client_name: &str,
        project_name: &str,
    ) -> Result<(Client, Project)> {
        let client = self.state.store.insert_client(client_name).await?;
        let project = self.state.store.insert_project(client.id, project_name).await?;
        Ok((client, project))
    }

    pub async fn member_of(&self, user: &User, project_id: i64) -> Result<()> {
        self.state.store.insert_membership(user.id, project_id).await?;
        Ok(())
    }

    /// Access token whose role snapshot mirrors the user's current roles.
    pub async fn token(&self, user: &User) -> Result<String> {
        let roles = self.state.assignments.resolve_effective_roles(user).await?;
        Ok(generate_token(&Claims::new(user, roles, TokenKind::Access))?)
    }

    /// Access token with an arbitrary (possibly stale) role snapshot.
    pub fn token_with_roles(&self, user: &User, roles: &[&str]) -> String {
        let roles = roles.iter().map(|s| s.to_string()).collect();
        generate_token(&Claims::new(user, roles, TokenKind::Access)).expect("token generation")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let response = atrio_authz::app(self.state.clone()).oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(
        &self,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> Result<(StatusCode, Value)> {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(
        &self,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> Result<(StatusCode, Value)> {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(
        &self,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        self.request(Method::DELETE, uri, token, body).await
    }

    /// Wait for the fire-and-forget audit writer to land at least `n` rows.
    pub async fn wait_for_denials(&self, n: usize) -> Result<Vec<AccessDenialEvent>> {
        for _ in 0..50 {
            let events = self.state.store.recent_denials(100).await?;
            if events.len() >= n {
                return Ok(events);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        anyhow::bail!("denial log never reached {} entries", n)
    }
}
