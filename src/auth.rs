// src/auth.rs
// Session lifecycle: authenticate, refresh the stored profile, and tear the
// whole data layer down on logout. Navigation after login/logout stays with
// the caller.

use std::sync::Arc;

use tracing::info;

use crate::client::Client;
use crate::error::ClientError;
use crate::graphql::ops;
use crate::session::Session;
use crate::types::{AuthPayload, LoginInput, RegisterInput, User};

pub struct AuthController {
    client: Arc<Client>,
}

impl AuthController {
    pub fn new(client: Arc<Client>) -> Self {
        AuthController { client }
    }

    pub async fn login(&self, input: LoginInput) -> Result<Session, ClientError> {
        let payload: AuthPayload = self.client.mutate(&ops::login(input), &[]).await?;
        info!(user = %payload.user.email, "login succeeded");
        self.client
            .session()
            .set_session(payload.user, payload.token);
        Ok(self.client.session().session())
    }

    pub async fn register(&self, input: RegisterInput) -> Result<Session, ClientError> {
        let payload: AuthPayload = self.client.mutate(&ops::register(input), &[]).await?;
        info!(user = %payload.user.email, "registration succeeded");
        self.client
            .session()
            .set_session(payload.user, payload.token);
        Ok(self.client.session().session())
    }

    /// Switch the account plan and refresh the stored profile.
    pub async fn update_plan(&self, plan: &str) -> Result<User, ClientError> {
        let user: User = self.client.mutate(&ops::update_plan(plan), &[]).await?;
        if let Some(token) = self.client.session().token() {
            self.client.session().set_session(user.clone(), token);
        }
        Ok(user)
    }

    /// Clear the session, purge every cached operation and close the
    /// streaming channel, so a later login never sees the previous user's
    /// data. Synchronous: the store and cache are empty when this returns.
    pub fn logout(&self) {
        info!("logging out");
        self.client.teardown();
    }
}
