use std::sync::Arc;

use axum::extract::FromRef;
use serde::Serialize;
use serde::de::DeserializeOwned;
use vendorhub_api::{ApiError, PageParams, PageRequest};
use vendorhub_auth::{AuthState, Session};
use vendorhub_core::Entity;
use vendorhub_storage::{DynStore, Repository, Scope};

use crate::config::AppConfig;
use crate::payments::PaymentService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub auth: AuthState,
    pub payments: PaymentService,
    pub config: Arc<AppConfig>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl AppState {
    /// Repository over every record of `T`.
    pub fn platform<T>(&self) -> Repository<T>
    where
        T: Entity + Serialize + DeserializeOwned,
    {
        Repository::new(self.store.clone(), Scope::Platform)
    }

    /// Repository limited to the caller's tenant.
    pub fn tenant<T>(&self, session: &Session) -> Result<Repository<T>, ApiError>
    where
        T: Entity + Serialize + DeserializeOwned,
    {
        Ok(Repository::new(self.store.clone(), session.scope()?))
    }

    pub fn page(&self, params: &PageParams) -> PageRequest {
        params.resolve(
            self.config.pagination.default_limit,
            self.config.pagination.max_limit,
        )
    }
}
