//! Session-aware transport
//!
//! Decorates a [`Transport`] with the bearer token from the credential store
//! and recovers from expired access tokens. A 401 on a request that carried a
//! token triggers a refresh; concurrent 401s share one refresh in flight, and
//! each request is replayed at most once. A refresh failure or a second 401
//! ends the session.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use super::transport::{ApiRequest, ApiResponse, Transport, TransportError};
use crate::api::TokenRefresher;
use crate::auth::CredentialStore;
use crate::session::SessionState;

/// Result of one refresh, shared with every request waiting on it
#[derive(Clone)]
enum RefreshOutcome {
    Refreshed(String),
    Terminated,
    StorageFailed(String),
}

type InflightRefresh = watch::Receiver<Option<RefreshOutcome>>;

struct Shared {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    state: Arc<SessionState>,
    inflight: Mutex<Option<InflightRefresh>>,
}

/// Transport that authorizes requests and refreshes the session on 401
#[derive(Clone)]
pub struct SessionAwareTransport {
    shared: Arc<Shared>,
}

impl SessionAwareTransport {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        state: Arc<SessionState>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                store,
                refresher,
                state,
                inflight: Mutex::new(None),
            }),
        }
    }

    /// Attaches the stored access token unless the request already has one
    async fn authorize(&self, request: ApiRequest) -> ApiRequest {
        if request.bearer().is_some() {
            return request;
        }
        match self.shared.store.get().await {
            Ok(Some(pair)) => request.with_bearer(pair.access_token()),
            Ok(None) => request,
            Err(e) => {
                tracing::warn!("Could not read stored credentials, sending unauthenticated: {}", e);
                request
            }
        }
    }

    /// Joins the refresh in flight, or starts one
    ///
    /// `sent_with` is the access token the rejected request carried. If the
    /// store already holds a different one, a refresh finished in between and
    /// its token is used directly.
    async fn await_refresh(&self, sent_with: &str) -> RefreshOutcome {
        let mut rx = {
            let mut inflight = self.shared.inflight.lock().await;
            match inflight.as_ref() {
                Some(rx) => rx.clone(),
                None => {
                    match self.shared.store.get().await {
                        Ok(Some(pair)) if pair.access_token() != sent_with => {
                            return RefreshOutcome::Refreshed(pair.access_token().to_string());
                        }
                        Ok(None) => return RefreshOutcome::Terminated,
                        _ => {}
                    }

                    let (tx, rx) = watch::channel(None);
                    *inflight = Some(rx.clone());

                    let shared = Arc::clone(&self.shared);
                    tokio::spawn(async move {
                        let outcome = shared.run_refresh().await;
                        // Clear the gate before waking waiters so no late 401
                        // joins a finished refresh
                        let mut inflight = shared.inflight.lock().await;
                        inflight.take();
                        tx.send_replace(Some(outcome));
                    });
                    rx
                }
            }
        };

        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or(RefreshOutcome::Terminated)
    }
}

impl Shared {
    /// Performs the refresh; runs detached so a cancelled caller cannot
    /// abandon the waiters
    async fn run_refresh(&self) -> RefreshOutcome {
        let epoch = self.state.current_epoch().await;

        let refresh_token = match self.store.get().await {
            Ok(Some(pair)) => pair.refresh_token().to_string(),
            Ok(None) => {
                tracing::info!("No refresh token stored");
                return self.terminate(epoch).await;
            }
            Err(e) => {
                tracing::warn!("Could not read refresh token: {}", e);
                return self.terminate(epoch).await;
            }
        };

        tracing::debug!(epoch, "Refreshing access token");
        let result = self.refresher.refresh(&refresh_token).await;

        let mut guard = self.state.lock_epoch().await;
        if guard.current() != epoch {
            tracing::info!(
                started = epoch,
                current = guard.current(),
                "Session changed during refresh, discarding tokens"
            );
            return RefreshOutcome::Terminated;
        }

        match result {
            Ok(pair) => match self.store.set(&pair).await {
                Ok(()) => {
                    tracing::info!("Access token refreshed");
                    RefreshOutcome::Refreshed(pair.access_token().to_string())
                }
                Err(e) => {
                    tracing::error!("Failed to persist refreshed tokens: {}", e);
                    if let Err(clear_err) = self.state.end_session(&mut guard, &*self.store).await {
                        tracing::warn!("Failed to clear credentials: {}", clear_err);
                    }
                    RefreshOutcome::StorageFailed(e.to_string())
                }
            },
            Err(e) => {
                tracing::warn!("Token refresh failed: {}", e);
                if let Err(clear_err) = self.state.end_session(&mut guard, &*self.store).await {
                    tracing::warn!("Failed to clear credentials: {}", clear_err);
                }
                RefreshOutcome::Terminated
            }
        }
    }

    /// Ends the session if it is still the one that started at `epoch`
    async fn terminate(&self, epoch: u64) -> RefreshOutcome {
        let mut guard = self.state.lock_epoch().await;
        if guard.current() == epoch {
            if let Err(e) = self.state.end_session(&mut guard, &*self.store).await {
                tracing::warn!("Failed to clear credentials: {}", e);
            }
        }
        RefreshOutcome::Terminated
    }
}

#[async_trait]
impl Transport for SessionAwareTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let epoch = self.shared.state.current_epoch().await;
        let request = self.authorize(request).await;
        let response = self.shared.transport.send(request.clone()).await?;

        if !response.is_unauthorized() {
            return Ok(response);
        }
        let Some(sent_with) = request.bearer() else {
            return Ok(response);
        };

        if request.attempt() > 0 {
            tracing::warn!(path = crate::redact::path(request.path()), "Replayed request rejected");
            self.shared.terminate(epoch).await;
            return Err(TransportError::SessionTerminated);
        }

        match self.await_refresh(sent_with).await {
            RefreshOutcome::Refreshed(token) => {
                let response = self.shared.transport.send(request.retry_with(&token)).await?;
                if response.is_unauthorized() {
                    tracing::warn!(
                        path = crate::redact::path(request.path()),
                        "Request rejected after refresh, ending session"
                    );
                    self.shared.terminate(epoch).await;
                    return Err(TransportError::SessionTerminated);
                }
                Ok(response)
            }
            RefreshOutcome::Terminated => Err(TransportError::SessionTerminated),
            RefreshOutcome::StorageFailed(msg) => Err(TransportError::Storage(msg)),
        }
    }
}
