use crate::auth::CredentialStore;

use super::state::SessionState;

/// Restores the session from the credential store at startup
///
/// A stored pair is trusted without contacting the server; an expired access
/// token is handled by the first request that gets a 401. Returns whether the
/// session is authenticated.
pub async fn bootstrap(store: &dyn CredentialStore, state: &SessionState) -> bool {
    match store.get().await {
        Ok(Some(_)) => {
            tracing::info!("Restored session from secure storage");
            state.mark_authenticated();
            true
        }
        Ok(None) => {
            tracing::debug!("No stored session");
            state.mark_signed_out();
            false
        }
        Err(e) => {
            tracing::warn!("Could not read secure storage, starting signed out: {}", e);
            state.mark_signed_out();
            false
        }
    }
}
