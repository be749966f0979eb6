//! services/client/src/app/bootstrap.rs
//!
//! Startup sequence: restore an existing session, hydrate the root store, and
//! keep it in sync with auth-state notifications for the rest of the run.

use crate::app::state::{Action, AppState, StoreHandle};
use egolay_core::domain::{AuthEvent, User};
use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Subscribes to auth events, then checks for an existing session.
///
/// Subscribing first means a sign-in that lands during the check is not missed.
pub async fn start(app: Arc<AppState>, store: StoreHandle) -> AuthListener {
    let listener = AuthListener::spawn(app.clone(), store.clone());
    check_session(&app, &store).await;
    listener
}

/// Looks up the current session and, if it is fully authenticated, loads the
/// user's data. Returns the signed-in user.
pub async fn check_session(app: &AppState, store: &StoreHandle) -> Option<User> {
    store.lock().await.apply(Action::LoadingStarted);

    let user = match app.auth.current_session().await {
        Ok(Some(session)) if session.is_fully_authenticated() => Some(session.user),
        Ok(Some(_)) => {
            info!("Stored session is still waiting for a second factor");
            None
        }
        Ok(None) => None,
        Err(e) => {
            error!("Session check failed: {}", e);
            None
        }
    };

    if let Some(user) = &user {
        info!(user_id = %user.id, "Resumed existing session");
        store.lock().await.apply(Action::SignedIn(user.clone()));
        load_user_data(app, store).await;
    }

    store.lock().await.apply(Action::LoadingFinished);
    user
}

/// Fetches profile, wishlist and reading history, in that order.
///
/// A failed fetch is logged and skipped; whatever was loaded stays, the rest
/// keeps its defaults.
pub async fn load_user_data(app: &AppState, store: &StoreHandle) {
    match app.library.get_profile().await {
        Ok(Some(profile)) => store.lock().await.apply(Action::ProfileLoaded(profile)),
        Ok(None) => debug!("No stored profile yet, keeping defaults"),
        Err(e) => error!("Failed to load profile: {}", e),
    }

    match app.library.get_wishlist().await {
        Ok(books) => store.lock().await.apply(Action::WishlistLoaded(books)),
        Err(e) => error!("Failed to load wishlist: {}", e),
    }

    match app.library.get_reading_history().await {
        Ok(books) => store.lock().await.apply(Action::HistoryLoaded(books)),
        Err(e) => error!("Failed to load reading history: {}", e),
    }
}

//=========================================================================================
// Auth Listener
//=========================================================================================

/// A background task applying auth-state notifications to the root store.
pub struct AuthListener {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl AuthListener {
    pub fn spawn(app: Arc<AppState>, store: StoreHandle) -> Self {
        let mut events = app.auth.subscribe();
        let token = CancellationToken::new();

        let handle = {
            let token = token.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => {
                            debug!("Auth listener unsubscribed.");
                            break;
                        }
                        event = events.next() => match event {
                            Some(event) => handle_event(&app, &store, event).await,
                            None => {
                                info!("Auth event stream closed.");
                                break;
                            }
                        },
                    }
                }
            })
        };

        Self { token, handle }
    }

    /// Stops listening and waits for the task to wind down.
    pub async fn unsubscribe(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!("Auth listener task ended abnormally: {:?}", e);
        }
    }
}

async fn handle_event(app: &AppState, store: &StoreHandle, event: AuthEvent) {
    debug!(event = event.name(), "Auth event received");
    match event {
        AuthEvent::SignedIn(session) if session.is_fully_authenticated() => {
            store.lock().await.apply(Action::SignedIn(session.user));
            load_user_data(app, store).await;
        }
        AuthEvent::SignedIn(_) => {
            debug!("Sign-in still owes a second factor, not loading data");
        }
        AuthEvent::SignedOut => store.lock().await.apply(Action::SignedOut),
    }
}
