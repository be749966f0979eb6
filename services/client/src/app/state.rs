//! services/client/src/app/state.rs
//!
//! Defines the application's shared services and the root store that screens
//! read from and update through typed actions.

use egolay_core::domain::{Book, User, UserProfile};
use egolay_core::ports::{AuthService, LibraryService};
use std::sync::Arc;
use tokio::sync::Mutex;

//=========================================================================================
// AppState (Shared Services)
//=========================================================================================

/// The shared application services, created once at startup and passed to every flow.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthService>,
    pub library: Arc<dyn LibraryService>,
}

//=========================================================================================
// AppStore (Root State)
//=========================================================================================

/// Root-level state: who is signed in and the cached remote collections.
#[derive(Debug, Clone, Default)]
pub struct AppStore {
    pub user: Option<User>,
    /// True while the bootstrap is checking for an existing session.
    pub loading: bool,
    pub profile: UserProfile,
    pub wishlist: Vec<Book>,
    pub history: Vec<Book>,
}

/// A shared handle to the root store.
pub type StoreHandle = Arc<Mutex<AppStore>>;

pub fn new_store() -> StoreHandle {
    Arc::new(Mutex::new(AppStore::default()))
}

/// Every change the root store accepts.
#[derive(Debug, Clone)]
pub enum Action {
    LoadingStarted,
    LoadingFinished,
    SignedIn(User),
    /// Resets the user and every cached collection.
    SignedOut,
    ProfileLoaded(UserProfile),
    WishlistLoaded(Vec<Book>),
    HistoryLoaded(Vec<Book>),
    WishlistAdded(Book),
    WishlistRemoved(String),
    HistoryAppended(Book),
}

impl AppStore {
    pub fn apply(&mut self, action: Action) {
        match action {
            Action::LoadingStarted => self.loading = true,
            Action::LoadingFinished => self.loading = false,
            Action::SignedIn(user) => self.user = Some(user),
            Action::SignedOut => {
                self.user = None;
                self.profile = UserProfile::default();
                self.wishlist.clear();
                self.history.clear();
            }
            Action::ProfileLoaded(profile) => self.profile = profile,
            Action::WishlistLoaded(books) => self.wishlist = books,
            Action::HistoryLoaded(books) => self.history = books,
            Action::WishlistAdded(book) => {
                if !self.in_wishlist(&book.id) {
                    self.wishlist.push(book);
                }
            }
            Action::WishlistRemoved(book_id) => self.wishlist.retain(|b| b.id != book_id),
            Action::HistoryAppended(book) => self.history.push(book),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn in_wishlist(&self, book_id: &str) -> bool {
        self.wishlist.iter().any(|b| b.id == book_id)
    }

    pub fn wishlist_entry(&self, book_id: &str) -> Option<&Book> {
        self.wishlist.iter().find(|b| b.id == book_id)
    }
}
