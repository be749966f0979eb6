//! services/client/src/app/library.rs
//!
//! Wishlist and reading-history mutations. Each one updates the root store
//! first and then issues a single remote call; if that call fails the affected
//! collection is re-fetched so the local copy does not drift.

use crate::app::state::{Action, AppState, StoreHandle};
use chrono::Local;
use egolay_core::domain::Book;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct Library {
    app: Arc<AppState>,
    store: StoreHandle,
}

impl Library {
    pub fn new(app: Arc<AppState>, store: StoreHandle) -> Self {
        Self { app, store }
    }

    /// Adds a book to the wishlist. Returns `false`, without calling the
    /// backend, when it is already there.
    pub async fn add_to_wishlist(&self, book_id: &str, book: Option<Book>) -> bool {
        let entry = match book {
            Some(mut book) => {
                book.id = book_id.to_string();
                book
            }
            None => Book::stub(book_id),
        };

        {
            let mut store = self.store.lock().await;
            if store.in_wishlist(book_id) {
                debug!(book_id, "Already in wishlist");
                return false;
            }
            store.apply(Action::WishlistAdded(entry.clone()));
        }

        let data = entry.has_metadata().then_some(&entry);
        if let Err(e) = self.app.library.add_to_wishlist(book_id, data).await {
            error!("Failed to add to wishlist: {}", e);
            self.reconcile_wishlist().await;
        }
        true
    }

    pub async fn remove_from_wishlist(&self, book_id: &str) {
        self.store
            .lock()
            .await
            .apply(Action::WishlistRemoved(book_id.to_string()));

        if let Err(e) = self.app.library.remove_from_wishlist(book_id).await {
            error!("Failed to remove from wishlist: {}", e);
            self.reconcile_wishlist().await;
        }
    }

    /// Moves a book into the reading history: the wishlist removal goes out
    /// first, then the history append.
    ///
    /// Without `book`, the wishlisted entry's metadata is used. A missing read
    /// date is stamped with today's.
    pub async fn mark_as_read(&self, book_id: &str, book: Option<Book>) {
        let (wishlisted, known) = {
            let store = self.store.lock().await;
            let known = store
                .wishlist_entry(book_id)
                .filter(|b| b.has_metadata())
                .cloned();
            (store.in_wishlist(book_id), known)
        };

        if wishlisted {
            self.remove_from_wishlist(book_id).await;
        }

        let Some(mut read) = book.or(known) else {
            warn!(book_id, "No book details to record in reading history");
            return;
        };
        read.id = book_id.to_string();
        if read.date_read.is_none() {
            read.date_read = Some(Local::now().date_naive());
        }

        self.store
            .lock()
            .await
            .apply(Action::HistoryAppended(read.clone()));
        if let Err(e) = self.app.library.add_to_reading_history(&read).await {
            error!("Failed to mark as read: {}", e);
            self.reconcile_history().await;
        }
    }

    async fn reconcile_wishlist(&self) {
        match self.app.library.get_wishlist().await {
            Ok(books) => self.store.lock().await.apply(Action::WishlistLoaded(books)),
            Err(e) => warn!("Could not re-sync wishlist, local copy may drift: {}", e),
        }
    }

    async fn reconcile_history(&self) {
        match self.app.library.get_reading_history().await {
            Ok(books) => self.store.lock().await.apply(Action::HistoryLoaded(books)),
            Err(e) => warn!("Could not re-sync reading history, local copy may drift: {}", e),
        }
    }
}
