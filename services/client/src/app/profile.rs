//! services/client/src/app/profile.rs
//!
//! The profile screen's editable draft. Edits stay local until `save`, which
//! pushes the whole profile in one call.

use crate::app::state::{Action, AppState, StoreHandle};
use egolay_core::domain::{ReadingLevel, UserProfile};
use std::sync::Arc;
use tracing::error;

pub struct ProfileEditor {
    app: Arc<AppState>,
    store: StoreHandle,
    draft: UserProfile,
    loading: bool,
    saving: bool,
    error: Option<String>,
}

impl ProfileEditor {
    /// Starts editing from the profile currently held by the root store.
    pub async fn open(app: Arc<AppState>, store: StoreHandle) -> Self {
        let draft = store.lock().await.profile.clone();
        Self {
            app,
            store,
            draft,
            loading: false,
            saving: false,
            error: None,
        }
    }

    pub fn draft(&self) -> &UserProfile {
        &self.draft
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Replaces the draft with the backend's copy.
    pub async fn reload(&mut self) {
        self.loading = true;
        match self.app.library.get_profile().await {
            Ok(Some(profile)) => {
                self.draft = profile.clone();
                self.store.lock().await.apply(Action::ProfileLoaded(profile));
            }
            Ok(None) => {}
            Err(e) => {
                error!("Failed to load profile: {}", e);
                self.error = Some("Failed to load profile".to_string());
            }
        }
        self.loading = false;
    }

    pub fn toggle_genre(&mut self, genre: &str) {
        self.draft.toggle_genre(genre);
    }

    pub fn toggle_mood(&mut self, mood: &str) {
        self.draft.toggle_mood(mood);
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.draft.name = name.into();
    }

    pub fn set_age(&mut self, age: u32) {
        self.draft.age = age;
    }

    pub fn set_reading_level(&mut self, level: Option<ReadingLevel>) {
        self.draft.reading_level = level;
    }

    /// Slider input; snapped to the allowed range and step.
    pub fn set_preferred_length(&mut self, pages: u32) {
        self.draft.preferred_length = UserProfile::snap_preferred_length(pages);
    }

    pub fn set_favorite_authors(&mut self, authors: impl Into<String>) {
        self.draft.favorite_authors = authors.into();
    }

    pub fn set_recent_favorite(&mut self, title: impl Into<String>) {
        self.draft.recent_favorite = title.into();
    }

    pub fn set_looking_for(&mut self, text: impl Into<String>) {
        self.draft.looking_for = text.into();
    }

    pub fn set_theme(&mut self, theme: impl Into<String>) {
        self.draft.theme = theme.into();
    }

    /// Validates and saves the draft; the store takes the backend's answer.
    pub async fn save(&mut self) -> bool {
        self.error = None;
        if let Err(e) = self.draft.validate() {
            self.error = Some(e.to_string());
            return false;
        }

        self.saving = true;
        let result = self.app.library.update_profile(&self.draft).await;
        self.saving = false;

        match result {
            Ok(saved) => {
                self.draft = saved.clone();
                self.store.lock().await.apply(Action::ProfileLoaded(saved));
                true
            }
            Err(e) => {
                error!("Failed to save profile: {}", e);
                self.error = Some(format!("Failed to save profile: {}", e));
                false
            }
        }
    }
}
