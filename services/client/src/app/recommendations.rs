//! services/client/src/app/recommendations.rs
//!
//! The recommendation list. Ranking is the backend's job; when it cannot be
//! reached, a small built-in catalogue filtered by the profile stands in.

use crate::app::state::AppState;
use egolay_core::domain::{Book, Recommendation, UserProfile};
use std::sync::Arc;
use tracing::{info, warn};

pub struct RecommendationFeed {
    app: Arc<AppState>,
    items: Vec<Recommendation>,
    genre_filter: Option<String>,
    from_fallback: bool,
    loading: bool,
}

impl RecommendationFeed {
    pub fn new(app: Arc<AppState>) -> Self {
        Self {
            app,
            items: Vec::new(),
            genre_filter: None,
            from_fallback: false,
            loading: false,
        }
    }

    pub async fn refresh(&mut self, profile: &UserProfile) {
        self.loading = true;
        match self.app.library.get_recommendations().await {
            Ok(items) => {
                info!(count = items.len(), "Recommendations loaded");
                self.items = items;
                self.from_fallback = false;
            }
            Err(e) => {
                warn!("Failed to load recommendations, using the built-in list: {}", e);
                self.items = fallback_catalog()
                    .into_iter()
                    .filter(|r| matches_favorites(r, profile))
                    .collect();
                self.from_fallback = true;
            }
        }
        self.loading = false;
    }

    /// Narrows the visible list to a genre; `None` or `"all"` shows everything.
    pub fn set_genre_filter(&mut self, genre: Option<&str>) {
        self.genre_filter = genre
            .map(str::trim)
            .filter(|g| !g.is_empty() && !g.eq_ignore_ascii_case("all"))
            .map(str::to_lowercase);
    }

    pub fn visible(&self) -> Vec<&Recommendation> {
        self.items
            .iter()
            .filter(|r| match &self.genre_filter {
                Some(filter) => r
                    .book
                    .genres
                    .iter()
                    .any(|g| g.to_lowercase().contains(filter.as_str())),
                None => true,
            })
            .collect()
    }

    pub fn is_fallback(&self) -> bool {
        self.from_fallback
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

fn matches_favorites(recommendation: &Recommendation, profile: &UserProfile) -> bool {
    profile.favorite_genres.is_empty()
        || recommendation
            .book
            .genres
            .iter()
            .any(|g| profile.favorite_genres.contains(g))
}

fn catalogue_entry(
    id: &str,
    title: &str,
    author: &str,
    genres: &[&str],
    rating: f32,
    pages: u32,
    publish_year: i32,
    description: &str,
    match_reason: &str,
) -> Recommendation {
    Recommendation {
        book: Book {
            title: title.to_string(),
            author: author.to_string(),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            rating,
            ..Book::stub(id)
        },
        description: description.to_string(),
        pages,
        publish_year,
        match_reason: match_reason.to_string(),
    }
}

/// Offline suggestions shown when the backend is unavailable.
pub fn fallback_catalog() -> Vec<Recommendation> {
    vec![
        catalogue_entry(
            "1",
            "The Seven Husbands of Evelyn Hugo",
            "Taylor Jenkins Reid",
            &["Fiction", "Romance", "Historical"],
            4.4,
            400,
            2017,
            "A reclusive Hollywood icon tells her life story to an unknown journalist.",
            "Matches your love for character-driven fiction and romantic elements",
        ),
        catalogue_entry(
            "2",
            "Klara and the Sun",
            "Kazuo Ishiguro",
            &["Fiction", "Sci-Fi", "Literary"],
            4.1,
            320,
            2021,
            "An artificial friend observes the family she serves.",
            "Perfect for a contemplative mood and thought-provoking fiction",
        ),
        catalogue_entry(
            "3",
            "Educated",
            "Tara Westover",
            &["Biography", "Non-Fiction"],
            4.6,
            334,
            2018,
            "A memoir of leaving a survivalist family to earn a PhD from Cambridge.",
            "Inspiring memoir for a preference for educational reading",
        ),
        catalogue_entry(
            "4",
            "The Midnight Library",
            "Matt Haig",
            &["Fiction", "Philosophy"],
            4.2,
            288,
            2020,
            "Between life and death is a library of all the lives you could have lived.",
            "Philosophical themes with accessible storytelling",
        ),
    ]
}
