//! services/client/src/app/history.rs
//!
//! Read-only views over the reading history: search, genre filter, stats.

use egolay_core::domain::Book;

/// Genre reported when the history is empty.
pub const FALLBACK_TOP_GENRE: &str = "Fiction";

#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    /// Matched case-insensitively against title and author.
    pub search: String,
    /// `None` means all genres.
    pub genre: Option<String>,
}

impl HistoryQuery {
    pub fn matches(&self, book: &Book) -> bool {
        let needle = self.search.trim().to_lowercase();
        let matches_search = needle.is_empty()
            || book.title.to_lowercase().contains(&needle)
            || book.author.to_lowercase().contains(&needle);
        let matches_genre = self
            .genre
            .as_ref()
            .map_or(true, |genre| book.genres.contains(genre));
        matches_search && matches_genre
    }
}

pub fn filter_books<'a>(books: &'a [Book], query: &HistoryQuery) -> Vec<&'a Book> {
    books.iter().filter(|b| query.matches(b)).collect()
}

/// Every genre in the history, in order of first appearance.
pub fn genres(books: &[Book]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for genre in books.iter().flat_map(|b| b.genres.iter()) {
        if !seen.contains(genre) {
            seen.push(genre.clone());
        }
    }
    seen
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadingStats {
    pub total_books: usize,
    /// Mean personal rating, unrated books counting as 0, rounded to one decimal.
    pub average_rating: f32,
    pub top_genre: String,
}

impl ReadingStats {
    pub fn compute(books: &[Book]) -> Self {
        let total_books = books.len();
        let average_rating = if total_books == 0 {
            0.0
        } else {
            let sum: f32 = books
                .iter()
                .map(|b| f32::from(b.my_rating.unwrap_or(0)))
                .sum();
            (sum / total_books as f32 * 10.0).round() / 10.0
        };

        // Counts in first-appearance order so ties go to the earliest genre.
        let mut counts: Vec<(String, usize)> = Vec::new();
        for genre in books.iter().flat_map(|b| b.genres.iter()) {
            match counts.iter_mut().find(|(g, _)| g == genre) {
                Some((_, n)) => *n += 1,
                None => counts.push((genre.clone(), 1)),
            }
        }
        let mut top: Option<&(String, usize)> = None;
        for entry in &counts {
            if top.map_or(true, |(_, best)| entry.1 > *best) {
                top = Some(entry);
            }
        }
        let top_genre = top
            .map(|(g, _)| g.clone())
            .unwrap_or_else(|| FALLBACK_TOP_GENRE.to_string());

        Self {
            total_books,
            average_rating,
            top_genre,
        }
    }
}
