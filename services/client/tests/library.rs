mod common;

use client_lib::app::library::Library;
use client_lib::app::profile::ProfileEditor;
use client_lib::app::recommendations::RecommendationFeed;
use client_lib::app::{bootstrap, new_store, StoreHandle};
use common::{book, calls, new_log, Call, CallLog, FakeAuth, FakeLibrary};
use egolay_core::domain::{Recommendation, UserProfile};
use std::sync::Arc;

/// A signed-in app whose store is already hydrated; the log starts empty.
async fn hydrated(library: FakeLibrary, log: &CallLog) -> (Arc<client_lib::app::AppState>, StoreHandle) {
    let auth = Arc::new(FakeAuth::new(log.clone()).signed_in());
    let app = common::app_state(auth, Arc::new(library));
    let store = new_store();
    bootstrap::check_session(&app, &store).await;
    log.lock().unwrap().clear();
    (app, store)
}

#[tokio::test]
async fn duplicate_wishlist_add_makes_no_call() {
    let log = new_log();
    let library = FakeLibrary::new(log.clone()).with_wishlist(vec![book("b1", "Wanted")]);
    let (app, store) = hydrated(library, &log).await;
    let lib = Library::new(app, store.clone());

    assert!(!lib.add_to_wishlist("b1", None).await);
    assert!(calls(&log).is_empty());

    assert!(lib.add_to_wishlist("b2", Some(book("b2", "Other"))).await);
    assert_eq!(calls(&log), vec![Call::AddToWishlist("b2".into())]);
    assert_eq!(store.lock().await.wishlist.len(), 2);
}

#[tokio::test]
async fn mark_as_read_removes_then_appends() {
    let log = new_log();
    let library = FakeLibrary::new(log.clone()).with_wishlist(vec![book("b1", "Wanted")]);
    let (app, store) = hydrated(library, &log).await;
    let lib = Library::new(app, store.clone());

    lib.mark_as_read("b1", None).await;

    assert_eq!(
        calls(&log),
        vec![
            Call::RemoveFromWishlist("b1".into()),
            Call::AddToReadingHistory("b1".into()),
        ]
    );
    let state = store.lock().await;
    assert!(state.wishlist.is_empty());
    assert_eq!(state.history.len(), 1);
    assert_eq!(state.history[0].title, "Wanted");
    assert!(state.history[0].date_read.is_some());
}

#[tokio::test]
async fn mark_as_read_of_unlisted_book_only_appends() {
    let log = new_log();
    let (app, store) = hydrated(FakeLibrary::new(log.clone()), &log).await;
    let lib = Library::new(app, store);

    lib.mark_as_read("b9", Some(book("b9", "Fresh"))).await;

    assert_eq!(calls(&log), vec![Call::AddToReadingHistory("b9".into())]);
}

#[tokio::test]
async fn failed_add_resyncs_the_wishlist() {
    let log = new_log();
    let library = Arc::new(FakeLibrary::new(log.clone()));
    let auth = Arc::new(FakeAuth::new(log.clone()).signed_in());
    let app = common::app_state(auth, library.clone());
    let store = new_store();
    bootstrap::check_session(&app, &store).await;
    library.set_failing("add_to_wishlist", true);
    log.lock().unwrap().clear();

    let lib = Library::new(app, store.clone());
    lib.add_to_wishlist("b1", Some(book("b1", "Wanted"))).await;

    assert_eq!(
        calls(&log),
        vec![Call::AddToWishlist("b1".into()), Call::GetWishlist]
    );
    assert!(store.lock().await.wishlist.is_empty());
}

#[tokio::test]
async fn failed_remove_restores_the_wishlist() {
    let log = new_log();
    let library = Arc::new(FakeLibrary::new(log.clone()).with_wishlist(vec![book("b1", "Wanted")]));
    let auth = Arc::new(FakeAuth::new(log.clone()).signed_in());
    let app = common::app_state(auth, library.clone());
    let store = new_store();
    bootstrap::check_session(&app, &store).await;
    library.set_failing("remove_from_wishlist", true);
    log.lock().unwrap().clear();

    let lib = Library::new(app, store.clone());
    lib.remove_from_wishlist("b1").await;

    assert_eq!(
        calls(&log),
        vec![Call::RemoveFromWishlist("b1".into()), Call::GetWishlist]
    );
    let state = store.lock().await;
    assert_eq!(state.wishlist.len(), 1);
    assert_eq!(state.wishlist[0].id, "b1");
}

#[tokio::test]
async fn failed_history_append_resyncs_the_history() {
    let log = new_log();
    let library = FakeLibrary::new(log.clone())
        .with_wishlist(vec![book("b1", "Wanted")])
        .failing("add_to_reading_history");
    let (app, store) = hydrated(library, &log).await;
    let lib = Library::new(app, store.clone());

    lib.mark_as_read("b1", None).await;

    assert_eq!(
        calls(&log),
        vec![
            Call::RemoveFromWishlist("b1".into()),
            Call::AddToReadingHistory("b1".into()),
            Call::GetReadingHistory,
        ]
    );
    let state = store.lock().await;
    assert!(state.wishlist.is_empty());
    assert!(state.history.is_empty());
}

#[tokio::test]
async fn failed_resync_keeps_the_local_copy() {
    let log = new_log();
    let library = FakeLibrary::new(log.clone())
        .failing("add_to_wishlist")
        .failing("get_wishlist");
    let (app, store) = hydrated(library, &log).await;
    let lib = Library::new(app, store.clone());

    assert!(lib.add_to_wishlist("b1", Some(book("b1", "Wanted"))).await);

    assert_eq!(
        calls(&log),
        vec![Call::AddToWishlist("b1".into()), Call::GetWishlist]
    );
    let state = store.lock().await;
    assert_eq!(state.wishlist.len(), 1);
    assert_eq!(state.wishlist[0].title, "Wanted");
}

#[tokio::test]
async fn profile_save_sends_one_update() {
    let log = new_log();
    let (app, store) = hydrated(FakeLibrary::new(log.clone()), &log).await;
    let mut editor = ProfileEditor::open(app, store.clone()).await;

    editor.set_name("Ann");
    editor.toggle_genre("Mystery");
    editor.toggle_genre("Fantasy");
    editor.toggle_genre("Mystery");
    editor.set_preferred_length(333);
    assert!(editor.save().await);

    let updates: Vec<_> = calls(&log)
        .into_iter()
        .filter_map(|c| match c {
            Call::UpdateProfile(p) => Some(p),
            _ => None,
        })
        .collect();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].favorite_genres, vec!["Fantasy"]);
    assert_eq!(updates[0].preferred_length, 350);
    assert_eq!(store.lock().await.profile.name, "Ann");
}

#[tokio::test]
async fn invalid_profile_is_not_sent() {
    let log = new_log();
    let (app, store) = hydrated(FakeLibrary::new(log.clone()), &log).await;
    let mut editor = ProfileEditor::open(app, store).await;

    editor.set_age(130);
    assert!(!editor.save().await);
    assert!(editor.error().is_some());
    assert!(calls(&log).is_empty());
}

#[tokio::test]
async fn recommendations_fall_back_when_backend_fails() {
    let log = new_log();
    let library = FakeLibrary::new(log.clone()).failing("get_recommendations");
    let (app, _store) = hydrated(library, &log).await;
    let mut feed = RecommendationFeed::new(app);
    let profile = UserProfile {
        favorite_genres: vec!["Philosophy".into()],
        ..UserProfile::default()
    };

    feed.refresh(&profile).await;

    assert!(feed.is_fallback());
    let titles: Vec<_> = feed.visible().iter().map(|r| r.book.title.clone()).collect();
    assert_eq!(titles, vec!["The Midnight Library"]);
}

#[tokio::test]
async fn recommendation_genre_filter() {
    let log = new_log();
    let items = vec![
        Recommendation {
            book: book("r1", "One"),
            description: String::new(),
            pages: 200,
            publish_year: 2020,
            match_reason: "because".into(),
        },
        Recommendation {
            book: egolay_core::domain::Book {
                genres: vec!["Sci-Fi".into()],
                ..book("r2", "Two")
            },
            description: String::new(),
            pages: 300,
            publish_year: 2021,
            match_reason: "because".into(),
        },
    ];
    let library = FakeLibrary::new(log.clone()).with_recommendations(items);
    let (app, _store) = hydrated(library, &log).await;
    let mut feed = RecommendationFeed::new(app);
    feed.refresh(&UserProfile::default()).await;
    assert!(!feed.is_fallback());

    feed.set_genre_filter(Some("sci"));
    assert_eq!(feed.visible().len(), 1);
    assert_eq!(feed.visible()[0].book.id, "r2");

    feed.set_genre_filter(Some("all"));
    assert_eq!(feed.visible().len(), 2);
}
