//! services/client/src/bin/egolay.rs

use clap::Parser;
use client_lib::{
    adapters::{FunctionsAdapter, GoTrueAdapter, SessionStore},
    app::{
        auth_flow::{AuthFlow, AuthStep, SignUpForm},
        history::{filter_books, HistoryQuery, ReadingStats},
        library::Library,
        mfa_flow::{security_summary, MfaManager, REMOVE_PROMPT},
        new_store,
        profile::ProfileEditor,
        recommendations::RecommendationFeed,
        start, AppState, StoreHandle,
    },
    config::Config,
    error::ClientError,
};
use egolay_core::domain::{Book, ReadingLevel, User, ValidationError};
use egolay_core::ports::PortError;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Attempts allowed for a second-factor code before giving up.
const MAX_CODE_ATTEMPTS: usize = 3;

#[derive(Parser)]
#[command(name = "egolay")]
#[command(version = "0.1")]
#[command(about = "Egolay reading recommendations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show who is signed in and what is stored for them
    Status,
    /// Sign in with email and password
    SignIn {
        #[arg(short, long)]
        email: String,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Create an account and sign in
    SignUp {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        age: String,
    },
    /// Sign out and forget the stored session
    SignOut,
    /// Manage second authentication factors
    Mfa {
        #[command(subcommand)]
        command: MfaCommands,
    },
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        command: WishlistCommands,
    },
    /// Mark a book as read
    Read {
        #[arg(value_name = "BOOK_ID")]
        book_id: String,
        #[command(flatten)]
        book: BookArgs,
        /// Your rating, 1 to 5
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: Option<u8>,
        #[arg(long)]
        review: Option<String>,
    },
    /// Search the reading history
    History {
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(short, long)]
        genre: Option<String>,
    },
    /// Show book recommendations
    Recommendations {
        /// Only show one genre ("all" shows everything)
        #[arg(short, long)]
        genre: Option<String>,
    },
    /// Show or edit the reading profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
}

#[derive(clap::Subcommand)]
enum MfaCommands {
    /// List verified factors
    List,
    /// Enroll an authenticator app
    Enroll,
    /// Remove a factor
    Remove {
        #[arg(value_name = "FACTOR_ID")]
        factor_id: Uuid,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(clap::Subcommand)]
enum WishlistCommands {
    List,
    Add {
        #[arg(value_name = "BOOK_ID")]
        book_id: String,
        #[command(flatten)]
        book: BookArgs,
    },
    Remove {
        #[arg(value_name = "BOOK_ID")]
        book_id: String,
    },
}

#[derive(clap::Subcommand)]
enum ProfileCommands {
    Show,
    /// Change profile fields; genres and moods toggle
    Edit {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        age: Option<u32>,
        /// casual, regular or avid
        #[arg(long)]
        level: Option<String>,
        /// Preferred length in pages
        #[arg(long)]
        length: Option<u32>,
        #[arg(long = "genre")]
        genres: Vec<String>,
        #[arg(long = "mood")]
        moods: Vec<String>,
        #[arg(long)]
        authors: Option<String>,
        #[arg(long)]
        recent_favorite: Option<String>,
        #[arg(long)]
        looking_for: Option<String>,
        #[arg(long)]
        theme: Option<String>,
    },
}

/// Optional book details attached to a wishlist or history entry.
#[derive(clap::Args, Debug, Clone, Default)]
struct BookArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    author: Option<String>,
    #[arg(long = "genre")]
    genres: Vec<String>,
}

impl BookArgs {
    fn into_book(self, book_id: &str) -> Option<Book> {
        let title = self.title?;
        Some(Book {
            title,
            author: self.author.unwrap_or_default(),
            genres: self.genres,
            ..Book::stub(book_id)
        })
    }
}

/// Line-based prompts on stdin.
struct Prompter {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompter {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    async fn ask(&mut self, prompt: &str) -> Result<String, ClientError> {
        print!("{prompt} ");
        std::io::stdout().flush()?;
        let line = self
            .lines
            .next_line()
            .await?
            .ok_or_else(|| ClientError::Internal("stdin closed".to_string()))?;
        Ok(line.trim().to_string())
    }

    async fn confirm(&mut self, prompt: &str) -> Result<bool, ClientError> {
        let answer = self.ask(&format!("{prompt} [y/N]")).await?;
        Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
    }
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded.");

    // --- 2. Initialize Service Adapters ---
    let http = reqwest::Client::builder().build()?;
    let sessions = Arc::new(SessionStore::new(config.session_path.clone()));
    let auth = Arc::new(GoTrueAdapter::new(http.clone(), &config, sessions.clone()));
    let library = Arc::new(FunctionsAdapter::new(http, &config, sessions));

    // --- 3. Build the Shared AppState & Restore the Session ---
    let app = Arc::new(AppState { auth, library });
    let store = new_store();
    let listener = start(app.clone(), store.clone()).await;

    // --- 4. Run the Command ---
    let result = run(cli.command, app, store).await;
    listener.unsubscribe().await;
    result
}

async fn run(command: Commands, app: Arc<AppState>, store: StoreHandle) -> Result<(), ClientError> {
    let mut prompter = Prompter::new();

    match command {
        Commands::Status => {
            let store = store.lock().await;
            match &store.user {
                Some(user) => {
                    println!("Signed in as {}", user.email.as_deref().unwrap_or("(no email)"));
                    if !store.profile.name.is_empty() {
                        println!("Name: {}", store.profile.name);
                    }
                    println!("Wishlist: {} books", store.wishlist.len());
                    println!("Read: {} books", store.history.len());
                }
                None => println!("Not signed in"),
            }
        }

        Commands::SignIn { email, password } => {
            let password = match password {
                Some(p) => p,
                None => prompter.ask("Password:").await?,
            };
            let mut flow = AuthFlow::new(app);
            flow.sign_in(&email, &password).await;
            finish_sign_in(&mut flow, &mut prompter).await?;
        }

        Commands::SignUp {
            name,
            email,
            password,
            age,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompter.ask("Password:").await?,
            };
            let form = SignUpForm {
                name,
                email,
                password,
                age,
            };
            form.validate()?;
            let mut flow = AuthFlow::new(app);
            flow.sign_up(&form).await;
            finish_sign_in(&mut flow, &mut prompter).await?;
        }

        Commands::SignOut => {
            app.auth.sign_out().await?;
            println!("Signed out");
        }

        Commands::Mfa { command } => {
            require_user(&store).await?;
            let mut manager = MfaManager::new(app);
            match command {
                MfaCommands::List => {
                    manager.refresh().await;
                    if let Some(error) = manager.error() {
                        return Err(ClientError::Internal(error.to_string()));
                    }
                    println!("{}", security_summary(manager.factors().len()));
                    for factor in manager.factors() {
                        println!(
                            "  {}  {}  added {}",
                            factor.id,
                            factor.display_name(),
                            factor.created_at.format("%Y-%m-%d")
                        );
                    }
                }
                MfaCommands::Enroll => {
                    if !manager.start_enrollment().await {
                        return Err(ClientError::Internal(
                            manager.error().unwrap_or("MFA setup failed").to_string(),
                        ));
                    }
                    if let Some(enrollment) = manager.pending_enrollment() {
                        println!("Add this account to your authenticator app:");
                        println!("  {}", enrollment.uri);
                        println!("Or enter the secret manually: {}", enrollment.secret);
                    }
                    for _ in 0..MAX_CODE_ATTEMPTS {
                        let code = prompter.ask("Verification code:").await?;
                        manager.set_code(code);
                        if manager.verify().await {
                            println!("{}", manager.success().unwrap_or("MFA enabled"));
                            return Ok(());
                        }
                        if let Some(error) = manager.error() {
                            eprintln!("{error}");
                        }
                    }
                    manager.cancel();
                    return Err(ClientError::Internal("MFA setup not verified".to_string()));
                }
                MfaCommands::Remove { factor_id, yes } => {
                    let confirmed = yes || prompter.confirm(REMOVE_PROMPT).await?;
                    if manager.remove(factor_id, &|_: &str| confirmed).await {
                        println!("{}", manager.success().unwrap_or("Factor removed"));
                    } else if let Some(error) = manager.error() {
                        return Err(ClientError::Internal(error.to_string()));
                    } else {
                        println!("Nothing removed");
                    }
                }
            }
        }

        Commands::Wishlist { command } => {
            require_user(&store).await?;
            let library = Library::new(app, store.clone());
            match command {
                WishlistCommands::List => {
                    let store = store.lock().await;
                    if store.wishlist.is_empty() {
                        println!("Your wishlist is empty");
                    }
                    for book in &store.wishlist {
                        print_book(book);
                    }
                }
                WishlistCommands::Add { book_id, book } => {
                    let book = book.into_book(&book_id);
                    if library.add_to_wishlist(&book_id, book).await {
                        println!("Added {book_id} to your wishlist");
                    } else {
                        println!("{book_id} is already in your wishlist");
                    }
                }
                WishlistCommands::Remove { book_id } => {
                    library.remove_from_wishlist(&book_id).await;
                    println!("Removed {book_id} from your wishlist");
                }
            }
        }

        Commands::Read {
            book_id,
            book,
            rating,
            review,
        } => {
            require_user(&store).await?;
            let book = book.into_book(&book_id).map(|b| Book {
                my_rating: rating,
                review,
                ..b
            });
            Library::new(app, store).mark_as_read(&book_id, book).await;
            println!("Marked {book_id} as read");
        }

        Commands::History { search, genre } => {
            require_user(&store).await?;
            let store = store.lock().await;
            let stats = ReadingStats::compute(&store.history);
            println!(
                "{} books read, average rating {:.1}, top genre {}",
                stats.total_books, stats.average_rating, stats.top_genre
            );
            let query = HistoryQuery { search, genre };
            for book in filter_books(&store.history, &query) {
                print_book(book);
            }
        }

        Commands::Recommendations { genre } => {
            require_user(&store).await?;
            let profile = store.lock().await.profile.clone();
            let mut feed = RecommendationFeed::new(app);
            feed.refresh(&profile).await;
            feed.set_genre_filter(genre.as_deref());
            if feed.is_fallback() {
                println!("(showing offline suggestions)");
            }
            for item in feed.visible() {
                println!(
                    "{} by {} ({}, {} pages, {:.1})",
                    item.book.title,
                    item.book.author,
                    item.publish_year,
                    item.pages,
                    item.book.rating
                );
                println!("  {}", item.match_reason);
            }
        }

        Commands::Profile { command } => {
            require_user(&store).await?;
            let mut editor = ProfileEditor::open(app, store).await;
            match command {
                ProfileCommands::Show => {
                    let p = editor.draft();
                    println!("Name: {}", p.name);
                    println!("Age: {}", p.age);
                    println!(
                        "Reading level: {}",
                        p.reading_level.map_or("not set", |l| l.as_str())
                    );
                    println!("Preferred length: {} pages", p.preferred_length);
                    println!("Genres: {}", p.favorite_genres.join(", "));
                    println!("Moods: {}", p.current_moods.join(", "));
                    println!("Favorite authors: {}", p.favorite_authors);
                    println!("Recent favorite: {}", p.recent_favorite);
                    println!("Looking for: {}", p.looking_for);
                    println!("Theme: {}", p.theme);
                }
                ProfileCommands::Edit {
                    name,
                    age,
                    level,
                    length,
                    genres,
                    moods,
                    authors,
                    recent_favorite,
                    looking_for,
                    theme,
                } => {
                    if let Some(name) = name {
                        editor.set_name(name);
                    }
                    if let Some(age) = age {
                        editor.set_age(age);
                    }
                    if let Some(level) = level {
                        let parsed = ReadingLevel::parse(&level).ok_or_else(|| {
                            ValidationError::InvalidValue {
                                field: "reading level",
                                reason: format!("unknown level '{level}'"),
                            }
                        })?;
                        editor.set_reading_level(Some(parsed));
                    }
                    if let Some(length) = length {
                        editor.set_preferred_length(length);
                    }
                    for genre in &genres {
                        editor.toggle_genre(genre);
                    }
                    for mood in &moods {
                        editor.toggle_mood(mood);
                    }
                    if let Some(authors) = authors {
                        editor.set_favorite_authors(authors);
                    }
                    if let Some(title) = recent_favorite {
                        editor.set_recent_favorite(title);
                    }
                    if let Some(text) = looking_for {
                        editor.set_looking_for(text);
                    }
                    if let Some(theme) = theme {
                        editor.set_theme(theme);
                    }
                    editor.draft().validate()?;
                    if !editor.save().await {
                        return Err(ClientError::Internal(
                            editor.error().unwrap_or("Failed to save profile").to_string(),
                        ));
                    }
                    println!("Profile saved");
                }
            }
        }
    }

    Ok(())
}

/// Drives a sign-in through the second-factor step when one is required.
async fn finish_sign_in(flow: &mut AuthFlow, prompter: &mut Prompter) -> Result<(), ClientError> {
    let mut attempts = 0;
    while matches!(flow.step(), AuthStep::MfaChallenge { .. }) && attempts < MAX_CODE_ATTEMPTS {
        if let Some(error) = flow.error() {
            eprintln!("{error}");
        }
        let code = prompter.ask("Authenticator code:").await?;
        flow.submit_code(&code).await;
        attempts += 1;
    }

    match flow.step() {
        AuthStep::Authenticated(user) => {
            println!("Signed in as {}", user.email.as_deref().unwrap_or("(no email)"));
            Ok(())
        }
        _ => Err(ClientError::Internal(
            flow.error().unwrap_or("Sign-in not completed").to_string(),
        )),
    }
}

async fn require_user(store: &StoreHandle) -> Result<User, ClientError> {
    store
        .lock()
        .await
        .user
        .clone()
        .ok_or(ClientError::Port(PortError::Unauthorized))
}

fn print_book(book: &Book) {
    let title = if book.has_metadata() { book.title.as_str() } else { book.id.as_str() };
    print!("{title}");
    if !book.author.is_empty() {
        print!(" by {}", book.author);
    }
    if let Some(rating) = book.my_rating {
        print!(" [{}/5]", rating);
    }
    if let Some(date) = book.date_read {
        print!(" read {}", date);
    }
    println!();
}
