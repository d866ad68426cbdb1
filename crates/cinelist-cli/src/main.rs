//! cinelist - browse the movie catalog from a terminal.
//!
//! Every command maps onto one core operation. Catalog and wishlist
//! commands go through the same sign-in guard the browser routes use.

use std::io;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cinelist_core::api::{ApiError, ImageSize};
use cinelist_core::auth::AuthError;
use cinelist_core::models::MoviePage;
use cinelist_core::router::{Navigator, Route};
use cinelist_core::wishlist::{WishlistChange, WishlistEntry};
use cinelist_core::{Cinelist, Config};

// ============================================================================
// Constants
// ============================================================================

/// Directory for a rolling log file, in addition to stderr
const ENV_LOG_DIR: &str = "CINELIST_LOG_DIR";

/// Movies shown per list in the `home` overview
const HOME_LIST_LENGTH: usize = 5;

/// cinelist - browse the movie catalog and keep a wishlist
#[derive(Parser, Debug)]
#[command(name = "cinelist")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Create an account (the API key is checked with the catalog service first)
    Register { identity: String, api_key: String },

    /// Sign in with a registered identity and its API key
    Login {
        identity: String,
        api_key: String,

        /// Remember the identity for the next sign-in
        #[arg(long)]
        remember: bool,
    },

    /// Sign out
    Logout,

    /// Show who is signed in
    Whoami,

    /// First page of every movie list
    Home,

    /// Popular movies
    Popular {
        #[arg(default_value_t = 1)]
        page: u32,
    },

    /// Movies now in theaters
    NowPlaying {
        #[arg(default_value_t = 1)]
        page: u32,
    },

    /// Highest rated movies
    TopRated {
        #[arg(default_value_t = 1)]
        page: u32,
    },

    /// Upcoming releases
    Upcoming {
        #[arg(default_value_t = 1)]
        page: u32,
    },

    /// Search movies by title
    Search {
        query: String,

        #[arg(default_value_t = 1)]
        page: u32,
    },

    /// List movie genres
    Genres,

    /// Show one movie
    Movie { id: i64 },

    /// Add a movie to the wishlist, or remove it if already saved
    Wish { id: i64 },

    /// Show saved movies
    Wishlist,

    /// Print the URL of a poster or backdrop
    Image {
        /// Image path from the catalog, or `-` for none
        path: Option<String>,

        /// w92, w154, w185, w342, w500, w780 or original
        #[arg(default_value_t = ImageSize::default(), value_parser = ImageSize::from_str)]
        size: ImageSize,
    },

    /// Write a default config file if there is none yet
    InitConfig,
}

impl Commands {
    /// Route a command is displayed on, for the sign-in guard.
    /// `None` for commands that work signed out.
    fn route(&self) -> Option<Route> {
        match self {
            Commands::Popular { .. } => Some(Route::Popular),
            Commands::Home
            | Commands::NowPlaying { .. }
            | Commands::TopRated { .. }
            | Commands::Upcoming { .. }
            | Commands::Genres
            | Commands::Movie { .. } => Some(Route::Home),
            Commands::Search { .. } => Some(Route::Search),
            Commands::Wish { .. } | Commands::Wishlist => Some(Route::Wishlist),
            _ => None,
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "cinelist.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// Reports navigation requested by the session layer.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, route: Route) {
        info!(route = %route, "Navigate");
        println!("→ {}", route);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let log_guard = init_tracing();
    debug!(route = ?cli.command.route(), "Parsed command");

    if cli.command == Commands::InitConfig {
        return init_config();
    }

    let config = Config::load().context("Failed to load config")?;
    let app = Cinelist::open(config, Arc::new(TerminalNavigator))?;

    if let Err(e) = run(&app, cli.command).await {
        eprintln!("Error: {}", describe_error(&e));
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}

fn init_config() -> Result<()> {
    let path = Config::config_path()?;
    if path.exists() {
        println!("Config already exists at {}", path.display());
    } else {
        Config::default().save()?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

async fn show_list(app: &Cinelist, kind: ListKind, page: u32) -> Result<()> {
    let gateway = &app.gateway;
    let result = match kind {
        ListKind::Popular => gateway.popular(page).await?,
        ListKind::NowPlaying => gateway.now_playing(page).await?,
        ListKind::TopRated => gateway.top_rated(page).await?,
        ListKind::Upcoming => gateway.upcoming(page).await?,
    };
    println!("== {} (page {}/{})", kind.title(), result.page, result.total_pages);
    print_movies(app, &result, usize::MAX);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Popular,
    NowPlaying,
    TopRated,
    Upcoming,
}

impl ListKind {
    fn title(&self) -> &'static str {
        match self {
            ListKind::Popular => "Popular",
            ListKind::NowPlaying => "Now playing",
            ListKind::TopRated => "Top rated",
            ListKind::Upcoming => "Upcoming",
        }
    }
}

async fn run(app: &Cinelist, command: Commands) -> Result<()> {
    if let Some(target) = command.route() {
        if app.resolve_route(target) == Route::SignIn {
            println!("Sign in first: cinelist login <identity> <api-key>");
            return Ok(());
        }
    }

    let gateway = &app.gateway;

    match command {
        Commands::Register { identity, api_key } => {
            println!("Checking API key with the catalog service...");
            app.session.register(&identity, &api_key).await?;
            println!("Registered {}. Now log in.", identity.trim());
        }
        Commands::Login {
            identity,
            api_key,
            remember,
        } => {
            app.session.login(&identity, &api_key, remember)?;
            println!("Welcome, {}!", identity.trim());
        }
        Commands::Logout => {
            app.session.logout()?;
            println!("Logged out.");
        }
        Commands::Whoami => {
            let view = app.session_view();
            match view.active_identity() {
                Some(identity) if view.is_authenticated() => println!("{}", identity),
                _ => println!("Not signed in"),
            }
            if let Some(remembered) = view.remembered_identity() {
                println!("Remembered: {}", remembered);
            }
            println!("Registered accounts: {}", app.session.credentials().count()?);
        }
        Commands::Home => {
            let (popular, now_playing, top_rated, upcoming) = futures::try_join!(
                gateway.popular(1),
                gateway.now_playing(1),
                gateway.top_rated(1),
                gateway.upcoming(1),
            )?;
            for (kind, page) in [
                (ListKind::Popular, popular),
                (ListKind::NowPlaying, now_playing),
                (ListKind::TopRated, top_rated),
                (ListKind::Upcoming, upcoming),
            ] {
                println!("== {}", kind.title());
                print_movies(app, &page, HOME_LIST_LENGTH);
                println!();
            }
        }
        Commands::Popular { page } => show_list(app, ListKind::Popular, page).await?,
        Commands::NowPlaying { page } => show_list(app, ListKind::NowPlaying, page).await?,
        Commands::TopRated { page } => show_list(app, ListKind::TopRated, page).await?,
        Commands::Upcoming { page } => show_list(app, ListKind::Upcoming, page).await?,
        Commands::Search { query, page } => {
            let result = gateway.search(&query, page).await?;
            if result.results.is_empty() {
                println!("No results for \"{}\"", query);
            } else {
                println!("{} results for \"{}\"", result.total_results, query);
                print_movies(app, &result, usize::MAX);
            }
        }
        Commands::Genres => {
            for genre in gateway.genres().await?.genres {
                println!("{:>6}  {}", genre.id, genre.name);
            }
        }
        Commands::Movie { id } => {
            let details = gateway.movie_details(id).await?;
            println!("{} ({})", details.title, details.release_year().unwrap_or("?"));
            if let Some(tagline) = details.tagline.as_deref().filter(|t| !t.is_empty()) {
                println!("\"{}\"", tagline);
            }
            let genres: Vec<&str> = details.genres.iter().map(|g| g.name.as_str()).collect();
            println!(
                "★ {}  {}  {}",
                details.rating_display(),
                details.runtime_display().unwrap_or_default(),
                genres.join(", ")
            );
            println!("{}", gateway.image_url(details.poster_path.as_deref(), ImageSize::W500));
            if !details.overview.is_empty() {
                println!("\n{}", details.overview);
            }
            if app.wishlist.is_member(id) {
                println!("\n♥ In your wishlist");
            }
        }
        Commands::Wish { id } => {
            // Removing needs no network: toggle with the saved copy
            let saved: Option<WishlistEntry> =
                app.wishlist.entries().into_iter().find(|e| e.id == id);
            let (title, change) = match saved {
                Some(entry) => (entry.title.clone(), app.wishlist.toggle(entry)?),
                None => {
                    let details = gateway.movie_details(id).await?;
                    (details.title.clone(), app.wishlist.toggle(&details)?)
                }
            };
            match change {
                WishlistChange::Added => println!("♥ Added {}", title),
                WishlistChange::Removed => println!("Removed {}", title),
            }
        }
        Commands::Wishlist => {
            let entries = app.wishlist.entries();
            if entries.is_empty() {
                println!("Your wishlist is empty.");
            }
            for entry in entries {
                let year = entry.release_date.as_deref().and_then(|d| d.get(..4)).unwrap_or("?");
                println!("{:>8}  {} ({})  ★ {:.1}", entry.id, entry.title, year, entry.vote_average);
            }
        }
        Commands::Image { path, size } => {
            let path = path.as_deref().filter(|p| *p != "-");
            println!("{}", gateway.image_url(path, size));
        }
        Commands::InitConfig => init_config()?,
    }
    Ok(())
}

fn print_movies(app: &Cinelist, page: &MoviePage, limit: usize) {
    for movie in page.results.iter().take(limit) {
        let saved = if app.wishlist.is_member(movie.id) { " ♥" } else { "" };
        println!(
            "{:>8}  {} ({})  ★ {}{}",
            movie.id,
            movie.title,
            movie.release_year().unwrap_or("?"),
            movie.rating_display(),
            saved
        );
    }
}

/// User-facing text for an error, using the typed cause when there is one.
fn describe_error(err: &anyhow::Error) -> String {
    if let Some(auth) = err.downcast_ref::<AuthError>() {
        return auth.user_message();
    }
    if let Some(api) = err.downcast_ref::<ApiError>() {
        return match api {
            ApiError::Unauthorized => {
                "Your API key was rejected. Log out and sign in again.".to_string()
            }
            ApiError::NotFound(_) => "Nothing found.".to_string(),
            ApiError::ServiceUnavailable(_) => {
                "The catalog service is unreachable. Try again later.".to_string()
            }
            other => other.to_string(),
        };
    }
    format!("{:#}", err)
}
