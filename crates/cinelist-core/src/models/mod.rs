//! Data models for catalog entities.
//!
//! - `Movie`, `MoviePage`: list and search results
//! - `MovieDetails`: single movie record
//! - `Genre`, `GenreList`: genre taxonomy

pub mod genre;
pub mod movie;

pub use genre::{Genre, GenreList};
pub use movie::{Movie, MovieDetails, MoviePage};
