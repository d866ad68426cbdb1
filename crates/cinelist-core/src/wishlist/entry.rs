use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Movie, MovieDetails};

/// Denormalized copy of a movie, as shown on the wishlist page.
///
/// Unknown fields are ignored so whole movie objects persisted by older
/// clients still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct WishlistEntry {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
    #[serde(default)]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub saved_at: Option<DateTime<Utc>>,
}

impl From<&Movie> for WishlistEntry {
    fn from(movie: &Movie) -> Self {
        Self {
            id: movie.id,
            title: movie.title.clone(),
            overview: movie.overview.clone(),
            poster_path: movie.poster_path.clone(),
            backdrop_path: movie.backdrop_path.clone(),
            release_date: movie.release_date.clone(),
            vote_average: movie.vote_average,
            genre_ids: movie.genre_ids.clone(),
            saved_at: Some(Utc::now()),
        }
    }
}

impl From<&MovieDetails> for WishlistEntry {
    fn from(details: &MovieDetails) -> Self {
        Self {
            id: details.id,
            title: details.title.clone(),
            overview: details.overview.clone(),
            poster_path: details.poster_path.clone(),
            backdrop_path: details.backdrop_path.clone(),
            release_date: details.release_date.clone(),
            vote_average: details.vote_average,
            genre_ids: details.genres.iter().map(|g| g.id).collect(),
            saved_at: Some(Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_full_movie_object() {
        let json = r#"{
            "adult": false,
            "id": 550,
            "title": "Fight Club",
            "original_title": "Fight Club",
            "poster_path": "/p.jpg",
            "release_date": "1999-10-15",
            "vote_average": 8.4,
            "popularity": 61.4,
            "genre_ids": [18]
        }"#;
        let entry: WishlistEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, 550);
        assert_eq!(entry.genre_ids, vec![18]);
        assert!(entry.saved_at.is_none());
    }

    #[test]
    fn test_from_details_copies_genre_ids() {
        let details: MovieDetails = serde_json::from_str(
            r#"{"id": 13, "title": "Forrest Gump", "genres": [{"id": 35, "name": "Comedy"}, {"id": 18, "name": "Drama"}]}"#,
        )
        .unwrap();
        let entry = WishlistEntry::from(&details);
        assert_eq!(entry.genre_ids, vec![35, 18]);
        assert!(entry.saved_at.is_some());
    }
}
