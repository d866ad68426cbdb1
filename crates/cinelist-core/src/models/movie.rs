//! Catalog movie types as returned by the list, search, and detail endpoints.

use serde::{Deserialize, Serialize};

use super::Genre;

/// A movie as it appears in list and search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Movie {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub original_title: Option<String>,
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
    pub vote_count: u32,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
    #[serde(default)]
    pub adult: bool,
}

impl Movie {
    pub fn release_year(&self) -> Option<&str> {
        release_year(self.release_date.as_deref())
    }

    pub fn rating_display(&self) -> String {
        rating_display(self.vote_average)
    }
}

/// One page of movie results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MoviePage {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub results: Vec<Movie>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u32,
}

impl MoviePage {
    /// An empty result page, numbered `page`.
    pub fn empty(page: u32) -> Self {
        Self {
            page,
            ..Default::default()
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Full record from `GET /movie/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MovieDetails {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: u32,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

impl MovieDetails {
    pub fn release_year(&self) -> Option<&str> {
        release_year(self.release_date.as_deref())
    }

    pub fn rating_display(&self) -> String {
        rating_display(self.vote_average)
    }

    /// Runtime as "2h 15m", or `None` when unknown.
    pub fn runtime_display(&self) -> Option<String> {
        match self.runtime {
            Some(0) | None => None,
            Some(minutes) if minutes < 60 => Some(format!("{}m", minutes)),
            Some(minutes) => Some(format!("{}h {}m", minutes / 60, minutes % 60)),
        }
    }
}

/// Year portion of a `YYYY-MM-DD` date. Empty dates count as missing.
fn release_year(date: Option<&str>) -> Option<&str> {
    let date = date?;
    if date.len() >= 4 && date.is_char_boundary(4) {
        Some(&date[..4])
    } else {
        None
    }
}

fn rating_display(vote_average: f64) -> String {
    format!("{:.1}", vote_average)
}
