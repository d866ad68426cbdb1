use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

/// Response of `GET /genre/movie/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct GenreList {
    #[serde(default)]
    pub genres: Vec<Genre>,
}

impl GenreList {
    /// Look up a genre name by id.
    pub fn name_of(&self, id: i64) -> Option<&str> {
        self.genres
            .iter()
            .find(|g| g.id == id)
            .map(|g| g.name.as_str())
    }
}
