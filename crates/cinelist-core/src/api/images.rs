//! Image CDN URL construction.

use std::fmt;
use std::str::FromStr;

/// Size tokens accepted by the image CDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSize {
    /// 92px wide, list thumbnails
    W92,
    W154,
    W185,
    W342,
    /// 500px wide, desktop cards
    #[default]
    W500,
    W780,
    Original,
}

impl ImageSize {
    pub const ALL: [ImageSize; 7] = [
        ImageSize::W92,
        ImageSize::W154,
        ImageSize::W185,
        ImageSize::W342,
        ImageSize::W500,
        ImageSize::W780,
        ImageSize::Original,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::W92 => "w92",
            ImageSize::W154 => "w154",
            ImageSize::W185 => "w185",
            ImageSize::W342 => "w342",
            ImageSize::W500 => "w500",
            ImageSize::W780 => "w780",
            ImageSize::Original => "original",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageSize::ALL
            .into_iter()
            .find(|size| size.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown image size: {}", s))
    }
}

/// Builds `<base>/<size>/<path>` URLs, or the placeholder when there is no path.
#[derive(Debug, Clone)]
pub struct ImageUrls {
    base_url: String,
    placeholder_url: String,
}

impl ImageUrls {
    pub fn new(base_url: &str, placeholder_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            placeholder_url: placeholder_url.to_string(),
        }
    }

    pub fn url(&self, path: Option<&str>, size: ImageSize) -> String {
        match path.map(|p| p.trim_start_matches('/')) {
            Some(path) if !path.is_empty() => format!("{}/{}/{}", self.base_url, size, path),
            _ => self.placeholder_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://image.tmdb.org/t/p";
    const PLACEHOLDER: &str = "https://via.placeholder.com/500x750?text=No+Image";

    #[test]
    fn test_url_for_path() {
        let urls = ImageUrls::new(BASE, PLACEHOLDER);
        assert_eq!(
            urls.url(Some("/abc123.jpg"), ImageSize::W92),
            "https://image.tmdb.org/t/p/w92/abc123.jpg"
        );
        assert_eq!(
            urls.url(Some("abc123.jpg"), ImageSize::Original),
            "https://image.tmdb.org/t/p/original/abc123.jpg"
        );
    }

    #[test]
    fn test_missing_path_is_placeholder() {
        let urls = ImageUrls::new(&format!("{}/", BASE), PLACEHOLDER);
        assert_eq!(urls.url(None, ImageSize::W500), PLACEHOLDER);
        assert_eq!(urls.url(Some(""), ImageSize::W500), PLACEHOLDER);
        assert_eq!(urls.url(Some("/"), ImageSize::W92), PLACEHOLDER);
    }

    #[test]
    fn test_size_parse() {
        assert_eq!("w342".parse::<ImageSize>(), Ok(ImageSize::W342));
        assert_eq!("ORIGINAL".parse::<ImageSize>(), Ok(ImageSize::Original));
        assert!("w1000".parse::<ImageSize>().is_err());
        assert_eq!(ImageSize::default(), ImageSize::W500);
    }
}
