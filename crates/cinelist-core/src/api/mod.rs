//! REST client module for the movie catalog service.
//!
//! This module provides the `CatalogGateway` for fetching movie lists,
//! search results, genres, and movie details.
//!
//! The service accepts the user's API key as a bearer token and, for older
//! endpoints, as an `api_key` query parameter. Both forms are sent on every
//! request, resolved fresh each time from a `CredentialSource`.

pub mod client;
pub mod credential;
pub mod error;
pub mod images;

pub use client::{clamp_page, CatalogGateway, MAX_PAGE};
pub use credential::{CredentialResolver, CredentialSource, NoSession};
pub use error::{ApiError, ApiResult};
pub use images::{ImageSize, ImageUrls};
