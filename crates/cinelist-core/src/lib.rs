//! Core library for cinelist, a movie catalog client.
//!
//! - `api`: catalog gateway with per-request credential injection
//! - `auth`: registered users, login/logout, and the live session
//! - `wishlist`: persisted saved-movie collection
//! - `storage`: the key/value persistence everything above writes through
//! - `router`: route table and sign-in guard

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod models;
pub mod router;
pub mod storage;
pub mod wishlist;

pub use app::Cinelist;
pub use config::Config;
