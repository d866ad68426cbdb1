//! Gateway for the movie catalog REST API.
//!
//! This module provides the `CatalogGateway` struct. It holds one
//! long-lived HTTP client and runs every request through `authorize`,
//! which resolves the credential for that request and attaches it both as
//! a bearer header and as the `api_key` query parameter.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::{header, Client, Request, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{GenreList, MovieDetails, MoviePage};

use super::credential::{CredentialResolver, CredentialSource};
use super::images::{ImageSize, ImageUrls};
use super::{ApiError, ApiResult};

// ============================================================================
// Constants
// ============================================================================

/// Highest page number the catalog service will serve.
pub const MAX_PAGE: u32 = 500;

/// Query parameter carrying the credential (v3 compatibility form).
const API_KEY_PARAM: &str = "api_key";

const LANGUAGE_PARAM: &str = "language";

/// Probe endpoint used only to test a candidate credential.
const AUTHENTICATION_PATH: &str = "/authentication";

/// Catalog client. Clone is cheap: `reqwest::Client` and the resolver
/// are reference counted.
#[derive(Clone)]
pub struct CatalogGateway {
    client: Client,
    base_url: String,
    language: String,
    credentials: CredentialResolver,
    images: ImageUrls,
}

impl CatalogGateway {
    /// Create a gateway that asks `source` for the active credential on every call.
    ///
    /// The only timeout is the one supplied through `config.request_timeout_secs`.
    pub fn new(config: &Config, source: Arc<dyn CredentialSource>) -> Result<Self> {
        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let mut builder = Client::builder().default_headers(default_headers);
        // Zero leaves requests unbounded
        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            credentials: CredentialResolver::new(source, config.fallback_api_key.clone()),
            images: ImageUrls::new(&config.image_base_url, &config.placeholder_image_url),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request middleware: fixed locale plus the credential resolved for
    /// this call. Never cached between calls.
    fn authorize(&self, builder: RequestBuilder, credential_override: Option<&str>) -> RequestBuilder {
        let builder = builder.query(&[(LANGUAGE_PARAM, self.language.as_str())]);
        match self.credentials.resolve(credential_override) {
            Some(key) => builder
                .bearer_auth(&key)
                .query(&[(API_KEY_PARAM, key.as_str())]),
            None => {
                warn!("No credential available, sending request unauthenticated");
                builder
            }
        }
    }

    pub(crate) fn build_request(
        &self,
        path: &str,
        params: &[(&str, String)],
        credential_override: Option<&str>,
    ) -> ApiResult<Request> {
        let builder = self.client.get(self.endpoint(path));
        let builder = self.authorize(builder, credential_override).query(params);
        Ok(builder.build()?)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> ApiResult<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send(&self, request: Request) -> ApiResult<reqwest::Response> {
        let path = request.url().path().to_string();
        debug!(path = %path, "Catalog request");
        let response = self.client.execute(request).await?;
        Self::check_response(response).await.inspect_err(|e| {
            if e.is_unauthorized() {
                warn!(path = %path, "Catalog service rejected credential");
            }
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> ApiResult<T> {
        let request = self.build_request(path, params, None)?;
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    async fn movie_list(&self, path: &str, page: u32) -> ApiResult<MoviePage> {
        self.get(path, &[("page", clamp_page(page).to_string())]).await
    }

    // ===== Catalog Endpoints =====

    pub async fn popular(&self, page: u32) -> ApiResult<MoviePage> {
        self.movie_list("/movie/popular", page).await
    }

    pub async fn now_playing(&self, page: u32) -> ApiResult<MoviePage> {
        self.movie_list("/movie/now_playing", page).await
    }

    pub async fn top_rated(&self, page: u32) -> ApiResult<MoviePage> {
        self.movie_list("/movie/top_rated", page).await
    }

    pub async fn upcoming(&self, page: u32) -> ApiResult<MoviePage> {
        self.movie_list("/movie/upcoming", page).await
    }

    /// Free-text title search. A blank query yields an empty page without a request.
    pub async fn search(&self, query: &str, page: u32) -> ApiResult<MoviePage> {
        let query = query.trim();
        let page = clamp_page(page);
        if query.is_empty() {
            debug!("Blank search query, skipping request");
            return Ok(MoviePage::empty(page));
        }
        self.get(
            "/search/movie",
            &[("query", query.to_string()), ("page", page.to_string())],
        )
        .await
    }

    pub async fn genres(&self) -> ApiResult<GenreList> {
        self.get("/genre/movie/list", &[]).await
    }

    pub async fn movie_details(&self, movie_id: i64) -> ApiResult<MovieDetails> {
        self.get(&format!("/movie/{}", movie_id), &[]).await
    }

    /// Probe the catalog service with `secret`, ignoring the active session.
    pub async fn validate_credential(&self, secret: &str) -> ApiResult<()> {
        let request = self.build_request(AUTHENTICATION_PATH, &[], Some(secret))?;
        self.send(request).await?;
        debug!("Credential accepted by catalog service");
        Ok(())
    }

    /// Full image URL for `path`, or the placeholder when there is none.
    pub fn image_url(&self, path: Option<&str>, size: ImageSize) -> String {
        self.images.url(path, size)
    }
}

/// Clamp a 1-based page number into the range the service accepts.
pub fn clamp_page(page: u32) -> u32 {
    page.clamp(1, MAX_PAGE)
}
