//! Request builders, response parsers and the blocking operations of the
//! movies API.
//!
//! # Design
//! `MoviesClient` holds a `base_url` and a transport and carries no mutable
//! state between calls. Each operation is split into a `build_*` method that
//! produces an `HttpRequest` and a `parse_*` method that consumes an
//! `HttpResponse`; the public operation (`list_all`, `get_by_id`, ...) runs
//! exactly one round-trip through the transport in between. Nothing is
//! retried or cached.

use log::error;
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::types::Movie;

pub const ALL_MOVIES_PATH: &str = "/movieservice/v1/allMovies";
pub const MOVIE_PATH: &str = "/movieservice/v1/movie";
pub const MOVIE_BY_NAME_PATH: &str = "/movieservice/v1/movieName";
pub const MOVIE_BY_YEAR_PATH: &str = "/movieservice/v1/movieYear";

pub const MOVIE_NAME_PARAM: &str = "movie_name";
pub const YEAR_PARAM: &str = "year";

const APPLICATION_JSON: &str = "application/json";
const TEXT_PLAIN: &str = "text/plain";

/// Synchronous client for the movies service.
#[derive(Debug, Clone)]
pub struct MoviesClient<T = UreqTransport> {
    base_url: String,
    transport: T,
}

impl MoviesClient<UreqTransport> {
    /// Client with the default ureq transport and default timeouts.
    pub fn new(base_url: &str) -> Self {
        Self::from_config(&ClientConfig::new(base_url))
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::with_transport(&config.base_url, UreqTransport::new(config))
    }
}

impl<T: Transport> MoviesClient<T> {
    pub fn with_transport(base_url: &str, transport: T) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn list_all(&self) -> Result<Vec<Movie>, ClientError> {
        self.round_trip("list_all", self.build_list_all(), Self::parse_movies)
    }

    pub fn get_by_id(&self, id: i64) -> Result<Movie, ClientError> {
        self.round_trip("get_by_id", self.build_get_by_id(id), Self::parse_movie)
    }

    pub fn list_by_name(&self, name: &str) -> Result<Vec<Movie>, ClientError> {
        self.round_trip("list_by_name", self.build_list_by_name(name), Self::parse_movies)
    }

    pub fn list_by_year(&self, year: i32) -> Result<Vec<Movie>, ClientError> {
        self.round_trip("list_by_year", self.build_list_by_year(year), Self::parse_movies)
    }

    pub fn create(&self, movie: &Movie) -> Result<Movie, ClientError> {
        let request = self.build_create(movie).inspect_err(|e| log_failure("create", e))?;
        self.round_trip("create", request, Self::parse_movie)
    }

    pub fn update(&self, id: i64, movie: &Movie) -> Result<Movie, ClientError> {
        let request = self.build_update(id, movie).inspect_err(|e| log_failure("update", e))?;
        self.round_trip("update", request, Self::parse_movie)
    }

    pub fn delete_by_id(&self, id: i64) -> Result<String, ClientError> {
        self.round_trip("delete_by_id", self.build_delete_by_id(id), Self::parse_text)
    }

    pub fn delete_by_name(&self, name: &str) -> Result<String, ClientError> {
        self.round_trip("delete_by_name", self.build_delete_by_name(name), Self::parse_text)
    }

    fn round_trip<R>(
        &self,
        operation: &str,
        request: HttpRequest,
        parse: fn(HttpResponse) -> Result<R, ClientError>,
    ) -> Result<R, ClientError> {
        self.transport
            .execute(&request)
            .and_then(parse)
            .inspect_err(|e| log_failure(operation, e))
    }
}

impl<T> MoviesClient<T> {
    pub fn build_list_all(&self) -> HttpRequest {
        self.json_get(format!("{}{ALL_MOVIES_PATH}", self.base_url), Vec::new())
    }

    pub fn build_get_by_id(&self, id: i64) -> HttpRequest {
        self.json_get(format!("{}{MOVIE_PATH}/{id}", self.base_url), Vec::new())
    }

    pub fn build_list_by_name(&self, name: &str) -> HttpRequest {
        self.json_get(
            format!("{}{MOVIE_BY_NAME_PATH}", self.base_url),
            vec![(MOVIE_NAME_PARAM.to_string(), name.to_string())],
        )
    }

    pub fn build_list_by_year(&self, year: i32) -> HttpRequest {
        self.json_get(
            format!("{}{MOVIE_BY_YEAR_PATH}", self.base_url),
            vec![(YEAR_PARAM.to_string(), year.to_string())],
        )
    }

    pub fn build_create(&self, movie: &Movie) -> Result<HttpRequest, ClientError> {
        self.json_send(HttpMethod::Post, format!("{}{MOVIE_PATH}", self.base_url), movie)
    }

    pub fn build_update(&self, id: i64, movie: &Movie) -> Result<HttpRequest, ClientError> {
        self.json_send(HttpMethod::Put, format!("{}{MOVIE_PATH}/{id}", self.base_url), movie)
    }

    pub fn build_delete_by_id(&self, id: i64) -> HttpRequest {
        text_delete(format!("{}{MOVIE_PATH}/{id}", self.base_url), Vec::new())
    }

    pub fn build_delete_by_name(&self, name: &str) -> HttpRequest {
        text_delete(
            format!("{}{MOVIE_BY_NAME_PATH}", self.base_url),
            vec![(MOVIE_NAME_PARAM.to_string(), name.to_string())],
        )
    }

    /// Parse a response carrying a JSON array of movies.
    pub fn parse_movies(response: HttpResponse) -> Result<Vec<Movie>, ClientError> {
        decode(response)
    }

    /// Parse a response carrying a single JSON movie.
    pub fn parse_movie(response: HttpResponse) -> Result<Movie, ClientError> {
        decode(response)
    }

    /// Parse a plain-text confirmation response.
    pub fn parse_text(response: HttpResponse) -> Result<String, ClientError> {
        check_status(&response)?;
        Ok(response.body)
    }

    fn json_get(&self, url: String, query: Vec<(String, String)>) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url,
            query,
            headers: vec![("accept".to_string(), APPLICATION_JSON.to_string())],
            body: None,
        }
    }

    fn json_send(&self, method: HttpMethod, url: String, movie: &Movie) -> Result<HttpRequest, ClientError> {
        let body = serde_json::to_string(movie).map_err(|e| ClientError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method,
            url,
            query: Vec::new(),
            headers: vec![
                ("accept".to_string(), APPLICATION_JSON.to_string()),
                ("content-type".to_string(), APPLICATION_JSON.to_string()),
            ],
            body: Some(body),
        })
    }
}

fn text_delete(url: String, query: Vec<(String, String)>) -> HttpRequest {
    HttpRequest {
        method: HttpMethod::Delete,
        url,
        query,
        headers: vec![("accept".to_string(), TEXT_PLAIN.to_string())],
        body: None,
    }
}

/// Any 2xx passes; everything else becomes `ClientError::Server`.
fn check_status(response: &HttpResponse) -> Result<(), ClientError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ClientError::from_status(response.status, &response.body))
}

fn decode<R: DeserializeOwned>(response: HttpResponse) -> Result<R, ClientError> {
    check_status(&response)?;
    serde_json::from_str(&response.body).map_err(|e| ClientError::Deserialization(e.to_string()))
}

fn log_failure(operation: &str, err: &ClientError) {
    match err {
        ClientError::Server { status, message } => {
            error!("{operation} failed: status {status}, body {message:?}")
        }
        other => error!("{operation} failed: {other}"),
    }
}
