//! Synchronous API client core for the movies service.
//!
//! # Overview
//! `MoviesClient` turns typed calls into HTTP requests against five fixed
//! endpoint templates and maps responses back into `Movie` values or a
//! single `ClientError`. Every operation is one blocking round-trip.
//!
//! # Design
//! - `build_*` methods produce plain `HttpRequest` data and `parse_*`
//!   methods consume plain `HttpResponse` data, so the I/O boundary is
//!   explicit and testable without a network.
//! - The round-trip goes through the `Transport` trait; `UreqTransport` is
//!   the default and honors the timeouts in `ClientConfig`.
//! - Non-2xx statuses become `ClientError::Server`; anything that prevents a
//!   complete, decodable response is transport-class.
//! - The `Movie` DTO is defined independently from the mock-server crate;
//!   integration tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use client::MoviesClient;
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, ErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use types::Movie;
