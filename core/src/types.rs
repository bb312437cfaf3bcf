//! Domain DTO for the movies API.
//!
//! # Design
//! `Movie` carries one canonical wire schema: snake_case JSON names
//! (`movie_id`, `release_date`) mapped onto typed fields. The client does not
//! validate anything; required-field checks belong to the server. Missing
//! `name` or `cast` decode to empty strings so that partial server payloads
//! still round-trip.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// A single movie as exchanged with the movies service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Movie {
    /// Server-assigned identifier. `None` until the movie has been created.
    #[serde(rename = "movie_id", default)]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    /// Free-form, comma-separated list of actors.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub cast: String,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl Movie {
    pub fn new(name: impl Into<String>, cast: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cast: cast.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_release_date(mut self, release_date: NaiveDate) -> Self {
        self.release_date = Some(release_date);
        self
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
