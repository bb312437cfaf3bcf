//! Stub definitions: what a request must look like and what to answer.
//!
//! Stubs are plain serde types so the same values can be registered from
//! Rust tests or posted as JSON to the admin API.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use std::time::Duration;

use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ServerError;
use crate::journal::RecordedRequest;

/// A request pattern paired with the response to send when it matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stub {
    #[serde(default = "Uuid::nil")]
    pub id: Uuid,
    pub request: RequestPattern,
    pub response: ResponseDefinition,
}

impl Stub {
    pub fn new(request: RequestPattern, response: ResponseDefinition) -> Self {
        Self {
            id: Uuid::nil(),
            request,
            response,
        }
    }

    /// Reject stubs whose regular expressions do not compile.
    pub fn validate(&self) -> Result<(), ServerError> {
        if let UrlPattern::PathMatching(pattern) = &self.request.url {
            compiled(pattern)?;
        }
        let matchers = self
            .request
            .query_params
            .values()
            .chain(self.request.headers.values())
            .chain(self.request.body.iter().filter_map(|b| match b {
                BodyPattern::JsonPath { matcher, .. } => matcher.as_ref(),
                BodyPattern::EqualToJson(_) => None,
            }));
        for matcher in matchers {
            if let StringMatcher::Matches(pattern) = matcher {
                compiled(pattern)?;
            }
        }
        if let Some(Delay::Uniform { lower, upper }) = self.response.delay {
            if lower > upper {
                return Err(ServerError::InvalidStub(format!(
                    "uniform delay lower bound {lower} exceeds upper bound {upper}"
                )));
            }
        }
        Ok(())
    }
}

/// Matches request URLs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UrlPattern {
    #[default]
    Any,
    /// Path plus raw query string, compared verbatim.
    Equal(String),
    PathEqual(String),
    /// Anchored regular expression over the path.
    PathMatching(String),
}

impl UrlPattern {
    fn matches(&self, path: &str, raw_query: Option<&str>) -> bool {
        match self {
            UrlPattern::Any => true,
            UrlPattern::Equal(url) => match raw_query {
                Some(query) => url.strip_prefix(path).and_then(|rest| rest.strip_prefix('?')) == Some(query),
                None => url == path,
            },
            UrlPattern::PathEqual(expected) => expected == path,
            UrlPattern::PathMatching(pattern) => regex_matches(pattern, path),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StringMatcher {
    EqualTo(String),
    Contains(String),
    /// Anchored regular expression.
    Matches(String),
}

impl StringMatcher {
    pub fn equal_to(value: impl Into<String>) -> Self {
        StringMatcher::EqualTo(value.into())
    }

    pub fn contains(value: impl Into<String>) -> Self {
        StringMatcher::Contains(value.into())
    }

    pub fn matches_regex(pattern: impl Into<String>) -> Self {
        StringMatcher::Matches(pattern.into())
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            StringMatcher::EqualTo(expected) => value == expected,
            StringMatcher::Contains(needle) => value.contains(needle.as_str()),
            StringMatcher::Matches(pattern) => regex_matches(pattern, value),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum BodyPattern {
    /// The body parses as JSON equal to this value.
    EqualToJson(Value),
    /// `$.a.b` style lookup; with no matcher the value only has to exist.
    JsonPath {
        path: String,
        #[serde(default)]
        matcher: Option<StringMatcher>,
    },
}

impl BodyPattern {
    pub fn json_path(path: impl Into<String>, matcher: StringMatcher) -> Self {
        BodyPattern::JsonPath {
            path: path.into(),
            matcher: Some(matcher),
        }
    }

    fn matches(&self, body: &str) -> bool {
        let Ok(json) = serde_json::from_str::<Value>(body) else {
            return false;
        };
        match self {
            BodyPattern::EqualToJson(expected) => &json == expected,
            BodyPattern::JsonPath { path, matcher } => match (lookup(&json, path), matcher) {
                (None | Some(Value::Null), _) => false,
                (Some(_), None) => true,
                (Some(value), Some(matcher)) => matcher.matches(&render_value(value)),
            },
        }
    }
}

/// Everything a request must satisfy for a stub to apply.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequestPattern {
    /// Upper-case HTTP method; any method when unset.
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub url: UrlPattern,
    #[serde(default)]
    pub query_params: BTreeMap<String, StringMatcher>,
    /// Header names are compared case-insensitively.
    #[serde(default)]
    pub headers: BTreeMap<String, StringMatcher>,
    #[serde(default)]
    pub body: Vec<BodyPattern>,
}

impl RequestPattern {
    pub fn new(method: Option<&str>, url: UrlPattern) -> Self {
        Self {
            method: method.map(str::to_ascii_uppercase),
            url,
            ..Self::default()
        }
    }

    pub fn any(url: UrlPattern) -> Self {
        Self::new(None, url)
    }

    pub fn get(url: UrlPattern) -> Self {
        Self::new(Some("GET"), url)
    }

    pub fn post(url: UrlPattern) -> Self {
        Self::new(Some("POST"), url)
    }

    pub fn put(url: UrlPattern) -> Self {
        Self::new(Some("PUT"), url)
    }

    pub fn delete(url: UrlPattern) -> Self {
        Self::new(Some("DELETE"), url)
    }

    pub fn with_query_param(mut self, name: impl Into<String>, matcher: StringMatcher) -> Self {
        self.query_params.insert(name.into(), matcher);
        self
    }

    pub fn with_header(mut self, name: &str, matcher: StringMatcher) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), matcher);
        self
    }

    pub fn with_body(mut self, pattern: BodyPattern) -> Self {
        self.body.push(pattern);
        self
    }

    pub fn matches(&self, request: &RecordedRequest) -> bool {
        if let Some(method) = &self.method {
            if !method.eq_ignore_ascii_case(&request.method) {
                return false;
            }
        }
        if !self.url.matches(&request.path, request.query.as_deref()) {
            return false;
        }
        let query_ok = self.query_params.iter().all(|(name, matcher)| {
            request
                .query_params
                .iter()
                .any(|(key, value)| key == name && matcher.matches(value))
        });
        let headers_ok = self.headers.iter().all(|(name, matcher)| {
            request
                .header(name)
                .is_some_and(|value| matcher.matches(value))
        });
        query_ok && headers_ok && self.body.iter().all(|pattern| pattern.matches(&request.body))
    }
}

/// Delay applied before the response (or fault) is written.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Delay {
    Fixed { millis: u64 },
    /// Uniformly distributed over `lower..=upper` milliseconds.
    Uniform { lower: u64, upper: u64 },
}

impl Delay {
    pub fn sample(&self) -> Duration {
        match *self {
            Delay::Fixed { millis } => Duration::from_millis(millis),
            Delay::Uniform { lower, upper } => {
                use rand::Rng;
                Duration::from_millis(rand::thread_rng().gen_range(lower..=upper.max(lower)))
            }
        }
    }
}

/// Socket-level misbehavior used instead of a well-formed response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Fault {
    /// Close the connection without writing anything.
    EmptyResponse,
    /// Send a valid chunked response head followed by a garbage chunk.
    MalformedResponseChunk,
    /// Send random bytes and close.
    RandomDataThenClose,
    /// Abort the connection with a TCP reset.
    ConnectionResetByPeer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseDefinition {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
    /// Render `{{request.*}}` placeholders in `body`.
    #[serde(default)]
    pub templated: bool,
    #[serde(default)]
    pub delay: Option<Delay>,
    #[serde(default)]
    pub fault: Option<Fault>,
}

impl ResponseDefinition {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: String::new(),
            templated: false,
            delay: None,
            fault: None,
        }
    }

    pub fn ok() -> Self {
        Self::status(200)
    }

    pub fn server_error() -> Self {
        Self::status(500)
    }

    pub fn fault(fault: Fault) -> Self {
        Self::ok().with_fault(fault)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_json_body(self, body: impl Into<String>) -> Self {
        self.with_header("content-type", "application/json").with_body(body)
    }

    pub fn templated(mut self) -> Self {
        self.templated = true;
        self
    }

    pub fn with_fixed_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(Delay::Fixed {
            millis: saturating_millis(delay),
        });
        self
    }

    pub fn with_uniform_delay(mut self, lower: Duration, upper: Duration) -> Self {
        self.delay = Some(Delay::Uniform {
            lower: saturating_millis(lower),
            upper: saturating_millis(upper),
        });
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Resolve a `$.a.b.0` path; numeric segments index into arrays.
pub(crate) fn lookup<'a>(json: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix('$').unwrap_or(path);
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(json, |value, segment| match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Strings render without quotes, everything else as compact JSON.
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn anchored(pattern: &str) -> Result<Regex, ServerError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| ServerError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

/// Compiled anchored patterns, keyed by their source text.
static COMPILED: LazyLock<RwLock<HashMap<String, Regex>>> = LazyLock::new(Default::default);

fn compiled(pattern: &str) -> Result<Regex, ServerError> {
    if let Some(re) = COMPILED.read().get(pattern) {
        return Ok(re.clone());
    }
    let re = anchored(pattern)?;
    COMPILED.write().insert(pattern.to_string(), re.clone());
    Ok(re)
}

fn regex_matches(pattern: &str, value: &str) -> bool {
    compiled(pattern).is_ok_and(|re| re.is_match(value))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(method: &str, target: &str, body: &str) -> RecordedRequest {
        RecordedRequest::new(
            method,
            target,
            vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body.to_string(),
        )
        .unwrap()
    }

    #[test]
    fn url_equal_includes_query() {
        let pattern = RequestPattern::get(UrlPattern::Equal(
            "/movieservice/v1/movieName?movie_name=Avengers".into(),
        ));
        assert!(pattern.matches(&request("GET", "/movieservice/v1/movieName?movie_name=Avengers", "")));
        assert!(!pattern.matches(&request("GET", "/movieservice/v1/movieName?movie_name=Other", "")));
        assert!(!pattern.matches(&request("GET", "/movieservice/v1/movieName", "")));
        assert!(!pattern.matches(&request("POST", "/movieservice/v1/movieName?movie_name=Avengers", "")));
    }

    #[test]
    fn path_matching_is_anchored() {
        let pattern = RequestPattern::any(UrlPattern::PathMatching(r"/movieservice/v1/movie/\d+".into()));
        assert!(pattern.matches(&request("DELETE", "/movieservice/v1/movie/100", "")));
        assert!(!pattern.matches(&request("DELETE", "/movieservice/v1/movie/abc", "")));
        assert!(!pattern.matches(&request("DELETE", "/x/movieservice/v1/movie/1", "")));
    }

    #[test]
    fn query_params_are_decoded_before_matching() {
        let pattern = RequestPattern::delete(UrlPattern::PathEqual("/movieservice/v1/movieName".into()))
            .with_query_param("movie_name", StringMatcher::equal_to("Toy Story 4"));
        assert!(pattern.matches(&request("DELETE", "/movieservice/v1/movieName?movie_name=Toy%20Story%204", "")));
        assert!(pattern.matches(&request("DELETE", "/movieservice/v1/movieName?movie_name=Toy+Story+4", "")));
        assert!(!pattern.matches(&request("DELETE", "/movieservice/v1/movieName?movie_name=Toy", "")));
    }

    #[test]
    fn headers_match_case_insensitively() {
        let pattern = RequestPattern::post(UrlPattern::Any)
            .with_header("ACCEPT", StringMatcher::equal_to("application/json"));
        assert!(pattern.matches(&request("POST", "/movieservice/v1/movie", "{}")));

        let pattern = RequestPattern::post(UrlPattern::Any)
            .with_header("x-missing", StringMatcher::contains(""));
        assert!(!pattern.matches(&request("POST", "/movieservice/v1/movie", "{}")));
    }

    #[test]
    fn json_path_body_patterns() {
        let body = r#"{"name":"Toy Story 4","cast":"Tom Hanks, Tim Allen","year":2019,"movie_id":null}"#;
        let pattern = RequestPattern::post(UrlPattern::Any)
            .with_body(BodyPattern::json_path("$.name", StringMatcher::equal_to("Toy Story 4")))
            .with_body(BodyPattern::json_path("$.cast", StringMatcher::contains("Tom")))
            .with_body(BodyPattern::json_path("$.year", StringMatcher::matches_regex(r"\d{4}")));
        assert!(pattern.matches(&request("POST", "/", body)));

        let presence = RequestPattern::post(UrlPattern::Any).with_body(BodyPattern::JsonPath {
            path: "$.movie_id".into(),
            matcher: None,
        });
        assert!(!presence.matches(&request("POST", "/", body)));
        assert!(!pattern.matches(&request("POST", "/", "not json")));
    }

    #[test]
    fn equal_to_json_ignores_formatting() {
        let pattern = RequestPattern::any(UrlPattern::Any)
            .with_body(BodyPattern::EqualToJson(json!({"cast": "ABC", "name": ""})));
        assert!(pattern.matches(&request("PUT", "/", r#"{ "name": "", "cast": "ABC" }"#)));
    }

    #[test]
    fn validate_rejects_bad_regex_and_inverted_delay() {
        let stub = Stub::new(
            RequestPattern::get(UrlPattern::PathMatching("(".into())),
            ResponseDefinition::ok(),
        );
        assert!(matches!(stub.validate(), Err(ServerError::InvalidRegex { .. })));

        let stub = Stub::new(
            RequestPattern::get(UrlPattern::Any),
            ResponseDefinition::ok().with_uniform_delay(Duration::from_secs(2), Duration::from_secs(1)),
        );
        assert!(matches!(stub.validate(), Err(ServerError::InvalidStub(_))));
    }

    #[test]
    fn uniform_delay_stays_in_bounds() {
        let delay = Delay::Uniform { lower: 10, upper: 20 };
        for _ in 0..50 {
            let sampled = delay.sample();
            assert!(sampled >= Duration::from_millis(10) && sampled <= Duration::from_millis(20));
        }
    }

    #[test]
    fn stub_json_shape() {
        let stub: Stub = serde_json::from_value(json!({
            "request": {
                "method": "GET",
                "url": {"path_matching": "/movieservice/v1/movie/\\d+"},
                "query_params": {"year": {"equal_to": "2012"}}
            },
            "response": {
                "status": 503,
                "body": "Service Unavailable",
                "delay": {"fixed": {"millis": 100}},
                "fault": "EMPTY_RESPONSE"
            }
        }))
        .unwrap();
        assert!(stub.id.is_nil());
        assert_eq!(stub.request.method.as_deref(), Some("GET"));
        assert_eq!(stub.response.delay, Some(Delay::Fixed { millis: 100 }));
        assert_eq!(stub.response.fault, Some(Fault::EmptyResponse));
        assert!(!stub.response.templated);
    }

    #[test]
    fn compiled_patterns_are_reused() {
        let pattern = r"/movieservice/v1/movieYear/\d{4}";
        assert!(regex_matches(pattern, "/movieservice/v1/movieYear/2012"));
        assert!(COMPILED.read().contains_key(pattern));
        assert!(!regex_matches(pattern, "/movieservice/v1/movieYear/12"));
        assert!(matches!(compiled("("), Err(ServerError::InvalidRegex { .. })));
        assert!(!COMPILED.read().contains_key("("));
    }

    #[test]
    fn huge_delays_saturate() {
        let response = ResponseDefinition::ok().with_fixed_delay(Duration::MAX);
        assert_eq!(response.delay, Some(Delay::Fixed { millis: u64::MAX }));

        let response = ResponseDefinition::ok().with_uniform_delay(Duration::from_millis(5), Duration::MAX);
        assert_eq!(response.delay, Some(Delay::Uniform { lower: 5, upper: u64::MAX }));
    }
}
