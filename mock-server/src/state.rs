//! Stub registry and request journal shared by the listener and admin API.

use std::sync::Arc;

use log::debug;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::ServerError;
use crate::journal::RecordedRequest;
use crate::stub::{RequestPattern, ResponseDefinition, Stub};

pub type SharedState = Arc<MockState>;

#[derive(Debug, Default)]
pub struct MockState {
    stubs: RwLock<Vec<Stub>>,
    journal: Mutex<Vec<RecordedRequest>>,
}

impl MockState {
    /// Register a stub, assigning an id when it has none. The most recently
    /// registered matching stub wins.
    pub fn register(&self, mut stub: Stub) -> Result<Stub, ServerError> {
        stub.validate()?;
        if stub.id.is_nil() {
            stub.id = Uuid::new_v4();
        }
        let mut stubs = self.stubs.write();
        stubs.retain(|existing| existing.id != stub.id);
        stubs.push(stub.clone());
        debug!("registered stub {}", stub.id);
        Ok(stub)
    }

    pub fn stubs(&self) -> Vec<Stub> {
        self.stubs.read().clone()
    }

    pub fn remove(&self, id: Uuid) -> bool {
        let mut stubs = self.stubs.write();
        let before = stubs.len();
        stubs.retain(|stub| stub.id != id);
        stubs.len() != before
    }

    /// Drop every stub and forget every recorded request.
    pub fn reset(&self) {
        self.stubs.write().clear();
        self.journal.lock().clear();
    }

    pub fn reset_requests(&self) {
        self.journal.lock().clear();
    }

    pub fn find_response(&self, request: &RecordedRequest) -> Option<ResponseDefinition> {
        self.stubs
            .read()
            .iter()
            .rev()
            .find(|stub| stub.request.matches(request))
            .map(|stub| stub.response.clone())
    }

    pub fn record(&self, request: RecordedRequest) {
        self.journal.lock().push(request);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.journal.lock().clone()
    }

    pub fn count_requests(&self, pattern: &RequestPattern) -> usize {
        self.journal
            .lock()
            .iter()
            .filter(|request| pattern.matches(request))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::UrlPattern;

    fn get(target: &str) -> RecordedRequest {
        RecordedRequest::new("GET", target, Vec::new(), String::new()).unwrap()
    }

    #[test]
    fn latest_matching_stub_wins() {
        let state = MockState::default();
        state
            .register(Stub::new(RequestPattern::get(UrlPattern::Any), ResponseDefinition::status(500)))
            .unwrap();
        state
            .register(Stub::new(
                RequestPattern::get(UrlPattern::PathEqual("/a".into())),
                ResponseDefinition::ok(),
            ))
            .unwrap();

        assert_eq!(state.find_response(&get("/a")).unwrap().status, 200);
        assert_eq!(state.find_response(&get("/b")).unwrap().status, 500);
    }

    #[test]
    fn register_assigns_ids_and_replaces_same_id() {
        let state = MockState::default();
        let stub = state
            .register(Stub::new(RequestPattern::get(UrlPattern::Any), ResponseDefinition::ok()))
            .unwrap();
        assert!(!stub.id.is_nil());

        let mut replacement = Stub::new(RequestPattern::get(UrlPattern::Any), ResponseDefinition::status(204));
        replacement.id = stub.id;
        state.register(replacement).unwrap();
        assert_eq!(state.stubs().len(), 1);
        assert_eq!(state.stubs()[0].response.status, 204);

        assert!(state.remove(stub.id));
        assert!(!state.remove(stub.id));
        assert!(state.find_response(&get("/")).is_none());
    }

    #[test]
    fn journal_counts_and_resets() {
        let state = MockState::default();
        state.record(get("/movieservice/v1/allMovies"));
        state.record(get("/movieservice/v1/allMovies"));
        state.record(get("/movieservice/v1/movie/1"));

        let all = RequestPattern::get(UrlPattern::PathEqual("/movieservice/v1/allMovies".into()));
        assert_eq!(state.count_requests(&all), 2);
        assert_eq!(state.requests().len(), 3);

        state.reset_requests();
        assert_eq!(state.count_requests(&all), 0);

        state.register(Stub::new(RequestPattern::default(), ResponseDefinition::ok())).unwrap();
        state.record(get("/"));
        state.reset();
        assert!(state.stubs().is_empty());
        assert!(state.requests().is_empty());
    }
}
