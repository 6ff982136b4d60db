//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! Mocks use `Arc<Mutex<_>>`/atomics for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::batch::{BatchEvent, BatchReporter};
use crate::error::AppError;
use crate::models::{AddressRecord, GeocodeResult, MatchLevel, ProviderMatch};
use crate::traits::Geocoder;

// ---------------------------------------------------------------------------
// MockGeocoder
// ---------------------------------------------------------------------------

/// Mock geocoder with a scripted response queue and a call counter.
///
/// Each call pops the first scripted response; once the queue is empty,
/// every further call answers `Ok(None)` (clean zero-match).
#[derive(Clone)]
pub struct MockGeocoder {
    name: &'static str,
    responses: Arc<Mutex<Vec<Result<Option<ProviderMatch>, AppError>>>>,
    calls: Arc<AtomicUsize>,
}

impl MockGeocoder {
    pub fn with_responses(responses: Vec<Result<Option<ProviderMatch>, AppError>>) -> Self {
        Self {
            name: "mock",
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always answers with the given fix (a lone positive response is
    /// replayed, not drained).
    pub fn with_match(fix: ProviderMatch) -> Self {
        Self::with_responses(vec![Ok(Some(fix))])
    }

    /// Always answers `Ok(None)`.
    pub fn never_matches() -> Self {
        Self::with_responses(vec![])
    }

    /// Fails once with the given error, then answers `Ok(None)`.
    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Number of times `geocode` was invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Geocoder for MockGeocoder {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn geocode(&self, _query: &str) -> Result<Option<ProviderMatch>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        match responses.len() {
            0 => Ok(None),
            1 => {
                // Replay a lone positive match forever; drain everything else.
                if let Ok(Some(fix)) = &responses[0] {
                    Ok(Some(fix.clone()))
                } else {
                    responses.remove(0)
                }
            }
            _ => responses.remove(0),
        }
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Batch reporter that records event labels for assertions.
#[derive(Default, Clone)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.labels().iter().filter(|l| *l == label).count()
    }
}

impl BatchReporter for MockReporter {
    fn report(&self, event: BatchEvent<'_>) {
        let label = match &event {
            BatchEvent::Started { .. } => "Started",
            BatchEvent::RecordCompleted { .. } => "RecordCompleted",
            BatchEvent::Cancelled { .. } => "Cancelled",
            BatchEvent::Finished { .. } => "Finished",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// A fix somewhere in Maceió.
pub fn make_test_fix() -> ProviderMatch {
    ProviderMatch {
        latitude: -9.66,
        longitude: -35.73,
        display_name: "Rua A, 10, Maceió - AL".into(),
        match_level: MatchLevel::Exact,
    }
}

/// Create a dummy AddressRecord for testing, distinguished by `n`.
pub fn make_test_record(n: usize) -> AddressRecord {
    AddressRecord {
        street: Some("Rua A".into()),
        number: Some(n.to_string()),
        neighborhood: Some("Centro".into()),
        city: Some("Maceió".into()),
        region: Some("AL".into()),
        postal_code: Some("57000-000".into()),
        extra: serde_json::Map::new(),
    }
}

/// A successful GeocodeResult for the given record.
pub fn make_test_result(record: AddressRecord) -> GeocodeResult {
    GeocodeResult::matched(record, make_test_fix(), "mock")
}
