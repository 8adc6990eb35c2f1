//! Hooks notified of every review verdict.

use std::sync::Arc;

use agent_policy::{SafetyVerdict, VerdictKind};
use tracing::{debug, warn};

/// Observer invoked whenever a candidate has been reviewed.
pub trait ReviewObserver: Send + Sync {
    /// Records the verdict for `attempt` (starting at 1) of `request`.
    fn on_verdict(&self, request: &str, attempt: u32, verdict: &SafetyVerdict);
}

/// Observer that emits verdicts to the tracing system.
#[derive(Debug, Default)]
pub struct TracingReviewObserver;

impl ReviewObserver for TracingReviewObserver {
    fn on_verdict(&self, request: &str, attempt: u32, verdict: &SafetyVerdict) {
        match verdict.kind() {
            VerdictKind::Safe => debug!(attempt, request, "review passed"),
            VerdictKind::Unsafe => warn!(
                attempt,
                request,
                reasons = ?verdict.reasons(),
                "review rejected candidate"
            ),
        }
    }
}

/// Composite observer that forwards verdicts to a collection of observers.
#[derive(Default)]
pub struct CompositeReviewObserver {
    observers: Vec<Arc<dyn ReviewObserver>>,
}

impl CompositeReviewObserver {
    /// Creates a composite from the supplied list.
    #[must_use]
    pub fn new<I>(observers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ReviewObserver>>,
    {
        Self {
            observers: observers.into_iter().collect(),
        }
    }

    /// Adds an observer.
    pub fn push(&mut self, observer: Arc<dyn ReviewObserver>) {
        self.observers.push(observer);
    }
}

impl ReviewObserver for CompositeReviewObserver {
    fn on_verdict(&self, request: &str, attempt: u32, verdict: &SafetyVerdict) {
        for observer in &self.observers {
            observer.on_verdict(request, attempt, verdict);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recording(Mutex<Vec<(u32, bool)>>);

    impl ReviewObserver for Recording {
        fn on_verdict(&self, _request: &str, attempt: u32, verdict: &SafetyVerdict) {
            self.0.lock().unwrap().push((attempt, verdict.is_safe()));
        }
    }

    #[test]
    fn composite_forwards_to_every_observer() {
        let first = Arc::new(Recording::default());
        let second = Arc::new(Recording::default());
        let mut composite = CompositeReviewObserver::new([
            Arc::new(TracingReviewObserver) as Arc<dyn ReviewObserver>,
            first.clone() as Arc<dyn ReviewObserver>,
        ]);
        composite.push(second.clone());

        composite.on_verdict("req", 1, &SafetyVerdict::unsafe_with(["bad"]));
        composite.on_verdict("req", 2, &SafetyVerdict::safe());

        assert_eq!(*first.0.lock().unwrap(), [(1, false), (2, true)]);
        assert_eq!(*second.0.lock().unwrap(), [(1, false), (2, true)]);
    }
}
