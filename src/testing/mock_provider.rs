//! Scriptable discovery provider

use std::sync::Arc;

use parking_lot::Mutex;

use crate::discovery::{
    DiscoveryFilter, DiscoveryProvider, ProviderEvent, ProviderFactory, ProviderSink,
};
use crate::error::ConnectError;
use crate::types::ServiceAdvertisement;

/// A call the manager made on the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    /// `start()`
    Start,
    /// `stop()`
    Stop,
    /// `restart()`
    Restart,
    /// `reset()`
    Reset,
    /// `add_filter()`
    AddFilter(DiscoveryFilter),
    /// `remove_filter()`
    RemoveFilter(DiscoveryFilter),
}

#[derive(Default)]
struct State {
    calls: Vec<ProviderCall>,
    filters: Vec<DiscoveryFilter>,
    sink: Option<ProviderSink>,
    running: bool,
    builds: usize,
}

/// Provider that records calls and emits events on demand
///
/// Every `MockProvider` shares one provider type, so a manager holds at most
/// one of them.
pub struct MockProvider {
    state: Arc<Mutex<State>>,
}

impl DiscoveryProvider for MockProvider {
    fn start(&mut self) {
        let mut state = self.state.lock();
        state.calls.push(ProviderCall::Start);
        state.running = true;
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.calls.push(ProviderCall::Stop);
        state.running = false;
    }

    fn restart(&mut self) {
        let mut state = self.state.lock();
        state.calls.push(ProviderCall::Restart);
        state.running = true;
    }

    fn reset(&mut self) {
        let mut state = self.state.lock();
        state.calls.push(ProviderCall::Reset);
        state.running = false;
    }

    fn add_filter(&mut self, filter: DiscoveryFilter) {
        let mut state = self.state.lock();
        state.calls.push(ProviderCall::AddFilter(filter.clone()));
        if !state.filters.contains(&filter) {
            state.filters.push(filter);
        }
    }

    fn remove_filter(&mut self, filter: &DiscoveryFilter) {
        let mut state = self.state.lock();
        state.calls.push(ProviderCall::RemoveFilter(filter.clone()));
        state.filters.retain(|f| f != filter);
    }

    fn is_empty(&self) -> bool {
        self.state.lock().filters.is_empty()
    }
}

/// Test-side handle to a [`MockProvider`]
#[derive(Clone, Default)]
pub struct MockProviderHandle {
    state: Arc<Mutex<State>>,
    fail_build: bool,
}

impl MockProviderHandle {
    /// Handle whose factory builds working providers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle whose factory always fails
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_build: true,
            ..Self::default()
        }
    }

    /// Factory to put in a service descriptor
    #[must_use]
    pub fn factory(&self) -> ProviderFactory {
        let state = Arc::clone(&self.state);
        let fail = self.fail_build;
        ProviderFactory::of::<MockProvider, _>("mock", move |sink| {
            if fail {
                return Err(ConnectError::DiscoveryFailed {
                    message: "mock provider unavailable".to_string(),
                });
            }
            let mut guard = state.lock();
            guard.sink = Some(sink);
            guard.builds += 1;
            drop(guard);
            Ok(Box::new(MockProvider {
                state: Arc::clone(&state),
            }))
        })
    }

    /// Calls recorded so far
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().calls.clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Current filters
    #[must_use]
    pub fn filters(&self) -> Vec<DiscoveryFilter> {
        self.state.lock().filters.clone()
    }

    /// Whether the provider was started and not stopped since
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// How many providers the factory built
    #[must_use]
    pub fn builds(&self) -> usize {
        self.state.lock().builds
    }

    fn emit(&self, event: ProviderEvent) -> bool {
        self.state
            .lock()
            .sink
            .as_ref()
            .is_some_and(|sink| sink.send(event).is_ok())
    }

    /// Report a found service; false if no provider was built
    pub fn found(&self, ad: ServiceAdvertisement) -> bool {
        self.emit(ProviderEvent::ServiceFound(ad))
    }

    /// Report a lost service
    pub fn lost(&self, ad: ServiceAdvertisement) -> bool {
        self.emit(ProviderEvent::ServiceLost(ad))
    }

    /// Report a scan failure
    pub fn fail(&self, error: ConnectError) -> bool {
        self.emit(ProviderEvent::ScanFailed(error))
    }
}
