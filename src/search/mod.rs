//! Debounced remote apartment search.
//!
//! A [`SearchHandle`] feeds input events to a controller task that owns the
//! [`SearchState`]. Qualifying input (at least two characters) arms a
//! resettable 500 ms deadline; when it elapses one request is dispatched under
//! a fresh [`RequestToken`]. Completions travel back to the controller task and
//! are applied only if their token is still the latest, so a slow or
//! superseded response can never overwrite newer state.

pub mod alert;
mod debounce;
pub mod executor;
pub mod gate;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AptSearchError;

pub use alert::{Alert, AlertKind, AlertSink, LogAlerts};
pub use executor::{RequestToken, Resolution, SearchBackend};
pub use gate::{GateDecision, MIN_QUERY_CHARS};
pub use state::{ResultLimit, SearchState};

use debounce::Debouncer;
use executor::{Completion, InFlight, TokenMint};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Quiet period required after the last qualifying change.
    pub debounce: Duration,
    pub min_query_chars: usize,
    pub initial_limit: ResultLimit,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            min_query_chars: MIN_QUERY_CHARS,
            initial_limit: ResultLimit::default(),
        }
    }
}

#[derive(Debug)]
enum Command {
    SetQuery(String),
    SetLimit(ResultLimit),
    Submit,
}

/// Cloneable front door to a running search controller.
///
/// The controller stops on [`SearchHandle::shutdown`] or once every handle has
/// been dropped; either way the pending deadline and any in-flight request are
/// cancelled.
#[derive(Clone)]
pub struct SearchHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SearchState>,
    shutdown: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SearchHandle {
    /// Replaces the input text, as one keystroke would.
    pub fn set_query(&self, text: impl Into<String>) -> Result<(), AptSearchError> {
        self.send(Command::SetQuery(text.into()))
    }

    pub fn set_limit(&self, limit: ResultLimit) -> Result<(), AptSearchError> {
        self.send(Command::SetLimit(limit))
    }

    /// Searches now, skipping the quiet period.
    pub fn submit(&self) -> Result<(), AptSearchError> {
        self.send(Command::Submit)
    }

    fn send(&self, command: Command) -> Result<(), AptSearchError> {
        if self.shutdown.is_cancelled() {
            return Err(AptSearchError::ControllerClosed);
        }
        self.commands
            .send(command)
            .map_err(|_| AptSearchError::ControllerClosed)
    }

    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.clone()
    }

    /// Stops the controller and waits for it to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task
            && let Err(err) = task.await
        {
            warn!(error = %err, "search controller task ended abnormally");
        }
    }
}

/// Starts a controller task on the current tokio runtime.
pub fn spawn(
    backend: impl SearchBackend,
    alerts: impl AlertSink,
    settings: SearchSettings,
) -> SearchHandle {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();
    let controller = SearchController::new(Arc::new(backend), Arc::new(alerts), settings);
    let state = controller.publisher.subscribe();
    let task = tokio::spawn(controller.run(commands_rx, shutdown.clone()));

    SearchHandle {
        commands: commands_tx,
        state,
        shutdown,
        task: Arc::new(Mutex::new(Some(task))),
    }
}

struct SearchController {
    backend: Arc<dyn SearchBackend>,
    alerts: Arc<dyn AlertSink>,
    settings: SearchSettings,
    state: SearchState,
    publisher: watch::Sender<SearchState>,
    debounce: Debouncer,
    tokens: TokenMint,
    in_flight: Option<InFlight>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl SearchController {
    fn new(
        backend: Arc<dyn SearchBackend>,
        alerts: Arc<dyn AlertSink>,
        settings: SearchSettings,
    ) -> Self {
        let state = SearchState::with_limit(settings.initial_limit);
        let (publisher, _) = watch::channel(state.clone());
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            alerts,
            debounce: Debouncer::new(settings.debounce),
            settings,
            state,
            publisher,
            tokens: TokenMint::default(),
            in_flight: None,
            completions_tx,
            completions_rx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        shutdown: CancellationToken,
    ) {
        info!(
            debounce_ms = self.settings.debounce.as_millis() as u64,
            "search controller started"
        );
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(done) = self.completions_rx.recv() => self.complete(done),
                ended = executor::joined(&mut self.in_flight) => self.request_ended(ended),
                _ = self.debounce.fired() => self.dispatch(),
            }
        }
        self.teardown();
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::SetQuery(text) => {
                if text == self.state.query {
                    return;
                }
                self.state.query = text;
                self.input_changed();
            }
            Command::SetLimit(limit) => {
                if limit == self.state.limit {
                    return;
                }
                self.state.limit = limit;
                self.input_changed();
            }
            Command::Submit => match gate::check(&self.state.query, self.settings.min_query_chars)
            {
                GateDecision::Dispatch(_) => {
                    self.debounce.cancel();
                    self.dispatch();
                }
                GateDecision::Reject => {
                    self.alerts
                        .alert(Alert::query_too_short(self.settings.min_query_chars));
                }
            },
        }
    }

    fn input_changed(&mut self) {
        match gate::check(&self.state.query, self.settings.min_query_chars) {
            GateDecision::Dispatch(_) => self.debounce.arm(),
            GateDecision::Reject => {
                self.debounce.cancel();
                self.abandon_in_flight();
                self.state.reset();
            }
        }
        self.publish();
    }

    fn dispatch(&mut self) {
        let GateDecision::Dispatch(query) =
            gate::check(&self.state.query, self.settings.min_query_chars)
        else {
            return;
        };

        self.abandon_in_flight();
        let token = self.tokens.mint();
        let limit = self.state.limit.get();
        debug!(?token, query = %query, limit, "dispatching apartment search");

        self.state.begin_request();
        self.in_flight = Some(executor::spawn_request(
            Arc::clone(&self.backend),
            token,
            query,
            limit,
            self.completions_tx.clone(),
        ));
        self.publish();
    }

    fn complete(&mut self, done: Completion) {
        if !self.tokens.is_current(done.token) {
            debug!(token = ?done.token, query = %done.query, "discarding stale search response");
            return;
        }
        self.in_flight = None;

        match &done.resolution {
            Resolution::Results(results) => {
                debug!(query = %done.query, count = results.len(), "search results applied");
            }
            Resolution::Rejected => {
                warn!(query = %done.query, "search endpoint reported failure");
            }
            Resolution::Failed(detail) => {
                warn!(query = %done.query, error = detail.as_str(), "search request failed");
                self.alerts
                    .alert(Alert::connection_error(&self.backend.target()));
            }
        }
        self.state.apply(done.resolution);
        self.publish();
    }

    /// A request task that exits without reporting still has to release `loading`.
    fn request_ended(&mut self, ended: Result<(), JoinError>) {
        let Some(request) = self.in_flight.take() else {
            return;
        };
        if let Err(err) = ended
            && !err.is_cancelled()
        {
            warn!(token = ?request.token, error = %err, "search request task crashed");
            let done = request.crashed(&err);
            self.complete(done);
        }
    }

    /// Aborts the running request, if any, and makes its token stale.
    fn abandon_in_flight(&mut self) {
        if let Some(request) = self.in_flight.take() {
            request.task.abort();
        }
        self.tokens.invalidate();
    }

    fn publish(&self) {
        self.publisher.send_if_modified(|current| {
            if *current == self.state {
                return false;
            }
            *current = self.state.clone();
            true
        });
    }

    fn teardown(&mut self) {
        let timer_armed = self.debounce.is_armed();
        self.debounce.cancel();
        self.abandon_in_flight();
        info!(timer_armed, "search controller stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    use tokio::sync::oneshot;
    use tokio::time::sleep;

    use super::*;
    use crate::entities::Envelope;
    use crate::entities::apartment::{Apartment, ApartmentResults};

    #[derive(Debug)]
    enum Reply {
        Results(Vec<Apartment>),
        Rejected,
        Transport(String),
        Crash,
    }

    impl Reply {
        fn into_result(self) -> Result<Envelope<ApartmentResults>, AptSearchError> {
            match self {
                Reply::Results(results) => Ok(Envelope::ok(ApartmentResults { results })),
                Reply::Rejected => Ok(Envelope::failed()),
                Reply::Transport(message) => Err(AptSearchError::Api {
                    api: "search".into(),
                    message,
                }),
                Reply::Crash => panic!("backend crashed mid-request"),
            }
        }
    }

    type Calls = Arc<StdMutex<Vec<(String, u32)>>>;

    /// Backend that records calls. Queued gates hold a reply until the test
    /// releases it; without a gate it answers with `fallback` immediately.
    struct ScriptedBackend {
        calls: Calls,
        gates: StdMutex<VecDeque<oneshot::Receiver<Reply>>>,
        fallback: fn() -> Reply,
    }

    impl ScriptedBackend {
        fn new(fallback: fn() -> Reply) -> Self {
            Self {
                calls: Arc::default(),
                gates: StdMutex::default(),
                fallback,
            }
        }

        fn gate(&self) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().push_back(rx);
            tx
        }
    }

    #[async_trait::async_trait]
    impl SearchBackend for ScriptedBackend {
        async fn search_apartments(
            &self,
            query: &str,
            limit: u32,
        ) -> Result<Envelope<ApartmentResults>, AptSearchError> {
            self.calls.lock().unwrap().push((query.to_string(), limit));
            let gate = self.gates.lock().unwrap().pop_front();
            let reply = match gate {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Reply::Transport("gate dropped".into())),
                None => (self.fallback)(),
            };
            reply.into_result()
        }

        fn target(&self) -> String {
            "http://search.test".into()
        }
    }

    #[derive(Clone, Default)]
    struct RecordingAlerts(Arc<StdMutex<Vec<Alert>>>);

    impl RecordingAlerts {
        fn taken(&self) -> Vec<Alert> {
            self.0.lock().unwrap().clone()
        }
    }

    impl AlertSink for RecordingAlerts {
        fn alert(&self, alert: Alert) {
            self.0.lock().unwrap().push(alert);
        }
    }

    fn apartments(n: usize) -> Vec<Apartment> {
        (0..n)
            .map(|i| Apartment {
                apt_id: i.to_string(),
                apt_name: format!("힐스테이트 {i}단지"),
                address: "서울".into(),
                sigungu_name: "서초구".into(),
                dong_name: "서초동".into(),
                location: None,
            })
            .collect()
    }

    fn three_results() -> Reply {
        Reply::Results(apartments(3))
    }

    fn rejected() -> Reply {
        Reply::Rejected
    }

    fn refused() -> Reply {
        Reply::Transport("connection refused".into())
    }

    fn crashes() -> Reply {
        Reply::Crash
    }

    fn start(backend: ScriptedBackend) -> (SearchHandle, Calls, RecordingAlerts) {
        let calls = Arc::clone(&backend.calls);
        let alerts = RecordingAlerts::default();
        let handle = spawn(backend, alerts.clone(), SearchSettings::default());
        (handle, calls, alerts)
    }

    fn calls_of(calls: &Calls) -> Vec<(String, u32)> {
        calls.lock().unwrap().clone()
    }

    async fn ms(n: u64) {
        sleep(Duration::from_millis(n)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn short_query_never_dispatches() {
        let (handle, calls, alerts) = start(ScriptedBackend::new(three_results));

        handle.set_query("a").unwrap();
        ms(2_000).await;

        assert!(calls_of(&calls).is_empty());
        let state = handle.state();
        assert_eq!(state.query, "a");
        assert!(state.results.is_empty());
        assert!(state.error.is_none());
        assert!(!state.loading);
        assert!(alerts.taken().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_keystrokes_dispatches_once_with_final_text() {
        let (handle, calls, _alerts) = start(ScriptedBackend::new(three_results));

        for text in ["래", "래미", "래미안"] {
            handle.set_query(text).unwrap();
            ms(100).await;
        }
        assert!(calls_of(&calls).is_empty());

        ms(500).await;
        assert_eq!(calls_of(&calls), vec![("래미안".to_string(), 10)]);

        ms(2_000).await;
        assert_eq!(calls_of(&calls).len(), 1);
        let state = handle.state();
        assert_eq!(state.results.len(), 3);
        assert!(!state.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn fires_only_after_full_quiet_window() {
        let (handle, calls, _alerts) = start(ScriptedBackend::new(three_results));

        handle.set_query("힐스").unwrap();
        ms(499).await;
        assert!(calls_of(&calls).is_empty());
        handle.set_query("힐스테").unwrap();
        ms(499).await;
        assert!(calls_of(&calls).is_empty());
        ms(2).await;
        assert_eq!(calls_of(&calls), vec![("힐스테".to_string(), 10)]);
    }

    #[tokio::test(start_paused = true)]
    async fn success_applies_results_and_clears_loading() {
        let (handle, _calls, alerts) = start(ScriptedBackend::new(three_results));

        handle.set_query("힐스테이트").unwrap();
        ms(600).await;

        let state = handle.state();
        assert_eq!(state.results.len(), 3);
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert!(alerts.taken().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn loading_is_true_while_request_is_pending() {
        let backend = ScriptedBackend::new(three_results);
        let release = backend.gate();
        let (handle, _calls, _alerts) = start(backend);

        handle.set_query("래미안").unwrap();
        ms(600).await;
        assert!(handle.state().loading);

        release.send(Reply::Results(apartments(1))).unwrap();
        ms(1).await;
        let state = handle.state();
        assert!(!state.loading);
        assert_eq!(state.results.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn application_failure_sets_fixed_message_without_alert() {
        let (handle, _calls, alerts) = start(ScriptedBackend::new(rejected));

        handle.set_query("래미안").unwrap();
        ms(600).await;

        let state = handle.state();
        assert_eq!(state.error.as_deref(), Some("Search failed."));
        assert!(state.results.is_empty());
        assert!(!state.loading);
        assert!(alerts.taken().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_sets_error_and_alerts_once() {
        let (handle, calls, alerts) = start(ScriptedBackend::new(refused));

        handle.set_query("래미안").unwrap();
        ms(2_000).await;

        assert_eq!(calls_of(&calls).len(), 1, "failures are not retried");
        let state = handle.state();
        let error = state.error.expect("error message");
        assert!(error.contains("connection refused"));
        assert!(state.results.is_empty());
        assert!(!state.loading);

        let alerts = alerts.taken();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::ConnectionError);
        assert!(alerts[0].message.contains("http://search.test"));
    }

    #[tokio::test(start_paused = true)]
    async fn crashed_request_task_clears_loading_and_alerts() {
        let (handle, calls, alerts) = start(ScriptedBackend::new(crashes));

        handle.set_query("래미안").unwrap();
        ms(600).await;

        assert_eq!(calls_of(&calls).len(), 1);
        let state = handle.state();
        assert!(!state.loading);
        assert!(state.results.is_empty());
        let error = state.error.expect("error message");
        assert!(error.starts_with("Connection error: "));
        assert!(error.contains("panicked"));

        let alerts = alerts.taken();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::ConnectionError);

        handle.set_query("래미안 대치").unwrap();
        ms(600).await;
        assert_eq!(calls_of(&calls).len(), 2, "controller keeps serving after a crash");
        assert!(!handle.state().loading);
    }

    #[tokio::test(start_paused = true)]
    async fn limit_change_redispatches_without_keystroke() {
        let (handle, calls, _alerts) = start(ScriptedBackend::new(three_results));

        handle.set_query("힐스테이트").unwrap();
        ms(600).await;
        handle.set_limit(ResultLimit::Twenty).unwrap();
        ms(600).await;

        assert_eq!(
            calls_of(&calls),
            vec![
                ("힐스테이트".to_string(), 10),
                ("힐스테이트".to_string(), 20)
            ]
        );
        assert_eq!(handle.state().limit, ResultLimit::Twenty);
    }

    #[tokio::test(start_paused = true)]
    async fn limit_change_with_short_query_only_stores_limit() {
        let (handle, calls, _alerts) = start(ScriptedBackend::new(three_results));

        handle.set_query("힐").unwrap();
        handle.set_limit(ResultLimit::Fifty).unwrap();
        ms(2_000).await;

        assert!(calls_of(&calls).is_empty());
        assert_eq!(handle.state().limit, ResultLimit::Fifty);
    }

    #[tokio::test(start_paused = true)]
    async fn identical_queries_in_separate_cycles_both_hit_network() {
        let (handle, calls, _alerts) = start(ScriptedBackend::new(three_results));

        handle.set_query("래미안").unwrap();
        ms(600).await;
        handle.set_query("래미").unwrap();
        ms(600).await;
        handle.set_query("래미안").unwrap();
        ms(600).await;
        handle.submit().unwrap();
        ms(10).await;

        let calls = calls_of(&calls);
        let repeated = calls.iter().filter(|(q, l)| q == "래미안" && *l == 10).count();
        assert_eq!(calls.len(), 4);
        assert_eq!(repeated, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_response_does_not_touch_state() {
        let backend = ScriptedBackend::new(three_results);
        let first = backend.gate();
        let second = backend.gate();
        let (handle, calls, alerts) = start(backend);

        handle.set_query("힐스").unwrap();
        ms(600).await;
        handle.set_query("힐스테이트").unwrap();
        ms(600).await;
        assert_eq!(calls_of(&calls).len(), 2);

        // The first request was superseded; whatever it yields must be ignored.
        let _ = first.send(Reply::Transport("late failure".into()));
        ms(10).await;
        let state = handle.state();
        assert!(state.loading);
        assert!(state.error.is_none());
        assert!(alerts.taken().is_empty());

        second.send(Reply::Results(apartments(2))).unwrap();
        ms(10).await;
        let state = handle.state();
        assert!(!state.loading);
        assert_eq!(state.results.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_below_minimum_cancels_timer_and_pending_response() {
        let backend = ScriptedBackend::new(three_results);
        let pending = backend.gate();
        let (handle, calls, _alerts) = start(backend);

        handle.set_query("래미안").unwrap();
        ms(600).await;
        assert!(handle.state().loading);

        handle.set_query("래").unwrap();
        ms(1).await;
        let state = handle.state();
        assert!(!state.loading);
        assert!(state.results.is_empty());

        let _ = pending.send(Reply::Results(apartments(3)));
        ms(10).await;
        assert!(handle.state().results.is_empty());

        handle.set_query("래미").unwrap();
        ms(100).await;
        handle.set_query("래").unwrap();
        ms(2_000).await;
        assert_eq!(calls_of(&calls).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_skips_quiet_window() {
        let (handle, calls, _alerts) = start(ScriptedBackend::new(three_results));

        handle.set_query("래미안").unwrap();
        handle.submit().unwrap();
        ms(1).await;
        assert_eq!(calls_of(&calls), vec![("래미안".to_string(), 10)]);

        ms(2_000).await;
        assert_eq!(calls_of(&calls).len(), 1, "pending deadline was cancelled");
    }

    #[tokio::test(start_paused = true)]
    async fn submit_with_short_query_raises_notice() {
        let (handle, calls, alerts) = start(ScriptedBackend::new(three_results));

        handle.set_query("a").unwrap();
        handle.submit().unwrap();
        ms(10).await;

        assert!(calls_of(&calls).is_empty());
        let alerts = alerts.taken();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Notice);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_timer() {
        let (handle, calls, _alerts) = start(ScriptedBackend::new(three_results));

        handle.set_query("래미안").unwrap();
        ms(100).await;
        handle.shutdown().await;
        ms(2_000).await;

        assert!(calls_of(&calls).is_empty());
        assert!(matches!(
            handle.set_query("힐스테이트"),
            Err(AptSearchError::ControllerClosed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_loading_then_results() {
        let backend = ScriptedBackend::new(three_results);
        let release = backend.gate();
        let (handle, _calls, _alerts) = start(backend);
        let mut rx = handle.subscribe();

        handle.set_query("래미안").unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().query, "래미안");

        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().loading);

        release.send(Reply::Results(apartments(3))).unwrap();
        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert!(!state.loading);
        assert_eq!(state.results.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_completion_is_ignored_by_guard() {
        let mut controller = SearchController::new(
            Arc::new(ScriptedBackend::new(three_results)),
            Arc::new(RecordingAlerts::default()),
            SearchSettings::default(),
        );
        controller.state.query = "래미안".into();

        let old = controller.tokens.mint();
        let current = controller.tokens.mint();
        controller.state.begin_request();

        controller.complete(Completion {
            token: old,
            query: "래미".into(),
            resolution: Resolution::Results(apartments(5)),
        });
        assert!(controller.state.loading);
        assert!(controller.state.results.is_empty());

        controller.complete(Completion {
            token: current,
            query: "래미안".into(),
            resolution: Resolution::Results(apartments(2)),
        });
        assert!(!controller.state.loading);
        assert_eq!(controller.state.results.len(), 2);
    }
}
