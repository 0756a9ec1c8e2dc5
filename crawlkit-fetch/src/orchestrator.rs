//! The escalating fetch orchestrator.
//!
//! Walks the enabled entries of a mode's chain in order:
//!
//! 1. Runs the backend under a per-attempt timeout.
//! 2. A direct-HTTP response carrying a bot-protection signature jumps to
//!    the next browser entry in the chain.
//! 3. A valid response failing the size/type gate advances to the next entry.
//! 4. The first valid response that passes the gate is returned. If it did not
//!    come from the first entry, that entry is promoted to the front of the
//!    mode's chain for later fetches.
//! 5. When every entry failed, the last response is returned with status 500
//!    (if nothing was fetched) and every error collected along the way.
//!
//! The orchestrator never fails; all failure is reported in the response.

use async_trait::async_trait;
use crawlkit_core::{FetchRequest, NormalizedResponse, protection_header};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::backend::{
    BackendDescriptor, BackendFactory, BackendKind, FetchBackend, StandardBackendFactory,
};
use crate::chain::{Mode, ModeTable};
use crate::config::EngineConfig;
use crate::error::FetchError;

/// Extra time a backend gets beyond its own timeout before it is dropped.
pub const ATTEMPT_GRACE: Duration = Duration::from_secs(2);

/// Status returned when every backend failed without fetching anything.
pub const EXHAUSTED_STATUS: u16 = 500;

// ============================================================================
// Fetch Options
// ============================================================================

/// Per-call overrides of the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Default per-attempt timeout.
    pub timeout: Option<Duration>,
    /// User agent.
    pub user_agent: Option<String>,
    /// TLS verification.
    pub ssl_verify: Option<bool>,
    /// Size limit in bytes.
    pub max_content_length: Option<u64>,
    /// `Accept` header.
    pub accept: Option<String>,
}

impl FetchOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Enables or disables TLS verification.
    #[must_use]
    pub fn with_ssl_verify(mut self, verify: bool) -> Self {
        self.ssl_verify = Some(verify);
        self
    }

    /// Sets the size limit.
    #[must_use]
    pub fn with_max_content_length(mut self, bytes: u64) -> Self {
        self.max_content_length = Some(bytes);
        self
    }

    /// Sets the `Accept` header.
    #[must_use]
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }
}

// ============================================================================
// Fetch Attempt
// ============================================================================

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AttemptOutcome {
    /// Returned to the caller.
    Success,
    /// Protection detected; the chain jumped to `target`.
    Escalated {
        /// Backend escalated to.
        target: String,
    },
    /// Valid response rejected by the size/type gate.
    ContentRejected,
    /// Hard failure.
    Failed,
}

/// Record of a single attempt.
#[derive(Debug, Clone, Serialize)]
pub struct FetchAttempt {
    /// Descriptor name.
    pub backend: String,
    /// Backend kind.
    pub kind: BackendKind,
    /// Status the backend returned.
    pub status_code: u16,
    /// How the attempt ended.
    pub outcome: AttemptOutcome,
    /// Last error reported by the attempt.
    pub error: Option<String>,
    /// How long the attempt took.
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl FetchAttempt {
    /// True if this attempt jumped the chain.
    pub fn escalated(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Escalated { .. })
    }
}

// ============================================================================
// Fetch Outcome
// ============================================================================

/// Response plus the history of how it was obtained.
#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    /// Mode walked.
    pub mode: Mode,
    /// Final response.
    pub response: NormalizedResponse,
    /// All attempts made, in order.
    pub attempts: Vec<FetchAttempt>,
    /// Total duration.
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl FetchOutcome {
    /// Returns true if some backend succeeded.
    pub fn is_success(&self) -> bool {
        self.attempts
            .last()
            .is_some_and(|a| a.outcome == AttemptOutcome::Success)
    }

    /// Returns the number of attempts.
    pub fn attempts_count(&self) -> usize {
        self.attempts.len()
    }

    /// Returns the backend that succeeded, if any.
    pub fn successful_backend(&self) -> Option<&str> {
        self.is_success()
            .then(|| self.attempts.last().map(|a| a.backend.as_str()))
            .flatten()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

// ============================================================================
// Page Source
// ============================================================================

/// Anything that can turn a URL into a response.
///
/// The seam used by the politeness cache and the site handlers, so they can
/// be tested without real backends.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches a page in the given mode. Never fails.
    async fn fetch_page(&self, url: &str, mode: Mode) -> NormalizedResponse;
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Walks mode chains and escalates between backends.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<EngineConfig>,
    chains: Arc<ModeTable>,
    factory: Arc<dyn BackendFactory>,
    heavy_limiter: Option<Arc<Semaphore>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("chains", &self.chains)
            .field("heavy_limiter", &self.heavy_limiter)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator with the real backends.
    pub fn new(config: EngineConfig) -> Self {
        let config = Arc::new(config);
        let factory = Arc::new(StandardBackendFactory::new(Arc::clone(&config)));
        Self::with_factory(config, factory)
    }

    /// Creates an orchestrator with a custom backend factory.
    pub fn with_factory(config: Arc<EngineConfig>, factory: Arc<dyn BackendFactory>) -> Self {
        let heavy_limiter = config
            .max_heavy_backends
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));
        Self {
            chains: Arc::new(ModeTable::from_config(&config)),
            config,
            factory,
            heavy_limiter,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared chains, including any reordering done so far.
    pub fn chains(&self) -> &ModeTable {
        &self.chains
    }

    /// Fetches `url`, returning only the final response.
    pub async fn orchestrate(&self, url: &str, mode: Mode, options: &FetchOptions) -> NormalizedResponse {
        self.orchestrate_detailed(url, mode, options).await.response
    }

    /// Fetches `url`, returning the response and the attempt history.
    #[instrument(skip(self, options), fields(url = %url, mode = %mode))]
    pub async fn orchestrate_detailed(
        &self,
        url: &str,
        mode: Mode,
        options: &FetchOptions,
    ) -> FetchOutcome {
        let start = Instant::now();
        let chain = self.chains.snapshot(mode).await;
        let entries: Vec<&BackendDescriptor> = chain.enabled().collect();
        let request = self.build_request(url, options);
        let default_timeout = options.timeout.unwrap_or_else(|| self.config.timeout());

        let mut attempts = Vec::new();
        if entries.is_empty() {
            let error = FetchError::NoBackends(mode.to_string());
            warn!(error = %error, "Nothing to try");
            return FetchOutcome {
                mode,
                response: NormalizedResponse::failed(url, error.to_string())
                    .with_status(EXHAUSTED_STATUS),
                attempts,
                duration: start.elapsed(),
            };
        }

        info!(count = entries.len(), "Executing fetch chain");

        let mut errors: Vec<String> = Vec::new();
        let mut last: Option<NormalizedResponse> = None;
        let mut index = 0;

        while index < entries.len() {
            let descriptor = entries[index];
            let timeout = descriptor.timeout().unwrap_or(default_timeout);
            let attempt_start = Instant::now();

            debug!(backend = %descriptor.name, kind = ?descriptor.kind, timeout = ?timeout, "Attempting");
            let response = self.attempt(descriptor, &request, timeout).await;
            let duration = attempt_start.elapsed();
            errors.extend(response.errors.iter().cloned());

            let mut record = FetchAttempt {
                backend: descriptor.name.clone(),
                kind: descriptor.kind,
                status_code: response.status_code,
                outcome: AttemptOutcome::Failed,
                error: response.errors.last().cloned(),
                duration,
            };

            // Protection: jump ahead to the next browser entry.
            if descriptor.kind == BackendKind::Http && response.is_protected() {
                let target = entries[index + 1..]
                    .iter()
                    .position(|d| d.kind.is_browser())
                    .map(|offset| index + 1 + offset);
                if let Some(target) = target {
                    let error = FetchError::ProtectionDetected {
                        status: response.status_code,
                        header: protection_header(&response.headers)
                            .unwrap_or_default()
                            .to_string(),
                        target: entries[target].name.clone(),
                    };
                    warn!(error = %error, "Escalating");
                    errors.push(error.to_string());
                    record.error = Some(error.to_string());
                    record.outcome = AttemptOutcome::Escalated {
                        target: entries[target].name.clone(),
                    };
                    attempts.push(record);
                    last = Some(response);
                    index = target;
                    continue;
                }
            }

            if response.is_valid() {
                if let Some(error) = content_error(&response, request.max_content_length) {
                    debug!(backend = %descriptor.name, error = %error, "Content rejected");
                    errors.push(error.to_string());
                    record.error = Some(error.to_string());
                    record.outcome = AttemptOutcome::ContentRejected;
                    attempts.push(record);
                    last = Some(response);
                    index += 1;
                    continue;
                }

                record.outcome = AttemptOutcome::Success;
                attempts.push(record);
                info!(
                    backend = %descriptor.name,
                    status = response.status_code,
                    duration = ?duration,
                    "Fetch succeeded"
                );
                if index > 0 {
                    self.chains.bring_to_front(mode, &descriptor.name).await;
                }
                return FetchOutcome {
                    mode,
                    response,
                    attempts,
                    duration: start.elapsed(),
                };
            }

            debug!(backend = %descriptor.name, status = response.status_code, "Attempt failed");
            attempts.push(record);
            last = Some(response);
            index += 1;
        }

        let mut response = last.unwrap_or_else(|| NormalizedResponse::new(url));
        if response.status_code == 0 {
            response.status_code = EXHAUSTED_STATUS;
        }
        response.errors = errors;
        warn!(
            attempts = attempts.len(),
            status = response.status_code,
            "All backends failed"
        );

        FetchOutcome {
            mode,
            response,
            attempts,
            duration: start.elapsed(),
        }
    }

    fn build_request(&self, url: &str, options: &FetchOptions) -> FetchRequest {
        let mut request = self.config.request_for(url);
        if let Some(user_agent) = &options.user_agent {
            request.user_agent = Some(user_agent.clone());
        }
        if let Some(verify) = options.ssl_verify {
            request.ssl_verify = verify;
        }
        if let Some(limit) = options.max_content_length {
            request.max_content_length = limit;
        }
        request.accept.clone_from(&options.accept);
        request
    }

    /// Runs one backend, holding a heavy-backend permit when required.
    async fn attempt(
        &self,
        descriptor: &BackendDescriptor,
        request: &FetchRequest,
        timeout: Duration,
    ) -> NormalizedResponse {
        let _permit = match &self.heavy_limiter {
            Some(limiter) if descriptor.kind.is_heavy() => match limiter.acquire().await {
                Ok(permit) => Some(permit),
                Err(e) => {
                    warn!(error = %e, "Heavy backend limiter closed, running unthrottled");
                    None
                }
            },
            _ => None,
        };

        let backend = self.factory.build(descriptor);
        match tokio::time::timeout(timeout + ATTEMPT_GRACE, backend.fetch(request, timeout)).await {
            Ok(response) => response,
            Err(_) => {
                warn!(backend = %descriptor.name, timeout = ?timeout, "Backend overran its timeout");
                NormalizedResponse::failed(&request.url, FetchError::Timeout(timeout).to_string())
                    .with_backend(&descriptor.name)
            }
        }
    }
}

/// Size/type gate applied to valid responses.
///
/// Size is the largest of the declared length and what was actually kept, so
/// bodies cut off at the limit are still rejected.
fn content_error(response: &NormalizedResponse, limit: u64) -> Option<FetchError> {
    let kept = response
        .body
        .as_ref()
        .map_or(0, Vec::len)
        .max(response.text.as_ref().map_or(0, String::len)) as u64;
    let length = response.get_content_length().max(kept);

    if length > limit {
        return Some(FetchError::ContentTooLarge { length, limit });
    }
    if !response.is_content_type_supported() {
        return Some(FetchError::UnsupportedContentType(
            response.get_content_type().map(str::to_string),
        ));
    }
    None
}

#[async_trait]
impl PageSource for Orchestrator {
    async fn fetch_page(&self, url: &str, mode: Mode) -> NormalizedResponse {
        self.orchestrate(url, mode, &FetchOptions::default()).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ModeChain;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend returning a canned response.
    struct MockBackend {
        response: NormalizedResponse,
    }

    #[async_trait]
    impl FetchBackend for MockBackend {
        async fn fetch(&self, request: &FetchRequest, _timeout: Duration) -> NormalizedResponse {
            let mut response = self.response.clone();
            response.requested_url.clone_from(&request.url);
            response
        }
    }

    /// Factory handing out canned responses by descriptor name.
    #[derive(Default)]
    struct MockFactory {
        responses: HashMap<String, NormalizedResponse>,
        calls: Mutex<Vec<String>>,
    }

    impl MockFactory {
        fn respond(mut self, name: &str, response: NormalizedResponse) -> Self {
            self.responses.insert(name.to_string(), response.with_backend(name));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl BackendFactory for MockFactory {
        fn build(&self, descriptor: &BackendDescriptor) -> Box<dyn FetchBackend> {
            self.calls.lock().unwrap().push(descriptor.name.clone());
            let response = self
                .responses
                .get(&descriptor.name)
                .cloned()
                .unwrap_or_else(|| NormalizedResponse::failed("", "no canned response"));
            Box::new(MockBackend { response })
        }
    }

    fn page(status: u16, headers: &[(&str, &str)]) -> NormalizedResponse {
        let mut response = NormalizedResponse::new("https://example.org/").with_status(status);
        response.headers = headers.iter().copied().collect();
        response.text = Some("<html></html>".into());
        response
    }

    fn html(status: u16) -> NormalizedResponse {
        page(status, &[("Content-Type", "text/html")])
    }

    fn setup(chain: Vec<BackendDescriptor>, factory: MockFactory) -> (Orchestrator, Arc<MockFactory>) {
        let config = EngineConfig::default().with_chain(Mode::Standard, ModeChain::new(chain));
        let factory = Arc::new(factory);
        let orchestrator = Orchestrator::with_factory(Arc::new(config), factory.clone());
        (orchestrator, factory)
    }

    fn descriptor(name: &str, kind: BackendKind) -> BackendDescriptor {
        BackendDescriptor::new(name, kind)
    }

    #[tokio::test]
    async fn test_first_success_returns_immediately() {
        let (orchestrator, factory) = setup(
            vec![descriptor("a", BackendKind::Http), descriptor("b", BackendKind::Headless)],
            MockFactory::default().respond("a", html(200)),
        );

        let outcome = orchestrator
            .orchestrate_detailed("https://example.org/", Mode::Standard, &FetchOptions::default())
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.successful_backend(), Some("a"));
        assert_eq!(factory.calls(), vec!["a"]);
        assert_eq!(
            orchestrator.chains().snapshot(Mode::Standard).await.names(),
            vec!["a", "b"]
        );
    }

    #[tokio::test]
    async fn test_protection_escalates_to_browser_and_reorders() {
        let protected = page(403, &[("Content-Type", "text/html"), ("cf-ray", "abc-AMS")]);
        let (orchestrator, factory) = setup(
            vec![
                descriptor("a", BackendKind::Http),
                descriptor("b", BackendKind::Headless),
                descriptor("c", BackendKind::Script),
            ],
            MockFactory::default()
                .respond("a", protected)
                .respond("b", html(200)),
        );

        let outcome = orchestrator
            .orchestrate_detailed("https://example.org/", Mode::Standard, &FetchOptions::default())
            .await;

        assert_eq!(outcome.response.status_code, 200);
        assert_eq!(outcome.response.backend.as_deref(), Some("b"));
        assert_eq!(factory.calls(), vec!["a", "b"]);
        assert!(outcome.attempts[0].escalated());
        assert_eq!(
            orchestrator.chains().snapshot(Mode::Standard).await.names(),
            vec!["b", "a", "c"]
        );
    }

    #[tokio::test]
    async fn test_escalation_skips_intermediate_entries() {
        let protected = page(503, &[("Content-Type", "text/html"), ("x-datadome", "1")]);
        let (orchestrator, factory) = setup(
            vec![
                descriptor("http", BackendKind::Http),
                descriptor("mirror", BackendKind::Server),
                descriptor("stealth", BackendKind::Stealth),
            ],
            MockFactory::default()
                .respond("http", protected)
                .respond("mirror", html(200))
                .respond("stealth", html(200)),
        );

        let response = orchestrator
            .orchestrate("https://example.org/", Mode::Standard, &FetchOptions::default())
            .await;
        assert_eq!(response.backend.as_deref(), Some("stealth"));
        assert_eq!(factory.calls(), vec!["http", "stealth"]);
    }

    #[tokio::test]
    async fn test_missing_content_type_advances_chain() {
        let untyped = page(200, &[]);
        let (orchestrator, factory) = setup(
            vec![descriptor("a", BackendKind::Http), descriptor("b", BackendKind::Headless)],
            MockFactory::default()
                .respond("a", untyped)
                .respond("b", html(200)),
        );

        let outcome = orchestrator
            .orchestrate_detailed("https://example.org/", Mode::Standard, &FetchOptions::default())
            .await;
        assert_eq!(factory.calls(), vec!["a", "b"]);
        assert_eq!(outcome.attempts[0].outcome, AttemptOutcome::ContentRejected);
        assert_eq!(outcome.successful_backend(), Some("b"));
    }

    #[tokio::test]
    async fn test_oversize_advances_chain() {
        let big = page(200, &[("Content-Type", "text/html"), ("Content-Length", "5000")]);
        let (orchestrator, _) = setup(
            vec![descriptor("a", BackendKind::Http), descriptor("b", BackendKind::Headless)],
            MockFactory::default().respond("a", big).respond("b", html(200)),
        );

        let options = FetchOptions::new().with_max_content_length(1000);
        let outcome = orchestrator
            .orchestrate_detailed("https://example.org/", Mode::Standard, &options)
            .await;
        assert_eq!(outcome.successful_backend(), Some("b"));
        assert!(outcome.attempts[0].error.as_deref().unwrap().contains("exceeds limit"));
    }

    #[tokio::test]
    async fn test_exhaustion_forces_500_and_keeps_errors() {
        let (orchestrator, _) = setup(
            vec![descriptor("a", BackendKind::Http), descriptor("b", BackendKind::Script)],
            MockFactory::default()
                .respond("a", NormalizedResponse::failed("https://example.org/", "first"))
                .respond("b", NormalizedResponse::failed("https://example.org/", "second")),
        );

        let response = orchestrator
            .orchestrate("https://example.org/", Mode::Standard, &FetchOptions::default())
            .await;
        assert_eq!(response.status_code, 500);
        assert_eq!(response.errors, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_exhaustion_keeps_real_status() {
        let (orchestrator, _) = setup(
            vec![descriptor("a", BackendKind::Http)],
            MockFactory::default().respond("a", html(404)),
        );
        let response = orchestrator
            .orchestrate("https://example.org/", Mode::Standard, &FetchOptions::default())
            .await;
        assert_eq!(response.status_code, 404);
    }

    #[tokio::test]
    async fn test_disabled_entries_are_skipped() {
        let (orchestrator, factory) = setup(
            vec![
                descriptor("a", BackendKind::Http).disabled(),
                descriptor("b", BackendKind::Headless),
            ],
            MockFactory::default().respond("b", html(200)),
        );
        orchestrator
            .orchestrate("https://example.org/", Mode::Standard, &FetchOptions::default())
            .await;
        assert_eq!(factory.calls(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let (orchestrator, _) = setup(Vec::new(), MockFactory::default());
        let response = orchestrator
            .orchestrate("https://example.org/", Mode::Standard, &FetchOptions::default())
            .await;
        assert_eq!(response.status_code, 500);
        assert!(response.errors[0].contains("No enabled backends"));
    }

    #[test]
    fn test_content_gate() {
        assert!(content_error(&html(200), 1000).is_none());
        assert!(matches!(
            content_error(&page(200, &[("Content-Type", "image/png")]), 1000),
            Some(FetchError::UnsupportedContentType(_))
        ));

        let mut truncated = html(200);
        truncated.body = Some(vec![b'x'; 1001]);
        assert!(matches!(
            content_error(&truncated, 1000),
            Some(FetchError::ContentTooLarge { length: 1001, limit: 1000 })
        ));
    }

    /// Backend that sleeps and records how many copies run at once.
    struct SlowBackend {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FetchBackend for SlowBackend {
        async fn fetch(&self, _request: &FetchRequest, _timeout: Duration) -> NormalizedResponse {
            let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            html(200)
        }
    }

    #[derive(Default)]
    struct SlowFactory {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl BackendFactory for SlowFactory {
        fn build(&self, _descriptor: &BackendDescriptor) -> Box<dyn FetchBackend> {
            Box::new(SlowBackend {
                active: Arc::clone(&self.active),
                peak: Arc::clone(&self.peak),
            })
        }
    }

    async fn peak_concurrency(config: EngineConfig) -> usize {
        let factory = Arc::new(SlowFactory::default());
        let orchestrator = Orchestrator::with_factory(Arc::new(config), factory.clone());
        let options = FetchOptions::default();

        let (first, second) = tokio::join!(
            orchestrator.orchestrate("https://example.org/a", Mode::Standard, &options),
            orchestrator.orchestrate("https://example.org/b", Mode::Standard, &options),
        );
        assert_eq!(first.status_code, 200);
        assert_eq!(second.status_code, 200);
        factory.peak.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_heavy_limiter_serializes_browser_attempts() {
        let chain = ModeChain::new(vec![descriptor("headless", BackendKind::Headless)]);
        let config = EngineConfig::default().with_chain(Mode::Standard, chain);

        assert_eq!(peak_concurrency(config.clone().with_max_heavy_backends(1)).await, 1);
        assert_eq!(peak_concurrency(config).await, 2);
    }

    #[tokio::test]
    async fn test_heavy_limiter_ignores_http() {
        let chain = ModeChain::new(vec![descriptor("requests", BackendKind::Http)]);
        let config = EngineConfig::default()
            .with_chain(Mode::Standard, chain)
            .with_max_heavy_backends(1);

        assert_eq!(peak_concurrency(config).await, 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hanging_script_is_killed_at_timeout() {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let pid_file = dir.path().join("pid");
        let script = dir.path().join("hang.sh");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho $$ > {}\nsleep 30\n", pid_file.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let chain = ModeChain::new(vec![
            descriptor("script", BackendKind::Script)
                .with_setting("script", script.display().to_string())
                .with_setting("timeout", 1),
        ]);
        let orchestrator = Orchestrator::new(EngineConfig::default().with_chain(Mode::Standard, chain));

        let started = Instant::now();
        let response = orchestrator
            .orchestrate("https://example.org/", Mode::Standard, &FetchOptions::default())
            .await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(response.status_code, 500);
        assert!(response.errors.iter().any(|e| e.contains("timed out")));

        let pid: i32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        assert!(kill(Pid::from_raw(pid), None).is_err());
    }
}
