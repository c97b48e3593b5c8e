//! Browser driver abstraction.
//!
//! The runner and the accessibility capture talk to the page only through
//! [`BrowserDriver`], and obtain sessions through [`BrowserLauncher`]. The CDP
//! implementation lives in `browser` (feature `browser`); [`MockDriver`] and
//! [`MockLauncher`] are deterministic stand-ins that record every call.

use crate::a11y::A11yNode;
use crate::ir::WaitUntil;
use crate::query::Query;
use crate::result::{Spec2IrError, Spec2IrResult};
use crate::url_match::url_matches;
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

/// Environment variable controlling headless mode
pub const HEADLESS_ENV: &str = "SPEC2IR_HEADLESS";

/// Per-session browser configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Run without a window
    pub headless: bool,
    /// Accept self-signed certificates
    pub ignore_https_errors: bool,
    /// Upper bound for `goto`
    pub navigation_timeout: Duration,
    /// Auto-wait bound for `fill` / `click` targets
    pub action_timeout: Duration,
    /// Bound for `visible_text` expectations
    pub expect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            ignore_https_errors: true,
            navigation_timeout: Duration::from_secs(30),
            action_timeout: Duration::from_secs(30),
            expect_timeout: Duration::from_secs(5),
        }
    }
}

impl SessionConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with headless mode read from `SPEC2IR_HEADLESS`
    #[must_use]
    pub fn from_env() -> Self {
        let raw = std::env::var(HEADLESS_ENV).ok();
        Self::default().with_headless(headless_flag(raw.as_deref()))
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Accept or reject invalid certificates
    #[must_use]
    pub const fn with_ignore_https_errors(mut self, ignore: bool) -> Self {
        self.ignore_https_errors = ignore;
        self
    }

    /// Set navigation timeout
    #[must_use]
    pub const fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Set the fill/click auto-wait timeout
    #[must_use]
    pub const fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Set the expectation timeout
    #[must_use]
    pub const fn with_expect_timeout(mut self, timeout: Duration) -> Self {
        self.expect_timeout = timeout;
        self
    }
}

/// Unset means headless; `0`, `false`, `no` and `off` turn it off.
fn headless_flag(raw: Option<&str>) -> bool {
    raw.map_or(true, |v| {
        !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off")
    })
}

/// One live page in an isolated browser session
#[async_trait]
pub trait BrowserDriver: Send + fmt::Debug {
    /// Load `url` and wait for `wait_until`, at most `timeout`
    async fn navigate(&mut self, url: &str, wait_until: WaitUntil, timeout: Duration)
        -> Spec2IrResult<()>;

    /// Replace the content of the matched input
    async fn fill(&mut self, query: &Query, value: &str, timeout: Duration) -> Spec2IrResult<()>;

    /// Click the matched element
    async fn click(&mut self, query: &Query, timeout: Duration) -> Spec2IrResult<()>;

    /// Wait until the page URL matches `pattern` (see [`url_matches`])
    async fn wait_for_url(&mut self, pattern: &str, timeout: Duration) -> Spec2IrResult<()>;

    /// Wait until the matched element is visible
    async fn wait_for(&mut self, query: &Query, timeout: Duration) -> Spec2IrResult<()>;

    /// Current page URL
    async fn current_url(&mut self) -> Spec2IrResult<String>;

    /// Structured accessibility tree, if the engine offers one
    async fn accessibility_snapshot(&mut self) -> Spec2IrResult<Option<A11yNode>>;

    /// Textual aria snapshot of the page body
    async fn aria_snapshot(&mut self) -> Spec2IrResult<String>;

    /// Tear the session down
    async fn close(&mut self) -> Spec2IrResult<()>;
}

/// Opens fresh, isolated browser sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync + fmt::Debug {
    /// Launch a session configured by `config`
    async fn launch(&self, config: &SessionConfig) -> Spec2IrResult<Box<dyn BrowserDriver>>;
}

/// An open session that must be finished exactly once.
///
/// ```ignore
/// let mut session = BrowserSession::open(launcher, &config).await?;
/// let outcome = work(session.driver()).await;
/// session.finish(outcome).await
/// ```
#[derive(Debug)]
pub struct BrowserSession {
    driver: Box<dyn BrowserDriver>,
}

impl BrowserSession {
    /// Launch a session
    ///
    /// # Errors
    /// Returns the launcher's error.
    pub async fn open(launcher: &dyn BrowserLauncher, config: &SessionConfig) -> Spec2IrResult<Self> {
        let driver = launcher.launch(config).await?;
        Ok(Self { driver })
    }

    /// The session's page
    pub fn driver(&mut self) -> &mut dyn BrowserDriver {
        self.driver.as_mut()
    }

    /// Close the session, then return `outcome`.
    ///
    /// The outcome's error wins over a close error; a close error is only
    /// returned when the work itself succeeded.
    ///
    /// # Errors
    /// The work's error, or the close error.
    pub async fn finish<T>(mut self, outcome: Spec2IrResult<T>) -> Spec2IrResult<T> {
        let closed = self.driver.close().await;
        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                warn!(error = %close_err, "failed to close browser session");
                Err(err)
            }
        }
    }
}

/// Shared call journal for a launcher and the drivers it hands out
type Journal = Arc<Mutex<Vec<String>>>;

/// Mock driver for unit testing
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    /// Current URL
    pub current_url: String,
    /// URL the page moves to after any click
    pub url_after_click: Option<String>,
    /// Texts visible on the page
    pub visible_texts: Vec<String>,
    /// Rendered queries that match nothing
    pub missing: Vec<String>,
    /// URLs whose navigation never settles
    pub slow_urls: Vec<String>,
    /// URLs whose navigation fails outright
    pub broken_urls: Vec<String>,
    /// Structured snapshot to return
    pub a11y_snapshot: Option<A11yNode>,
    /// Aria snapshot text to return
    pub aria_snapshot: Option<String>,
    /// Make `close` fail
    pub fail_close: bool,
    /// Values written by `fill`, keyed by rendered query
    pub filled: Vec<(String, String)>,
    /// Call history for verification
    pub call_history: Vec<String>,
    journal: Option<Journal>,
}

impl MockDriver {
    /// Create new mock driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to `url` after any click
    #[must_use]
    pub fn with_url_after_click(mut self, url: impl Into<String>) -> Self {
        self.url_after_click = Some(url.into());
        self
    }

    /// Make text visible
    #[must_use]
    pub fn with_visible_text(mut self, text: impl Into<String>) -> Self {
        self.visible_texts.push(text.into());
        self
    }

    /// Make a query resolve to nothing (matched on its rendered form)
    #[must_use]
    pub fn with_missing(mut self, query: impl Into<String>) -> Self {
        self.missing.push(query.into());
        self
    }

    /// Make navigation to `url` time out
    #[must_use]
    pub fn with_navigation_timeout(mut self, url: impl Into<String>) -> Self {
        self.slow_urls.push(url.into());
        self
    }

    /// Make navigation to `url` fail
    #[must_use]
    pub fn with_broken_url(mut self, url: impl Into<String>) -> Self {
        self.broken_urls.push(url.into());
        self
    }

    /// Set the structured accessibility snapshot
    #[must_use]
    pub fn with_a11y_snapshot(mut self, tree: A11yNode) -> Self {
        self.a11y_snapshot = Some(tree);
        self
    }

    /// Set the aria snapshot text
    #[must_use]
    pub fn with_aria_snapshot(mut self, text: impl Into<String>) -> Self {
        self.aria_snapshot = Some(text.into());
        self
    }

    /// Make `close` fail
    #[must_use]
    pub const fn with_failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.call_history
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.call_history.iter().any(|c| c.starts_with(method))
    }

    fn record(&mut self, call: String) {
        if let Some(journal) = &self.journal {
            if let Ok(mut entries) = journal.lock() {
                entries.push(call.clone());
            }
        }
        self.call_history.push(call);
    }

    fn resolve(&self, query: &Query) -> Spec2IrResult<()> {
        let rendered = query.to_string();
        let found = match query {
            Query::Text(text) => self.text_visible(text),
            _ => !self.missing.contains(&rendered),
        };
        if found {
            Ok(())
        } else {
            Err(Spec2IrError::ElementNotFound { query: rendered })
        }
    }

    fn text_visible(&self, text: &str) -> bool {
        self.visible_texts.iter().any(|t| t.contains(text))
    }
}

/// Whole milliseconds of `duration`, saturating at `u64::MAX`
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn navigate(
        &mut self,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Spec2IrResult<()> {
        self.record(format!("navigate:{url}:{}", wait_until.as_str()));
        if self.slow_urls.iter().any(|u| u == url) {
            return Err(Spec2IrError::NavigationTimeout {
                url: url.to_string(),
                ms: millis(timeout),
            });
        }
        if self.broken_urls.iter().any(|u| u == url) {
            return Err(Spec2IrError::Navigation {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_REFUSED".to_string(),
            });
        }
        self.current_url = url.to_string();
        Ok(())
    }

    async fn fill(&mut self, query: &Query, value: &str, _timeout: Duration) -> Spec2IrResult<()> {
        self.record(format!("fill:{query}={value}"));
        self.resolve(query)?;
        self.filled.push((query.to_string(), value.to_string()));
        Ok(())
    }

    async fn click(&mut self, query: &Query, _timeout: Duration) -> Spec2IrResult<()> {
        self.record(format!("click:{query}"));
        self.resolve(query)?;
        if let Some(url) = self.url_after_click.clone() {
            self.current_url = url;
        }
        Ok(())
    }

    async fn wait_for_url(&mut self, pattern: &str, timeout: Duration) -> Spec2IrResult<()> {
        self.record(format!("wait_for_url:{pattern}"));
        if url_matches(&self.current_url, pattern) {
            Ok(())
        } else {
            Err(Spec2IrError::Timeout {
                what: format!("URL matching {pattern} (at {})", self.current_url),
                ms: millis(timeout),
            })
        }
    }

    async fn wait_for(&mut self, query: &Query, timeout: Duration) -> Spec2IrResult<()> {
        self.record(format!("wait_for:{query}"));
        self.resolve(query).map_err(|_| Spec2IrError::Timeout {
            what: query.to_string(),
            ms: millis(timeout),
        })
    }

    async fn current_url(&mut self) -> Spec2IrResult<String> {
        Ok(self.current_url.clone())
    }

    async fn accessibility_snapshot(&mut self) -> Spec2IrResult<Option<A11yNode>> {
        self.record("accessibility_snapshot".to_string());
        Ok(self.a11y_snapshot.clone())
    }

    async fn aria_snapshot(&mut self) -> Spec2IrResult<String> {
        self.record("aria_snapshot".to_string());
        self.aria_snapshot
            .clone()
            .ok_or_else(|| Spec2IrError::page("No mock aria snapshot set"))
    }

    async fn close(&mut self) -> Spec2IrResult<()> {
        self.record("close".to_string());
        if self.fail_close {
            return Err(Spec2IrError::page("mock close failure"));
        }
        Ok(())
    }
}

/// Mock launcher handing out clones of a template [`MockDriver`].
///
/// Clones share one journal, so calls made by the sessions it launched stay
/// observable after the sessions are gone.
#[derive(Debug, Clone, Default)]
pub struct MockLauncher {
    template: MockDriver,
    journal: Journal,
    launches: Arc<Mutex<Vec<SessionConfig>>>,
    fail_launch: Option<String>,
}

impl MockLauncher {
    /// Create a launcher for copies of `template`
    #[must_use]
    pub fn new(template: MockDriver) -> Self {
        Self {
            template,
            ..Self::default()
        }
    }

    /// Make every launch fail with `message`
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_launch: Some(message.into()),
            ..Self::default()
        }
    }

    /// Every call made by every session, in order
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.journal.lock().map(|j| j.clone()).unwrap_or_default()
    }

    /// Check if method was called by any session
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.history().iter().any(|c| c.starts_with(method))
    }

    /// Configs of every launch, in order
    #[must_use]
    pub fn launches(&self) -> Vec<SessionConfig> {
        self.launches.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self, config: &SessionConfig) -> Spec2IrResult<Box<dyn BrowserDriver>> {
        if let Ok(mut launches) = self.launches.lock() {
            launches.push(config.clone());
        }
        if let Some(message) = &self.fail_launch {
            return Err(Spec2IrError::BrowserLaunch {
                message: message.clone(),
            });
        }
        let mut driver = self.template.clone();
        driver.journal = Some(Arc::clone(&self.journal));
        Ok(Box::new(driver))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ir::Locator;

    mod config_tests {
        use super::*;

        #[test]
        fn test_session_config_defaults() {
            let config = SessionConfig::default();
            assert!(config.headless);
            assert!(config.ignore_https_errors);
            assert_eq!(config.navigation_timeout, Duration::from_secs(30));
            assert_eq!(config.expect_timeout, Duration::from_secs(5));
        }

        #[test]
        fn test_headless_flag() {
            assert!(headless_flag(None));
            assert!(headless_flag(Some("1")));
            assert!(headless_flag(Some("yes")));
            assert!(!headless_flag(Some("0")));
            assert!(!headless_flag(Some(" False ")));
            assert!(!headless_flag(Some("off")));
        }

        #[test]
        fn test_builders() {
            let config = SessionConfig::new()
                .with_headless(false)
                .with_ignore_https_errors(false)
                .with_action_timeout(Duration::from_millis(10));
            assert!(!config.headless);
            assert!(!config.ignore_https_errors);
            assert_eq!(config.action_timeout, Duration::from_millis(10));
        }

        #[test]
        fn test_millis_saturates() {
            assert_eq!(millis(Duration::from_millis(15_000)), 15_000);
            assert_eq!(millis(Duration::from_micros(1_999)), 1);
            assert_eq!(millis(Duration::MAX), u64::MAX);
        }
    }

    mod mock_tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_records_calls_and_moves_after_click() {
            let mut driver = MockDriver::new().with_url_after_click("https://h/home");
            let button = Query::from(&Locator::role("button", "Go"));
            driver
                .navigate("https://h/", WaitUntil::Load, Duration::from_secs(1))
                .await
                .unwrap();
            driver.click(&button, Duration::from_secs(1)).await.unwrap();
            assert_eq!(driver.current_url().await.unwrap(), "https://h/home");
            assert_eq!(
                driver.history(),
                ["navigate:https://h/:load", "click:role=button[name=\"Go\"]"]
            );
            assert!(driver.was_called("click"));
        }

        #[tokio::test]
        async fn test_mock_missing_query() {
            let mut driver = MockDriver::new().with_missing("#gone");
            let err = driver
                .fill(&Query::Css("#gone".to_string()), "x", Duration::from_secs(1))
                .await
                .unwrap_err();
            assert!(matches!(err, Spec2IrError::ElementNotFound { .. }));
            assert!(driver.filled.is_empty());
        }

        #[tokio::test]
        async fn test_mock_wait_for_text_times_out() {
            let mut driver = MockDriver::new().with_visible_text("Welcome back");
            driver
                .wait_for(&Query::Text("Welcome".to_string()), Duration::from_millis(5))
                .await
                .unwrap();
            let err = driver
                .wait_for(&Query::Text("Goodbye".to_string()), Duration::from_millis(5))
                .await
                .unwrap_err();
            assert!(matches!(err, Spec2IrError::Timeout { ms: 5, .. }));
        }

        #[tokio::test]
        async fn test_launcher_shares_journal() {
            let launcher = MockLauncher::new(MockDriver::new());
            let mut driver = launcher.launch(&SessionConfig::default()).await.unwrap();
            driver.close().await.unwrap();
            assert_eq!(launcher.history(), vec!["close"]);
            assert_eq!(launcher.launches().len(), 1);
        }

        #[tokio::test]
        async fn test_failing_launcher() {
            let launcher = MockLauncher::failing("no chromium");
            let err = launcher.launch(&SessionConfig::default()).await.unwrap_err();
            assert!(err.to_string().contains("no chromium"));
        }
    }

    mod session_tests {
        use super::*;

        #[tokio::test]
        async fn test_finish_prefers_work_error_over_close_error() {
            let launcher = MockLauncher::new(MockDriver::new().with_failing_close());
            let session = BrowserSession::open(&launcher, &SessionConfig::default())
                .await
                .unwrap();
            let outcome: Spec2IrResult<()> = Err(Spec2IrError::assertion("work failed"));
            let err = session.finish(outcome).await.unwrap_err();
            assert!(err.is_assertion());
            assert!(launcher.was_called("close"));
        }

        #[tokio::test]
        async fn test_finish_reports_close_error_after_success() {
            let launcher = MockLauncher::new(MockDriver::new().with_failing_close());
            let session = BrowserSession::open(&launcher, &SessionConfig::default())
                .await
                .unwrap();
            let err = session.finish(Ok(1)).await.unwrap_err();
            assert!(matches!(err, Spec2IrError::Page { .. }));
        }

        #[tokio::test]
        async fn test_finish_passes_value_through() {
            let launcher = MockLauncher::new(MockDriver::new());
            let mut session = BrowserSession::open(&launcher, &SessionConfig::default())
                .await
                .unwrap();
            let url = session.driver().current_url().await;
            assert_eq!(session.finish(url).await.unwrap(), "");
        }
    }
}
