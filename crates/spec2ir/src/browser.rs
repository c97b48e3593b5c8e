//! Chromium over the DevTools protocol.
//!
//! Every element query and interaction is a JavaScript expression evaluated
//! in the page (see [`Query`]); waits poll that expression until it holds or
//! the timeout expires. Each launch is an isolated browser process.

#![allow(clippy::module_name_repetitions)]

use crate::a11y::{from_cdp_nodes, A11yNode};
use crate::driver::{millis, BrowserDriver, BrowserLauncher, SessionConfig};
use crate::ir::WaitUntil;
use crate::query::{aria_outline_js, Query};
use crate::result::{Spec2IrError, Spec2IrResult};
use crate::url_match::url_matches;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::accessibility::GetFullAxTreeParams;
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Interval between evaluations of a wait condition
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Quiet period after `load` that counts as network idle
const NETWORK_IDLE_WINDOW: Duration = Duration::from_millis(500);

const RESOURCE_COUNT_JS: &str = "performance.getEntriesByType('resource').length";

fn page_err(e: impl std::fmt::Display) -> Spec2IrError {
    Spec2IrError::page(e.to_string())
}

/// Launches headless (or headed) Chromium sessions
#[derive(Debug, Clone)]
pub struct CdpLauncher {
    chromium_path: Option<PathBuf>,
    sandbox: bool,
}

impl Default for CdpLauncher {
    fn default() -> Self {
        Self {
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl CdpLauncher {
    /// Launcher using the Chromium found on the system
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific Chromium binary
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Enable or disable the Chromium sandbox
    #[must_use]
    pub const fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }
}

#[async_trait]
impl BrowserLauncher for CdpLauncher {
    async fn launch(&self, config: &SessionConfig) -> Spec2IrResult<Box<dyn BrowserDriver>> {
        let mut builder = CdpConfig::builder();
        if !config.headless {
            builder = builder.with_head();
        }
        if !self.sandbox {
            builder = builder.no_sandbox();
        }
        if config.ignore_https_errors {
            builder = builder.arg("--ignore-certificate-errors");
        }
        if let Some(ref path) = self.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder
            .build()
            .map_err(|message| Spec2IrError::BrowserLaunch { message })?;

        let (browser, mut handler) =
            CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| Spec2IrError::BrowserLaunch {
                    message: e.to_string(),
                })?;

        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Spec2IrError::BrowserLaunch {
                message: e.to_string(),
            })?;
        debug!(
            headless = config.headless,
            ignore_https_errors = config.ignore_https_errors,
            "browser session launched"
        );
        Ok(Box::new(CdpDriver {
            browser,
            page,
            handle,
        }))
    }
}

/// One page of a launched Chromium process
#[derive(Debug)]
pub struct CdpDriver {
    browser: CdpBrowser,
    page: CdpPage,
    handle: tokio::task::JoinHandle<()>,
}

impl CdpDriver {
    async fn eval<T: DeserializeOwned>(&self, expr: &str) -> Spec2IrResult<T> {
        let result = self.page.evaluate(expr).await.map_err(page_err)?;
        result.into_value().map_err(page_err)
    }

    /// Evaluate `js` every [`POLL_INTERVAL`] until it is `true` or `timeout`
    /// passes. Evaluation errors (e.g. a context torn down by navigation)
    /// count as not yet.
    async fn poll_true(&self, js: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.eval::<bool>(js).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => debug!(error = %e, "wait condition not evaluable yet"),
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn network_idle(&self, deadline: Instant) -> bool {
        let mut last = self.eval::<u64>(RESOURCE_COUNT_JS).await.unwrap_or(0);
        let mut quiet_since = Instant::now();
        loop {
            if quiet_since.elapsed() >= NETWORK_IDLE_WINDOW {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            let count = self.eval::<u64>(RESOURCE_COUNT_JS).await.unwrap_or(last);
            if count != last {
                last = count;
                quiet_since = Instant::now();
            }
        }
    }

    async fn interact(&self, query: &Query, js: &str, timeout: Duration) -> Spec2IrResult<()> {
        let not_found = || Spec2IrError::ElementNotFound {
            query: query.to_string(),
        };
        if !self.poll_true(&query.to_visible_js(), timeout).await {
            return Err(not_found());
        }
        if self.eval::<bool>(js).await? {
            Ok(())
        } else {
            Err(not_found())
        }
    }
}

fn ready_state_js(wait_until: WaitUntil) -> &'static str {
    match wait_until {
        WaitUntil::DomContentLoaded => "document.readyState !== 'loading'",
        WaitUntil::Load | WaitUntil::NetworkIdle => "document.readyState === 'complete'",
    }
}

#[async_trait]
impl BrowserDriver for CdpDriver {
    async fn navigate(
        &mut self,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Spec2IrResult<()> {
        let deadline = Instant::now() + timeout;
        let timed_out = || Spec2IrError::NavigationTimeout {
            url: url.to_string(),
            ms: millis(timeout),
        };
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Err(_) => return Err(timed_out()),
            Ok(Err(e)) => {
                return Err(Spec2IrError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
            Ok(Ok(_)) => {}
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if !self.poll_true(ready_state_js(wait_until), remaining).await {
            return Err(timed_out());
        }
        if wait_until == WaitUntil::NetworkIdle && !self.network_idle(deadline).await {
            return Err(timed_out());
        }
        debug!(url, wait_until = wait_until.as_str(), "navigated");
        Ok(())
    }

    async fn fill(&mut self, query: &Query, value: &str, timeout: Duration) -> Spec2IrResult<()> {
        self.interact(query, &query.to_fill_js(value), timeout).await
    }

    async fn click(&mut self, query: &Query, timeout: Duration) -> Spec2IrResult<()> {
        self.interact(query, &query.to_click_js(), timeout).await
    }

    async fn wait_for_url(&mut self, pattern: &str, timeout: Duration) -> Spec2IrResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let url = self.current_url().await?;
            if url_matches(&url, pattern) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Spec2IrError::Timeout {
                    what: format!("URL matching {pattern} (at {url})"),
                    ms: millis(timeout),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for(&mut self, query: &Query, timeout: Duration) -> Spec2IrResult<()> {
        if self.poll_true(&query.to_visible_js(), timeout).await {
            Ok(())
        } else {
            Err(Spec2IrError::Timeout {
                what: query.to_string(),
                ms: millis(timeout),
            })
        }
    }

    async fn current_url(&mut self) -> Spec2IrResult<String> {
        Ok(self.page.url().await.map_err(page_err)?.unwrap_or_default())
    }

    async fn accessibility_snapshot(&mut self) -> Spec2IrResult<Option<A11yNode>> {
        let response = match self.page.execute(GetFullAxTreeParams::default()).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Accessibility.getFullAXTree failed");
                return Ok(None);
            }
        };
        let nodes = serde_json::to_value(&response.result.nodes)?;
        Ok(from_cdp_nodes(&nodes))
    }

    async fn aria_snapshot(&mut self) -> Spec2IrResult<String> {
        self.eval(&aria_outline_js()).await
    }

    async fn close(&mut self) -> Spec2IrResult<()> {
        let closed = self.browser.close().await.map_err(page_err);
        if closed.is_ok() {
            let _ = self.browser.wait().await;
        }
        self.handle.abort();
        closed.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_state_per_load_state() {
        assert!(ready_state_js(WaitUntil::DomContentLoaded).contains("!== 'loading'"));
        assert!(ready_state_js(WaitUntil::Load).contains("=== 'complete'"));
        assert_eq!(
            ready_state_js(WaitUntil::NetworkIdle),
            ready_state_js(WaitUntil::Load)
        );
    }

    #[test]
    fn test_launcher_builders() {
        let launcher = CdpLauncher::new()
            .with_sandbox(false)
            .with_chromium_path("/usr/bin/chromium");
        assert!(!launcher.sandbox);
        assert_eq!(
            launcher.chromium_path.as_deref(),
            Some(std::path::Path::new("/usr/bin/chromium"))
        );
        assert!(CdpLauncher::default().sandbox);
    }
}
