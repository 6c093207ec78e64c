use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use headless_chrome::{Browser, Element, Tab};
use tracing::info;

use crate::locator::{Locator, Query};

/// One exclusively-owned connection to the remote browser plus one page,
/// scoped to a single run. Dropping the session releases the connection,
/// so every exit path of a run closes it exactly once.
pub struct BrowserSession {
    _browser: Browser,
    pub tab: Arc<Tab>,
}

impl BrowserSession {
    pub fn connect(endpoint: &str) -> Result<Self> {
        info!(%endpoint, "connecting to remote browser");
        let browser = Browser::connect(endpoint.to_string())
            .with_context(|| format!("could not connect to browser endpoint {endpoint}"))?;
        let tab = browser.new_tab().context("could not open a page")?;
        Ok(Self {
            _browser: browser,
            tab,
        })
    }
}

/// Resolve a step target to a live element, waiting up to `timeout`.
pub fn resolve_element<'a>(tab: &'a Tab, target: &str, timeout: Duration) -> Result<Element<'a>> {
    let locator = Locator::parse(target)?;
    tab.set_default_timeout(timeout);
    let element = match locator.query() {
        Query::Css(selector) => tab.wait_for_element(&selector),
        Query::XPath(xpath) => tab.wait_for_xpath(&xpath),
    };
    element.with_context(|| format!("no element matched {target:?}"))
}
