use crate::browser::{
    behavioral::BehavioralEngine,
    stealth::{evasion_scripts, UserAgentProfile},
};
use fantoccini::error::{CmdError, ErrorStatus};
use fantoccini::{elements::Element, Client, Locator};
use hireloop_config::StealthLevel;
use hireloop_engine::Fault;
use std::time::Duration;
use tracing::{debug, warn};

/// Page-level helpers over a WebDriver client. Every failure comes back as a
/// [`Fault`] so callers can hand it straight to the retry controller.
pub struct BrowserPage {
    client: Client,
    level: StealthLevel,
    profile: UserAgentProfile,
    behavior: BehavioralEngine,
    wait_timeout: Duration,
}

impl BrowserPage {
    pub fn new(
        client: Client,
        level: StealthLevel,
        profile: UserAgentProfile,
        behavior: BehavioralEngine,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            client,
            level,
            profile,
            behavior,
            wait_timeout,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn behavior(&self) -> &BehavioralEngine {
        &self.behavior
    }

    /// Navigate to `url` and apply the stealth scripts.
    pub async fn goto(&self, url: &str) -> Result<(), Fault> {
        self.behavior.pause().await;
        self.client
            .goto(url)
            .await
            .map_err(|err| classify(url, err))?;

        for script in evasion_scripts(self.level, &self.profile) {
            if let Err(err) = self.client.execute(&script, vec![]).await {
                if is_session_loss(&err) {
                    return Err(classify(url, err));
                }
                warn!(target: "browser.stealth", error = %err, "evasion script failed");
            }
        }
        Ok(())
    }

    /// Wait up to the configured timeout for `selector` to appear.
    pub async fn wait_for(&self, selector: &str) -> Result<Element, Fault> {
        self.client
            .wait()
            .at_most(self.wait_timeout)
            .for_element(Locator::Css(selector))
            .await
            .map_err(|err| classify(selector, err))
    }

    /// Look for `selector` without waiting.
    pub async fn find(&self, selector: &str) -> Result<Option<Element>, Fault> {
        match self.client.find(Locator::Css(selector)).await {
            Ok(element) => Ok(Some(element)),
            Err(err) if err.is_no_such_element() => Ok(None),
            Err(err) => Err(classify(selector, err)),
        }
    }

    pub async fn find_all(&self, selector: &str) -> Result<Vec<Element>, Fault> {
        self.client
            .find_all(Locator::Css(selector))
            .await
            .map_err(|err| classify(selector, err))
    }

    /// Visible text of the first match, if any.
    pub async fn text_of(&self, selector: &str) -> Result<Option<String>, Fault> {
        match self.find(selector).await? {
            Some(element) => Ok(Some(text(&element, selector).await?)),
            None => Ok(None),
        }
    }

    /// Visible text of every match.
    pub async fn texts_of(&self, selector: &str) -> Result<Vec<String>, Fault> {
        let mut out = Vec::new();
        for element in self.find_all(selector).await? {
            out.push(text(&element, selector).await?);
        }
        Ok(out)
    }

    /// Wait for `selector`, pause like a person would, then click it.
    pub async fn click(&self, selector: &str) -> Result<(), Fault> {
        let element = self.wait_for(selector).await?;
        self.behavior.pause().await;
        element
            .click()
            .await
            .map_err(|err| classify(selector, err))?;
        debug!(target: "browser.click", %selector, "clicked");
        Ok(())
    }

    /// Replace the contents of a text control, typing like a person.
    pub async fn fill(&self, element: &Element, value: &str) -> Result<(), Fault> {
        element
            .clear()
            .await
            .map_err(|err| classify("clear field", err))?;
        self.behavior
            .type_text_human_like(element, value)
            .await
            .map_err(|err| classify("type into field", err))
    }

    pub async fn screenshot(&self) -> Result<Vec<u8>, CmdError> {
        self.client.screenshot().await
    }
}

/// Visible text of an element, trimmed.
pub async fn text(element: &Element, context: &str) -> Result<String, Fault> {
    element
        .text()
        .await
        .map(|t| t.trim().to_string())
        .map_err(|err| classify(context, err))
}

/// First child matching `selector`, without waiting.
pub async fn child(element: &Element, selector: &str) -> Result<Option<Element>, Fault> {
    match element.find(Locator::Css(selector)).await {
        Ok(found) => Ok(Some(found)),
        Err(err) if err.is_no_such_element() => Ok(None),
        Err(err) => Err(classify(selector, err)),
    }
}

pub async fn children(element: &Element, selector: &str) -> Result<Vec<Element>, Fault> {
    element
        .find_all(Locator::Css(selector))
        .await
        .map_err(|err| classify(selector, err))
}

fn is_session_loss(err: &CmdError) -> bool {
    match err {
        CmdError::Lost(_) => true,
        CmdError::Standard(wd) => matches!(
            wd.error,
            ErrorStatus::InvalidSessionId | ErrorStatus::NoSuchWindow
        ),
        _ => false,
    }
}

/// Map a WebDriver error onto the engine's fault taxonomy.
pub fn classify(context: &str, err: CmdError) -> Fault {
    if is_session_loss(&err) {
        return Fault::SessionLost(format!("{context}: {err}"));
    }
    if err.is_no_such_element() || matches!(err, CmdError::WaitTimeout) {
        return Fault::ElementNotFound(context.to_string());
    }
    Fault::Transient(format!("{context}: {err}"))
}
