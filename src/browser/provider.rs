use crate::browser::config::{ConnectionOptions, LaunchOptions};
use crate::browser::page::ChromePage;
use crate::browser::session::BrowserSession;
use crate::engine::SessionProvider;
use crate::error::Result;
use std::sync::{Arc, Mutex};

/// Where the browser comes from
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// Attach to a running browser over its DevTools WebSocket
    Connect(ConnectionOptions),
    /// Start a browser and keep it for the rest of the process
    Launch(LaunchOptions),
}

/// [`SessionProvider`] over Chrome.
///
/// Reconnecting to a launched browser reuses it while it still answers, so
/// the operator's login survives a reconnect.
pub struct ChromeProvider {
    endpoint: Endpoint,
    tab_hint: Option<String>,
    launched: Mutex<Option<Arc<BrowserSession>>>,
}

impl ChromeProvider {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            tab_hint: None,
            launched: Mutex::new(None),
        }
    }

    /// Builder method: prefer the tab whose URL contains `hint`
    pub fn tab_hint(mut self, hint: impl Into<String>) -> Self {
        self.tab_hint = Some(hint.into());
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl SessionProvider for ChromeProvider {
    type Handle = Arc<BrowserSession>;
    type Page = ChromePage;

    fn connect(&self) -> Result<Arc<BrowserSession>> {
        match &self.endpoint {
            Endpoint::Connect(options) => Ok(Arc::new(BrowserSession::connect(options.clone())?)),
            Endpoint::Launch(options) => {
                let mut launched = self.launched.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                if let Some(session) = launched.as_ref().filter(|s| s.is_alive()) {
                    return Ok(session.clone());
                }
                log::info!("Launching browser (headless: {})", options.headless);
                let session = Arc::new(BrowserSession::launch(options.clone())?);
                *launched = Some(session.clone());
                Ok(session)
            }
        }
    }

    fn active_page(&self, handle: &Arc<BrowserSession>) -> Result<ChromePage> {
        let tab = handle.get_active_tab(self.tab_hint.as_deref())?;
        log::info!("Driving tab {}", tab.get_url());
        ChromePage::new(tab)
    }
}
