//! Scripted portal for driving collectors in tests
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{AuthError, FetchError};
use crate::source::{RawDocument, UsagePortal};

/// One scripted refresh cycle
#[derive(Debug, Clone)]
pub(crate) struct Step {
    panic_on_login: bool,
    login: Result<(), AuthError>,
    page: Result<String, FetchError>,
}

impl Step {
    /// Successful login and a page whose tooltip cell holds `text`
    pub(crate) fn usage(text: &str) -> Self {
        Self::page(&format!(
            r#"<table><tr><td class="highcharts-tooltip">{}</td></tr></table>"#,
            text
        ))
    }

    pub(crate) fn page(body: &str) -> Self {
        Self {
            panic_on_login: false,
            login: Ok(()),
            page: Ok(body.to_string()),
        }
    }

    /// Login that panics, killing the cycle before it has an outcome
    pub(crate) fn login_panic() -> Self {
        Self {
            panic_on_login: true,
            ..Self::page("")
        }
    }

    pub(crate) fn login_status(status: u16) -> Self {
        Self {
            panic_on_login: false,
            login: Err(AuthError::Rejected { status }),
            page: Ok(String::new()),
        }
    }

    pub(crate) fn fetch_error(err: FetchError) -> Self {
        Self {
            panic_on_login: false,
            login: Ok(()),
            page: Err(err),
        }
    }
}

#[derive(Default)]
struct Script {
    steps: Mutex<VecDeque<Step>>,
    current: Mutex<Option<Step>>,
    logins: AtomicUsize,
    fetches: AtomicUsize,
}

/// Portal that replays scripted steps, one per login
#[derive(Clone)]
pub(crate) struct ScriptedPortal {
    script: Arc<Script>,
    latency: Duration,
}

impl ScriptedPortal {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        let script = Script {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        };
        Self {
            script: Arc::new(script),
            latency: Duration::ZERO,
        }
    }

    /// Delay each login by `latency`
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn logins(&self) -> usize {
        self.script.logins.load(Ordering::SeqCst)
    }

    pub(crate) fn fetches(&self) -> usize {
        self.script.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl UsagePortal for ScriptedPortal {
    type Session = ();

    async fn login(&self) -> Result<(), AuthError> {
        self.script.logins.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let step = self
            .script
            .steps
            .lock()
            .pop_front()
            .unwrap_or_else(|| Step::login_status(599));
        if step.panic_on_login {
            panic!("scripted login panic");
        }
        let login = step.login.clone();
        *self.script.current.lock() = Some(step);
        login
    }

    async fn fetch_usage_page(&self, _session: &()) -> Result<RawDocument, FetchError> {
        self.script.fetches.fetch_add(1, Ordering::SeqCst);

        let step = self.script.current.lock().take();
        match step {
            Some(step) => step.page.map(RawDocument::from),
            None => Err(FetchError::Transport("no scripted page".to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
