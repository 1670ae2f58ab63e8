//! Execution state threaded through a scenario run
//!
//! A [`RunContext`] is cheap to clone and never mutated in place. Each step
//! of the orchestrator derives a new context (a pushed trace, a child
//! cancellation token, merged variable data) and hands it down, so a later
//! action sees what earlier ones wrote while an earlier one can never see a
//! later write.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::api::Fixture;
use crate::common::Settings;
use crate::host::Reporter;

/// A destination for engine debug output
pub type LogSink = Arc<Mutex<dyn Write + Send>>;

#[derive(Clone)]
pub struct RunContext {
    trace: Vec<String>,
    fixtures: Arc<HashMap<String, Arc<dyn Fixture>>>,
    sinks: Arc<Vec<LogSink>>,
    data: Arc<BTreeMap<String, Value>>,
    cancel: CancellationToken,
    reporter: Option<Arc<dyn Reporter>>,
    settings: Arc<Settings>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            trace: Vec::new(),
            fixtures: Arc::new(HashMap::new()),
            sinks: Arc::new(Vec::new()),
            data: Arc::new(BTreeMap::new()),
            cancel: CancellationToken::new(),
            reporter: None,
            settings: Arc::new(Settings::default()),
        }
    }

    /// Register a fixture under `name` (looked up case-insensitively)
    pub fn with_fixture(mut self, name: &str, fixture: Arc<dyn Fixture>) -> Self {
        Arc::make_mut(&mut self.fixtures).insert(name.to_lowercase(), fixture);
        self
    }

    /// Add a destination for debug output
    pub fn with_sink(mut self, sink: LogSink) -> Self {
        Arc::make_mut(&mut self.sinks).push(sink);
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    /// Use `token` as the root cancellation for everything run with this
    /// context
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// A new snapshot reporting to `reporter`
    pub fn with_reporter(&self, reporter: Arc<dyn Reporter>) -> Self {
        let mut ctx = self.clone();
        ctx.reporter = Some(reporter);
        ctx
    }

    /// A new snapshot whose data is this one's plus `data`
    ///
    /// Later keys overwrite earlier ones.
    pub fn with_data(&self, data: &BTreeMap<String, Value>) -> Self {
        if data.is_empty() {
            return self.clone();
        }
        let mut merged = (*self.data).clone();
        merged.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
        let mut ctx = self.clone();
        ctx.data = Arc::new(merged);
        ctx
    }

    pub fn push_trace(&self, segment: impl Into<String>) -> Self {
        let mut ctx = self.clone();
        ctx.trace.push(segment.into());
        ctx
    }

    /// The trace path, segments joined with `/`
    pub fn trace(&self) -> String {
        self.trace.join("/")
    }

    /// Derive a context whose cancellation is a child of this one's
    pub fn child(&self) -> Self {
        let mut ctx = self.clone();
        ctx.cancel = self.cancel.child_token();
        ctx
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    /// Look up a variable written by an earlier action
    pub fn var(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    pub fn fixture(&self, name: &str) -> Option<Arc<dyn Fixture>> {
        self.fixtures.get(&name.to_lowercase()).cloned()
    }

    pub fn reporter(&self) -> Option<&Arc<dyn Reporter>> {
        self.reporter.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Emit an engine debug line
    ///
    /// Goes to `tracing`, every log sink, and the current reporter's log.
    pub fn debug(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        let trace = self.trace();
        tracing::debug!(trace = %trace, "{}", msg);

        let line = if trace.is_empty() {
            msg.to_string()
        } else {
            format!("[{}] {}", trace, msg)
        };
        for sink in self.sinks.iter() {
            if let Ok(mut w) = sink.lock() {
                let _ = writeln!(w, "{}", line);
            }
        }
        if let Some(reporter) = &self.reporter {
            reporter.log(&line);
        }
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("trace", &self.trace)
            .field("fixtures", &self.fixtures.keys().collect::<Vec<_>>())
            .field("sinks", &self.sinks.len())
            .field("data", &self.data)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
