//! Scenario orchestration
//!
//! A scenario runs its dependency checks, starts its fixtures, evaluates
//! its skip conditions and then executes its actions strictly in order.
//! Each action's evaluation (including retries) runs on its own task and
//! is raced against the action's deadline. Data written by an action is
//! merged into a fresh context snapshot handed to the next one.
//!
//! Assertion failures are reported to the host and execution continues
//! with the next action. A fault (`Err`) stops the scenario immediately;
//! started fixtures are still stopped.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;

use super::backoff;
use super::depends::check_dependencies;
use super::resolve::{describe_retry, describe_timeout, resolve_retry, resolve_timeout, Defaults};
use crate::api::{BoundAction, Cleanup, Dependency, Evaluable, Fixture, Outcome, Retry};
use crate::common::{Error, Failure, Result};
use crate::context::RunContext;
use crate::host::{Host, NativeHost, Reporter, TestUnit};
use crate::run::{Run, UnitResult};

/// Worst-case timing of a scenario, used to detect host deadline conflicts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timings {
    /// Sum of every action's pre and post waits
    pub total_wait: Duration,
    /// Longest resolved timeout of any action
    pub max_timeout: Duration,
}

#[derive(Debug, Default)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    /// Document the scenario was loaded from
    pub path: Option<PathBuf>,
    /// Fixture names, started in order
    pub fixtures: Vec<String>,
    pub depends: Vec<Dependency>,
    /// Evaluated once each before the actions; the first that passes skips
    /// the scenario
    pub skip_if: Vec<BoundAction>,
    pub actions: Vec<BoundAction>,
    pub defaults: Defaults,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_action(mut self, action: BoundAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_fixture(mut self, name: impl Into<String>) -> Self {
        self.fixtures.push(name.into());
        self
    }

    pub fn with_dependency(mut self, dep: Dependency) -> Self {
        self.depends.push(dep);
        self
    }

    pub fn with_skip_if(mut self, condition: BoundAction) -> Self {
        self.skip_if.push(condition);
        self
    }

    pub fn with_defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Name, falling back to the file stem of the path
    pub fn title(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        self.path
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scenario".to_string())
    }

    /// Key under which results are stored in a [`Run`]
    pub fn key(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => self.title(),
        }
    }

    pub fn timings(&self) -> Timings {
        self.actions
            .iter()
            .fold(Timings::default(), |mut timings, bound| {
                timings.total_wait += bound.base().wait.total();
                let timeout = resolve_timeout(bound.action.as_ref(), &self.defaults, bound.plugin.info());
                if let Some(d) = timeout.value {
                    timings.max_timeout = timings.max_timeout.max(d);
                }
                timings
            })
    }

    /// Execute the scenario under `host`
    ///
    /// The returned error is always a fault. Assertion failures are reported
    /// to the host.
    pub async fn run(&self, ctx: &RunContext, host: Host<'_>) -> Result<()> {
        let ctx = ctx.push_trace(self.title());
        tracing::info!(scenario = %self.title(), actions = self.actions.len(), "running scenario");

        check_dependencies(&ctx, &self.depends).await?;

        match host {
            Host::Native(native) => self.run_native(&ctx, native).await,
            Host::Standalone(run) => self.run_standalone(&ctx, run).await,
        }
    }

    async fn run_native(&self, ctx: &RunContext, host: &NativeHost) -> Result<()> {
        self.check_timeout_conflict(ctx, host)?;

        let ctx = ctx.with_reporter(Arc::new(host.clone()));
        let mut started = Vec::new();
        let result = AssertUnwindSafe(self.run_native_actions(&ctx, host, &mut started))
            .catch_unwind()
            .await;
        settle(&ctx, started, result).await
    }

    async fn run_native_actions(
        &self,
        ctx: &RunContext,
        host: &NativeHost,
        started: &mut Vec<Arc<dyn Fixture>>,
    ) -> Result<()> {
        self.start_fixtures(ctx, started).await?;

        if let Some(title) = self.evaluate_skip_if(ctx).await? {
            host.skip(&format!("skip-if: {} passed. skipping test.", title));
            return Ok(());
        }

        let mut ctx = ctx.clone();
        for bound in &self.actions {
            let mut outcome = self.run_action(&ctx, bound).await?;
            for cleanup in outcome.take_cleanups() {
                host.cleanup(cleanup);
            }
            ctx = ctx.with_data(outcome.data());
            for failure in outcome.failures() {
                host.error(failure);
            }
        }
        tracing::info!(scenario = %self.title(), ok = !host.failed(), "scenario finished");
        Ok(())
    }

    async fn run_standalone(&self, ctx: &RunContext, run: &Run) -> Result<()> {
        let root = TestUnit::new(self.title());
        let ctx = ctx.with_reporter(Arc::new(root.clone()));
        let mut started = Vec::new();
        let result = AssertUnwindSafe(self.run_standalone_actions(&ctx, run, &root, &mut started))
            .catch_unwind()
            .await;
        settle(&ctx, started, result).await
    }

    async fn run_standalone_actions(
        &self,
        ctx: &RunContext,
        run: &Run,
        root: &TestUnit,
        started: &mut Vec<Arc<dyn Fixture>>,
    ) -> Result<()> {
        let key = self.key();
        self.start_fixtures(ctx, started).await?;

        if let Some(title) = self.evaluate_skip_if(ctx).await? {
            root.skip(&format!("skip-if: {} passed. skipping test.", title));
            for (idx, bound) in self.actions.iter().enumerate() {
                let name = format!("{}/{}", self.title(), bound.base().title());
                run.store(&key, UnitResult::skipped(idx, name));
            }
            tracing::info!(scenario = %self.title(), "scenario skipped");
            return Ok(());
        }

        let mut ctx = ctx.clone();
        let mut cleanups: Vec<Cleanup> = Vec::new();
        let mut ok = true;
        let mut fault = None;
        for (idx, bound) in self.actions.iter().enumerate() {
            let unit = root.child(&bound.base().title());
            let action_ctx = ctx.with_reporter(Arc::new(unit.clone()));
            let mut outcome = match self.run_action(&action_ctx, bound).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    unit.finish();
                    fault = Some(e);
                    break;
                }
            };

            cleanups.extend(outcome.take_cleanups());
            ctx = ctx.with_data(outcome.data());
            for failure in outcome.failures() {
                unit.error(failure);
            }
            if outcome.failed() {
                unit.fail_now();
            } else {
                unit.finish();
            }
            ok = ok && !unit.failed();
            run.store_result(&key, idx, &unit);
        }

        if ok {
            for cleanup in cleanups.into_iter().rev() {
                cleanup();
            }
        } else if !cleanups.is_empty() {
            ctx.debug(format!("scenario failed, skipping {} cleanups", cleanups.len()));
        }
        tracing::info!(scenario = %self.title(), ok, "scenario finished");

        match fault {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Fault if the host's remaining time cannot cover the scenario
    fn check_timeout_conflict(&self, ctx: &RunContext, host: &NativeHost) -> Result<()> {
        let Some(remaining) = host.remaining() else {
            return Ok(());
        };
        ctx.debug(format!("host deadline in {:?}", remaining));
        let timings = self.timings();
        let wait_conflict = timings.total_wait > remaining;
        let timeout_conflict = timings.max_timeout > remaining;
        if wait_conflict || timeout_conflict {
            let total_wait = if wait_conflict {
                timings.total_wait
            } else {
                Duration::ZERO
            };
            return Err(Error::timeout_conflict(remaining, total_wait, timings.max_timeout));
        }
        Ok(())
    }

    async fn start_fixtures(&self, ctx: &RunContext, started: &mut Vec<Arc<dyn Fixture>>) -> Result<()> {
        for name in &self.fixtures {
            let fixture = ctx
                .fixture(name)
                .ok_or_else(|| Error::FixtureMissing(name.clone()))?;
            fixture.start(ctx).await.map_err(|e| Error::FixtureStart {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            ctx.debug(format!("fixture '{}' started", name));
            started.push(fixture);
        }
        Ok(())
    }

    /// Title of the first skip condition that passes
    async fn evaluate_skip_if(&self, ctx: &RunContext) -> Result<Option<String>> {
        for condition in &self.skip_if {
            let outcome = condition.action.eval(ctx).await?;
            if !outcome.failed() {
                return Ok(Some(condition.base().title()));
            }
        }
        Ok(None)
    }

    /// Execute one action: waits, policy resolution, the deadline race and
    /// the on-failure hook
    async fn run_action(&self, ctx: &RunContext, bound: &BoundAction) -> Result<Outcome> {
        let base = bound.base();
        let segment = match &base.name {
            Some(name) => format!("{}:{}", base.index, name),
            None => base.index.to_string(),
        };
        let ctx = ctx.push_trace(segment);
        let info = bound.plugin.info();

        let retry = resolve_retry(bound.action.as_ref(), &self.defaults, info);
        ctx.debug(describe_retry(&retry));
        let timeout = resolve_timeout(bound.action.as_ref(), &self.defaults, info);
        ctx.debug(describe_timeout(&timeout));

        if let Some(before) = base.wait.before {
            ctx.debug(format!("wait: {:?} before", before));
            tokio::time::sleep(before).await;
        }

        let outcome = evaluate(&ctx.child(), bound.action.clone(), base.title(), retry.value, timeout.value).await?;

        if outcome.failed() {
            if let Some(hook) = &base.on_fail {
                run_on_fail(&ctx.child(), hook.as_ref()).await;
            }
        }

        if let Some(after) = base.wait.after {
            ctx.debug(format!("wait: {:?} after", after));
            tokio::time::sleep(after).await;
        }
        Ok(outcome)
    }
}

/// Race the backoff scheduler against the deadline and cancellation
async fn evaluate(
    ctx: &RunContext,
    action: Arc<dyn Evaluable>,
    title: String,
    retry: Option<Retry>,
    timeout: Option<Duration>,
) -> Result<Outcome> {
    let task_ctx = ctx.clone();
    let mut task = tokio::spawn(async move { backoff::execute(&task_ctx, action.as_ref(), retry.as_ref()).await });

    let deadline = async move {
        match timeout {
            Some(after) => {
                tokio::time::sleep(after).await;
                after
            }
            None => std::future::pending::<Duration>().await,
        }
    };

    tokio::select! {
        joined = &mut task => match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(Error::ActionPanicked(title)),
            Err(e) => Err(Error::Internal(format!("action task for '{}' failed: {}", title, e))),
        },
        after = deadline => {
            ctx.cancellation().cancel();
            task.abort();
            ctx.debug(format!("timeout exceeded ({:?})", after));
            Ok(Outcome::failed_with(Failure::TimeoutExceeded { after }))
        }
        _ = ctx.cancellation().cancelled() => {
            task.abort();
            ctx.debug("cancelled before completion");
            Ok(Outcome::failed_with(Failure::Cancelled))
        }
    }
}

/// Evaluate an on-failure hook once. Its own problems are only logged.
async fn run_on_fail(ctx: &RunContext, hook: &dyn Evaluable) {
    ctx.debug(format!("on.fail: evaluating {}", hook.base().title()));
    match hook.eval(ctx).await {
        Ok(outcome) => {
            for failure in outcome.failures() {
                tracing::warn!(trace = %ctx.trace(), %failure, "on-fail hook reported a failure");
            }
        }
        Err(e) => {
            tracing::warn!(trace = %ctx.trace(), error = %e, "on-fail hook faulted");
        }
    }
}

/// Stop the started fixtures, then hand back the run's result or resume
/// its panic
async fn settle(
    ctx: &RunContext,
    started: Vec<Arc<dyn Fixture>>,
    result: std::thread::Result<Result<()>>,
) -> Result<()> {
    stop_fixtures(ctx, started).await;
    match result {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

async fn stop_fixtures(ctx: &RunContext, started: Vec<Arc<dyn Fixture>>) {
    for fixture in started.into_iter().rev() {
        fixture.stop(ctx).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ActionBase, Plugin, PluginInfo, SpecFactory, Timeout, Wait};
    use async_trait::async_trait;

    struct Noop {
        info: PluginInfo,
    }

    impl Plugin for Noop {
        fn info(&self) -> &PluginInfo {
            &self.info
        }

        fn specs(&self) -> Vec<Box<dyn SpecFactory>> {
            Vec::new()
        }
    }

    struct Pass(ActionBase);

    #[async_trait]
    impl Evaluable for Pass {
        fn base(&self) -> &ActionBase {
            &self.0
        }

        async fn eval(&self, _ctx: &RunContext) -> Result<Outcome> {
            Ok(Outcome::new())
        }
    }

    fn bound(base: ActionBase) -> BoundAction {
        let plugin = Arc::new(Noop {
            info: PluginInfo::new("noop"),
        });
        BoundAction::new(plugin, Arc::new(Pass(base)))
    }

    #[test]
    fn test_timings() {
        let mut first = ActionBase::new(0);
        first.wait = Wait {
            before: Some(Duration::from_secs(1)),
            after: Some(Duration::from_secs(2)),
        };
        first.timeout = Some(Timeout(Duration::from_secs(5)));
        let mut second = ActionBase::new(1);
        second.timeout = Some(Timeout(Duration::from_secs(9)));

        let scenario = Scenario::new("t").with_action(bound(first)).with_action(bound(second));
        assert_eq!(
            scenario.timings(),
            Timings {
                total_wait: Duration::from_secs(3),
                max_timeout: Duration::from_secs(9),
            }
        );
    }

    #[test]
    fn test_title_and_key() {
        let scenario = Scenario::default().with_path("/tmp/books.yaml");
        assert_eq!(scenario.title(), "books");
        assert_eq!(scenario.key(), "/tmp/books.yaml");
        assert_eq!(Scenario::new("named").key(), "named");
    }

    #[tokio::test]
    async fn test_timeout_conflict_is_fault() {
        let mut base = ActionBase::new(0);
        base.timeout = Some(Timeout(Duration::from_secs(120)));
        let scenario = Scenario::new("slow").with_action(bound(base));
        let host = NativeHost::new("slow").with_timeout(Duration::from_secs(10));

        let err = scenario.run(&RunContext::new(), Host::Native(&host)).await.unwrap_err();
        assert!(matches!(err, Error::TimeoutConflict { .. }));
        assert!(err.to_string().contains("maximum timeout"));
    }

    #[tokio::test]
    async fn test_missing_fixture_is_fault() {
        let scenario = Scenario::new("f").with_fixture("books").with_action(bound(ActionBase::new(0)));
        let run = Run::new();
        let err = scenario.run(&RunContext::new(), Host::Standalone(&run)).await.unwrap_err();
        assert!(matches!(err, Error::FixtureMissing(name) if name == "books"));
        assert!(run.scenario_paths().is_empty());
    }

    #[tokio::test]
    async fn test_standalone_records_each_action() {
        let scenario = Scenario::new("s")
            .with_action(bound(ActionBase::named(0, "first")))
            .with_action(bound(ActionBase::new(1)));
        let run = Run::new();
        scenario.run(&RunContext::new(), Host::Standalone(&run)).await.unwrap();

        let results = run.scenario_results("s");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "s/first");
        assert_eq!(results[1].name, "s/1");
        assert!(run.ok());
    }
}
