//! A collection of scenarios run in order

use std::path::PathBuf;

use super::scenario::Scenario;
use crate::common::Result;
use crate::context::RunContext;
use crate::host::Host;

#[derive(Debug, Default)]
pub struct Suite {
    /// File or directory the suite was loaded from
    pub path: Option<PathBuf>,
    pub scenarios: Vec<Scenario>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Run every scenario, stopping at the first fault
    pub async fn run(&self, ctx: &RunContext, host: Host<'_>) -> Result<()> {
        for scenario in &self.scenarios {
            scenario.run(ctx, host).await?;
        }
        Ok(())
    }
}
