//! Fixtures: external resources with a start/stop lifecycle

use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;

use crate::common::{Error, Result};
use crate::context::RunContext;

/// A resource started before a scenario's actions and stopped after them
#[async_trait]
pub trait Fixture: Send + Sync {
    async fn start(&self, ctx: &RunContext) -> Result<()>;

    /// Stop the fixture. Called for every fixture whose start succeeded.
    async fn stop(&self, ctx: &RunContext);

    fn has_state(&self, _key: &str) -> bool {
        false
    }

    fn state(&self, _key: &str) -> Option<Value> {
        None
    }
}

/// A fixture exposing a JSON document as queryable state
///
/// State keys are JSON pointers (`/data/books/0/title`).
#[derive(Debug, Clone)]
pub struct JsonFixture {
    doc: Value,
}

impl JsonFixture {
    pub fn new(doc: Value) -> Self {
        Self { doc }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(Self::new(serde_json::from_reader(reader)?))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        content.parse()
    }
}

impl FromStr for JsonFixture {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(s)?))
    }
}

#[async_trait]
impl Fixture for JsonFixture {
    async fn start(&self, _ctx: &RunContext) -> Result<()> {
        Ok(())
    }

    async fn stop(&self, _ctx: &RunContext) {}

    fn has_state(&self, key: &str) -> bool {
        self.doc.pointer(key).is_some()
    }

    fn state(&self, key: &str) -> Option<Value> {
        self.doc.pointer(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_fixture_state() {
        let fixture: JsonFixture = r#"{"books": [{"title": "Dune"}]}"#.parse().unwrap();
        assert!(fixture.has_state("/books/0/title"));
        assert_eq!(fixture.state("/books/0/title"), Some(Value::from("Dune")));
        assert!(!fixture.has_state("/books/1"));
    }

    #[test]
    fn test_json_fixture_rejects_garbage() {
        assert!("{not json".parse::<JsonFixture>().is_err());
    }

    #[test]
    fn test_json_fixture_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("books.json");
        std::fs::write(&path, r#"{"count": 2}"#).unwrap();
        let fixture = JsonFixture::from_path(&path).unwrap();
        assert_eq!(fixture.state("/count"), Some(Value::from(2)));

        let missing = JsonFixture::from_path(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, Error::FileRead { .. }));
    }
}
