//! Built-in plugins

pub mod var;

use std::sync::Arc;

use crate::api::Plugin;

pub use var::VarPlugin;

/// Every built-in plugin, in registration order
pub fn builtin() -> Vec<Arc<dyn Plugin>> {
    vec![Arc::new(VarPlugin::new())]
}
