//! Layered JSON configuration.
//!
//! Module defaults, a user settings file and their merged view, with safe
//! navigation over the result and hot reload of the user layer.

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod node;
pub mod paths;
pub mod subscriptions;

pub use config::{ConfigPath, ConfigStore, ModuleInfo, ModuleSource, OverlayTarget, StoreOptions};
pub use error::{ConfigError, ErrorCode, Result};
pub use node::{ConfigNode, Mapping, Scalar};
pub use subscriptions::{ConfigChanged, SubscriptionId};
