//! Execution configuration consumed when an execution context is spawned.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default stack size requested for a context, in bytes.
pub const DEFAULT_STACK_SIZE: usize = 4096;

/// Idle priority; the lowest a context can run at.
pub const IDLE_PRIORITY: u8 = 0;

/// Default context name.
pub const DEFAULT_TASK_NAME: &str = "Task";

/// A core a context can be pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Core {
    /// Core 0.
    Zero,
    /// Core 1.
    One,
}

impl Core {
    /// Zero-based core index.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Zero => 0,
            Self::One => 1,
        }
    }
}

impl TryFrom<u8> for Core {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Zero),
            1 => Ok(Self::One),
            other => Err(format!("core index must be 0 or 1, got {other}")),
        }
    }
}

impl From<Core> for u8 {
    fn from(core: Core) -> Self {
        match core {
            Core::Zero => 0,
            Core::One => 1,
        }
    }
}

impl fmt::Display for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "core{}", self.index())
    }
}

/// Stack size, priority, name and core affinity for one context.
///
/// Copied by value into every task and captured at dispatch time, so later
/// edits never affect a context that is already running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Requested stack size in bytes.
    pub stack_size: usize,
    /// Priority, [`IDLE_PRIORITY`] being the lowest.
    pub priority: u8,
    /// Context name, visible in thread listings and logs.
    pub name: String,
    /// Core to pin the context to; `None` lets the host choose.
    pub pinned_core: Option<Core>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            priority: IDLE_PRIORITY,
            name: DEFAULT_TASK_NAME.to_string(),
            pinned_core: None,
        }
    }
}

impl ExecConfig {
    /// Default configuration with a custom name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::default().with_name(name)
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Pin the context to a core.
    #[must_use]
    pub fn pinned_to(mut self, core: Core) -> Self {
        self.pinned_core = Some(core);
        self
    }

    /// Let the host place the context on any core.
    #[must_use]
    pub fn unpinned(mut self) -> Self {
        self.pinned_core = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ExecConfig::default();
        assert_eq!(cfg.stack_size, 4096);
        assert_eq!(cfg.priority, IDLE_PRIORITY);
        assert_eq!(cfg.name, "Task");
        assert_eq!(cfg.pinned_core, None);
    }

    #[test]
    fn test_builder_chain() {
        let cfg = ExecConfig::named("blink")
            .with_stack_size(8192)
            .with_priority(3)
            .pinned_to(Core::One);
        assert_eq!(cfg.name, "blink");
        assert_eq!(cfg.stack_size, 8192);
        assert_eq!(cfg.priority, 3);
        assert_eq!(cfg.pinned_core.map(Core::index), Some(1));
        assert_eq!(cfg.unpinned().pinned_core, None);
    }

    #[test]
    fn test_core_from_index() {
        assert_eq!(Core::try_from(0), Ok(Core::Zero));
        assert_eq!(Core::try_from(1), Ok(Core::One));
        assert!(Core::try_from(2).is_err());
        assert_eq!(u8::from(Core::One), 1);
        assert_eq!(Core::Zero.to_string(), "core0");
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let cfg: ExecConfig = serde_json::from_str(r#"{"name":"pump","pinned_core":1}"#)
            .expect("valid exec config");
        assert_eq!(cfg.name, "pump");
        assert_eq!(cfg.pinned_core, Some(Core::One));
        assert_eq!(cfg.stack_size, DEFAULT_STACK_SIZE);

        let bad = serde_json::from_str::<ExecConfig>(r#"{"pinned_core":7}"#);
        assert!(bad.is_err());
    }
}
