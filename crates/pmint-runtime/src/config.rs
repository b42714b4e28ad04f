#![forbid(unsafe_code)]

//! Engine configuration.
//!
//! With the `config` feature, [`EngineConfig`] round-trips through TOML so a
//! host can ship binding policy as data:
//!
//! ```toml
//! skip_unchanged_writes = true
//! trace_updates = false
//! warn_on_foreign_sender = true
//! ```

/// Behavior switches shared by every binding created from one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "config",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, deny_unknown_fields)
)]
pub struct EngineConfig {
    /// Read the destination before writing and skip writes that would not
    /// change it. Bounds two-way ping-pong even for sources that do not guard
    /// their own setters.
    pub skip_unchanged_writes: bool,
    /// Emit a `trace!` event for every propagated value.
    pub trace_updates: bool,
    /// Log a warning when a handler receives a notification from an object
    /// other than the one it is bound to.
    pub warn_on_foreign_sender: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            skip_unchanged_writes: true,
            trace_updates: false,
            warn_on_foreign_sender: true,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_skip_unchanged_writes(mut self, enabled: bool) -> Self {
        self.skip_unchanged_writes = enabled;
        self
    }

    #[must_use]
    pub fn with_trace_updates(mut self, enabled: bool) -> Self {
        self.trace_updates = enabled;
        self
    }

    #[must_use]
    pub fn with_warn_on_foreign_sender(mut self, enabled: bool) -> Self {
        self.warn_on_foreign_sender = enabled;
        self
    }
}

#[cfg(feature = "config")]
impl EngineConfig {
    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    /// Serialize the configuration to TOML.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}
