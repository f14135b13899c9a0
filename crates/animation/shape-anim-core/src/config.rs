//! Core configuration for shape-anim-core.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for instance sizing and numeric heuristics.
/// Keep this minimal; expand as needed without breaking API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Initial capacity hint for the thread list.
    pub thread_capacity: usize,

    /// Squared difference between two visibility keys above which the value
    /// snaps at the half-way point instead of fading. The 0.99 default has no
    /// documented rationale; it is kept for compatibility with authored content.
    pub visibility_cut_threshold: f32,

    /// Ground deltas spanning less than this (normalized sequence position)
    /// are reported as identity.
    pub ground_min_span: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thread_capacity: 8,
            visibility_cut_threshold: 0.99,
            ground_min_span: 0.001,
        }
    }
}

impl Config {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = Config::from_json(r#"{ "thread_capacity": 32 }"#).unwrap();
        assert_eq!(cfg.thread_capacity, 32);
        assert_eq!(cfg.visibility_cut_threshold, 0.99);
        assert_eq!(cfg.ground_min_span, 0.001);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(Config::from_json("{ thread_capacity: }").is_err());
    }
}
