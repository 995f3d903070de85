//! Storage quota snapshot

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which storage tier a backend was resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// High-capacity persistent engine
    Preferred,
    /// Constrained fallback engine
    Fallback,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Preferred => f.write_str("preferred"),
            BackendKind::Fallback => f.write_str("fallback"),
        }
    }
}

/// Usage versus capacity of the resolved storage backend
///
/// Recomputed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSnapshot {
    pub used_bytes: u64,
    pub capacity_bytes: u64,
    pub backend_kind: BackendKind,
    /// Name of the concrete engine (`sqlite`, `json_file`, `memory`)
    pub engine: String,
    pub is_persistent: bool,
}

impl QuotaSnapshot {
    /// Fraction of capacity in use, in `0.0..`; zero capacity reads as full
    pub fn usage_ratio(&self) -> f64 {
        if self.capacity_bytes == 0 {
            return 1.0;
        }
        self.used_bytes as f64 / self.capacity_bytes as f64
    }

    /// Usage as a whole-number percentage
    pub fn usage_percent(&self) -> u8 {
        if self.capacity_bytes == 0 {
            return 100;
        }
        let percent = u128::from(self.used_bytes) * 100 / u128::from(self.capacity_bytes);
        percent.min(255) as u8
    }

    pub fn available_bytes(&self) -> u64 {
        self.capacity_bytes.saturating_sub(self.used_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(used: u64, capacity: u64) -> QuotaSnapshot {
        QuotaSnapshot {
            used_bytes: used,
            capacity_bytes: capacity,
            backend_kind: BackendKind::Fallback,
            engine: "json_file".into(),
            is_persistent: false,
        }
    }

    #[test]
    fn test_usage_ratio() {
        assert!((snapshot(85, 100).usage_ratio() - 0.85).abs() < f64::EPSILON);
        assert_eq!(snapshot(85, 100).usage_percent(), 85);
        assert_eq!(snapshot(10, 0).usage_ratio(), 1.0);
        assert_eq!(snapshot(120, 100).available_bytes(), 0);
    }
}
