use serde::{Deserialize, Serialize};

/// Smallest score accepted as a scan fence-post.
///
/// One step inside `i64::MIN` (plus the extra step the exclusive-bound
/// arithmetic needs) so `score - 1` never overflows when building scan
/// bounds. User scores are expected to stay within
/// `[SCORE_MIN, SCORE_MAX]`.
pub const SCORE_MIN: i64 = i64::MIN + 2;

/// Largest score accepted as a scan fence-post; `score + 1` never
/// overflows for scores at or below this bound.
pub const SCORE_MAX: i64 = i64::MAX - 1;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SableConfig {
    #[serde(default)]
    pub kv: KvConfig,
}

/// Embedded KV backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvConfig {
    /// How many times `run_in_txn` re-executes a transaction body after an
    /// optimistic-concurrency conflict before giving up. The retry budget
    /// lives in the collaborator; callers never retry themselves.
    #[serde(default = "default_max_txn_retries")]
    pub max_txn_retries: u32,
}

fn default_max_txn_retries() -> u32 {
    10
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            max_txn_retries: default_max_txn_retries(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_leave_room_for_bound_arithmetic() {
        assert!(SCORE_MAX.checked_add(1).is_some());
        assert!(SCORE_MIN.checked_sub(1).is_some());
        assert!(SCORE_MIN < 0 && SCORE_MAX > 0);
    }

    #[test]
    fn test_kv_config_defaults() {
        let cfg = KvConfig::default();
        assert_eq!(cfg.max_txn_retries, 10);
    }

    #[test]
    fn test_config_round_trips_through_serde() {
        let cfg = SableConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: SableConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kv.max_txn_retries, cfg.kv.max_txn_retries);
    }

    #[test]
    fn test_missing_sections_take_defaults() {
        let cfg: SableConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.kv.max_txn_retries, 10);
    }
}
