use rand::Rng;

use crate::config::RetryCfg;

/// Delay before retry `attempt` (1-based, counting the retry itself).
pub fn backoff_ms(attempt: u32, base_ms: u64, factor: f64, jitter_ms: u64) -> u64 {
    let pow = factor.powi((attempt.saturating_sub(1)) as i32);
    let core = (base_ms as f64 * pow).round() as u64;
    let jitter = if jitter_ms > 0 { rand::rng().random_range(0..=jitter_ms) } else { 0 };
    core + jitter
}

pub fn retry_delay_ms(cfg: &RetryCfg, attempt: u32) -> u64 {
    backoff_ms(attempt, cfg.backoff_base_ms, cfg.backoff_factor, cfg.backoff_jitter_ms)
}
