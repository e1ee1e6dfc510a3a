use anyhow::{anyhow, Result};
use sol_wallet::DetectorConfig;

/// Flat network fee withheld from the payout, in lamports.
pub const DEFAULT_FLAT_FEE_LAMPORTS: u64 = 5_000;
/// Session TTL from creation to expiry.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 30 * 60;

#[derive(Debug, Clone)]
pub struct MixConfig {
    pub session_ttl_secs: i64,
    pub flat_fee_lamports: u64,
    pub min_amount_sol: f64,
    pub max_amount_sol: f64,
    pub detector: DetectorConfig,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            flat_fee_lamports: DEFAULT_FLAT_FEE_LAMPORTS,
            min_amount_sol: 0.01,
            max_amount_sol: 10.0,
            detector: DetectorConfig::default(),
        }
    }
}

impl MixConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            session_ttl_secs: read_env_i64("MIX_SESSION_TTL_SECS", default.session_ttl_secs),
            flat_fee_lamports: read_env_u64("MIX_FLAT_FEE_LAMPORTS", default.flat_fee_lamports),
            ..default
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_positive("session TTL", self.session_ttl_secs)?;
        if self.min_amount_sol <= 0.0 || self.max_amount_sol <= self.min_amount_sol {
            return Err(anyhow!("amount bounds must satisfy 0 < min < max"));
        }
        Ok(())
    }

    pub fn amount_in_bounds(&self, amount_sol: f64) -> bool {
        amount_sol.is_finite()
            && amount_sol >= self.min_amount_sol
            && amount_sol <= self.max_amount_sol
    }
}

pub fn validate_rpc_url(label: &str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!("{label} must start with http:// or https://"))
    }
}

fn validate_positive(label: &str, value: i64) -> Result<()> {
    if value <= 0 {
        Err(anyhow!("{label} must be greater than zero"))
    } else {
        Ok(())
    }
}

fn read_env_u64(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(fallback)
}

fn read_env_i64(key: &str, fallback: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        MixConfig::default().validate().unwrap();
    }

    #[test]
    fn amount_bounds() {
        let config = MixConfig::default();
        assert!(config.amount_in_bounds(0.01));
        assert!(config.amount_in_bounds(10.0));
        assert!(!config.amount_in_bounds(0.009));
        assert!(!config.amount_in_bounds(10.5));
        assert!(!config.amount_in_bounds(f64::NAN));
    }

    #[test]
    fn rpc_url_validation() {
        validate_rpc_url("rpc", "https://api.mainnet-beta.solana.com").unwrap();
        validate_rpc_url("rpc", "http://127.0.0.1:8899").unwrap();
        assert!(validate_rpc_url("rpc", "ws://127.0.0.1:8900").is_err());
    }
}
