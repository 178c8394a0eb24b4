use std::net::SocketAddr;
use std::path::PathBuf;

use streaming::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PageLimits};

const DEFAULT_DB: &str = "data/parcels.db";
const DEFAULT_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_POOL_SIZE: u32 = 8;

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub limits: PageLimits,
    pub pool_size: u32,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparseable numbers fall back to their defaults; an unparseable
    /// address is an error since there is no sensible place to listen.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let db_path = lookup("PARCELS_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB));

        let raw_addr = lookup("PARCELS_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr: SocketAddr = raw_addr
            .parse()
            .map_err(|e| format!("invalid PARCELS_ADDR {raw_addr:?}: {e}"))?;

        let max_page_size = env_var_u32(&lookup, "PARCELS_MAX_PAGE_SIZE", MAX_PAGE_SIZE).max(1);
        let default_page_size = env_var_u32(&lookup, "PARCELS_PAGE_SIZE", DEFAULT_PAGE_SIZE)
            .clamp(1, max_page_size);

        Ok(Self {
            db_path,
            addr,
            limits: PageLimits {
                default_page_size,
                max_page_size,
            },
            pool_size: env_var_u32(&lookup, "PARCELS_POOL_SIZE", DEFAULT_POOL_SIZE).max(1),
        })
    }
}

fn env_var_u32(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u32) -> u32 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("data/parcels.db"));
        assert_eq!(cfg.addr, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.limits, PageLimits::default());
        assert_eq!(cfg.pool_size, 8);
    }

    #[test]
    fn overrides_and_clamping() {
        let cfg = config(&[
            ("PARCELS_DB", "/tmp/p.db"),
            ("PARCELS_ADDR", "0.0.0.0:8080"),
            ("PARCELS_PAGE_SIZE", "900"),
            ("PARCELS_MAX_PAGE_SIZE", "500"),
            ("PARCELS_POOL_SIZE", "0"),
        ])
        .unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/p.db"));
        assert_eq!(cfg.addr.port(), 8080);
        assert_eq!(cfg.limits.max_page_size, 500);
        assert_eq!(cfg.limits.default_page_size, 500);
        assert_eq!(cfg.pool_size, 1);
    }

    #[test]
    fn garbage_numbers_use_defaults() {
        let cfg = config(&[("PARCELS_PAGE_SIZE", "lots")]).unwrap();
        assert_eq!(cfg.limits.default_page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn bad_address_is_an_error() {
        assert!(config(&[("PARCELS_ADDR", "nowhere")]).is_err());
    }
}
