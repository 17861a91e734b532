use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub node_name: String,
    pub host: String,
    pub http_port: u16,
    pub backend_url: String,
    pub refresh_interval: u64,
    pub security_interval: u64,
    pub deploy_settle_ms: u64,
    pub lab_start_settle_ms: u64,
    pub lab_destroy_settle_ms: u64,
    pub prefs_path: PathBuf,
    pub ui_dir: PathBuf,
    pub log_format: String,
}

impl AppConfig {
    pub fn load() -> Self {
        Self {
            env: env::var("ENV").unwrap_or_else(|_| "production".into()),
            node_name: env::var("NODE_NAME").unwrap_or_else(|_|
                hostname::get().map(|h| h.to_string_lossy().into_owned()).unwrap_or("LAB-NODE".into())
            ).to_uppercase(),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: parse_var("HTTP_PORT", 8090),
            backend_url: env::var("BACKEND_URL").unwrap_or_else(|_| "http://localhost:5000".into()),
            refresh_interval: parse_var("REFRESH_INTERVAL", 10),
            security_interval: parse_var("SECURITY_INTERVAL", 30),
            deploy_settle_ms: parse_var("DEPLOY_SETTLE_MS", 2000),
            lab_start_settle_ms: parse_var("LAB_START_SETTLE_MS", 3000),
            lab_destroy_settle_ms: parse_var("LAB_DESTROY_SETTLE_MS", 2000),
            prefs_path: env::var("PREFS_PATH").unwrap_or_else(|_| ".lab-dashboard.json".into()).into(),
            ui_dir: env::var("UI_DIR").unwrap_or_else(|_| "src/ui".into()).into(),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
        }
    }

    pub fn timings(&self) -> Timings {
        Timings {
            refresh_every: Duration::from_secs(self.refresh_interval.max(1)),
            security_every: Duration::from_secs(self.security_interval.max(1)),
            deploy_settle: Duration::from_millis(self.deploy_settle_ms),
            lab_start_settle: Duration::from_millis(self.lab_start_settle_ms),
            lab_destroy_settle: Duration::from_millis(self.lab_destroy_settle_ms),
        }
    }
}

/// Polling periods and the fixed post-action refresh delays.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub refresh_every: Duration,
    pub security_every: Duration,
    pub deploy_settle: Duration,
    pub lab_start_settle: Duration,
    pub lab_destroy_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            refresh_every: Duration::from_secs(10),
            security_every: Duration::from_secs(30),
            deploy_settle: Duration::from_secs(2),
            lab_start_settle: Duration::from_secs(3),
            lab_destroy_settle: Duration::from_secs(2),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timings_never_use_a_zero_period() {
        let mut cfg = AppConfig::load();
        cfg.refresh_interval = 0;
        cfg.security_interval = 0;
        let t = cfg.timings();
        assert_eq!(t.refresh_every, Duration::from_secs(1));
        assert_eq!(t.security_every, Duration::from_secs(1));
    }

    #[test]
    fn default_timings_match_dashboard_periods() {
        let t = Timings::default();
        assert_eq!(t.refresh_every.as_secs(), 10);
        assert_eq!(t.security_every.as_secs(), 30);
        assert_eq!(t.lab_start_settle.as_secs(), 3);
    }
}
