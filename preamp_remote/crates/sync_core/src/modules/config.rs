use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::modules::debounce::Control;
use crate::modules::error::ConfigError;
use crate::modules::queue::DEFAULT_QUEUE_CAPACITY;

/// Close code a peer sends when it is going away on purpose (RFC 6455 "Going Away").
pub const GOING_AWAY: u16 = 1001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceDelays {
    pub volume: Duration,
    pub balance: Duration,
    pub brightness: Duration,
}

impl Default for DebounceDelays {
    fn default() -> Self {
        Self {
            volume: Duration::from_millis(100),
            balance: Duration::from_millis(100),
            brightness: Duration::from_millis(150),
        }
    }
}

impl DebounceDelays {
    pub fn for_control(&self, control: Control) -> Duration {
        match control {
            Control::Volume => self.volume,
            Control::Balance => self.balance,
            Control::Brightness => self.brightness,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub queue_capacity: usize,
    pub debounce: DebounceDelays,

    /// Fixed delay before a reconnect attempt after an unintended close.
    pub reconnect_delay: Duration,
    pub resume_min_interval: Duration,

    pub poll_interval: Duration,
    /// Labels ride along on every Nth poll.
    pub labels_every: u32,
    pub startup_grace: Duration,
    pub fallback_grace: Duration,
    pub post_command_refresh: Duration,

    pub full_sync_cooldown: Duration,
    pub state_sync_cooldown: Duration,

    pub health_check_interval: Duration,
    pub health_probe_after: Duration,
    pub health_dead_after: Duration,

    pub http_timeout: Duration,
    /// Close codes treated as a deliberate go-away from the peer (no reconnect, no polling).
    pub go_away_codes: Vec<u16>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            debounce: DebounceDelays::default(),
            reconnect_delay: Duration::from_millis(2000),
            resume_min_interval: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(1000),
            labels_every: 5,
            startup_grace: Duration::from_millis(1200),
            fallback_grace: Duration::from_millis(3000),
            post_command_refresh: Duration::from_millis(180),
            full_sync_cooldown: Duration::from_millis(1500),
            state_sync_cooldown: Duration::from_millis(500),
            health_check_interval: Duration::from_secs(5),
            health_probe_after: Duration::from_secs(15),
            health_dead_after: Duration::from_secs(30),
            http_timeout: Duration::from_secs(4),
            go_away_codes: vec![GOING_AWAY],
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `PREAMP_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        cfg.reconnect_delay = env_millis("PREAMP_RECONNECT_MS", cfg.reconnect_delay, 100, 60_000);
        cfg.poll_interval = env_millis("PREAMP_POLL_MS", cfg.poll_interval, 200, 60_000);
        cfg.startup_grace = env_millis("PREAMP_STARTUP_GRACE_MS", cfg.startup_grace, 0, 60_000);
        cfg.fallback_grace = env_millis("PREAMP_FALLBACK_GRACE_MS", cfg.fallback_grace, 0, 60_000);
        cfg.health_probe_after =
            env_millis("PREAMP_HEALTH_PROBE_MS", cfg.health_probe_after, 1_000, 600_000);
        cfg.health_dead_after =
            env_millis("PREAMP_HEALTH_DEAD_MS", cfg.health_dead_after, 2_000, 600_000);
        cfg.http_timeout = env_millis("PREAMP_HTTP_TIMEOUT_MS", cfg.http_timeout, 500, 60_000);

        if let Some(n) = env_parse::<usize>("PREAMP_QUEUE_CAPACITY") {
            cfg.queue_capacity = n.clamp(1, 1024);
        }
        if let Some(n) = env_parse::<u32>("PREAMP_LABELS_EVERY") {
            cfg.labels_every = n.clamp(1, 100);
        }
        if let Ok(raw) = std::env::var("PREAMP_GO_AWAY_CODES") {
            cfg.go_away_codes = parse_codes(&raw)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".into()));
        }
        if self.health_dead_after <= self.health_probe_after {
            return Err(ConfigError::Invalid(format!(
                "health_dead_after ({:?}) must exceed health_probe_after ({:?})",
                self.health_dead_after, self.health_probe_after
            )));
        }
        if self.poll_interval.is_zero() || self.health_check_interval.is_zero() {
            return Err(ConfigError::Invalid("intervals must be non-zero".into()));
        }
        Ok(())
    }

    pub fn is_go_away(&self, code: Option<u16>) -> bool {
        code.is_some_and(|c| self.go_away_codes.contains(&c))
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring {name}={raw:?}: not a number");
            None
        }
    }
}

fn env_millis(name: &str, default: Duration, min: u64, max: u64) -> Duration {
    env_parse::<u64>(name)
        .map(|ms| Duration::from_millis(ms.clamp(min, max)))
        .unwrap_or(default)
}

fn parse_codes(raw: &str) -> Result<Vec<u16>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u16>()
                .map_err(|_| ConfigError::Invalid(format!("bad close code {s:?}")))
        })
        .collect()
}

/// Where the bridge lives: `ws(s)://<host>/ws` plus the `/api/*` fallback endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    live: Url,
    base: Url,
}

impl Endpoints {
    /// Live socket and HTTP API served from different origins (reverse proxies, test fixtures).
    pub fn new(live: Url, api_base: Url) -> Self {
        Self {
            live,
            base: api_base,
        }
    }

    pub fn from_host(host: &str, secure: bool) -> Result<Self, ConfigError> {
        let host = host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(ConfigError::InvalidHost {
                host: host.to_string(),
                source: url::ParseError::EmptyHost,
            });
        }
        let (ws, http) = if secure { ("wss", "https") } else { ("ws", "http") };

        let parse = |raw: String| {
            Url::parse(&raw).map_err(|source| ConfigError::InvalidHost {
                host: host.to_string(),
                source,
            })
        };
        let live = parse(format!("{ws}://{host}/ws"))?;
        let base = parse(format!("{http}://{host}/"))?;
        Ok(Self { live, base })
    }

    pub fn live(&self) -> &Url {
        &self.live
    }

    pub fn state_url(&self) -> Url {
        self.api("state")
    }

    pub fn labels_url(&self) -> Url {
        self.api("labels")
    }

    pub fn command_url(&self) -> Url {
        self.api("cmd")
    }

    fn api(&self, leaf: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(&format!("/api/{leaf}"));
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_follow_bridge_layout() {
        let ep = Endpoints::from_host("preamp.local:8080", false).expect("endpoints");
        assert_eq!(ep.live().as_str(), "ws://preamp.local:8080/ws");
        assert_eq!(ep.state_url().as_str(), "http://preamp.local:8080/api/state");
        assert_eq!(ep.labels_url().as_str(), "http://preamp.local:8080/api/labels");
        assert_eq!(ep.command_url().as_str(), "http://preamp.local:8080/api/cmd");

        let secure = Endpoints::from_host("bridge.example/", true).expect("endpoints");
        assert_eq!(secure.live().as_str(), "wss://bridge.example/ws");
        assert_eq!(secure.command_url().as_str(), "https://bridge.example/api/cmd");
    }

    #[test]
    fn split_origins_keep_api_paths() {
        let live = Url::parse("ws://127.0.0.1:9001/ws").expect("url");
        let api = Url::parse("http://127.0.0.1:9002/").expect("url");
        let ep = Endpoints::new(live, api);
        assert_eq!(ep.live().port(), Some(9001));
        assert_eq!(ep.state_url().as_str(), "http://127.0.0.1:9002/api/state");
    }

    #[test]
    fn empty_host_is_rejected() {
        assert!(matches!(
            Endpoints::from_host("", false),
            Err(ConfigError::InvalidHost { .. })
        ));
    }

    #[test]
    fn go_away_is_a_code_set() {
        let mut cfg = SyncConfig::default();
        assert!(cfg.is_go_away(Some(1001)));
        assert!(!cfg.is_go_away(Some(1006)));
        assert!(!cfg.is_go_away(None));

        cfg.go_away_codes = parse_codes("4000, 4001").expect("codes");
        assert!(cfg.is_go_away(Some(4001)));
        assert!(!cfg.is_go_away(Some(1001)));
        assert!(parse_codes("x").is_err());
    }

    #[test]
    fn validate_rejects_inverted_health_thresholds() {
        let cfg = SyncConfig {
            health_probe_after: Duration::from_secs(30),
            health_dead_after: Duration::from_secs(10),
            ..SyncConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert!(SyncConfig::default().validate().is_ok());
    }
}
