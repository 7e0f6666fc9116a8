use serde::Deserialize;

/// Top-level server configuration, loaded from `huddle.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HuddleConfig {
    pub listen_addr: String,
    pub web_root: String,
    /// Shared passphrase checked by the access endpoint. When unset, every
    /// code validates.
    pub access_code: Option<String>,
    pub limits: LimitsConfig,
    pub rooms: RoomsConfig,
}

impl Default for HuddleConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            web_root: "public".to_string(),
            access_code: None,
            limits: LimitsConfig::default(),
            rooms: RoomsConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Per-connection rate limit. Paddle updates arrive at up to 60/s, so
    /// this must stay comfortably above that.
    pub ws_rate_limit_per_sec: f64,
    pub client_message_buffer: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            ws_rate_limit_per_sec: 120.0,
            client_message_buffer: 256,
        }
    }
}

/// Room lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    /// How long a vacant room's state is retained before the reaper
    /// removes it.
    pub retention_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            retention_secs: 86_400,
            sweep_interval_secs: 3_600,
        }
    }
}

impl HuddleConfig {
    /// Validate configuration, exiting on unusable values.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }

        if self.access_code.is_some() {
            tracing::warn!(
                "access_code is set in config file — use HUDDLE_ACCESS_CODE env var in production"
            );
        }

        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            tracing::error!("limits.ws_rate_limit_per_sec must be > 0");
            std::process::exit(1);
        }
        if self.limits.client_message_buffer == 0 {
            tracing::error!("limits.client_message_buffer must be > 0");
            std::process::exit(1);
        }

        if self.rooms.retention_secs == 0 {
            tracing::error!("rooms.retention_secs must be > 0");
            std::process::exit(1);
        }
        if self.rooms.sweep_interval_secs == 0 {
            tracing::error!("rooms.sweep_interval_secs must be > 0");
            std::process::exit(1);
        }
    }

    /// Load config from `huddle.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("huddle.toml") {
            Ok(content) => match toml::from_str::<HuddleConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from huddle.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse huddle.toml: {e}, using defaults");
                    HuddleConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No huddle.toml found, using defaults");
                HuddleConfig::default()
            },
        };

        // Environment variable overrides
        if let Ok(addr) = std::env::var("HUDDLE_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        // Bare port form kept for container platforms that only set PORT.
        if let Ok(port) = std::env::var("PORT")
            && let Ok(port) = port.parse::<u16>()
        {
            config.listen_addr = format!("0.0.0.0:{port}");
        }
        if let Ok(root) = std::env::var("HUDDLE_WEB_ROOT")
            && !root.is_empty()
        {
            config.web_root = root;
        }
        if let Ok(code) = std::env::var("HUDDLE_ACCESS_CODE")
            && !code.is_empty()
        {
            config.access_code = Some(code);
        }
        if let Ok(val) = std::env::var("HUDDLE_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("HUDDLE_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            config.limits.ws_rate_limit_per_sec = n;
        }
        if let Ok(val) = std::env::var("HUDDLE_ROOM_RETENTION_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.rooms.retention_secs = n;
        }

        config
    }
}
