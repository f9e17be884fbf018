use serde::Deserialize;

/// Which backend the domain resolver (§4.4) talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstanceMode {
    #[default]
    Local,
    Server,
}

const fn default_rate_limit() -> u64 {
    100
}

const fn default_loop_detection() -> u64 {
    25
}

const fn default_port_forwarding() -> u16 {
    2525
}

const fn default_port_mailout() -> u16 {
    2526
}

const fn default_port_webhook() -> u16 {
    2527
}

/// Process configuration (§6), loaded from a TOML file at startup (§10.3).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_instance_hostname")]
    pub instance_hostname: String,

    #[serde(default)]
    pub instance_mode: InstanceMode,

    #[serde(default)]
    pub server_id: Option<String>,

    #[serde(default)]
    pub server_jwt: Option<String>,

    #[serde(default = "default_port_forwarding")]
    pub port_forwarding: u16,

    #[serde(default = "default_port_mailout")]
    pub port_mailout: u16,

    #[serde(default = "default_port_webhook")]
    pub port_webhook: u16,

    #[serde(default)]
    pub spam_filter: bool,

    #[serde(default = "default_loop_detection")]
    pub forwarding_loop_detection_count: u64,

    #[serde(default = "default_rate_limit")]
    pub forwarding_rate_limiting_count: u64,

    /// Root directory for local-mode domain/rule YAML files and the `.eml` scratch buffers.
    #[serde(default = "default_root")]
    pub root: std::path::PathBuf,
}

fn default_instance_hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

fn default_root() -> std::path::PathBuf {
    std::path::PathBuf::from("/var/lib/fwdr")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instance_hostname: default_instance_hostname(),
            instance_mode: InstanceMode::default(),
            server_id: None,
            server_jwt: None,
            port_forwarding: default_port_forwarding(),
            port_mailout: default_port_mailout(),
            port_webhook: default_port_webhook(),
            spam_filter: false,
            forwarding_loop_detection_count: default_loop_detection(),
            forwarding_rate_limiting_count: default_rate_limit(),
            root: default_root(),
        }
    }
}

impl Config {
    /// Parses a TOML document into a `Config`.
    ///
    /// # Errors
    /// Returns an error if `contents` is not valid TOML or does not match the schema.
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Validates boot-time invariants that can't be expressed as a deserialize default:
    /// server mode requires both a server id and a JWT (§7, "configuration errors at boot
    /// are fatal").
    ///
    /// # Errors
    /// Returns a description of the first missing field.
    pub fn validate(&self) -> Result<(), String> {
        if self.instance_mode == InstanceMode::Server {
            if self.server_id.is_none() {
                return Err("ServerId is required in server mode".to_string());
            }
            if self.server_jwt.is_none() {
                return Err("ServerJWT is required in server mode".to_string());
            }
        }
        Ok(())
    }
}
