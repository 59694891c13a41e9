// Client connection settings.
//
// Loaded from an optional YAML file and then overridden by command-line
// flags in `main.rs`. Every field has a default, so a file only needs the
// keys it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_ip: String,
    pub server_port: u16,
    pub user_id: String,
    pub connect_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_ip: "127.0.0.1".into(),
            server_port: 8080,
            user_id: "Guest".into(),
            connect_timeout_ms: 5_000,
        }
    }
}

impl ClientConfig {
    /// `ip:port`, with IPv6 literals bracketed.
    pub fn server_addr(&self) -> String {
        if self.server_ip.contains(':') && !self.server_ip.starts_with('[') {
            format!("[{}]:{}", self.server_ip, self.server_port)
        } else {
            format!("{}:{}", self.server_ip, self.server_port)
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }
}
