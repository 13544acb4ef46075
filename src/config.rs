use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::executor::DEFAULT_TIMEOUT_MS;

/// Gateway configuration
#[derive(Debug, Clone, Parser)]
#[command(version, about = "MCP gateway that runs shell commands for SSE-connected clients")]
pub struct GatewayConfig {
    /// Address to listen on
    #[arg(long, env = "SHELL_GATEWAY_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Path clients GET to open their event stream
    #[arg(long, env = "SHELL_GATEWAY_SSE_PATH", default_value = "/sse")]
    pub sse_path: String,

    /// Path clients POST messages to, with `?sessionId=...`
    #[arg(long, env = "SHELL_GATEWAY_POST_PATH", default_value = "/messages")]
    pub post_path: String,

    /// Seconds between SSE keep-alive comments
    #[arg(long, env = "SHELL_GATEWAY_KEEP_ALIVE_SECS", default_value_t = 15)]
    pub keep_alive_secs: u64,

    /// Timeout for run_command when the caller gives none, in milliseconds
    #[arg(long, env = "SHELL_GATEWAY_DEFAULT_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub default_timeout_ms: u64,

    /// Outbound frames buffered per session
    #[arg(long, env = "SHELL_GATEWAY_CHANNEL_CAPACITY", default_value_t = 64)]
    pub channel_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            sse_path: "/sse".to_string(),
            post_path: "/messages".to_string(),
            keep_alive_secs: 15,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            channel_capacity: 64,
        }
    }
}

impl GatewayConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli_defaults() {
        let parsed = GatewayConfig::try_parse_from(["shell-gateway-mcp-server"]).unwrap();
        let default = GatewayConfig::default();
        assert_eq!(parsed.bind, default.bind);
        assert_eq!(parsed.sse_path, default.sse_path);
        assert_eq!(parsed.post_path, default.post_path);
        assert_eq!(parsed.keep_alive_secs, default.keep_alive_secs);
        assert_eq!(parsed.default_timeout_ms, default.default_timeout_ms);
        assert_eq!(parsed.channel_capacity, default.channel_capacity);
    }

    #[test]
    fn test_flags_override_defaults() {
        let parsed = GatewayConfig::try_parse_from([
            "shell-gateway-mcp-server",
            "--bind",
            "127.0.0.1:8080",
            "--post-path",
            "/message",
            "--default-timeout-ms",
            "500",
        ])
        .unwrap();
        assert_eq!(parsed.bind, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(parsed.post_path, "/message");
        assert_eq!(parsed.default_timeout_ms, 500);
    }

    #[test]
    fn test_keep_alive_never_zero() {
        let config = GatewayConfig {
            keep_alive_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.keep_alive(), Duration::from_secs(1));
    }
}
