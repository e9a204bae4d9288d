//! Scheduling-service configuration.

use clap::Parser;

/// Configuration for the carbon-aware scheduling service.
#[derive(Parser, Clone, Debug)]
pub struct Config {
    #[arg(long, env = "PORT", default_value = "8080", help = "HTTP listen port")]
    pub port: u16,

    #[arg(
        long,
        env = "WATTIME_USERNAME",
        help = "WattTime account username (required)"
    )]
    pub watttime_username: String,

    #[arg(
        long,
        env = "WATTIME_PASSWORD",
        hide_env_values = true,
        help = "WattTime account password (required)"
    )]
    pub watttime_password: String,

    #[arg(
        long,
        env = "WATTIME_BASE_URL",
        default_value = "https://api.watttime.org",
        help = "WattTime API base URL (override for tests or proxies)"
    )]
    pub watttime_base_url: String,
}
