//! Operator configuration.

use std::path::PathBuf;

use clap::Parser;

/// Configuration for the carbon-aware operator.
#[derive(Parser, Clone, Debug)]
pub struct Config {
    #[arg(
        long,
        env = "CARBON_AWARE_SCHEDULER_URL",
        default_value = "http://carbon-aware-scheduler:8080",
        help = "Base URL of the carbon-aware scheduling service"
    )]
    pub scheduler_url: String,

    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file (defaults to in-cluster config or ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,
}
