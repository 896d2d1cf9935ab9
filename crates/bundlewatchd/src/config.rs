//! Command-line and environment configuration for bundlewatchd.

use std::time::Duration;

use bundlewatch_core::{
    ApiVersion, CorrelatorConfig, DispatchConfig, Severity, StateTranslator, WatchConfig,
    DEFAULT_API_VERSION,
};
use bundlewatch_github::{GitHubConfig, DEFAULT_API_URL};
use clap::Parser;
use tracing::Level;

#[derive(Parser)]
#[command(name = "bundlewatchd")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Mirror Fleet bundle deployment state into GitHub commit statuses", long_about = None)]
pub struct Cli {
    /// API group/version of the Fleet custom resources
    #[arg(long, env = "API_VERSION", default_value = DEFAULT_API_VERSION)]
    pub api_version: ApiVersion,

    /// GitHub token allowed to create commit statuses
    #[arg(long, env = "GITHUB_ALERTS_PAT", hide_env_values = true)]
    pub github_token: String,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub github_api_url: String,

    /// Rancher explorer base URL used for status deep links
    #[arg(long, env = "RANCHER_EXPLORER_URL")]
    pub explorer_url: Option<String>,

    /// Severity reported for bundles in the Modified state
    #[arg(long, env = "MODIFIED_SEVERITY", default_value = "success")]
    pub modified_severity: Severity,

    /// Seconds to wait before re-establishing a failed watch
    #[arg(long, env = "RECONNECT_DELAY_SECS", default_value_t = 10)]
    pub reconnect_delay_secs: u64,

    /// Buffered events per watch stream
    #[arg(long, env = "EVENT_BUFFER", default_value_t = 128)]
    pub event_buffer: usize,

    /// Status pushes that may wait for the API before new ones are dropped
    #[arg(long, env = "PUSH_QUEUE", default_value_t = 256)]
    pub push_queue: usize,

    /// Concurrent status API calls
    #[arg(long, env = "MAX_IN_FLIGHT", default_value_t = 4)]
    pub max_in_flight: usize,

    /// Emit JSON-formatted log lines
    #[arg(long, env = "LOG_JSON")]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }

    pub fn github_config(&self) -> GitHubConfig {
        GitHubConfig::new(&self.github_token).with_api_url(&self.github_api_url)
    }

    pub fn translator(&self) -> StateTranslator {
        StateTranslator::new().with_modified_severity(self.modified_severity)
    }

    pub fn correlator_config(&self) -> CorrelatorConfig {
        CorrelatorConfig {
            api: self.api_version.clone(),
            explorer_url: self
                .explorer_url
                .clone()
                .filter(|url| !url.trim().is_empty()),
        }
    }

    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            reconnect_delay: Duration::from_secs(self.reconnect_delay_secs),
            buffer: self.event_buffer,
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            queue_capacity: self.push_queue,
            max_in_flight: self.max_in_flight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["bundlewatchd", "--github-token", "t"]).unwrap();

        assert_eq!(cli.api_version, ApiVersion::default());
        assert_eq!(cli.modified_severity, Severity::Success);
        assert_eq!(cli.watch_config(), WatchConfig::default());
        assert_eq!(cli.dispatch_config(), DispatchConfig::default());
        assert_eq!(cli.log_level(), Level::INFO);
        assert_eq!(cli.github_config().api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "bundlewatchd",
            "--github-token",
            "t",
            "--api-version",
            "fleet.example.io/v1",
            "--modified-severity",
            "failure",
            "--explorer-url",
            "https://rancher.example.com/dashboard/c/local/explorer",
            "--reconnect-delay-secs",
            "3",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.api_version.group, "fleet.example.io");
        assert_eq!(
            cli.translator().translate("Modified").unwrap().severity,
            Severity::Failure
        );
        assert_eq!(
            cli.correlator_config().explorer_url.as_deref(),
            Some("https://rancher.example.com/dashboard/c/local/explorer")
        );
        assert_eq!(cli.watch_config().reconnect_delay, Duration::from_secs(3));
        assert_eq!(cli.log_level(), Level::DEBUG);
    }

    #[test]
    fn test_rejects_malformed_api_version() {
        let result = Cli::try_parse_from([
            "bundlewatchd",
            "--github-token",
            "t",
            "--api-version",
            "fleet.cattle.io",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_explorer_url_disables_links() {
        let cli = Cli::try_parse_from(["bundlewatchd", "--github-token", "t", "--explorer-url", " "])
            .unwrap();
        assert_eq!(cli.correlator_config().explorer_url, None);
    }
}
