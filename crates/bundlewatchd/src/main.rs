//! bundlewatchd - mirrors Fleet bundle deployment state into GitHub
//! commit statuses.
//!
//! Watches GitRepo and BundleDeployment resources cluster-wide and posts a
//! commit status for every resolvable deployment state change.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use bundlewatch_core::{init_tracing, Correlator, StatusDispatcher, WatchChannel};
use bundlewatch_github::GitHubStatusClient;
use bundlewatch_kube::{KubeCollection, BUNDLE_DEPLOYMENTS, GIT_REPOS};

use crate::config::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json, cli.log_level());

    let github =
        GitHubStatusClient::new(cli.github_config()).context("failed to build GitHub client")?;
    let login = github
        .authenticated_login()
        .await
        .context("GitHub authentication failed")?;
    info!(login = %login, "authenticated as {login}");

    let client = kube::Client::try_default()
        .await
        .context("failed to load Kubernetes client configuration")?;
    let references = KubeCollection::new(client.clone(), &cli.api_version, GIT_REPOS);
    let deployments = KubeCollection::new(client, &cli.api_version, BUNDLE_DEPLOYMENTS);

    let (dispatcher, worker) = StatusDispatcher::spawn(github, cli.dispatch_config());
    let correlator = Correlator::new(cli.translator(), cli.correlator_config(), dispatcher);

    let references = WatchChannel::new(references, cli.watch_config()).spawn();
    let deployments = WatchChannel::new(deployments, cli.watch_config()).spawn();

    info!(api_version = %cli.api_version, "bundlewatchd started");
    tokio::select! {
        _ = correlator.run(references, deployments) => warn!("watch streams closed, exiting"),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            info!("shutdown requested");
        }
    }

    // pushes still queued are not persisted across restarts
    worker.abort();
    Ok(())
}
