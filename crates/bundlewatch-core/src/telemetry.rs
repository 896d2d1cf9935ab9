//! Tracing initialisation for bundlewatch binaries.
//!
//! Call [`init_tracing`] once at program start. `RUST_LOG` takes precedence
//! over the directives built from the requested level.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Targets raised above INFO by `-v`. Everything else (kube, hyper, rustls,
/// reqwest) stays at INFO so the watch client does not flood the output.
const OWN_TARGETS: &[&str] = &[
    "bundlewatchd",
    "bundlewatch_core",
    "bundlewatch_kube",
    "bundlewatch_github",
];

/// Default filter directives for `level`.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    if level == "info" || level == "warn" || level == "error" {
        return level;
    }
    std::iter::once("info".to_string())
        .chain(OWN_TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialise the global tracing subscriber.
///
/// Verbose runs also print the log target, since several crates log at once.
/// Only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let layer = fmt::layer().with_target(level > Level::INFO);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_levels_apply_globally() {
        assert_eq!(default_directives(Level::INFO), "info");
        assert_eq!(default_directives(Level::WARN), "warn");
    }

    #[test]
    fn test_verbose_raises_only_own_targets() {
        let directives = default_directives(Level::DEBUG);
        assert_eq!(
            directives,
            "info,bundlewatchd=debug,bundlewatch_core=debug,\
             bundlewatch_kube=debug,bundlewatch_github=debug"
        );
        assert!(!directives
            .split(',')
            .any(|d| d.starts_with("kube") || d.starts_with("hyper")));
        assert!(EnvFilter::try_new(&directives).is_ok());

        assert!(default_directives(Level::TRACE).contains("bundlewatch_kube=trace"));
    }
}
