// # ipstash
//
// Find this host's public IP address and stash it in Redis, either on a
// pub/sub channel or in a capped history set, for consumers such as a
// security-group updater.
//
// This binary is a thin integration layer: it reads configuration, wires
// the resolver and propagator together, runs one cycle and maps the
// outcome to an exit code. All detection and propagation logic lives in
// ipstash-core and the backend crates.
//
// ## Configuration
//
// - `IP_FETCH_URL`: Endpoint returning the public IP as the whole body
// - `IPSTASH_MODE`: `pubsub` (default) or `history`
// - `IPSTASH_CHANNEL`: Pub/sub channel (default `ipstash`)
// - `IPSTASH_HISTORY_KEY`: History set key (default `ipstash:history`)
// - `IPSTASH_HISTORY_MAX`: History capacity (default 60)
// - `REDIS_URL` or `REDIS_ADDR`: Broker location
// - `IPSTASH_TIMEOUT_SECS`: Fetch and broker timeout (default 10)
// - `IPSTASH_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export IP_FETCH_URL=https://api.ipify.org
// export REDIS_URL=redis://localhost:6379
//
// ipstash --dry-run
// ipstash
// ipstash test --ip 203.0.113.10
// IPSTASH_MODE=history ipstash history
// ```
//
// Meant to be run from cron or a systemd timer; every invocation is one
// detect-and-propagate cycle.

mod cli;

use anyhow::Result;
use clap::Parser;
use std::env;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use cli::{CommandLine, Commands};
use ipstash_core::{
    ErrorKind, FixedIpResolver, HistoryLog, IpResolver, PropagationMode, Propagator, RunConfig,
    RunOutcome, StashEngine,
};
use ipstash_ip_http::HttpIpResolver;
use ipstash_redis::{RedisBroker, RedisHistory, RedisPublisher};

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StashExitCode {
    /// Run completed (or dry run)
    Success = 0,
    /// Configuration error, nothing was attempted
    ConfigError = 1,
    /// Fetch, format or broker failure
    RuntimeError = 2,
}

impl From<StashExitCode> for ExitCode {
    fn from(code: StashExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<ErrorKind> for StashExitCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::ConfigInvalid => StashExitCode::ConfigError,
            ErrorKind::FetchFailed
            | ErrorKind::InvalidIpFormat
            | ErrorKind::PublishFailed
            | ErrorKind::Other => StashExitCode::RuntimeError,
        }
    }
}

fn main() -> ExitCode {
    let args = CommandLine::parse_args();

    let log_level = match env::var("IPSTASH_LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => {
            eprintln!(
                "IPSTASH_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                other
            );
            return StashExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return StashExitCode::ConfigError.into();
    }

    // Load and validate configuration before any run logic
    let config = match RunConfig::from_lookup(|key| env::var(key).ok()) {
        Ok(cfg) => cfg.with_dry_run(args.dry_run),
        Err(e) => {
            error!("{}", e);
            return StashExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        error!("{}", e);
        return StashExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return StashExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match execute(args.command, &config).await {
            Ok(()) => StashExitCode::Success,
            Err(e) => report(&e),
        }
    });

    code.into()
}

/// Log an error with its diagnostic context and pick the exit code
fn report(err: &anyhow::Error) -> StashExitCode {
    match err.downcast_ref::<ipstash_core::Error>() {
        Some(e) => {
            match e.kind() {
                ErrorKind::FetchFailed => error!("Error fetching IP: {}", e),
                ErrorKind::InvalidIpFormat => error!("Error validating IP: {}", e),
                ErrorKind::PublishFailed => error!("Failed to store IP in Redis: {}", e),
                ErrorKind::ConfigInvalid => error!("{}", e),
                ErrorKind::Other => error!("ipstash error: {}", e),
            }
            e.kind().into()
        }
        None => {
            error!("ipstash error: {:#}", err);
            StashExitCode::RuntimeError
        }
    }
}

async fn execute(command: Option<Commands>, config: &RunConfig) -> Result<()> {
    match command {
        None => {
            let url = config.require_fetch_url()?;
            let resolver = HttpIpResolver::with_timeout(url, config.timeout())?;
            run_once(Box::new(resolver), config).await
        }
        Some(Commands::Test { ip }) => {
            let resolver = FixedIpResolver::parse(&ip)?;
            info!("Test mode: using supplied IP {}", resolver.resolve().await?);
            run_once(Box::new(resolver), config).await
        }
        Some(Commands::History) => print_history(config).await,
    }
}

async fn run_once(resolver: Box<dyn IpResolver>, config: &RunConfig) -> Result<()> {
    let propagator = build_propagator(config)?;
    info!(
        "Resolving IP via {} for {} '{}'",
        resolver.resolver_name(),
        propagator.propagator_name(),
        propagator.target()
    );

    let engine = StashEngine::new(resolver, propagator, config.dry_run);

    if let RunOutcome::DryRun { ip } = engine.run_once().await? {
        info!("Dry run complete, {} was not stored", ip);
    }

    Ok(())
}

/// Build the propagator for the configured mode around a fresh broker handle
fn build_propagator(config: &RunConfig) -> Result<Box<dyn Propagator>> {
    let broker = RedisBroker::with_timeout(&config.broker_url, config.timeout())?;

    let propagator: Box<dyn Propagator> = match &config.mode {
        PropagationMode::PubSub { channel } => Box::new(RedisPublisher::new(broker, channel)),
        PropagationMode::History { key, max_entries } => {
            Box::new(RedisHistory::new(broker, key, *max_entries))
        }
    };

    Ok(propagator)
}

/// Print the history set, oldest first, one JSON object per line
async fn print_history(config: &RunConfig) -> Result<()> {
    let PropagationMode::History { key, max_entries } = &config.mode else {
        return Err(
            ipstash_core::Error::config("the history command needs IPSTASH_MODE=history").into(),
        );
    };

    let broker = RedisBroker::with_timeout(&config.broker_url, config.timeout())?;
    let history = RedisHistory::new(broker, key, *max_entries);

    for entry in history.entries().await? {
        println!("{}", serde_json::to_string(&entry)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(StashExitCode::from(ErrorKind::ConfigInvalid), StashExitCode::ConfigError);
        assert_eq!(StashExitCode::from(ErrorKind::FetchFailed), StashExitCode::RuntimeError);
        assert_eq!(StashExitCode::from(ErrorKind::InvalidIpFormat), StashExitCode::RuntimeError);
        assert_eq!(StashExitCode::from(ErrorKind::PublishFailed), StashExitCode::RuntimeError);
    }

    #[test]
    fn test_report_maps_library_errors() {
        let err = anyhow::Error::from(ipstash_core::Error::invalid_ip_format("nope"));
        assert_eq!(report(&err), StashExitCode::RuntimeError);

        let err = anyhow::Error::from(ipstash_core::Error::config("bad url"));
        assert_eq!(report(&err), StashExitCode::ConfigError);
    }

    #[test]
    fn test_build_propagator_per_mode() {
        let mut config = RunConfig::from_lookup(|key| match key {
            "REDIS_URL" => Some("redis://localhost:6379".to_string()),
            _ => None,
        })
        .unwrap();

        let propagator = build_propagator(&config).unwrap();
        assert_eq!(propagator.propagator_name(), "redis-pubsub");
        assert_eq!(propagator.target(), "ipstash");

        config.mode = PropagationMode::History {
            key: "ips".to_string(),
            max_entries: 60,
        };
        let propagator = build_propagator(&config).unwrap();
        assert_eq!(propagator.propagator_name(), "redis-history");
        assert_eq!(propagator.target(), "ips");
    }

    #[tokio::test]
    async fn test_dry_run_test_mode_never_touches_broker() {
        // Nothing listens here; a dry run must still succeed
        let config = RunConfig::from_lookup(|key| match key {
            "REDIS_URL" => Some("redis://127.0.0.1:9".to_string()),
            _ => None,
        })
        .unwrap()
        .with_dry_run(true);

        let result = execute(
            Some(Commands::Test {
                ip: "192.0.2.77".to_string(),
            }),
            &config,
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_without_url_is_config_error() {
        let config = RunConfig::from_lookup(|key| match key {
            "REDIS_URL" => Some("redis://localhost:6379".to_string()),
            _ => None,
        })
        .unwrap();

        let err = execute(None, &config).await.unwrap_err();
        assert_eq!(report(&err), StashExitCode::ConfigError);
    }
}
