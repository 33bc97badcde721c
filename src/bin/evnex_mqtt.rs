//! evnex-mqtt: polls an EVNEX charge point and republishes its status.
//!
//! ```text
//! evnex-mqtt -s                      # publish status once
//! evnex-mqtt -s -d status            # publish and print status
//! evnex-mqtt -s --interval 60        # keep polling every minute
//! ```

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};

use evnex_client::bridge::{ChargePointBridge, DebugSelection, Publisher, StdoutPublisher};
use evnex_client::observability::{LogFormat, LoggingConfig};
use evnex_client::{EvnexClient, EvnexError, EvnexResult};

#[derive(Parser, Debug)]
#[command(name = "evnex-mqtt")]
#[command(
    about = "Gets data from your EVNEX charge point via the EVNEX cloud and publishes it to MQTT"
)]
#[command(version)]
struct Cli {
    /// MQTT broker host; without it messages are written to stdout
    #[arg(long, env = "EVNEX_MQTT_SERVER")]
    mqtt_server: Option<String>,

    /// MQTT broker port
    #[arg(long, env = "EVNEX_MQTT_PORT", default_value_t = 1883)]
    mqtt_port: u16,

    /// Topic all charge point topics are published under
    #[arg(long, env = "EVNEX_MQTT_MAIN_TOPIC", default_value = "evnex")]
    main_topic: String,

    /// EVNEX account username, as used in the EVNEX app
    #[arg(long, env = "EVNEX_USERNAME")]
    username: String,

    /// EVNEX account password
    #[arg(long, env = "EVNEX_PASSWORD", hide_env_values = true)]
    password: String,

    /// Print charge point info to the console
    #[arg(short, long, value_enum, default_value_t = DebugSelection::None)]
    debug: DebugSelection,

    /// Publish charge point status
    #[arg(short = 's', long)]
    chargepoint_status: bool,

    /// Publish charge point activity (transactions)
    #[arg(short = 'a', long)]
    chargepoint_activity: bool,

    /// Poll every N seconds instead of once
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Default log level when RUST_LOG is unset: off, error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Log output format: pretty, json or compact
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = LoggingConfig::new()
        .with_level(cli.log_level)
        .with_format(cli.log_format);
    if let Err(err) = logging.init() {
        eprintln!("Failed to initialise logging: {}", err);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "evnex-mqtt failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> EvnexResult<()> {
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            shutdown.cancel();
        }
    });

    let client = EvnexClient::builder()
        .credentials(cli.username, cli.password)
        .reauthenticate_on_expiry(cli.interval.is_some())
        .cancellation_token(cancel.clone())
        .build()?;

    #[cfg(feature = "mqtt")]
    let mqtt = cli.mqtt_server.as_deref().map(|host| {
        let client_id = format!("evnex-mqtt-{}", std::process::id());
        Arc::new(evnex_client::bridge::MqttPublisher::connect(host, cli.mqtt_port, &client_id))
    });

    #[cfg(feature = "mqtt")]
    let publisher: Arc<dyn Publisher> = match &mqtt {
        Some(mqtt) => mqtt.clone(),
        None => Arc::new(StdoutPublisher),
    };

    #[cfg(not(feature = "mqtt"))]
    let publisher: Arc<dyn Publisher> = {
        if cli.mqtt_server.is_some() {
            warn!(port = cli.mqtt_port, "Built without the mqtt feature, writing to stdout");
        }
        Arc::new(StdoutPublisher)
    };

    if !cli.chargepoint_status && !cli.chargepoint_activity {
        warn!(
            "Neither --chargepoint-status nor --chargepoint-activity given, \
             nothing will be published"
        );
    }

    let bridge = ChargePointBridge::new(Arc::new(client), publisher, cli.main_topic)
        .with_debug(cli.debug)
        .publish_status(cli.chargepoint_status)
        .publish_activity(cli.chargepoint_activity);

    let result = poll(&bridge, cli.interval.map(Duration::from_secs), &cancel).await;

    #[cfg(feature = "mqtt")]
    if let Some(mqtt) = mqtt {
        mqtt.disconnect().await;
    }

    result
}

async fn poll(
    bridge: &ChargePointBridge,
    interval: Option<Duration>,
    cancel: &CancellationToken,
) -> EvnexResult<()> {
    let Some(interval) = interval else {
        return bridge.poll_once().await.map(|_| ());
    };

    loop {
        match bridge.poll_once().await {
            Ok(published) => info!(published, "Published charge point state"),
            Err(EvnexError::Cancelled) => return Ok(()),
            Err(err) => warn!(error = %err, "Poll failed, trying again next cycle"),
        }

        tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            () = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<Cli, clap::Error> {
        let mut args = vec!["evnex-mqtt", "--username", "owner@example.com", "--password", "pw"];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args)
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = parse(&["--interval", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_interval_and_levels_parse() {
        let cli = parse(&["-s", "--interval", "60", "--log-level", "debug", "-d", "status"])
            .unwrap();

        assert_eq!(cli.interval, Some(60));
        assert_eq!(cli.log_level, LevelFilter::DEBUG);
        assert_eq!(cli.debug, DebugSelection::Status);
        assert!(cli.chargepoint_status);
        assert!(!cli.chargepoint_activity);
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]).unwrap();

        assert_eq!(cli.interval, None);
        assert_eq!(cli.log_level, LevelFilter::INFO);
        assert_eq!(cli.log_format, LogFormat::Pretty);
        assert_eq!(cli.debug, DebugSelection::None);
    }
}
