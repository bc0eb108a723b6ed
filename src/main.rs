use csi_fusion::transport::{mqtt, MqttSink};
use csi_fusion::utils::TriggerMode;
use csi_fusion::{init_logging, FusionConfig, IngestRouter};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

const DEFAULT_CONFIG_PATH: &str = "config.json";

fn main() -> ExitCode {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = match FusionConfig::from_file(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("csi-fusion: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(config.log_level);
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    let (client, connection) = mqtt::connect(&config.mqtt);
    let sink = Arc::new(MqttSink::new(client.clone(), &config.publish));

    let router = match IngestRouter::from_config(&config, sink) {
        Ok(router) => Arc::new(router),
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        nodes = config.nodes.len(),
        trigger = ?config.fusion.trigger,
        "Position fusion started"
    );

    if let TriggerMode::Interval { period_ms } = config.fusion.trigger {
        let ticker = Arc::clone(&router);
        let period = Duration::from_millis(period_ms);
        let spawned = thread::Builder::new()
            .name("fusion-tick".to_string())
            .spawn(move || loop {
                thread::sleep(period);
                ticker.tick();
            });
        if let Err(e) = spawned {
            error!(error = %e, "Failed to start fusion timer");
            return ExitCode::FAILURE;
        }
    }

    mqtt::run(&client, connection, &router);
    ExitCode::SUCCESS
}
