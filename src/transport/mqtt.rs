//! MQTT adapter
//!
//! Thin glue between the broker and [`IngestRouter`]. The connection is
//! driven synchronously: every inbound publish is routed to completion
//! before the next event is polled. rumqttc reconnects on the next poll
//! after a connection error, so subscriptions are re-issued on every
//! `ConnAck`.

use crate::core::PositionEstimate;
use crate::transport::error::SinkError;
use crate::transport::formatting::PositionFormatter;
use crate::transport::router::IngestRouter;
use crate::transport::sink::ResultSink;
use crate::utils::config::{MqttConfig, PublishConfig};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outgoing request queue depth of the client
const REQUEST_CAPACITY: usize = 10;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Open a broker session described by `config`
pub fn connect(config: &MqttConfig) -> (Client, Connection) {
    let mut options = MqttOptions::new(&config.client_id, &config.broker, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_s));
    if let Some(username) = &config.username {
        options.set_credentials(username, config.password.as_deref().unwrap_or_default());
    }

    info!(broker = %config.broker, port = config.port, client_id = %config.client_id, "Connecting to broker");
    Client::new(options, REQUEST_CAPACITY)
}

/// Publishes position state and, optionally, tracker attributes
pub struct MqttSink {
    client: Client,
    formatter: PositionFormatter,
    position_topic: String,
    tracker_topic: Option<String>,
}

impl MqttSink {
    pub fn new(client: Client, config: &PublishConfig) -> Self {
        Self {
            client,
            formatter: PositionFormatter::from_config(config),
            position_topic: config.position_topic.clone(),
            tracker_topic: config
                .publish_tracker
                .then(|| config.tracker_topic.clone()),
        }
    }

    fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), SinkError> {
        // Never block the ingest path on a full request queue
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| SinkError::Publish {
                topic: topic.to_string(),
                details: e.to_string(),
            })
    }
}

impl ResultSink for MqttSink {
    fn publish(&self, estimate: &PositionEstimate) -> Result<(), SinkError> {
        self.send(&self.position_topic, self.formatter.position_json(estimate)?)?;

        if let Some(topic) = &self.tracker_topic {
            self.send(topic, self.formatter.tracker_json(estimate)?)?;
        }
        Ok(())
    }
}

/// Drive the connection forever, routing every inbound publish
pub fn run(client: &Client, mut connection: Connection, router: &IngestRouter) {
    for event in connection.iter() {
        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Connected to broker");
                subscribe(client, router);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                router.route(&publish.topic, &publish.payload);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Broker connection lost; retrying");
                thread::sleep(RECONNECT_DELAY);
            }
        }
    }
}

fn subscribe(client: &Client, router: &IngestRouter) {
    for filter in router.subscriptions() {
        match client.try_subscribe(filter.as_str(), QoS::AtMostOnce) {
            Ok(()) => debug!(filter = %filter, "Subscribed"),
            Err(e) => warn!(filter = %filter, error = %e, "Subscribe failed"),
        }
    }
}
