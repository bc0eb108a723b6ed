//! Inbound message dispatch
//!
//! Node identity and message kind travel in the topic, not the payload:
//! `<root>/<node_id>/data` carries measurements and `<root>/<node_id>/stats`
//! carries heartbeats. Every message is handled to completion and nothing
//! here panics on bad input; a malformed message is logged and dropped.
//!
//! Estimates are published after the orchestrator lock is released, so two
//! threads (broker loop and interval timer) can finish their cycles in a
//! different order than they solved. Publication is serialized and an
//! estimate older than the last one handed to the sink is dropped, so
//! downstream positions never move backwards in time.

use crate::core::{NodeId, PositionEstimate};
use crate::fusion::{CycleOutcome, FusionOrchestrator, NodeRegistry, SharedOrchestrator};
use crate::processing::MessageParser;
use crate::transport::error::{RouteError, TopicError};
use crate::transport::sink::ResultSink;
use crate::utils::config::{ConfigError, FusionConfig, TriggerMode};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Data,
    Stats,
}

/// What happened to one inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Measurement buffered; `cycle` is set when it triggered a solve
    Measurement {
        node_id: NodeId,
        cycle: Option<CycleOutcome>,
    },
    Stats { node_id: NodeId },
    Dropped(RouteError),
}

/// Split `<root>/<node>/<kind>` into its parts
pub fn parse_topic(root: &str, topic: &str) -> Result<(NodeId, MessageKind), TopicError> {
    let rest = topic
        .strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(|| TopicError::ForeignTopic {
            topic: topic.to_string(),
            root: root.to_string(),
        })?;

    let mut parts = rest.split('/');
    let (node, kind) = match (parts.next(), parts.next(), parts.next()) {
        (Some(node), Some(kind), None) if !node.is_empty() => (node, kind),
        _ => {
            return Err(TopicError::Malformed {
                topic: topic.to_string(),
            })
        }
    };

    let kind = match kind {
        "data" => MessageKind::Data,
        "stats" => MessageKind::Stats,
        other => {
            return Err(TopicError::UnknownKind {
                kind: other.to_string(),
            })
        }
    };

    Ok((NodeId::new(node), kind))
}

pub struct IngestRouter {
    orchestrator: SharedOrchestrator,
    sink: Arc<dyn ResultSink>,
    parser: MessageParser,
    topic_root: String,
    trigger: TriggerMode,
    last_published: Mutex<Option<DateTime<Utc>>>,
}

impl IngestRouter {
    pub fn new(
        orchestrator: SharedOrchestrator,
        sink: Arc<dyn ResultSink>,
        topic_root: impl Into<String>,
        trigger: TriggerMode,
    ) -> Self {
        Self {
            orchestrator,
            sink,
            parser: MessageParser::new(),
            topic_root: topic_root.into().trim_end_matches('/').to_string(),
            trigger,
            last_published: Mutex::new(None),
        }
    }

    /// Build the whole pipeline from validated configuration
    pub fn from_config(config: &FusionConfig, sink: Arc<dyn ResultSink>) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = Arc::new(NodeRegistry::from_config(&config.nodes)?);
        let orchestrator = FusionOrchestrator::new(registry, &config.fusion);

        let mut router = Self::new(
            Arc::new(Mutex::new(orchestrator)),
            sink,
            config.mqtt.topic_root.clone(),
            config.fusion.trigger,
        );
        router.set_strict_validation(config.fusion.strict_csi);
        Ok(router)
    }

    /// See [`MessageParser::set_strict_validation`]
    pub fn set_strict_validation(&mut self, strict: bool) {
        self.parser.set_strict_validation(strict);
    }

    pub fn orchestrator(&self) -> &SharedOrchestrator {
        &self.orchestrator
    }

    pub fn trigger(&self) -> TriggerMode {
        self.trigger
    }

    /// Topic filters covering every node's data and stats channels
    pub fn subscriptions(&self) -> [String; 2] {
        [
            format!("{}/+/data", self.topic_root),
            format!("{}/+/stats", self.topic_root),
        ]
    }

    pub fn route(&self, topic: &str, payload: &[u8]) -> RouteOutcome {
        self.route_at(topic, payload, Utc::now())
    }

    /// Handle one inbound message received at `now`
    pub fn route_at(&self, topic: &str, payload: &[u8], now: DateTime<Utc>) -> RouteOutcome {
        let (node_id, kind) = match parse_topic(&self.topic_root, topic) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(topic, error = %e, "Ignoring message");
                return RouteOutcome::Dropped(e.into());
            }
        };

        match kind {
            MessageKind::Data => self.handle_data(node_id, payload, now),
            MessageKind::Stats => self.handle_stats(node_id, payload, now),
        }
    }

    /// Run one timer-driven cycle and publish its result
    pub fn tick(&self) -> CycleOutcome {
        self.tick_at(Utc::now())
    }

    pub fn tick_at(&self, now: DateTime<Utc>) -> CycleOutcome {
        let outcome = self.orchestrator.lock().attempt_solve_at(now);
        if let Some(estimate) = outcome.estimate() {
            self.publish(estimate);
        }
        outcome
    }

    fn handle_data(&self, node_id: NodeId, payload: &[u8], now: DateTime<Utc>) -> RouteOutcome {
        let measurement = match self.parser.parse_measurement(&node_id, payload, now) {
            Ok(m) => m,
            Err(e) => {
                warn!(node = %node_id, error = %e, "Dropping malformed measurement");
                return RouteOutcome::Dropped(RouteError::Payload { node_id, error: e });
            }
        };

        let cycle = {
            let mut orchestrator = self.orchestrator.lock();
            orchestrator.ingest_measurement(measurement);
            match self.trigger {
                TriggerMode::PerMeasurement => Some(orchestrator.attempt_solve_at(now)),
                TriggerMode::Interval { .. } => None,
            }
        };

        if let Some(estimate) = cycle.as_ref().and_then(CycleOutcome::estimate) {
            self.publish(estimate);
        }

        RouteOutcome::Measurement { node_id, cycle }
    }

    fn handle_stats(&self, node_id: NodeId, payload: &[u8], now: DateTime<Utc>) -> RouteOutcome {
        match self.parser.parse_stats(payload) {
            Ok(stats) => {
                self.orchestrator
                    .lock()
                    .update_stats(&node_id, stats.into_stats(now));
                RouteOutcome::Stats { node_id }
            }
            Err(e) => {
                warn!(node = %node_id, error = %e, "Dropping malformed stats");
                RouteOutcome::Dropped(RouteError::Payload { node_id, error: e })
            }
        }
    }

    fn publish(&self, estimate: &PositionEstimate) {
        let mut last = self.last_published.lock();
        if last.is_some_and(|at| estimate.timestamp < at) {
            debug!(timestamp = %estimate.timestamp, "Dropping estimate older than the last published one");
            return;
        }
        *last = Some(estimate.timestamp);

        match self.sink.publish(estimate) {
            Ok(()) => debug!(x = estimate.x, y = estimate.y, "Published position"),
            Err(e) if e.is_transient() => warn!(error = %e, "Position not published"),
            Err(e) => error!(error = %e, "Position not published"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::ParseError;
    use crate::transport::error::SinkError;
    use crate::transport::sink::MemorySink;
    use crate::utils::config::NodeConfig;

    fn config() -> FusionConfig {
        FusionConfig::with_nodes(vec![
            NodeConfig { id: NodeId::new("n1"), x: 0.0, y: 0.0 },
            NodeConfig { id: NodeId::new("n2"), x: 10.0, y: 0.0 },
            NodeConfig { id: NodeId::new("n3"), x: 5.0, y: 8.66 },
        ])
    }

    fn data(rssi: i32) -> Vec<u8> {
        format!(r#"{{"timestamp":100,"rssi":{},"csi_data":[1,2],"channel":6,"rate":11}}"#, rssi)
            .into_bytes()
    }

    struct FailingSink;

    impl ResultSink for FailingSink {
        fn publish(&self, _: &PositionEstimate) -> Result<(), SinkError> {
            Err(SinkError::Publish {
                topic: "homeassistant/sensor/whofi_position/state".into(),
                details: "request queue full".into(),
            })
        }
    }

    #[test]
    fn test_parse_topic() {
        assert_eq!(
            parse_topic("whofi/csi", "whofi/csi/aa:bb/data"),
            Ok((NodeId::new("aa:bb"), MessageKind::Data))
        );
        assert_eq!(
            parse_topic("whofi/csi", "whofi/csi/aa:bb/stats"),
            Ok((NodeId::new("aa:bb"), MessageKind::Stats))
        );
        assert!(matches!(
            parse_topic("whofi/csi", "other/csi/aa/data"),
            Err(TopicError::ForeignTopic { .. })
        ));
        assert!(matches!(
            parse_topic("whofi/csi", "whofi/csiextra/aa/data"),
            Err(TopicError::ForeignTopic { .. })
        ));
        assert!(matches!(
            parse_topic("whofi/csi", "whofi/csi/aa"),
            Err(TopicError::Malformed { .. })
        ));
        assert!(matches!(
            parse_topic("whofi/csi", "whofi/csi/aa/data/extra"),
            Err(TopicError::Malformed { .. })
        ));
        assert!(matches!(
            parse_topic("whofi/csi", "whofi/csi//data"),
            Err(TopicError::Malformed { .. })
        ));
        assert_eq!(
            parse_topic("whofi/csi", "whofi/csi/aa/status"),
            Err(TopicError::UnknownKind { kind: "status".into() })
        );
    }

    #[test]
    fn test_subscriptions() {
        let router = IngestRouter::from_config(&config(), Arc::new(MemorySink::new())).unwrap();
        assert_eq!(router.subscriptions(), ["whofi/csi/+/data".to_string(), "whofi/csi/+/stats".to_string()]);
    }

    #[test]
    fn test_malformed_payload_is_dropped() {
        let sink = Arc::new(MemorySink::new());
        let router = IngestRouter::from_config(&config(), sink.clone()).unwrap();

        let outcome = router.route("whofi/csi/n1/data", b"{\"rssi\":");
        assert!(matches!(
            outcome,
            RouteOutcome::Dropped(RouteError::Payload { error: ParseError::InvalidFormat { .. }, .. })
        ));
        assert_eq!(router.orchestrator().lock().counters().measurements, 0);

        // The router keeps working afterwards
        assert!(matches!(router.route("whofi/csi/n1/data", &data(-40)), RouteOutcome::Measurement { .. }));
    }

    #[test]
    fn test_stats_bypass_buffers() {
        let router = IngestRouter::from_config(&config(), Arc::new(MemorySink::new())).unwrap();
        let now = Utc::now();

        let outcome = router.route_at("whofi/csi/n1/stats", br#"{"packets":7,"enabled":true,"uptime":12}"#, now);
        assert_eq!(outcome, RouteOutcome::Stats { node_id: NodeId::new("n1") });

        let orchestrator = router.orchestrator().lock();
        let node = orchestrator.node(&NodeId::new("n1")).unwrap();
        assert!(node.buffer.is_empty());
        assert_eq!(node.stats.packet_count, 7);
        assert_eq!(node.stats.last_seen, Some(now));
    }

    #[test]
    fn test_per_measurement_trigger_publishes() {
        let sink = Arc::new(MemorySink::new());
        let router = IngestRouter::from_config(&config(), sink.clone()).unwrap();

        for node in ["n1", "n2"] {
            let outcome = router.route(&format!("whofi/csi/{}/data", node), &data(-36));
            assert!(matches!(
                outcome,
                RouteOutcome::Measurement { cycle: Some(CycleOutcome::Waiting { .. }), .. }
            ));
        }
        assert!(sink.is_empty());

        let outcome = router.route("whofi/csi/n3/data", &data(-36));
        assert!(matches!(outcome, RouteOutcome::Measurement { cycle: Some(CycleOutcome::Solved(_)), .. }));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_interval_trigger_waits_for_tick() {
        let sink = Arc::new(MemorySink::new());
        let mut config = config();
        config.fusion.trigger = TriggerMode::Interval { period_ms: 500 };
        let router = IngestRouter::from_config(&config, sink.clone()).unwrap();

        for node in ["n1", "n2", "n3"] {
            let outcome = router.route(&format!("whofi/csi/{}/data", node), &data(-36));
            assert!(matches!(outcome, RouteOutcome::Measurement { cycle: None, .. }));
        }
        assert!(sink.is_empty());

        assert!(router.tick().estimate().is_some());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_sink_failure_does_not_disturb_pipeline() {
        let router = IngestRouter::from_config(&config(), Arc::new(FailingSink)).unwrap();

        for _ in 0..3 {
            for node in ["n1", "n2", "n3"] {
                router.route(&format!("whofi/csi/{}/data", node), &data(-36));
            }
        }

        let counters = router.orchestrator().lock().counters();
        assert_eq!(counters.measurements, 9);
        assert_eq!(counters.solved, 7);
    }

    #[test]
    fn test_lenient_csi_from_config() {
        let odd = br#"{"timestamp":1,"rssi":-40,"csi_data":[1,2,3],"channel":1,"rate":0}"#;

        let strict = IngestRouter::from_config(&config(), Arc::new(MemorySink::new())).unwrap();
        assert!(matches!(
            strict.route("whofi/csi/n1/data", odd),
            RouteOutcome::Dropped(RouteError::Payload { error: ParseError::UnpairedChannelData { len: 3 }, .. })
        ));

        let mut lenient_config = config();
        lenient_config.fusion.strict_csi = false;
        let lenient = IngestRouter::from_config(&lenient_config, Arc::new(MemorySink::new())).unwrap();
        assert!(matches!(lenient.route("whofi/csi/n1/data", odd), RouteOutcome::Measurement { .. }));

        let orchestrator = lenient.orchestrator().lock();
        let node = orchestrator.node(&NodeId::new("n1")).unwrap();
        assert_eq!(node.buffer.latest().unwrap().channel_samples.len(), 1);
    }

    #[test]
    fn test_older_estimate_is_not_published_after_newer() {
        let sink = Arc::new(MemorySink::new());
        let router = IngestRouter::from_config(&config(), sink.clone()).unwrap();
        let t1 = Utc::now();
        let t0 = t1 - chrono::Duration::seconds(1);

        for node in ["n1", "n2", "n3"] {
            router.route_at(&format!("whofi/csi/{}/data", node), &data(-36), t1);
        }
        assert_eq!(sink.len(), 1);

        // Solved, but finished after a newer estimate went out
        let outcome = router.route_at("whofi/csi/n1/data", &data(-36), t0);
        assert!(matches!(outcome, RouteOutcome::Measurement { cycle: Some(CycleOutcome::Solved(_)), .. }));
        assert_eq!(sink.len(), 1);

        // Same or later timestamps still go out
        router.route_at("whofi/csi/n2/data", &data(-36), t1);
        assert!(router.tick_at(t1 + chrono::Duration::seconds(1)).estimate().is_some());
        let stamps: Vec<_> = sink.published().iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![t1, t1, t1 + chrono::Duration::seconds(1)]);
    }
}
