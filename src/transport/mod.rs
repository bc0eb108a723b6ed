//! Message transport boundary: inbound routing and result publication

pub mod error;
pub mod formatting;
#[cfg(feature = "mqtt")]
pub mod mqtt;
pub mod router;
pub mod sink;

pub use error::{RouteError, SinkError, TopicError};
pub use formatting::{PositionFormatter, PositionState, TrackerAttributes};
#[cfg(feature = "mqtt")]
pub use mqtt::MqttSink;
pub use router::{parse_topic, IngestRouter, MessageKind, RouteOutcome};
pub use sink::{LogSink, MemorySink, ResultSink};
