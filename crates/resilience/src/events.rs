//! Recovery event surface
//!
//! Everything this subsystem reports toward the owning session flows
//! through one typed enum and one sink trait. The enum carries exactly the
//! notification contract (reconnecting / reconnected / reconnect-failed /
//! quality-issue / quality-recovered); at-most-once delivery per state
//! transition is enforced by the recovery state machine, not the sinks.

use serde::{Deserialize, Serialize};
use std::io::Write;
use tokio::sync::broadcast;

/// Notification emitted toward the owning session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecoveryEvent {
    /// A recovery attempt has started
    Reconnecting,
    /// The connection re-established after a recovery attempt
    Reconnected,
    /// Recovery gave up permanently; the session should be torn down
    ReconnectFailed,
    /// A quality issue appeared that was not active on the previous poll
    QualityIssue { issue: String },
    /// All previously reported quality issues cleared
    QualityRecovered,
}

/// Error type for event sink operations
#[derive(Debug, thiserror::Error)]
pub enum EventSinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Channel send error: {0}")]
    Channel(String),
}

/// Trait for event delivery targets
///
/// Implementations include:
/// - `ChannelSink` - broadcast channel for async consumers
/// - `CallbackSink` - plain function callback adapter
/// - `JsonlSink` - newline-delimited JSON to a writer
pub trait EventSink: Send + Sync {
    /// Deliver one event to this sink
    fn emit(&self, event: RecoveryEvent) -> Result<(), EventSinkError>;
}

/// Broadcast channel sink
///
/// Fans events out to any number of subscribers. Emitting with no live
/// subscriber reports a channel error; the monitor logs and continues.
pub struct ChannelSink {
    sender: broadcast::Sender<RecoveryEvent>,
}

impl ChannelSink {
    /// Create a new channel sink with the specified capacity
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<RecoveryEvent>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Create a new channel sink with default capacity (64)
    pub fn with_default_capacity() -> (Self, broadcast::Receiver<RecoveryEvent>) {
        Self::new(64)
    }

    /// Subscribe to receive events from this sink
    pub fn subscribe(&self) -> broadcast::Receiver<RecoveryEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: RecoveryEvent) -> Result<(), EventSinkError> {
        self.sender
            .send(event)
            .map_err(|e| EventSinkError::Channel(e.to_string()))?;
        Ok(())
    }
}

/// Callback adapter for callers that want the plain-function surface
pub struct CallbackSink {
    callback: Box<dyn Fn(RecoveryEvent) + Send + Sync>,
}

impl CallbackSink {
    /// Wrap a function as an event sink
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(RecoveryEvent) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl EventSink for CallbackSink {
    fn emit(&self, event: RecoveryEvent) -> Result<(), EventSinkError> {
        (self.callback)(event);
        Ok(())
    }
}

/// Newline-delimited JSON sink
///
/// Writes each event as one JSON line, flushed immediately.
pub struct JsonlSink<W: Write + Send + Sync> {
    writer: std::sync::Mutex<W>,
}

impl<W: Write + Send + Sync> JsonlSink<W> {
    /// Create a sink writing to the specified output
    pub fn new(writer: W) -> Self {
        Self {
            writer: std::sync::Mutex::new(writer),
        }
    }
}

impl JsonlSink<std::io::Stdout> {
    /// Create a sink writing to stdout
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send + Sync> EventSink for JsonlSink<W> {
    fn emit(&self, event: RecoveryEvent) -> Result<(), EventSinkError> {
        let line = serde_json::to_string(&event)
            .map_err(|e| EventSinkError::Serialization(e.to_string()))?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| EventSinkError::Channel("writer lock poisoned".to_string()))?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_tags() {
        let json = serde_json::to_string(&RecoveryEvent::Reconnecting).unwrap();
        assert_eq!(json, r#"{"type":"reconnecting"}"#);

        let json = serde_json::to_string(&RecoveryEvent::QualityIssue {
            issue: "High latency: 600ms".to_string(),
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"type":"quality_issue","issue":"High latency: 600ms"}"#
        );

        let back: RecoveryEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back,
            RecoveryEvent::QualityIssue {
                issue: "High latency: 600ms".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_channel_sink_delivery() {
        let (sink, mut rx) = ChannelSink::new(8);
        sink.emit(RecoveryEvent::Reconnecting).unwrap();
        sink.emit(RecoveryEvent::Reconnected).unwrap();

        assert_eq!(rx.recv().await.unwrap(), RecoveryEvent::Reconnecting);
        assert_eq!(rx.recv().await.unwrap(), RecoveryEvent::Reconnected);
    }

    #[tokio::test]
    async fn test_channel_sink_without_subscribers_errors() {
        let (sink, rx) = ChannelSink::new(8);
        drop(rx);
        assert!(sink.emit(RecoveryEvent::Reconnecting).is_err());
    }

    #[test]
    fn test_callback_sink_invokes_function() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let sink = CallbackSink::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        sink.emit(RecoveryEvent::QualityRecovered).unwrap();
        sink.emit(RecoveryEvent::ReconnectFailed).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_jsonl_sink_writes_lines() {
        let sink = JsonlSink::new(Vec::new());
        sink.emit(RecoveryEvent::Reconnecting).unwrap();
        sink.emit(RecoveryEvent::QualityRecovered).unwrap();

        let buf = sink.writer.into_inner().unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"type":"reconnecting"}"#);
        assert_eq!(lines[1], r#"{"type":"quality_recovered"}"#);
    }
}
