//! JSON wire format for delta messages

use tokio_tungstenite::tungstenite::Message;

use tracker_core::DeltaEvent;

/// Encode an outbound delta as a text frame.
pub fn encode(event: &DeltaEvent) -> Result<Message, serde_json::Error> {
    serde_json::to_string(event).map(Message::Text)
}

/// Parse an inbound payload. Anything that is not a delta object is `None`.
pub fn decode(payload: &str) -> Option<DeltaEvent> {
    let event: DeltaEvent = serde_json::from_str(payload).ok()?;
    if event.symbol.as_str().is_empty() || !event.delta_price.is_finite() {
        return None;
    }
    Some(event)
}
