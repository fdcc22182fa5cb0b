use std::fmt;

use chrono::NaiveDateTime;
use tokio::sync::mpsc;

/// A publish delivered by the broker to one of our subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub timestamp: NaiveDateTime,
}

impl fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} - {}: {}",
            self.timestamp,
            self.topic,
            String::from_utf8_lossy(&self.payload)
        )
    }
}

impl InboundMessage {
    pub fn from_topic(topic: String, payload: Vec<u8>) -> Self {
        InboundMessage {
            topic,
            payload,
            timestamp: chrono::Local::now().naive_local(),
        }
    }
}

/// Messages queued by the network task, drained by the polling loop once per tick.
pub struct Inbox {
    receiver: mpsc::UnboundedReceiver<InboundMessage>,
}

impl Inbox {
    pub fn channel() -> (mpsc::UnboundedSender<InboundMessage>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self { receiver })
    }

    /// Everything delivered since the last drain, in arrival order.
    pub fn drain(&mut self) -> Vec<InboundMessage> {
        let mut drained = Vec::new();
        while let Ok(message) = self.receiver.try_recv() {
            drained.push(message);
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_delivery_order() {
        let (sender, mut inbox) = Inbox::channel();
        for value in ["1.00", "2.00", "3.00"] {
            sender
                .send(InboundMessage::from_topic(
                    "TempeTopic".to_string(),
                    value.as_bytes().to_vec(),
                ))
                .unwrap();
        }

        let payloads: Vec<_> = inbox.drain().into_iter().map(|m| m.payload).collect();
        assert_eq!(payloads, vec![b"1.00".to_vec(), b"2.00".to_vec(), b"3.00".to_vec()]);
        assert!(inbox.drain().is_empty());
    }
}
