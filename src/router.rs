//! Joystick-driven topic router
//!
//! Keeps exactly one of four MQTT topics subscribed, selected by the last joystick
//! direction:
//!
//! ```text
//! up ──► Temperature   down ──► Pressure   left ──► Humidity
//! right ──► Magnetometer                   middle ──► None
//! ```
//!
//! While a topic is selected the router publishes the matching channel of every
//! reading to that same topic, so the program receives its own publishes back
//! through the subscription. The echo is what feeds the CSV logger.

use rumqttc::QoS;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::mqtt::{Messenger, MessagingError};
use crate::reading::{Channel, SensorReading};
use crate::sense_hat::{colors, Direction, MatrixDisplay, Rgb};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TopicSelection {
    #[default]
    None,
    Temperature,
    Pressure,
    Humidity,
    Magnetometer,
}

impl TopicSelection {
    pub fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::Up => TopicSelection::Temperature,
            Direction::Down => TopicSelection::Pressure,
            Direction::Left => TopicSelection::Humidity,
            Direction::Right => TopicSelection::Magnetometer,
            Direction::Middle => TopicSelection::None,
        }
    }

    pub fn channel(self) -> Option<Channel> {
        match self {
            TopicSelection::None => None,
            TopicSelection::Temperature => Some(Channel::Temperature),
            TopicSelection::Pressure => Some(Channel::Pressure),
            TopicSelection::Humidity => Some(Channel::Humidity),
            TopicSelection::Magnetometer => Some(Channel::Magnetometer),
        }
    }

    /// Letter and colours shown on the LED matrix when the selection is entered.
    pub fn acknowledgement(self) -> (char, Rgb, Rgb) {
        match self {
            TopicSelection::Temperature => ('U', colors::YELLOW, colors::BLACK),
            TopicSelection::Pressure => ('D', colors::BLUE, colors::BLACK),
            TopicSelection::Humidity => ('L', colors::GREEN, colors::BLACK),
            TopicSelection::Magnetometer => ('R', colors::RED, colors::BLACK),
            TopicSelection::None => ('M', colors::RED, colors::WHITE),
        }
    }
}

/// Topic names used by the router, one per channel.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RouterTopics {
    pub temperature: String,
    pub pressure: String,
    pub humidity: String,
    pub magnetometer: String,
}

impl Default for RouterTopics {
    fn default() -> Self {
        Self {
            temperature: "TempeTopic".to_string(),
            pressure: "PressureTopic".to_string(),
            humidity: "HumidityTopic".to_string(),
            magnetometer: "MagnetometerTopic".to_string(),
        }
    }
}

impl RouterTopics {
    pub fn topic(&self, channel: Channel) -> &str {
        match channel {
            Channel::Temperature => &self.temperature,
            Channel::Pressure => &self.pressure,
            Channel::Humidity => &self.humidity,
            Channel::Magnetometer => &self.magnetometer,
        }
    }

    pub fn channel_for(&self, topic: &str) -> Option<Channel> {
        Channel::ALL
            .into_iter()
            .find(|channel| self.topic(*channel) == topic)
    }
}

#[derive(Debug, Clone)]
pub struct TopicRouter {
    topics: RouterTopics,
    selection: TopicSelection,
    publishing: bool,
}

impl TopicRouter {
    pub fn new(topics: RouterTopics) -> Self {
        Self {
            topics,
            selection: TopicSelection::None,
            publishing: false,
        }
    }

    pub fn selection(&self) -> TopicSelection {
        self.selection
    }

    pub fn is_publishing(&self) -> bool {
        self.publishing
    }

    pub fn topics(&self) -> &RouterTopics {
        &self.topics
    }

    /// Moves to the selection for `direction`.
    ///
    /// Every other topic is unsubscribed before the new one is subscribed. The
    /// transition always completes: a rejected request is still followed by the
    /// remaining ones, and the first rejection is returned once the router has
    /// entered the new selection.
    pub fn apply<M, D>(
        &mut self,
        direction: Direction,
        messenger: &mut M,
        display: &mut D,
    ) -> Result<TopicSelection, MessagingError>
    where
        M: Messenger + ?Sized,
        D: MatrixDisplay + ?Sized,
    {
        let next = TopicSelection::from_direction(direction);
        let target = next.channel();

        match target {
            Some(channel) => info!(
                "Joystick {:?} pressed and released. Subscribing to {}",
                direction,
                self.topics.topic(channel)
            ),
            None => info!(
                "Joystick {:?} pressed and released. Unsubscribing from all topics",
                direction
            ),
        }

        let mut first_error = None;
        for channel in Channel::ALL {
            if Some(channel) != target {
                if let Err(e) = messenger.unsubscribe(self.topics.topic(channel)) {
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(channel) = target {
            if let Err(e) = messenger.subscribe(self.topics.topic(channel)) {
                first_error.get_or_insert(e);
            }
        }

        self.selection = next;
        self.publishing = target.is_some();

        let (letter, foreground, background) = next.acknowledgement();
        display.show_single_character(letter, foreground, background);

        match first_error {
            Some(e) => Err(e),
            None => Ok(next),
        }
    }

    /// Applies every pending direction in order. Rejected requests are logged and
    /// the remaining directions are still applied.
    pub fn handle_events<M, D>(
        &mut self,
        directions: impl IntoIterator<Item = Direction>,
        messenger: &mut M,
        display: &mut D,
    ) where
        M: Messenger + ?Sized,
        D: MatrixDisplay + ?Sized,
    {
        for direction in directions {
            if let Err(e) = self.apply(direction, messenger, display) {
                error!("Topic switch for {:?} incomplete: {}", direction, e);
            }
        }
    }

    /// Publishes the selected channel of `reading` to the selected topic.
    ///
    /// Returns the topic published to, or `None` while publishing is disabled.
    pub fn publish_reading<M>(
        &self,
        reading: &SensorReading,
        messenger: &mut M,
    ) -> Result<Option<&str>, MessagingError>
    where
        M: Messenger + ?Sized,
    {
        let Some(channel) = self.selection.channel().filter(|_| self.publishing) else {
            return Ok(None);
        };
        let topic = self.topics.topic(channel);
        let payload = format!("{:.2}", reading.value(channel));
        messenger.publish(topic, payload.into_bytes(), QoS::AtMostOnce, false)?;
        Ok(Some(topic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt::test_support::{RecordingMessenger, Request};
    use crate::reading::normalize;
    use crate::sense_hat::test_support::{RecordingDisplay, Shown};

    fn router() -> TopicRouter {
        TopicRouter::new(RouterTopics::default())
    }

    #[test]
    fn starts_with_nothing_selected() {
        let router = router();
        assert_eq!(router.selection(), TopicSelection::None);
        assert!(!router.is_publishing());
    }

    #[test]
    fn maps_directions_to_selections() {
        let mut router = router();
        let mut messenger = RecordingMessenger::default();
        let mut display = RecordingDisplay::default();

        let cases = [
            (Direction::Up, TopicSelection::Temperature, "TempeTopic"),
            (Direction::Down, TopicSelection::Pressure, "PressureTopic"),
            (Direction::Left, TopicSelection::Humidity, "HumidityTopic"),
            (Direction::Right, TopicSelection::Magnetometer, "MagnetometerTopic"),
        ];
        for (direction, selection, topic) in cases {
            router.apply(direction, &mut messenger, &mut display).unwrap();
            assert_eq!(router.selection(), selection);
            assert!(router.is_publishing());
            assert_eq!(messenger.active, vec![topic.to_string()]);
        }
    }

    #[test]
    fn unsubscribes_others_before_subscribing() {
        let mut router = router();
        let mut messenger = RecordingMessenger::default();
        let mut display = RecordingDisplay::default();

        router
            .apply(Direction::Left, &mut messenger, &mut display)
            .unwrap();

        assert_eq!(
            messenger.requests,
            vec![
                Request::Unsubscribe("TempeTopic".to_string()),
                Request::Unsubscribe("PressureTopic".to_string()),
                Request::Unsubscribe("MagnetometerTopic".to_string()),
                Request::Subscribe("HumidityTopic".to_string()),
            ]
        );
    }

    #[test]
    fn at_most_one_subscription_for_any_sequence() {
        let all = [
            Direction::Up,
            Direction::Down,
            Direction::Left,
            Direction::Right,
            Direction::Middle,
        ];
        // every sequence of length three over the five directions
        for a in all {
            for b in all {
                for c in all {
                    let mut router = router();
                    let mut messenger = RecordingMessenger::default();
                    let mut display = RecordingDisplay::default();

                    router.handle_events([a, b, c], &mut messenger, &mut display);

                    assert!(messenger.max_active <= 1, "{:?}", [a, b, c]);
                    if c == Direction::Middle {
                        assert!(messenger.active.is_empty());
                        assert!(!router.is_publishing());
                    } else {
                        assert_eq!(messenger.active.len(), 1);
                    }
                }
            }
        }
    }

    #[test]
    fn up_right_middle_ends_with_nothing_subscribed() {
        let mut router = router();
        let mut messenger = RecordingMessenger::default();
        let mut display = RecordingDisplay::default();

        router.handle_events(
            [Direction::Up, Direction::Right, Direction::Middle],
            &mut messenger,
            &mut display,
        );

        assert_eq!(router.selection(), TopicSelection::None);
        assert!(messenger.active.is_empty());

        let position = |wanted: Request| {
            messenger
                .requests
                .iter()
                .position(|r| *r == wanted)
                .unwrap()
        };
        let temperature_on = position(Request::Subscribe("TempeTopic".to_string()));
        let magnetometer_on = position(Request::Subscribe("MagnetometerTopic".to_string()));
        let temperature_off = messenger
            .requests
            .iter()
            .rposition(|r| *r == Request::Unsubscribe("TempeTopic".to_string()))
            .unwrap();
        let magnetometer_off = messenger
            .requests
            .iter()
            .rposition(|r| *r == Request::Unsubscribe("MagnetometerTopic".to_string()))
            .unwrap();

        assert!(temperature_on < temperature_off);
        assert!(magnetometer_on < magnetometer_off);
        assert_eq!(
            display.shown,
            vec![
                Shown::Character('U', colors::YELLOW, colors::BLACK),
                Shown::Character('R', colors::RED, colors::BLACK),
                Shown::Character('M', colors::RED, colors::WHITE),
            ]
        );
    }

    #[test]
    fn publishes_selected_channel_to_selected_topic() {
        let mut router = router();
        let mut messenger = RecordingMessenger::default();
        let mut display = RecordingDisplay::default();
        let reading = normalize(21.0, 23.0, 45.5, 1013.254, 12.0);

        assert_eq!(router.publish_reading(&reading, &mut messenger).unwrap(), None);

        router
            .apply(Direction::Down, &mut messenger, &mut display)
            .unwrap();
        let topic = router.publish_reading(&reading, &mut messenger).unwrap();

        assert_eq!(topic, Some("PressureTopic"));
        assert_eq!(
            messenger.published(),
            vec![("PressureTopic".to_string(), "1013.25".to_string())]
        );
        // the topic we publish to is the topic we are subscribed to
        assert_eq!(messenger.active, vec!["PressureTopic".to_string()]);
    }

    #[test]
    fn middle_stops_publishing() {
        let mut router = router();
        let mut messenger = RecordingMessenger::default();
        let mut display = RecordingDisplay::default();
        let reading = normalize(21.0, 23.0, 45.5, 1013.0, 12.0);

        router.handle_events(
            [Direction::Up, Direction::Middle],
            &mut messenger,
            &mut display,
        );

        assert_eq!(router.publish_reading(&reading, &mut messenger).unwrap(), None);
        assert!(messenger.published().is_empty());
    }

    #[test]
    fn rejected_unsubscribe_still_completes_the_switch() {
        let mut router = router();
        let mut messenger = RecordingMessenger::default();
        let mut display = RecordingDisplay::default();
        let reading = normalize(21.0, 23.0, 45.5, 1013.254, 12.0);

        router
            .apply(Direction::Up, &mut messenger, &mut display)
            .unwrap();
        messenger.fail_unsubscribe = Some("HumidityTopic".to_string());
        let result = router.apply(Direction::Down, &mut messenger, &mut display);

        assert!(result.is_err());
        assert_eq!(router.selection(), TopicSelection::Pressure);
        assert!(router.is_publishing());
        assert_eq!(messenger.active, vec!["PressureTopic".to_string()]);
        assert_eq!(
            display.shown.last(),
            Some(&Shown::Character('D', colors::BLUE, colors::BLACK))
        );

        // the router publishes to the topic it is actually subscribed to
        let topic = router.publish_reading(&reading, &mut messenger).unwrap();
        assert_eq!(topic, Some("PressureTopic"));
    }

    #[test]
    fn maps_topics_back_to_channels() {
        let topics = RouterTopics::default();
        assert_eq!(topics.channel_for("TempeTopic"), Some(Channel::Temperature));
        assert_eq!(
            topics.channel_for("MagnetometerTopic"),
            Some(Channel::Magnetometer)
        );
        assert_eq!(topics.channel_for("home/sensors/pressure"), None);
    }
}
