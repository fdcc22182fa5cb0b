//! Joystick-selected MQTT topic with a CSV echo log.
//!
//! Each tick applies the joystick actions queued since the last tick, publishes the
//! selected channel while a topic is selected, then appends every message received
//! on a router topic to that channel's CSV file.

use color_eyre::eyre::Result;
use tracing::{debug, error, info};

use super::{ticker, until_interrupted, TickError};
use crate::config::AppConfig;
use crate::csv_log::CsvLogger;
use crate::mqtt::{InboundMessage, Inbox, Messenger, MqttLink};
use crate::reading;
use crate::router::TopicRouter;
use crate::sense_hat::{
    DirectionEvents, EnvironmentSensors, Joystick, LedMatrix, MatrixDisplay, SenseHatSensors,
};

pub const PROGRAM: &str = "joystick-logger";

pub struct JoystickLogger<S, D, J> {
    router: TopicRouter,
    sensors: S,
    display: D,
    joystick: J,
    csv: CsvLogger,
}

impl<S, D, J> JoystickLogger<S, D, J>
where
    S: EnvironmentSensors,
    D: MatrixDisplay,
    J: DirectionEvents,
{
    pub fn new(router: TopicRouter, sensors: S, display: D, joystick: J, csv: CsvLogger) -> Self {
        Self {
            router,
            sensors,
            display,
            joystick,
            csv,
        }
    }

    pub fn router(&self) -> &TopicRouter {
        &self.router
    }

    pub async fn tick<M>(&mut self, messenger: &mut M, inbox: &mut Inbox)
    where
        M: Messenger + ?Sized,
    {
        let directions = self.joystick.drain();
        self.router
            .handle_events(directions, messenger, &mut self.display);

        if self.router.is_publishing() {
            if let Err(e) = self.publish(messenger) {
                error!("Error reading sensors or publishing data: {}", e);
            }
        }

        for message in inbox.drain() {
            self.record(&message).await;
        }
    }

    fn publish<M>(&mut self, messenger: &mut M) -> Result<(), TickError>
    where
        M: Messenger + ?Sized,
    {
        let reading = reading::poll(&mut self.sensors)?;
        if let Some(topic) = self.router.publish_reading(&reading, messenger)? {
            info!(
                "Published to {}: Temperature={:.2}, Humidity={:.2}, Barometric pressure={:.2}, \
                 Magnetometer={:.2}",
                topic, reading.temperature, reading.humidity, reading.pressure, reading.heading
            );
        }
        Ok(())
    }

    async fn record(&self, message: &InboundMessage) {
        info!(
            "Received message on topic {}: {}",
            message.topic,
            String::from_utf8_lossy(&message.payload)
        );

        let Some(channel) = self.router.topics().channel_for(&message.topic) else {
            debug!("Ignoring message on unknown topic {}", message.topic);
            return;
        };

        if let Err(e) = self
            .csv
            .append(channel, &message.payload, &message.timestamp)
            .await
        {
            error!("{}", e);
        }
    }
}

fn log_instructions() {
    info!("...........................Program Starts................");
    info!("....Use the Joystick to Subscribe a topic......:");
    info!("Joystick control: Up will show you a Temperature Topic");
    info!("Joystick control: Down will show you a Pressure Topic");
    info!("Joystick control: Left will show you a Humidity Topic");
    info!("Joystick control: Right will show you a Magnetometer Topic");
    info!("Joystick control: Middle will unsubscribe from all topics");
}

async fn logger_loop<S, D, J, M>(
    logger: &mut JoystickLogger<S, D, J>,
    messenger: &mut M,
    inbox: &mut Inbox,
    period_secs: u64,
) -> Result<()>
where
    S: EnvironmentSensors,
    D: MatrixDisplay,
    J: DirectionEvents,
    M: Messenger + ?Sized,
{
    let mut ticker = ticker(period_secs);
    loop {
        ticker.tick().await;
        logger.tick(messenger, inbox).await;
    }
}

pub async fn run(config: AppConfig) -> Result<()> {
    let csv = CsvLogger::create(&config.csv.directory).await?;
    let sensors = SenseHatSensors::open()?;
    let mut display = LedMatrix::open()?;
    let joystick = Joystick::open().await?;
    display.clear();

    let (mut link, mut inbox) = MqttLink::create(&config.mqtt, PROGRAM).connect();
    let mut logger = JoystickLogger::new(
        TopicRouter::new(config.router_topics.clone()),
        sensors,
        display,
        joystick,
        csv,
    );

    log_instructions();
    let result = until_interrupted(logger_loop(
        &mut logger,
        &mut link,
        &mut inbox,
        config.intervals.live_secs,
    ))
    .await;

    link.shutdown().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_log::test_support::scratch_dir;
    use crate::mqtt::test_support::RecordingMessenger;
    use crate::reading::Channel;
    use crate::router::{RouterTopics, TopicSelection};
    use crate::sense_hat::test_support::{FixedSensors, RecordingDisplay, ScriptedJoystick};
    use crate::sense_hat::Direction;

    async fn logger(
        name: &str,
    ) -> JoystickLogger<FixedSensors, RecordingDisplay, ScriptedJoystick> {
        let csv = CsvLogger::create(&scratch_dir(name)).await.unwrap();
        JoystickLogger::new(
            TopicRouter::new(RouterTopics::default()),
            FixedSensors::default(),
            RecordingDisplay::default(),
            ScriptedJoystick::default(),
            csv,
        )
    }

    fn echo(topic: &str, payload: &str) -> InboundMessage {
        InboundMessage::from_topic(topic.to_string(), payload.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn idle_until_a_direction_arrives() {
        let mut logger = logger("idle").await;
        let mut messenger = RecordingMessenger::default();
        let (_sender, mut inbox) = Inbox::channel();

        logger.tick(&mut messenger, &mut inbox).await;

        assert!(messenger.requests.is_empty());
        assert_eq!(logger.router().selection(), TopicSelection::None);
    }

    #[tokio::test]
    async fn selected_channel_is_published_every_tick() {
        let mut logger = logger("publish").await;
        let mut messenger = RecordingMessenger::default();
        let (_sender, mut inbox) = Inbox::channel();

        logger.joystick.pending.push_back(Direction::Up);
        logger.tick(&mut messenger, &mut inbox).await;
        logger.tick(&mut messenger, &mut inbox).await;

        assert_eq!(
            messenger.published(),
            vec![
                ("TempeTopic".to_string(), "22.00".to_string()),
                ("TempeTopic".to_string(), "22.00".to_string()),
            ]
        );
        assert_eq!(messenger.active, vec!["TempeTopic".to_string()]);
    }

    #[tokio::test]
    async fn publish_failure_does_not_stop_the_router() {
        let mut logger = logger("failure").await;
        let mut messenger = RecordingMessenger {
            fail_publish: true,
            ..RecordingMessenger::default()
        };
        let (_sender, mut inbox) = Inbox::channel();

        logger.joystick.pending.push_back(Direction::Down);
        logger.tick(&mut messenger, &mut inbox).await;
        assert!(messenger.published().is_empty());
        assert_eq!(logger.router().selection(), TopicSelection::Pressure);

        messenger.fail_publish = false;
        logger.joystick.pending.push_back(Direction::Left);
        logger.tick(&mut messenger, &mut inbox).await;

        assert_eq!(logger.router().selection(), TopicSelection::Humidity);
        assert_eq!(
            messenger.published(),
            vec![("HumidityTopic".to_string(), "45.68".to_string())]
        );
    }

    #[tokio::test]
    async fn echoed_messages_land_in_channel_files() {
        let mut logger = logger("echo").await;
        let mut messenger = RecordingMessenger::default();
        let (sender, mut inbox) = Inbox::channel();

        sender.send(echo("MagnetometerTopic", "123.456")).unwrap();
        sender.send(echo("MagnetometerTopic", "")).unwrap();
        sender.send(echo("HumidityTopic", "not a number")).unwrap();
        sender.send(echo("home/sensors/pressure", "1000")).unwrap();
        logger.tick(&mut messenger, &mut inbox).await;

        let path = logger.csv.path(Channel::Magnetometer);
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let values: Vec<_> = content
            .lines()
            .map(|line| line.split(", ").nth(1).unwrap().to_string())
            .collect();
        assert_eq!(values, vec!["123.46", "0.00"]);

        assert!(!logger.csv.path(Channel::Humidity).exists());
        assert!(!logger.csv.path(Channel::Pressure).exists());
    }
}
