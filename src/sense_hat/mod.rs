//! # Sense HAT Collaborators
//!
//! Seams between the telemetry loops and the board. Every loop talks to the hardware
//! through the three traits defined here, so the loops can be driven by the real
//! Sense HAT adapters or by test doubles.
//!
//! ```text
//! sense_hat/
//! ├── sensors.rs     - HTS221, LPS25H and LSM9DS1 magnetometer over I2C (rppal)
//! ├── joystick.rs    - Linux input device reader for the five-way joystick
//! └── led_matrix.rs  - 8x8 RGB565 framebuffer
//! ```
//!
//! Sensor reads block the calling task. There is no timeout on a stalled I2C
//! transfer; the polling loop simply waits.

pub mod joystick;
pub mod led_matrix;
pub mod sensors;

pub use joystick::Joystick;
pub use led_matrix::LedMatrix;
pub use sensors::SenseHatSensors;

/// RGB colour as used by the LED matrix, one byte per channel.
pub type Rgb = (u8, u8, u8);

pub mod colors {
    use super::Rgb;

    pub const BLACK: Rgb = (0, 0, 0);
    pub const RED: Rgb = (255, 0, 0);
    pub const GREEN: Rgb = (0, 255, 0);
    pub const BLUE: Rgb = (0, 0, 255);
    pub const YELLOW: Rgb = (255, 255, 0);
    pub const ORANGE: Rgb = (255, 165, 0);
    pub const WHITE: Rgb = (255, 255, 255);
}

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("I2C transfer with {device} failed: {source}")]
    I2c {
        device: &'static str,
        #[source]
        source: rppal::i2c::Error,
    },

    #[error("Device not found: {0}")]
    DeviceNotFound(&'static str),

    #[error("Device I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw readings of the environmental sensors.
///
/// Values are returned exactly as the drivers compute them; rounding and
/// averaging belong to [`crate::reading::normalize`].
pub trait EnvironmentSensors {
    /// Barometric pressure in hPa.
    fn pressure(&mut self) -> Result<f64, SensorError>;

    /// Relative humidity in percent.
    fn humidity(&mut self) -> Result<f64, SensorError>;

    /// Temperature in °C measured by the humidity sensor.
    fn temperature(&mut self) -> Result<f64, SensorError>;

    /// Temperature in °C measured by the pressure sensor.
    fn temperature_from_pressure(&mut self) -> Result<f64, SensorError>;

    /// Magnetic heading in degrees.
    fn compass(&mut self) -> Result<f64, SensorError>;
}

/// One completed joystick action (press followed by release).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Middle,
}

/// Queue of joystick actions that happened since the last drain.
pub trait DirectionEvents {
    fn drain(&mut self) -> Vec<Direction>;
}

/// Fire-and-forget output to the LED matrix.
pub trait MatrixDisplay {
    fn clear(&mut self);

    fn show_text(&mut self, text: &str, scroll_speed: f32, color: Rgb);

    fn show_single_character(&mut self, ch: char, foreground: Rgb, background: Rgb);
}
