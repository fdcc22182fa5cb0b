//! Sense HAT joystick reader
//!
//! The joystick shows up as a Linux input device emitting key events. A reader task
//! decodes raw `input_event` records and forwards one [`Direction`] per completed
//! press-and-release into a queue that the polling loop drains once per tick.

use std::path::PathBuf;

use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use super::{Direction, DirectionEvents, SensorError};

const JOYSTICK_NAME: &str = "Raspberry Pi Sense HAT Joystick";
const INPUT_CLASS_DIR: &str = "/sys/class/input";
const INPUT_DEV_DIR: &str = "/dev/input";

const EV_KEY: u16 = 0x01;
const KEY_ENTER: u16 = 28;
const KEY_UP: u16 = 103;
const KEY_LEFT: u16 = 105;
const KEY_RIGHT: u16 = 106;
const KEY_DOWN: u16 = 108;
const KEY_RELEASED: i32 = 0;

// struct input_event { struct timeval time; __u16 type; __u16 code; __s32 value; }
#[cfg(target_pointer_width = "64")]
const TIMEVAL_SIZE: usize = 16;
#[cfg(not(target_pointer_width = "64"))]
const TIMEVAL_SIZE: usize = 8;
pub const INPUT_EVENT_SIZE: usize = TIMEVAL_SIZE + 8;

/// Decodes one raw `input_event`. Only key releases map to a direction.
pub fn decode_event(raw: &[u8; INPUT_EVENT_SIZE]) -> Option<Direction> {
    let kind = u16::from_ne_bytes([raw[TIMEVAL_SIZE], raw[TIMEVAL_SIZE + 1]]);
    let code = u16::from_ne_bytes([raw[TIMEVAL_SIZE + 2], raw[TIMEVAL_SIZE + 3]]);
    let value = i32::from_ne_bytes([
        raw[TIMEVAL_SIZE + 4],
        raw[TIMEVAL_SIZE + 5],
        raw[TIMEVAL_SIZE + 6],
        raw[TIMEVAL_SIZE + 7],
    ]);

    if kind != EV_KEY || value != KEY_RELEASED {
        return None;
    }

    match code {
        KEY_UP => Some(Direction::Up),
        KEY_DOWN => Some(Direction::Down),
        KEY_LEFT => Some(Direction::Left),
        KEY_RIGHT => Some(Direction::Right),
        KEY_ENTER => Some(Direction::Middle),
        _ => None,
    }
}

pub struct Joystick {
    events: mpsc::UnboundedReceiver<Direction>,
    _reader: DropGuard,
}

impl Joystick {
    /// Locates the joystick input device and starts the reader task.
    pub async fn open() -> Result<Self, SensorError> {
        let path = find_device().await?;
        info!("Opening joystick at {}", path.display());
        let file = tokio::fs::File::open(&path).await?;

        let (sender, events) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        tokio::spawn(read_events(file, sender, token.clone()));

        Ok(Self {
            events,
            _reader: token.drop_guard(),
        })
    }
}

impl DirectionEvents for Joystick {
    fn drain(&mut self) -> Vec<Direction> {
        let mut drained = Vec::new();
        while let Ok(direction) = self.events.try_recv() {
            drained.push(direction);
        }
        drained
    }
}

async fn read_events(
    mut file: tokio::fs::File,
    sender: mpsc::UnboundedSender<Direction>,
    token: CancellationToken,
) {
    let mut raw = [0u8; INPUT_EVENT_SIZE];
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Joystick reader cancelled");
                break;
            }
            result = file.read_exact(&mut raw) => match result {
                Ok(_) => {
                    if let Some(direction) = decode_event(&raw) {
                        debug!("Joystick {:?} released", direction);
                        if sender.send(direction).is_err() {
                            warn!("Joystick queue closed, stopping reader");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to read joystick event: {}", e);
                    break;
                }
            }
        }
    }
}

async fn find_device() -> Result<PathBuf, SensorError> {
    let mut entries = tokio::fs::read_dir(INPUT_CLASS_DIR).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.starts_with("event") {
            continue;
        }

        let mut name_path = entry.path();
        name_path.push("device/name");
        match tokio::fs::read_to_string(&name_path).await {
            Ok(device_name) if device_name.trim() == JOYSTICK_NAME => {
                return Ok(PathBuf::from(INPUT_DEV_DIR).join(name));
            }
            Ok(_) => {}
            Err(e) => debug!("Skipping {}: {}", name_path.display(), e),
        }
    }
    Err(SensorError::DeviceNotFound(JOYSTICK_NAME))
}
