//! I2C drivers for the Sense HAT environmental sensors
//!
//! All three chips share I2C bus 1; the slave address is switched before every
//! register access.
//!
//! | Chip    | Address | Provides                          |
//! |---------|---------|-----------------------------------|
//! | HTS221  | 0x5F    | humidity, temperature             |
//! | LPS25H  | 0x5C    | pressure, temperature             |
//! | LSM9DS1 | 0x1C    | magnetic field (compass heading)  |

use rppal::i2c::I2c;
use tracing::{debug, info};

use super::{EnvironmentSensors, SensorError};

const HTS221_ADDR: u16 = 0x5F;
const LPS25H_ADDR: u16 = 0x5C;
const LSM9DS1_MAG_ADDR: u16 = 0x1C;

const HTS221: &str = "HTS221";
const LPS25H: &str = "LPS25H";
const LSM9DS1: &str = "LSM9DS1";

// HTS221 registers
const HTS221_AV_CONF: u8 = 0x10;
const HTS221_CTRL_REG1: u8 = 0x20;
const HTS221_HUMIDITY_OUT_L: u8 = 0x28;
const HTS221_TEMP_OUT_L: u8 = 0x2A;
const HTS221_H0_RH_X2: u8 = 0x30;
const HTS221_H1_RH_X2: u8 = 0x31;
const HTS221_T0_DEGC_X8: u8 = 0x32;
const HTS221_T1_DEGC_X8: u8 = 0x33;
const HTS221_T1_T0_MSB: u8 = 0x35;
const HTS221_H0_T0_OUT_L: u8 = 0x36;
const HTS221_H1_T0_OUT_L: u8 = 0x3A;
const HTS221_T0_OUT_L: u8 = 0x3C;
const HTS221_T1_OUT_L: u8 = 0x3E;

// LPS25H registers
const LPS25H_CTRL_REG1: u8 = 0x20;
const LPS25H_PRESS_OUT_XL: u8 = 0x28;
const LPS25H_TEMP_OUT_L: u8 = 0x2B;

// LSM9DS1 magnetometer registers
const LSM9DS1_CTRL_REG1_M: u8 = 0x20;
const LSM9DS1_CTRL_REG2_M: u8 = 0x21;
const LSM9DS1_CTRL_REG3_M: u8 = 0x22;
const LSM9DS1_CTRL_REG4_M: u8 = 0x23;
const LSM9DS1_OUT_X_L_M: u8 = 0x28;
const LSM9DS1_OUT_Y_L_M: u8 = 0x2A;

/// Factory calibration of the HTS221, read once at startup.
#[derive(Debug, Clone, PartialEq)]
struct Hts221Calibration {
    h0_rh: f64,
    h1_rh: f64,
    t0_degc: f64,
    t1_degc: f64,
    h0_t0_out: i16,
    h1_t0_out: i16,
    t0_out: i16,
    t1_out: i16,
}

impl Hts221Calibration {
    fn temperature(&self, raw: i16) -> f64 {
        interpolate(raw, self.t0_out, self.t1_out, self.t0_degc, self.t1_degc)
    }

    fn humidity(&self, raw: i16) -> f64 {
        interpolate(raw, self.h0_t0_out, self.h1_t0_out, self.h0_rh, self.h1_rh)
    }
}

/// Linear interpolation between the two calibration points of a sensor.
fn interpolate(raw: i16, x0: i16, x1: i16, y0: f64, y1: f64) -> f64 {
    if x1 == x0 {
        return y0;
    }
    y0 + (f64::from(raw) - f64::from(x0)) * (y1 - y0) / (f64::from(x1) - f64::from(x0))
}

/// LPS25H pressure output is a signed 24-bit value in 1/4096 hPa.
fn pressure_hpa(xl: u8, l: u8, h: u8) -> f64 {
    let raw = i32::from_le_bytes([0, xl, l, h]) >> 8;
    f64::from(raw) / 4096.0
}

/// LPS25H temperature output, offset 42.5 °C and 480 LSB/°C.
fn lps25h_temperature(raw: i16) -> f64 {
    42.5 + f64::from(raw) / 480.0
}

/// Compass bearing from the horizontal magnetic field components, in [0, 360).
pub fn heading_degrees(x: f64, y: f64) -> f64 {
    let heading = y.atan2(x).to_degrees().rem_euclid(360.0);
    if heading >= 360.0 {
        0.0
    } else {
        heading
    }
}

pub struct SenseHatSensors {
    i2c: I2c,
    calibration: Hts221Calibration,
}

impl SenseHatSensors {
    /// Opens I2C bus 1, powers up the three sensors and reads the humidity
    /// sensor's calibration.
    pub fn open() -> Result<Self, SensorError> {
        info!("Opening Sense HAT sensors on I2C bus 1");
        let i2c = I2c::new().map_err(|source| SensorError::I2c {
            device: "I2C bus",
            source,
        })?;

        let mut sensors = Self {
            i2c,
            calibration: Hts221Calibration {
                h0_rh: 0.0,
                h1_rh: 0.0,
                t0_degc: 0.0,
                t1_degc: 0.0,
                h0_t0_out: 0,
                h1_t0_out: 0,
                t0_out: 0,
                t1_out: 0,
            },
        };

        // Power on, block data update, 1 Hz; 16 temperature / 32 humidity samples
        sensors.write_register(HTS221, HTS221_ADDR, HTS221_CTRL_REG1, 0x85)?;
        sensors.write_register(HTS221, HTS221_ADDR, HTS221_AV_CONF, 0x1B)?;
        // Power on, 25 Hz, block data update
        sensors.write_register(LPS25H, LPS25H_ADDR, LPS25H_CTRL_REG1, 0xC4)?;
        // Ultra-high performance XY/Z, 10 Hz, ±4 gauss, continuous conversion
        sensors.write_register(LSM9DS1, LSM9DS1_MAG_ADDR, LSM9DS1_CTRL_REG1_M, 0x70)?;
        sensors.write_register(LSM9DS1, LSM9DS1_MAG_ADDR, LSM9DS1_CTRL_REG2_M, 0x00)?;
        sensors.write_register(LSM9DS1, LSM9DS1_MAG_ADDR, LSM9DS1_CTRL_REG3_M, 0x00)?;
        sensors.write_register(LSM9DS1, LSM9DS1_MAG_ADDR, LSM9DS1_CTRL_REG4_M, 0x0C)?;

        sensors.calibration = sensors.read_calibration()?;
        debug!("HTS221 calibration: {:?}", sensors.calibration);

        info!("Sense HAT sensors initialized");
        Ok(sensors)
    }

    fn read_calibration(&mut self) -> Result<Hts221Calibration, SensorError> {
        let h0_rh_x2 = self.read_register(HTS221, HTS221_ADDR, HTS221_H0_RH_X2)?;
        let h1_rh_x2 = self.read_register(HTS221, HTS221_ADDR, HTS221_H1_RH_X2)?;
        let t0_lsb = self.read_register(HTS221, HTS221_ADDR, HTS221_T0_DEGC_X8)?;
        let t1_lsb = self.read_register(HTS221, HTS221_ADDR, HTS221_T1_DEGC_X8)?;
        let msb = self.read_register(HTS221, HTS221_ADDR, HTS221_T1_T0_MSB)?;

        let t0_degc_x8 = (u16::from(msb & 0x03) << 8) | u16::from(t0_lsb);
        let t1_degc_x8 = (u16::from(msb & 0x0C) << 6) | u16::from(t1_lsb);

        Ok(Hts221Calibration {
            h0_rh: f64::from(h0_rh_x2) / 2.0,
            h1_rh: f64::from(h1_rh_x2) / 2.0,
            t0_degc: f64::from(t0_degc_x8) / 8.0,
            t1_degc: f64::from(t1_degc_x8) / 8.0,
            h0_t0_out: self.read_i16(HTS221, HTS221_ADDR, HTS221_H0_T0_OUT_L)?,
            h1_t0_out: self.read_i16(HTS221, HTS221_ADDR, HTS221_H1_T0_OUT_L)?,
            t0_out: self.read_i16(HTS221, HTS221_ADDR, HTS221_T0_OUT_L)?,
            t1_out: self.read_i16(HTS221, HTS221_ADDR, HTS221_T1_OUT_L)?,
        })
    }

    fn select(&mut self, device: &'static str, address: u16) -> Result<(), SensorError> {
        self.i2c
            .set_slave_address(address)
            .map_err(|source| SensorError::I2c { device, source })
    }

    fn write_register(
        &mut self,
        device: &'static str,
        address: u16,
        register: u8,
        value: u8,
    ) -> Result<(), SensorError> {
        self.select(device, address)?;
        self.i2c
            .smbus_write_byte(register, value)
            .map_err(|source| SensorError::I2c { device, source })
    }

    fn read_register(
        &mut self,
        device: &'static str,
        address: u16,
        register: u8,
    ) -> Result<u8, SensorError> {
        self.select(device, address)?;
        self.i2c
            .smbus_read_byte(register)
            .map_err(|source| SensorError::I2c { device, source })
    }

    fn read_i16(
        &mut self,
        device: &'static str,
        address: u16,
        low_register: u8,
    ) -> Result<i16, SensorError> {
        let low = self.read_register(device, address, low_register)?;
        let high = self.read_register(device, address, low_register + 1)?;
        Ok(i16::from_le_bytes([low, high]))
    }
}

impl EnvironmentSensors for SenseHatSensors {
    fn pressure(&mut self) -> Result<f64, SensorError> {
        let xl = self.read_register(LPS25H, LPS25H_ADDR, LPS25H_PRESS_OUT_XL)?;
        let l = self.read_register(LPS25H, LPS25H_ADDR, LPS25H_PRESS_OUT_XL + 1)?;
        let h = self.read_register(LPS25H, LPS25H_ADDR, LPS25H_PRESS_OUT_XL + 2)?;
        Ok(pressure_hpa(xl, l, h))
    }

    fn humidity(&mut self) -> Result<f64, SensorError> {
        let raw = self.read_i16(HTS221, HTS221_ADDR, HTS221_HUMIDITY_OUT_L)?;
        Ok(self.calibration.humidity(raw))
    }

    fn temperature(&mut self) -> Result<f64, SensorError> {
        let raw = self.read_i16(HTS221, HTS221_ADDR, HTS221_TEMP_OUT_L)?;
        Ok(self.calibration.temperature(raw))
    }

    fn temperature_from_pressure(&mut self) -> Result<f64, SensorError> {
        let raw = self.read_i16(LPS25H, LPS25H_ADDR, LPS25H_TEMP_OUT_L)?;
        Ok(lps25h_temperature(raw))
    }

    fn compass(&mut self) -> Result<f64, SensorError> {
        let x = self.read_i16(LSM9DS1, LSM9DS1_MAG_ADDR, LSM9DS1_OUT_X_L_M)?;
        let y = self.read_i16(LSM9DS1, LSM9DS1_MAG_ADDR, LSM9DS1_OUT_Y_L_M)?;
        Ok(heading_degrees(f64::from(x), f64::from(y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_between_calibration_points() {
        let calibration = Hts221Calibration {
            h0_rh: 20.0,
            h1_rh: 80.0,
            t0_degc: 10.0,
            t1_degc: 30.0,
            h0_t0_out: 0,
            h1_t0_out: 6000,
            t0_out: -100,
            t1_out: 300,
        };

        assert_eq!(calibration.humidity(3000), 50.0);
        assert_eq!(calibration.temperature(100), 20.0);
    }

    #[test]
    fn degenerate_calibration_returns_first_point() {
        assert_eq!(interpolate(42, 7, 7, 12.5, 99.0), 12.5);
    }

    #[test]
    fn pressure_is_signed_24_bit_over_4096() {
        // 1013.25 hPa * 4096 = 4150272 = 0x3F5400
        assert_eq!(pressure_hpa(0x00, 0x54, 0x3F), 1013.25);
        assert_eq!(pressure_hpa(0x00, 0xF0, 0xFF), -1.0);
    }

    #[test]
    fn pressure_sensor_temperature_uses_offset() {
        assert_eq!(lps25h_temperature(0), 42.5);
        assert_eq!(lps25h_temperature(-480), 41.5);
    }

    #[test]
    fn heading_stays_in_compass_range() {
        assert_eq!(heading_degrees(1.0, 0.0), 0.0);
        assert!((heading_degrees(0.0, 1.0) - 90.0).abs() < 1e-9);
        assert!((heading_degrees(-1.0, 0.0) - 180.0).abs() < 1e-9);
        assert!((heading_degrees(0.0, -1.0) - 270.0).abs() < 1e-9);

        for step in 0..720 {
            let angle = f64::from(step).to_radians() * 0.5;
            let heading = heading_degrees(angle.cos(), angle.sin());
            assert!((0.0..360.0).contains(&heading), "{heading} out of range");
        }
    }
}
