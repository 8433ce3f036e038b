/// Driver for the TSL2591 light sensor: register protocol, gain/integration
/// time configuration, and the power/configure/read lifecycle, over any I2C
/// bus implementing the embedded-hal traits.
///
/// Datasheet for the sensor: https://cdn-shop.adafruit.com/datasheets/TSL25911_Datasheet_EN_v1.pdf
use embedded_hal::i2c::{I2c, SevenBitAddress};
use serde::Deserialize;
use thiserror::Error;

/// Fixed bus address of the part.
pub const I2C_ADDR: SevenBitAddress = 0x29;

/// Value read back from the ID register on a real TSL2591.
pub const DEVICE_ID: u8 = 0x50;

/// Every register access goes through the command register: "normal
/// transaction" addressing mode, OR'd onto the register address.
const COMMAND_BIT: u8 = 0xA0;

/// ENABLE value for power-up: PON (oscillator) | AEN (ALS ADC).
const ENABLE_POWER_ON: u8 = 0x03;
const ENABLE_POWER_OFF: u8 = 0x00;

#[allow(unused)]
pub mod register {
    // Configuration registers
    pub const ENABLE: u8 = 0x00;
    pub const CONTROL: u8 = 0x01;

    // Status registers
    pub const PID: u8 = 0x11;
    pub const ID: u8 = 0x12;
    pub const STATUS: u8 = 0x13;

    // Data registers, low byte first
    pub const CH0_LO: u8 = 0x14;
    pub const CH0_HI: u8 = 0x15;
    pub const CH1_LO: u8 = 0x16;
    pub const CH1_HI: u8 = 0x17;
}

#[derive(Debug, Error)]
pub enum SensorError {
    /// The register transport failed; configuration state is unchanged.
    #[error("bus transaction failed for register {register:#04x}: {detail}")]
    Bus { register: u8, detail: String },

    /// No TSL2591 answered at the expected address.
    #[error("device at {address:#04x} is not a TSL2591: ID {found:#04x}, expected 0x50")]
    NotDetected { address: u8, found: u8 },

    /// A gain or integration-time bit pattern the part does not define.
    /// Never substituted with a default multiplier.
    #[error("unrecognized {field} bits {bits:#04x}")]
    Configuration { field: &'static str, bits: u8 },

    /// Read attempted while the oscillator/ADC are disabled.
    #[error("sensor is powered down, no reading available")]
    NotReady,

    /// Read attempted before the first gain/integration-time write.
    #[error("gain and integration time have not been configured")]
    NotConfigured,

    /// The lux formula denominator degenerated; a table or timing bug,
    /// surfaced instead of producing NaN in a measurement record.
    #[error("degenerate counts-per-lux value {counts_per_lux}")]
    Arithmetic { counts_per_lux: f64 },
}

/// Analog gain setting.
///
/// Low gain suits bright light (saturation headroom), higher gains boost
/// sensitivity in dim conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Gain {
    Low,
    Medium,
    High,
    Maximum,
}

impl Gain {
    /// Bit pattern for the CONTROL register (bits 5:4).
    pub fn bits(self) -> u8 {
        match self {
            Gain::Low => 0x00,
            Gain::Medium => 0x10,
            Gain::High => 0x20,
            Gain::Maximum => 0x30,
        }
    }

    /// Gain multiplier used by the lux calculation.
    pub fn multiplier(self) -> f64 {
        match self {
            Gain::Low => 1.0,
            Gain::Medium => 25.0,
            Gain::High => 428.0,
            Gain::Maximum => 9876.0,
        }
    }

    /// Decode the gain field of a CONTROL register value.
    pub fn from_bits(bits: u8) -> Result<Self, SensorError> {
        match bits {
            0x00 => Ok(Gain::Low),
            0x10 => Ok(Gain::Medium),
            0x20 => Ok(Gain::High),
            0x30 => Ok(Gain::Maximum),
            _ => Err(SensorError::Configuration { field: "gain", bits }),
        }
    }
}

/// Integration time: how long the photodiodes accumulate charge per reading.
/// Short is fast but coarse, long is slow but accurate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum IntegrationTime {
    Ms100,
    Ms200,
    Ms300,
    Ms400,
    Ms500,
    Ms600,
}

impl IntegrationTime {
    /// Bit pattern for the CONTROL register (bits 2:0).
    pub fn bits(self) -> u8 {
        match self {
            IntegrationTime::Ms100 => 0x00,
            IntegrationTime::Ms200 => 0x01,
            IntegrationTime::Ms300 => 0x02,
            IntegrationTime::Ms400 => 0x03,
            IntegrationTime::Ms500 => 0x04,
            IntegrationTime::Ms600 => 0x05,
        }
    }

    /// Exposure duration in milliseconds.
    pub fn as_millis(self) -> u16 {
        100 * (self.bits() as u16 + 1)
    }

    /// Decode the integration-time field of a CONTROL register value.
    pub fn from_bits(bits: u8) -> Result<Self, SensorError> {
        match bits {
            0x00 => Ok(IntegrationTime::Ms100),
            0x01 => Ok(IntegrationTime::Ms200),
            0x02 => Ok(IntegrationTime::Ms300),
            0x03 => Ok(IntegrationTime::Ms400),
            0x04 => Ok(IntegrationTime::Ms500),
            0x05 => Ok(IntegrationTime::Ms600),
            _ => Err(SensorError::Configuration {
                field: "integration time",
                bits,
            }),
        }
    }
}

/// One raw reading: channel 0 is visible + infrared, channel 1 infrared only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub channel0: u16,
    pub channel1: u16,
}

/// A bound TSL2591 on an injected bus handle.
///
/// The bus is acquired and released by the caller; the driver only issues
/// transactions on it. Lifecycle is bind (`new`), `power_up`, `set_gain`,
/// then reads; reads before power-up or configuration are rejected rather
/// than returning garbage.
#[derive(Debug)]
pub struct Tsl2591<I: I2c> {
    i2c: I,
    address: SevenBitAddress,
    powered: bool,
    settings: Option<(Gain, IntegrationTime)>,
}

impl<I: I2c> Tsl2591<I> {
    /// Bind to a sensor at the standard address, verifying the device ID.
    pub fn new(i2c: I) -> Result<Self, SensorError> {
        Self::with_address(i2c, I2C_ADDR)
    }

    /// Bind to a sensor at a non-standard address.
    pub fn with_address(i2c: I, address: SevenBitAddress) -> Result<Self, SensorError> {
        let mut sensor = Tsl2591 {
            i2c,
            address,
            powered: false,
            settings: None,
        };

        let found = sensor.id()?;
        if found != DEVICE_ID {
            return Err(SensorError::NotDetected { address, found });
        }

        Ok(sensor)
    }

    /// Enable the internal oscillator and ALS ADC. Idempotent.
    pub fn power_up(&mut self) -> Result<(), SensorError> {
        self.write8(register::ENABLE, ENABLE_POWER_ON)?;
        self.powered = true;
        Ok(())
    }

    /// Disable the oscillator and ADC. Idempotent.
    pub fn power_down(&mut self) -> Result<(), SensorError> {
        self.write8(register::ENABLE, ENABLE_POWER_OFF)?;
        self.powered = false;
        Ok(())
    }

    /// Read the device-identification register. Presence check only, not
    /// part of the sampling path.
    pub fn id(&mut self) -> Result<u8, SensorError> {
        self.read8(register::ID)
    }

    /// Write gain and integration time as a single CONTROL register byte.
    ///
    /// Must be called at least once after power-up and before the first read;
    /// may be called again later to change sensitivity. No delay is inserted,
    /// the caller is responsible for waiting out an in-flight integration
    /// cycle before trusting the next sample.
    pub fn set_gain(&mut self, gain: Gain, integration: IntegrationTime) -> Result<(), SensorError> {
        self.write8(register::CONTROL, gain.bits() | integration.bits())?;
        self.settings = Some((gain, integration));
        Ok(())
    }

    /// Currently configured gain and integration time, if `set_gain` has run.
    pub fn settings(&self) -> Option<(Gain, IntegrationTime)> {
        self.settings
    }

    /// Read back and decode the CONTROL register from the device itself.
    pub fn read_config(&mut self) -> Result<(Gain, IntegrationTime), SensorError> {
        let raw = self.read8(register::CONTROL)?;
        let gain = Gain::from_bits(raw & 0x30)?;
        let integration = IntegrationTime::from_bits(raw & 0x07)?;
        Ok((gain, integration))
    }

    /// Read both channel data register pairs, low byte first.
    pub fn read_raw(&mut self) -> Result<RawSample, SensorError> {
        if !self.powered {
            return Err(SensorError::NotReady);
        }
        if self.settings.is_none() {
            return Err(SensorError::NotConfigured);
        }

        let channel0 = self.read16(register::CH0_LO)?;
        let channel1 = self.read16(register::CH1_LO)?;
        Ok(RawSample { channel0, channel1 })
    }

    /// Convenience: one raw sample converted with the configured settings.
    pub fn read_lux(&mut self) -> Result<f64, SensorError> {
        let (gain, integration) = self.settings.ok_or(SensorError::NotConfigured)?;
        let sample = self.read_raw()?;
        crate::lux::compute_lux(sample.channel0, sample.channel1, gain, integration)
    }

    /// Give the bus handle back to its owner.
    pub fn release(self) -> I {
        self.i2c
    }

    fn write8(&mut self, register: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[COMMAND_BIT | register, value])
            .map_err(|e| SensorError::Bus {
                register,
                detail: format!("{e:?}"),
            })
    }

    fn read8(&mut self, register: u8) -> Result<u8, SensorError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[COMMAND_BIT | register], &mut buf)
            .map_err(|e| SensorError::Bus {
                register,
                detail: format!("{e:?}"),
            })?;
        Ok(buf[0])
    }

    fn read16(&mut self, register: u8) -> Result<u16, SensorError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[COMMAND_BIT | register], &mut buf)
            .map_err(|e| SensorError::Bus {
                register,
                detail: format!("{e:?}"),
            })?;
        Ok(buf[0] as u16 | (buf[1] as u16) << 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    fn id_check() -> I2cTransaction {
        I2cTransaction::write_read(I2C_ADDR, vec![COMMAND_BIT | register::ID], vec![DEVICE_ID])
    }

    #[test]
    fn binding_verifies_device_id() {
        let i2c = I2cMock::new(&[id_check()]);
        let sensor = Tsl2591::new(i2c).unwrap();
        sensor.release().done();
    }

    #[test]
    fn binding_rejects_wrong_device_id() {
        let expectations = [I2cTransaction::write_read(
            I2C_ADDR,
            vec![COMMAND_BIT | register::ID],
            vec![0x34],
        )];
        let mut i2c = I2cMock::new(&expectations);

        let err = Tsl2591::new(i2c.clone()).unwrap_err();
        assert!(matches!(
            err,
            SensorError::NotDetected {
                address: 0x29,
                found: 0x34
            }
        ));

        i2c.done();
    }

    #[test]
    fn power_up_is_idempotent() {
        // Two power-ups mean two identical ENABLE writes, nothing more.
        let expectations = [
            id_check(),
            I2cTransaction::write(I2C_ADDR, vec![0xA0, 0x03]),
            I2cTransaction::write(I2C_ADDR, vec![0xA0, 0x03]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut sensor = Tsl2591::new(i2c).unwrap();

        sensor.power_up().unwrap();
        sensor.power_up().unwrap();

        sensor.release().done();
    }

    #[test]
    fn power_down_writes_zero() {
        let expectations = [
            id_check(),
            I2cTransaction::write(I2C_ADDR, vec![0xA0, 0x00]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut sensor = Tsl2591::new(i2c).unwrap();

        sensor.power_down().unwrap();

        sensor.release().done();
    }

    #[test]
    fn set_gain_combines_fields_into_control_byte() {
        // Medium gain (0x10) | 200ms (0x01), written to CONTROL (0x01 | 0xA0)
        let expectations = [
            id_check(),
            I2cTransaction::write(I2C_ADDR, vec![0xA1, 0x11]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut sensor = Tsl2591::new(i2c).unwrap();

        sensor
            .set_gain(Gain::Medium, IntegrationTime::Ms200)
            .unwrap();
        assert_eq!(
            sensor.settings(),
            Some((Gain::Medium, IntegrationTime::Ms200))
        );

        sensor.release().done();
    }

    #[test]
    fn read_raw_reconstructs_little_endian_pairs() {
        let expectations = [
            id_check(),
            I2cTransaction::write(I2C_ADDR, vec![0xA0, 0x03]),
            I2cTransaction::write(I2C_ADDR, vec![0xA1, 0x00]),
            // CH0 pair at 0x14: low 0xE8, high 0x03 -> 1000
            I2cTransaction::write_read(I2C_ADDR, vec![0xB4], vec![0xE8, 0x03]),
            // CH1 pair at 0x16: low 0x64, high 0x00 -> 100
            I2cTransaction::write_read(I2C_ADDR, vec![0xB6], vec![0x64, 0x00]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut sensor = Tsl2591::new(i2c).unwrap();

        sensor.power_up().unwrap();
        sensor.set_gain(Gain::Low, IntegrationTime::Ms100).unwrap();
        let sample = sensor.read_raw().unwrap();
        assert_eq!(
            sample,
            RawSample {
                channel0: 1000,
                channel1: 100
            }
        );

        sensor.release().done();
    }

    #[test]
    fn read_lux_uses_the_configured_settings() {
        let expectations = [
            id_check(),
            I2cTransaction::write(I2C_ADDR, vec![0xA0, 0x03]),
            I2cTransaction::write(I2C_ADDR, vec![0xA1, 0x11]),
            I2cTransaction::write_read(I2C_ADDR, vec![0xB4], vec![0xE8, 0x03]),
            I2cTransaction::write_read(I2C_ADDR, vec![0xB6], vec![0x64, 0x00]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut sensor = Tsl2591::new(i2c).unwrap();

        sensor.power_up().unwrap();
        sensor
            .set_gain(Gain::Medium, IntegrationTime::Ms200)
            .unwrap();

        // ch0=1000, ch1=100 at medium gain / 200ms comes out at ~68.22 lux
        let lux = sensor.read_lux().unwrap();
        assert!((lux - 68.2176).abs() < 1e-4, "lux = {lux}");

        sensor.release().done();
    }

    #[test]
    fn read_while_powered_down_is_rejected_without_bus_traffic() {
        let expectations = [
            id_check(),
            I2cTransaction::write(I2C_ADDR, vec![0xA0, 0x03]),
            I2cTransaction::write(I2C_ADDR, vec![0xA1, 0x00]),
            I2cTransaction::write(I2C_ADDR, vec![0xA0, 0x00]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut sensor = Tsl2591::new(i2c).unwrap();

        sensor.power_up().unwrap();
        sensor.set_gain(Gain::Low, IntegrationTime::Ms100).unwrap();
        sensor.power_down().unwrap();

        assert!(matches!(sensor.read_raw(), Err(SensorError::NotReady)));

        sensor.release().done();
    }

    #[test]
    fn read_before_configuration_is_rejected() {
        let expectations = [
            id_check(),
            I2cTransaction::write(I2C_ADDR, vec![0xA0, 0x03]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut sensor = Tsl2591::new(i2c).unwrap();

        sensor.power_up().unwrap();
        assert!(matches!(sensor.read_raw(), Err(SensorError::NotConfigured)));

        sensor.release().done();
    }

    #[test]
    fn read_config_decodes_control_byte() {
        // 0x22 = high gain | 300ms
        let expectations = [
            id_check(),
            I2cTransaction::write_read(I2C_ADDR, vec![0xA1], vec![0x22]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut sensor = Tsl2591::new(i2c).unwrap();

        let (gain, integration) = sensor.read_config().unwrap();
        assert_eq!(gain, Gain::High);
        assert_eq!(integration, IntegrationTime::Ms300);

        sensor.release().done();
    }

    #[test]
    fn unknown_gain_bits_are_a_configuration_error() {
        assert!(matches!(
            Gain::from_bits(0x40),
            Err(SensorError::Configuration { field: "gain", .. })
        ));
    }

    #[test]
    fn unknown_integration_bits_are_a_configuration_error() {
        assert!(matches!(
            IntegrationTime::from_bits(0x06),
            Err(SensorError::Configuration {
                field: "integration time",
                ..
            })
        ));
    }

    #[test]
    fn integration_time_millis() {
        assert_eq!(IntegrationTime::Ms100.as_millis(), 100);
        assert_eq!(IntegrationTime::Ms200.as_millis(), 200);
        assert_eq!(IntegrationTime::Ms600.as_millis(), 600);
    }
}
