/// Conversion from raw channel counts to lux.
///
/// Channel 0 sees visible + infrared light, channel 1 infrared only; the two
/// empirical formulas below correct for spectral response and the larger of
/// the two is taken. Coefficients and the device factor come from the part's
/// characterization data.
///
/// Based on the same formula as the adafruit libraries:
///     https://github.com/adafruit/Adafruit_TSL2591_Library/blob/master/Adafruit_TSL2591.cpp
use crate::tsl2591::{Gain, IntegrationTime, SensorError};

/// Device characterization factor (GA = 1, glass attenuation ignored).
const LUX_DF: f64 = 408.0;
const LUX_COEF_B: f64 = 1.64;
const LUX_COEF_C: f64 = 0.59;
const LUX_COEF_D: f64 = 0.86;

/// Returned when either channel is saturated. Indistinguishable from a true
/// zero-light reading; callers that care must lower the gain and resample.
pub const SATURATED: f64 = 0.0;

/// Compute lux from the two raw channel counts and the settings they were
/// captured under.
///
/// A negative result is possible and passed through unclamped; callers may
/// treat it as "below the noise floor". A degenerate counts-per-lux
/// denominator is an error, never a NaN.
pub fn compute_lux(
    channel0: u16,
    channel1: u16,
    gain: Gain,
    integration: IntegrationTime,
) -> Result<f64, SensorError> {
    // A full-scale count on either channel means the true level is unknown.
    if channel0 == 0xFFFF || channel1 == 0xFFFF {
        return Ok(SATURATED);
    }

    let atime = integration.as_millis() as f64;
    let again = gain.multiplier();

    let cpl = (atime * again) / LUX_DF;
    if cpl <= 0.0 {
        return Err(SensorError::Arithmetic {
            counts_per_lux: cpl,
        });
    }

    let d0 = channel0 as f64;
    let d1 = channel1 as f64;

    let lux1 = (d0 - LUX_COEF_B * d1) / cpl;
    let lux2 = (LUX_COEF_C * d0 - LUX_COEF_D * d1) / cpl;

    Ok(f64::max(lux1, lux2))
}
