use crate::tsl2591::{Gain, IntegrationTime};

use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Where the formatted lux readings go.
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub enum TelemetryTarget {
    Stdout,
    /// `host:port` of a line-oriented TCP collector.
    Tcp(String),
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct Config {
    pub gain: Gain,
    pub integration_time: IntegrationTime,
    /// Delay between samples, in milliseconds.
    pub poll_period_ms: u64,
    pub telemetry: TelemetryTarget,
}

impl Config {
    pub fn from_str(conf: &str) -> Result<Self, anyhow::Error> {
        Ok(ron::from_str::<Config>(conf)?)
    }

    pub fn read_from_file<P: AsRef<Path>>(file: P) -> Result<Self, anyhow::Error> {
        Ok(ron::de::from_reader(BufReader::new(File::open(file)?))?)
    }
}
