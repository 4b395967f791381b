//! Pipeline configuration.
//!
//! One plain struct gathering every tunable named in the options table,
//! validated once at construction. Runtime state that evolves while the
//! pipeline runs (the adaptive threshold, the rate EWMA) lives in
//! [`crate::adaptive::AdaptiveFilterState`] instead, never here.

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    None,
    Serial,
    File,
    Both,
}

impl OutputMode {
    pub fn wants_serial(self) -> bool {
        matches!(self, OutputMode::Serial | OutputMode::Both)
    }

    pub fn wants_file(self) -> bool {
        matches!(self, OutputMode::File | OutputMode::Both)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Sensor extents. The serial wire format reserves byte value 0xFF as an
    /// event separator, so both dimensions must stay below 255.
    pub width: u16,
    pub height: u16,

    /// Minimum inter-event dt at a single pixel before the next event there
    /// is accepted (microseconds).
    pub refractory_period_us: i64,

    /// Plane-fit window and rejection thresholds.
    pub flow_dt_min_us: i64,
    pub flow_dt_max_us: i64,
    pub flow_dx: u16,
    pub flow_thr1: f64,
    pub flow_thr2: f64,

    /// Regularization filter.
    pub filter_enable: bool,
    pub filter_dt_max_us: i64,
    pub filter_dx: u16,
    pub filter_max_speed_factor: f64,
    pub filter_max_angle_deg: f64,

    /// Adaptive background-activity filter.
    pub adaptive_enable: bool,
    pub adaptive_dt_min_us: i64,
    pub adaptive_dt_max_us: i64,
    pub adaptive_rate_setpoint: f64,
    pub adaptive_gain: f64,
    pub adaptive_tau_s: f64,

    /// Declared but unused in the reference implementation; carried through
    /// for configuration compatibility only.
    pub sub_sample_by: u8,

    pub output_mode: OutputMode,
    pub serial_port: Option<String>,
    pub serial_baud: u32,
    pub output_file: Option<String>,

    pub output_ring_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            width: 128,
            height: 128,
            refractory_period_us: 10_000,
            flow_dt_min_us: 3_000,
            flow_dt_max_us: 300_000,
            flow_dx: 3,
            flow_thr1: 1e5,
            flow_thr2: 5e3,
            filter_enable: true,
            filter_dt_max_us: 300_000,
            filter_dx: 3,
            filter_max_speed_factor: 1.0,
            filter_max_angle_deg: 20.0,
            adaptive_enable: true,
            adaptive_dt_min_us: 100,
            adaptive_dt_max_us: 1_000_000,
            adaptive_rate_setpoint: 600.0,
            adaptive_gain: 2.0,
            adaptive_tau_s: 0.01,
            sub_sample_by: 0,
            output_mode: OutputMode::None,
            serial_port: None,
            serial_baud: 115_200,
            output_file: None,
            output_ring_capacity: 1024,
        }
    }
}

impl Config {
    /// Validates bounds and cross-field requirements, returning the first
    /// violation found. Called from [`crate::pipeline::Pipeline::new`];
    /// running it twice on the same values is a no-op that yields the same
    /// validated configuration each time.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::Config("width/height must be nonzero".into()));
        }
        if self.width > 254 || self.height > 254 {
            return Err(PipelineError::Config(
                "width/height must be <= 254 (serial separator reserves 0xFF)".into(),
            ));
        }
        if self.flow_dt_min_us < 0 || self.flow_dt_max_us <= self.flow_dt_min_us {
            return Err(PipelineError::Config("flow_dtMin/flow_dtMax out of order".into()));
        }
        if self.flow_dx == 0 {
            return Err(PipelineError::Config("flow_dx must be nonzero".into()));
        }
        if self.flow_thr1 <= 0.0 || self.flow_thr2 <= 0.0 {
            return Err(PipelineError::Config("flow thresholds must be positive".into()));
        }
        if self.filter_dx == 0 {
            return Err(PipelineError::Config("filter_dx must be nonzero".into()));
        }
        if self.filter_max_speed_factor <= 0.0 || self.filter_max_angle_deg <= 0.0 {
            return Err(PipelineError::Config("filter tolerances must be positive".into()));
        }
        if self.adaptive_dt_min_us <= 0 || self.adaptive_dt_max_us <= self.adaptive_dt_min_us {
            return Err(PipelineError::Config("adaptive_dtMin/adaptive_dtMax out of order".into()));
        }
        if self.adaptive_rate_setpoint <= 0.0 {
            return Err(PipelineError::Config("adaptive_rateSP must be positive".into()));
        }
        if self.adaptive_gain <= 1.0 {
            return Err(PipelineError::Config(
                "adaptive_gain must be > 1 (gain of 1 makes no progress, <1 flips sign)".into(),
            ));
        }
        if self.adaptive_tau_s <= 0.0 {
            return Err(PipelineError::Config("adaptive_tau must be positive".into()));
        }
        if self.output_ring_capacity == 0 {
            return Err(PipelineError::Config("output_ring_capacity must be nonzero".into()));
        }
        if self.output_mode.wants_serial() && self.serial_port.is_none() {
            return Err(PipelineError::Config(
                "output mode requires serial but no serial_port was set".into(),
            ));
        }
        if self.output_mode.wants_file() && self.output_file.is_none() {
            return Err(PipelineError::Config(
                "output mode requires file but no output_file was set".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_gain_of_one() {
        let mut cfg = Config::default();
        cfg.adaptive_gain = 1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_oversize_sensor() {
        let mut cfg = Config::default();
        cfg.width = 255;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn requires_serial_port_when_mode_wants_serial() {
        let mut cfg = Config::default();
        cfg.output_mode = OutputMode::Serial;
        assert!(cfg.validate().is_err());
        cfg.serial_port = Some("/dev/ttyUSB0".into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_is_idempotent() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        cfg.validate().unwrap();
    }
}
