use crate::config::BatteryConfig;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Physical state of the battery. Owned exclusively by the reservation
/// manager; nothing else mutates the SOC.
///
/// Invariant: `0 <= soc_mwh <= capacity_mwh` at every observable point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatteryState {
    capacity_mwh: f64,
    power_mw: f64,
    round_trip_efficiency: f64,
    soc_mwh: f64,
}

impl BatteryState {
    pub fn from_config(config: &BatteryConfig) -> Result<Self, ConfigError> {
        if config.capacity_mwh <= 0.0 {
            return Err(ConfigError::Invalid("capacity_mwh must be > 0".into()));
        }
        if config.power_mw <= 0.0 {
            return Err(ConfigError::Invalid("power_mw must be > 0".into()));
        }
        if config.round_trip_efficiency <= 0.0 || config.round_trip_efficiency > 1.0 {
            return Err(ConfigError::Invalid(
                "round_trip_efficiency must be in (0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&config.soc_initial_fraction) {
            return Err(ConfigError::Invalid(
                "soc_initial_fraction must be in [0, 1]".into(),
            ));
        }

        Ok(Self {
            capacity_mwh: config.capacity_mwh,
            power_mw: config.power_mw,
            round_trip_efficiency: config.round_trip_efficiency,
            soc_mwh: config.soc_initial_fraction * config.capacity_mwh,
        })
    }

    pub fn capacity_mwh(&self) -> f64 {
        self.capacity_mwh
    }

    pub fn power_mw(&self) -> f64 {
        self.power_mw
    }

    pub fn round_trip_efficiency(&self) -> f64 {
        self.round_trip_efficiency
    }

    pub fn soc_mwh(&self) -> f64 {
        self.soc_mwh
    }

    /// Single-leg efficiency split: half the round-trip loss on each leg.
    /// The planner's cost-basis accounting uses the same split.
    pub fn discharge_efficiency(&self) -> f64 {
        self.round_trip_efficiency.sqrt()
    }

    /// Stored energy and remaining headroom, both in MWh.
    pub fn available_energy_mwh(&self) -> (f64, f64) {
        (self.soc_mwh, self.capacity_mwh - self.soc_mwh)
    }

    /// True if applying `delta` would push the SOC outside `[0, capacity]`.
    /// A small tolerance absorbs floating-point residue from release paths.
    pub fn delta_violates_bounds(&self, delta_mwh: f64) -> bool {
        const EPS: f64 = 1e-9;
        let next = self.soc_mwh + delta_mwh;
        next < -EPS || next > self.capacity_mwh + EPS
    }

    /// Applies a signed SOC delta. The caller must have checked bounds via
    /// `delta_violates_bounds` first.
    pub fn apply_soc_delta(&mut self, delta_mwh: f64) {
        debug_assert!(!self.delta_violates_bounds(delta_mwh));
        self.soc_mwh = (self.soc_mwh + delta_mwh).clamp(0.0, self.capacity_mwh);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BatteryConfig {
        BatteryConfig {
            capacity_mwh: 55.0,
            power_mw: 20.0,
            round_trip_efficiency: 0.9,
            soc_initial_fraction: 0.5,
        }
    }

    #[test]
    fn test_from_config_initial_soc() {
        let b = BatteryState::from_config(&config()).unwrap();
        assert!((b.soc_mwh() - 27.5).abs() < 1e-9);
        assert!((b.discharge_efficiency() - 0.9f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_from_config_rejects_bad_parameters() {
        let mut c = config();
        c.capacity_mwh = 0.0;
        assert!(BatteryState::from_config(&c).is_err());

        let mut c = config();
        c.round_trip_efficiency = 1.2;
        assert!(BatteryState::from_config(&c).is_err());

        let mut c = config();
        c.soc_initial_fraction = -0.1;
        assert!(BatteryState::from_config(&c).is_err());
    }

    #[test]
    fn test_bounds_check() {
        let b = BatteryState::from_config(&config()).unwrap();
        assert!(!b.delta_violates_bounds(27.5));
        assert!(b.delta_violates_bounds(27.6));
        assert!(!b.delta_violates_bounds(-27.5));
        assert!(b.delta_violates_bounds(-27.6));
    }
}
