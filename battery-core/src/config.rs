use serde::{Deserialize, Serialize};

fn default_soc_initial_fraction() -> f64 {
    0.5
}

fn default_cycle_target() -> f64 {
    1.0
}

fn default_soc_end_tolerance() -> f64 {
    0.5
}

/// Battery parameters, loaded once at startup and passed by value into the
/// reservation manager and the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatteryConfig {
    pub capacity_mwh: f64,
    pub power_mw: f64,
    pub round_trip_efficiency: f64,
    #[serde(default = "default_soc_initial_fraction")]
    pub soc_initial_fraction: f64,
}

/// Immutable risk limits. Never mutated after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    pub max_position_mwh: f64,
    pub max_order_mwh: f64,
    pub min_price_eur_mwh: f64,
    pub max_price_eur_mwh: f64,
    pub max_open_orders: usize,
}

/// Which reference the planner's minimum-spread gate is checked against.
/// The source material is ambiguous here, so it is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadReference {
    #[default]
    EffectiveCostBasis,
    LastBuyPrice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Target cycles per trading day. Capped at 2.0 (vendor warranty
    /// ceiling) regardless of the configured value.
    #[serde(default = "default_cycle_target")]
    pub cycle_target_per_day: f64,
    #[serde(default)]
    pub min_spread_eur_mwh: f64,
    #[serde(default)]
    pub spread_reference: SpreadReference,
    #[serde(default)]
    pub enforce_soc_end_equal_start: bool,
    #[serde(default = "default_soc_end_tolerance")]
    pub soc_end_tolerance_mwh: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub day_ahead_csv: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub battery: BatteryConfig,
    pub risk: RiskLimits,
    pub planner: PlannerConfig,
    pub data: DataConfig,
}
