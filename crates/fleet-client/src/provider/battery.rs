//! 电量提供者
//!
//! 读数必须落在 [0.0, 1.0] 内；空值、NaN 和区间外的读数都会被拒绝，旧值保持不变。

use super::{StateProvider, StateSlot};
use crate::SampleError;
use crate::reporter::{ErrorReporter, SharedReporter, default_reporter};
use fleet_protocol::{RobotState, validate_battery_percent};
use std::sync::Arc;
use std::time::Duration;

/// 电量提供者的名称
pub const BATTERY_PROVIDER_NAME: &str = "battery";

const DEFAULT_BATTERY_INTERVAL: Duration = Duration::from_secs(1);

/// 电量遥测协作方
pub trait BatteryTelemetry: Send + Sync {
    /// 读取当前电量（0.0 - 1.0）
    fn read_percent(&self) -> Result<f64, SampleError>;
}

impl<F> BatteryTelemetry for F
where
    F: Fn() -> Result<f64, SampleError> + Send + Sync,
{
    fn read_percent(&self) -> Result<f64, SampleError> {
        self()
    }
}

/// 电量提供者
///
/// 既可以按周期向遥测协作方拉取（`sample()`），也可以由外部推送（`set_value()`）。
///
/// # 示例
///
/// ```rust
/// use fleet_client::{BatteryLevelProvider, StateProvider};
///
/// let battery = BatteryLevelProvider::from_fn(|| Ok(0.42));
/// assert!(battery.sample());
/// assert_eq!(battery.value(), Some(0.42));
///
/// assert!(!battery.set_value(Some(1.5)));
/// assert_eq!(battery.value(), Some(0.42));
/// ```
pub struct BatteryLevelProvider {
    interval: Duration,
    telemetry: Arc<dyn BatteryTelemetry>,
    reporter: SharedReporter,
    slot: StateSlot<f64>,
}

impl BatteryLevelProvider {
    /// 创建电量提供者（默认周期 1s，上报到 tracing）
    pub fn new(telemetry: Arc<dyn BatteryTelemetry>) -> Self {
        Self {
            interval: DEFAULT_BATTERY_INTERVAL,
            telemetry,
            reporter: default_reporter(),
            slot: StateSlot::empty(),
        }
    }

    /// 用闭包作为遥测协作方创建电量提供者
    pub fn from_fn<F>(read: F) -> Self
    where
        F: Fn() -> Result<f64, SampleError> + Send + Sync + 'static,
    {
        Self::new(Arc::new(read))
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_reporter(mut self, reporter: SharedReporter) -> Self {
        self.reporter = reporter;
        self
    }
}

impl StateProvider for BatteryLevelProvider {
    type Value = f64;

    fn name(&self) -> &str {
        BATTERY_PROVIDER_NAME
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn slot(&self) -> &StateSlot<f64> {
        &self.slot
    }

    fn reporter(&self) -> &dyn ErrorReporter {
        self.reporter.as_ref()
    }

    fn read(&self) -> Result<f64, SampleError> {
        self.telemetry.read_percent()
    }

    fn accepts(&self, value: &f64) -> Result<(), SampleError> {
        validate_battery_percent(*value).map_err(|e| SampleError::Rejected {
            provider: BATTERY_PROVIDER_NAME.to_string(),
            reason: e.to_string(),
        })
    }

    fn merge_into(&self, value: &f64, state: &mut RobotState) {
        state.battery_percent = Some(*value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::RecordingReporter;
    use parking_lot::Mutex;
    use proptest::prelude::*;

    fn manual() -> BatteryLevelProvider {
        BatteryLevelProvider::from_fn(|| Err(SampleError::TelemetryUnavailable("manual".into())))
            .with_reporter(Arc::new(RecordingReporter::new()))
    }

    #[test]
    fn test_rejects_none_and_nan() {
        let battery = manual();
        assert!(!battery.set_value(None));
        assert!(!battery.set_value(Some(f64::NAN)));
        assert!(battery.value().is_none());
    }

    #[test]
    fn test_bounds_inclusive() {
        let battery = manual();
        assert!(battery.set_value(Some(0.0)));
        assert!(battery.set_value(Some(1.0)));
        assert!(!battery.set_value(Some(1.0 + f64::EPSILON)));
        assert_eq!(battery.value(), Some(1.0));
    }

    #[test]
    fn test_sample_out_of_range_reported() {
        let reading = Arc::new(Mutex::new(0.5));
        let reading_clone = reading.clone();
        let reporter = Arc::new(RecordingReporter::new());
        let battery = BatteryLevelProvider::from_fn(move || Ok(*reading_clone.lock()))
            .with_reporter(reporter.clone());

        assert!(battery.sample());
        *reading.lock() = 1.2;
        assert!(!battery.sample());
        assert_eq!(battery.value(), Some(0.5));
        assert_eq!(reporter.count_for(BATTERY_PROVIDER_NAME), 1);
    }

    #[test]
    fn test_merge_into_state() {
        let battery = BatteryLevelProvider::from_fn(|| Ok(0.42));
        battery.sample();
        let mut state = RobotState::new("r1");
        battery.fill(&mut state);
        assert_eq!(state.battery_percent, Some(0.42));
    }

    proptest! {
        #[test]
        fn prop_valid_reading_round_trips(b in 0.0f64..=1.0) {
            let battery = manual();
            prop_assert!(battery.set_value(Some(b)));
            prop_assert_eq!(battery.value(), Some(b));
        }

        #[test]
        fn prop_invalid_reading_leaves_value(
            prior in 0.0f64..=1.0,
            bad in prop_oneof![-1.0e6f64..-1.0e-9, 1.0f64 + 1.0e-9..1.0e6],
        ) {
            let battery = manual();
            prop_assert!(battery.set_value(Some(prior)));
            prop_assert!(!battery.set_value(Some(bad)));
            prop_assert_eq!(battery.value(), Some(prior));
        }
    }
}
