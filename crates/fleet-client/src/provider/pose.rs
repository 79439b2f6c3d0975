//! 位姿提供者
//!
//! 周期性地向坐标变换查询协作方请求机器人坐标系相对地图坐标系的位姿，
//! 合并进快照的 `location` 字段（地图名取自地图坐标系）。

use super::{StateProvider, StateSlot};
use crate::SampleError;
use crate::reporter::{ErrorReporter, SharedReporter, default_reporter};
use fleet_protocol::{Location2D, RobotState};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// 位姿提供者的名称
pub const POSE_PROVIDER_NAME: &str = "pose";

/// 默认采样周期
const DEFAULT_POSE_INTERVAL: Duration = Duration::from_millis(500);

/// 平面位姿 (x, y, yaw)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    /// 航向角（弧度）
    pub yaw: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.yaw.is_finite()
    }

    /// 转换为地图坐标
    pub fn to_location(&self, map: &str) -> Location2D {
        Location2D::new(map, self.x, self.y).with_yaw(self.yaw)
    }
}

impl From<(f64, f64, f64)> for Pose2D {
    fn from((x, y, yaw): (f64, f64, f64)) -> Self {
        Self { x, y, yaw }
    }
}

/// 坐标变换查询协作方
///
/// 查询 `source_frame` 相对 `target_frame` 在 `time` 时刻的位姿。
pub trait TransformLookup: Send + Sync {
    fn lookup(
        &self,
        source_frame: &str,
        target_frame: &str,
        time: SystemTime,
    ) -> Result<Pose2D, SampleError>;
}

impl<F> TransformLookup for F
where
    F: Fn(&str, &str, SystemTime) -> Result<Pose2D, SampleError> + Send + Sync,
{
    fn lookup(
        &self,
        source_frame: &str,
        target_frame: &str,
        time: SystemTime,
    ) -> Result<Pose2D, SampleError> {
        self(source_frame, target_frame, time)
    }
}

/// 位姿提供者
///
/// # 示例
///
/// ```rust
/// use fleet_client::{Pose2D, PoseProvider, StateProvider};
///
/// let provider = PoseProvider::from_fn(
///     |_source, _target, _time| Ok(Pose2D::new(1.0, 2.0, 0.5)),
///     "base_link",
///     "L1",
/// );
/// assert!(provider.sample());
/// assert_eq!(provider.value(), Some(Pose2D::new(1.0, 2.0, 0.5)));
/// ```
pub struct PoseProvider {
    robot_frame: String,
    map_frame: String,
    interval: Duration,
    lookup: Arc<dyn TransformLookup>,
    reporter: SharedReporter,
    slot: StateSlot<Pose2D>,
}

impl PoseProvider {
    /// 创建位姿提供者（默认周期 500ms，上报到 tracing）
    pub fn new(
        lookup: Arc<dyn TransformLookup>,
        robot_frame: impl Into<String>,
        map_frame: impl Into<String>,
    ) -> Self {
        Self {
            robot_frame: robot_frame.into(),
            map_frame: map_frame.into(),
            interval: DEFAULT_POSE_INTERVAL,
            lookup,
            reporter: default_reporter(),
            slot: StateSlot::empty(),
        }
    }

    /// 用闭包作为查询协作方创建位姿提供者
    pub fn from_fn<F>(lookup: F, robot_frame: impl Into<String>, map_frame: impl Into<String>) -> Self
    where
        F: Fn(&str, &str, SystemTime) -> Result<Pose2D, SampleError> + Send + Sync + 'static,
    {
        Self::new(Arc::new(lookup), robot_frame, map_frame)
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_reporter(mut self, reporter: SharedReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn robot_frame(&self) -> &str {
        &self.robot_frame
    }

    pub fn map_frame(&self) -> &str {
        &self.map_frame
    }
}

impl StateProvider for PoseProvider {
    type Value = Pose2D;

    fn name(&self) -> &str {
        POSE_PROVIDER_NAME
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn slot(&self) -> &StateSlot<Pose2D> {
        &self.slot
    }

    fn reporter(&self) -> &dyn ErrorReporter {
        self.reporter.as_ref()
    }

    fn read(&self) -> Result<Pose2D, SampleError> {
        self.lookup
            .lookup(&self.robot_frame, &self.map_frame, SystemTime::now())
    }

    fn accepts(&self, value: &Pose2D) -> Result<(), SampleError> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(SampleError::Rejected {
                provider: POSE_PROVIDER_NAME.to_string(),
                reason: format!("non-finite pose {:?}", value),
            })
        }
    }

    fn merge_into(&self, value: &Pose2D, state: &mut RobotState) {
        state.location = Some(value.to_location(&self.map_frame));
    }
}
