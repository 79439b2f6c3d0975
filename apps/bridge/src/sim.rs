//! 模拟采集协作方
//!
//! 没有真实定位栈与电池遥测时，用确定性的模拟数据驱动桥接进程。

use fleet_sdk::client::{BatteryTelemetry, TransformLookup};
use fleet_sdk::{Pose2D, SampleError};
use parking_lot::Mutex;
use std::f64::consts::TAU;
use std::time::{Duration, Instant, SystemTime};

/// 沿圆周匀速运动的位姿源
pub struct SimulatedTransformSource {
    robot_frame: String,
    map_frame: String,
    radius: f64,
    period: Duration,
    started: Instant,
}

impl SimulatedTransformSource {
    pub fn new(robot_frame: impl Into<String>, map_frame: impl Into<String>) -> Self {
        Self {
            robot_frame: robot_frame.into(),
            map_frame: map_frame.into(),
            radius: 2.0,
            period: Duration::from_secs(60),
            started: Instant::now(),
        }
    }

    pub fn with_motion(mut self, radius: f64, period: Duration) -> Self {
        self.radius = radius;
        self.period = period;
        self
    }

    /// 运行 `elapsed` 后的位姿
    pub fn pose_at(&self, elapsed: Duration) -> Pose2D {
        let period = self.period.as_secs_f64().max(f64::EPSILON);
        let phase = (elapsed.as_secs_f64() / period).fract() * TAU;
        Pose2D::new(
            self.radius * phase.cos(),
            self.radius * phase.sin(),
            phase + TAU / 4.0,
        )
    }
}

impl TransformLookup for SimulatedTransformSource {
    fn lookup(
        &self,
        source_frame: &str,
        target_frame: &str,
        _time: SystemTime,
    ) -> Result<Pose2D, SampleError> {
        if source_frame != self.robot_frame || target_frame != self.map_frame {
            return Err(SampleError::TransformUnavailable {
                source_frame: source_frame.to_string(),
                target_frame: target_frame.to_string(),
                reason: "frame is not published by the simulator".to_string(),
            });
        }
        Ok(self.pose_at(self.started.elapsed()))
    }
}

/// 每次读取放电一次的模拟电池
pub struct SimulatedBattery {
    level: Mutex<f64>,
    drain_per_sample: f64,
}

impl SimulatedBattery {
    pub fn new(initial_percent: f64, drain_per_sample: f64) -> Self {
        Self {
            level: Mutex::new(initial_percent.clamp(0.0, 1.0)),
            drain_per_sample: drain_per_sample.max(0.0),
        }
    }

    pub fn level(&self) -> f64 {
        *self.level.lock()
    }

    /// 充满电
    pub fn recharge(&self) {
        *self.level.lock() = 1.0;
    }
}

impl BatteryTelemetry for SimulatedBattery {
    fn read_percent(&self) -> Result<f64, SampleError> {
        let mut level = self.level.lock();
        let current = *level;
        *level = (current - self.drain_per_sample).max(0.0);
        Ok(current)
    }
}
