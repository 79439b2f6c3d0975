//! 地图坐标定义

use crate::ProtocolError;
use serde::{Deserialize, Serialize};

/// 地图上的二维位置
///
/// - `map`: 地图标识（不能为空）
/// - `x`, `y`: 地图坐标系下的位置（米）
/// - `yaw`: 朝向（弧度，可选）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location2D {
    pub map: String,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaw: Option<f64>,
}

impl Location2D {
    /// 创建位置（不带朝向）
    pub fn new(map: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            map: map.into(),
            x,
            y,
            yaw: None,
        }
    }

    /// 设置朝向
    pub fn with_yaw(mut self, yaw: f64) -> Self {
        self.yaw = Some(yaw);
        self
    }

    /// 校验位置
    ///
    /// 地图名不能为空，坐标必须为有限值。
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.map.is_empty() {
            return Err(ProtocolError::EmptyMapName);
        }
        if !self.x.is_finite() {
            return Err(ProtocolError::NonFiniteCoordinate { field: "x" });
        }
        if !self.y.is_finite() {
            return Err(ProtocolError::NonFiniteCoordinate { field: "y" });
        }
        if let Some(yaw) = self.yaw
            && !yaw.is_finite()
        {
            return Err(ProtocolError::NonFiniteCoordinate { field: "yaw" });
        }
        Ok(())
    }
}

/// 路径点
///
/// `index` 定义路径内的遍历顺序。单调性不在此处校验，由执行路径的一方负责。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint2D {
    pub index: u32,
    pub location: Location2D,
    /// 到达后等待到的时间点（Unix 纪元秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_until: Option<u64>,
}

impl Waypoint2D {
    pub fn new(index: u32, location: Location2D) -> Self {
        Self {
            index,
            location,
            wait_until: None,
        }
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        self.location.validate()
    }
}
