//! 桥接进程配置（TOML）

use fleet_sdk::client::ConfigError;
use fleet_sdk::protocol::validate_battery_percent;
use fleet_sdk::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 位姿采样配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseSection {
    /// 机器人坐标系
    pub robot_frame: String,
    /// 地图坐标系（同时作为快照中的地图名）
    pub map_frame: String,
    pub interval_ms: u64,
}

impl Default for PoseSection {
    fn default() -> Self {
        Self {
            robot_frame: "base_footprint".to_string(),
            map_frame: "map".to_string(),
            interval_ms: 500,
        }
    }
}

/// 电量采样配置（模拟电池）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatterySection {
    pub interval_ms: u64,
    /// 初始电量
    pub initial_percent: f64,
    /// 每次采样的放电量
    pub drain_per_sample: f64,
}

impl Default for BatterySection {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            initial_percent: 1.0,
            drain_per_sample: 0.001,
        }
    }
}

/// 桥接进程配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub client: ClientConfig,
    pub pose: PoseSection,
    pub battery: BatterySection,
}

impl BridgeConfig {
    /// 从文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.client.validate()?;
        if self.pose.robot_frame.trim().is_empty() {
            return Err(ConfigError::EmptyFrame {
                field: "pose.robot_frame",
            });
        }
        if self.pose.map_frame.trim().is_empty() {
            return Err(ConfigError::EmptyFrame {
                field: "pose.map_frame",
            });
        }
        if self.pose.interval_ms == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "pose.interval_ms",
            });
        }
        if self.battery.interval_ms == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "battery.interval_ms",
            });
        }
        if validate_battery_percent(self.battery.initial_percent).is_err() {
            return Err(ConfigError::OutOfRange {
                field: "battery.initial_percent",
                value: self.battery.initial_percent,
            });
        }
        if !(0.0..=1.0).contains(&self.battery.drain_per_sample) {
            return Err(ConfigError::OutOfRange {
                field: "battery.drain_per_sample",
                value: self.battery.drain_per_sample,
            });
        }
        Ok(())
    }

    pub fn pose_interval(&self) -> Duration {
        Duration::from_millis(self.pose.interval_ms)
    }

    pub fn battery_interval(&self) -> Duration {
        Duration::from_millis(self.battery.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [client]
        robot_name = "tinyRobot1"
        publish_interval_ms = 250

        [pose]
        robot_frame = "base_link"
        map_frame = "L1"
        interval_ms = 100

        [battery]
        interval_ms = 2000
        initial_percent = 0.8
    "#;

    #[test]
    fn test_parse_sample() {
        let config = BridgeConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.client.robot_name, "tinyRobot1");
        assert_eq!(config.client.publish_interval_ms, 250);
        assert_eq!(config.client.resolved_state_topic(), "fleet/tinyRobot1/state");
        assert_eq!(config.pose.map_frame, "L1");
        assert_eq!(config.pose_interval(), Duration::from_millis(100));
        assert_eq!(config.battery_interval(), Duration::from_secs(2));
        assert_eq!(config.battery.initial_percent, 0.8);
        // 未给出的字段取默认值
        assert_eq!(config.battery.drain_per_sample, 0.001);
    }

    #[test]
    fn test_missing_robot_name() {
        let err = BridgeConfig::from_toml_str("[pose]\nmap_frame = \"L1\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyRobotName));
    }

    #[test]
    fn test_invalid_values() {
        let err = BridgeConfig::from_toml_str(
            "[client]\nrobot_name = \"r1\"\n[pose]\nmap_frame = \"\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyFrame { field: "pose.map_frame" }));

        let err = BridgeConfig::from_toml_str(
            "[client]\nrobot_name = \"r1\"\n[battery]\ninitial_percent = 1.5\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                field: "battery.initial_percent",
                ..
            }
        ));

        let err = BridgeConfig::from_toml_str(
            "[client]\nrobot_name = \"r1\"\n[pose]\ninterval_ms = 0\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroInterval { field: "pose.interval_ms" }));
    }

    #[test]
    fn test_parse_error() {
        let err = BridgeConfig::from_toml_str("[client\nrobot_name = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.pose.robot_frame, "base_link");

        let err = BridgeConfig::load("/nonexistent/fleet-bridge.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/bridge.toml");
        let config = BridgeConfig::load(path).unwrap();
        assert_eq!(config.client.robot_name, "tinyRobot1");
        assert_eq!(config.pose.map_frame, "L1");
    }
}
