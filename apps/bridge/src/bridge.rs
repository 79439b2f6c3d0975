//! 桥接进程装配
//!
//! 把客户端、回环传输和模拟协作方组装起来，并给每类命令挂上处理函数。

use crate::config::BridgeConfig;
use crate::sim::{SimulatedBattery, SimulatedTransformSource};
use bytes::Bytes;
use fleet_sdk::prelude::*;
use fleet_sdk::protocol::decode_state;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 触发模拟电池充电的动作名
pub const RECHARGE_ACTION: &str = "recharge";

/// 回环传输保留的发布记录条数
const PUBLISH_RECORD_CAPACITY: usize = 64;

pub struct Bridge {
    client: FleetClient,
    transport: Arc<LoopbackTransport>,
    battery: Arc<SimulatedBattery>,
    states_seen: Arc<AtomicU64>,
}

impl Bridge {
    pub fn new(config: &BridgeConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let transport =
            Arc::new(LoopbackTransport::threaded().with_record_capacity(PUBLISH_RECORD_CAPACITY));
        let client = ClientBuilder::from_config(config.client.clone())
            .transport(transport.clone())
            .build()?;

        let source = SimulatedTransformSource::new(&config.pose.robot_frame, &config.pose.map_frame);
        let pose = PoseProvider::new(
            Arc::new(source),
            &config.pose.robot_frame,
            &config.pose.map_frame,
        )
        .with_interval(config.pose_interval());
        client.register_provider(Arc::new(pose))?;

        let battery = Arc::new(SimulatedBattery::new(
            config.battery.initial_percent,
            config.battery.drain_per_sample,
        ));
        let battery_provider =
            BatteryLevelProvider::new(battery.clone()).with_interval(config.battery_interval());
        client.register_provider(Arc::new(battery_provider))?;

        let bridge = Self {
            client,
            transport,
            battery,
            states_seen: Arc::new(AtomicU64::new(0)),
        };
        bridge.install_handlers();
        bridge.watch_states()?;
        Ok(bridge)
    }

    fn install_handlers(&self) {
        let tasks = self.client.tasks().clone();
        self.client.on_pause(move |task_id| {
            info!(task_id, "Pause requested");
            tasks.set_status(RobotStatus::Idle);
        });

        let tasks = self.client.tasks().clone();
        self.client.on_resume(move |task_id| {
            info!(task_id, "Resume requested");
            tasks.set_status(RobotStatus::Working);
        });

        let tasks = self.client.tasks().clone();
        self.client.on_navigate(move |request| {
            info!(
                task_id = %request.task_id,
                waypoints = request.path.len(),
                "Navigation requested"
            );
            tasks.begin_task(request.task_id.clone());
            tasks.set_status(RobotStatus::Working);
        });

        self.client.on_relocalize(|request| match &request.location {
            Some(location) => info!(
                task_id = %request.task_id,
                x = location.x,
                y = location.y,
                map = %location.map,
                "Relocalization requested"
            ),
            None => info!(task_id = %request.task_id, "Relocalization requested without estimate"),
        });

        let tasks = self.client.tasks().clone();
        let battery = self.battery.clone();
        self.client.on_action(move |request| {
            info!(
                task_id = %request.task_id,
                action = %request.action_name,
                parameters = request.parameters.len(),
                "Action requested"
            );
            tasks.begin_task(request.task_id.clone());
            if request.action_name == RECHARGE_ACTION {
                battery.recharge();
                tasks.set_status(RobotStatus::Charging);
            }
        });
    }

    /// 订阅自身的状态主题，记录每一份发出去的快照
    fn watch_states(&self) -> Result<(), ClientError> {
        let states_seen = self.states_seen.clone();
        self.transport.subscribe(
            self.client.state_topic(),
            Arc::new(move |payload: Bytes| match decode_state(&payload) {
                Ok(state) => {
                    states_seen.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        status = ?state.status,
                        battery = ?state.battery_percent,
                        task = ?state.task_id,
                        "State published"
                    );
                },
                Err(e) => warn!("Published state does not decode: {}", e),
            }),
        )?;
        Ok(())
    }

    /// 同步执行 `cycles` 个周期，周期之间间隔 `interval`
    ///
    /// # 返回
    /// 成功发布的周期数
    pub fn run_cycles(&self, cycles: usize, interval: Duration) -> Result<usize, ClientError> {
        let mut published = 0;
        for cycle in 0..cycles {
            if cycle > 0 {
                thread::sleep(interval);
            }
            let report = self.client.run_once()?;
            if report.published() {
                published += 1;
            }
            debug!(
                cycle,
                samples_failed = report.samples_failed,
                "Cycle finished"
            );
        }
        Ok(published)
    }

    /// 启动后台循环
    pub fn start(&self) -> Result<RunHandle, ClientError> {
        self.client.run_async()
    }

    pub fn stop(&self) {
        self.client.stop();
    }

    pub fn client(&self) -> &FleetClient {
        &self.client
    }

    /// 模拟后端下发一条命令
    pub fn inject_command(&self, payload: impl Into<Bytes>) -> Result<(), TransportError> {
        self.transport
            .inject(self.client.command_topic(), payload.into())
    }

    /// 状态订阅收到的快照数量
    pub fn states_seen(&self) -> u64 {
        self.states_seen.load(Ordering::Relaxed)
    }

    pub fn battery_level(&self) -> f64 {
        self.battery.level()
    }

    /// 退出时打印的运行摘要
    pub fn summary_lines(&self) -> Vec<String> {
        let metrics = self.client.metrics().snapshot();
        vec![
            format!(
                "Published: {} ({} failed, success rate {:.1}%)",
                metrics.publish_ok,
                metrics.publish_failures,
                metrics.publish_success_rate()
            ),
            format!(
                "Samples: {} ok, {} failed",
                metrics.samples_ok, metrics.sample_failures
            ),
            format!("Commands received: {}", metrics.commands_received()),
            format!("States observed: {}", self.states_seen()),
            format!("Battery: {:.1}%", self.battery_level() * 100.0),
        ]
    }
}
