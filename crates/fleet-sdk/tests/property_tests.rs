//! 属性测试
//!
//! 1. 任务历史永远不超过上限、不含重复、保留插入顺序
//! 2. 合法电量读数总能写入，非法读数总被拒绝且不改变旧值
//! 3. run_once 调用 N 次恰好产生 N 次发布

use fleet_sdk::client::RecordingReporter;
use fleet_sdk::prelude::*;
use fleet_sdk::protocol::{TASK_HISTORY_LIMIT, decode_state};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn manual_battery() -> BatteryLevelProvider {
    BatteryLevelProvider::from_fn(|| Err(SampleError::TelemetryUnavailable("push only".into())))
        .with_reporter(Arc::new(RecordingReporter::new()))
}

proptest! {
    #[test]
    fn prop_task_history_bounded_and_unique(ids in prop::collection::vec(0u8..30, 0..60)) {
        let tasks = TaskTracker::new();
        for id in &ids {
            tasks.begin_task(format!("t-{}", id));
        }

        let history = tasks.history();
        prop_assert!(history.len() <= TASK_HISTORY_LIMIT);
        let unique: HashSet<&str> = history.iter().collect();
        prop_assert_eq!(unique.len(), history.len());

        // 最近一次开始的任务总在历史中
        if let Some(last) = ids.last() {
            let last_id = format!("t-{}", last);
            prop_assert!(history.contains(&last_id));
        }
    }

    #[test]
    fn prop_battery_set_value(prior in 0.0f64..=1.0, reading in -2.0f64..3.0) {
        let battery = manual_battery();
        prop_assert!(battery.set_value(Some(prior)));

        let accepted = battery.set_value(Some(reading));
        prop_assert_eq!(accepted, (0.0..=1.0).contains(&reading));
        let expected = if accepted { reading } else { prior };
        prop_assert_eq!(battery.value(), Some(expected));

        prop_assert!(!battery.set_value(None));
        prop_assert_eq!(battery.value(), Some(expected));
    }

    #[test]
    fn prop_run_once_publishes_each_cycle(readings in prop::collection::vec(0.0f64..=1.0, 1..12)) {
        let transport = Arc::new(LoopbackTransport::inline());
        let client = FleetClient::builder("prop-bot")
            .transport(transport.clone())
            .reporter(Arc::new(RecordingReporter::new()))
            .build()
            .unwrap();
        let battery = Arc::new(manual_battery());
        client.register_provider(battery.clone()).unwrap();

        for reading in &readings {
            prop_assert!(battery.set_value(Some(*reading)));
            client.run_once().unwrap();
        }

        let published = transport.published(client.state_topic());
        prop_assert_eq!(published.len(), readings.len());
        for (payload, reading) in published.iter().zip(&readings) {
            let state = decode_state(payload).unwrap();
            prop_assert_eq!(state.battery_percent, Some(*reading));
        }
    }
}
