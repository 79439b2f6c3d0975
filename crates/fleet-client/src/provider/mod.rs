//! 状态提供者框架
//!
//! 每个提供者拥有一个类型化的值槽（[`StateSlot`]），按自己的周期采样，
//! 在组装快照时把当前值合并进 [`RobotState`]。
//!
//! # 并发模型
//!
//! 值槽基于 `ArcSwapOption`：采样线程整体替换值，读取方拿到一个 `Arc` 快照，
//! 不会观察到写了一半的值，也不需要加锁。不同提供者之间不保证原子性，
//! 快照中的各字段可能来自略有不同的时刻。
//!
//! # 扩展
//!
//! 新的提供者只需实现 [`StateProvider`] 的必需方法（名称、周期、值槽、读数、合并），
//! `value()`/`set_value()`/`sample()` 由默认实现提供。

mod battery;
mod pose;

pub use battery::{BATTERY_PROVIDER_NAME, BatteryLevelProvider, BatteryTelemetry};
pub use pose::{POSE_PROVIDER_NAME, Pose2D, PoseProvider, TransformLookup};

use crate::SampleError;
use crate::reporter::ErrorReporter;
use arc_swap::ArcSwapOption;
use fleet_protocol::RobotState;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// 单写多读的值槽
pub struct StateSlot<T> {
    inner: ArcSwapOption<T>,
}

impl<T> StateSlot<T> {
    /// 创建空槽
    pub fn empty() -> Self {
        Self {
            inner: ArcSwapOption::empty(),
        }
    }

    /// 读取当前值（无锁）
    pub fn load(&self) -> Option<Arc<T>> {
        self.inner.load_full()
    }

    /// 整体替换为新值
    pub fn store(&self, value: T) {
        self.inner.store(Some(Arc::new(value)));
    }

    /// 清空并返回旧值
    pub fn take(&self) -> Option<Arc<T>> {
        self.inner.swap(None)
    }

    pub fn is_set(&self) -> bool {
        self.inner.load().is_some()
    }
}

impl<T> Default for StateSlot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: fmt::Debug> fmt::Debug for StateSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StateSlot").field(&self.load()).finish()
    }
}

/// 状态提供者 Trait
///
/// # 语义
///
/// - `value()`: 当前缓存值，首次成功采样前为 `None`
/// - `set_value()`: 拒绝 `None` 以及 [`accepts`](Self::accepts) 不接受的值，
///   拒绝时返回 `false`，旧值不变
/// - `sample()`: 读取一次协作方；成功时经 `set_value()` 写入新值，失败时保留旧值并上报，
///   不向调用方传播错误
pub trait StateProvider: Send + Sync + 'static {
    /// 值类型
    type Value: Clone + fmt::Debug + Send + Sync + 'static;

    /// 稳定的提供者名称（注册表的键）
    fn name(&self) -> &str;

    /// 采样周期
    fn interval(&self) -> Duration;

    /// 值槽
    fn slot(&self) -> &StateSlot<Self::Value>;

    /// 上报器
    fn reporter(&self) -> &dyn ErrorReporter;

    /// 向协作方读取一次
    ///
    /// # 错误
    /// 协作方无法给出读数时返回 [`SampleError`]
    fn read(&self) -> Result<Self::Value, SampleError>;

    /// 把值合并进快照
    fn merge_into(&self, value: &Self::Value, state: &mut RobotState);

    /// 值是否合法（默认全部接受）
    fn accepts(&self, value: &Self::Value) -> Result<(), SampleError> {
        let _ = value;
        Ok(())
    }

    fn value(&self) -> Option<Self::Value> {
        self.slot().load().map(|value| (*value).clone())
    }

    fn set_value(&self, value: Option<Self::Value>) -> bool {
        let Some(value) = value else {
            return false;
        };
        if self.accepts(&value).is_err() {
            return false;
        }
        self.slot().store(value);
        true
    }

    /// 采样一次
    ///
    /// # 返回
    /// 是否得到并写入了新值
    fn sample(&self) -> bool {
        let result = self.read().and_then(|value| {
            self.accepts(&value)?;
            if self.set_value(Some(value)) {
                Ok(())
            } else {
                Err(SampleError::Rejected {
                    provider: self.name().to_string(),
                    reason: "value was not stored".to_string(),
                })
            }
        });
        match result {
            Ok(()) => true,
            Err(e) => {
                self.reporter().report(self.name(), &e.to_string());
                false
            },
        }
    }

    /// 用当前值填充快照
    ///
    /// # 返回
    /// 是否有值被合并
    fn fill(&self, state: &mut RobotState) -> bool {
        match self.slot().load() {
            Some(value) => {
                self.merge_into(&value, state);
                true
            },
            None => false,
        }
    }
}

/// 类型擦除后的提供者（客户端内部注册表使用）
#[derive(Clone)]
pub(crate) struct ProviderEntry {
    pub name: String,
    pub interval: Duration,
    pub sample: Arc<dyn Fn() -> bool + Send + Sync>,
    pub fill: Arc<dyn Fn(&mut RobotState) -> bool + Send + Sync>,
}

impl ProviderEntry {
    pub fn new<P: StateProvider>(provider: Arc<P>) -> Self {
        let sampler = provider.clone();
        let filler = provider.clone();
        Self {
            name: provider.name().to_string(),
            interval: provider.interval(),
            sample: Arc::new(move || sampler.sample()),
            fill: Arc::new(move |state: &mut RobotState| filler.fill(state)),
        }
    }
}

impl fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
