//! 传输层核心定义
//!
//! 提供与具体后端无关的发布/订阅抽象：
//!
//! - [`Transport`]: 按主题发布字节负载、按主题订阅回调、一次性关闭
//! - [`SubscriptionRegistry`]: 实例级的 主题 → 订阅 映射（每个主题只保留最后一次注册）
//! - [`LoopbackTransport`]: 进程内回环后端，用于测试和离线运行
//!
//! 具体后端（MQTT、Zenoh 等）的连接建立和线编码不在本 crate 范围内，
//! 只需实现 [`Transport`] trait 即可接入客户端。

use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

pub mod loopback;
mod registry;

pub use loopback::{DEFAULT_RECORD_CAPACITY, DeliveryMode, LoopbackTransport, PublishedMessage};
pub use registry::{Subscription, SubscriptionId, SubscriptionRegistry};

/// 入站消息回调
///
/// 在传输层的投递路径上执行，与客户端的采样定时器相互独立。
/// 回调必须快速返回（入队或简单处理），不能长时间阻塞投递路径。
pub type MessageCallback = Arc<dyn Fn(Bytes) + Send + Sync>;

/// 传输层统一错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// 通道已关闭（致命，不会自行恢复）
    #[error("Transport closed")]
    Closed,

    /// 发送失败（非致命，是否重试由调用方决定）
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// 订阅失败
    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),

    /// 主题名称不合法（如空字符串）
    #[error("Invalid topic: {0:?}")]
    InvalidTopic(String),
}

impl TransportError {
    /// 判断是否为致命错误
    ///
    /// # 返回
    /// - `true`：通道已不可用
    /// - `false`：单次失败，可以重试
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}

/// 发布/订阅传输 Trait
///
/// 语义：
/// - `publish()`: 发送即返回，不做自动重试；`Err` 表示本次发送失败
/// - `subscribe()`: 每个主题同时只有一个有效订阅，重复订阅以最后一次为准，
///   旧回调不再被调用
/// - `close()`: 释放所有订阅和底层通道，只生效一次，之后再调用为空操作；
///   必须能在发布/投递进行中被调用，不得死锁
pub trait Transport: Send + Sync {
    /// 在主题上发布负载
    ///
    /// # 错误
    /// - `TransportError::Closed`: 通道已关闭
    /// - `TransportError::SendFailed`: 底层发送失败
    fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError>;

    /// 订阅主题
    ///
    /// # 错误
    /// - `TransportError::Closed`: 通道已关闭
    fn subscribe(&self, topic: &str, on_message: MessageCallback) -> Result<(), TransportError>;

    /// 关闭传输（幂等）
    fn close(&self);

    /// 是否已关闭
    fn is_closed(&self) -> bool;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        (**self).publish(topic, payload)
    }

    fn subscribe(&self, topic: &str, on_message: MessageCallback) -> Result<(), TransportError> {
        (**self).subscribe(topic, on_message)
    }

    fn close(&self) {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

/// 校验主题名称（非空）
pub(crate) fn check_topic(topic: &str) -> Result<(), TransportError> {
    if topic.is_empty() {
        Err(TransportError::InvalidTopic(topic.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_fatal() {
        assert!(TransportError::Closed.is_fatal());
        assert!(!TransportError::SendFailed("busy".into()).is_fatal());
        assert!(!TransportError::InvalidTopic(String::new()).is_fatal());
    }

    #[test]
    fn test_transport_error_display() {
        assert_eq!(format!("{}", TransportError::Closed), "Transport closed");
        assert_eq!(
            format!("{}", TransportError::SendFailed("timeout".into())),
            "Send failed: timeout"
        );
        assert_eq!(
            format!("{}", TransportError::InvalidTopic(String::new())),
            "Invalid topic: \"\""
        );
    }

    #[test]
    fn test_check_topic() {
        assert!(check_topic("fleet/r1/state").is_ok());
        assert_eq!(
            check_topic(""),
            Err(TransportError::InvalidTopic(String::new()))
        );
    }

    #[test]
    fn test_arc_transport_forwarding() {
        let transport: Arc<dyn Transport> = Arc::new(LoopbackTransport::inline());
        let shared = Arc::new(transport);
        assert!(!shared.is_closed());
        shared.publish("t", Bytes::from_static(b"x")).unwrap();
        shared.close();
        assert!(shared.is_closed());
        assert_eq!(
            shared.publish("t", Bytes::new()),
            Err(TransportError::Closed)
        );
    }
}
