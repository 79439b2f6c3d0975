//! 进程内回环传输
//!
//! 不连接任何后端：发布的消息被记录下来，并投递给同一主题上的当前订阅者；
//! [`LoopbackTransport::inject`] 用于模拟后端下发的消息。
//!
//! # 投递模式
//!
//! - [`DeliveryMode::Threaded`]: 独立投递线程（crossbeam 通道驱动），
//!   与调用方的定时器互不同步，对应真实后端的异步投递路径
//! - [`DeliveryMode::Inline`]: 在调用方线程上同步执行回调，用于确定性测试
//!
//! # 发布记录
//!
//! 记录只保留最近的 [`DEFAULT_RECORD_CAPACITY`] 条（可用
//! [`LoopbackTransport::with_record_capacity`] 调整，0 表示不记录），超出时淘汰最旧的一条。
//!
//! # 示例
//!
//! ```rust
//! use bytes::Bytes;
//! use fleet_transport::{LoopbackTransport, Transport};
//! use std::sync::Arc;
//!
//! let transport = LoopbackTransport::inline();
//! transport
//!     .subscribe("fleet/r1/command", Arc::new(|payload: Bytes| {
//!         assert_eq!(&payload[..], b"hello");
//!     }))
//!     .unwrap();
//! transport.inject("fleet/r1/command", Bytes::from_static(b"hello")).unwrap();
//! transport.close();
//! ```

use crate::{MessageCallback, SubscriptionRegistry, Transport, TransportError, check_topic};
use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::{JoinHandle, ThreadId};
use std::time::Instant;
use tracing::{debug, trace, warn};

/// 默认保留的发布记录条数
pub const DEFAULT_RECORD_CAPACITY: usize = 1024;

/// 投递模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// 在调用方线程同步投递
    Inline,
    /// 在独立投递线程异步投递
    Threaded,
}

/// 已发布的消息记录
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Bytes,
    pub published_at: Instant,
}

/// 投递队列中的条目
struct Delivery {
    topic: String,
    payload: Bytes,
}

struct Shared {
    closed: AtomicBool,
    registry: SubscriptionRegistry,
    published: Mutex<VecDeque<PublishedMessage>>,
    record_capacity: AtomicUsize,
    /// 累计发布次数（不受记录容量影响）
    total_published: AtomicU64,
    /// 待注入的发布失败次数（用于模拟链路抖动）
    pending_failures: AtomicUsize,
}

impl Shared {
    fn record(&self, message: PublishedMessage) {
        let capacity = self.record_capacity.load(Ordering::Relaxed);
        if capacity == 0 {
            return;
        }
        let mut published = self.published.lock();
        while published.len() >= capacity {
            published.pop_front();
        }
        published.push_back(message);
    }

    fn trim_records(&self, capacity: usize) {
        let mut published = self.published.lock();
        while published.len() > capacity {
            published.pop_front();
        }
    }

    fn dispatch(&self, delivery: Delivery) {
        match self.registry.callback(&delivery.topic) {
            Some(callback) => callback(delivery.payload),
            None => trace!(topic = %delivery.topic, "No subscriber, message dropped"),
        }
    }
}

/// 进程内回环传输
pub struct LoopbackTransport {
    shared: Arc<Shared>,
    mode: DeliveryMode,
    /// 投递队列发送端（Threaded 模式；关闭后为 None）
    queue_tx: Mutex<Option<Sender<Delivery>>>,
    /// 投递线程句柄（关闭时 join）
    delivery_thread: Mutex<Option<JoinHandle<()>>>,
    delivery_thread_id: Option<ThreadId>,
}

impl LoopbackTransport {
    /// 创建同步投递的回环传输
    pub fn inline() -> Self {
        Self::with_mode(DeliveryMode::Inline)
    }

    /// 创建带独立投递线程的回环传输
    pub fn threaded() -> Self {
        Self::with_mode(DeliveryMode::Threaded)
    }

    pub fn with_mode(mode: DeliveryMode) -> Self {
        let shared = Arc::new(Shared {
            closed: AtomicBool::new(false),
            registry: SubscriptionRegistry::new(),
            published: Mutex::new(VecDeque::new()),
            record_capacity: AtomicUsize::new(DEFAULT_RECORD_CAPACITY),
            total_published: AtomicU64::new(0),
            pending_failures: AtomicUsize::new(0),
        });

        let (queue_tx, delivery_thread, delivery_thread_id) = match mode {
            DeliveryMode::Inline => (None, None, None),
            DeliveryMode::Threaded => {
                let (tx, rx) = crossbeam_channel::unbounded();
                let shared_clone = shared.clone();
                let handle = std::thread::Builder::new()
                    .name("fleet-loopback-delivery".into())
                    .spawn(move || delivery_loop(shared_clone, rx));
                match handle {
                    Ok(handle) => {
                        let id = handle.thread().id();
                        (Some(tx), Some(handle), Some(id))
                    },
                    Err(e) => {
                        // 无法创建线程时退化为同步投递
                        warn!("Failed to spawn loopback delivery thread: {}, falling back to inline", e);
                        return Self {
                            shared,
                            mode: DeliveryMode::Inline,
                            queue_tx: Mutex::new(None),
                            delivery_thread: Mutex::new(None),
                            delivery_thread_id: None,
                        };
                    },
                }
            },
        };

        Self {
            shared,
            mode,
            queue_tx: Mutex::new(queue_tx),
            delivery_thread: Mutex::new(delivery_thread),
            delivery_thread_id,
        }
    }

    /// 当前投递模式
    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// 模拟后端下发一条消息（不计入发布记录）
    pub fn inject(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        check_topic(topic)?;
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.route(topic, payload)
    }

    /// 让接下来的 `count` 次发布失败（`TransportError::SendFailed`）
    pub fn fail_next_publishes(&self, count: usize) {
        self.shared.pending_failures.store(count, Ordering::Relaxed);
    }

    /// 取消订阅
    pub fn unsubscribe(&self, topic: &str) -> bool {
        self.shared.registry.remove(topic).is_some()
    }

    /// 当前已订阅的主题
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.shared.registry.topics()
    }

    /// 某主题上已发布的负载（按发布顺序）
    pub fn published(&self, topic: &str) -> Vec<Bytes> {
        self.shared
            .published
            .lock()
            .iter()
            .filter(|message| message.topic == topic)
            .map(|message| message.payload.clone())
            .collect()
    }

    /// 所有仍保留的发布记录
    pub fn published_messages(&self) -> Vec<PublishedMessage> {
        self.shared.published.lock().iter().cloned().collect()
    }

    /// 仍保留的发布记录条数
    pub fn published_count(&self) -> usize {
        self.shared.published.lock().len()
    }

    /// 累计成功发布的次数
    pub fn total_published(&self) -> u64 {
        self.shared.total_published.load(Ordering::Relaxed)
    }

    /// 设置发布记录容量（0 表示不记录）
    pub fn with_record_capacity(self, capacity: usize) -> Self {
        self.shared
            .record_capacity
            .store(capacity, Ordering::Relaxed);
        self.shared.trim_records(capacity);
        self
    }

    pub fn record_capacity(&self) -> usize {
        self.shared.record_capacity.load(Ordering::Relaxed)
    }

    fn route(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        let delivery = Delivery {
            topic: topic.to_string(),
            payload,
        };
        match self.mode {
            DeliveryMode::Inline => {
                self.shared.dispatch(delivery);
                Ok(())
            },
            DeliveryMode::Threaded => {
                let guard = self.queue_tx.lock();
                match guard.as_ref() {
                    Some(tx) => tx.send(delivery).map_err(|_| TransportError::Closed),
                    None => Err(TransportError::Closed),
                }
            },
        }
    }

    fn take_pending_failure(&self) -> bool {
        self.shared
            .pending_failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Transport for LoopbackTransport {
    fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        check_topic(topic)?;
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if self.take_pending_failure() {
            return Err(TransportError::SendFailed(
                "injected loopback failure".to_string(),
            ));
        }

        self.shared.total_published.fetch_add(1, Ordering::Relaxed);
        self.shared.record(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.clone(),
            published_at: Instant::now(),
        });
        self.route(topic, payload)
    }

    fn subscribe(&self, topic: &str, on_message: MessageCallback) -> Result<(), TransportError> {
        check_topic(topic)?;
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let (id, previous) = self.shared.registry.register(topic, on_message);
        if let Some(previous) = previous {
            debug!(topic, old_id = previous.id, new_id = id, "Subscription replaced");
        }
        Ok(())
    }

    fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let released = self.shared.registry.clear();
        // 丢弃发送端，投递线程在队列耗尽后退出
        drop(self.queue_tx.lock().take());

        if let Some(handle) = self.delivery_thread.lock().take() {
            // 在投递线程内部（回调中）关闭时不能 join 自己
            if Some(std::thread::current().id()) == self.delivery_thread_id {
                debug!("close() called from delivery thread, detaching");
            } else if handle.join().is_err() {
                warn!("Loopback delivery thread panicked");
            }
        }
        debug!(released, "Loopback transport closed");
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn delivery_loop(shared: Arc<Shared>, rx: Receiver<Delivery>) {
    for delivery in rx.iter() {
        if shared.closed.load(Ordering::Acquire) {
            // 关闭后注册表已清空，剩余消息直接丢弃
            continue;
        }
        shared.dispatch(delivery);
    }
    trace!("Loopback delivery loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counter_callback(count: Arc<AtomicUsize>) -> MessageCallback {
        Arc::new(move |_payload: Bytes| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_inline_publish_delivers_and_records() {
        let transport = LoopbackTransport::inline();
        let count = Arc::new(AtomicUsize::new(0));
        transport
            .subscribe("state", counter_callback(count.clone()))
            .unwrap();

        transport.publish("state", Bytes::from_static(b"a")).unwrap();
        transport.publish("other", Bytes::from_static(b"b")).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(transport.published("state"), vec![Bytes::from_static(b"a")]);
        assert_eq!(transport.published_count(), 2);
    }

    #[test]
    fn test_publish_log_is_bounded() {
        let transport = LoopbackTransport::threaded().with_record_capacity(8);
        for i in 0..5_000u32 {
            transport
                .publish("state", Bytes::from(i.to_string()))
                .unwrap();
        }

        assert_eq!(transport.published_count(), 8);
        assert_eq!(transport.total_published(), 5_000);
        // 保留的是最近的 8 条，顺序不变
        let expected: Vec<Bytes> = (4_992..5_000u32)
            .map(|i| Bytes::from(i.to_string()))
            .collect();
        assert_eq!(transport.published("state"), expected);
        transport.close();
    }

    #[test]
    fn test_default_capacity_and_disabled_recording() {
        let transport = LoopbackTransport::inline();
        assert_eq!(transport.record_capacity(), DEFAULT_RECORD_CAPACITY);
        for _ in 0..DEFAULT_RECORD_CAPACITY + 10 {
            transport.publish("state", Bytes::from_static(b"s")).unwrap();
        }
        assert_eq!(transport.published_count(), DEFAULT_RECORD_CAPACITY);

        let silent = LoopbackTransport::inline().with_record_capacity(0);
        silent.publish("state", Bytes::from_static(b"s")).unwrap();
        assert_eq!(silent.published_count(), 0);
        assert_eq!(silent.total_published(), 1);
    }

    #[test]
    fn test_inject_is_not_recorded() {
        let transport = LoopbackTransport::inline();
        let count = Arc::new(AtomicUsize::new(0));
        transport.subscribe("cmd", counter_callback(count.clone())).unwrap();

        transport.inject("cmd", Bytes::from_static(b"x")).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(transport.published_count(), 0);
    }

    #[test]
    fn test_second_subscribe_replaces_first() {
        let transport = LoopbackTransport::inline();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        transport.subscribe("cmd", counter_callback(first.clone())).unwrap();
        transport.subscribe("cmd", counter_callback(second.clone())).unwrap();
        transport.inject("cmd", Bytes::from_static(b"x")).unwrap();

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(transport.subscribed_topics(), vec!["cmd".to_string()]);
    }

    #[test]
    fn test_close_is_idempotent() {
        let transport = LoopbackTransport::threaded();
        transport.subscribe("cmd", Arc::new(|_: Bytes| {})).unwrap();
        transport.close();
        transport.close();

        assert!(transport.is_closed());
        assert!(transport.subscribed_topics().is_empty());
        assert_eq!(
            transport.publish("cmd", Bytes::new()),
            Err(TransportError::Closed)
        );
        assert_eq!(
            transport.subscribe("cmd", Arc::new(|_: Bytes| {})),
            Err(TransportError::Closed)
        );
        assert_eq!(
            transport.inject("cmd", Bytes::new()),
            Err(TransportError::Closed)
        );
    }

    #[test]
    fn test_threaded_delivery_runs_on_other_thread() {
        let transport = LoopbackTransport::threaded();
        assert_eq!(transport.mode(), DeliveryMode::Threaded);

        let (tx, rx) = bounded(4);
        transport
            .subscribe(
                "cmd",
                Arc::new(move |payload: Bytes| {
                    let _ = tx.try_send((std::thread::current().id(), payload));
                }),
            )
            .unwrap();

        transport.inject("cmd", Bytes::from_static(b"hello")).unwrap();
        let (thread_id, payload) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_ne!(thread_id, std::thread::current().id());
        assert_eq!(&payload[..], b"hello");
    }

    #[test]
    fn test_close_from_callback_does_not_deadlock() {
        let transport = Arc::new(LoopbackTransport::threaded());
        let (tx, rx) = bounded(1);
        let weak = Arc::downgrade(&transport);
        transport
            .subscribe(
                "cmd",
                Arc::new(move |_payload: Bytes| {
                    if let Some(t) = weak.upgrade() {
                        t.close();
                    }
                    let _ = tx.try_send(());
                }),
            )
            .unwrap();

        transport.inject("cmd", Bytes::new()).unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(transport.is_closed());
    }

    #[test]
    fn test_injected_publish_failures() {
        let transport = LoopbackTransport::inline();
        transport.fail_next_publishes(2);

        assert!(matches!(
            transport.publish("s", Bytes::new()),
            Err(TransportError::SendFailed(_))
        ));
        assert!(matches!(
            transport.publish("s", Bytes::new()),
            Err(TransportError::SendFailed(_))
        ));
        assert!(transport.publish("s", Bytes::new()).is_ok());
        assert_eq!(transport.published_count(), 1);
    }

    #[test]
    fn test_empty_topic_rejected() {
        let transport = LoopbackTransport::inline();
        assert!(matches!(
            transport.publish("", Bytes::new()),
            Err(TransportError::InvalidTopic(_))
        ));
        assert!(matches!(
            transport.subscribe("", Arc::new(|_: Bytes| {})),
            Err(TransportError::InvalidTopic(_))
        ));
    }

    #[test]
    fn test_concurrent_publish_and_close() {
        let transport = Arc::new(LoopbackTransport::threaded());
        let count = Arc::new(AtomicUsize::new(0));
        transport.subscribe("s", counter_callback(count.clone())).unwrap();

        let publishers: Vec<_> = (0..4)
            .map(|_| {
                let t = transport.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        // 关闭之后的发布应当干净地失败
                        match t.publish("s", Bytes::from_static(b"p")) {
                            Ok(()) | Err(TransportError::Closed) => {},
                            Err(e) => panic!("Unexpected error: {:?}", e),
                        }
                    }
                })
            })
            .collect();

        std::thread::sleep(Duration::from_millis(1));
        transport.close();
        for handle in publishers {
            handle.join().unwrap();
        }
        assert!(transport.is_closed());
    }
}
