//! 命令分发
//!
//! 按命令类别（[`CommandKind`]）查找处理函数。每个类别最多一个处理函数，
//! 重复注册以最后一次为准。
//!
//! 处理函数在传输层的投递路径上执行，必须快速返回（入队或简单处理）。

use fleet_protocol::{
    ActionRequest, CommandKind, CommandMessage, NavigationRequest, RelocalizeRequest,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// 命令处理函数
pub type CommandHandler = Arc<dyn Fn(&CommandMessage) + Send + Sync>;

/// 一条命令的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// 已交给处理函数
    Dispatched(CommandKind),
    /// 合法，但该类别没有处理函数
    Unhandled(CommandKind),
    /// 格式错误或任务 ID 为空，已丢弃
    Rejected,
}

/// 分发表
#[derive(Default)]
pub struct CommandDispatcher {
    handlers: RwLock<HashMap<CommandKind, CommandHandler>>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册处理函数，返回被替换的旧处理函数
    pub fn register(&self, kind: CommandKind, handler: CommandHandler) -> Option<CommandHandler> {
        self.handlers.write().insert(kind, handler)
    }

    /// 移除处理函数
    pub fn unregister(&self, kind: CommandKind) -> Option<CommandHandler> {
        self.handlers.write().remove(&kind)
    }

    pub fn has_handler(&self, kind: CommandKind) -> bool {
        self.handlers.read().contains_key(&kind)
    }

    /// 分发一条已校验的命令
    ///
    /// 处理函数在锁外调用，处理函数内部可以再次注册/移除。
    pub fn dispatch(&self, command: &CommandMessage) -> CommandOutcome {
        let kind = command.kind();
        let handler = self.handlers.read().get(&kind).cloned();
        match handler {
            Some(handler) => {
                handler(command);
                CommandOutcome::Dispatched(kind)
            },
            None => CommandOutcome::Unhandled(kind),
        }
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<CommandKind> = self.handlers.read().keys().copied().collect();
        kinds.sort();
        f.debug_struct("CommandDispatcher").field("kinds", &kinds).finish()
    }
}

/// 暂停处理函数：收到任务 ID
pub fn pause_handler<F>(f: F) -> CommandHandler
where
    F: Fn(&str) + Send + Sync + 'static,
{
    Arc::new(move |command: &CommandMessage| {
        if let CommandMessage::PauseRequest(request) = command {
            f(&request.task_id);
        }
    })
}

/// 恢复处理函数：收到任务 ID
pub fn resume_handler<F>(f: F) -> CommandHandler
where
    F: Fn(&str) + Send + Sync + 'static,
{
    Arc::new(move |command: &CommandMessage| {
        if let CommandMessage::ResumeRequest(request) = command {
            f(&request.task_id);
        }
    })
}

pub fn navigation_handler<F>(f: F) -> CommandHandler
where
    F: Fn(&NavigationRequest) + Send + Sync + 'static,
{
    Arc::new(move |command: &CommandMessage| {
        if let CommandMessage::NavigationRequest(request) = command {
            f(request);
        }
    })
}

pub fn relocalize_handler<F>(f: F) -> CommandHandler
where
    F: Fn(&RelocalizeRequest) + Send + Sync + 'static,
{
    Arc::new(move |command: &CommandMessage| {
        if let CommandMessage::RelocalizeRequest(request) = command {
            f(request);
        }
    })
}

/// 动作处理函数：收到完整请求（任务 ID、动作名、参数）
pub fn action_handler<F>(f: F) -> CommandHandler
where
    F: Fn(&ActionRequest) + Send + Sync + 'static,
{
    Arc::new(move |command: &CommandMessage| {
        if let CommandMessage::ActionRequest(request) = command {
            f(request);
        }
    })
}
