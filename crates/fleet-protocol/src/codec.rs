//! JSON 编解码
//!
//! 编码方向（机器人 → 后端）先校验再序列化；解码方向（后端 → 机器人）先解析再校验。
//! 任一步失败都返回 [`ProtocolError`]，调用方据此丢弃消息并上报。

use crate::ProtocolError;
use crate::command::CommandMessage;
use crate::state::RobotState;

/// 编码状态快照
///
/// 不合法的快照（见 [`RobotState::validate`]）不会被序列化。
pub fn encode_state(state: &RobotState) -> Result<Vec<u8>, ProtocolError> {
    state.validate()?;
    Ok(serde_json::to_vec(state)?)
}

/// 解码状态快照（后端或测试使用）
pub fn decode_state(payload: &[u8]) -> Result<RobotState, ProtocolError> {
    let state: RobotState = serde_json::from_slice(payload)?;
    state.validate()?;
    Ok(state)
}

/// 编码命令（后端或测试使用）
pub fn encode_command(command: &CommandMessage) -> Result<Vec<u8>, ProtocolError> {
    command.validate()?;
    Ok(serde_json::to_vec(command)?)
}

/// 解码命令
///
/// 负载形状不匹配任何命令，或任务 ID 为空，都返回错误。
pub fn decode_command(payload: &[u8]) -> Result<CommandMessage, ProtocolError> {
    let command: CommandMessage = serde_json::from_slice(payload)?;
    command.validate()?;
    Ok(command)
}
