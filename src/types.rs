// src/types.rs
use crate::drivers::{ConnectionSnapshot, InboundMessage};

// GUI 发给后台的命令
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientCommand {
    Connect,
    Disconnect,
    Shutdown,
}

// 后台发给 GUI 的消息
#[derive(Clone, Debug)]
pub enum ClientEvent {
    Log(String),
    Connection(ConnectionSnapshot), // 连接状态
    Message(InboundMessage),        // 已解码的数据帧
    Clients(u32),                   // 设备上的客户端数
}
