// src/drivers/mod.rs
// 声明同级目录下的子模块文件
pub mod buffer;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod plot;
pub mod protocol;
pub mod session;
pub mod signal;
pub mod status;
pub mod view;
// 公开导出这些模块里的结构体，方便外部调用
pub use buffer::ExportRecord;
pub use connection::{ConnectionSnapshot, ConnectionState, ConnectionTimings, LinkStatus};
pub use dispatcher::StreamDispatcher;
pub use error::ScopeError;
pub use plot::{RenderTick, ScopeFrame, ScopeRenderer, ScopeStyle};
pub use protocol::InboundMessage;
pub use session::run_session;
pub use signal::metric_fields;
pub use status::poll_clients;
pub use view::ViewParameters;
