//! 记忆层：运行期共享的上下文日志

pub mod conversation;

pub use conversation::{render_messages, Message, MessageLog, Role};
