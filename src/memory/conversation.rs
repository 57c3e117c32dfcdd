//! 上下文日志：运行期间只追加的消息序列
//!
//! 作为 Worker 与 Oracle 的共享上下文；每条消息可带发出者名称（哪个 Worker 产生的）。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// 发出者（Worker 名称）；用户与系统消息为 None
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: None,
        }
    }

    /// 标注发出者
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// 只追加的上下文日志；不提供删除或修改接口
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn extend(&mut self, msgs: impl IntoIterator<Item = Message>) {
        self.messages.extend(msgs);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// 渲染为纯文本（供 prompt 拼接），形如 `[worker] content`
pub fn render_messages(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| match (&m.name, &m.role) {
            (Some(name), _) => format!("[{}] {}", name, m.content),
            (None, Role::User) => format!("[user] {}", m.content),
            (None, Role::Assistant) => format!("[assistant] {}", m.content),
            (None, Role::System) => format!("[system] {}", m.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
