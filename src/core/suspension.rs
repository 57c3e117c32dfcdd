//! 挂起令牌
//!
//! 令牌携带所属运行 ID，恢复时据此定位检查点；每个令牌只能消费一次。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 关联一次挂起与其外部回答的不透明标识
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuspensionToken {
    run_id: String,
    id: Uuid,
}

impl SuspensionToken {
    pub(crate) fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

/// 文本形式 `<run_id>/<uuid>`，便于 CLI 或 HTTP 回传
impl fmt::Display for SuspensionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.run_id, self.id)
    }
}

impl FromStr for SuspensionToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (run_id, id) = s
            .trim()
            .rsplit_once('/')
            .ok_or_else(|| format!("malformed suspension token: {s}"))?;
        if run_id.is_empty() {
            return Err(format!("malformed suspension token: {s}"));
        }
        let id = Uuid::parse_str(id).map_err(|e| format!("malformed suspension token: {e}"))?;
        Ok(Self {
            run_id: run_id.to_string(),
            id,
        })
    }
}

/// 当前步骤的挂起记录：令牌与抛给外部的问题
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSuspension {
    pub token: SuspensionToken,
    pub question: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_text_form_parses_back() {
        let token = SuspensionToken::new("run_abc");
        let parsed: SuspensionToken = token.to_string().parse().unwrap();
        assert_eq!(parsed, token);
        assert_eq!(parsed.run_id(), "run_abc");
    }

    #[test]
    fn test_tokens_are_unique_per_suspension() {
        assert_ne!(SuspensionToken::new("r"), SuspensionToken::new("r"));
        assert!("no-separator".parse::<SuspensionToken>().is_err());
        assert!("/not-a-uuid".parse::<SuspensionToken>().is_err());
    }
}
