//! 会话辅助：一次性提示消息（flash）与表单 CSRF 令牌

use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

const FLASH_KEY: &str = "_flashes";
const CSRF_KEY: &str = "_csrf_token";
const CSRF_TOKEN_LEN: usize = 32;

/// 提示类别，对应页面样式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Success,
    Error,
}

impl FlashCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashCategory::Success => "success",
            FlashCategory::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub category: FlashCategory,
    pub message: String,
}

/// 追加一条提示，下一个渲染的页面取出
pub async fn push_flash(
    session: &Session,
    category: FlashCategory,
    message: impl Into<String>,
) -> anyhow::Result<()> {
    let mut queue: Vec<FlashMessage> = session.get(FLASH_KEY).await?.unwrap_or_default();
    queue.push(FlashMessage {
        category,
        message: message.into(),
    });
    session.insert(FLASH_KEY, queue).await?;
    Ok(())
}

pub async fn flash_success(session: &Session, message: impl Into<String>) -> anyhow::Result<()> {
    push_flash(session, FlashCategory::Success, message).await
}

pub async fn flash_error(session: &Session, message: impl Into<String>) -> anyhow::Result<()> {
    push_flash(session, FlashCategory::Error, message).await
}

/// 取出并清空全部提示
pub async fn take_flashes(session: &Session) -> anyhow::Result<Vec<FlashMessage>> {
    Ok(session
        .remove::<Vec<FlashMessage>>(FLASH_KEY)
        .await?
        .unwrap_or_default())
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CSRF_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// 当前会话的 CSRF 令牌，不存在时生成
pub async fn csrf_token(session: &Session) -> anyhow::Result<String> {
    if let Some(token) = session.get::<String>(CSRF_KEY).await? {
        return Ok(token);
    }
    let token = generate_token();
    session.insert(CSRF_KEY, token.clone()).await?;
    Ok(token)
}

/// 校验表单提交的令牌；会话中没有令牌时一律拒绝
pub async fn verify_csrf(session: &Session, submitted: Option<&str>) -> anyhow::Result<bool> {
    let Some(expected) = session.get::<String>(CSRF_KEY).await? else {
        return Ok(false);
    };
    let Some(submitted) = submitted else {
        return Ok(false);
    };
    Ok(constant_time_eq(expected.as_bytes(), submitted.as_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// 渲染页面所需的会话数据
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub flashes: Vec<FlashMessage>,
    pub csrf_token: String,
}

impl PageContext {
    pub async fn load(session: &Session) -> anyhow::Result<Self> {
        Ok(Self {
            flashes: take_flashes(session).await?,
            csrf_token: csrf_token(session).await?,
        })
    }
}
