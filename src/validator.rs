use thiserror::Error;

use crate::model::GuestRecord;

/// 门锁服务返回的失败原因。
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("lock service unreachable: {0}")]
    Network(String),
    #[error("reservation not authorized: {0}")]
    Unauthorized(String),
    #[error("lock did not open: {0}")]
    Actuation(String),
}

/// 外部门锁服务：确认预订并开锁。
///
/// 成功时返回展示给用户的提示文本。重试、超时与鉴权策略由实现方决定。
pub trait LockValidator: Send + Sync {
    fn validate(&self, record: &GuestRecord) -> Result<String, ValidationError>;
}

impl<F> LockValidator for F
where
    F: Fn(&GuestRecord) -> Result<String, ValidationError> + Send + Sync,
{
    fn validate(&self, record: &GuestRecord) -> Result<String, ValidationError> {
        self(record)
    }
}
