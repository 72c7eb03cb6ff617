use serde::{Deserialize, Serialize};

/// 已解析的测试实体
///
/// `skip_reasons` 非空即表示该实体在分片之前就已确定跳过。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_reasons: Vec<String>,
}

impl ResolvedEntity {
    /// 创建可运行的实体
    pub fn runnable<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            skip_reasons: Vec::new(),
        }
    }

    /// 创建带跳过原因的实体
    pub fn skipped<S, I, R>(name: S, reasons: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            name: name.into(),
            skip_reasons: reasons.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        !self.skip_reasons.is_empty()
    }
}
