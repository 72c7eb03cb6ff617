use serde::{Deserialize, Serialize};

use super::ResolvedEntity;

/// 单个分片的计算结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    /// 本分片负责的实体（含分片0上报的预跳过实体）
    pub included: Vec<ResolvedEntity>,
    /// 不由本分片负责的实体
    pub excluded: Vec<ResolvedEntity>,
}

impl Shard {
    /// 本分片中需要真正下发执行的实体
    pub fn runnable(&self) -> impl Iterator<Item = &ResolvedEntity> {
        self.included.iter().filter(|e| !e.is_skipped())
    }
}

/// 分片方法
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardMethod {
    /// 按顺序切分为连续区间
    #[default]
    Alpha,
    /// 按测试名哈希取模
    Hash,
}

