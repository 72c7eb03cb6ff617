use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// 被测设备的软硬件快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// 设备型号，例如 `eve`
    pub model: String,
    /// 平台（板级）名称
    pub platform: String,
    /// CPU架构，例如 `x86_64`、`arm64`
    pub cpu_arch: String,
    /// 物理内存（MB）
    pub memory_mb: u64,
    /// 设备上可用的软件特性
    #[serde(default)]
    pub features: HashSet<String>,
}

impl DeviceDescriptor {
    pub fn new<S: Into<String>>(model: S) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_platform<S: Into<String>>(mut self, platform: S) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_cpu_arch<S: Into<String>>(mut self, arch: S) -> Self {
        self.cpu_arch = arch.into();
        self
    }

    pub fn with_memory_mb(mut self, memory_mb: u64) -> Self {
        self.memory_mb = memory_mb;
        self
    }

    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features.extend(features.into_iter().map(Into::into));
        self
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }
}
