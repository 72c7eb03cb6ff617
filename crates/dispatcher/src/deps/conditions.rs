use testdispatch_core::DeviceDescriptor;

use super::{Condition, ConditionError};

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

fn is_valid_feature(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// 校验名称列表并复制一份，失败时返回构造错误
fn checked_names(kind: &'static str, names: &[&str]) -> Result<Vec<String>, ConditionError> {
    if names.is_empty() {
        return Err(ConditionError::EmptyList { kind });
    }
    names
        .iter()
        .map(|name| {
            if is_valid_name(name) {
                Ok(name.to_string())
            } else {
                Err(ConditionError::InvalidName {
                    kind,
                    name: name.to_string(),
                })
            }
        })
        .collect()
}

/// 按设备的某个字段做名单匹配；`allow` 为真时要求命中，否则要求不命中
fn name_list(
    kind: &'static str,
    label: &'static str,
    names: &[&str],
    allow: bool,
    field: fn(&DeviceDescriptor) -> &str,
) -> Condition {
    let names = match checked_names(kind, names) {
        Ok(names) => names,
        Err(err) => return Condition::invalid(err),
    };
    let description = format!("{kind}([{}])", names.join(", "));

    Condition::predicate(description, move |device| {
        let value = field(device);
        if value.is_empty() {
            return Err(format!("无法确定{label}"));
        }
        let listed = names.iter().any(|n| n == value);
        match (allow, listed) {
            (true, true) | (false, false) => Ok(()),
            (true, false) => Err(format!("{label} {value:?} 不在 [{}] 中", names.join(", "))),
            (false, true) => Err(format!("{label} {value:?} 在跳过列表中")),
        }
    })
}

/// 仅在列出的设备型号上运行
pub fn model(names: &[&str]) -> Condition {
    name_list("model", "设备型号", names, true, |d| d.model.as_str())
}

/// 在列出的设备型号上跳过
pub fn skip_on_model(names: &[&str]) -> Condition {
    name_list("skip_on_model", "设备型号", names, false, |d| d.model.as_str())
}

/// 仅在列出的平台上运行
pub fn platform(names: &[&str]) -> Condition {
    name_list("platform", "平台", names, true, |d| d.platform.as_str())
}

/// 在列出的平台上跳过
pub fn skip_on_platform(names: &[&str]) -> Condition {
    name_list("skip_on_platform", "平台", names, false, |d| d.platform.as_str())
}

/// 仅在列出的CPU架构上运行
pub fn cpu_arch(names: &[&str]) -> Condition {
    name_list("cpu_arch", "CPU架构", names, true, |d| d.cpu_arch.as_str())
}

/// 要求设备具备某个软件特性
pub fn feature(name: &str) -> Condition {
    if !is_valid_feature(name) {
        return Condition::invalid(ConditionError::InvalidName {
            kind: "feature",
            name: name.to_string(),
        });
    }
    let name = name.to_string();
    Condition::predicate(format!("feature({name})"), move |device| {
        if device.has_feature(&name) {
            Ok(())
        } else {
            Err(format!("缺少软件特性 {name:?}"))
        }
    })
}

/// 要求设备不具备某个软件特性
pub fn no_feature(name: &str) -> Condition {
    if !is_valid_feature(name) {
        return Condition::invalid(ConditionError::InvalidName {
            kind: "no_feature",
            name: name.to_string(),
        });
    }
    let name = name.to_string();
    Condition::predicate(format!("no_feature({name})"), move |device| {
        if device.has_feature(&name) {
            Err(format!("设备具有不支持的软件特性 {name:?}"))
        } else {
            Ok(())
        }
    })
}

/// 要求设备内存不低于 `min_mb`
pub fn min_memory_mb(min_mb: u64) -> Condition {
    if min_mb == 0 {
        return Condition::invalid(ConditionError::ZeroMemory);
    }
    Condition::predicate(format!("min_memory_mb({min_mb})"), move |device| {
        if device.memory_mb >= min_mb {
            Ok(())
        } else {
            Err(format!(
                "设备内存 {}MB 低于要求的 {min_mb}MB",
                device.memory_mb
            ))
        }
    })
}
