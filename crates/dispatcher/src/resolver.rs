use std::collections::HashSet;

use testdispatch_core::{DeviceDescriptor, DispatchError, DispatchResult, ResolvedEntity};
use tracing::{debug, info};

use crate::deps::Deps;
use crate::selection::Selector;

/// 注册时声明的测试
#[derive(Debug, Clone)]
pub struct TestRegistration {
    pub name: String,
    pub attrs: HashSet<String>,
    pub deps: Deps,
}

impl TestRegistration {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            attrs: HashSet::new(),
            deps: Deps::default(),
        }
    }

    pub fn with_attrs<I, A>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.attrs.extend(attrs.into_iter().map(Into::into));
        self
    }

    pub fn with_deps(mut self, deps: Deps) -> Self {
        self.deps = deps;
        self
    }
}

fn validate_one(test: &TestRegistration) -> DispatchResult<()> {
    test.deps
        .validate()
        .map_err(|e| DispatchError::invalid_dependency(&test.name, e.to_string()))
}

/// 依次检查每个测试的依赖声明，返回第一个不合法的
pub fn validate_registrations(tests: &[TestRegistration]) -> DispatchResult<()> {
    tests.iter().try_for_each(validate_one)
}

/// 按选择器筛选测试，并在给定设备上判定依赖
///
/// 依赖不满足的测试会带着全部原因被标记为跳过，而不是被丢弃。
/// 任一被选中测试的依赖声明不合法时整体失败。
pub fn resolve(
    tests: &[TestRegistration],
    selector: &Selector,
    device: &DeviceDescriptor,
) -> DispatchResult<Vec<ResolvedEntity>> {
    let selected: Vec<&TestRegistration> = tests
        .iter()
        .filter(|t| selector.selects(&t.name, &t.attrs))
        .collect();

    selected.iter().try_for_each(|test| validate_one(test))?;

    let resolved: Vec<ResolvedEntity> = selected
        .into_iter()
        .map(|test| match test.deps.satisfied(device) {
            Ok(()) => ResolvedEntity::runnable(&test.name),
            Err(unsatisfied) => {
                debug!("跳过测试 {}: {:?}", test.name, unsatisfied.reasons);
                ResolvedEntity::skipped(&test.name, unsatisfied.reasons)
            }
        })
        .collect();

    info!(
        "已解析 {} 个测试（共注册 {} 个），其中 {} 个将被跳过",
        resolved.len(),
        tests.len(),
        resolved.iter().filter(|e| e.is_skipped()).count()
    );

    Ok(resolved)
}
