use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use testdispatch::dispatcher::deps::{d, feature, min_memory_mb};
use testdispatch::dispatcher::TestRegistration;
use testdispatch::worker::{BundleClient, CommandLauncher, HandshakeRequest};
use testdispatch::{plan_shard, DeviceDescriptor, DispatchConfig, DispatchError};
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

fn registry() -> Vec<TestRegistration> {
    vec![
        TestRegistration::new("example.Pass").with_attrs(["group:mainline"]),
        TestRegistration::new("example.NeedsArc")
            .with_attrs(["group:mainline"])
            .with_deps(d([feature("arc")])),
        TestRegistration::new("example.Flaky").with_attrs(["group:mainline", "informational"]),
        TestRegistration::new("power.Suspend").with_attrs(["group:mainline"]),
        TestRegistration::new("power.Resume")
            .with_attrs(["group:mainline"])
            .with_deps(d([min_memory_mb(2048)])),
        TestRegistration::new("ui.Login").with_attrs(["group:crosbolt"]),
    ]
}

fn device() -> DeviceDescriptor {
    DeviceDescriptor::new("eve")
        .with_memory_mb(4096)
        .with_features(["chrome"])
}

fn config_for(index: usize, total: usize) -> Result<DispatchConfig> {
    let config = DispatchConfig::from_toml_str(&format!(
        r#"
        [selection]
        patterns = ['("group:mainline" && !informational)']

        [shard]
        index = {index}
        total = {total}
        "#
    ))?;
    Ok(config)
}

#[test]
#[traced_test]
fn test_plan_shards_end_to_end() -> Result<()> {
    let tests = registry();
    let device = device();

    let shard0 = plan_shard(&config_for(0, 2)?, &tests, &device)?;
    let shard1 = plan_shard(&config_for(1, 2)?, &tests, &device)?;

    let names = |entities: &[testdispatch::ResolvedEntity]| -> Vec<String> {
        entities.iter().map(|e| e.name.clone()).collect()
    };

    // 选中4个，其中 example.NeedsArc 因缺少特性被跳过，剩余3个可运行
    assert_eq!(
        names(&shard0.included),
        vec!["example.Pass", "example.NeedsArc", "power.Suspend"]
    );
    assert_eq!(names(&shard1.included), vec!["power.Resume"]);
    assert_eq!(shard1.excluded.len(), 3);
    assert!(shard0.included[1].is_skipped());

    assert!(logs_contain("规划完成"));
    Ok(())
}

#[test]
fn test_plan_shard_rejects_invalid_config() {
    let mut config = DispatchConfig::default();
    config.shard.index = 3;
    config.shard.total = 3;
    let err = plan_shard(&config, &registry(), &device()).unwrap_err();
    assert!(matches!(err, DispatchError::Configuration(_)));

    let mut config = DispatchConfig::default();
    config.selection.patterns = vec!["(a b)".to_string()];
    let err = plan_shard(&config, &registry(), &device()).unwrap_err();
    assert!(matches!(err, DispatchError::InvalidSelection(_)));
}

#[cfg(unix)]
#[tokio::test]
async fn test_dispatch_shard_over_bundle() -> Result<()> {
    let shard = plan_shard(&config_for(0, 1)?, &registry(), &device())?;

    // 把每个请求原样回显的最小bundle
    let script = r#"
while read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/^{"id":\([0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"handshake"'*) printf '{"id":%s,"result":{"protocol_version":1,"bundle_name":"echo"}}\n' "$id" ;;
    *'"method":"close"'*) ;;
    *) printf '{"id":%s,"result":"ok"}\n' "$id" ;;
  esac
done
"#;
    let client = BundleClient::new(Arc::new(
        CommandLauncher::new("sh").with_args(["-c", script]),
    ))
    .with_handshake_timeout(Duration::from_secs(10));

    let session = client
        .dial(&CancellationToken::new(), &HandshakeRequest::default())
        .await?;
    for entity in shard.runnable() {
        let status: String = session
            .conn()
            .call("run_test", &serde_json::json!({"name": entity.name}))
            .await?;
        assert_eq!(status, "ok");
    }
    session.close().await?;
    Ok(())
}
