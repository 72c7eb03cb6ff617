use std::ops::Range;

use testdispatch_core::{ResolvedEntity, Shard, ShardMethod};
use tracing::debug;

/// 按默认的连续区间方法计算某个分片
///
/// 调用方保证 `total_shards >= 1` 且 `shard_index < total_shards`。
pub fn compute(entities: &[ResolvedEntity], shard_index: usize, total_shards: usize) -> Shard {
    compute_with(ShardMethod::Alpha, entities, shard_index, total_shards)
}

/// 按指定方法计算某个分片
///
/// 预跳过的实体全部归分片0上报；可运行实体按方法分配到恰好一个分片。
/// `included` 与 `excluded` 都保持输入顺序，二者互为补集。
pub fn compute_with(
    method: ShardMethod,
    entities: &[ResolvedEntity],
    shard_index: usize,
    total_shards: usize,
) -> Shard {
    debug_assert!(total_shards >= 1, "total_shards must be positive");
    debug_assert!(shard_index < total_shards, "shard_index out of range");

    let runnable_count = entities.iter().filter(|e| !e.is_skipped()).count();
    let range = shard_range(runnable_count, shard_index, total_shards);

    let mut shard = Shard::default();
    let mut runnable_pos = 0;
    for entity in entities {
        let owned = if entity.is_skipped() {
            shard_index == 0
        } else {
            let owned = match method {
                ShardMethod::Alpha => range.contains(&runnable_pos),
                ShardMethod::Hash => hash_shard(&entity.name, total_shards) == shard_index,
            };
            runnable_pos += 1;
            owned
        };

        if owned {
            shard.included.push(entity.clone());
        } else {
            shard.excluded.push(entity.clone());
        }
    }

    debug!(
        "分片 {}/{} ({:?}): 可运行 {} 个，包含 {} 个，排除 {} 个",
        shard_index,
        total_shards,
        method,
        runnable_count,
        shard.included.len(),
        shard.excluded.len()
    );

    shard
}

/// 可运行实体中属于 `shard_index` 的连续区间
///
/// 每个分片分到 `n / total` 或 `n / total + 1` 个，索引小于 `n % total` 的分片多分一个。
pub fn shard_range(n: usize, shard_index: usize, total_shards: usize) -> Range<usize> {
    let base = n / total_shards;
    let extra = n % total_shards;
    let start = shard_index * base + shard_index.min(extra);
    let len = base + usize::from(shard_index < extra);
    start..start + len
}

fn hash_shard(name: &str, total_shards: usize) -> usize {
    (fnv1a32(name.as_bytes()) as usize) % total_shards
}

/// 32位FNV-1a，跨平台、跨版本结果稳定
fn fnv1a32(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    bytes.iter().fold(OFFSET_BASIS, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_range_sizes() {
        let sizes: Vec<usize> = (0..3).map(|i| shard_range(10, i, 3).len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        assert_eq!(shard_range(10, 0, 3), 0..4);
        assert_eq!(shard_range(10, 1, 3), 4..7);
        assert_eq!(shard_range(10, 2, 3), 7..10);
    }

    #[test]
    fn test_more_shards_than_entities() {
        assert_eq!(shard_range(2, 0, 5), 0..1);
        assert_eq!(shard_range(2, 1, 5), 1..2);
        assert!(shard_range(2, 4, 5).is_empty());
        assert_eq!(shard_range(2, 4, 5).start, 2);
    }

    #[test]
    fn test_fnv1a32_known_values() {
        assert_eq!(fnv1a32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a32(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a32(b"foobar"), 0xbf9c_f968);
    }
}
