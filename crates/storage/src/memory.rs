//! In-memory key-value backend for testing and development.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Batch, BatchOp, KvStore, StorageError, StorageResult};

/// One stored collection. A key holds exactly one kind at a time.
#[derive(Debug, Clone)]
enum Value {
    Hash(HashMap<String, Vec<u8>>),
    Set(HashSet<String>),
    Sorted(HashMap<String, i64>),
}

/// In-memory [`KvStore`] implementation.
///
/// State lives behind an `Arc<RwLock>`, so clones share the same store and
/// the handle is safe for concurrent use. Batches are applied under a single
/// write-lock acquisition, which gives them the required as-a-unit
/// visibility.
#[derive(Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self { data: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Number of live keys, across all collection kinds.
    pub async fn key_count(&self) -> usize {
        self.data.read().await.len()
    }

    /// Returns true if the key exists in any collection kind.
    pub async fn contains_key(&self, key: &str) -> bool {
        self.data.read().await.contains_key(key)
    }

    /// All live keys matching a prefix. Useful for asserting that transient
    /// query keys were cleaned up.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.data.read().await.keys().filter(|k| k.starts_with(prefix)).cloned().collect()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Member/score pairs of one intersection source, or `None` score for plain
/// set members.
fn source_members(
    data: &HashMap<String, Value>,
    key: &str,
) -> StorageResult<HashMap<String, Option<i64>>> {
    match data.get(key) {
        None => Ok(HashMap::new()),
        Some(Value::Set(members)) => Ok(members.iter().map(|m| (m.clone(), None)).collect()),
        Some(Value::Sorted(scored)) => {
            Ok(scored.iter().map(|(m, s)| (m.clone(), Some(*s))).collect())
        },
        Some(Value::Hash(_)) => Err(StorageError::wrong_type(key)),
    }
}

/// Apply one batched mutation in place.
fn apply_op(data: &mut HashMap<String, Value>, op: BatchOp) -> StorageResult<()> {
    match op {
        BatchOp::HashSet { key, field, value } => {
            match data.entry(key.clone()).or_insert_with(|| Value::Hash(HashMap::new())) {
                Value::Hash(hash) => {
                    hash.insert(field, value);
                    Ok(())
                },
                _ => Err(StorageError::wrong_type(key)),
            }
        },
        BatchOp::HashDelete { key, field } => {
            let remove = match data.get_mut(&key) {
                None => false,
                Some(Value::Hash(hash)) => {
                    hash.remove(&field);
                    hash.is_empty()
                },
                Some(_) => return Err(StorageError::wrong_type(key)),
            };
            if remove {
                data.remove(&key);
            }
            Ok(())
        },
        BatchOp::SetAdd { key, member } => {
            match data.entry(key.clone()).or_insert_with(|| Value::Set(HashSet::new())) {
                Value::Set(members) => {
                    members.insert(member);
                    Ok(())
                },
                _ => Err(StorageError::wrong_type(key)),
            }
        },
        BatchOp::SetRemove { key, member } => {
            let remove = match data.get_mut(&key) {
                None => false,
                Some(Value::Set(members)) => {
                    members.remove(&member);
                    members.is_empty()
                },
                Some(_) => return Err(StorageError::wrong_type(key)),
            };
            if remove {
                data.remove(&key);
            }
            Ok(())
        },
        BatchOp::ZSetPut { key, member, score } => {
            match data.entry(key.clone()).or_insert_with(|| Value::Sorted(HashMap::new())) {
                Value::Sorted(scored) => {
                    scored.insert(member, score);
                    Ok(())
                },
                _ => Err(StorageError::wrong_type(key)),
            }
        },
        BatchOp::ZSetRemove { key, member } => {
            let remove = match data.get_mut(&key) {
                None => false,
                Some(Value::Sorted(scored)) => {
                    scored.remove(&member);
                    scored.is_empty()
                },
                Some(_) => return Err(StorageError::wrong_type(key)),
            };
            if remove {
                data.remove(&key);
            }
            Ok(())
        },
        BatchOp::RemoveKey { key } => {
            data.remove(&key);
            Ok(())
        },
    }
}

#[async_trait]
impl KvStore for MemoryBackend {
    async fn hash_get(&self, key: &str, field: &str) -> StorageResult<Option<Vec<u8>>> {
        let data = self.data.read().await;
        match data.get(key) {
            None => Ok(None),
            Some(Value::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => Err(StorageError::wrong_type(key)),
        }
    }

    async fn hash_get_many(
        &self,
        key: &str,
        fields: &[String],
    ) -> StorageResult<Vec<Option<Vec<u8>>>> {
        let data = self.data.read().await;
        match data.get(key) {
            None => Ok(vec![None; fields.len()]),
            Some(Value::Hash(hash)) => {
                Ok(fields.iter().map(|f| hash.get(f).cloned()).collect())
            },
            Some(_) => Err(StorageError::wrong_type(key)),
        }
    }

    async fn hash_values(&self, key: &str) -> StorageResult<Vec<Vec<u8>>> {
        let data = self.data.read().await;
        match data.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Hash(hash)) => Ok(hash.values().cloned().collect()),
            Some(_) => Err(StorageError::wrong_type(key)),
        }
    }

    async fn set_members(&self, key: &str) -> StorageResult<Vec<String>> {
        let data = self.data.read().await;
        match data.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(StorageError::wrong_type(key)),
        }
    }

    async fn zset_score(&self, key: &str, member: &str) -> StorageResult<Option<i64>> {
        let data = self.data.read().await;
        match data.get(key) {
            None => Ok(None),
            Some(Value::Sorted(scored)) => Ok(scored.get(member).copied()),
            Some(_) => Err(StorageError::wrong_type(key)),
        }
    }

    async fn zset_count(&self, key: &str, min: i64, max: i64) -> StorageResult<usize> {
        let data = self.data.read().await;
        match data.get(key) {
            None => Ok(0),
            Some(Value::Sorted(scored)) => {
                Ok(scored.values().filter(|s| (min..=max).contains(*s)).count())
            },
            Some(_) => Err(StorageError::wrong_type(key)),
        }
    }

    async fn zset_rev_range_by_score(
        &self,
        key: &str,
        min: i64,
        max: i64,
        offset: usize,
        limit: Option<usize>,
    ) -> StorageResult<Vec<String>> {
        let data = self.data.read().await;
        let scored = match data.get(key) {
            None => return Ok(Vec::new()),
            Some(Value::Sorted(scored)) => scored,
            Some(_) => return Err(StorageError::wrong_type(key)),
        };

        let mut in_range: Vec<(&String, i64)> = scored
            .iter()
            .filter(|(_, s)| (min..=max).contains(*s))
            .map(|(m, s)| (m, *s))
            .collect();
        in_range.sort_by(|(am, asc), (bm, bsc)| bsc.cmp(asc).then_with(|| bm.cmp(am)));

        let take = limit.unwrap_or(usize::MAX);
        Ok(in_range.into_iter().skip(offset).take(take).map(|(m, _)| m.clone()).collect())
    }

    async fn zset_intersect_into(&self, dest: &str, sources: &[String]) -> StorageResult<usize> {
        let mut data = self.data.write().await;

        let mut result: Option<HashMap<String, i64>> = None;
        for source in sources {
            let members = source_members(&data, source)?;
            result = Some(match result {
                None => members.into_iter().map(|(m, s)| (m, s.unwrap_or(0))).collect(),
                Some(acc) => acc
                    .into_iter()
                    .filter_map(|(m, score)| {
                        members.get(&m).map(|s| (m, score + s.unwrap_or(0)))
                    })
                    .collect(),
            });
        }

        let result = result.unwrap_or_default();
        let count = result.len();
        if count == 0 {
            data.remove(dest);
        } else {
            data.insert(dest.to_string(), Value::Sorted(result));
        }
        Ok(count)
    }

    async fn remove_key(&self, key: &str) -> StorageResult<bool> {
        let mut data = self.data.write().await;
        Ok(data.remove(key).is_some())
    }

    async fn apply(&self, batch: Batch) -> StorageResult<()> {
        let mut data = self.data.write().await;
        for op in batch.into_ops() {
            apply_op(&mut data, op)?;
        }
        Ok(())
    }
}
