//! Reference replacement between resource ids and keys.
//!
//! Resources read from the source project reference each other by id. Ids
//! differ between projects, keys do not, so every reference in a draft is
//! rewritten to `{"typeId", "key"}` before it leaves the source side, and
//! back to `{"typeId", "id"}` of the target project before it is compared
//! with or written to the target.

mod walk;

pub(crate) use walk::{string_field, visit_references, visit_references_mut};

use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::Mutex;
use tracing::debug;

use crate::client::{in_predicate, CtpClient, CtpError, QueryParams};
use crate::engine::SyncError;
use crate::resource::resolvable_endpoint;

/// Ids or keys looked up per request.
const LOOKUP_CHUNK_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Direction {
    IdsToKeys,
    KeysToIds,
}

impl Direction {
    fn from_field(self) -> &'static str {
        match self {
            Direction::IdsToKeys => "id",
            Direction::KeysToIds => "key",
        }
    }

    fn to_field(self) -> &'static str {
        match self {
            Direction::IdsToKeys => "key",
            Direction::KeysToIds => "id",
        }
    }
}

type CacheKey = (Direction, String, String);

/// Translates references of one project, caching every lookup.
///
/// One resolver is shared by all batches of a sync. Misses are cached for
/// id-to-key lookups only: the source project is read-only during a sync,
/// while the target gains resources as the sync progresses.
#[derive(Debug)]
pub struct ReferenceResolver {
    client: CtpClient,
    cache: Mutex<HashMap<CacheKey, Option<String>>>,
}

impl ReferenceResolver {
    pub fn new(client: CtpClient) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Records the id/key pairs of resources already at hand.
    pub async fn seed(&self, type_id: &str, resources: &[Value]) {
        let mut cache = self.cache.lock().await;
        for resource in resources {
            let (Some(id), Some(key)) = (
                resource.get("id").and_then(Value::as_str),
                resource.get("key").and_then(Value::as_str),
            ) else {
                continue;
            };
            cache.insert(
                (Direction::IdsToKeys, type_id.to_string(), id.to_string()),
                Some(key.to_string()),
            );
            cache.insert(
                (Direction::KeysToIds, type_id.to_string(), key.to_string()),
                Some(id.to_string()),
            );
        }
    }

    /// Replaces every id reference with a key reference.
    ///
    /// Drafts are returned in order; a draft fails on its first reference
    /// whose target is missing or has no key.
    pub async fn ids_to_keys(
        &self,
        drafts: Vec<Value>,
    ) -> Result<Vec<Result<Value, SyncError>>, CtpError> {
        self.resolve(drafts, Direction::IdsToKeys).await
    }

    /// Replaces every key reference with an id reference of this project.
    pub async fn keys_to_ids(
        &self,
        drafts: Vec<Value>,
    ) -> Result<Vec<Result<Value, SyncError>>, CtpError> {
        self.resolve(drafts, Direction::KeysToIds).await
    }

    async fn resolve(
        &self,
        mut drafts: Vec<Value>,
        direction: Direction,
    ) -> Result<Vec<Result<Value, SyncError>>, CtpError> {
        let wanted = collect(&drafts, direction);
        let missing = {
            let cache = self.cache.lock().await;
            wanted
                .into_iter()
                .filter_map(|(type_id, values)| {
                    let unknown: Vec<String> = values
                        .into_iter()
                        .filter(|v| {
                            !cache.contains_key(&(direction, type_id.clone(), v.clone()))
                        })
                        .collect();
                    (!unknown.is_empty()).then_some((type_id, unknown))
                })
                .collect::<Vec<_>>()
        };

        for (type_id, values) in missing {
            self.fetch(direction, &type_id, &values).await?;
        }

        let cache = self.cache.lock().await;
        let results = drafts
            .iter_mut()
            .map(|draft| {
                let mut failure = None;
                visit_references_mut(draft, &mut |reference| {
                    let Some((type_id, from)) = lookup_target(reference, direction) else {
                        return;
                    };
                    let resolved = cache
                        .get(&(direction, type_id.clone(), from.clone()))
                        .cloned()
                        .flatten();
                    match resolved {
                        Some(to) => {
                            reference.clear();
                            reference.insert("typeId".to_string(), json!(type_id));
                            reference.insert(direction.to_field().to_string(), json!(to));
                        }
                        None => {
                            failure.get_or_insert(SyncError::UnresolvedReference {
                                type_id,
                                attribute: direction.from_field(),
                                value: from,
                            });
                        }
                    }
                });
                failure
            })
            .collect::<Vec<_>>();

        Ok(drafts
            .into_iter()
            .zip(results)
            .map(|(draft, failure)| match failure {
                Some(err) => Err(err),
                None => Ok(draft),
            })
            .collect())
    }

    async fn fetch(
        &self,
        direction: Direction,
        type_id: &str,
        values: &[String],
    ) -> Result<(), CtpError> {
        let Some(endpoint) = resolvable_endpoint(type_id) else {
            return Ok(());
        };

        for chunk in values.chunks(LOOKUP_CHUNK_SIZE) {
            debug!(type_id, count = chunk.len(), "Looking up references");
            let query = QueryParams::new()
                .with_predicate(in_predicate(direction.from_field(), chunk))
                .with_limit(chunk.len() as u32);
            let page = self.client.query(endpoint, &query).await?;

            let found: HashMap<&str, Option<&str>> = page
                .results
                .iter()
                .filter_map(|r| {
                    let from = r.get(direction.from_field())?.as_str()?;
                    Some((from, r.get(direction.to_field()).and_then(Value::as_str)))
                })
                .collect();

            let mut cache = self.cache.lock().await;
            for value in chunk {
                let resolved = found.get(value.as_str()).copied().flatten();
                if resolved.is_none() && direction == Direction::KeysToIds {
                    continue;
                }
                cache.insert(
                    (direction, type_id.to_string(), value.clone()),
                    resolved.map(str::to_string),
                );
            }
        }

        Ok(())
    }
}

/// The `(typeId, id|key)` a reference must be translated from, if any.
fn lookup_target(
    reference: &serde_json::Map<String, Value>,
    direction: Direction,
) -> Option<(String, String)> {
    let type_id = string_field(reference, "typeId")?;
    resolvable_endpoint(type_id)?;
    if reference.contains_key(direction.to_field()) && direction == Direction::KeysToIds {
        return None;
    }
    let from = string_field(reference, direction.from_field())?;
    Some((type_id.to_string(), from.to_string()))
}

fn collect(drafts: &[Value], direction: Direction) -> BTreeMap<String, BTreeSet<String>> {
    let mut wanted: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for draft in drafts {
        visit_references(draft, &mut |reference| {
            if let Some((type_id, from)) = lookup_target(reference, direction) {
                wanted.entry(type_id).or_default().insert(from);
            }
        });
    }
    wanted
}
