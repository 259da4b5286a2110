use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tablero_shared::{RecordId, Syncable};
use tracing::{debug, info, warn};

use crate::backend::{BackendError, CollectionBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

/// One REST call needed to bring the backend in line with the client.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOp {
    pub action: SyncAction,
    pub collection: &'static str,
    pub id: String,
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl SyncReport {
    pub fn calls(&self) -> usize {
        self.created + self.updated + self.deleted + self.failed
    }
}

/// Orders the calls that reconcile `server` with `client`.
///
/// Per level: creates and updates in client order, each followed by its
/// children, then deletes for server records the client dropped. A deleted
/// record takes its descendants with it, deepest first.
pub fn plan<T: Syncable>(client: &[T], server: &[T]) -> Vec<SyncOp> {
    let mut ops = Vec::new();
    plan_level(client, server, &mut ops);
    ops
}

fn plan_level<T: Syncable>(client: &[T], server: &[T], ops: &mut Vec<SyncOp>) {
    let on_server: HashMap<String, &T> = server.iter().map(|r| (r.identity().key(), r)).collect();
    let on_client: HashSet<String> = client.iter().map(|r| r.identity().key()).collect();

    for record in client {
        let normalized = normalized(record);
        let existing = on_server.get(&record.identity().key()).copied();
        let change = match existing {
            None => Some((SyncAction::Create, Vec::new())),
            Some(current) => {
                changed_fields(&normalized, current).map(|cleared| (SyncAction::Update, cleared))
            }
        };
        if let Some((action, cleared)) = change {
            match serde_json::to_value(&normalized) {
                Ok(mut payload) => {
                    if let Value::Object(fields) = &mut payload {
                        for key in cleared {
                            fields.insert(key, Value::Null);
                        }
                    }
                    ops.push(SyncOp {
                        action,
                        collection: T::COLLECTION,
                        id: record.identity().key(),
                        payload: Some(payload),
                    });
                }
                Err(e) => {
                    warn!(collection = T::COLLECTION, id = %record.identity(), error = %e, "cannot encode record; skipping");
                }
            }
        }
        let server_children = existing.map(|current| current.children()).unwrap_or(&[]);
        plan_level(record.children(), server_children, ops);
    }

    for record in server {
        if !on_client.contains(&record.identity().key()) {
            plan_removal(record, ops);
        }
    }
}

fn plan_removal<T: Syncable>(record: &T, ops: &mut Vec<SyncOp>) {
    for child in record.children() {
        plan_removal(child, ops);
    }
    ops.push(SyncOp {
        action: SyncAction::Delete,
        collection: T::COLLECTION,
        id: record.identity().key(),
        payload: None,
    });
}

fn normalized<T: Syncable>(record: &T) -> T {
    let mut copy = record.clone();
    if let Err(e) = copy.normalize() {
        warn!(collection = T::COLLECTION, id = %record.identity(), error = %e, "invalid base64 image; sending as-is");
        return record.clone();
    }
    copy
}

/// JSON object of the record without its nested collection.
fn own_fields<T: Syncable>(record: &T) -> Option<Map<String, Value>> {
    let Ok(Value::Object(mut fields)) = serde_json::to_value(record) else {
        return None;
    };
    if let Some(children) = T::CHILDREN_FIELD {
        fields.remove(children);
    }
    Some(fields)
}

/// `None` when the client's copy matches the stored record. Otherwise the
/// stored fields the client no longer carries, which the update must null
/// out. Columns in `T::SERVER_FIELDS` are never treated as cleared.
fn changed_fields<T: Syncable>(client: &T, server: &T) -> Option<Vec<String>> {
    let (Some(client), Some(server)) = (own_fields(client), own_fields(server)) else {
        return Some(Vec::new());
    };
    let cleared: Vec<String> = server
        .iter()
        .filter(|(key, value)| {
            !value.is_null() && !client.contains_key(*key) && !T::SERVER_FIELDS.contains(&key.as_str())
        })
        .map(|(key, _)| key.clone())
        .collect();
    let edited = client
        .iter()
        .any(|(key, value)| server.get(key).unwrap_or(&Value::Null) != value);
    (edited || !cleared.is_empty()).then_some(cleared)
}

/// Current server list for `T`, with malformed records skipped.
pub async fn fetch_collection<T: Syncable>(
    backend: &dyn CollectionBackend,
) -> Result<Vec<T>, BackendError> {
    Ok(fetch_with_strays(backend).await?.0)
}

/// Parsed records plus the ids of rows that failed to parse but still
/// carry an identity, so a sync can remove them.
async fn fetch_with_strays<T: Syncable>(
    backend: &dyn CollectionBackend,
) -> Result<(Vec<T>, Vec<RecordId>), BackendError> {
    let raw = backend.list(T::COLLECTION).await?;
    let mut records = Vec::with_capacity(raw.len());
    let mut strays = Vec::new();
    for value in raw {
        let id = value
            .get("id")
            .and_then(|id| serde_json::from_value::<RecordId>(id.clone()).ok());
        match serde_json::from_value::<T>(value) {
            Ok(mut record) => {
                if let Err(e) = record.normalize() {
                    debug!(collection = T::COLLECTION, id = %record.identity(), error = %e, "server record kept unnormalized");
                }
                records.push(record);
            }
            Err(e) => {
                warn!(collection = T::COLLECTION, id = ?id, error = %e, "skipping malformed server record");
                strays.extend(id);
            }
        }
    }
    Ok((records, strays))
}

/// Runs `ops` in order. A failed call is logged and does not stop the rest.
pub async fn execute(backend: &dyn CollectionBackend, ops: &[SyncOp]) -> SyncReport {
    let mut report = SyncReport::default();
    for op in ops {
        let result = match (op.action, &op.payload) {
            (SyncAction::Create, Some(payload)) => {
                backend.create(op.collection, payload).await.map(|_| ())
            }
            (SyncAction::Update, Some(payload)) => {
                backend.update(op.collection, &op.id, payload).await
            }
            (SyncAction::Delete, _) => backend.delete(op.collection, &op.id).await,
            (_, None) => {
                warn!(collection = op.collection, id = %op.id, "write without payload; skipping");
                report.failed += 1;
                continue;
            }
        };
        match result {
            Ok(()) => match op.action {
                SyncAction::Create => report.created += 1,
                SyncAction::Update => report.updated += 1,
                SyncAction::Delete => report.deleted += 1,
            },
            Err(e) => {
                warn!(
                    collection = op.collection,
                    id = %op.id,
                    action = ?op.action,
                    error = %e,
                    "sync call failed"
                );
                report.failed += 1;
            }
        }
    }
    report
}

/// Reconciles the backend collection of `T` with the client's list.
pub async fn sync_collection<T: Syncable>(
    backend: &dyn CollectionBackend,
    client: &[T],
) -> Result<SyncReport, BackendError> {
    let (server, strays) = fetch_with_strays::<T>(backend).await?;
    let mut ops = plan(client, &server);
    let on_client: HashSet<String> = client.iter().map(|r| r.identity().key()).collect();
    ops.extend(
        strays
            .into_iter()
            .filter(|id| !on_client.contains(&id.key()))
            .map(|id| SyncOp {
                action: SyncAction::Delete,
                collection: T::COLLECTION,
                id: id.key(),
                payload: None,
            }),
    );
    let report = execute(backend, &ops).await;
    if report.calls() == 0 {
        debug!(collection = T::COLLECTION, "collection already in sync");
        return Ok(report);
    }
    info!(
        collection = T::COLLECTION,
        created = report.created,
        updated = report.updated,
        deleted = report.deleted,
        failed = report.failed,
        "collection synced"
    );
    Ok(report)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{Value, json};
    use tablero_shared::{MapRecord, Monster, RecordId, Shop};

    use super::{SyncAction, SyncReport, plan, sync_collection};
    use crate::backend::{BackendError, CollectionBackend};

    /// In-memory backend that records every call and applies writes to
    /// top-level collections.
    #[derive(Default)]
    pub(crate) struct RecordingBackend {
        pub collections: Mutex<HashMap<String, Vec<Value>>>,
        pub calls: Mutex<Vec<(SyncAction, String, String)>>,
        pub failing_ids: HashSet<String>,
        pub unreachable: bool,
    }

    impl RecordingBackend {
        pub fn with(collection: &str, records: Value) -> Self {
            let backend = Self::default();
            backend.seed(collection, records);
            backend
        }

        pub fn seed(&self, collection: &str, records: Value) {
            let Value::Array(records) = records else {
                panic!("seed expects an array");
            };
            self.collections
                .lock()
                .expect("collections lock")
                .insert(collection.to_string(), records);
        }

        pub fn calls(&self) -> Vec<(SyncAction, String, String)> {
            self.calls.lock().expect("calls lock").clone()
        }

        fn record(&self, action: SyncAction, collection: &str, id: &str) -> Result<(), BackendError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push((action, collection.to_string(), id.to_string()));
            if self.failing_ids.contains(id) {
                return Err(BackendError::Decode(format!("rejected {id}")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CollectionBackend for RecordingBackend {
        async fn list(&self, collection: &str) -> Result<Vec<Value>, BackendError> {
            if self.unreachable {
                return Err(BackendError::InvalidUrl("unreachable".into()));
            }
            Ok(self
                .collections
                .lock()
                .expect("collections lock")
                .get(collection)
                .cloned()
                .unwrap_or_default())
        }

        async fn create(&self, collection: &str, record: &Value) -> Result<Value, BackendError> {
            let mut record = record.clone();
            if record.get("id").is_none_or(Value::is_null) {
                let next = self.collections.lock().expect("collections lock").get(collection).map_or(0, Vec::len);
                record["id"] = json!(next as i64 + 100);
            }
            let id = key_of(&record);
            self.record(SyncAction::Create, collection, &id)?;
            let answer = json!({"id": record["id"].clone()});
            self.collections
                .lock()
                .expect("collections lock")
                .entry(collection.to_string())
                .or_default()
                .push(record);
            Ok(answer)
        }

        async fn update(&self, collection: &str, id: &str, record: &Value) -> Result<(), BackendError> {
            self.record(SyncAction::Update, collection, id)?;
            let mut collections = self.collections.lock().expect("collections lock");
            if let Some(stored) = collections
                .entry(collection.to_string())
                .or_default()
                .iter_mut()
                .find(|r| key_of(r) == id)
            {
                *stored = record.clone();
            }
            Ok(())
        }

        async fn delete(&self, collection: &str, id: &str) -> Result<(), BackendError> {
            self.record(SyncAction::Delete, collection, id)?;
            self.collections
                .lock()
                .expect("collections lock")
                .entry(collection.to_string())
                .or_default()
                .retain(|r| key_of(r) != id);
            Ok(())
        }
    }

    /// Identity of a stored row as the shell keys it.
    pub(crate) fn key_of(record: &Value) -> String {
        serde_json::from_value::<RecordId>(record["id"].clone())
            .map(|id| id.key())
            .unwrap_or_default()
    }

    fn monsters(value: Value) -> Vec<Monster> {
        serde_json::from_value(value).expect("parse monsters")
    }

    #[tokio::test]
    async fn creates_updates_and_deletes_once_each() {
        let backend = RecordingBackend::with(
            "monsters",
            json!([{"id": "2", "name": "Goblin"}, {"id": "3", "name": "Orc"}]),
        );
        let client = monsters(json!([{"id": "1", "name": "Wolf"}, {"id": "2", "name": "Goblin chief"}]));

        let report = sync_collection(&backend, &client).await.expect("sync");

        assert_eq!(
            report,
            SyncReport {
                created: 1,
                updated: 1,
                deleted: 1,
                failed: 0
            }
        );
        let calls = backend.calls();
        assert_eq!(
            calls,
            vec![
                (SyncAction::Create, "monsters".into(), "1".into()),
                (SyncAction::Update, "monsters".into(), "2".into()),
                (SyncAction::Delete, "monsters".into(), "3".into()),
            ]
        );
    }

    #[tokio::test]
    async fn second_run_issues_no_calls() {
        let backend = RecordingBackend::with("maps", json!([{"id": "old", "name": "gone.png"}]));
        let client: Vec<MapRecord> = serde_json::from_value(json!([
            {"id": "m1", "name": "town.png", "keepOpen": true, "image_data": "data:image/png;base64,YWJj"},
            {"id": "m2", "name": "cave", "keepOpen": false}
        ]))
        .expect("parse maps");

        let first = sync_collection(&backend, &client).await.expect("first sync");
        assert_eq!(first.created, 2);
        assert_eq!(first.deleted, 1);

        let second = sync_collection(&backend, &client).await.expect("second sync");
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn nested_item_is_created_without_touching_its_category() {
        let backend = RecordingBackend::with(
            "shops",
            json!([{"id": "s1", "name": "Smithy", "categories": [
                {"id": "c1", "shop_id": "s1", "name": "Weapons", "items": []}
            ]}]),
        );
        let client: Vec<Shop> = serde_json::from_value(json!([{"id": "s1", "name": "Smithy", "categories": [
            {"id": "c1", "shop_id": "s1", "name": "Weapons", "items": [
                {"id": "i1", "category_id": "c1", "data": "{\"Name\":\"Axe\"}"}
            ]}
        ]}]))
        .expect("parse shops");

        sync_collection(&backend, &client).await.expect("sync");

        assert_eq!(
            backend.calls(),
            vec![(SyncAction::Create, "items".into(), "i1".into())]
        );
    }

    #[test]
    fn removed_shop_deletes_descendants_first() {
        let server: Vec<Shop> = serde_json::from_value(json!([{"id": "s1", "categories": [
            {"id": "c1", "items": [{"id": "i1"}, {"id": "i2"}]},
            {"id": "c2"}
        ]}]))
        .expect("parse shops");

        let ops = plan::<Shop>(&[], &server);
        let order: Vec<(&str, &str)> = ops.iter().map(|op| (op.collection, op.id.as_str())).collect();

        assert_eq!(
            order,
            vec![
                ("items", "i1"),
                ("items", "i2"),
                ("categories", "c1"),
                ("categories", "c2"),
                ("shops", "s1"),
            ]
        );
        assert!(ops.iter().all(|op| op.action == SyncAction::Delete));
    }

    #[test]
    fn new_shop_is_created_before_its_children() {
        let client: Vec<Shop> = serde_json::from_value(json!([{"id": "s1", "categories": [
            {"id": "c1", "items": [{"id": "i1"}]}
        ]}]))
        .expect("parse shops");

        let ops = plan(&client, &[]);
        let order: Vec<&str> = ops.iter().map(|op| op.collection).collect();

        assert_eq!(order, vec!["shops", "categories", "items"]);
        assert!(ops.iter().all(|op| op.action == SyncAction::Create));
    }

    #[tokio::test]
    async fn failed_call_does_not_stop_the_rest() {
        let mut backend = RecordingBackend::default();
        backend.failing_ids.insert("1".into());
        let client = monsters(json!([{"id": "1"}, {"id": "2"}]));

        let report = sync_collection(&backend, &client).await.expect("sync");

        assert_eq!(report.created, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn map_images_are_sent_as_buffers() {
        let backend = RecordingBackend::default();
        let client: Vec<MapRecord> = serde_json::from_value(json!([
            {"id": "m1", "name": "town.png", "keepOpen": true, "image_data": "data:image/png;base64,YWJj",
             "imageDataUrl": "data:image/png;base64,YWJj"}
        ]))
        .expect("parse maps");

        sync_collection(&backend, &client).await.expect("sync");

        let stored = backend.list("maps").await.expect("list maps");
        assert_eq!(stored[0]["image_data"], json!({"type": "Buffer", "data": [97, 98, 99]}));
        assert_eq!(stored[0]["keepOpen"], 1);
        assert!(stored[0].get("imageDataUrl").is_none());
    }

    #[tokio::test]
    async fn unreachable_backend_is_an_error() {
        let backend = RecordingBackend {
            unreachable: true,
            ..RecordingBackend::default()
        };
        let result = sync_collection::<Monster>(&backend, &[]).await;
        assert!(result.is_err());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn cleared_panoramic_image_is_written_back() {
        let backend = RecordingBackend::with(
            "maps",
            json!([{"id": "m1", "name": "town.png", "keepOpen": 0, "created_at": "2024-01-01",
                    "panoramic_view_data": {"type": "Buffer", "data": [97, 98, 99]}}]),
        );
        let client: Vec<MapRecord> = serde_json::from_value(json!([
            {"id": "m1", "name": "town.png", "keepOpen": false, "panoramic_view_data": null}
        ]))
        .expect("parse maps");

        sync_collection(&backend, &client).await.expect("sync");

        assert_eq!(
            backend.calls(),
            vec![(SyncAction::Update, "maps".into(), "m1".into())]
        );
        let stored = backend.list("maps").await.expect("list maps");
        assert_eq!(stored[0]["panoramic_view_data"], Value::Null);

        let again = sync_collection(&backend, &client).await.expect("second sync");
        assert_eq!(again.calls(), 0);
    }

    #[tokio::test]
    async fn omitted_foreign_key_is_not_a_change() {
        let backend = RecordingBackend::with(
            "shops",
            json!([{"id": "s1", "name": "Smithy", "categories": [
                {"id": "c1", "shop_id": "s1", "name": "Weapons", "updated_at": "2024-01-01", "items": []}
            ]}]),
        );
        let client: Vec<Shop> = serde_json::from_value(json!([{"id": "s1", "name": "Smithy", "categories": [
            {"id": "c1", "name": "Weapons"}
        ]}]))
        .expect("parse shops");

        let report = sync_collection(&backend, &client).await.expect("sync");

        assert_eq!(report.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_server_rows_are_deleted() {
        let backend = RecordingBackend::with(
            "maps",
            json!([
                {"id": "m1", "name": "town.png"},
                {"id": 7, "name": 12, "keepOpen": "sometimes"},
                {"name": "no identity"}
            ]),
        );
        let client: Vec<MapRecord> =
            serde_json::from_value(json!([{"id": "m1", "name": "town.png"}])).expect("parse maps");

        let report = sync_collection(&backend, &client).await.expect("sync");

        assert_eq!(report.deleted, 1);
        assert_eq!(
            backend.calls(),
            vec![(SyncAction::Delete, "maps".into(), "7".into())]
        );
    }

    #[tokio::test]
    async fn numeric_ids_match_their_stored_rows() {
        let backend = RecordingBackend::with(
            "monsters",
            json!([{"id": 1, "name": "Wolf"}, {"id": 2, "name": "Goblin"}]),
        );
        let client = monsters(json!([{"id": 1, "name": "Wolf"}, {"id": 2, "name": "Goblin chief"}]));

        sync_collection(&backend, &client).await.expect("sync");

        assert_eq!(
            backend.calls(),
            vec![(SyncAction::Update, "monsters".into(), "2".into())]
        );
    }
}
