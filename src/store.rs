use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use bson::{doc, oid::ObjectId, Bson, Document};
use futures::{future::BoxFuture, TryStreamExt};
use mongodb::{options::FindOptions, Client, Collection};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::StoreBackend;
use crate::schemas::{Expense, Participant};

const PARTICIPANTS_FILE: &str = "participants.json";
const EXPENSES_FILE: &str = "expenses.json";
const TMP_SUFFIX: &str = "tmp";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored collection is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("mongodb request failed: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("record cannot be encoded as BSON: {0}")]
    Bson(#[from] bson::ser::Error),
}

/// Reads return whole collections and saves overwrite them entirely.
pub trait LedgerStore: Send + Sync {
    fn load_participants(&self) -> BoxFuture<'_, Result<Vec<Participant>, StoreError>>;
    fn load_expenses(&self) -> BoxFuture<'_, Result<Vec<Expense>, StoreError>>;
    fn save_participants<'a>(
        &'a self,
        participants: &'a [Participant],
    ) -> BoxFuture<'a, Result<(), StoreError>>;
    fn save_expenses<'a>(&'a self, expenses: &'a [Expense])
        -> BoxFuture<'a, Result<(), StoreError>>;
}

pub async fn open(backend: &StoreBackend) -> Result<Arc<dyn LedgerStore>, StoreError> {
    let store: Arc<dyn LedgerStore> = match backend {
        StoreBackend::Json { data_dir } => {
            tracing::info!(dir = %data_dir.display(), "using JSON file store");
            Arc::new(JsonFileStore::new(data_dir.clone()))
        }
        StoreBackend::Mongo { uri, database } => {
            tracing::info!(%database, "using mongodb store");
            Arc::new(MongoStore::connect(uri, database).await?)
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; data is lost on shutdown");
            Arc::new(MemoryStore::default())
        }
    };
    Ok(store)
}

#[derive(Clone, Debug)]
pub struct JsonFileStore {
    participants_path: PathBuf,
    expenses_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(data_dir: PathBuf) -> Self {
        JsonFileStore {
            participants_path: data_dir.join(PARTICIPANTS_FILE),
            expenses_path: data_dir.join(EXPENSES_FILE),
        }
    }
}

impl LedgerStore for JsonFileStore {
    fn load_participants(&self) -> BoxFuture<'_, Result<Vec<Participant>, StoreError>> {
        Box::pin(read_collection(&self.participants_path))
    }

    fn load_expenses(&self) -> BoxFuture<'_, Result<Vec<Expense>, StoreError>> {
        Box::pin(read_collection(&self.expenses_path))
    }

    fn save_participants<'a>(
        &'a self,
        participants: &'a [Participant],
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(write_collection(&self.participants_path, participants))
    }

    fn save_expenses<'a>(
        &'a self,
        expenses: &'a [Expense],
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(write_collection(&self.expenses_path, expenses))
    }
}

async fn read_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let data = match tokio::fs::read_to_string(path).await {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    if data.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&data)?)
}

async fn write_collection<T: Serialize>(path: &Path, items: &[T]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(items)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

#[derive(Clone)]
pub struct MongoStore {
    participants: Collection<Participant>,
    expenses: Collection<Expense>,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);
        tracing::info!("connected to mongodb");
        Ok(MongoStore {
            participants: db.collection("Participants"),
            expenses: db.collection("Expenses"),
        })
    }
}

// Documents get an ObjectId `_id` on insert, so sorting by it restores insertion order.
async fn find_all<T>(collection: &Collection<T>) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
    let cursor = collection.find(None, options).await?;
    let items: Vec<T> = cursor.try_collect().await?;
    Ok(items)
}

fn tagged_documents<T: Serialize>(items: &[T]) -> Result<(Vec<Bson>, Vec<Document>), StoreError> {
    let mut ids = Vec::with_capacity(items.len());
    let mut documents = Vec::with_capacity(items.len());
    for item in items {
        let id = ObjectId::new();
        let mut document = bson::to_document(item)?;
        document.insert("_id", id);
        ids.push(Bson::ObjectId(id));
        documents.push(document);
    }
    Ok((ids, documents))
}

// The new snapshot is inserted before the old one is dropped, so a failed
// write never leaves the collection empty.
async fn replace_all<T>(collection: &Collection<T>, items: &[T]) -> Result<(), StoreError>
where
    T: Serialize + Send + Sync,
{
    let (ids, documents) = tagged_documents(items)?;
    let raw = collection.clone_with_type::<Document>();
    if !documents.is_empty() {
        if let Err(err) = raw.insert_many(documents, None).await {
            tracing::warn!(
                collection = %collection.name(),
                error = %err,
                "snapshot insert failed, keeping previous documents"
            );
            raw.delete_many(doc! { "_id": { "$in": ids } }, None).await?;
            return Err(err.into());
        }
    }
    raw.delete_many(doc! { "_id": { "$nin": ids } }, None).await?;
    Ok(())
}

impl LedgerStore for MongoStore {
    fn load_participants(&self) -> BoxFuture<'_, Result<Vec<Participant>, StoreError>> {
        Box::pin(find_all(&self.participants))
    }

    fn load_expenses(&self) -> BoxFuture<'_, Result<Vec<Expense>, StoreError>> {
        Box::pin(find_all(&self.expenses))
    }

    fn save_participants<'a>(
        &'a self,
        participants: &'a [Participant],
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(replace_all(&self.participants, participants))
    }

    fn save_expenses<'a>(
        &'a self,
        expenses: &'a [Expense],
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(replace_all(&self.expenses, expenses))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    participants: Mutex<Vec<Participant>>,
    expenses: Mutex<Vec<Expense>>,
}

impl LedgerStore for MemoryStore {
    fn load_participants(&self) -> BoxFuture<'_, Result<Vec<Participant>, StoreError>> {
        Box::pin(async move { Ok(self.participants.lock().await.clone()) })
    }

    fn load_expenses(&self) -> BoxFuture<'_, Result<Vec<Expense>, StoreError>> {
        Box::pin(async move { Ok(self.expenses.lock().await.clone()) })
    }

    fn save_participants<'a>(
        &'a self,
        participants: &'a [Participant],
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            *self.participants.lock().await = participants.to_vec();
            Ok(())
        })
    }

    fn save_expenses<'a>(
        &'a self,
        expenses: &'a [Expense],
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            *self.expenses.lock().await = expenses.to_vec();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{ExpenseDraft, NewParticipant};
    use tempfile::tempdir;

    fn participant(name: &str) -> Participant {
        Participant::new(NewParticipant {
            display_name: name.to_string(),
            contact_address: format!("{name}@example.com"),
        })
    }

    fn expense(payer: &Participant, amount: i64) -> Expense {
        Expense::new(ExpenseDraft {
            payer_id: payer.id.clone(),
            description: "rent".to_string(),
            amount: amount.into(),
        })
    }

    #[actix_web::test]
    async fn json_store_reads_missing_files_as_empty() {
        let dir = tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("data"));

        assert!(store.load_participants().await.unwrap().is_empty());
        assert!(store.load_expenses().await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn json_store_overwrites_whole_collections() {
        let dir = tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("data"));
        let ana = participant("ana");
        let ben = participant("ben");

        store
            .save_participants(&[ana.clone(), ben.clone()])
            .await
            .expect("save participants");
        store
            .save_expenses(&[expense(&ana, 90), expense(&ben, 30)])
            .await
            .expect("save expenses");
        store
            .save_participants(&[ben.clone()])
            .await
            .expect("overwrite participants");

        assert_eq!(store.load_participants().await.unwrap(), vec![ben]);
        let expenses = store.load_expenses().await.unwrap();
        assert_eq!(expenses.len(), 2);
        assert_eq!(expenses[0].payer_id, ana.id);
        assert!(!dir.path().join("data").join("participants.json.tmp").exists());
    }

    #[actix_web::test]
    async fn json_store_treats_blank_file_as_empty() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join(EXPENSES_FILE), "\n").unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf());

        assert!(store.load_expenses().await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn json_store_reports_corrupt_files() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join(PARTICIPANTS_FILE), "[{").unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf());

        assert!(matches!(
            store.load_participants().await,
            Err(StoreError::Json(_))
        ));
    }

    #[actix_web::test]
    async fn memory_store_round_trips_snapshots() {
        let store = MemoryStore::default();
        let ana = participant("ana");
        store.save_participants(&[ana.clone()]).await.unwrap();
        store.save_expenses(&[expense(&ana, 10)]).await.unwrap();

        assert_eq!(store.load_participants().await.unwrap(), vec![ana]);
        assert_eq!(store.load_expenses().await.unwrap().len(), 1);
    }

    #[test]
    fn snapshot_documents_carry_fresh_ordered_ids() {
        let ana = participant("ana");
        let ben = participant("ben");
        let (ids, documents) = tagged_documents(&[ana.clone(), ben]).unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(documents.len(), 2);
        let first = documents[0].get_object_id("_id").unwrap();
        let second = documents[1].get_object_id("_id").unwrap();
        assert!(first < second);
        assert_eq!(ids[0], Bson::ObjectId(first));
        assert_eq!(documents[0].get_str("id").unwrap(), ana.id);
        assert_eq!(documents[0].get_str("display_name").unwrap(), "ana");

        let (ids, documents) = tagged_documents::<Participant>(&[]).unwrap();
        assert!(ids.is_empty() && documents.is_empty());
    }

    #[test]
    fn tmp_path_appends_suffix() {
        assert_eq!(
            tmp_path(Path::new("data/expenses.json")),
            PathBuf::from("data/expenses.json.tmp")
        );
    }
}
