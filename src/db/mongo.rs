//! MongoDB client and collection wrapper
//!
//! A thin typed layer over the driver: each schema declares its own
//! indexes (`IntoIndexes`), applied when the collection is first opened,
//! and the wrapper stamps `metadata.created_at` / `metadata.updated_at`
//! on every insert and update. Deletes are hard deletes.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::{
    options::IndexOptions, results::UpdateResult, Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::TownhallError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify the connection with a ping.
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, TownhallError> {
        info!("Connecting to MongoDB at {}", uri);

        // serverSelectionTimeoutMS keeps startup from hanging on an
        // unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{uri}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000")
        } else {
            format!("{uri}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000")
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| TownhallError::Database(format!("failed to connect to MongoDB: {e}")))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| TownhallError::Database(format!("MongoDB ping failed: {e}")))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection with its indexes applied
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, TownhallError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Get the raw MongoDB client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing and metadata stamping
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    /// Create a new collection handle and apply schema indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, TownhallError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    async fn apply_indexes(&self) -> Result<(), TownhallError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| TownhallError::Database(format!("failed to create indexes: {e}")))?;

        Ok(())
    }

    /// Insert a document, setting metadata timestamps
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, TownhallError> {
        let metadata = item.mut_metadata();
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| TownhallError::Database(format!("insert failed: {e}")))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| TownhallError::Database("failed to get inserted id".into()))
    }

    /// Find one document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, TownhallError> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| TownhallError::Database(format!("find failed: {e}")))
    }

    /// Find one document by id
    pub async fn find_by_id(&self, id: &ObjectId) -> Result<Option<T>, TownhallError> {
        self.find_one(doc! { "_id": *id }).await
    }

    /// Find many documents by filter
    pub async fn find_many(&self, filter: Document) -> Result<Vec<T>, TownhallError> {
        use futures_util::StreamExt;

        let cursor = self
            .inner
            .find(filter)
            .await
            .map_err(|e| TownhallError::Database(format!("find failed: {e}")))?;

        let results: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    /// Update one document, bumping `metadata.updated_at` in the same write
    pub async fn update_one(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult, TownhallError> {
        self.inner
            .update_one(filter, with_updated_at(update))
            .await
            .map_err(|e| TownhallError::Database(format!("update failed: {e}")))
    }

    /// Hard-delete one document, returning the deleted count
    pub async fn delete_one(&self, filter: Document) -> Result<u64, TownhallError> {
        let result = self
            .inner
            .delete_one(filter)
            .await
            .map_err(|e| TownhallError::Database(format!("delete failed: {e}")))?;

        Ok(result.deleted_count)
    }

    /// Count documents matching a filter
    pub async fn count(&self, filter: Document) -> Result<u64, TownhallError> {
        self.inner
            .count_documents(filter)
            .await
            .map_err(|e| TownhallError::Database(format!("count failed: {e}")))
    }

    /// Get the underlying collection for advanced operations
    pub fn inner(&self) -> &Collection<T> {
        &self.inner
    }
}

/// Merge a `metadata.updated_at` bump into an update document's `$set`,
/// preserving whatever other operators the update carries.
fn with_updated_at(mut update: Document) -> Document {
    match update.get_document_mut("$set") {
        Ok(set) => {
            set.insert("metadata.updated_at", DateTime::now());
        }
        Err(_) => {
            update.insert("$set", doc! { "metadata.updated_at": DateTime::now() });
        }
    }
    update
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updated_at_is_merged_into_existing_set() {
        let update = with_updated_at(doc! { "$set": { "status": "Solved" } });
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("status").unwrap(), "Solved");
        assert!(set.get_datetime("metadata.updated_at").is_ok());
    }

    #[test]
    fn updated_at_is_added_alongside_other_operators() {
        let update = with_updated_at(doc! { "$addToSet": { "upvotes": 1 } });
        assert!(update.get_document("$addToSet").is_ok());
        let set = update.get_document("$set").unwrap();
        assert!(set.get_datetime("metadata.updated_at").is_ok());
    }
}
