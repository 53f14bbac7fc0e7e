//! Connection handles
//!
//! The composition root opens one handle for the live subscription and one
//! for full-collection reads, and passes them to the adapters explicitly.

use feed_core::ConnectionError;
use mongodb::bson::Document;
use mongodb::{Client, Collection};
use tracing::debug;

/// Build `<base>/<db><extra>`, tolerating a trailing slash on `base`
pub fn connection_string(base: &str, db: &str, extra: &str) -> String {
    format!("{}/{}{}", base.trim_end_matches('/'), db, extra)
}

/// A connected client bound to one collection
#[derive(Clone)]
pub struct MongoHandle {
    client: Client,
    db: String,
    collection: String,
}

impl MongoHandle {
    /// Parse the connection string and create the client.
    ///
    /// The driver connects lazily; unreachable servers surface on first use.
    pub async fn connect(
        base_uri: &str,
        extra: &str,
        db: &str,
        collection: &str,
    ) -> Result<Self, ConnectionError> {
        let uri = connection_string(base_uri, db, extra);
        debug!(db, collection, "Creating MongoDB client");

        let client = Client::with_uri_str(&uri)
            .await
            .map_err(|e| ConnectionError::Subscribe {
                target: format!("{}.{}", db, collection),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            db: db.to_string(),
            collection: collection.to_string(),
        })
    }

    pub fn collection(&self) -> Collection<Document> {
        self.client.database(&self.db).collection(&self.collection)
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// `db.collection`
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.db, self.collection)
    }
}
