use futures::TryStreamExt;
use iss_config::redact_url;
use iss_config::shared::MongoConfig;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use secrecy::ExposeSecret;
use tracing::{info, warn};

use crate::bail;
use crate::error::{ErrorKind, IssResult};
use crate::source::Source;
use crate::types::{Position, Reading, SourceId};

/// Name the driver reports to the server.
const APP_NAME: &str = "iss-replicator";

/// `message` stored with every sample, mirroring successful API responses.
const STORED_MESSAGE: &str = "success";

/// MongoDB-backed [`Source`].
///
/// Documents have the shape
/// `{ _id, message, timestamp: <i64 seconds>, iss_position: { latitude, longitude } }`.
/// Coordinates written by older pollers may be strings and are accepted on read.
#[derive(Debug, Clone)]
pub struct MongoSource {
    client: Client,
    database: Database,
    collection: Collection<Document>,
}

impl MongoSource {
    /// Connects to the document store and pings it.
    ///
    /// Fails with [`ErrorKind::SourceConnectionFailed`] when no server answers within the
    /// configured server selection timeout.
    pub async fn connect(config: &MongoConfig) -> IssResult<Self> {
        let mut options = ClientOptions::parse(config.url.expose_secret()).await?;
        options.server_selection_timeout = Some(config.server_selection_timeout());
        options.app_name = Some(APP_NAME.to_owned());

        let client = Client::with_options(options)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!(
            url = %redact_url(&config.url),
            database = %config.database,
            collection = %config.collection,
            "connected to the document store"
        );

        let database = client.database(&config.database);
        let collection = database.collection::<Document>(&config.collection);

        Ok(Self {
            client,
            database,
            collection,
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn collection(&self) -> &Collection<Document> {
        &self.collection
    }

    /// Creates an ascending index on `field_path` and returns its name.
    pub async fn create_index(&self, field_path: &str) -> IssResult<String> {
        let model = IndexModel::builder().keys(doc! { field_path: 1 }).build();
        let result = self.collection.create_index(model).await?;

        info!(index = %result.index_name, "created document store index");

        Ok(result.index_name)
    }

    /// Drops the index called `name`.
    pub async fn drop_index(&self, name: &str) -> IssResult<()> {
        self.collection.drop_index(name).await?;

        info!(index = name, "dropped document store index");

        Ok(())
    }

    /// Returns the names of the collection's indexes.
    pub async fn list_indexes(&self) -> IssResult<Vec<String>> {
        Ok(self.collection.list_index_names().await?)
    }
}

impl Source for MongoSource {
    fn name() -> &'static str {
        "mongodb"
    }

    async fn shutdown(&self) -> IssResult<()> {
        self.client.clone().shutdown().await;

        info!("document store connection closed");

        Ok(())
    }

    async fn ensure_collection(&self) -> IssResult<()> {
        let name = self.collection.name();
        let existing = self.database.list_collection_names().await?;

        if existing.iter().any(|existing| existing == name) {
            info!(collection = name, "collection already exists");
            return Ok(());
        }

        self.database.create_collection(name).await?;
        info!(collection = name, "created collection");

        Ok(())
    }

    async fn insert_position(&self, position: &Position) -> IssResult<SourceId> {
        let result = self.collection.insert_one(position_document(position)).await?;

        let id = match result.inserted_id {
            Bson::ObjectId(oid) => SourceId::new(oid.to_hex()),
            other => SourceId::new(other.to_string()),
        };

        Ok(id)
    }

    async fn read_readings(&self) -> IssResult<Vec<Reading>> {
        let cursor = self.collection.find(doc! {}).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;

        let mut readings = Vec::with_capacity(documents.len());
        for document in &documents {
            match reading_from_document(document) {
                Ok(reading) => readings.push(reading),
                Err(err) => warn!(
                    id = ?document.get("_id"),
                    error_kind = ?err.kind(),
                    detail = err.detail().unwrap_or_default(),
                    "skipping undecodable document"
                ),
            }
        }

        info!(
            documents = documents.len(),
            readings = readings.len(),
            "read readings from the document store"
        );

        Ok(readings)
    }
}

/// Builds the stored document for `position`.
pub fn position_document(position: &Position) -> Document {
    doc! {
        "message": STORED_MESSAGE,
        "timestamp": position.unix_timestamp(),
        "iss_position": {
            "latitude": position.latitude,
            "longitude": position.longitude,
        },
    }
}

/// Decodes a stored document into a [`Reading`].
pub fn reading_from_document(document: &Document) -> IssResult<Reading> {
    let id = match document.get("_id") {
        Some(Bson::ObjectId(oid)) => SourceId::new(oid.to_hex()),
        Some(Bson::String(id)) => SourceId::new(id.clone()),
        Some(other) => SourceId::new(other.to_string()),
        None => bail!(ErrorKind::InvalidData, "Stored document has no `_id`"),
    };

    let coordinates = document.get_document("iss_position")?;
    let latitude = number_field(coordinates, "latitude")?;
    let longitude = number_field(coordinates, "longitude")?;
    let seconds = number_field(document, "timestamp")? as i64;

    Ok(Reading::new(
        id,
        Position::from_unix(latitude, longitude, seconds)?,
    ))
}

fn number_field(document: &Document, key: &'static str) -> IssResult<f64> {
    match document.get(key) {
        Some(Bson::Double(value)) => Ok(*value),
        Some(Bson::Int32(value)) => Ok(f64::from(*value)),
        Some(Bson::Int64(value)) => Ok(*value as f64),
        Some(Bson::String(text)) => Ok(text.trim().parse::<f64>()?),
        Some(other) => bail!(
            ErrorKind::InvalidData,
            "Stored document field has an unexpected type",
            format!("{key} = {other}")
        ),
        None => bail!(
            ErrorKind::InvalidData,
            "Stored document field is missing",
            key
        ),
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::oid::ObjectId;
    use secrecy::SecretString;

    use super::*;
    use crate::error::ErrorCategory;

    #[tokio::test]
    async fn unreachable_servers_are_connection_failures() {
        // Nothing listens on port 1, so server selection runs out of time.
        let mut config = MongoConfig::new(SecretString::new("mongodb://127.0.0.1:1/".to_owned()));
        config.server_selection_timeout_ms = 200;

        let err = MongoSource::connect(&config).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SourceConnectionFailed);
        assert_eq!(err.category(), ErrorCategory::Connection);
        assert!(err.detail().unwrap().contains("Server selection timeout"));
    }

    #[test]
    fn stored_documents_round_trip_through_readings() {
        let position = Position::from_unix(48.85, 2.35, 1_700_000_000).unwrap();
        let oid = ObjectId::new();

        let mut document = position_document(&position);
        document.insert("_id", oid);

        let reading = reading_from_document(&document).unwrap();

        assert_eq!(reading.id.as_str(), oid.to_hex());
        assert_eq!(reading.position, position);
    }

    #[test]
    fn raw_api_documents_with_string_coordinates_are_decoded() {
        let document = doc! {
            "_id": "legacy-1",
            "message": "success",
            "timestamp": 1_700_000_000_i32,
            "iss_position": { "latitude": "-12.5", "longitude": "100.25" },
        };

        let reading = reading_from_document(&document).unwrap();

        assert_eq!(reading.id.as_str(), "legacy-1");
        assert_eq!(reading.position.latitude, -12.5);
        assert_eq!(reading.position.longitude, 100.25);
    }

    #[test]
    fn documents_without_coordinates_are_invalid() {
        let document = doc! { "_id": "broken", "timestamp": 1 };

        let err = reading_from_document(&document).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
