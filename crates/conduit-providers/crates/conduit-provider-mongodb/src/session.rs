//! MongoDB session wrapper

use bson::{Document, doc};
use conduit_core::mongo_script::{MongoCall, MongoScript, MongoVerb};
use conduit_core::{
    CONNECT_TIMEOUT, ConduitError, ConnectionConfig, Credential, Endpoint, ExecOutput,
    MetadataNode, NodeKind, Result,
};
use futures::TryStreamExt;
use mongodb::options::{
    ClientOptions, Credential as MongoCredential, ServerAddress, Tls, TlsOptions,
};
use mongodb::{Client, Collection};
use serde_json::json;

use crate::convert::{bson_to_json, document_to_json, json_to_document, json_to_documents};

const FALLBACK_DATABASE: &str = "test";

/// One MongoDB client bound to a default database
pub struct MongoDbSession {
    client: Client,
    default_database: String,
}

impl MongoDbSession {
    /// Build the client and `ping` through server selection
    #[tracing::instrument(skip(config, credential, endpoint), fields(host = %endpoint.host, port = endpoint.port))]
    pub async fn connect(
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<Self> {
        let mut options = ClientOptions::default();
        options.hosts = vec![ServerAddress::Tcp {
            host: endpoint.host.clone(),
            port: Some(endpoint.port),
        }];
        options.app_name = Some("conduit".to_string());
        options.connect_timeout = Some(CONNECT_TIMEOUT);
        options.server_selection_timeout = Some(CONNECT_TIMEOUT);
        // a tunnel or single host is dialed directly rather than via replica set discovery
        options.direct_connection = Some(true);
        if config.ssl {
            options.tls = Some(Tls::Enabled(TlsOptions::default()));
        }
        if let Some(user) = credential.resolve_username(config.username.as_deref()) {
            let mut mongo_credential = MongoCredential::default();
            mongo_credential.username = Some(user.to_string());
            mongo_credential.password = credential.password.clone();
            let source = config.param("authSource").unwrap_or("admin");
            mongo_credential.source = Some(source.to_string());
            options.credential = Some(mongo_credential);
        }

        let client = Client::with_options(options)
            .map_err(|e| ConduitError::Connect(format!("Failed to create MongoDB client: {}", e)))?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| ConduitError::Connect(format!("Failed to connect to MongoDB: {}", e)))?;

        let default_database = config
            .database
            .clone()
            .filter(|db| !db.is_empty())
            .unwrap_or_else(|| FALLBACK_DATABASE.to_string());
        tracing::info!(database = %default_database, "MongoDB connection established");
        Ok(Self {
            client,
            default_database,
        })
    }

    pub fn default_database(&self) -> &str {
        &self.default_database
    }

    /// Run every call in order; the last call's result is returned
    ///
    /// Each call runs against the database its script selected at that
    /// point, else `target`, else the connection default.
    pub async fn run_script(
        &self,
        script: MongoScript,
        target: Option<&str>,
    ) -> Result<ExecOutput> {
        let fallback = target
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.default_database)
            .to_string();

        let final_database = script.database.clone().unwrap_or_else(|| fallback.clone());
        let mut output = ExecOutput::Json(json!({ "database": final_database, "calls": 0 }));
        for (index, call) in script.calls.into_iter().enumerate() {
            let database = call.database.as_deref().unwrap_or(&fallback);
            let collection = self
                .client
                .database(database)
                .collection::<Document>(&call.collection);
            let verb = call.verb;
            output = run_call(&collection, call).await.map_err(|e| {
                tracing::error!(error = %e, call = index + 1, ?verb, "MongoDB call failed");
                ConduitError::Exec(format!("call {} ({:?}) failed: {}", index + 1, verb, e))
            })?;
        }
        Ok(output)
    }

    /// Databases, each listing its collections
    pub async fn metadata(&self) -> Result<Vec<MetadataNode>> {
        let names = self
            .client
            .list_database_names()
            .await
            .map_err(|e| ConduitError::Exec(e.to_string()))?;

        let mut nodes = Vec::with_capacity(names.len());
        for name in names {
            let mut collections = self
                .client
                .database(&name)
                .list_collection_names()
                .await
                .map_err(|e| ConduitError::Exec(e.to_string()))?;
            collections.sort();
            let children = collections
                .into_iter()
                .map(|c| MetadataNode::leaf(c, NodeKind::Collection))
                .collect();
            nodes.push(MetadataNode::branch(name, NodeKind::Database, children));
        }
        Ok(nodes)
    }

    pub async fn close(&self) {
        self.client.clone().shutdown().immediate(true).await;
    }
}

async fn run_call(collection: &Collection<Document>, call: MongoCall) -> Result<ExecOutput> {
    let driver_error = |e: mongodb::error::Error| ConduitError::Exec(e.to_string());

    match call.verb {
        MongoVerb::Find => {
            let filter = json_to_document(call.arg_or_empty(0))?;
            let mut find = collection.find(filter);
            if let Some(projection) = call.args.get(1) {
                find = find.projection(json_to_document(projection.clone())?);
            }
            if let Some(sort) = call.modifiers.sort.clone() {
                find = find.sort(json_to_document(sort)?);
            }
            if let Some(limit) = call.modifiers.limit {
                find = find.limit(limit);
            }
            if let Some(skip) = call.modifiers.skip {
                find = find.skip(skip);
            }
            let docs: Vec<Document> = find
                .await
                .map_err(driver_error)?
                .try_collect()
                .await
                .map_err(driver_error)?;
            Ok(ExecOutput::Documents(
                docs.into_iter().map(document_to_json).collect(),
            ))
        }
        MongoVerb::Aggregate => {
            let pipeline = json_to_documents(call.arg_or_empty(0))?;
            let docs: Vec<Document> = collection
                .aggregate(pipeline)
                .await
                .map_err(driver_error)?
                .try_collect()
                .await
                .map_err(driver_error)?;
            Ok(ExecOutput::Documents(
                docs.into_iter().map(document_to_json).collect(),
            ))
        }
        MongoVerb::InsertOne => {
            let result = collection
                .insert_one(json_to_document(call.arg_or_empty(0))?)
                .await
                .map_err(driver_error)?;
            Ok(ExecOutput::Json(
                json!({ "insertedId": bson_to_json(result.inserted_id) }),
            ))
        }
        MongoVerb::InsertMany => {
            let docs = json_to_documents(call.arg_or_empty(0))?;
            let result = collection.insert_many(docs).await.map_err(driver_error)?;
            let mut ids: Vec<(usize, bson::Bson)> = result.inserted_ids.into_iter().collect();
            ids.sort_by_key(|(idx, _)| *idx);
            Ok(ExecOutput::Json(json!({
                "insertedCount": ids.len(),
                "insertedIds": ids.into_iter().map(|(_, id)| bson_to_json(id)).collect::<Vec<_>>(),
            })))
        }
        MongoVerb::UpdateOne | MongoVerb::UpdateMany => {
            let filter = json_to_document(call.arg_or_empty(0))?;
            let update = json_to_document(call.arg_or_empty(1))?;
            let upsert = call
                .args
                .get(2)
                .and_then(|options| options.get("upsert"))
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let result = if call.verb == MongoVerb::UpdateOne {
                collection.update_one(filter, update).upsert(upsert).await
            } else {
                collection.update_many(filter, update).upsert(upsert).await
            }
            .map_err(driver_error)?;
            Ok(ExecOutput::Json(json!({
                "matchedCount": result.matched_count,
                "modifiedCount": result.modified_count,
                "upsertedId": result.upserted_id.map(bson_to_json),
            })))
        }
        MongoVerb::DeleteOne | MongoVerb::DeleteMany => {
            let filter = json_to_document(call.arg_or_empty(0))?;
            let result = if call.verb == MongoVerb::DeleteOne {
                collection.delete_one(filter).await
            } else {
                collection.delete_many(filter).await
            }
            .map_err(driver_error)?;
            Ok(ExecOutput::Json(json!({ "deletedCount": result.deleted_count })))
        }
        MongoVerb::CountDocuments => {
            let filter = json_to_document(call.arg_or_empty(0))?;
            let count = collection
                .count_documents(filter)
                .await
                .map_err(driver_error)?;
            Ok(ExecOutput::Json(json!({ "count": count })))
        }
    }
}
