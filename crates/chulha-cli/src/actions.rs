// SPDX-License-Identifier: Apache-2.0

use crate::commands::{CollectionCommand, DetailsCommand, ReservationCommand};
use crate::{store_error, CliError, OutputMode};
use chulha_model::collections::{self, ReservationStatus};
use chulha_model::{
    BasicDetails, CollectionSpec, DocumentId, FieldKind, FieldValue, Record,
    RecordCodec, SortKey,
};
use chulha_store::{
    BasicDetailsRepository, HttpUploadGateway, LiveCollectionStore, LocalAsset,
    LocalFsDocumentStore, OperationStage, StoreConfig, StoreErrorCode,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

pub(crate) struct Context {
    backend: Arc<LocalFsDocumentStore>,
    store: LiveCollectionStore,
    output: OutputMode,
}

impl Context {
    pub(crate) async fn open(config: StoreConfig, output: OutputMode) -> Result<Self, CliError> {
        let backend = Arc::new(
            LocalFsDocumentStore::open(&config.data_root)
                .await
                .map_err(|e| {
                    store_error(
                        StoreErrorCode::StoreUnavailable,
                        OperationStage::Query,
                        e.to_string(),
                    )
                })?,
        );
        let mut store = LiveCollectionStore::new(backend.clone())
            .with_allocation_strategy(config.id_strategy);
        if let Some(upload) = config.upload.clone() {
            store = store.with_upload_gateway(Arc::new(HttpUploadGateway::new(upload)));
        }
        info!(data_root = %config.data_root.display(), strategy = config.id_strategy.as_str(), "store ready");
        Ok(Self {
            backend,
            store,
            output,
        })
    }

    pub(crate) async fn run_collection(
        &self,
        name: &str,
        command: CollectionCommand,
    ) -> Result<(), CliError> {
        let spec = collection_spec(name)?;
        match command {
            CollectionCommand::List { sort, desc, search } => {
                let field = sort.unwrap_or_else(|| spec.default_sort().field.clone());
                let key = if desc {
                    SortKey::descending(&field)
                } else {
                    SortKey::ascending(&field)
                };
                let mut records = self.store.fetch_once(&spec, &key).await?;
                if let Some(query) = search {
                    records.retain(|r| collections::matches_search(&spec, r, &query));
                }
                self.print_records(&spec, &records);
                Ok(())
            }
            CollectionCommand::Add { fields, image } => {
                let fields = typed_fields(&spec, fields)?;
                let asset = image.map(LocalAsset::from_path);
                let record = self.store.insert(&spec, fields, asset).await?;
                self.print_written("added", &spec, &record);
                Ok(())
            }
            CollectionCommand::Remove { id } => {
                let id = document_id(&id)?;
                self.store.remove(&spec, &id).await?;
                if self.output.json {
                    println!("{}", json!({ "removed": id.as_str() }));
                } else {
                    println!("removed {id}");
                }
                Ok(())
            }
            CollectionCommand::Update { id, fields } => {
                let id = document_id(&id)?;
                if fields.is_empty() {
                    return Err(CliError::usage("update needs at least one --set name=value"));
                }
                let fields = typed_fields(&spec, fields)?;
                let record = self.store.update(&spec, &id, fields).await?;
                self.print_written("updated", &spec, &record);
                Ok(())
            }
        }
    }

    pub(crate) async fn run_reservations(
        &self,
        command: ReservationCommand,
    ) -> Result<(), CliError> {
        let (id, target) = match command {
            ReservationCommand::Records(command) => {
                return self.run_collection("reservations", command).await;
            }
            ReservationCommand::Approve { id } => (id, ReservationStatus::Confirmed),
            ReservationCommand::Reject { id } => (id, ReservationStatus::Cancelled),
        };
        let spec = collection_spec("reservations")?;
        let id = document_id(&id)?;
        let record = self
            .store
            .set_reservation_status(&spec, &id, target)
            .await?;
        self.print_written(&target.as_str().to_ascii_lowercase(), &spec, &record);
        Ok(())
    }

    pub(crate) async fn watch(
        &self,
        name: &str,
        limit: Option<u64>,
        poll_ms: u64,
    ) -> Result<(), CliError> {
        let spec = collection_spec(name)?;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let printer_spec = spec.clone();
        let json = self.output.json;
        let handle = self
            .store
            .open(&spec, spec.default_sort(), move |records: &[Record]| {
                if json {
                    let rows: Vec<Value> =
                        records.iter().map(|r| record_json(&printer_spec, r)).collect();
                    println!("{}", Value::Array(rows));
                } else {
                    println!("{} records", records.len());
                }
                let _ = tx.send(());
            })
            .await?;

        let mut ticker = tokio::time::interval(Duration::from_millis(poll_ms.max(10)));
        let mut seen = 0u64;
        let outcome = loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break Ok(()),
                delivered = rx.recv() => {
                    if delivered.is_none() {
                        break Ok(());
                    }
                    seen += 1;
                    if limit.is_some_and(|l| seen >= l) {
                        break Ok(());
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.backend.reload().await {
                        break Err(store_error(
                            StoreErrorCode::StoreUnavailable,
                            OperationStage::Subscribe,
                            e.to_string(),
                        ));
                    }
                }
            }
        };
        self.store.close(&handle).await;
        outcome
    }

    pub(crate) async fn run_details(&self, command: DetailsCommand) -> Result<(), CliError> {
        let repo = BasicDetailsRepository::new(self.backend.clone())?;
        match command {
            DetailsCommand::Show => {
                let details = repo.fetch().await?;
                match details {
                    Some(details) => print_details(&details, self.output)?,
                    None if self.output.json => println!("null"),
                    None => println!("no details saved"),
                }
                Ok(())
            }
            DetailsCommand::Import { path } => {
                let raw = tokio::fs::read(&path).await.map_err(|e| {
                    CliError::validation(&format!("cannot read {}: {e}", path.display()))
                })?;
                let fields: Map<String, Value> = serde_json::from_slice(&raw).map_err(|e| {
                    CliError::validation(&format!("{} is not a JSON object: {e}", path.display()))
                })?;
                let details = BasicDetails::from_fields(fields)
                    .map_err(|e| CliError::validation(&e.to_string()))?;
                let saved = repo.save(&details).await?;
                print_details(&saved, self.output)
            }
        }
    }

    fn print_records(&self, spec: &CollectionSpec, records: &[Record]) {
        if self.output.json {
            let rows: Vec<Value> = records.iter().map(|r| record_json(spec, r)).collect();
            println!("{}", Value::Array(rows));
            return;
        }
        for record in records {
            println!("{}", record_line(record));
        }
    }

    fn print_written(&self, verb: &str, spec: &CollectionSpec, record: &Record) {
        if self.output.json {
            println!("{}", record_json(spec, record));
        } else {
            println!("{verb} {}", record_line(record));
        }
    }
}

fn collection_spec(name: &str) -> Result<CollectionSpec, CliError> {
    collections::by_name(name)
        .map_err(|e| CliError::internal(e.to_string()))?
        .ok_or_else(|| CliError::usage(&format!("unknown collection `{name}`")))
}

fn document_id(raw: &str) -> Result<DocumentId, CliError> {
    DocumentId::parse(raw).map_err(|e| CliError::validation(&e.to_string()))
}

/// Converts `--set` pairs using the kinds the collection declares.
/// Undeclared names are kept as text.
pub(crate) fn typed_fields(
    spec: &CollectionSpec,
    pairs: Vec<(String, String)>,
) -> Result<BTreeMap<String, FieldValue>, CliError> {
    let mut out = BTreeMap::new();
    for (name, raw) in pairs {
        let kind = spec
            .layout()
            .field_spec(&name)
            .map_or(FieldKind::Text, |s| s.kind);
        let invalid = || {
            CliError::validation(&format!("field `{name}` expects {kind}, got `{raw}`"))
                .with_detail("field", &name)
        };
        let value = match kind {
            FieldKind::Text => FieldValue::Text(raw.clone()),
            FieldKind::Integer => FieldValue::Integer(raw.trim().parse().map_err(|_| invalid())?),
            FieldKind::Float => FieldValue::Float(raw.trim().parse().map_err(|_| invalid())?),
            FieldKind::Bool => FieldValue::Bool(raw.trim().parse().map_err(|_| invalid())?),
        };
        out.insert(name, value);
    }
    Ok(out)
}

fn record_json(spec: &CollectionSpec, record: &Record) -> Value {
    let doc = RecordCodec::new(spec.layout()).encode(record);
    let mut fields = doc.fields;
    fields.insert(
        "id".to_string(),
        doc.id
            .map_or(Value::Null, |id| Value::String(id.as_str().to_string())),
    );
    Value::Object(fields)
}

fn record_line(record: &Record) -> String {
    let seq = record
        .sequential_id
        .map_or_else(|| "-".to_string(), |s| s.to_string());
    let id = record.id.as_ref().map_or("-", DocumentId::as_str);
    let fields: Vec<String> = record
        .fields
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    format!("#{seq}\t{id}\t{}", fields.join(" "))
}

fn print_details(details: &BasicDetails, output: OutputMode) -> Result<(), CliError> {
    let fields = details
        .to_fields()
        .map_err(|e| CliError::internal(e.to_string()))?;
    if output.json {
        println!("{}", Value::Object(fields));
    } else {
        for (name, value) in fields {
            println!("{name}: {value}");
        }
    }
    Ok(())
}
