#![forbid(unsafe_code)]

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use crm_kernel_contracts::audit::{AuditAction, AuditRowInput};
use crm_kernel_contracts::contact::{ContactId, ContactInput, ContactRecord};
use crm_kernel_contracts::contactfield::{
    ContactFieldRequest, ContactFieldResponse, ContactFieldRuntimeRequest, FieldData, FieldKind,
    FieldTypeCreateRequest, FieldTypeDefinition, FieldTypeId, FieldValue,
    FieldValueCreateRequest, FieldValueId, FieldValueUpdateRequest,
};
use crm_kernel_contracts::tenant::{SessionToken, TenantId, UserId};
use crm_kernel_contracts::MonotonicTimeNs;
use crm_os::contactfield::ContactFieldRuntime;
use crm_storage::audit::AuditWriter;
use crm_storage::store::{CrmStore, SessionRecord, StorageError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub mod config;
pub mod error;
pub mod http;

pub use config::AdapterConfig;
pub use error::AdapterError;

pub mod reason_codes {
    use crm_kernel_contracts::ReasonCodeId;

    pub const ADAPTER_OK_CREATE_CONTACT: ReasonCodeId = ReasonCodeId(0xAD70_0001);
}

const JOURNAL_SCHEMA_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactCreateAdapterRequest {
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValueAdapterRequest {
    pub contact_field_type_id: u64,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTypeAdapterRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactAdapterDto {
    pub id: u64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub display_name: String,
    pub created_at_ns: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValueAdapterDto {
    pub id: u64,
    pub contact_id: u64,
    pub contact_field_type_id: u64,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    pub created_at_ns: u64,
    pub updated_at_ns: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTypeAdapterDto {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedAdapterDto {
    pub status: String,
    pub deleted: u64,
}

impl DeletedAdapterDto {
    fn ok(deleted: u64) -> Self {
        Self {
            status: "ok".to_string(),
            deleted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterHealthResponse {
    pub status: String,
    pub persistence_enabled: bool,
}

/// The caller identity resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterPrincipal {
    pub tenant_id: TenantId,
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct AdapterRuntime {
    store: Arc<Mutex<CrmStore>>,
    contact_fields: ContactFieldRuntime,
    persistence: Option<AdapterPersistenceConfig>,
}

#[derive(Debug, Clone)]
struct AdapterPersistenceConfig {
    journal_path: PathBuf,
}

/// One applied mutation. Ids are not recorded for creates; replay into an
/// empty store allocates the same ids in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct AdapterJournalEntry {
    schema_version: u8,
    now_ns: u64,
    tenant_id: String,
    actor_user_id: String,
    op: AdapterJournalOp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum AdapterJournalOp {
    CreateContact {
        first_name: String,
        last_name: Option<String>,
    },
    CreateFieldType {
        name: String,
        kind: String,
        protocol: Option<String>,
    },
    DeleteFieldType {
        field_type_id: u64,
    },
    CreateFieldValue {
        contact_id: u64,
        field_type_id: u64,
        data: String,
    },
    UpdateFieldValue {
        contact_id: u64,
        field_value_id: u64,
        field_type_id: u64,
        data: String,
    },
    DeleteFieldValue {
        contact_id: u64,
        field_value_id: u64,
    },
}

impl AdapterJournalEntry {
    fn v1(now: MonotonicTimeNs, principal: &AdapterPrincipal, op: AdapterJournalOp) -> Self {
        Self {
            schema_version: JOURNAL_SCHEMA_VERSION,
            now_ns: now.0,
            tenant_id: principal.tenant_id.as_str().to_string(),
            actor_user_id: principal.user_id.as_str().to_string(),
            op,
        }
    }
}

enum AdapterOutcome {
    Contact(ContactRecord),
    Field(ContactFieldResponse),
}

impl Default for AdapterRuntime {
    fn default() -> Self {
        Self::new(Arc::new(Mutex::new(CrmStore::new_in_memory())))
    }
}

impl AdapterRuntime {
    pub fn new(store: Arc<Mutex<CrmStore>>) -> Self {
        Self {
            store,
            contact_fields: ContactFieldRuntime,
            persistence: None,
        }
    }

    pub fn new_with_persistence(
        store: Arc<Mutex<CrmStore>>,
        journal_path: PathBuf,
    ) -> Result<Self, String> {
        let runtime = Self {
            store,
            contact_fields: ContactFieldRuntime,
            persistence: Some(AdapterPersistenceConfig { journal_path }),
        };
        runtime.ensure_persistence_ready()?;
        runtime.replay_journal_into_store()?;
        Ok(runtime)
    }

    pub fn from_config(config: &AdapterConfig) -> Result<Self, String> {
        let store = Arc::new(Mutex::new(CrmStore::new_in_memory()));
        let runtime = match &config.journal_path {
            Some(path) => Self::new_with_persistence(store, path.clone())?,
            None => Self::new(store),
        };
        let now = MonotonicTimeNs(system_time_now_ns());
        for seed in &config.sessions {
            runtime
                .open_session(
                    seed.token.clone(),
                    seed.tenant_id.clone(),
                    seed.user_id.clone(),
                    now,
                )
                .map_err(|err| format!("failed to open bootstrap session: {err}"))?;
        }
        info!(
            sessions = config.sessions.len(),
            persistence_enabled = runtime.persistence.is_some(),
            "adapter runtime ready"
        );
        Ok(runtime)
    }

    pub fn health_report(&self) -> Result<AdapterHealthResponse, AdapterError> {
        let _store = self.lock_store()?;
        Ok(AdapterHealthResponse {
            status: "ok".to_string(),
            persistence_enabled: self.persistence.is_some(),
        })
    }

    /// Registers a session. Sessions are owned by the external session layer
    /// and are not journaled.
    pub fn open_session(
        &self,
        token: SessionToken,
        tenant_id: TenantId,
        user_id: UserId,
        now: MonotonicTimeNs,
    ) -> Result<(), AdapterError> {
        let record = SessionRecord::v1(token, tenant_id, user_id, now)
            .map_err(StorageError::from)?;
        let mut store = self.lock_store()?;
        store.insert_session_record(record)?;
        Ok(())
    }

    /// Resolves an `Authorization` header value to the session's tenant and user.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<AdapterPrincipal, AdapterError> {
        let raw = authorization
            .and_then(|v| v.trim().strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(AdapterError::Unauthenticated)?;
        let token = SessionToken::new(raw).map_err(|_| AdapterError::Unauthenticated)?;
        let store = self.lock_store()?;
        let session = store
            .session_record(&token)
            .ok_or(AdapterError::Unauthenticated)?;
        Ok(AdapterPrincipal {
            tenant_id: session.tenant_id.clone(),
            user_id: session.user_id.clone(),
        })
    }

    pub fn create_contact(
        &self,
        principal: &AdapterPrincipal,
        request: ContactCreateAdapterRequest,
    ) -> Result<ContactAdapterDto, AdapterError> {
        let op = AdapterJournalOp::CreateContact {
            first_name: request.first_name,
            last_name: request.last_name,
        };
        match self.apply_and_journal(principal, op)? {
            AdapterOutcome::Contact(record) => Ok(contact_to_dto(&record)),
            AdapterOutcome::Field(_) => Err(unexpected_outcome()),
        }
    }

    pub fn list_field_values(
        &self,
        principal: &AdapterPrincipal,
        contact_id: u64,
    ) -> Result<Vec<FieldValueAdapterDto>, AdapterError> {
        let contact_id = path_contact_id(contact_id)?;
        let mut store = self.lock_store()?;
        let out = self.run_field_request(
            &mut store,
            MonotonicTimeNs(system_time_now_ns()),
            principal,
            ContactFieldRequest::ListValues { contact_id },
        )?;
        match out {
            ContactFieldResponse::Values(values) => Ok(values
                .iter()
                .map(|v| field_value_to_dto(&store, v))
                .collect()),
            _ => Err(unexpected_outcome()),
        }
    }

    /// The tenant's field type catalog, reached through one of its contacts.
    pub fn list_field_types(
        &self,
        principal: &AdapterPrincipal,
        contact_id: u64,
    ) -> Result<Vec<FieldTypeAdapterDto>, AdapterError> {
        let contact_id = path_contact_id(contact_id)?;
        let mut store = self.lock_store()?;
        store.scope(&principal.tenant_id).contact(contact_id)?;
        let out = self.run_field_request(
            &mut store,
            MonotonicTimeNs(system_time_now_ns()),
            principal,
            ContactFieldRequest::ListTypes,
        )?;
        match out {
            ContactFieldResponse::Types(types) => Ok(types.iter().map(field_type_to_dto).collect()),
            _ => Err(unexpected_outcome()),
        }
    }

    pub fn create_field_value(
        &self,
        principal: &AdapterPrincipal,
        contact_id: u64,
        request: FieldValueAdapterRequest,
    ) -> Result<FieldValueAdapterDto, AdapterError> {
        path_contact_id(contact_id)?;
        let op = AdapterJournalOp::CreateFieldValue {
            contact_id,
            field_type_id: request.contact_field_type_id,
            data: request.data,
        };
        self.apply_field_value_op(principal, op)
    }

    pub fn update_field_value(
        &self,
        principal: &AdapterPrincipal,
        contact_id: u64,
        field_value_id: u64,
        request: FieldValueAdapterRequest,
    ) -> Result<FieldValueAdapterDto, AdapterError> {
        path_contact_id(contact_id)?;
        path_field_value_id(field_value_id)?;
        let op = AdapterJournalOp::UpdateFieldValue {
            contact_id,
            field_value_id,
            field_type_id: request.contact_field_type_id,
            data: request.data,
        };
        self.apply_field_value_op(principal, op)
    }

    pub fn delete_field_value(
        &self,
        principal: &AdapterPrincipal,
        contact_id: u64,
        field_value_id: u64,
    ) -> Result<DeletedAdapterDto, AdapterError> {
        path_contact_id(contact_id)?;
        path_field_value_id(field_value_id)?;
        let op = AdapterJournalOp::DeleteFieldValue {
            contact_id,
            field_value_id,
        };
        match self.apply_and_journal(principal, op)? {
            AdapterOutcome::Field(ContactFieldResponse::ValueDeleted(id)) => {
                Ok(DeletedAdapterDto::ok(id.get()))
            }
            _ => Err(unexpected_outcome()),
        }
    }

    pub fn create_field_type(
        &self,
        principal: &AdapterPrincipal,
        request: FieldTypeAdapterRequest,
    ) -> Result<FieldTypeAdapterDto, AdapterError> {
        let op = AdapterJournalOp::CreateFieldType {
            name: request.name,
            kind: request.kind,
            protocol: request.protocol,
        };
        match self.apply_and_journal(principal, op)? {
            AdapterOutcome::Field(ContactFieldResponse::TypeCreated(t)) => Ok(field_type_to_dto(&t)),
            _ => Err(unexpected_outcome()),
        }
    }

    pub fn delete_field_type(
        &self,
        principal: &AdapterPrincipal,
        field_type_id: u64,
    ) -> Result<DeletedAdapterDto, AdapterError> {
        FieldTypeId::new(field_type_id).map_err(|_| AdapterError::NotFound)?;
        let op = AdapterJournalOp::DeleteFieldType { field_type_id };
        match self.apply_and_journal(principal, op)? {
            AdapterOutcome::Field(ContactFieldResponse::TypeDeleted(id)) => {
                Ok(DeletedAdapterDto::ok(id.get()))
            }
            _ => Err(unexpected_outcome()),
        }
    }

    fn apply_field_value_op(
        &self,
        principal: &AdapterPrincipal,
        op: AdapterJournalOp,
    ) -> Result<FieldValueAdapterDto, AdapterError> {
        let (store, outcome) = self.commit(principal, op)?;
        match outcome {
            AdapterOutcome::Field(
                ContactFieldResponse::ValueCreated(v) | ContactFieldResponse::ValueUpdated(v),
            ) => Ok(field_value_to_dto(&store, &v)),
            _ => Err(unexpected_outcome()),
        }
    }

    fn apply_and_journal(
        &self,
        principal: &AdapterPrincipal,
        op: AdapterJournalOp,
    ) -> Result<AdapterOutcome, AdapterError> {
        self.commit(principal, op).map(|(_, outcome)| outcome)
    }

    /// Applies `op` and makes it durable. With persistence on, the mutation
    /// runs against a staged copy and only replaces the live store once its
    /// journal line is written, so memory never holds a row replay cannot
    /// rebuild. The lock is held throughout, keeping journal order equal to
    /// apply order.
    fn commit(
        &self,
        principal: &AdapterPrincipal,
        op: AdapterJournalOp,
    ) -> Result<(MutexGuard<'_, CrmStore>, AdapterOutcome), AdapterError> {
        let mut store = self.lock_store()?;
        let now = MonotonicTimeNs(system_time_now_ns());
        if self.persistence.is_none() {
            let outcome = self.apply(&mut store, now, principal, &op)?;
            return Ok((store, outcome));
        }
        let mut staged = CrmStore::clone(&store);
        let outcome = self.apply(&mut staged, now, principal, &op)?;
        self.append_journal_entry(AdapterJournalEntry::v1(now, principal, op))?;
        *store = staged;
        Ok((store, outcome))
    }

    fn apply(
        &self,
        store: &mut CrmStore,
        now: MonotonicTimeNs,
        principal: &AdapterPrincipal,
        op: &AdapterJournalOp,
    ) -> Result<AdapterOutcome, StorageError> {
        let request = match op {
            AdapterJournalOp::CreateContact {
                first_name,
                last_name,
            } => {
                let input = ContactInput::v1(
                    principal.tenant_id.clone(),
                    first_name.clone(),
                    last_name.clone(),
                )?;
                let record = store.insert_contact(now, input)?;
                let audit = AuditRowInput::v1(
                    now,
                    principal.tenant_id.clone(),
                    principal.user_id.clone(),
                    AuditAction::ContactCreate,
                    format!("contacts:{}", record.contact_id.get()),
                    reason_codes::ADAPTER_OK_CREATE_CONTACT,
                )?;
                AuditWriter::emit(store, audit)?;
                return Ok(AdapterOutcome::Contact(record));
            }
            AdapterJournalOp::CreateFieldType {
                name,
                kind,
                protocol,
            } => ContactFieldRequest::CreateType(FieldTypeCreateRequest {
                name: name.clone(),
                kind: FieldKind::parse(kind)?,
                protocol: protocol.clone(),
            }),
            AdapterJournalOp::DeleteFieldType { field_type_id } => {
                ContactFieldRequest::DeleteType {
                    field_type_id: FieldTypeId::new(*field_type_id)?,
                }
            }
            AdapterJournalOp::CreateFieldValue {
                contact_id,
                field_type_id,
                data,
            } => ContactFieldRequest::CreateValue(FieldValueCreateRequest {
                contact_id: ContactId::new(*contact_id)?,
                field_type_id: FieldTypeId::new(*field_type_id)?,
                data: data.clone(),
            }),
            AdapterJournalOp::UpdateFieldValue {
                contact_id,
                field_value_id,
                field_type_id,
                data,
            } => ContactFieldRequest::UpdateValue(FieldValueUpdateRequest {
                contact_id: Some(ContactId::new(*contact_id)?),
                field_value_id: FieldValueId::new(*field_value_id)?,
                field_type_id: FieldTypeId::new(*field_type_id)?,
                data: data.clone(),
            }),
            AdapterJournalOp::DeleteFieldValue {
                contact_id,
                field_value_id,
            } => ContactFieldRequest::DeleteValue {
                contact_id: Some(ContactId::new(*contact_id)?),
                field_value_id: FieldValueId::new(*field_value_id)?,
            },
        };
        self.run_field_request(store, now, principal, request)
            .map(AdapterOutcome::Field)
    }

    fn run_field_request(
        &self,
        store: &mut CrmStore,
        now: MonotonicTimeNs,
        principal: &AdapterPrincipal,
        request: ContactFieldRequest,
    ) -> Result<ContactFieldResponse, StorageError> {
        let req = ContactFieldRuntimeRequest::v1(
            now,
            principal.user_id.clone(),
            principal.tenant_id.clone(),
            request,
        )?;
        self.contact_fields.run(store, &req)
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, CrmStore>, AdapterError> {
        self.store.lock().map_err(|_| AdapterError::lock_poisoned())
    }

    fn journal_path(&self) -> Option<&Path> {
        self.persistence.as_ref().map(|p| p.journal_path.as_path())
    }

    fn ensure_persistence_ready(&self) -> Result<(), String> {
        let Some(path) = self.journal_path() else {
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|err| {
                format!("contact field journal directory '{}': {err}", dir.display())
            })?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| format!("contact field journal '{}': {err}", path.display()))?;
        Ok(())
    }

    fn replay_journal_into_store(&self) -> Result<(), String> {
        let Some(path) = self.journal_path() else {
            return Ok(());
        };
        let at = |line_no: usize| format!("contact field journal '{}' line {}", path.display(), line_no + 1);
        let file = File::open(path)
            .map_err(|err| format!("contact field journal '{}': {err}", path.display()))?;
        let mut store = self
            .store
            .lock()
            .map_err(|_| "adapter store lock poisoned".to_string())?;

        let mut replayed = 0usize;
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|err| format!("{}: {err}", at(line_no)))?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AdapterJournalEntry = serde_json::from_str(&line)
                .map_err(|err| format!("{}: malformed entry: {err}", at(line_no)))?;
            if entry.schema_version != JOURNAL_SCHEMA_VERSION {
                return Err(format!(
                    "{}: unsupported schema_version={}",
                    at(line_no),
                    entry.schema_version
                ));
            }
            let principal = AdapterPrincipal {
                tenant_id: TenantId::new(entry.tenant_id)
                    .map_err(|err| format!("{}: {err}", at(line_no)))?,
                user_id: UserId::new(entry.actor_user_id)
                    .map_err(|err| format!("{}: {err}", at(line_no)))?,
            };
            self.apply(&mut store, MonotonicTimeNs(entry.now_ns), &principal, &entry.op)
                .map_err(|err| format!("{}: replay rejected: {err}", at(line_no)))?;
            replayed += 1;
        }
        info!(
            entries = replayed,
            path = %path.display(),
            "contact field journal replayed"
        );
        Ok(())
    }

    /// Appends one line and syncs it. A failed write is cut back to the
    /// previous length so the journal never ends in a torn line.
    fn append_journal_entry(&self, entry: AdapterJournalEntry) -> Result<(), AdapterError> {
        let Some(path) = self.journal_path() else {
            return Ok(());
        };
        let mut line = serde_json::to_string(&entry).map_err(|err| {
            AdapterError::Internal(format!("contact field journal entry encode: {err}"))
        })?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| {
                AdapterError::Internal(format!(
                    "contact field journal '{}' open: {err}",
                    path.display()
                ))
            })?;
        let committed_len = file.metadata().map(|m| m.len()).map_err(|err| {
            AdapterError::Internal(format!(
                "contact field journal '{}' stat: {err}",
                path.display()
            ))
        })?;
        if let Err(err) = file
            .write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
        {
            warn!(error = %err, path = %path.display(), "contact field journal append failed");
            let _ = file.set_len(committed_len);
            return Err(AdapterError::Internal(format!(
                "contact field journal '{}' write: {err}",
                path.display()
            )));
        }
        Ok(())
    }
}

fn path_contact_id(raw: u64) -> Result<ContactId, AdapterError> {
    ContactId::new(raw).map_err(|_| AdapterError::NotFound)
}

fn path_field_value_id(raw: u64) -> Result<FieldValueId, AdapterError> {
    FieldValueId::new(raw).map_err(|_| AdapterError::NotFound)
}

fn unexpected_outcome() -> AdapterError {
    AdapterError::Internal("unexpected contact field outcome".to_string())
}

fn contact_to_dto(record: &ContactRecord) -> ContactAdapterDto {
    ContactAdapterDto {
        id: record.contact_id.get(),
        first_name: record.first_name.clone(),
        last_name: record.last_name.clone(),
        display_name: record.display_name(),
        created_at_ns: record.created_at.0,
    }
}

fn field_type_to_dto(t: &FieldTypeDefinition) -> FieldTypeAdapterDto {
    FieldTypeAdapterDto {
        id: t.field_type_id.get(),
        name: t.name.clone(),
        kind: t.kind.as_str().to_string(),
        protocol: t.protocol.clone(),
    }
}

fn field_value_to_dto(store: &CrmStore, v: &FieldValue) -> FieldValueAdapterDto {
    let href = store
        .scope(&v.tenant_id)
        .get_type(v.field_type_id)
        .ok()
        .and_then(|t| FieldData::interpret(&t.kind, &v.data).href(t.protocol.as_deref()));
    FieldValueAdapterDto {
        id: v.field_value_id.get(),
        contact_id: v.contact_id.get(),
        contact_field_type_id: v.field_type_id.get(),
        data: v.data.clone(),
        href,
        created_at_ns: v.created_at.0,
        updated_at_ns: v.updated_at.0,
    }
}

fn system_time_now_ns() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(1);
    if nanos > u64::MAX as u128 {
        u64::MAX
    } else {
        (nanos as u64).max(1)
    }
}
