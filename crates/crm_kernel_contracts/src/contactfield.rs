#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::{validate_nonzero, validate_text, validate_token};
use crate::contact::ContactId;
use crate::tenant::{TenantId, UserId};
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const CONTACTFIELD_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const FIELD_TYPE_NAME_MAX_CHARS: usize = 255;
pub const FIELD_VALUE_DATA_MAX_CHARS: usize = 255;
pub const FIELD_KIND_TAG_MAX_LEN: usize = 32;
pub const FIELD_PROTOCOL_MAX_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldTypeId(u64);

impl FieldTypeId {
    pub const MIN: Self = Self(1);

    pub fn new(id: u64) -> Result<Self, ContractViolation> {
        let v = Self(id);
        v.validate()?;
        Ok(v)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Validate for FieldTypeId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_nonzero("field_type_id", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldValueId(u64);

impl FieldValueId {
    pub const MIN: Self = Self(1);

    pub fn new(id: u64) -> Result<Self, ContractViolation> {
        let v = Self(id);
        v.validate()?;
        Ok(v)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Validate for FieldValueId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_nonzero("field_value_id", self.0)
    }
}

/// Type tag that governs how a field value's `data` is interpreted.
///
/// The built-in tags cover the stock field types every account starts with.
/// Anything else is carried as `Custom` so accounts can add their own kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldKind {
    Email,
    Phone,
    Url,
    Text,
    Date,
    Custom(String),
}

impl FieldKind {
    pub fn parse(tag: &str) -> Result<Self, ContractViolation> {
        let tag = tag.trim().to_ascii_lowercase();
        let kind = match tag.as_str() {
            "email" => FieldKind::Email,
            "phone" => FieldKind::Phone,
            "url" => FieldKind::Url,
            "text" => FieldKind::Text,
            "date" => FieldKind::Date,
            _ => FieldKind::Custom(tag),
        };
        kind.validate()?;
        Ok(kind)
    }

    pub fn as_str(&self) -> &str {
        match self {
            FieldKind::Email => "email",
            FieldKind::Phone => "phone",
            FieldKind::Url => "url",
            FieldKind::Text => "text",
            FieldKind::Date => "date",
            FieldKind::Custom(tag) => tag,
        }
    }
}

impl Validate for FieldKind {
    fn validate(&self) -> Result<(), ContractViolation> {
        if let FieldKind::Custom(tag) = self {
            validate_token("field_type.kind", tag, FIELD_KIND_TAG_MAX_LEN)?;
            if tag
                .chars()
                .any(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'))
            {
                return Err(ContractViolation::InvalidValue {
                    field: "field_type.kind",
                    reason: "must be lowercase [a-z0-9_-]",
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for FieldKind {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FieldKind::parse(&value)
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Account-defined schema for one custom contact field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTypeDefinition {
    pub field_type_id: FieldTypeId,
    pub tenant_id: TenantId,
    pub name: String,
    pub kind: FieldKind,
    pub protocol: Option<String>,
    pub created_at: MonotonicTimeNs,
}

/// One data point attaching a field type to a contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    pub field_value_id: FieldValueId,
    pub tenant_id: TenantId,
    pub contact_id: ContactId,
    pub field_type_id: FieldTypeId,
    pub data: String,
    pub created_at: MonotonicTimeNs,
    pub updated_at: MonotonicTimeNs,
}

/// `data` read through the kind of its field type. Persistence keeps the raw string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldData {
    Email(String),
    Phone(String),
    Url(String),
    Text(String),
    Date(String),
    Custom { tag: String, raw: String },
}

impl FieldData {
    pub fn interpret(kind: &FieldKind, data: &str) -> Self {
        let raw = data.to_string();
        match kind {
            FieldKind::Email => FieldData::Email(raw),
            FieldKind::Phone => FieldData::Phone(raw),
            FieldKind::Url => FieldData::Url(raw),
            FieldKind::Text => FieldData::Text(raw),
            FieldKind::Date => FieldData::Date(raw),
            FieldKind::Custom(tag) => FieldData::Custom {
                tag: tag.clone(),
                raw,
            },
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            FieldData::Email(v)
            | FieldData::Phone(v)
            | FieldData::Url(v)
            | FieldData::Text(v)
            | FieldData::Date(v) => v,
            FieldData::Custom { raw, .. } => raw,
        }
    }

    /// Link target for the value, if its field type is linkable.
    pub fn href(&self, protocol: Option<&str>) -> Option<String> {
        match (self, protocol) {
            (FieldData::Text(_) | FieldData::Date(_), _) => None,
            (_, Some(protocol)) => Some(format!("{protocol}{}", self.raw().trim())),
            (FieldData::Url(v), None) => Some(v.trim().to_string()),
            (_, None) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTypeCreateRequest {
    pub name: String,
    pub kind: FieldKind,
    pub protocol: Option<String>,
}

impl Validate for FieldTypeCreateRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text(
            "field_type_create_request.name",
            &self.name,
            FIELD_TYPE_NAME_MAX_CHARS,
        )?;
        self.kind.validate()?;
        if let Some(protocol) = &self.protocol {
            validate_token(
                "field_type_create_request.protocol",
                protocol,
                FIELD_PROTOCOL_MAX_LEN,
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValueCreateRequest {
    pub contact_id: ContactId,
    pub field_type_id: FieldTypeId,
    pub data: String,
}

impl Validate for FieldValueCreateRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.contact_id.validate()?;
        self.field_type_id.validate()?;
        validate_data(&self.data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValueUpdateRequest {
    /// When set, the value must belong to this contact.
    pub contact_id: Option<ContactId>,
    pub field_value_id: FieldValueId,
    pub field_type_id: FieldTypeId,
    pub data: String,
}

impl Validate for FieldValueUpdateRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if let Some(contact_id) = &self.contact_id {
            contact_id.validate()?;
        }
        self.field_value_id.validate()?;
        self.field_type_id.validate()?;
        validate_data(&self.data)
    }
}

pub fn validate_data(data: &str) -> Result<(), ContractViolation> {
    validate_text("field_value.data", data, FIELD_VALUE_DATA_MAX_CHARS)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactFieldRequest {
    ListValues {
        contact_id: ContactId,
    },
    ListTypes,
    GetValue {
        contact_id: Option<ContactId>,
        field_value_id: FieldValueId,
    },
    CreateValue(FieldValueCreateRequest),
    UpdateValue(FieldValueUpdateRequest),
    DeleteValue {
        contact_id: Option<ContactId>,
        field_value_id: FieldValueId,
    },
    CreateType(FieldTypeCreateRequest),
    DeleteType {
        field_type_id: FieldTypeId,
    },
}

impl ContactFieldRequest {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ContactFieldRequest::CreateValue(_)
                | ContactFieldRequest::UpdateValue(_)
                | ContactFieldRequest::DeleteValue { .. }
                | ContactFieldRequest::CreateType(_)
                | ContactFieldRequest::DeleteType { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ContactFieldRequest::ListValues { .. } => "LIST_VALUES",
            ContactFieldRequest::ListTypes => "LIST_TYPES",
            ContactFieldRequest::GetValue { .. } => "GET_VALUE",
            ContactFieldRequest::CreateValue(_) => "CREATE_VALUE",
            ContactFieldRequest::UpdateValue(_) => "UPDATE_VALUE",
            ContactFieldRequest::DeleteValue { .. } => "DELETE_VALUE",
            ContactFieldRequest::CreateType(_) => "CREATE_TYPE",
            ContactFieldRequest::DeleteType { .. } => "DELETE_TYPE",
        }
    }
}

impl Validate for ContactFieldRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        match self {
            ContactFieldRequest::ListValues { contact_id } => contact_id.validate(),
            ContactFieldRequest::ListTypes => Ok(()),
            ContactFieldRequest::GetValue {
                contact_id,
                field_value_id,
            }
            | ContactFieldRequest::DeleteValue {
                contact_id,
                field_value_id,
            } => {
                if let Some(contact_id) = contact_id {
                    contact_id.validate()?;
                }
                field_value_id.validate()
            }
            ContactFieldRequest::CreateValue(r) => r.validate(),
            ContactFieldRequest::UpdateValue(r) => r.validate(),
            ContactFieldRequest::CreateType(r) => r.validate(),
            ContactFieldRequest::DeleteType { field_type_id } => field_type_id.validate(),
        }
    }
}

/// A request bound to the caller's tenant. The tenant comes from the
/// authenticated session, never from the request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactFieldRuntimeRequest {
    pub schema_version: SchemaVersion,
    pub now: MonotonicTimeNs,
    pub actor_user_id: UserId,
    pub tenant_id: TenantId,
    pub request: ContactFieldRequest,
}

impl ContactFieldRuntimeRequest {
    pub fn v1(
        now: MonotonicTimeNs,
        actor_user_id: UserId,
        tenant_id: TenantId,
        request: ContactFieldRequest,
    ) -> Result<Self, ContractViolation> {
        let req = Self {
            schema_version: CONTACTFIELD_CONTRACT_VERSION,
            now,
            actor_user_id,
            tenant_id,
            request,
        };
        req.validate()?;
        Ok(req)
    }
}

impl Validate for ContactFieldRuntimeRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != CONTACTFIELD_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "contact_field_runtime_request.schema_version",
                reason: "must match CONTACTFIELD_CONTRACT_VERSION",
            });
        }
        validate_nonzero("contact_field_runtime_request.now", self.now.0)?;
        self.actor_user_id.validate()?;
        self.tenant_id.validate()?;
        self.request.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactFieldResponse {
    Values(Vec<FieldValue>),
    Types(Vec<FieldTypeDefinition>),
    Value(FieldValue),
    ValueCreated(FieldValue),
    ValueUpdated(FieldValue),
    ValueDeleted(FieldValueId),
    TypeCreated(FieldTypeDefinition),
    TypeDeleted(FieldTypeId),
}

impl ContactFieldResponse {
    pub fn status_code(&self) -> u16 {
        match self {
            ContactFieldResponse::ValueCreated(_) | ContactFieldResponse::TypeCreated(_) => 201,
            _ => 200,
        }
    }
}
