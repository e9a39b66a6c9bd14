#![forbid(unsafe_code)]

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};

use crate::{
    AdapterError, AdapterHealthResponse, AdapterPrincipal, AdapterRuntime,
    ContactAdapterDto, ContactCreateAdapterRequest, DeletedAdapterDto, FieldTypeAdapterDto,
    FieldTypeAdapterRequest, FieldValueAdapterDto, FieldValueAdapterRequest,
};

pub fn router(runtime: AdapterRuntime) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/people", post(create_contact))
        .route(
            "/people/:contact_id/contactfield",
            get(list_field_values).post(create_field_value),
        )
        .route(
            "/people/:contact_id/contactfield/:field_value_id",
            put(update_field_value).delete(delete_field_value),
        )
        .route("/people/:contact_id/contactfieldtypes", get(list_field_types))
        .route("/settings/contactfieldtypes", post(create_field_type))
        .route(
            "/settings/contactfieldtypes/:field_type_id",
            delete(delete_field_type),
        )
        .with_state(runtime)
}

fn principal(runtime: &AdapterRuntime, headers: &HeaderMap) -> Result<AdapterPrincipal, AdapterError> {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    runtime.authenticate(authorization)
}

pub async fn healthz(
    State(runtime): State<AdapterRuntime>,
) -> Result<Json<AdapterHealthResponse>, AdapterError> {
    runtime.health_report().map(Json)
}

pub async fn create_contact(
    State(runtime): State<AdapterRuntime>,
    headers: HeaderMap,
    Json(request): Json<ContactCreateAdapterRequest>,
) -> Result<(StatusCode, Json<ContactAdapterDto>), AdapterError> {
    let principal = principal(&runtime, &headers)?;
    let contact = runtime.create_contact(&principal, request)?;
    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn list_field_values(
    State(runtime): State<AdapterRuntime>,
    headers: HeaderMap,
    Path(contact_id): Path<u64>,
) -> Result<Json<Vec<FieldValueAdapterDto>>, AdapterError> {
    let principal = principal(&runtime, &headers)?;
    runtime.list_field_values(&principal, contact_id).map(Json)
}

pub async fn list_field_types(
    State(runtime): State<AdapterRuntime>,
    headers: HeaderMap,
    Path(contact_id): Path<u64>,
) -> Result<Json<Vec<FieldTypeAdapterDto>>, AdapterError> {
    let principal = principal(&runtime, &headers)?;
    runtime.list_field_types(&principal, contact_id).map(Json)
}

pub async fn create_field_value(
    State(runtime): State<AdapterRuntime>,
    headers: HeaderMap,
    Path(contact_id): Path<u64>,
    Json(request): Json<FieldValueAdapterRequest>,
) -> Result<(StatusCode, Json<FieldValueAdapterDto>), AdapterError> {
    let principal = principal(&runtime, &headers)?;
    let value = runtime.create_field_value(&principal, contact_id, request)?;
    Ok((StatusCode::CREATED, Json(value)))
}

pub async fn update_field_value(
    State(runtime): State<AdapterRuntime>,
    headers: HeaderMap,
    Path((contact_id, field_value_id)): Path<(u64, u64)>,
    Json(request): Json<FieldValueAdapterRequest>,
) -> Result<Json<FieldValueAdapterDto>, AdapterError> {
    let principal = principal(&runtime, &headers)?;
    runtime
        .update_field_value(&principal, contact_id, field_value_id, request)
        .map(Json)
}

pub async fn delete_field_value(
    State(runtime): State<AdapterRuntime>,
    headers: HeaderMap,
    Path((contact_id, field_value_id)): Path<(u64, u64)>,
) -> Result<Json<DeletedAdapterDto>, AdapterError> {
    let principal = principal(&runtime, &headers)?;
    runtime
        .delete_field_value(&principal, contact_id, field_value_id)
        .map(Json)
}

pub async fn create_field_type(
    State(runtime): State<AdapterRuntime>,
    headers: HeaderMap,
    Json(request): Json<FieldTypeAdapterRequest>,
) -> Result<(StatusCode, Json<FieldTypeAdapterDto>), AdapterError> {
    let principal = principal(&runtime, &headers)?;
    let field_type = runtime.create_field_type(&principal, request)?;
    Ok((StatusCode::CREATED, Json(field_type)))
}

pub async fn delete_field_type(
    State(runtime): State<AdapterRuntime>,
    headers: HeaderMap,
    Path(field_type_id): Path<u64>,
) -> Result<Json<DeletedAdapterDto>, AdapterError> {
    let principal = principal(&runtime, &headers)?;
    runtime.delete_field_type(&principal, field_type_id).map(Json)
}
