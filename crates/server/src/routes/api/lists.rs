//! List API handlers.
//!
//! Lists are shared by link, so reads are public. Mutations check ownership
//! when the caller is signed in.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};

use prizey_core::{ListId, ProductId};

use super::{JsonBody, parse_id};
use crate::error::{AppError, Context, Result};
use crate::middleware::OptionalAuth;
use crate::models::{ListDetail, ListPatch, ListWithProducts};
use crate::services::lists::{ListService, Owner, list_name};
use crate::state::AppState;

const LIST_NOT_FOUND: &str = "List not found";

/// Query for `GET /api/list`.
#[derive(Debug, Deserialize)]
pub struct ListsQuery {
    pub email: Option<String>,
}

/// Owner reference in a create request.
#[derive(Debug, Deserialize)]
pub struct OwnerRef {
    pub email: Option<String>,
}

/// Body of `POST /api/list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub user: Option<OwnerRef>,
    #[serde(default)]
    pub product_ids: Vec<ProductId>,
}

/// Body of `PUT /api/list/{id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub product_ids: Option<Vec<ProductId>>,
}

/// `GET /api/list?email=`
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
    Query(query): Query<ListsQuery>,
) -> Result<Json<Vec<ListWithProducts>>> {
    let service = ListService::new(state.store());
    let user = service
        .resolve_user(query.email.as_deref(), current.as_ref())
        .await
        .context("Failed to fetch lists")?;

    let lists = service
        .lists_for(&user)
        .await
        .context("Failed to fetch lists")?;

    Ok(Json(lists))
}

/// `POST /api/list`
pub async fn create(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
    JsonBody(body): JsonBody<CreateListRequest>,
) -> Result<impl IntoResponse> {
    let service = ListService::new(state.store());
    let email = body.user.as_ref().and_then(|u| u.email.as_deref());
    let owner = Owner::from_request(email, current.as_ref())?;
    let name = list_name(body.name.as_deref())?;

    let user = service
        .find_owner(owner)
        .await
        .context("Failed to create list")?;

    let list = service
        .create(&user, name, body.description, body.product_ids)
        .await
        .context("Failed to create list")?;

    Ok((StatusCode::CREATED, Json(list)))
}

/// `GET /api/list/{id}`
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ListDetail>> {
    let id: ListId = parse_id(&id, LIST_NOT_FOUND)?;

    let detail = ListService::new(state.store())
        .detail(id)
        .await
        .context("Failed to fetch list")?;

    Ok(Json(detail))
}

/// `PUT /api/list/{id}`
pub async fn update(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateListRequest>,
) -> Result<Json<ListWithProducts>> {
    let id: ListId = parse_id(&id, LIST_NOT_FOUND)?;
    let patch = ListPatch {
        name: body.name,
        description: body.description,
        product_ids: body.product_ids,
    };

    let list = ListService::new(state.store())
        .update(id, patch, current.as_ref())
        .await
        .context("Failed to update list")?;

    Ok(Json(list))
}

/// `DELETE /api/list/{id}`
pub async fn delete(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id: ListId = parse_id(&id, LIST_NOT_FOUND)?;

    ListService::new(state.store())
        .delete(id, current.as_ref())
        .await
        .context("Failed to delete list")?;

    Ok(Json(json!({ "message": "List deleted successfully" })))
}

/// `POST /api/list/{id}`
///
/// Takes the body as raw JSON so a missing or malformed `productIds` gets
/// its own message rather than the generic body rejection.
pub async fn append(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> Result<Json<ListWithProducts>> {
    let id: ListId = parse_id(&id, LIST_NOT_FOUND)?;
    let product_ids = product_ids_from(&body)
        .ok_or_else(|| AppError::BadRequest("Invalid product IDs".to_string()))?;

    let list = ListService::new(state.store())
        .append(id, &product_ids, current.as_ref())
        .await
        .context("Failed to add products")?;

    Ok(Json(list))
}

/// `productIds` as an array of ids, or `None` if it is anything else.
fn product_ids_from(body: &Value) -> Option<Vec<ProductId>> {
    let ids = body.get("productIds")?.as_array()?;
    ids.iter()
        .map(|v| serde_json::from_value(v.clone()).ok())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_ids_from_body() {
        let ids = product_ids_from(&json!({"productIds": [3, 1]})).unwrap();
        assert_eq!(ids, vec![ProductId::new(3), ProductId::new(1)]);

        assert_eq!(product_ids_from(&json!({"productIds": []})), Some(vec![]));
        assert!(product_ids_from(&json!({"productIds": 3})).is_none());
        assert!(product_ids_from(&json!({"productIds": ["a"]})).is_none());
        assert!(product_ids_from(&json!({})).is_none());
    }
}
