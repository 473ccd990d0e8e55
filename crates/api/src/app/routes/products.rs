use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use lotstock_core::{ExpectedVersion, ProductId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

fn parse_id(raw: &str) -> Result<ProductId, axum::response::Response> {
    raw.parse().map_err(|_| errors::invalid_id())
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ProductRequest>,
) -> axum::response::Response {
    let draft = match body.into_draft() {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    match services.run(move |inv| inv.create(draft)).await {
        Ok(product) => (StatusCode::CREATED, Json(dto::product_to_json(&product))).into_response(),
        Err(resp) => resp,
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    let filter = match query.filter() {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let page = query.page();

    match services.run(move |inv| inv.list(&filter, Some(page))).await {
        Ok(products) => Json(
            products
                .iter()
                .map(dto::product_to_json)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(resp) => resp,
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.run(move |inv| inv.get(id)).await {
        Ok(product) => Json(dto::product_to_json(&product)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ProductRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(version) = body.version else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "version is required on update",
        );
    };
    let draft = match body.into_draft() {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    match services
        .run(move |inv| inv.update(id, ExpectedVersion::Exact(version), draft))
        .await
    {
        Ok(product) => Json(dto::product_to_json(&product)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.run(move |inv| inv.delete(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(resp) => resp,
    }
}

pub async fn sell(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::SellRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let selector = match body.selector() {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let quantity = body.quantity;

    match services.run(move |inv| inv.sell(id, quantity, selector)).await {
        Ok(receipt) => Json(dto::receipt_to_json(&receipt)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::PageQuery>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let page = query.page();

    match services.run(move |inv| inv.history(id, Some(page))).await {
        Ok(entries) => Json(
            entries
                .iter()
                .map(dto::transaction_to_json)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(resp) => resp,
    }
}

pub async fn record_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordTransactionRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let occurred_at = body.occurred_at.unwrap_or_else(Utc::now);

    match services
        .run(move |inv| inv.record_transaction(id, body.quantity, body.kind, occurred_at))
        .await
    {
        Ok(entry) => (StatusCode::CREATED, Json(dto::transaction_to_json(&entry))).into_response(),
        Err(resp) => resp,
    }
}
