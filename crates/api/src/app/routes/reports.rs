use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use crate::app::dto;
use crate::app::services::AppServices;

pub async fn total_value(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.run(|inv| inv.total_value()).await {
        Ok(summary) => Json(summary).into_response(),
        Err(resp) => resp,
    }
}

/// Batches expiring within `days` (configured default) of `today` (server date).
pub async fn expiring(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ExpiringQuery>,
) -> axum::response::Response {
    let today = query.today.unwrap_or_else(|| Utc::now().date_naive());

    match services
        .run(move |inv| inv.expiring_within(query.days, today))
        .await
    {
        Ok(rows) => Json(rows).into_response(),
        Err(resp) => resp,
    }
}

pub async fn sold_out(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.run(|inv| inv.sold_out()).await {
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

pub async fn sales(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::SalesQuery>,
) -> axum::response::Response {
    match services.run(move |inv| inv.sales_history(query.since)).await {
        Ok(history) => Json(history).into_response(),
        Err(resp) => resp,
    }
}
