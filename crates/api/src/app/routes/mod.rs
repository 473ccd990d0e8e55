use axum::{
    routing::{get, post},
    Router,
};

pub mod products;
pub mod reports;
pub mod system;

/// Router for every inventory endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/products", get(products::list_products).post(products::create_product))
        .route(
            "/products/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/products/:id/sell", post(products::sell))
        .route(
            "/products/:id/transactions",
            get(products::history).post(products::record_transaction),
        )
        .route("/reports/value", get(reports::total_value))
        .route("/reports/expiring", get(reports::expiring))
        .route("/reports/sold-out", get(reports::sold_out))
        .route("/reports/sales", get(reports::sales))
}
