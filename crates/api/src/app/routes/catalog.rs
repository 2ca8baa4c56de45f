use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use depot_catalog::{
    CategoryCommand, CreateCategory, CreateProduct, CreateSupplier, CreateWarehouse,
    ProductCommand, SupplierCommand, WarehouseCommand,
};
use depot_core::{CategoryId, ProductId, SupplierId, WarehouseId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/products", post(create_product).get(list_products))
        .route("/products/:id", get(get_product))
        .route("/categories", post(create_category).get(list_categories))
        .route("/warehouses", post(create_warehouse).get(list_warehouses))
        .route("/suppliers", post(create_supplier).get(list_suppliers))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let category_id = match body.category_id.as_deref() {
        Some(raw) => {
            let id: CategoryId = match errors::parse_id(raw, "category") {
                Ok(v) => v,
                Err(resp) => return resp,
            };
            if !services.categories.exists(id) {
                return errors::json_error(StatusCode::NOT_FOUND, "not_found", "category not found");
            }
            Some(id)
        }
        None => None,
    };

    let product_id = ProductId::new();
    let cmd = ProductCommand::CreateProduct(CreateProduct {
        product_id,
        title: body.title,
        price: body.price,
        category_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch_product(product_id, cmd) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "message": "Product created successfully",
                "product_id": product_id.to_string(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let products: Vec<serde_json::Value> = services
        .products
        .list()
        .into_iter()
        .map(|p| product_to_json(&services, p))
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "total": products.len(),
            "products": products,
        })),
    )
        .into_response()
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.products.get(product_id) {
        Some(p) => (StatusCode::OK, Json(product_to_json(&services, p))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
    }
}

fn product_to_json(
    services: &AppServices,
    p: depot_infra::projections::catalog::ProductReadModel,
) -> serde_json::Value {
    serde_json::json!({
        "product_id": p.product_id.to_string(),
        "title": p.title,
        "price": p.price,
        "category_id": p.category_id.map(|c| c.to_string()),
        // The global figure is derived from the per-warehouse levels.
        "quantity": services.stock_levels.total_for_product(p.product_id),
    })
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateCategoryRequest>,
) -> axum::response::Response {
    let category_id = CategoryId::new();
    let cmd = CategoryCommand::CreateCategory(CreateCategory {
        category_id,
        name: body.name,
        occurred_at: Utc::now(),
    });

    match services.dispatch_category(category_id, cmd) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "message": "Category created successfully",
                "category_id": category_id.to_string(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let categories: Vec<serde_json::Value> = services
        .categories
        .list()
        .into_iter()
        .map(|c| {
            serde_json::json!({
                "category_id": c.category_id.to_string(),
                "name": c.name,
            })
        })
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "total": categories.len(),
            "categories": categories,
        })),
    )
        .into_response()
}

pub async fn create_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateWarehouseRequest>,
) -> axum::response::Response {
    let warehouse_id = WarehouseId::new();
    let cmd = WarehouseCommand::CreateWarehouse(CreateWarehouse {
        warehouse_id,
        name: body.name,
        capacity: body.capacity,
        occurred_at: Utc::now(),
    });

    match services.dispatch_warehouse(warehouse_id, cmd) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "message": "Warehouse created successfully",
                "warehouse_id": warehouse_id.to_string(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_warehouses(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let warehouses: Vec<serde_json::Value> = services
        .warehouses
        .list()
        .into_iter()
        .map(|w| {
            serde_json::json!({
                "warehouse_id": w.warehouse_id.to_string(),
                "name": w.name,
                "capacity": w.capacity,
            })
        })
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "total": warehouses.len(),
            "warehouses": warehouses,
        })),
    )
        .into_response()
}

pub async fn create_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateSupplierRequest>,
) -> axum::response::Response {
    let supplier_id = SupplierId::new();
    let cmd = SupplierCommand::CreateSupplier(CreateSupplier {
        supplier_id,
        name: body.name,
        phone: body.phone,
        occurred_at: Utc::now(),
    });

    match services.dispatch_supplier(supplier_id, cmd) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "message": "Supplier created successfully",
                "supplier_id": supplier_id.to_string(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let suppliers: Vec<serde_json::Value> = services
        .suppliers
        .list()
        .into_iter()
        .map(|s| {
            serde_json::json!({
                "supplier_id": s.supplier_id.to_string(),
                "name": s.name,
                "phone": s.phone,
            })
        })
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "total": suppliers.len(),
            "suppliers": suppliers,
        })),
    )
        .into_response()
}
