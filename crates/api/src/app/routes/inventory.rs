use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use uuid::Uuid;

use depot_core::{SupplierId, WarehouseId};
use depot_infra::projections::movement_log::MovementFilter;
use depot_inventory::{
    LedgerCommand, LedgerEvent, LedgerId, RecordCheck, RecordExport, RecordImport, RecordTransfer,
    reconstruct_levels,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_inventory))
        .route("/initial", get(get_initial_inventory))
        .route("/imports", post(record_import).get(list_imports))
        .route("/exports", post(record_export).get(list_exports))
        .route("/transfers", post(record_transfer).get(list_transfers))
        .route("/checks", post(record_check).get(list_checks))
}

pub async fn record_import(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RecordImportRequest>,
) -> axum::response::Response {
    let warehouse_id: WarehouseId = match errors::parse_id(&body.warehouse_id, "warehouse") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let supplier_id: SupplierId = match errors::parse_id(&body.supplier_id, "supplier") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    if !services.warehouses.exists(warehouse_id) {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "warehouse not found");
    }
    if !services.suppliers.exists(supplier_id) {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "supplier not found");
    }

    let lines = match dto::to_import_lines(body.products) {
        Ok(lines) => lines,
        Err(resp) => return resp,
    };
    for line in &lines {
        if !services.products.exists(line.product_id) {
            return errors::json_error(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("product {} not found", line.product_id),
            );
        }
    }

    let import_id = Uuid::now_v7();
    let cmd = LedgerCommand::RecordImport(RecordImport {
        ledger_id: LedgerId::global(),
        import_id,
        warehouse_id,
        supplier_id,
        lines,
        occurred_at: Utc::now(),
    });

    match services.dispatch_ledger(cmd) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "message": "Import recorded successfully",
                "import_id": import_id.to_string(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_imports(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    let (page, limit) = match errors::parse_pagination(query.page.as_deref(), query.limit.as_deref())
    {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (from, to) =
        match errors::parse_date_range(query.start_date.as_deref(), query.end_date.as_deref()) {
            Ok(v) => v,
            Err(resp) => return resp,
        };

    let mut filter = MovementFilter {
        from,
        to,
        ..MovementFilter::default()
    };
    if let Some(raw) = query.warehouse_id.as_deref() {
        filter.warehouse_id = match errors::parse_id(raw, "warehouse") {
            Ok(v) => Some(v),
            Err(resp) => return resp,
        };
    }
    if let Some(raw) = query.supplier_id.as_deref() {
        filter.supplier_id = match errors::parse_id(raw, "supplier") {
            Ok(v) => Some(v),
            Err(resp) => return resp,
        };
    }

    let result = services.movement_log.imports(filter, page, limit);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "imports": result.items.iter().map(dto::movement_to_json).collect::<Vec<_>>(),
            "page": result.page,
            "total": result.total,
        })),
    )
        .into_response()
}

pub async fn record_export(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RecordExportRequest>,
) -> axum::response::Response {
    let warehouse_id: WarehouseId = match errors::parse_id(&body.warehouse_id, "warehouse") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if !services.warehouses.exists(warehouse_id) {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "warehouse not found");
    }

    let lines = match dto::to_export_lines(body.products) {
        Ok(lines) => lines,
        Err(resp) => return resp,
    };
    for line in &lines {
        if !services.products.exists(line.product_id) {
            return errors::json_error(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("product {} not found", line.product_id),
            );
        }
    }

    let export_id = Uuid::now_v7();
    let cmd = LedgerCommand::RecordExport(RecordExport {
        ledger_id: LedgerId::global(),
        export_id,
        warehouse_id,
        lines,
        occurred_at: Utc::now(),
    });

    match services.dispatch_ledger(cmd) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "message": "Export recorded successfully",
                "export_id": export_id.to_string(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_exports(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    let (page, limit) = match errors::parse_pagination(query.page.as_deref(), query.limit.as_deref())
    {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (from, to) =
        match errors::parse_date_range(query.start_date.as_deref(), query.end_date.as_deref()) {
            Ok(v) => v,
            Err(resp) => return resp,
        };

    let mut filter = MovementFilter {
        from,
        to,
        ..MovementFilter::default()
    };
    if let Some(raw) = query.warehouse_id.as_deref() {
        filter.warehouse_id = match errors::parse_id(raw, "warehouse") {
            Ok(v) => Some(v),
            Err(resp) => return resp,
        };
    }

    let result = services.movement_log.exports(filter, page, limit);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "exports": result.items.iter().map(dto::movement_to_json).collect::<Vec<_>>(),
            "page": result.page,
            "total": result.total,
        })),
    )
        .into_response()
}

pub async fn record_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RecordTransferRequest>,
) -> axum::response::Response {
    let kind = match errors::parse_transfer_kind(&body.kind) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let from_warehouse_id: WarehouseId = match errors::parse_id(&body.from_warehouse_id, "warehouse")
    {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if !services.warehouses.exists(from_warehouse_id) {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "source warehouse not found");
    }

    let to_warehouse_id = match body.to_warehouse_id.as_deref() {
        Some(raw) => {
            let id: WarehouseId = match errors::parse_id(raw, "warehouse") {
                Ok(v) => v,
                Err(resp) => return resp,
            };
            if !services.warehouses.exists(id) {
                return errors::json_error(
                    StatusCode::NOT_FOUND,
                    "not_found",
                    "destination warehouse not found",
                );
            }
            Some(id)
        }
        None => None,
    };

    // Destination arity per kind is enforced by the ledger aggregate; here we
    // only resolve references.
    let lines = match dto::to_transfer_lines(body.products) {
        Ok(lines) => lines,
        Err(resp) => return resp,
    };
    for line in &lines {
        if !services.products.exists(line.product_id) {
            return errors::json_error(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("product {} not found", line.product_id),
            );
        }
    }

    let transfer_id = Uuid::now_v7();
    let cmd = LedgerCommand::RecordTransfer(RecordTransfer {
        ledger_id: LedgerId::global(),
        transfer_id,
        kind,
        from_warehouse_id,
        to_warehouse_id,
        lines,
        reason: body.reason,
        occurred_at: Utc::now(),
    });

    match services.dispatch_ledger(cmd) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "message": "Transfer recorded successfully",
                "transfer_id": transfer_id.to_string(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_transfers(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    let (page, limit) = match errors::parse_pagination(query.page.as_deref(), query.limit.as_deref())
    {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (from, to) =
        match errors::parse_date_range(query.start_date.as_deref(), query.end_date.as_deref()) {
            Ok(v) => v,
            Err(resp) => return resp,
        };

    let mut filter = MovementFilter {
        from,
        to,
        ..MovementFilter::default()
    };
    if let Some(raw) = query.warehouse_id.as_deref() {
        filter.warehouse_id = match errors::parse_id(raw, "warehouse") {
            Ok(v) => Some(v),
            Err(resp) => return resp,
        };
    }

    let result = services.movement_log.transfers(filter, page, limit);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "transfers": result.items.iter().map(dto::movement_to_json).collect::<Vec<_>>(),
            "page": result.page,
            "total": result.total,
        })),
    )
        .into_response()
}

pub async fn record_check(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RecordCheckRequest>,
) -> axum::response::Response {
    let warehouse_id: WarehouseId = match errors::parse_id(&body.warehouse_id, "warehouse") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if !services.warehouses.exists(warehouse_id) {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "warehouse not found");
    }

    let lines = match dto::to_check_lines(body.products) {
        Ok(lines) => lines,
        Err(resp) => return resp,
    };
    for line in &lines {
        if !services.products.exists(line.product_id) {
            return errors::json_error(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("product {} not found", line.product_id),
            );
        }
    }

    let check_id = Uuid::now_v7();
    let cmd = LedgerCommand::RecordCheck(RecordCheck {
        ledger_id: LedgerId::global(),
        check_id,
        warehouse_id,
        lines,
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch_ledger(cmd) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    // The settled counts live in the committed event; report the non-zero
    // differences back as the discrepancy summary.
    let discrepancies: Vec<serde_json::Value> = committed
        .first()
        .and_then(|stored| serde_json::from_value::<LedgerEvent>(stored.payload.clone()).ok())
        .map(|event| match event {
            LedgerEvent::CheckRecorded(e) => e
                .counts
                .iter()
                .filter(|c| c.difference != 0)
                .map(|c| {
                    serde_json::json!({
                        "product_id": c.product_id.to_string(),
                        "expected_quantity": c.expected_quantity,
                        "actual_quantity": c.actual_quantity,
                        "difference": c.difference,
                    })
                })
                .collect(),
            _ => vec![],
        })
        .unwrap_or_default();

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Inventory check recorded successfully",
            "check_id": check_id.to_string(),
            "discrepancies": discrepancies,
        })),
    )
        .into_response()
}

pub async fn list_checks(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    let (page, limit) = match errors::parse_pagination(query.page.as_deref(), query.limit.as_deref())
    {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (from, to) =
        match errors::parse_date_range(query.start_date.as_deref(), query.end_date.as_deref()) {
            Ok(v) => v,
            Err(resp) => return resp,
        };

    let mut filter = MovementFilter {
        from,
        to,
        ..MovementFilter::default()
    };
    if let Some(raw) = query.warehouse_id.as_deref() {
        filter.warehouse_id = match errors::parse_id(raw, "warehouse") {
            Ok(v) => Some(v),
            Err(resp) => return resp,
        };
    }

    let result = services.movement_log.checks(filter, page, limit);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "checks": result.items.iter().map(dto::movement_to_json).collect::<Vec<_>>(),
            "page": result.page,
            "total": result.total,
        })),
    )
        .into_response()
}

pub async fn get_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    let (page, limit) = match errors::parse_pagination(query.page.as_deref(), query.limit.as_deref())
    {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let warehouse_id = match query.warehouse_id.as_deref() {
        Some(raw) => match errors::parse_id(raw, "warehouse") {
            Ok(v) => Some(v),
            Err(resp) => return resp,
        },
        None => None,
    };

    // Zero levels are kept in the projection but omitted from the listing, so
    // a drained product reads the same as one never stocked.
    let rows: Vec<_> = services
        .stock_levels
        .list(warehouse_id)
        .into_iter()
        .filter(|l| l.quantity > 0)
        .collect();

    let total = rows.len();
    let items: Vec<serde_json::Value> = rows
        .into_iter()
        .skip((page - 1) * limit)
        .take(limit)
        .map(|l| {
            serde_json::json!({
                "product_id": l.product_id.to_string(),
                "name": services
                    .products
                    .get(l.product_id)
                    .map(|p| p.title)
                    .unwrap_or_default(),
                "quantity": l.quantity,
                "warehouse_id": l.warehouse_id.to_string(),
            })
        })
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "inventory": items,
            "total": total,
            "page": page,
            "limit": limit,
        })),
    )
        .into_response()
}

pub async fn get_initial_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::InitialInventoryQuery>,
) -> axum::response::Response {
    let date = match query.date.as_deref() {
        Some(raw) => match errors::parse_date(raw) {
            Ok(d) => d,
            Err(resp) => return resp,
        },
        None => {
            return errors::json_error(StatusCode::BAD_REQUEST, "missing_date", "date is required");
        }
    };

    let warehouse_id: Option<WarehouseId> = match query.warehouse_id.as_deref() {
        Some(raw) => {
            let id = match errors::parse_id(raw, "warehouse") {
                Ok(v) => v,
                Err(resp) => return resp,
            };
            if !services.warehouses.exists(id) {
                return errors::json_error(StatusCode::NOT_FOUND, "not_found", "warehouse not found");
            }
            Some(id)
        }
        None => None,
    };

    let as_of = errors::end_of_day(date);
    let events = services.movement_log.events_until(as_of);
    let levels = reconstruct_levels(&events, as_of, warehouse_id);

    let body: Vec<serde_json::Value> = levels
        .iter()
        .map(|l| {
            serde_json::json!({
                "product_id": l.product_id.to_string(),
                "name": services
                    .products
                    .get(l.product_id)
                    .map(|p| p.title)
                    .unwrap_or_default(),
                "quantity": l.quantity,
                "warehouse_id": l.warehouse_id.to_string(),
            })
        })
        .collect();

    (StatusCode::OK, Json(body)).into_response()
}
