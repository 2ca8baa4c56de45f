use serde::Deserialize;

use depot_core::ProductId;
use depot_infra::projections::fund_balances::{FundAccountReadModel, VoucherReadModel};
use depot_infra::projections::movement_log::MovementRecord;
use depot_inventory::{CheckLine, ExportLine, ImportLine, LedgerEvent, TransferLine};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ImportLineRequest {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: i64,
}

#[derive(Debug, Deserialize)]
pub struct RecordImportRequest {
    pub warehouse_id: String,
    pub supplier_id: String,
    pub products: Vec<ImportLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct MovementLineRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct RecordExportRequest {
    pub warehouse_id: String,
    pub products: Vec<MovementLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct RecordTransferRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub from_warehouse_id: String,
    pub to_warehouse_id: Option<String>,
    pub products: Vec<MovementLineRequest>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckLineRequest {
    pub product_id: String,
    pub actual_quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct RecordCheckRequest {
    pub warehouse_id: String,
    pub products: Vec<CheckLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub title: String,
    pub price: i64,
    pub category_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateWarehouseRequest {
    pub name: String,
    pub capacity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateSupplierRequest {
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAccountRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub initial_balance: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RecordVoucherRequest {
    pub account_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: i64,
    pub description: Option<String>,
}

/// Query parameters shared by the movement listings. Numeric fields arrive as
/// raw strings so range failures produce the documented 400s instead of axum
/// rejections.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub warehouse_id: Option<String>,
    pub supplier_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InitialInventoryQuery {
    pub warehouse_id: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VoucherListQuery {
    pub account_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InitialBalanceQuery {
    pub account_id: Option<String>,
    pub date: Option<String>,
}

// -------------------------
// Request -> domain mapping
// -------------------------

pub fn to_import_lines(
    req_lines: Vec<ImportLineRequest>,
) -> Result<Vec<ImportLine>, axum::response::Response> {
    let mut lines = Vec::with_capacity(req_lines.len());
    for l in req_lines {
        let product_id: ProductId = errors::parse_id(&l.product_id, "product")?;
        lines.push(ImportLine {
            product_id,
            quantity: l.quantity,
            unit_price: l.unit_price,
        });
    }
    Ok(lines)
}

pub fn to_export_lines(
    req_lines: Vec<MovementLineRequest>,
) -> Result<Vec<ExportLine>, axum::response::Response> {
    let mut lines = Vec::with_capacity(req_lines.len());
    for l in req_lines {
        let product_id: ProductId = errors::parse_id(&l.product_id, "product")?;
        lines.push(ExportLine {
            product_id,
            quantity: l.quantity,
        });
    }
    Ok(lines)
}

pub fn to_transfer_lines(
    req_lines: Vec<MovementLineRequest>,
) -> Result<Vec<TransferLine>, axum::response::Response> {
    let mut lines = Vec::with_capacity(req_lines.len());
    for l in req_lines {
        let product_id: ProductId = errors::parse_id(&l.product_id, "product")?;
        lines.push(TransferLine {
            product_id,
            quantity: l.quantity,
        });
    }
    Ok(lines)
}

pub fn to_check_lines(
    req_lines: Vec<CheckLineRequest>,
) -> Result<Vec<CheckLine>, axum::response::Response> {
    let mut lines = Vec::with_capacity(req_lines.len());
    for l in req_lines {
        let product_id: ProductId = errors::parse_id(&l.product_id, "product")?;
        lines.push(CheckLine {
            product_id,
            actual_quantity: l.actual_quantity,
        });
    }
    Ok(lines)
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn movement_to_json(record: &MovementRecord) -> serde_json::Value {
    let date = record.occurred_at.format("%Y-%m-%d").to_string();

    match &record.event {
        LedgerEvent::ImportRecorded(e) => serde_json::json!({
            "import_id": e.import_id.to_string(),
            "warehouse_id": e.warehouse_id.to_string(),
            "supplier_id": e.supplier_id.to_string(),
            "total_amount": e.total_amount,
            "import_date": date,
            "products": e.lines.iter().map(|l| serde_json::json!({
                "product_id": l.product_id.to_string(),
                "quantity": l.quantity,
                "unit_price": l.unit_price,
            })).collect::<Vec<_>>(),
        }),
        LedgerEvent::ExportRecorded(e) => serde_json::json!({
            "export_id": e.export_id.to_string(),
            "warehouse_id": e.warehouse_id.to_string(),
            "export_date": date,
            "products": e.lines.iter().map(|l| serde_json::json!({
                "product_id": l.product_id.to_string(),
                "quantity": l.quantity,
            })).collect::<Vec<_>>(),
        }),
        LedgerEvent::TransferRecorded(e) => serde_json::json!({
            "transfer_id": e.transfer_id.to_string(),
            "type": match e.kind {
                depot_inventory::TransferKind::Internal => "internal",
                depot_inventory::TransferKind::Repair => "repair",
                depot_inventory::TransferKind::Discard => "discard",
            },
            "from_warehouse_id": e.from_warehouse_id.to_string(),
            "to_warehouse_id": e.to_warehouse_id.map(|w| w.to_string()),
            "reason": e.reason,
            "transfer_date": date,
            "products": e.lines.iter().map(|l| serde_json::json!({
                "product_id": l.product_id.to_string(),
                "quantity": l.quantity,
            })).collect::<Vec<_>>(),
        }),
        LedgerEvent::CheckRecorded(e) => serde_json::json!({
            "check_id": e.check_id.to_string(),
            "warehouse_id": e.warehouse_id.to_string(),
            "check_date": date,
            "products": e.counts.iter().map(|c| serde_json::json!({
                "product_id": c.product_id.to_string(),
                "expected_quantity": c.expected_quantity,
                "actual_quantity": c.actual_quantity,
                "difference": c.difference,
            })).collect::<Vec<_>>(),
        }),
    }
}

pub fn fund_account_to_json(rm: &FundAccountReadModel) -> serde_json::Value {
    serde_json::json!({
        "account_id": rm.account_id.to_string(),
        "name": rm.name,
        "type": match rm.kind {
            depot_funds::FundAccountKind::Cash => "cash",
            depot_funds::FundAccountKind::Bank => "bank",
        },
        "initial_balance": rm.initial_balance,
        "balance": rm.balance,
        "created_at": rm.opened_at.to_rfc3339(),
    })
}

pub fn voucher_to_json(rm: &VoucherReadModel) -> serde_json::Value {
    serde_json::json!({
        "voucher_id": rm.voucher_id.to_string(),
        "account_id": rm.account_id.to_string(),
        "type": match rm.kind {
            depot_funds::VoucherKind::Receipt => "receipt",
            depot_funds::VoucherKind::Payment => "payment",
        },
        "amount": rm.amount,
        "description": rm.description,
        "created_at": rm.occurred_at.to_rfc3339(),
    })
}
