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

use depot_core::FundAccountId;
use depot_funds::{FundAccountKind, FundCommand, OpenAccount, RecordVoucher, VoucherKind};
use depot_infra::projections::fund_balances::VoucherFilter;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/accounts", post(open_account).get(list_accounts))
        .route("/vouchers", post(record_voucher).get(list_vouchers))
        .route("/initial-balance", get(get_initial_balance))
}

fn parse_account_kind(s: &str) -> Result<FundAccountKind, axum::response::Response> {
    match s.to_lowercase().as_str() {
        "cash" => Ok(FundAccountKind::Cash),
        "bank" => Ok(FundAccountKind::Bank),
        _ => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_account_type",
            "type must be one of: cash, bank",
        )),
    }
}

fn parse_voucher_kind(s: &str) -> Result<VoucherKind, axum::response::Response> {
    match s.to_lowercase().as_str() {
        "receipt" => Ok(VoucherKind::Receipt),
        "payment" => Ok(VoucherKind::Payment),
        _ => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_voucher_type",
            "type must be one of: receipt, payment",
        )),
    }
}

pub async fn open_account(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::OpenAccountRequest>,
) -> axum::response::Response {
    let kind = match parse_account_kind(&body.kind) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let account_id = FundAccountId::new();
    let cmd = FundCommand::OpenAccount(OpenAccount {
        account_id,
        name: body.name,
        kind,
        initial_balance: body.initial_balance.unwrap_or(0),
        occurred_at: Utc::now(),
    });

    match services.dispatch_fund(account_id, cmd) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "message": "Account created successfully",
                "account_id": account_id.to_string(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ListQuery>,
) -> axum::response::Response {
    let (page, limit) = match errors::parse_pagination(query.page.as_deref(), query.limit.as_deref())
    {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let accounts = services.funds.accounts();
    let total = accounts.len();
    let items: Vec<serde_json::Value> = accounts
        .iter()
        .skip((page - 1) * limit)
        .take(limit)
        .map(dto::fund_account_to_json)
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "accounts": items,
            "total": total,
            "page": page,
            "limit": limit,
        })),
    )
        .into_response()
}

pub async fn record_voucher(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RecordVoucherRequest>,
) -> axum::response::Response {
    let account_id: FundAccountId = match errors::parse_id(&body.account_id, "account") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if services.funds.account(account_id).is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "account not found");
    }

    let kind = match parse_voucher_kind(&body.kind) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let voucher_id = Uuid::now_v7();
    let cmd = FundCommand::RecordVoucher(RecordVoucher {
        account_id,
        voucher_id,
        kind,
        amount: body.amount,
        description: body.description,
        occurred_at: Utc::now(),
    });

    match services.dispatch_fund(account_id, cmd) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "message": "Voucher recorded successfully",
                "voucher_id": voucher_id.to_string(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_vouchers(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::VoucherListQuery>,
) -> axum::response::Response {
    let (from, to) =
        match errors::parse_date_range(query.start_date.as_deref(), query.end_date.as_deref()) {
            Ok(v) => v,
            Err(resp) => return resp,
        };

    let mut filter = VoucherFilter {
        from,
        to,
        ..VoucherFilter::default()
    };
    if let Some(raw) = query.account_id.as_deref() {
        filter.account_id = match errors::parse_id(raw, "account") {
            Ok(v) => Some(v),
            Err(resp) => return resp,
        };
    }
    if let Some(raw) = query.kind.as_deref() {
        filter.kind = match parse_voucher_kind(raw) {
            Ok(v) => Some(v),
            Err(resp) => return resp,
        };
    }

    let vouchers = services.funds.vouchers(filter);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "total": vouchers.len(),
            "vouchers": vouchers.iter().map(dto::voucher_to_json).collect::<Vec<_>>(),
        })),
    )
        .into_response()
}

pub async fn get_initial_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::InitialBalanceQuery>,
) -> axum::response::Response {
    let account_id: FundAccountId = match query.account_id.as_deref() {
        Some(raw) => match errors::parse_id(raw, "account") {
            Ok(v) => v,
            Err(resp) => return resp,
        },
        None => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "missing_account_id",
                "account_id is required",
            );
        }
    };

    let date = match query.date.as_deref() {
        Some(raw) => match errors::parse_date(raw) {
            Ok(d) => d,
            Err(resp) => return resp,
        },
        None => {
            return errors::json_error(StatusCode::BAD_REQUEST, "missing_date", "date is required");
        }
    };

    match services.funds.balance_at(account_id, errors::end_of_day(date)) {
        Some(balance) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "account_id": account_id.to_string(),
                "balance": balance,
                "date": date.format("%Y-%m-%d").to_string(),
            })),
        )
            .into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "account not found"),
    }
}
