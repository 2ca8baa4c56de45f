use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;

use depot_core::DomainError;
use depot_infra::command_dispatcher::DispatchError;
use depot_inventory::TransferKind;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::Rejected(domain) => {
            let code = match &domain {
                DomainError::InsufficientStock { .. } => "insufficient_stock",
                DomainError::InsufficientFunds { .. } => "insufficient_funds",
                _ => "rejected",
            };
            json_error(StatusCode::BAD_REQUEST, code, domain.to_string())
        }
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        // Backend failures surface a stable code with a generic message; the
        // underlying error text stays in the logs.
        DispatchError::Deserialize(msg) => {
            tracing::error!("event replay failed: {msg}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", "event replay failed")
        }
        DispatchError::Store(e) => {
            tracing::error!("event store failure: {e}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "event store failure")
        }
        DispatchError::Publish(msg) => {
            tracing::error!("event publication failed: {msg}");
            json_error(StatusCode::BAD_GATEWAY, "publish_error", "event publication failed")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a typed identifier from its string form.
pub fn parse_id<T: core::str::FromStr>(
    value: &str,
    what: &'static str,
) -> Result<T, axum::response::Response> {
    value.parse::<T>().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id"),
        )
    })
}

/// Validate `page` / `limit` query parameters (defaults 1 / 10).
pub fn parse_pagination(
    page: Option<&str>,
    limit: Option<&str>,
) -> Result<(usize, usize), axum::response::Response> {
    let page = match page {
        None => 1,
        Some(raw) => match raw.parse::<usize>() {
            Ok(p) if p >= 1 => p,
            _ => {
                return Err(json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_page",
                    "Page must be a positive integer.",
                ));
            }
        },
    };

    let limit = match limit {
        None => 10,
        Some(raw) => match raw.parse::<usize>() {
            Ok(l) if (1..=100).contains(&l) => l,
            _ => {
                return Err(json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_limit",
                    "Limit must be between 1 and 100.",
                ));
            }
        },
    };

    Ok((page, limit))
}

/// Parse a `YYYY-MM-DD` query date.
pub fn parse_date(value: &str) -> Result<NaiveDate, axum::response::Response> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_date",
            "Dates must use the YYYY-MM-DD format.",
        )
    })
}

/// Parse an optional `start_date`/`end_date` pair into inclusive instants
/// (start of day / end of day) and range-check them.
pub fn parse_date_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), axum::response::Response> {
    let start = start.map(parse_date).transpose()?;
    let end = end.map(parse_date).transpose()?;

    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(json_error(
                StatusCode::BAD_REQUEST,
                "invalid_date_range",
                "Start date must be before end date.",
            ));
        }
    }

    Ok((start.map(start_of_day), end.map(end_of_day)))
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + chrono::Duration::seconds(86_399)
}

pub fn parse_transfer_kind(s: &str) -> Result<TransferKind, axum::response::Response> {
    match s.to_lowercase().as_str() {
        "internal" => Ok(TransferKind::Internal),
        "repair" => Ok(TransferKind::Repair),
        "discard" => Ok(TransferKind::Discard),
        _ => Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_transfer_type",
            "type must be one of: internal, repair, discard",
        )),
    }
}
