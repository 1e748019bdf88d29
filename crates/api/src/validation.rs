//! Validation for API query parameters.

use std::str::FromStr;

use alloy_primitives::Address;
use serde::Deserialize;
use storage::EventQuery;

use crate::{types::ErrorResponse, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Query parameters of `GET /events`.
#[derive(Debug, Default, Deserialize)]
pub struct EventsParams {
    /// Filter on the sender address
    pub from: Option<String>,
    /// Filter on the recipient address
    pub to: Option<String>,
    /// Lowest block number to include
    pub start_block: Option<u64>,
    /// Highest block number to include
    pub end_block: Option<u64>,
    /// 1-based page number
    pub page: Option<u64>,
    /// Page size, clamped to [`MAX_PAGE_SIZE`]
    pub page_size: Option<u64>,
}

/// Normalize and validate the query into a storage filter.
pub fn validate_events_params(params: &EventsParams) -> Result<EventQuery, ErrorResponse> {
    let from = params.from.as_deref().map(normalize_address_param).transpose()?;
    let to = params.to.as_deref().map(normalize_address_param).transpose()?;

    if let (Some(start), Some(end)) = (params.start_block, params.end_block) {
        if start > end {
            return Err(ErrorResponse::bad_request("start_block must not exceed end_block"));
        }
    }

    let page = params.page.unwrap_or(1);
    if page == 0 {
        return Err(ErrorResponse::bad_request("page is 1-based"));
    }
    let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    Ok(EventQuery {
        from,
        to,
        start_block: params.start_block,
        end_block: params.end_block,
        page,
        page_size,
    })
}

/// Parse a user-supplied address and render it in the lowercase form used
/// for matching stored rows.
fn normalize_address_param(raw: &str) -> Result<String, ErrorResponse> {
    Address::from_str(raw.trim())
        .map(|address| primitives::transfer::normalize_address(&address))
        .map_err(|_| ErrorResponse::bad_request(format!("invalid address: {raw:?}")))
}
