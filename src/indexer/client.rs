//!
//! JSON-RPC client for a Sui fullnode.
//!
//! This module provides an async client for the `suix_queryEvents` endpoint. The client performs
//! exactly one HTTP round trip per call; retry policy belongs to the caller.

use super::LedgerEventSource;
use super::types::*;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Sui fullnode JSON-RPC client
#[derive(Clone)]
pub struct SuiRpcClient {
	/// The underlying HTTP client for RPC calls.
	http_client: Client,
	/// The fullnode JSON-RPC endpoint.
	rpc_url: String,
}

impl SuiRpcClient {
	/// Create a new RPC client.
	///
	/// # Arguments
	/// * `rpc_url` - The fullnode JSON-RPC endpoint.
	/// * `timeout` - Per-request timeout, covering connect and body.
	pub fn new(rpc_url: String, timeout: Duration) -> Result<Self, IndexerError> {
		let http_client = Client::builder().timeout(timeout).build()?;

		Ok(Self {
			http_client,
			rpc_url,
		})
	}

	/// Execute a JSON-RPC call and return its `result` member.
	///
	/// # Errors
	/// `Http` for transport failures and timeouts, `Status` for non-success responses, `Rpc` when
	/// the node answers with an error object and `Malformed` when neither `result` nor `error` is
	/// present.
	pub async fn execute_rpc(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<serde_json::Value, IndexerError> {
		let request_body = json!({
			"jsonrpc": "2.0",
			"id": 1,
			"method": method,
			"params": params,
		});

		let response = self
			.http_client
			.post(&self.rpc_url)
			.header("Content-Type", "application/json")
			.json(&request_body)
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(IndexerError::Status(response.status()));
		}

		let mut response_json: serde_json::Value = response.json().await?;
		extract_result(&mut response_json)
	}
}

/// Pull `result` out of a JSON-RPC response envelope.
fn extract_result(response: &mut serde_json::Value) -> Result<serde_json::Value, IndexerError> {
	if let Some(error) = response.get("error") {
		let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or_default();
		let message = error
			.get("message")
			.and_then(|m| m.as_str())
			.unwrap_or("unknown RPC error")
			.to_string();
		return Err(IndexerError::Rpc { code, message });
	}

	response
		.get_mut("result")
		.map(serde_json::Value::take)
		.ok_or_else(|| IndexerError::Malformed("response has neither result nor error".to_string()))
}

/// Decode a `suix_queryEvents` result into a page.
fn decode_page(result: serde_json::Value) -> Result<EventPage, IndexerError> {
	Ok(serde_json::from_value(result)?)
}

fn query_params(query: &EventQuery) -> serde_json::Value {
	json!([
		query.filter,
		query.cursor,
		query.limit,
		query.order.is_descending(),
	])
}

#[async_trait]
impl LedgerEventSource for SuiRpcClient {
	async fn query_events(&self, query: &EventQuery) -> Result<EventPage, IndexerError> {
		debug!(
			"suix_queryEvents cursor={:?} limit={} order={:?}",
			query.cursor, query.limit, query.order
		);

		let result = self.execute_rpc("suix_queryEvents", query_params(query)).await?;
		decode_page(result)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn query_params_are_positional() {
		let query = EventQuery::ascending(
			EventFilter::move_module("0xabc", "vault"),
			Some(EventId::new("Digest1", 4)),
			25,
		);
		assert_eq!(
			query_params(&query),
			json!([
				{ "MoveModule": { "package": "0xabc", "module": "vault" } },
				{ "txDigest": "Digest1", "eventSeq": "4" },
				25,
				false
			])
		);
	}

	#[test]
	fn head_query_has_null_cursor_and_descends() {
		let query = EventQuery::head(EventFilter::move_module("0xabc", "vault"));
		let params = query_params(&query);
		assert_eq!(params[1], serde_json::Value::Null);
		assert_eq!(params[2], json!(1));
		assert_eq!(params[3], json!(true));
	}

	#[test]
	fn extract_result_surfaces_rpc_errors() {
		let mut response = json!({
			"jsonrpc": "2.0",
			"id": 1,
			"error": { "code": -32602, "message": "Invalid params" }
		});
		match extract_result(&mut response) {
			Err(IndexerError::Rpc { code, message }) => {
				assert_eq!(code, -32602);
				assert_eq!(message, "Invalid params");
			}
			other => panic!("expected Rpc error, got {other:?}"),
		}
	}

	#[test]
	fn extract_result_requires_result_member() {
		let mut response = json!({ "jsonrpc": "2.0", "id": 1 });
		assert!(matches!(
			extract_result(&mut response),
			Err(IndexerError::Malformed(_))
		));
	}

	#[test]
	fn decode_page_reads_string_encoded_numbers() {
		let page = decode_page(json!({
			"data": [{
				"id": { "txDigest": "Digest1", "eventSeq": "3" },
				"packageId": "0xabc",
				"transactionModule": "vault",
				"sender": "0xs",
				"type": "0xabc::vault::CoinDeposited",
				"parsedJson": { "vault_id": "V1" },
				"timestampMs": "1700000000000"
			}],
			"nextCursor": { "txDigest": "Digest1", "eventSeq": "3" },
			"hasNextPage": false
		}))
		.unwrap();

		assert_eq!(page.data.len(), 1);
		assert_eq!(page.data[0].id, EventId::new("Digest1", 3));
		assert_eq!(page.next_cursor, Some(EventId::new("Digest1", 3)));
		assert!(!page.has_next_page);
	}

	#[test]
	fn decode_page_rejects_unexpected_shape_permanently() {
		let error = decode_page(json!({ "data": "not a list", "hasNextPage": false })).unwrap_err();

		assert!(matches!(error, IndexerError::Json(_)));
		assert!(!error.is_transient());
	}

	#[test]
	fn extract_result_takes_result() {
		let mut response = json!({ "jsonrpc": "2.0", "id": 1, "result": { "data": [] } });
		assert_eq!(extract_result(&mut response).unwrap(), json!({ "data": [] }));
	}
}
