// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! PostgREST sink (the REST interface Supabase exposes).
//!
//! - insert: `POST   {base}/rest/v1/{table}` with a one-row array
//! - update: `PATCH  {base}/rest/v1/{table}?id=eq.{id}` with the changes
//! - delete: `DELETE {base}/rest/v1/{table}?id=eq.{id}`
//!
//! Any non-2xx status is a [`SinkError::Rejected`] carrying the response body.

use reqwest::{Method, RequestBuilder};

use rq_core::item::ID_COLUMN;
use rq_core::{Row, RowId};

use super::{RemoteSink, SinkError, SinkFuture, SinkResult};
use crate::config::RemoteConfig;

/// Remote sink speaking PostgREST over HTTP.
#[derive(Debug, Clone)]
pub struct RestSink {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    schema: Option<String>,
}

impl RestSink {
    /// Creates a sink for the configured endpoint.
    pub fn new(config: &RemoteConfig) -> SinkResult<Self> {
        if let Some(msg) = config.validate_url() {
            return Err(SinkError::Other(msg));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SinkError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(RestSink {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            schema: config.schema.clone(),
        })
    }

    /// Endpoint for a table.
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=minimal");
        if let Some(schema) = &self.schema {
            req = req
                .header("Content-Profile", schema)
                .header("Accept-Profile", schema);
        }
        req
    }

    fn insert_request(&self, table: &str, row: &Row) -> RequestBuilder {
        self.request(Method::POST, table).json(&[row])
    }

    fn update_request(&self, table: &str, id: &RowId, changes: &Row) -> RequestBuilder {
        self.request(Method::PATCH, table)
            .query(&row_filter(id))
            .json(changes)
    }

    fn delete_request(&self, table: &str, id: &RowId) -> RequestBuilder {
        self.request(Method::DELETE, table).query(&row_filter(id))
    }
}

/// PostgREST horizontal filter selecting one row by id.
fn row_filter(id: &RowId) -> [(&'static str, String); 1] {
    [(ID_COLUMN, format!("eq.{id}"))]
}

async fn execute(req: RequestBuilder) -> SinkResult<()> {
    let response = req.send().await.map_err(transport_error)?;
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let message = response.text().await.unwrap_or_default();
    Err(SinkError::Rejected {
        status: status.as_u16(),
        message,
    })
}

fn transport_error(e: reqwest::Error) -> SinkError {
    if e.is_timeout() {
        SinkError::Timeout
    } else {
        SinkError::Network(e.to_string())
    }
}

impl RemoteSink for RestSink {
    fn insert<'a>(&'a self, table: &'a str, row: &'a Row) -> SinkFuture<'a> {
        Box::pin(execute(self.insert_request(table, row)))
    }

    fn update<'a>(&'a self, table: &'a str, id: &'a RowId, changes: &'a Row) -> SinkFuture<'a> {
        Box::pin(execute(self.update_request(table, id, changes)))
    }

    fn delete<'a>(&'a self, table: &'a str, id: &'a RowId) -> SinkFuture<'a> {
        Box::pin(execute(self.delete_request(table, id)))
    }
}

#[cfg(test)]
#[path = "rest_tests.rs"]
mod tests;
