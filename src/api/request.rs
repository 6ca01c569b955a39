//! Request construction
//!
//! Turns a resource, an operation and its parameters into a
//! [`RequestDescriptor`]. No I/O happens here.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::constants::{self, headers, media_types, params};
use super::filter::Filter;
use super::http::{HttpMethod, RequestBody, RequestDescriptor};
use super::resource::ResourceDescriptor;
use crate::error::{ApiError, Result};

/// A single operation against a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    GetById,
    Create,
    Update,
    UpdateMultiple,
    Delete,
    GetBinary,
}

impl Operation {
    /// HTTP method for this operation. Records are created with PUT and
    /// updated with POST.
    pub fn http_method(&self) -> HttpMethod {
        match self {
            Self::List | Self::GetById | Self::GetBinary => HttpMethod::Get,
            Self::Create => HttpMethod::Put,
            Self::Update | Self::UpdateMultiple => HttpMethod::Post,
            Self::Delete => HttpMethod::Delete,
        }
    }

    pub fn operation_type(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::GetById => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::UpdateMultiple => "update_multiple",
            Self::Delete => "delete",
            Self::GetBinary => "get_binary",
        }
    }

    fn requires_identity(&self) -> bool {
        matches!(self, Self::GetById | Self::GetBinary | Self::Update | Self::Delete)
    }

    fn carries_payload(&self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::UpdateMultiple)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation_type())
    }
}

/// Inputs for [`RequestBuilder::build`]
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pub filter: Filter,
    /// Explicit identity; falls back to the filter's identity
    pub identity: Option<String>,
    /// Entities for write operations, already serialized
    pub payload: Vec<Value>,
    /// Binary representation requested by `GetBinary` (defaults to PDF)
    pub media_type: Option<&'static str>,
}

impl RequestParams {
    pub fn filter(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn identity(id: impl Into<String>) -> Self {
        Self {
            identity: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn payload(payload: Vec<Value>) -> Self {
        Self {
            payload,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestBuilder {
    endpoint_base: String,
    tenant_id: Option<String>,
}

impl RequestBuilder {
    pub fn new(endpoint_base: impl Into<String>, tenant_id: Option<String>) -> Self {
        Self {
            endpoint_base: endpoint_base.into().trim_end_matches('/').to_string(),
            tenant_id,
        }
    }

    pub fn endpoint_base(&self) -> &str {
        &self.endpoint_base
    }

    pub fn build(
        &self,
        resource: &ResourceDescriptor,
        operation: Operation,
        request_params: &RequestParams,
    ) -> Result<RequestDescriptor> {
        if !resource.supports(operation) {
            return Err(ApiError::InvalidParameter(format!(
                "{} does not support {}",
                resource.name, operation
            )));
        }

        let accept = match operation {
            Operation::GetBinary => request_params.media_type.unwrap_or(media_types::PDF),
            _ => media_types::JSON,
        };
        let mut request_headers = vec![(headers::ACCEPT.to_string(), accept.to_string())];
        if let Some(tenant_id) = &self.tenant_id {
            request_headers.push((headers::TENANT_ID.to_string(), tenant_id.clone()));
        }

        let mut query = BTreeMap::new();

        let url = if operation.requires_identity() {
            let id = required_identity(resource, operation, request_params)?;
            constants::record_endpoint(&self.endpoint_base, resource.name, id)
        } else {
            constants::resource_endpoint(&self.endpoint_base, resource.name)
        };

        if operation == Operation::List {
            apply_filter(&request_params.filter, &mut query, &mut request_headers);
        }

        let body = if operation.carries_payload() {
            if request_params.payload.is_empty() {
                return Err(ApiError::InvalidParameter(format!(
                    "{} on {} requires at least one entity",
                    operation, resource.name
                )));
            }
            query.insert(params::SUMMARIZE_ERRORS.to_string(), "false".to_string());
            let mut envelope = serde_json::Map::new();
            envelope.insert(
                resource.plural_key.to_string(),
                Value::Array(request_params.payload.clone()),
            );
            Some(RequestBody::Json(Value::Object(envelope)))
        } else {
            None
        };

        Ok(RequestDescriptor {
            method: operation.http_method(),
            url,
            query,
            headers: request_headers,
            body,
        })
    }
}

fn required_identity<'a>(
    resource: &ResourceDescriptor,
    operation: Operation,
    request_params: &'a RequestParams,
) -> Result<&'a str> {
    request_params
        .identity
        .as_deref()
        .or_else(|| request_params.filter.identity_for(resource))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            ApiError::InvalidParameter(format!(
                "{} on {} requires `{}`",
                operation, resource.name, resource.identity_field
            ))
        })
}

fn apply_filter(
    filter: &Filter,
    query: &mut BTreeMap<String, String>,
    request_headers: &mut Vec<(String, String)>,
) {
    for (key, value) in &filter.params {
        query.insert(key.clone(), value.clone());
    }
    if let Some(where_clause) = &filter.where_clause {
        query.insert(params::WHERE.to_string(), where_clause.clone());
    }
    if let Some(order) = &filter.order {
        query.insert(params::ORDER.to_string(), order.clone());
    }
    if let Some(page) = filter.page {
        query.insert(params::PAGE.to_string(), page.to_string());
    }
    if filter.include_archived {
        query.insert(params::INCLUDE_ARCHIVED.to_string(), "true".to_string());
    }
    if !filter.ids.is_empty() {
        query.insert(params::IDS.to_string(), filter.ids.join(","));
    }
    if let Some(modified_after) = filter.modified_after {
        request_headers.push((
            headers::IF_MODIFIED_SINCE.to_string(),
            modified_after.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::resource::resources::{CONTACTS, INVOICES, JOURNALS};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn builder() -> RequestBuilder {
        RequestBuilder::new("https://api.xero.com/", None)
    }

    #[test]
    fn test_list_without_filter() {
        let req = builder()
            .build(&INVOICES, Operation::List, &RequestParams::default())
            .unwrap();

        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "https://api.xero.com/api.xro/2.0/Invoices");
        assert!(req.query.is_empty());
        assert!(req.body.is_none());
        assert_eq!(req.header("Accept"), Some("application/json"));
    }

    #[test]
    fn test_list_maps_filter_to_query() {
        let filter = Filter::new()
            .where_clause("Type==\"ACCREC\"")
            .order("Date")
            .page(3)
            .include_archived()
            .ids(["a", "b"])
            .param("Statuses", "DRAFT")
            .modified_after(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());

        let req = builder()
            .build(&INVOICES, Operation::List, &RequestParams::filter(filter))
            .unwrap();

        assert_eq!(req.query.get("where").map(String::as_str), Some("Type==\"ACCREC\""));
        assert_eq!(req.query.get("order").map(String::as_str), Some("Date"));
        assert_eq!(req.query.get("page").map(String::as_str), Some("3"));
        assert_eq!(req.query.get("includeArchived").map(String::as_str), Some("true"));
        assert_eq!(req.query.get("IDs").map(String::as_str), Some("a,b"));
        assert_eq!(req.query.get("Statuses").map(String::as_str), Some("DRAFT"));
        assert_eq!(req.header("If-Modified-Since"), Some("Fri, 01 Mar 2024 12:00:00 GMT"));
    }

    #[test]
    fn test_get_by_id_appends_identity() {
        let req = builder()
            .build(&INVOICES, Operation::GetById, &RequestParams::filter(Filter::by_id("inv-1")))
            .unwrap();

        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "https://api.xero.com/api.xro/2.0/Invoices/inv-1");
        assert!(req.query.is_empty());
    }

    #[test]
    fn test_get_by_id_without_identity_fails() {
        let err = builder()
            .build(&INVOICES, Operation::GetById, &RequestParams::default())
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidParameter(msg) if msg.contains("InvoiceID")));

        let err = builder()
            .build(&INVOICES, Operation::GetBinary, &RequestParams::identity("   "))
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidParameter(_)));
    }

    #[test]
    fn test_get_binary_selects_pdf() {
        let req = builder()
            .build(&INVOICES, Operation::GetBinary, &RequestParams::identity("inv-9"))
            .unwrap();

        assert_eq!(req.url, "https://api.xero.com/api.xro/2.0/Invoices/inv-9");
        assert_eq!(req.header("Accept"), Some("application/pdf"));
    }

    #[test]
    fn test_create_wraps_payload_under_plural_key() {
        let payload = vec![json!({"Type": "ACCREC"}), json!({"Type": "ACCPAY"})];
        let req = builder()
            .build(&INVOICES, Operation::Create, &RequestParams::payload(payload))
            .unwrap();

        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.url, "https://api.xero.com/api.xro/2.0/Invoices");
        assert_eq!(req.query.get("summarizeErrors").map(String::as_str), Some("false"));
        assert_eq!(
            req.json_body(),
            Some(&json!({"Invoices": [{"Type": "ACCREC"}, {"Type": "ACCPAY"}]}))
        );
    }

    #[test]
    fn test_update_multiple_uses_post() {
        let payload = vec![json!({"InvoiceID": "inv-1", "Status": "DELETED"})];
        let req = builder()
            .build(&INVOICES, Operation::UpdateMultiple, &RequestParams::payload(payload))
            .unwrap();

        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "https://api.xero.com/api.xro/2.0/Invoices");
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let err = builder()
            .build(&CONTACTS, Operation::Create, &RequestParams::default())
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidParameter(_)));
    }

    #[test]
    fn test_unsupported_operation_is_rejected() {
        let err = builder()
            .build(&JOURNALS, Operation::Create, &RequestParams::payload(vec![json!({})]))
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidParameter(msg) if msg.contains("Journals")));
    }

    #[test]
    fn test_tenant_header() {
        let builder = RequestBuilder::new("https://api.xero.com", Some("tenant-1".to_string()));
        let req = builder
            .build(&CONTACTS, Operation::List, &RequestParams::default())
            .unwrap();
        assert_eq!(req.header("xero-tenant-id"), Some("tenant-1"));
    }
}
