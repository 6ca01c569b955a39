//! Fluent filter for collection and single-record reads

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::resource::ResourceDescriptor;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub(crate) id: Option<String>,
    pub(crate) ids: Vec<String>,
    pub(crate) where_clause: Option<String>,
    pub(crate) order: Option<String>,
    pub(crate) page: Option<u32>,
    pub(crate) include_archived: bool,
    pub(crate) modified_after: Option<DateTime<Utc>>,
    pub(crate) params: BTreeMap<String, String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter selecting a single record by identity
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new().id(id)
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Restrict a listing to several identities
    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Server-side `where` expression, e.g. `Status=="AUTHORISED"`
    pub fn where_clause(mut self, expression: impl Into<String>) -> Self {
        self.where_clause = Some(expression.into());
        self
    }

    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn include_archived(mut self) -> Self {
        self.include_archived = true;
        self
    }

    /// Only records modified after this instant (sent as `If-Modified-Since`)
    pub fn modified_after(mut self, instant: DateTime<Utc>) -> Self {
        self.modified_after = Some(instant);
        self
    }

    /// Free-form parameter. A key equal to the resource's identity field
    /// selects a single record, the same as [`Filter::id`].
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Identity selected by this filter for the given resource
    pub fn identity_for(&self, resource: &ResourceDescriptor) -> Option<&str> {
        self.id
            .as_deref()
            .or_else(|| self.params.get(resource.identity_field).map(String::as_str))
    }

    pub(crate) fn current_page(&self) -> Option<u32> {
        self.page
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::resource::resources::{CONTACTS, INVOICES};

    #[test]
    fn test_identity_from_id() {
        let filter = Filter::by_id("inv-1");
        assert_eq!(filter.identity_for(&INVOICES), Some("inv-1"));
    }

    #[test]
    fn test_identity_from_identity_field_param() {
        let filter = Filter::new().param("InvoiceID", "inv-2");
        assert_eq!(filter.identity_for(&INVOICES), Some("inv-2"));
        // Only the resource's own identity field counts
        assert_eq!(filter.identity_for(&CONTACTS), None);
    }

    #[test]
    fn test_builder_chain() {
        let filter = Filter::new()
            .where_clause("Status==\"AUTHORISED\"")
            .order("Date DESC")
            .page(2)
            .include_archived();

        assert_eq!(filter.where_clause.as_deref(), Some("Status==\"AUTHORISED\""));
        assert_eq!(filter.order.as_deref(), Some("Date DESC"));
        assert_eq!(filter.current_page(), Some(2));
        assert!(filter.include_archived);
        assert_eq!(filter.identity_for(&INVOICES), None);
    }
}
