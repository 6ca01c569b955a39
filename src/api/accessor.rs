//! Per-resource access
//!
//! A [`ResourceAccessor`] binds one [`ResourceDescriptor`] to the shared
//! session. All resources share this implementation; their differences live in
//! the descriptor.

use log::{debug, info};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use super::constants::{PAGE_SIZE, media_types};
use super::dispatch::Dispatcher;
use super::entity::Entity;
use super::files::FileWriter;
use super::filter::Filter;
use super::request::{Operation, RequestBuilder, RequestParams};
use super::resource::ResourceDescriptor;
use super::response::{BinaryPayload, Collection, Record, ResponseDecoder};
use crate::error::{ApiError, Result};

/// Everything an accessor needs to run a call, shared by all accessors of one
/// client
pub struct Session {
    pub(crate) builder: RequestBuilder,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) decoder: ResponseDecoder,
    pub(crate) files: Arc<dyn FileWriter>,
}

impl Session {
    pub fn new(builder: RequestBuilder, dispatcher: Dispatcher, files: Arc<dyn FileWriter>) -> Self {
        Self {
            builder,
            dispatcher,
            decoder: ResponseDecoder::new(),
            files,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

pub struct ResourceAccessor<E = Entity> {
    resource: ResourceDescriptor,
    session: Arc<Session>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for ResourceAccessor<E> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource,
            session: Arc::clone(&self.session),
            _entity: PhantomData,
        }
    }
}

impl<E> std::fmt::Debug for ResourceAccessor<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceAccessor")
            .field("resource", &self.resource.name)
            .finish()
    }
}

impl<E: DeserializeOwned> ResourceAccessor<E> {
    pub fn new(resource: ResourceDescriptor, session: Arc<Session>) -> Self {
        Self {
            resource,
            session,
            _entity: PhantomData,
        }
    }

    pub fn resource(&self) -> &ResourceDescriptor {
        &self.resource
    }

    /// The same resource decoded into a caller-defined type
    pub fn typed<T: DeserializeOwned>(&self) -> ResourceAccessor<T> {
        ResourceAccessor::new(self.resource, Arc::clone(&self.session))
    }

    /// Fetch records. A filter carrying an identity fetches that one record,
    /// still wrapped in a collection.
    pub async fn get(&self, filter: &Filter) -> Result<Collection<E>> {
        let (operation, expected_len) = match filter.identity_for(&self.resource) {
            Some(_) => (Operation::GetById, Some(1)),
            None => (Operation::List, None),
        };

        self.fetch_collection(operation, RequestParams::filter(filter.clone()), expected_len)
            .await
    }

    pub async fn get_all(&self) -> Result<Collection<E>> {
        self.get(&Filter::new()).await
    }

    /// Walk pages starting at the filter's page (or 1) until a short page.
    /// Resources without server paging are fetched in one call.
    pub async fn get_all_pages(&self, filter: &Filter) -> Result<Vec<Record<E>>> {
        if !self.resource.capabilities.paginated || filter.identity_for(&self.resource).is_some() {
            return Ok(self.get(filter).await?.records);
        }

        let mut page = filter.current_page().unwrap_or(1);
        let mut pages_fetched = 0;
        let mut records = Vec::new();

        loop {
            let collection = self.get(&filter.clone().page(page)).await?;
            let fetched = collection.len();
            pages_fetched += 1;
            debug!("{} page {} returned {} records", self.resource.name, page, fetched);
            records.extend(collection.records);

            if fetched < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        info!(
            "Fetched {} {} across {} pages",
            records.len(),
            self.resource.name,
            pages_fetched
        );
        Ok(records)
    }

    /// Create several records in one request. Records the server rejects come
    /// back with [`Outcome::Rejected`](super::response::Outcome), in input order.
    pub async fn create<P: Serialize>(&self, payload: &[P]) -> Result<Collection<E>> {
        self.write_batch(Operation::Create, payload).await
    }

    /// Update several records in one request, e.g. setting `Status` to
    /// `DELETED` or `VOIDED`
    pub async fn update_multiple<P: Serialize>(&self, payload: &[P]) -> Result<Collection<E>> {
        self.write_batch(Operation::UpdateMultiple, payload).await
    }

    pub async fn update<P: Serialize>(&self, id: &str, partial: &P) -> Result<Collection<E>> {
        let request_params = RequestParams {
            identity: Some(id.to_string()),
            payload: vec![to_value(partial)?],
            ..RequestParams::default()
        };

        let collection = self
            .fetch_collection(Operation::Update, request_params, Some(1))
            .await?;
        self.log_outcome(Operation::Update, &collection);
        Ok(collection)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let request = self.session.builder.build(
            &self.resource,
            Operation::Delete,
            &RequestParams::identity(id),
        )?;

        let decoder = self.session.decoder;
        self.session
            .dispatcher
            .execute(&self.resource, Operation::Delete, &request, |response| {
                decoder.check_status(&response)
            })
            .await
    }

    /// Binary (PDF) representation of the record the filter identifies
    pub async fn get_pdf(&self, filter: &Filter) -> Result<BinaryPayload> {
        let request_params = RequestParams {
            filter: filter.clone(),
            media_type: Some(media_types::PDF),
            ..RequestParams::default()
        };
        let request = self
            .session
            .builder
            .build(&self.resource, Operation::GetBinary, &request_params)?;

        let decoder = self.session.decoder;
        let payload = self
            .session
            .dispatcher
            .execute(&self.resource, Operation::GetBinary, &request, |response| {
                decoder.decode_binary(response, media_types::PDF)
            })
            .await?;

        if payload.is_empty() {
            return Err(ApiError::Decode(format!(
                "{} returned an empty {} document",
                self.resource.name,
                media_types::PDF
            )));
        }
        Ok(payload)
    }

    /// Fetch the PDF for the identified record and write it to `destination`
    pub async fn save_pdf(&self, filter: &Filter, destination: impl AsRef<Path>) -> Result<()> {
        let destination = destination.as_ref();
        let payload = self.get_pdf(filter).await?;

        self.session
            .files
            .write(destination, &payload.bytes)
            .await
            .map_err(|source| ApiError::FileWrite {
                path: destination.to_path_buf(),
                source,
            })?;

        info!("Saved {} bytes to {}", payload.len(), destination.display());
        Ok(())
    }

    async fn write_batch<P: Serialize>(&self, operation: Operation, payload: &[P]) -> Result<Collection<E>> {
        let values = payload.iter().map(to_value).collect::<Result<Vec<_>>>()?;
        let submitted = values.len();

        let collection = self
            .fetch_collection(operation, RequestParams::payload(values), Some(submitted))
            .await?;
        self.log_outcome(operation, &collection);
        Ok(collection)
    }

    async fn fetch_collection(
        &self,
        operation: Operation,
        request_params: RequestParams,
        expected_len: Option<usize>,
    ) -> Result<Collection<E>> {
        let request = self
            .session
            .builder
            .build(&self.resource, operation, &request_params)?;

        let decoder = self.session.decoder;
        let resource = self.resource;
        self.session
            .dispatcher
            .execute(&self.resource, operation, &request, |response| {
                decoder.decode_collection(response, &resource, expected_len)
            })
            .await
    }

    fn log_outcome(&self, operation: Operation, collection: &Collection<E>) {
        let rejected = collection.rejected().count();
        self.session.dispatcher.logger().log_batch_outcome(
            self.resource.name,
            operation.operation_type(),
            collection.len(),
            rejected,
        );
    }
}

fn to_value<P: Serialize>(partial: &P) -> Result<Value> {
    serde_json::to_value(partial).map_err(|e| ApiError::Serialization(e.to_string()))
}
