//! Persisted query resolution.

use gqlserve_core::{
    DocumentParser, InvariantViolation, OperationParams, RequestError, ServerResult,
};
use tracing::debug;

use crate::config::{PersistedQuery, PersistedQueryLoader};

/// Resolves `queryId` requests through the configured loader.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistedQueryResolver;

impl PersistedQueryResolver {
    /// Looks up `query_id`.
    ///
    /// Without a loader the request is rejected in-band. A loader that
    /// finds nothing to return is a configuration defect.
    pub fn resolve<D>(
        loader: Option<&PersistedQueryLoader<D>>,
        query_id: &str,
        params: &OperationParams,
    ) -> ServerResult<PersistedQuery<D>> {
        let loader = loader.ok_or_else(|| {
            RequestError::new("Persisted queries are not supported by this server")
        })?;

        debug!(query_id, "Loading persisted query");
        match loader(query_id, params)? {
            Some(query) => Ok(query),
            None => Err(InvariantViolation::new(format!(
                "Persisted query loader must return query string or parsed document, but got nothing for \"{query_id}\""
            ))
            .into()),
        }
    }

    /// Looks up `query_id` and parses it if the loader returned source text.
    pub fn load_document<P: DocumentParser>(
        parser: &P,
        loader: Option<&PersistedQueryLoader<P::Document>>,
        query_id: &str,
        params: &OperationParams,
    ) -> ServerResult<P::Document> {
        match Self::resolve(loader, query_id, params)? {
            PersistedQuery::Document(document) => Ok(document),
            PersistedQuery::Source(source) => Ok(parser.parse(&source)?),
        }
    }
}
