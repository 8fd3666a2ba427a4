//! Tower [`Service`] adapter for [`FallbackConnection`].

use crate::error::CacheError;
use crate::FallbackConnection;
use bytes::Bytes;
use cache_fallback_core::{CacheBackend, CacheRecord, Key};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

/// A cache operation expressed as a request value.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheRequest {
    /// Fetch a record.
    Get(Key),
    /// Store a value.
    Set {
        /// Where to store it.
        key: Key,
        /// The payload.
        value: Bytes,
        /// How long it stays valid.
        ttl: Duration,
    },
    /// Remove a record.
    Delete(Key),
}

impl CacheRequest {
    /// The key this request targets.
    pub fn key(&self) -> &Key {
        match self {
            CacheRequest::Get(key) | CacheRequest::Delete(key) => key,
            CacheRequest::Set { key, .. } => key,
        }
    }
}

/// The result of a [`CacheRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum CacheResponse {
    /// Answer to [`CacheRequest::Get`].
    Item(Option<CacheRecord>),
    /// Answer to [`CacheRequest::Set`].
    Stored,
    /// Answer to [`CacheRequest::Delete`].
    Deleted,
}

impl CacheResponse {
    /// Returns the fetched record, if this is a `Get` answer that found one.
    pub fn into_item(self) -> Option<CacheRecord> {
        match self {
            CacheResponse::Item(record) => record,
            CacheResponse::Stored | CacheResponse::Deleted => None,
        }
    }
}

impl<P, S> Service<CacheRequest> for FallbackConnection<P, S>
where
    P: CacheBackend,
    S: CacheBackend,
{
    type Response = CacheResponse;
    type Error = CacheError;
    type Future = BoxFuture<'static, Result<CacheResponse, CacheError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Backend availability is handled per call by the fallback itself.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: CacheRequest) -> Self::Future {
        let connection = self.clone();
        Box::pin(async move {
            match request {
                CacheRequest::Get(key) => connection.get(&key).await.map(CacheResponse::Item),
                CacheRequest::Set { key, value, ttl } => {
                    connection.set(&key, value, ttl).await?;
                    Ok(CacheResponse::Stored)
                }
                CacheRequest::Delete(key) => {
                    connection.delete(&key).await?;
                    Ok(CacheResponse::Deleted)
                }
            }
        })
    }
}
