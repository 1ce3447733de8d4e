// src/client.rs
// The query executor: glues the transport link, the operation cache and the
// session store together. UI code talks to this type and to the lifecycle
// controller in `auth`; nothing else touches the transports directly.

use std::sync::Arc;

use futures::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::cache::{FetchRole, OperationCache};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::graphql::{Operation, OperationKind};
use crate::session::SessionStore;
use crate::transport::TransportLink;

/// A decoded value plus its freshness flag.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub data: T,
    /// True when this came straight from cache and has not been revalidated.
    pub stale: bool,
}

pub struct Client {
    session: Arc<SessionStore>,
    link: Arc<TransportLink>,
    cache: Arc<OperationCache>,
}

impl Client {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let session = Arc::new(SessionStore::load(&config.session_file));
        let link = Arc::new(TransportLink::new(config, session.clone())?);
        Ok(Self::with_parts(session, link))
    }

    /// Assemble from explicit parts. Tests use this to substitute scripted
    /// transports.
    pub fn with_parts(session: Arc<SessionStore>, link: Arc<TransportLink>) -> Self {
        Client {
            session,
            link,
            cache: Arc::new(OperationCache::new()),
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn cache(&self) -> &Arc<OperationCache> {
        &self.cache
    }

    /// Network read with in-flight de-duplication: concurrent identical
    /// reads share one transport call. Updates the cache on success.
    pub async fn query<T: DeserializeOwned>(&self, op: &Operation) -> Result<T, ClientError> {
        let value = self.fetch(op, false).await?;
        decode(op, value)
    }

    /// Network read that always hits the transport. Used by poll ticks and
    /// post-mutation refetches, which must not attach to an older in-flight
    /// request.
    pub async fn refetch<T: DeserializeOwned>(&self, op: &Operation) -> Result<T, ClientError> {
        let value = self.fetch(op, true).await?;
        decode(op, value)
    }

    /// Instant cache read; `None` on a miss.
    pub fn cached<T: DeserializeOwned>(&self, op: &Operation) -> Option<Snapshot<T>> {
        let cached = self.cache.get(&op.cache_key())?;
        match decode::<T>(op, cached.value) {
            Ok(data) => Some(Snapshot {
                data,
                stale: cached.stale,
            }),
            Err(e) => {
                warn!(operation = op.name, error = %e, "cached value no longer decodes, ignoring");
                None
            }
        }
    }

    /// Stale-while-revalidate read: yields the cached snapshot immediately
    /// when present, then the revalidated network result.
    pub fn read<'a, T: DeserializeOwned + 'a>(
        &'a self,
        op: &Operation,
    ) -> impl Stream<Item = Result<Snapshot<T>, ClientError>> + 'a {
        let op = op.clone();
        async_stream::try_stream! {
            if let Some(snapshot) = self.cached::<T>(&op) {
                yield Snapshot { data: snapshot.data, stale: true };
            }
            let data: T = self.query(&op).await?;
            yield Snapshot { data, stale: false };
        }
    }

    /// Run a mutation. Mutations never read from cache; on success each
    /// operation in `refetch` is marked stale and refetched so dependent
    /// views update without a manual reload.
    pub async fn mutate<T: DeserializeOwned>(
        &self,
        op: &Operation,
        refetch: &[Operation],
    ) -> Result<T, ClientError> {
        if op.kind != OperationKind::Mutation {
            return Err(ClientError::transport(format!(
                "operation {} is not a mutation",
                op.name
            )));
        }
        let value = self.execute_guarded(op).await?;
        let data = decode(op, value)?;
        for dep in refetch {
            self.cache.mark_stale(&dep.cache_key());
            if let Err(e) = self.fetch(dep, true).await {
                warn!(operation = dep.name, error = %e, "refetch after mutation failed");
            }
        }
        Ok(data)
    }

    /// Open a typed subscription stream over the shared streaming channel.
    /// A credential rejection, whether at subscribe time or pushed
    /// mid-stream, tears the session down like any other unauthorized
    /// result.
    pub async fn subscribe<T: DeserializeOwned>(
        &self,
        op: &Operation,
    ) -> Result<impl Stream<Item = Result<T, ClientError>> + Unpin + use<T>, ClientError> {
        let stream = match self.link.subscribe(op).await {
            Ok(stream) => stream,
            Err(err) => {
                if err.is_unauthorized() {
                    warn!(operation = op.name, "authorization failure, tearing session down");
                    self.teardown();
                }
                return Err(err);
            }
        };
        let op = op.clone();
        let session = self.session.clone();
        let cache = self.cache.clone();
        let link = self.link.clone();
        Ok(futures::StreamExt::map(stream, move |item| {
            let item = item.and_then(|value| decode(&op, value));
            if let Err(err) = &item {
                if err.is_unauthorized() {
                    warn!(operation = op.name, "authorization failure, tearing session down");
                    teardown(&session, &cache, &link);
                }
            }
            item
        }))
    }

    async fn fetch(&self, op: &Operation, forced: bool) -> Result<Value, ClientError> {
        let key = op.cache_key();
        match self.cache.begin_fetch(&key, forced) {
            FetchRole::Leader(ticket) => {
                let result = self.execute_guarded(op).await;
                self.cache.complete_fetch(ticket, result.clone());
                result
            }
            FetchRole::Follower(mut pending) => loop {
                if let Some(result) = pending.borrow_and_update().clone() {
                    return result;
                }
                if pending.changed().await.is_err() {
                    return Err(ClientError::transport("in-flight request was abandoned"));
                }
            },
        }
    }

    async fn execute_guarded(&self, op: &Operation) -> Result<Value, ClientError> {
        let result = self.link.execute(op).await;
        if let Err(err) = &result {
            // authorization failures are handled centrally: one rejected
            // credential tears the whole session down
            if err.is_unauthorized() {
                warn!(operation = op.name, "authorization failure, tearing session down");
                self.teardown();
            }
        }
        result
    }

    /// Clear the session, purge the cache and close the streaming channel.
    pub(crate) fn teardown(&self) {
        teardown(&self.session, &self.cache, &self.link);
    }
}

fn teardown(session: &SessionStore, cache: &OperationCache, link: &TransportLink) {
    session.clear_session();
    cache.purge();
    link.shutdown_channel();
}

fn decode<T: DeserializeOwned>(op: &Operation, data: Value) -> Result<T, ClientError> {
    let node = match data {
        Value::Object(mut map) => map.remove(op.root_field).unwrap_or(Value::Null),
        other => other,
    };
    serde_json::from_value(node)
        .map_err(|e| ClientError::transport(format!("failed to decode {} response: {e}", op.name)))
}
