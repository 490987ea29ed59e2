//! Message router
//!
//! Each inbound message goes `Received -> Routed -> Replied`, or
//! `Received -> Routed -> NoReplyNeeded` for unacknowledged inserts. The
//! router keeps no per-message state between calls; everything it mutates
//! lives in the [`CollectionStore`] it owns.

use std::time::Instant;

use bson::Document;
use tracing::{debug, warn};

use mongolite_common::metrics;

use crate::command::{CommandRegistry, DATABASE_FIELD};
use crate::message::{ClientContext, Message, Reply, COMMAND_NAMESPACE_SUFFIX};
use crate::query;
use crate::store::CollectionStore;

/// Router behaviour switches
#[derive(Debug, Clone, Copy, Default)]
pub struct RouterOptions {
    /// Answer every insert with an empty reply instead of staying silent
    pub acknowledge_inserts: bool,
}

/// Final state of one routed message
#[derive(Debug, Clone, PartialEq)]
pub enum RouteResult {
    /// Send this reply back on the connection
    Replied(Reply),
    /// Handled; the client expects nothing back
    NoReplyNeeded,
    /// No handling path exists for this message
    Unhandled,
}

/// Owns the store and the command table and dispatches messages to them
pub struct Router {
    store: CollectionStore,
    commands: CommandRegistry,
    options: RouterOptions,
}

impl Router {
    /// Router with default options and the built-in commands
    pub fn new() -> Self {
        Self::with_options(RouterOptions::default())
    }

    pub fn with_options(options: RouterOptions) -> Self {
        Self::with_registry(options, CommandRegistry::with_builtins())
    }

    pub fn with_registry(options: RouterOptions, commands: CommandRegistry) -> Self {
        Self {
            store: CollectionStore::new(),
            commands,
            options,
        }
    }

    pub fn store(&self) -> &CollectionStore {
        &self.store
    }

    /// Command table, for registering extra commands at startup
    pub fn commands_mut(&mut self) -> &mut CommandRegistry {
        &mut self.commands
    }

    /// Route one decoded message from `client`
    pub fn route(&mut self, client: &ClientContext, message: Message) -> RouteResult {
        let kind = message.kind();
        let is_command = message.is_command();
        let started = Instant::now();
        metrics::record_request(kind);

        let result = match message {
            Message::Insert {
                collection,
                documents,
                request_id,
            } => self.route_insert(&collection, &documents, request_id),
            Message::Query {
                collection,
                query,
                skip,
                limit,
                request_id,
                ..
            } => {
                if is_command {
                    let database = &collection[..collection.len() - COMMAND_NAMESPACE_SUFFIX.len()];
                    self.route_command(client, database, query, request_id)
                } else {
                    self.route_query(&collection, skip, limit, request_id)
                }
            }
            Message::GetMore {
                collection,
                cursor_id,
                request_id,
                ..
            } => {
                // Every query is answered in one batch, so there is never
                // anything left to continue.
                debug!("getmore on {} cursor {}: exhausted", collection, cursor_id);
                RouteResult::Replied(Reply::empty(request_id))
            }
            Message::Unsupported { op_code, request_id } => {
                warn!(
                    "No handler for opcode {} (request {}) from {}",
                    op_code,
                    request_id,
                    client.uri()
                );
                RouteResult::Unhandled
            }
        };

        metrics::record_route_latency(kind, started.elapsed().as_secs_f64() * 1_000_000.0);
        result
    }

    fn route_insert(&mut self, collection: &str, documents: &[Document], request_id: i32) -> RouteResult {
        debug!("insert {} document(s) into {}", documents.len(), collection);
        self.store.insert(collection, documents);
        metrics::record_documents_inserted(documents.len() as u64);

        if self.options.acknowledge_inserts {
            RouteResult::Replied(Reply::empty(request_id))
        } else {
            RouteResult::NoReplyNeeded
        }
    }

    fn route_command(
        &self,
        client: &ClientContext,
        database: &str,
        mut command: Document,
        request_id: i32,
    ) -> RouteResult {
        let name = command.keys().next().cloned().unwrap_or_default();
        if !command.contains_key(DATABASE_FIELD) {
            command.insert(DATABASE_FIELD, database);
        }

        debug!("command {:?} on {} from {}", name, database, client.uri());
        let reply = self.commands.dispatch(&name, &self.store, client, &command);
        RouteResult::Replied(Reply::single(request_id, reply))
    }

    fn route_query(&self, collection: &str, skip: u32, limit: u32, request_id: i32) -> RouteResult {
        let documents = query::select(self.store.get(collection), skip as usize, limit as usize).to_vec();

        debug!(
            "query {} skip={} limit={} -> {} document(s)",
            collection,
            skip,
            limit,
            documents.len()
        );
        metrics::record_documents_returned(documents.len() as u64);
        RouteResult::Replied(Reply::new(request_id, documents))
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
