//! Administrative commands
//!
//! A command is a query against `<db>.$cmd` whose first field names the
//! operation. Handlers are looked up by that name, case-sensitively, in a
//! [`CommandRegistry`] owned by the router.

use std::collections::HashMap;

use bson::{doc, Bson, Document};
use tracing::debug;

use mongolite_common::error::CommandError;
use mongolite_common::metrics;

use crate::message::ClientContext;
use crate::query;
use crate::store::CollectionStore;

/// Field the router adds to every command document to name its database.
pub const DATABASE_FIELD: &str = "$db";

/// Metric label for command names with no registered handler.
const UNKNOWN_COMMAND_LABEL: &str = "unknown";

/// Largest single document a client may send.
pub const MAX_BSON_OBJECT_SIZE: i32 = 16 * 1024 * 1024;

/// Largest wire frame advertised to clients.
pub const MAX_MESSAGE_SIZE_BYTES: i32 = 48_000_000;

/// Something that can answer one named command.
pub trait CommandHandler: Send + Sync {
    fn handle(
        &self,
        store: &CollectionStore,
        client: &ClientContext,
        command: &Document,
    ) -> Result<Document, CommandError>;
}

impl<F> CommandHandler for F
where
    F: Fn(&CollectionStore, &ClientContext, &Document) -> Result<Document, CommandError>
        + Send
        + Sync,
{
    fn handle(
        &self,
        store: &CollectionStore,
        client: &ClientContext,
        command: &Document,
    ) -> Result<Document, CommandError> {
        self(store, client, command)
    }
}

/// Name-indexed table of command handlers
pub struct CommandRegistry {
    handlers: HashMap<String, Box<dyn CommandHandler>>,
}

impl CommandRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// A registry preloaded with the built-in commands
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("getlasterror", getlasterror);
        registry.register("whatsmyuri", whatsmyuri);
        registry.register("replSetGetStatus", repl_set_get_status);
        registry.register("ping", ping);
        registry.register("isMaster", is_master);
        registry.register("ismaster", is_master);
        registry.register("buildinfo", build_info);
        registry.register("buildInfo", build_info);
        registry.register("count", count);
        registry.register("listCollections", list_collections);
        registry
    }

    /// Install `handler` under `name`, replacing any previous handler
    pub fn register(&mut self, name: impl Into<String>, handler: impl CommandHandler + 'static) {
        let name = name.into();
        if self.handlers.insert(name.clone(), Box::new(handler)).is_some() {
            debug!("Replaced handler for command {}", name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered command names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run `name` and return its handler's result
    pub fn try_dispatch(
        &self,
        name: &str,
        store: &CollectionStore,
        client: &ClientContext,
        command: &Document,
    ) -> Result<Document, CommandError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;
        handler.handle(store, client, command)
    }

    /// Run `name`, folding any failure into an `{ok: 0, errmsg, code}`
    /// reply document
    pub fn dispatch(
        &self,
        name: &str,
        store: &CollectionStore,
        client: &ClientContext,
        command: &Document,
    ) -> Document {
        let label = self.metric_label(name);
        match self.try_dispatch(name, store, client, command) {
            Ok(reply) => {
                metrics::record_command(label, true);
                reply
            }
            Err(e) => {
                debug!("Command {:?} failed: {}", name, e);
                metrics::record_command(label, false);
                failure_document(&e)
            }
        }
    }

    /// Label for the commands counter. Client-chosen names stay out of it.
    fn metric_label<'a>(&self, name: &'a str) -> &'a str {
        if self.handlers.contains_key(name) {
            name
        } else {
            UNKNOWN_COMMAND_LABEL
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Reply document for a failed command
pub fn failure_document(error: &CommandError) -> Document {
    doc! {
        "ok": 0,
        "errmsg": error.to_string(),
        "code": error.code(),
    }
}

// ============================================================================
// Built-in commands
// ============================================================================

fn getlasterror(
    _store: &CollectionStore,
    _client: &ClientContext,
    _command: &Document,
) -> Result<Document, CommandError> {
    // Write outcomes are not tracked.
    Ok(doc! { "n": 0, "err": Bson::Null, "ok": 1 })
}

fn whatsmyuri(
    _store: &CollectionStore,
    client: &ClientContext,
    _command: &Document,
) -> Result<Document, CommandError> {
    Ok(doc! { "you": client.uri() })
}

fn repl_set_get_status(
    _store: &CollectionStore,
    _client: &ClientContext,
    _command: &Document,
) -> Result<Document, CommandError> {
    Ok(doc! { "errmsg": "not running with --replSet", "ok": 0 })
}

fn ping(
    _store: &CollectionStore,
    _client: &ClientContext,
    _command: &Document,
) -> Result<Document, CommandError> {
    Ok(doc! { "ok": 1 })
}

fn is_master(
    _store: &CollectionStore,
    _client: &ClientContext,
    _command: &Document,
) -> Result<Document, CommandError> {
    // Only the legacy opcodes are spoken, which is wire version 0.
    Ok(doc! {
        "ismaster": true,
        "maxBsonObjectSize": MAX_BSON_OBJECT_SIZE,
        "maxMessageSizeBytes": MAX_MESSAGE_SIZE_BYTES,
        "localTime": bson::DateTime::now(),
        "minWireVersion": 0,
        "maxWireVersion": 0,
        "readOnly": false,
        "ok": 1,
    })
}

fn build_info(
    _store: &CollectionStore,
    _client: &ClientContext,
    _command: &Document,
) -> Result<Document, CommandError> {
    Ok(doc! {
        "version": env!("CARGO_PKG_VERSION"),
        "gitVersion": "unknown",
        "maxBsonObjectSize": MAX_BSON_OBJECT_SIZE,
        "ok": 1,
    })
}

fn count(
    store: &CollectionStore,
    _client: &ClientContext,
    command: &Document,
) -> Result<Document, CommandError> {
    let collection = command.get_str("count").map_err(|_| invalid("count", "collection name must be a string"))?;
    let namespace = qualify(command, collection);

    let skip = optional_size(command, "count", "skip")?;
    let limit = optional_size(command, "count", "limit")?;
    let n = query::select(store.get(&namespace), skip, limit).len();

    Ok(doc! { "n": i64::try_from(n).unwrap_or(i64::MAX), "ok": 1 })
}

fn list_collections(
    store: &CollectionStore,
    _client: &ClientContext,
    command: &Document,
) -> Result<Document, CommandError> {
    let database = command.get_str(DATABASE_FIELD).unwrap_or_default();
    let prefix = format!("{}.", database);

    let batch: Vec<Document> = store
        .collection_names()
        .into_iter()
        .filter_map(|name| name.strip_prefix(&prefix))
        .map(|name| doc! { "name": name, "type": "collection" })
        .collect();

    Ok(doc! {
        "cursor": {
            "id": 0_i64,
            "ns": format!("{}.$cmd.listCollections", database),
            "firstBatch": batch,
        },
        "ok": 1,
    })
}

fn invalid(command: &str, reason: &str) -> CommandError {
    CommandError::InvalidArgument {
        command: command.to_string(),
        reason: reason.to_string(),
    }
}

/// `db.collection` for a collection named inside a command document
fn qualify(command: &Document, collection: &str) -> String {
    match command.get_str(DATABASE_FIELD) {
        Ok(database) if !database.is_empty() => format!("{}.{}", database, collection),
        _ => collection.to_string(),
    }
}

/// A non-negative integral field, 0 when absent. Shells send doubles, so
/// whole floating point values are accepted too.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn optional_size(command: &Document, name: &str, field: &str) -> Result<usize, CommandError> {
    let value = match command.get(field) {
        None | Some(Bson::Null) => return Ok(0),
        Some(Bson::Int32(v)) => i64::from(*v),
        Some(Bson::Int64(v)) => *v,
        Some(Bson::Double(v)) if v.fract() == 0.0 => *v as i64,
        Some(_) => return Err(invalid(name, &format!("{} must be an integer", field))),
    };
    // Negative limits mean "single batch" on the wire; the count is the same.
    usize::try_from(value.unsigned_abs()).map_err(|_| invalid(name, &format!("{} is too large", field)))
}
