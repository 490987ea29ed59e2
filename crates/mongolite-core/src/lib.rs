//! mongolite core
//!
//! The request-handling heart of the server, independent of sockets and
//! byte layouts:
//! - [`CollectionStore`]: named, ordered, in-memory collections
//! - [`query::select`]: skip/limit windowing over a collection
//! - [`CommandRegistry`]: administrative commands by name
//! - [`Router`]: turns one decoded [`Message`] into a [`RouteResult`]
//!
//! ```rust
//! use bson::doc;
//! use mongolite_core::{ClientContext, Message, RouteResult, Router};
//!
//! let mut router = Router::new();
//! let client = ClientContext::new("127.0.0.1:40000".parse().unwrap());
//!
//! router.route(&client, Message::Insert {
//!     collection: "test.c".to_string(),
//!     documents: vec![doc! { "a": 1 }],
//!     request_id: 1,
//! });
//!
//! let result = router.route(&client, Message::Query {
//!     collection: "test.c".to_string(),
//!     query: doc! {},
//!     fields: None,
//!     skip: 0,
//!     limit: 0,
//!     flags: 0,
//!     request_id: 2,
//! });
//! match result {
//!     RouteResult::Replied(reply) => assert_eq!(reply.documents, vec![doc! { "a": 1 }]),
//!     _ => unreachable!(),
//! }
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod command;
pub mod message;
pub mod query;
pub mod router;
pub mod store;

pub use bson::Document;
pub use command::{CommandHandler, CommandRegistry};
pub use message::{ClientContext, Message, Reply, EXHAUSTED_CURSOR};
pub use router::{RouteResult, Router, RouterOptions};
pub use store::{Collection, CollectionStore};
