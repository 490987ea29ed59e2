//! Wire protocol layer for mongolite
//!
//! - [`wire`]: message header and opcodes
//! - [`codec`]: legacy OP_INSERT / OP_QUERY / OP_GET_MORE decoding and
//!   OP_REPLY encoding
//! - [`server`]: tokio TCP server feeding decoded messages to the router

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod server;
pub mod wire;

pub use server::{MongoliteServer, SharedRouter};
pub use wire::{MsgHeader, OpCode, HEADER_LEN};
