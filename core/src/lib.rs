//! # Fanout Core
//!
//! The moving parts of a distributed grep round:
//!
//! * **[`dispatcher`]**: coordinator side. Contacts every target concurrently under
//!   independent dial and call timeouts and returns one result per target, in input order.
//! * **[`service`]**: target side. Runs the search tool against a local file and maps its
//!   exit status onto a reply.
//! * **[`server`]**: accept loop exposing a [`service::RemoteExecutor`] over the RPC protocol.

pub mod dispatcher;
pub mod network;
pub mod server;
pub mod service;
