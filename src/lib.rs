//! mcp-tester is a client engine for MCP tool servers that push JSON-RPC
//! frames over a server-sent event stream and accept requests by HTTP POST.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`mcp`] owns the engine: SSE transport, session state machine, request
//!   dispatch, response correlation, tool catalog, usage stats and the
//!   bounded log buffer.
//! - [`core`] holds persisted configuration.
//! - [`cli`] parses arguments and drives an engine from the terminal.
//! - [`logging`] installs the tracing subscriber.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod cli;
pub mod core;
pub mod logging;
pub mod mcp;
