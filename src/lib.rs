//! Library entry point for the Clue language server.
//!
//! The diagnostics pipeline (output parsing, range resolution, scope resolution and
//! reconciliation) is usable without the LSP transport; `server` wires it to tower-lsp.

pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod documents;
pub mod error;
pub mod hover;
pub mod output;
pub mod range;
pub mod reconcile;
pub mod scope;
pub mod server;
pub mod session;
pub mod utils;
