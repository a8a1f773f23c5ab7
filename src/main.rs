use std::sync::Arc;

use clue_lsp::compiler::ClueCompiler;
use clue_lsp::server::ClueServer;
use tokio::io::{stdin, stdout};
use tower_lsp::{LspService, Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the protocol, so logs go to a file.
    let log_dir = std::env::temp_dir();
    let file_appender = tracing_appender::rolling::never(&log_dir, "clue-lsp.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("clue_lsp=debug".parse()?),
        )
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    tracing::info!("{}", "=".repeat(80));
    tracing::info!("Starting Clue language server {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Log file location: {}", log_dir.join("clue-lsp.log").display());
    tracing::info!("{}", "=".repeat(80));

    let (service, socket) = LspService::new(|client| ClueServer::new(client, Arc::new(ClueCompiler)));
    Server::new(stdin(), stdout(), socket).serve(service).await;

    tracing::info!("Clue language server shutting down");
    Ok(())
}
