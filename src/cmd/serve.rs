//! The `serve` subcommand.

use std::sync::Arc;

use crate::{mcp, prelude::*, tools::OcrTools};

/// Serve MCP requests on standard input and output.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_serve(tools: OcrTools) -> Result<()> {
    mcp::serve(Arc::new(tools), tokio::io::stdin(), tokio::io::stdout()).await
}
