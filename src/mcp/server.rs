//! The request loop.

use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::{FutureExt as _, StreamExt as _};
use serde_json::json;
use tokio::{
    io::{AsyncBufReadExt as _, AsyncRead, AsyncWrite, AsyncWriteExt as _, BufReader},
    sync::mpsc,
    task::{JoinError, JoinSet},
};
use tokio_stream::wrappers::SplitStream;

use super::protocol::{
    ErrorObject, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR, Request,
    Response, negotiate_protocol_version, parse_message,
};
use crate::{
    prelude::*,
    tools::{OcrTools, ToolCallError, tool_definitions},
};

/// How many responses can be waiting for the writer.
const RESPONSE_QUEUE_SIZE: usize = 32;

/// Parameters of `tools/call`.
#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Serve MCP requests from `reader`, writing responses to `writer`, until
/// `reader` reaches end of file.
///
/// Tool calls run concurrently, so their responses may be written in a
/// different order than the requests arrived. Everything else is answered
/// immediately.
#[instrument(level = "debug", skip_all)]
pub async fn serve<R, W>(tools: Arc<OcrTools>, reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    info!(project_dir = %tools.project().path().display(), "MCP server ready");

    let (tx, rx) = mpsc::channel::<Response>(RESPONSE_QUEUE_SIZE);
    let writer_task = tokio::spawn(write_responses(rx, writer));
    let mut calls = JoinSet::new();

    // Split on raw bytes, so that a line of bad UTF-8 is a protocol error
    // instead of a read error.
    let mut lines = SplitStream::new(BufReader::new(reader).split(b'\n'));
    let mut read_error = None;
    loop {
        tokio::select! {
            line = lines.next() => {
                let line = match line {
                    Some(Ok(line)) => line,
                    Some(Err(err)) => {
                        read_error = Some(err);
                        break;
                    }
                    None => break,
                };
                handle_line(&tools, &tx, &mut calls, &line).await;
            }
            Some(joined) = calls.join_next(), if !calls.is_empty() => {
                report_call_panic(joined);
            }
        }
    }

    // Let running tool calls finish before we stop writing.
    while let Some(joined) = calls.join_next().await {
        report_call_panic(joined);
    }
    drop(tx);
    writer_task.await.context("response writer panicked")??;
    if let Some(err) = read_error {
        return Err(err).context("failed to read request");
    }
    debug!("client closed input; shutting down");
    Ok(())
}

/// Parse and answer one line of input.
async fn handle_line(
    tools: &Arc<OcrTools>,
    tx: &mpsc::Sender<Response>,
    calls: &mut JoinSet<()>,
    line: &[u8],
) {
    let line = match std::str::from_utf8(line) {
        Ok(line) => line.trim_end_matches('\r'),
        Err(err) => {
            warn!("message from client is not UTF-8: {}", err);
            let response =
                Response::error(Value::Null, PARSE_ERROR, format!("parse error: {err}"));
            send(tx, response).await;
            return;
        }
    };
    if line.trim().is_empty() {
        return;
    }
    match parse_message(line) {
        Ok(request) => handle_request(tools, tx, calls, request).await,
        Err(response) => {
            warn!("bad message from client: {}", line);
            send(tx, response).await;
        }
    }
}

/// Answer a single request.
async fn handle_request(
    tools: &Arc<OcrTools>,
    tx: &mpsc::Sender<Response>,
    calls: &mut JoinSet<()>,
    request: Request,
) {
    let Some(id) = request.id else {
        debug!(method = %request.method, "notification");
        return;
    };
    let outcome = match request.method.as_str() {
        "initialize" => Ok(initialize_result(&request.params)),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": tool_definitions() })),
        "tools/call" => {
            let tools = tools.clone();
            let tx = tx.clone();
            let params = request.params;
            calls.spawn(async move {
                // A panicking tool still owes the client an answer.
                let outcome = AssertUnwindSafe(call_tool(&tools, params))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        error!("tool call panicked: {}", panic_message(&*panic));
                        Err(ErrorObject::new(INTERNAL_ERROR, "tool call panicked"))
                    });
                send(&tx, Response::new(id, outcome)).await;
            });
            return;
        }
        method => Err(ErrorObject::new(
            METHOD_NOT_FOUND,
            format!("method not found: {method}"),
        )),
    };
    send(tx, Response::new(id, outcome)).await;
}

fn initialize_result(params: &Value) -> Value {
    let requested = params.get("protocolVersion").and_then(Value::as_str);
    let protocol_version = negotiate_protocol_version(requested);
    let client = params.get("clientInfo").cloned().unwrap_or_default();
    info!(
        client = %client,
        protocol_version,
        "client connected"
    );
    json!({
        "protocolVersion": protocol_version,
        "capabilities": {
            "tools": { "listChanged": false },
        },
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
        "instructions": "OCR tools backed by Tesseract. All paths are relative to \
                         the server's project directory.",
    })
}

async fn call_tool(tools: &OcrTools, params: Value) -> Result<Value, ErrorObject> {
    let params = serde_json::from_value::<CallToolParams>(params).map_err(|err| {
        ErrorObject::new(INVALID_PARAMS, format!("invalid tools/call params: {err}"))
    })?;
    let structured = tools
        .call(&params.name, params.arguments)
        .await
        .map_err(|err| match err {
            ToolCallError::Serialize { .. } => ErrorObject::new(INTERNAL_ERROR, err.to_string()),
            _ => ErrorObject::new(INVALID_PARAMS, err.to_string()),
        })?;
    let text = serde_json::to_string_pretty(&structured)
        .map_err(|err| ErrorObject::new(INTERNAL_ERROR, err.to_string()))?;
    Ok(json!({
        "content": [{ "type": "text", "text": text }],
        "structuredContent": structured,
        "isError": false,
    }))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn report_call_panic(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        error!("tool call task failed: {}", err);
    }
}

async fn send(tx: &mpsc::Sender<Response>, response: Response) {
    if tx.send(response).await.is_err() {
        debug!("response writer has stopped; dropping response");
    }
}

/// Write each response as a single line of JSON.
async fn write_responses<W>(mut rx: mpsc::Receiver<Response>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line =
            serde_json::to_string(&response).context("failed to serialize response")?;
        line.push('\n');
        writer
            .write_all(line.as_bytes())
            .await
            .context("failed to write response")?;
        writer.flush().await.context("failed to flush response")?;
    }
    Ok(())
}
