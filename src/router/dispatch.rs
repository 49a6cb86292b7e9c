//! Concurrent, bounded tool dispatch
//!
//! All selected tools run at once. Each is bounded by its own timeout, and one
//! tool's failure never hides another's result. Cancellation drops every in-flight
//! invocation and yields `Cancelled` instead of a partial set.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;

use crate::error::{RagsqlError, Result};
use crate::tools::{QueryTool, ToolError, ToolInput, ToolInvocation};

use super::cancel::CancelToken;

/// Run one tool under `timeout`
async fn invoke(tool: Arc<dyn QueryTool>, input: ToolInput, timeout: Duration) -> ToolInvocation {
    let started = Instant::now();
    let outcome = match tokio::time::timeout(timeout, tool.run(&input)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ToolError::ToolTimeout(timeout)),
    };
    let latency = started.elapsed();

    match &outcome {
        Ok(_) => log::info!("{} succeeded in {:?}", tool.id(), latency),
        Err(e) => log::warn!("{} failed in {:?}: {} [{}]", tool.id(), latency, e, e.kind()),
    }

    ToolInvocation {
        tool_id: tool.id().to_string(),
        input,
        outcome,
        latency,
    }
}

/// Invoke every `(tool, input)` pair concurrently; results keep the input order
pub async fn dispatch_all(
    calls: Vec<(Arc<dyn QueryTool>, ToolInput)>,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<Vec<ToolInvocation>> {
    if cancel.is_cancelled() {
        return Err(RagsqlError::Cancelled);
    }

    let invocations = join_all(
        calls
            .into_iter()
            .map(|(tool, input)| invoke(tool, input, timeout)),
    );

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RagsqlError::Cancelled),
        done = invocations => Ok(done),
    }
}
