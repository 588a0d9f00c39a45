//! Single-event mode: invoke once with a prepared event and print the result.

use std::io::Write;

use bytes::Bytes;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::format::{divider, render_payload, render_remote_error};
use crate::invoke::Invoker;

/// Invoke the function with `event` and write its result to `out`.
///
/// Only a transport failure is an error. A remote error, a missing payload
/// and a non-JSON payload are all reported and count as success.
pub async fn run_event<W: Write>(
    invoker: &dyn Invoker,
    event: &str,
    parse_json: bool,
    out: &mut W,
) -> Result<()> {
    writeln!(out, "{}", divider())?;
    info!("Starting local Lambda invocation with Event");

    let response = invoker.invoke(Bytes::copy_from_slice(event.as_bytes())).await?;
    debug!("Handling lambda event response");

    if let Some(err) = &response.error {
        error!(error_type = %err.error_type, "Lambda returned error");
        writeln!(out, "{}", render_remote_error(err))?;
    }

    if response.payload.is_empty() {
        debug!("Lambda returned no payload");
        return Ok(());
    }

    match render_payload(&response.payload, parse_json) {
        Some(pretty) => {
            info!("Lambda returned JSON payload");
            writeln!(out, "{pretty}")?;
        }
        None => {
            info!("Lambda returned non-JSON payload");
            out.write_all(&response.payload)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
