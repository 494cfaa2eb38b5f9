//! Response finalization.
//!
//! # Responsibilities
//! - Run finalizer hooks in registration order
//! - Close the response and apply the negotiated content encoding
//! - Copy status, headers, cookies and body onto the raw response
//! - Emit the per-request timing line
//!
//! # Design Decisions
//! - Split in two: [`prepare`] only touches the contexts and may fail, so it
//!   runs inside the fault boundary; [`commit`] writes the transport and cannot fail
//! - `prepare` runs at most once per response; later calls are no-ops
//! - Streamed responses skip hooks, encoding and content length

use std::sync::Arc;

use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, VARY};
use http::HeaderValue;

use crate::app::Application;
use crate::dispatch::encoding::negotiate;
use crate::http::{BoxError, RequestContext, ResponseContext};
use crate::observability::metrics;
use crate::transport::RawResponse;

/// Run hooks, close, and encode the buffered body.
///
/// With `ignore_finalizers` the hooks are skipped; the exception responder
/// uses this so a failing hook is not re-run on the error response.
pub async fn prepare(
    app: &Application,
    req: &mut RequestContext,
    res: &mut ResponseContext,
    ignore_finalizers: bool,
) -> Result<(), BoxError> {
    if res.is_finalized() {
        return Ok(());
    }
    if !res.is_buffered() {
        res.close();
        res.mark_finalized();
        return Ok(());
    }

    if !ignore_finalizers {
        for finalizer in app.finalizers() {
            finalizer(req, res).await?;
        }
    }
    res.close();

    if !res.body().is_empty() {
        encode(req, res).await?;
    }

    res.mark_finalized();
    Ok(())
}

async fn encode(req: &RequestContext, res: &mut ResponseContext) -> Result<(), BoxError> {
    let Some(accept) = req.headers().get(ACCEPT_ENCODING).and_then(|v| v.to_str().ok()) else {
        return Ok(());
    };
    let Some((name, codec)) = negotiate(accept, res.codecs()).map(|(n, c)| (n.to_owned(), Arc::clone(c)))
    else {
        return Ok(());
    };

    let plain = res.take_body();
    let plain_len = plain.len();
    let encoded = match codec.encode(plain.clone()).await {
        Ok(encoded) => encoded,
        Err(e) => {
            // The response is closed, so it is committed unencoded.
            res.replace_body(plain);
            return Err(e.into());
        }
    };
    tracing::trace!(codec = %name, plain_len, encoded_len = encoded.len(), "Body encoded");

    res.replace_body(encoded);
    res.headers_mut().insert(CONTENT_ENCODING, HeaderValue::from_str(&name)?);
    res.headers_mut().append(VARY, HeaderValue::from_static("accept-encoding"));
    Ok(())
}

/// Write the response to the transport and close it.
pub fn commit(app: &Application, req: &RequestContext, res: &mut ResponseContext, raw: &mut dyn RawResponse) {
    for (name, value) in res.headers() {
        raw.set_header(name, value);
    }

    let body = if res.is_buffered() {
        let body = res.take_body();
        raw.set_content_length(body.len() as u64);
        raw.set_chunked_encoding(res.chunked().unwrap_or(true));
        Some(body)
    } else {
        None
    };

    raw.set_status_code(res.status());
    raw.add_cookies(res.cookies());

    match body {
        Some(body) => raw.write_body(body),
        None => {
            if let Some(stream) = res.take_stream() {
                raw.write_stream(stream);
            }
        }
    }
    raw.close();

    let status = res.status().as_u16();
    metrics::record_request(req.method().as_str(), status, req.started());
    if !app.is_production() {
        if let Some(logger) = app.logger() {
            logger.request(
                status,
                req.method().as_str(),
                &req.uri().to_string(),
                req.started().elapsed().as_millis(),
            );
        }
    }
}
