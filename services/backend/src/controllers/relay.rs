// Turns an opened media source into the attachment response
use std::io;

use axum::{
    body::Body,
    http::{
        StatusCode,
        header::{
            CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, EXPIRES, PRAGMA,
        },
    },
    response::Response,
};
use bytes::Bytes;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::controllers::extractor::{ByteStream, StreamHandle, TempDownload};
use crate::errors::ProxyError;
use crate::models::download::MediaKind;
use crate::models::video::{ExtractedFormat, media_type_for};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Both parameters carry the percent-encoded name, so the header stays
/// ASCII whatever the title contains.
pub fn content_disposition(filename: &str) -> String {
    let encoded = urlencoding::encode(filename);
    format!("attachment; filename=\"{encoded}\"; filename*=UTF-8''{encoded}")
}

/// The caller's filename (extension appended when missing), otherwise
/// `<title>.<ext>`, otherwise `video.<ext>` / `audio.<ext>`.
pub fn download_filename(
    requested: Option<&str>,
    title: &str,
    kind: MediaKind,
    extension: &str,
) -> String {
    let stem = match requested.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => name,
        None if !title.trim().is_empty() => title.trim(),
        None => kind.as_str(),
    };

    let suffix = format!(".{}", extension.to_ascii_lowercase());
    if extension.is_empty() || stem.to_ascii_lowercase().ends_with(&suffix) {
        stem.to_string()
    } else {
        format!("{stem}{suffix}")
    }
}

pub fn content_type_for(format: &ExtractedFormat, handle: &StreamHandle) -> String {
    format
        .mime_type
        .clone()
        .or_else(|| {
            handle
                .extension
                .as_deref()
                .and_then(|ext| media_type_for(ext, format.has_video_track))
                .map(str::to_string)
        })
        .or_else(|| handle.content_type.clone())
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string())
}

/// Forwards chunks in order. The generator owns `temp` and removes the
/// download once the source ends or fails. A body dropped mid-way leaves the
/// removal to the guard's `Drop`.
pub fn relay_body(source: ByteStream, temp: Option<TempDownload>) -> Body {
    let stream = async_stream::stream! {
        let mut guard = temp;
        let mut source = source;
        let mut relayed: u64 = 0;

        while let Some(chunk) = source.next().await {
            match chunk {
                Ok(bytes) => {
                    relayed += bytes.len() as u64;
                    yield Ok::<Bytes, io::Error>(bytes);
                }
                Err(e) => {
                    warn!(error = %e, relayed, "media stream failed, aborting response");
                    if let Some(temp) = guard.take() {
                        temp.cleanup().await;
                    }
                    yield Err(e);
                    break;
                }
            }
        }

        if let Some(temp) = guard {
            temp.cleanup().await;
        }
        debug!(relayed, "relay finished");
    };

    Body::from_stream(stream)
}

pub fn into_response(
    handle: StreamHandle,
    filename: &str,
    content_type: &str,
) -> Result<Response, ProxyError> {
    let StreamHandle {
        source,
        content_length,
        temp,
        ..
    } = handle;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_DISPOSITION, content_disposition(filename))
        .header(CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .header(PRAGMA, "no-cache")
        .header(EXPIRES, "0");
    if let Some(length) = content_length {
        builder = builder.header(CONTENT_LENGTH, length);
    }

    builder
        .body(relay_body(source, temp))
        .map_err(|e| ProxyError::Internal(format!("failed to build download response: {e}")))
}
