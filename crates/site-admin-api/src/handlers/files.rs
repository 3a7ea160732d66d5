//! Image upload and download.
//!
//! Only the final path component of any client-supplied name is used, so
//! every file stays inside its image directory.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use bytes::Bytes;
use serde_json::{json, Value};

use super::AppState;
use crate::adapters::storage::{sanitize_filename, ImageKind};
use crate::domain::{messages, HandlerFault, Reply, RequestContext};

/// `POST /api/download` with `{type, filename}`.
///
/// Success is the raw file as an attachment, not an envelope.
pub async fn download(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Response, HandlerFault> {
    let body = ctx.body();

    let Some(kind) = body.get("type") else {
        return Ok(Reply::error(messages::FILE_TYPE_REQUIRED).into_response());
    };
    let Some(kind) = kind.as_str().and_then(ImageKind::parse) else {
        return Ok(Reply::error(messages::INVALID_DOWNLOAD_TYPE).into_response());
    };
    let Some(filename) = body
        .get("filename")
        .and_then(Value::as_str)
        .and_then(sanitize_filename)
    else {
        return Ok(Reply::error(messages::FILENAME_REQUIRED).into_response());
    };

    match state.images.read(kind, filename).await? {
        Some(bytes) => Ok((
            [
                (
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/octet-stream"),
                ),
                (header::CONTENT_DISPOSITION, attachment(filename)),
            ],
            bytes,
        )
            .into_response()),
        None => Ok(Reply::error(messages::FILE_NOT_FOUND).into_response()),
    }
}

/// `Content-Disposition: attachment` for `filename`.
///
/// Non-ASCII names use the RFC 5987 `filename*` form.
fn attachment(filename: &str) -> HeaderValue {
    let value = if filename
        .chars()
        .all(|c| (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ')
    {
        format!("attachment; filename=\"{}\"", filename)
    } else {
        format!(
            "attachment; filename*=UTF-8''{}",
            urlencoding::encode(filename)
        )
    };
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// `POST /api/upload`, multipart with `file` and `type` parts.
pub async fn upload(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Reply, HandlerFault> {
    let Ok(mut multipart) = multipart else {
        return Ok(Reply::error(messages::FILE_REQUIRED));
    };

    let (file, kind) = match read_parts(&mut multipart).await {
        Ok(parts) => parts,
        Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Ok(Reply::error(messages::BODY_TOO_LARGE));
        }
        Err(e) => return Err(e.into()),
    };

    let Some((name, bytes)) = file else {
        return Ok(Reply::error(messages::FILE_REQUIRED));
    };
    let Some(filename) = name.as_deref().and_then(sanitize_filename) else {
        return Ok(Reply::error(messages::FILE_EXTRACTION_FAILED));
    };
    let Some(kind) = kind else {
        return Ok(Reply::error(messages::IMAGE_TYPE_REQUIRED));
    };
    let Some(kind) = ImageKind::parse(&kind) else {
        return Ok(Reply::error(messages::INVALID_UPLOAD_TYPE));
    };

    state.images.write(kind, filename, &bytes).await?;
    tracing::info!(
        request_id = ctx.request_id,
        dir = kind.dir_name(),
        filename,
        size = bytes.len(),
        "image uploaded"
    );

    Ok(Reply::ok(messages::UPLOAD_OK).with_data(json!({ "filename": filename })))
}

type FilePart = (Option<String>, Bytes);

/// First `file` part (client file name and contents) and first `type` part.
async fn read_parts(
    multipart: &mut Multipart,
) -> Result<(Option<FilePart>, Option<String>), MultipartError> {
    let mut file = None;
    let mut kind = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") if file.is_none() => {
                let client_name = field.file_name().map(str::to_string);
                file = Some((client_name, field.bytes().await?));
            }
            Some("type") if kind.is_none() => kind = Some(field.text().await?),
            _ => {}
        }
    }

    Ok((file, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_ascii() {
        assert_eq!(
            attachment("banner 01.png"),
            "attachment; filename=\"banner 01.png\""
        );
    }

    #[test]
    fn test_attachment_non_ascii() {
        assert_eq!(
            attachment("首页.png"),
            "attachment; filename*=UTF-8''%E9%A6%96%E9%A1%B5.png"
        );
        assert_eq!(
            attachment("a\"b.png"),
            "attachment; filename*=UTF-8''a%22b.png"
        );
    }
}
