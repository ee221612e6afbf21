//! C11: the peer wire protocol (`spec.md` §4.11) — a single form-encoded
//! POST to `/Get`, `application/octet-stream` response, and the status
//! mapping shared by the server (encode) and client (decode) sides.

use groupcache_common::prelude::*;
use http::StatusCode;

pub const PATH: &str = "/Get";
pub const GROUP_NAME_FIELD: &str = "groupName";
pub const KEY_FIELD: &str = "key";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub group_name: String,
    pub key: String,
}

pub fn encode_form(req: &GetRequest) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair(GROUP_NAME_FIELD, &req.group_name)
        .append_pair(KEY_FIELD, &req.key)
        .finish()
}

/// `400` ("either form field is missing") is represented by the
/// [`Error::MalformedRequest`] this returns; the server maps it to that
/// status directly rather than through [`status_for_error`].
pub fn decode_form(body: &[u8]) -> Result<GetRequest> {
    let mut group_name = None;
    let mut key = None;
    for (field, value) in form_urlencoded::parse(body) {
        match field.as_ref() {
            GROUP_NAME_FIELD => group_name = Some(value.into_owned()),
            KEY_FIELD => key = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok(GetRequest {
        group_name: group_name.ok_or(Error::MalformedRequest(GROUP_NAME_FIELD))?,
        key: key.ok_or(Error::MalformedRequest(KEY_FIELD))?,
    })
}

/// Server-side status mapping (`spec.md` §4.11). `Error::MalformedRequest`
/// is handled separately by the server before a `GetRequest` even exists,
/// so it has no arm here; every other kind collapses to 500 per spec
/// ("500 for any other error").
pub fn status_for_error(err: &Error) -> StatusCode {
    match err.kind() {
        ErrorKind::GroupNotFound => StatusCode::NOT_FOUND,
        ErrorKind::ServerBusy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Client-side status mapping (`spec.md` §4.11): the inverse of
/// [`status_for_error`], plus 400.
pub fn error_for_status(status: StatusCode, body: String) -> Error {
    match status {
        StatusCode::NOT_FOUND => Error::GroupNotFound(body),
        StatusCode::SERVICE_UNAVAILABLE => Error::ServerBusy,
        StatusCode::BAD_REQUEST => Error::Transport(format!("peer rejected malformed request: {body}")),
        _ => Error::InternalServerError(body),
    }
}
