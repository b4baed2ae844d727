//! JSON resource codec
//!
//! Records are stored as `application/json` documents. Reads tolerate absence
//! (`Ok(None)`), writes are either a `POST` with `Slug` into the parent
//! container (new resources) or a `PUT` (existing ones).

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{PodError, Result};
use crate::storage::helper::{member_name, merge_fields, now, stamp_timestamps};
use crate::storage::ids::UserId;
use crate::transport::{CONTENT_TYPE_JSON, Method, PodRequest};

use super::context::PodContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// POST into the parent container, named by `Slug`
    Create,
    /// PUT in place
    Overwrite,
}

fn split_parent(url: &str) -> Option<(&str, &str)> {
    let idx = url.rfind('/')?;
    Some((&url[..=idx], &url[idx + 1..]))
}

/// Serialize a record for storage
pub fn encode<T: Serialize>(record: &T, url: &str) -> Result<Value> {
    serde_json::to_value(record).map_err(|source| PodError::Decode {
        url: url.to_string(),
        source,
    })
}

pub async fn write_json(ctx: &PodContext, url: &str, value: &Value, mode: WriteMode) -> Result<()> {
    let body = value.to_string();
    let (method, request) = match mode {
        WriteMode::Overwrite => (Method::PUT, PodRequest::put(url)),
        WriteMode::Create => {
            let (parent, name) = split_parent(url)
                .ok_or_else(|| PodError::NotFound(url.to_string()))?;
            let slug = member_name(url).unwrap_or_else(|| name.to_string());
            (Method::POST, PodRequest::post(parent).header("Slug", slug))
        }
    };

    let response = ctx
        .send(request.body(CONTENT_TYPE_JSON, body))
        .await?;
    if !response.is_success() {
        return Err(response.error_for(&method, url));
    }

    if mode == WriteMode::Create {
        if let Some(location) = response.header_values("location").first() {
            if location != url {
                tracing::warn!(expected = %url, location = %location, "server placed resource elsewhere");
            }
        }
    }
    tracing::debug!(url = %url, mode = ?mode, "wrote resource");
    Ok(())
}

/// GET a JSON object; 404 is `None`
pub async fn read_json(ctx: &PodContext, url: &str) -> Result<Option<Map<String, Value>>> {
    let response = ctx
        .send(PodRequest::get(url).header("Accept", CONTENT_TYPE_JSON))
        .await?;
    if response.is_not_found() {
        return Ok(None);
    }
    if !response.is_success() {
        return Err(response.error_for(&Method::GET, url));
    }
    let value: Value = serde_json::from_str(&response.body).map_err(|source| PodError::Decode {
        url: url.to_string(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(Some(map)),
        _ => Err(PodError::Decode {
            url: url.to_string(),
            source: serde::de::Error::custom("expected a JSON object"),
        }),
    }
}

pub fn decode<T: DeserializeOwned>(map: Map<String, Value>, url: &str) -> Result<T> {
    serde_json::from_value(Value::Object(map)).map_err(|source| PodError::Decode {
        url: url.to_string(),
        source,
    })
}

/// GET and decode a typed record; 404 is `None`
pub async fn read_record<T: DeserializeOwned>(ctx: &PodContext, url: &str) -> Result<Option<T>> {
    match read_json(ctx, url).await? {
        Some(map) => decode(map, url).map(Some),
        None => Ok(None),
    }
}

/// The stored `owner` must match, otherwise `OwnershipMismatch`
pub fn check_owner(stored: &Map<String, Value>, owner: &UserId, url: &str) -> Result<()> {
    match stored.get("owner").and_then(Value::as_str) {
        Some(stored_owner) if stored_owner == owner.as_str() => Ok(()),
        _ => Err(PodError::OwnershipMismatch(url.to_string())),
    }
}

/// Read, merge `patch` over the stored document, restamp and overwrite
///
/// Timestamps in the patch are ignored: `createdAt` keeps its stored value and
/// `updatedAt` is set to now.
pub async fn read_merge<T>(
    ctx: &PodContext,
    url: &str,
    mut patch: Map<String, Value>,
    owner: &UserId,
) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut stored = read_json(ctx, url)
        .await?
        .ok_or_else(|| PodError::NotFound(url.to_string()))?;
    check_owner(&stored, owner, url)?;

    patch.remove("createdAt");
    patch.remove("updatedAt");
    merge_fields(&mut stored, patch);
    stamp_timestamps(&mut stored, now());

    let record: T = decode(stored, url)?;
    write_json(ctx, url, &encode(&record, url)?, WriteMode::Overwrite).await?;
    Ok(record)
}

/// HEAD; 2xx is `true`, 404 `false`
pub async fn exists(ctx: &PodContext, url: &str) -> Result<bool> {
    let response = ctx.send(PodRequest::head(url)).await?;
    if response.is_success() {
        Ok(true)
    } else if response.is_not_found() {
        Ok(false)
    } else {
        Err(response.error_for(&Method::HEAD, url))
    }
}

/// DELETE; an already absent resource counts as deleted
pub async fn delete(ctx: &PodContext, url: &str) -> Result<()> {
    let response = ctx.send(PodRequest::delete(url)).await?;
    if response.is_success() || response.is_not_found() {
        tracing::debug!(url = %url, status = %response.status, "deleted resource");
        Ok(())
    } else {
        Err(response.error_for(&Method::DELETE, url))
    }
}
