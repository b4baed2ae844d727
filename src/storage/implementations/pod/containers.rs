//! Container provisioning
//!
//! Containers are probed with HEAD and created with PUT. A 409 on create means
//! someone else got there first, which is as good as success.

use crate::error::Result;
use crate::transport::{CONTENT_TYPE_TURTLE, Method, PodRequest, StatusCode};

use super::context::PodContext;

const BASIC_CONTAINER_LINK: &str = "<http://www.w3.org/ns/ldp#BasicContainer>; rel=\"type\"";

/// Make sure `container` exists
pub async fn ensure_container(ctx: &PodContext, container: &str) -> Result<()> {
    let probe = ctx.send(PodRequest::head(container)).await?;
    if probe.is_success() || probe.is_denied() || probe.status == StatusCode::METHOD_NOT_ALLOWED {
        return Ok(());
    }
    if !probe.is_not_found() {
        return Err(probe.error_for(&Method::HEAD, container));
    }

    let create = PodRequest::put(container)
        .header("Link", BASIC_CONTAINER_LINK)
        .body(CONTENT_TYPE_TURTLE, "");
    let response = ctx.send(create).await?;
    if response.is_success() || response.status == StatusCode::CONFLICT {
        tracing::debug!(container = %container, status = %response.status, "container provisioned");
        return Ok(());
    }
    Err(response.error_for(&Method::PUT, container))
}

/// Root, conversations and messages containers, in that order
pub async fn ensure_base_structure(ctx: &PodContext) -> Result<()> {
    let layout = ctx.layout();
    ensure_container(ctx, layout.root()).await?;
    ensure_container(ctx, &layout.conversations_container()).await?;
    ensure_container(ctx, &layout.messages_root()).await?;
    Ok(())
}
