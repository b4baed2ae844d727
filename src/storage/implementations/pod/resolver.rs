//! Storage location resolution
//!
//! Maps an identity to the root container all chat data lives under:
//!
//! 1. `storage_origin` from configuration, when set
//! 2. the `pim:storage` advertised by the WebID profile
//! 3. the WebID's origin plus its first path segment (or the bare origin),
//!    accepted only if a HEAD probe shows it exists
//!
//! The root is `{base}{root_container}/`.

use url::Url;

use crate::config::PodConfig;
use crate::error::{PodError, Result};
use crate::storage::turtle::{self, PIM_STORAGE, Term};
use crate::transport::{CONTENT_TYPE_TURTLE, PodFetch, PodRequest};

fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// `https://host/alice/profile/card#me` -> `https://host/alice/`; a WebID with
/// fewer than two path segments maps to the bare origin
pub fn derive_storage_base(web_id: &Url) -> String {
    let origin = web_id.origin().ascii_serialization();
    let segments: Vec<&str> = web_id
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    if segments.len() >= 2 {
        format!("{}/{}/", origin, segments[0])
    } else {
        format!("{}/", origin)
    }
}

/// Storage bases advertised by a profile document, statements about the WebID first
pub fn advertised_storage(profile: &str, web_id: &str) -> Vec<String> {
    let document_url = web_id.split('#').next().unwrap_or(web_id);
    let triples = turtle::parse(profile, document_url);
    let mut about_subject: Vec<String> = Vec::new();
    let mut others: Vec<String> = Vec::new();
    for triple in triples.iter().filter(|t| t.predicate == PIM_STORAGE) {
        let Some(storage) = triple.object.as_iri() else {
            continue;
        };
        if triple.subject == Term::Iri(web_id.to_string()) {
            about_subject.push(storage.to_string());
        } else {
            others.push(storage.to_string());
        }
    }
    about_subject.extend(others);
    about_subject
}

/// Resolve the root container for `web_id`
pub async fn resolve_storage_root(
    fetch: &dyn PodFetch,
    web_id: &str,
    config: &PodConfig,
) -> Result<String> {
    let base = resolve_storage_base(fetch, web_id, config).await?;
    let root = format!(
        "{}{}/",
        with_trailing_slash(base),
        config.root_container.trim_matches('/')
    );
    tracing::info!(web_id = %web_id, root = %root, "resolved storage root");
    Ok(root)
}

async fn resolve_storage_base(
    fetch: &dyn PodFetch,
    web_id: &str,
    config: &PodConfig,
) -> Result<String> {
    if let Some(origin) = &config.storage_origin {
        tracing::debug!(origin = %origin, "using configured storage origin");
        return Ok(with_trailing_slash(origin.clone()));
    }

    let parsed = Url::parse(web_id)
        .map_err(|e| PodError::StorageUnresolvable(format!("{}: {}", web_id, e)))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(PodError::StorageUnresolvable(format!(
            "{}: not an HTTP identity",
            web_id
        )));
    }

    let mut profile_url = parsed.clone();
    profile_url.set_fragment(None);
    let request = PodRequest::get(profile_url.as_str()).header("Accept", CONTENT_TYPE_TURTLE);
    match fetch.fetch(request).await {
        Ok(response) if response.is_success() => {
            if let Some(storage) = advertised_storage(&response.body, web_id).into_iter().next() {
                tracing::debug!(storage = %storage, "profile advertises storage");
                return Ok(storage);
            }
        }
        Ok(response) => {
            tracing::debug!(status = %response.status, "profile not readable, deriving storage");
        }
        Err(e) => {
            return Err(PodError::StorageUnresolvable(format!(
                "profile {} unreachable: {}",
                profile_url, e
            )));
        }
    }

    let derived = derive_storage_base(&parsed);
    let probe = fetch
        .fetch(PodRequest::head(derived.as_str()))
        .await
        .map_err(|e| PodError::StorageUnresolvable(format!("{} unreachable: {}", derived, e)))?;
    if probe.is_success() || probe.is_denied() {
        tracing::debug!(storage = %derived, "derived storage from identity");
        Ok(derived)
    } else {
        Err(PodError::StorageUnresolvable(format!(
            "{} answered {}",
            derived, probe.status
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_storage_base() {
        let id = Url::parse("https://pod.example/alice/profile/card#me").unwrap();
        assert_eq!(derive_storage_base(&id), "https://pod.example/alice/");

        let id = Url::parse("https://alice.example/profile#me").unwrap();
        assert_eq!(derive_storage_base(&id), "https://alice.example/");
    }

    #[test]
    fn test_advertised_storage_prefers_subject() {
        let profile = r#"
@prefix pim: <http://www.w3.org/ns/pim/space#>.
<#other> pim:storage <https://elsewhere.example/>.
<#me> pim:storage <https://pod.example/alice/>.
"#;
        let storages = advertised_storage(profile, "https://pod.example/alice/profile/card#me");
        assert_eq!(storages[0], "https://pod.example/alice/");
        assert_eq!(storages.len(), 2);
    }
}
