//! Container listing
//!
//! Members come from the `ldp:contains` statements of the container's Turtle
//! representation. The parsing stays behind `ContainerListing` so callers only
//! ever see member URLs.

use crate::storage::turtle::{self, LDP_CONTAINS};
use crate::transport::{CONTENT_TYPE_TURTLE, PodFetch, PodRequest};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListingStatus {
    Listed,
    /// 404: the container does not exist yet
    Missing,
    /// The request failed; members are empty but may not be
    Degraded,
}

#[derive(Clone, Debug)]
pub struct ContainerListing {
    pub container: String,
    pub members: Vec<String>,
    pub status: ListingStatus,
}

impl ContainerListing {
    fn empty(container: &str, status: ListingStatus) -> Self {
        Self {
            container: container.to_string(),
            members: Vec::new(),
            status,
        }
    }

    /// Absolute member URLs from a Turtle listing body
    pub fn parse(body: &str, container: &str) -> Vec<String> {
        let triples = turtle::parse(body, container);
        let mut members: Vec<String> = Vec::new();
        for member in turtle::iri_objects(&triples, LDP_CONTAINS) {
            if member != container && !members.iter().any(|m| m == member) {
                members.push(member.to_string());
            }
        }
        members
    }

    pub fn is_degraded(&self) -> bool {
        self.status == ListingStatus::Degraded
    }

    /// JSON resources directly in this container
    pub fn json_members(&self) -> Vec<&str> {
        self.members
            .iter()
            .map(String::as_str)
            .filter(|m| m.ends_with(".json"))
            .filter(|m| {
                m.rsplit('/')
                    .next()
                    .map(|name| !name.starts_with('.'))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Sub-containers
    pub fn child_containers(&self) -> Vec<&str> {
        self.members
            .iter()
            .map(String::as_str)
            .filter(|m| m.ends_with('/'))
            .collect()
    }
}

/// GET a container and extract its members
///
/// Never fails: a missing container is an empty listing, and any other failure
/// is an empty listing marked `Degraded` with a warning.
pub async fn list_container(fetch: &dyn PodFetch, container: &str) -> ContainerListing {
    let request = PodRequest::get(container).header("Accept", CONTENT_TYPE_TURTLE);
    let response = match fetch.fetch(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(container = %container, degraded = true, error = %e, "container listing failed, treating as empty");
            return ContainerListing::empty(container, ListingStatus::Degraded);
        }
    };

    if response.is_not_found() {
        return ContainerListing::empty(container, ListingStatus::Missing);
    }
    if !response.is_success() {
        tracing::warn!(
            container = %container,
            degraded = true,
            status = %response.status,
            "container listing failed, treating as empty"
        );
        return ContainerListing::empty(container, ListingStatus::Degraded);
    }

    let members = ContainerListing::parse(&response.body, container);
    tracing::debug!(container = %container, count = members.len(), "listed container");
    ContainerListing {
        container: container.to_string(),
        members,
        status: ListingStatus::Listed,
    }
}
