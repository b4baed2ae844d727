//! In-process Solid server
//!
//! Enough of LDP and Web Access Control to run the adapter without a network:
//! containers list their members with `ldp:contains`, `POST` honors `Slug`,
//! every resource advertises its policy through `Link: rel="acl"`, and reads by
//! anyone other than the storage owner are checked against `.acl` documents.
//!
//! Failures can be injected per method and URL fragment to exercise the
//! degraded paths.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use super::{CONTENT_TYPE_TURTLE, Method, PodFetch, PodRequest, PodResponse, StatusCode};
use crate::error::Result;
use crate::storage::turtle::{PIM_STORAGE, iri};
use crate::storage::types::{AccessMode, PolicyDocument};

#[derive(Clone, Debug)]
struct Resource {
    content_type: String,
    body: String,
}

#[derive(Clone, Debug)]
struct FailureRule {
    method: Option<Method>,
    url_fragment: String,
    status: StatusCode,
}

#[derive(Debug, Default)]
struct PodState {
    resources: BTreeMap<String, Resource>,
    containers: BTreeSet<String>,
    failures: Vec<FailureRule>,
    requests: Vec<(Method, String)>,
}

impl PodState {
    fn exists(&self, url: &str) -> bool {
        if url.ends_with('/') {
            self.containers.contains(url)
        } else {
            self.resources.contains_key(url)
        }
    }

    /// Direct members of a container, excluding policy resources
    fn children(&self, container: &str) -> Vec<String> {
        let resources = self.resources.keys();
        let containers = self.containers.iter();
        resources
            .chain(containers)
            .filter_map(|url| url.strip_prefix(container))
            .filter(|rest| !rest.is_empty())
            .filter(|rest| match rest.find('/') {
                None => !rest.ends_with(".acl"),
                Some(pos) => pos == rest.len() - 1,
            })
            .map(|rest| rest.to_string())
            .collect()
    }

    fn create_ancestors(&mut self, url: &str) {
        let mut current = url.to_string();
        while let Some(parent) = parent_container(&current) {
            self.containers.insert(parent.clone());
            current = parent;
        }
    }

    fn policy(&self, policy_url: &str) -> Option<PolicyDocument> {
        self.resources
            .get(policy_url)
            .map(|r| PolicyDocument::from_turtle(&r.body, policy_url))
    }
}

/// The container holding `url`, or `None` at the origin root
fn parent_container(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    if parsed.path() == "/" {
        return None;
    }
    let trimmed = url.trim_end_matches('/');
    let (parent, _) = trimmed.rsplit_once('/')?;
    Some(format!("{}/", parent))
}

fn strip_fragment(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}

/// Shared in-memory Pod; clone freely, all clones see the same state
#[derive(Clone, Debug)]
pub struct MemoryPod {
    state: Arc<Mutex<PodState>>,
    owner_web_id: String,
    storage_base: String,
}

impl MemoryPod {
    /// A Pod whose profile advertises `storage_base` via `pim:storage`
    pub fn new(owner_web_id: impl Into<String>, storage_base: impl Into<String>) -> Self {
        Self::build(owner_web_id.into(), storage_base.into(), true)
    }

    /// A Pod whose profile exists but names no storage
    pub fn unadvertised(owner_web_id: impl Into<String>, storage_base: impl Into<String>) -> Self {
        Self::build(owner_web_id.into(), storage_base.into(), false)
    }

    fn build(owner_web_id: String, mut storage_base: String, advertise: bool) -> Self {
        if !storage_base.ends_with('/') {
            storage_base.push('/');
        }
        let pod = Self {
            state: Arc::new(Mutex::new(PodState::default())),
            owner_web_id,
            storage_base,
        };

        {
            let mut state = pod.state.lock().unwrap();
            state.containers.insert(pod.storage_base.clone());
            state.create_ancestors(&pod.storage_base);

            let base_acl = format!("{}.acl", pod.storage_base);
            let owner_only = {
                let mut doc = PolicyDocument::default();
                doc.add_owner_grant(&base_acl, &pod.storage_base, &pod.owner_web_id, true);
                doc
            };
            state.resources.insert(
                base_acl.clone(),
                Resource {
                    content_type: CONTENT_TYPE_TURTLE.to_string(),
                    body: owner_only.to_turtle(&base_acl),
                },
            );

            let profile = strip_fragment(&pod.owner_web_id).to_string();
            let body = if advertise {
                format!(
                    "{} {} {}.\n",
                    iri(&pod.owner_web_id),
                    iri(PIM_STORAGE),
                    iri(&pod.storage_base)
                )
            } else {
                format!(
                    "{} <http://xmlns.com/foaf/0.1/name> \"Owner\".\n",
                    iri(&pod.owner_web_id)
                )
            };
            state.create_ancestors(&profile);
            state.resources.insert(
                profile.clone(),
                Resource {
                    content_type: CONTENT_TYPE_TURTLE.to_string(),
                    body,
                },
            );

            let profile_acl = format!("{}.acl", profile);
            let readable = PolicyDocument::public_read(&profile_acl, &profile, &pod.owner_web_id, false);
            state.resources.insert(
                profile_acl.clone(),
                Resource {
                    content_type: CONTENT_TYPE_TURTLE.to_string(),
                    body: readable.to_turtle(&profile_acl),
                },
            );
        }

        pod
    }

    pub fn owner_web_id(&self) -> &str {
        &self.owner_web_id
    }

    pub fn storage_base(&self) -> &str {
        &self.storage_base
    }

    /// Requests made with the owner's credentials
    pub fn owner_client(&self) -> MemoryPodClient {
        self.client(Some(self.owner_web_id.clone()))
    }

    /// Unauthenticated requests
    pub fn public_client(&self) -> MemoryPodClient {
        self.client(None)
    }

    pub fn client(&self, agent: Option<String>) -> MemoryPodClient {
        MemoryPodClient {
            pod: self.clone(),
            agent,
        }
    }

    // ========================================================================
    // Inspection and fault injection
    // ========================================================================

    pub fn contains(&self, url: &str) -> bool {
        self.state.lock().unwrap().exists(url)
    }

    pub fn resource_body(&self, url: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .resources
            .get(url)
            .map(|r| r.body.clone())
    }

    /// Store a resource directly, bypassing access control
    pub fn put_resource(&self, url: &str, content_type: &str, body: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.create_ancestors(url);
        state.resources.insert(
            url.to_string(),
            Resource {
                content_type: content_type.to_string(),
                body: body.into(),
            },
        );
    }

    /// Answer requests whose URL contains `url_fragment` with `status`
    pub fn inject_failure(&self, method: Option<Method>, url_fragment: &str, status: StatusCode) {
        self.state.lock().unwrap().failures.push(FailureRule {
            method,
            url_fragment: url_fragment.to_string(),
            status,
        });
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    /// Every request seen so far, in order
    pub fn requests(&self) -> Vec<(Method, String)> {
        self.state.lock().unwrap().requests.clone()
    }

    // ========================================================================
    // Request handling
    // ========================================================================

    fn handle(&self, agent: Option<&str>, request: &PodRequest) -> PodResponse {
        let mut state = self.state.lock().unwrap();
        let url = strip_fragment(&request.url).to_string();
        state.requests.push((request.method.clone(), url.clone()));

        let injected = state.failures.iter().find(|rule| {
            rule.method.as_ref().map(|m| *m == request.method).unwrap_or(true)
                && url.contains(&rule.url_fragment)
        });
        if let Some(rule) = injected {
            return PodResponse::new(rule.status).with_body("text/plain", "injected failure");
        }

        let mode = match request.method {
            Method::GET | Method::HEAD => AccessMode::Read,
            Method::POST => AccessMode::Append,
            _ => AccessMode::Write,
        };
        if !self.is_allowed(&state, agent, mode, &url) {
            let status = if agent.is_some() {
                StatusCode::FORBIDDEN
            } else {
                StatusCode::UNAUTHORIZED
            };
            return PodResponse::new(status);
        }

        match request.method {
            Method::GET => Self::get(&state, &url, true),
            Method::HEAD => Self::get(&state, &url, false),
            Method::PUT => Self::put(&mut state, &url, request),
            Method::POST => Self::post(&mut state, &url, request),
            Method::DELETE => Self::delete(&mut state, &url),
            _ => PodResponse::new(StatusCode::METHOD_NOT_ALLOWED),
        }
    }

    fn is_allowed(&self, state: &PodState, agent: Option<&str>, mode: AccessMode, url: &str) -> bool {
        if agent == Some(self.owner_web_id.as_str()) {
            return true;
        }

        let (target, mode) = match url.strip_suffix(".acl") {
            Some(protected) => (protected.to_string(), AccessMode::Control),
            None => (url.to_string(), mode),
        };

        if let Some(policy) = state.policy(&format!("{}.acl", target)) {
            return policy.allows(agent, mode, &target, false);
        }

        let mut current = target;
        while let Some(parent) = parent_container(&current) {
            if let Some(policy) = state.policy(&format!("{}.acl", parent)) {
                return policy.allows(agent, mode, &parent, true);
            }
            current = parent;
        }
        false
    }

    fn get(state: &PodState, url: &str, with_body: bool) -> PodResponse {
        if !state.exists(url) {
            return PodResponse::new(StatusCode::NOT_FOUND);
        }
        let acl_link = format!("<{}.acl>; rel=\"acl\"", url);

        if url.ends_with('/') {
            let mut response = PodResponse::new(StatusCode::OK)
                .with_header("link", &acl_link)
                .with_header("link", "<http://www.w3.org/ns/ldp#BasicContainer>; rel=\"type\"");
            if with_body {
                let members: Vec<String> = state.children(url).iter().map(|m| iri(m)).collect();
                let mut body = String::from(
                    "@prefix ldp: <http://www.w3.org/ns/ldp#>.\n<> a ldp:Container, ldp:BasicContainer",
                );
                if !members.is_empty() {
                    body.push_str(";\n    ldp:contains ");
                    body.push_str(&members.join(", "));
                }
                body.push_str(".\n");
                response = response.with_body(CONTENT_TYPE_TURTLE, body);
            }
            return response;
        }

        let Some(resource) = state.resources.get(url) else {
            return PodResponse::new(StatusCode::NOT_FOUND);
        };
        let response = PodResponse::new(StatusCode::OK).with_header("link", &acl_link);
        if with_body {
            response.with_body(&resource.content_type, resource.body.clone())
        } else {
            response.with_header("content-type", &resource.content_type)
        }
    }

    fn put(state: &mut PodState, url: &str, request: &PodRequest) -> PodResponse {
        if url.ends_with('/') {
            if state.containers.contains(url) {
                return PodResponse::new(StatusCode::CONFLICT);
            }
            state.create_ancestors(url);
            state.containers.insert(url.to_string());
            return PodResponse::new(StatusCode::CREATED);
        }

        let existed = state.resources.contains_key(url);
        state.create_ancestors(url);
        state.resources.insert(
            url.to_string(),
            Resource {
                content_type: request
                    .header_value("content-type")
                    .unwrap_or("application/octet-stream")
                    .to_string(),
                body: request.body.clone().unwrap_or_default(),
            },
        );
        if existed {
            PodResponse::new(StatusCode::NO_CONTENT)
        } else {
            PodResponse::new(StatusCode::CREATED)
        }
    }

    fn post(state: &mut PodState, container: &str, request: &PodRequest) -> PodResponse {
        if !container.ends_with('/') || !state.containers.contains(container) {
            return PodResponse::new(StatusCode::NOT_FOUND);
        }
        let slug = request
            .header_value("slug")
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut name = urlencoding::encode(&slug).into_owned();
        if state.exists(&format!("{}{}", container, name))
            || state.exists(&format!("{}{}/", container, name))
        {
            name = format!("{}-{}", uuid::Uuid::new_v4(), name);
        }

        let location = format!("{}{}", container, name);
        state.resources.insert(
            location.clone(),
            Resource {
                content_type: request
                    .header_value("content-type")
                    .unwrap_or("application/octet-stream")
                    .to_string(),
                body: request.body.clone().unwrap_or_default(),
            },
        );
        PodResponse::new(StatusCode::CREATED).with_header("location", &location)
    }

    fn delete(state: &mut PodState, url: &str) -> PodResponse {
        if !state.exists(url) {
            return PodResponse::new(StatusCode::NOT_FOUND);
        }
        if url.ends_with('/') {
            if !state.children(url).is_empty() {
                return PodResponse::new(StatusCode::CONFLICT);
            }
            state.containers.remove(url);
        } else {
            state.resources.remove(url);
        }
        state.resources.remove(&format!("{}.acl", url));
        PodResponse::new(StatusCode::RESET_CONTENT)
    }
}

/// `PodFetch` acting as one agent against a `MemoryPod`
#[derive(Clone, Debug)]
pub struct MemoryPodClient {
    pod: MemoryPod,
    agent: Option<String>,
}

impl MemoryPodClient {
    pub fn agent(&self) -> Option<&str> {
        self.agent.as_deref()
    }
}

#[async_trait]
impl PodFetch for MemoryPodClient {
    async fn fetch(&self, request: PodRequest) -> Result<PodResponse> {
        Ok(self.pod.handle(self.agent.as_deref(), &request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{CONTENT_TYPE_JSON, parse_link_header};

    const WEB_ID: &str = "https://pod.example/alice/profile/card#me";
    const BASE: &str = "https://pod.example/alice/";

    #[tokio::test]
    async fn test_container_listing_and_slug_post() {
        let pod = MemoryPod::new(WEB_ID, BASE);
        let client = pod.owner_client();

        let put = client
            .fetch(PodRequest::put(format!("{}chat/", BASE)))
            .await
            .unwrap();
        assert_eq!(put.status, StatusCode::CREATED);

        let post = client
            .fetch(
                PodRequest::post(format!("{}chat/", BASE))
                    .header("Slug", "c1.json")
                    .body(CONTENT_TYPE_JSON, "{}"),
            )
            .await
            .unwrap();
        assert_eq!(post.status, StatusCode::CREATED);
        assert_eq!(
            post.header_values("location"),
            vec![format!("{}chat/c1.json", BASE)]
        );

        let listing = client
            .fetch(PodRequest::get(format!("{}chat/", BASE)))
            .await
            .unwrap();
        assert!(listing.body.contains("<c1.json>"));
    }

    #[tokio::test]
    async fn test_existing_container_conflicts() {
        let pod = MemoryPod::new(WEB_ID, BASE);
        let client = pod.owner_client();
        let again = client.fetch(PodRequest::put(BASE)).await.unwrap();
        assert_eq!(again.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_public_access_requires_policy() {
        let pod = MemoryPod::new(WEB_ID, BASE);
        let url = format!("{}chat/c1.json", BASE);
        pod.put_resource(&url, CONTENT_TYPE_JSON, "{}");

        let public = pod.public_client();
        let denied = public.fetch(PodRequest::get(url.clone())).await.unwrap();
        assert_eq!(denied.status, StatusCode::UNAUTHORIZED);

        let acl = format!("{}.acl", url);
        let doc = PolicyDocument::public_read(&acl, &url, WEB_ID, false);
        pod.put_resource(&acl, CONTENT_TYPE_TURTLE, doc.to_turtle(&acl));

        let allowed = public.fetch(PodRequest::get(url.clone())).await.unwrap();
        assert_eq!(allowed.status, StatusCode::OK);

        let stranger = pod.client(Some("https://other.example/#me".to_string()));
        let write = stranger
            .fetch(PodRequest::put(url).body(CONTENT_TYPE_JSON, "{}"))
            .await
            .unwrap();
        assert_eq!(write.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_head_advertises_policy() {
        let pod = MemoryPod::new(WEB_ID, BASE);
        let head = pod.owner_client().fetch(PodRequest::head(BASE)).await.unwrap();
        let links = parse_link_header(&head.header_values("link"));
        assert!(links.contains(&(format!("{}.acl", BASE), "acl".to_string())));
    }

    #[tokio::test]
    async fn test_non_empty_container_delete_conflicts() {
        let pod = MemoryPod::new(WEB_ID, BASE);
        pod.put_resource(&format!("{}chat/a.json", BASE), CONTENT_TYPE_JSON, "{}");
        let client = pod.owner_client();
        let response = client
            .fetch(PodRequest::delete(format!("{}chat/", BASE)))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let pod = MemoryPod::new(WEB_ID, BASE);
        pod.inject_failure(Some(Method::GET), "/alice/", StatusCode::INTERNAL_SERVER_ERROR);
        let client = pod.owner_client();
        let get = client.fetch(PodRequest::get(BASE)).await.unwrap();
        assert_eq!(get.status, StatusCode::INTERNAL_SERVER_ERROR);
        let head = client.fetch(PodRequest::head(BASE)).await.unwrap();
        assert_eq!(head.status, StatusCode::OK);
    }
}
