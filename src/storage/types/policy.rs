//! Access-control policy documents (Web Access Control)
//!
//! A policy is a set of `acl:Authorization` nodes. Each names its subjects
//! (`acl:agent`, `acl:agentClass`, ...), its targets (`acl:accessTo`, and
//! `acl:default` for grants inherited by a container's members) and its modes.
//!
//! Only authorization statements survive a read-modify-write; anything else in
//! the document is dropped when it is serialized again.

use std::collections::BTreeSet;

use crate::storage::turtle::{self, Term, Triple, RDF_TYPE};

pub const ACL_NS: &str = "http://www.w3.org/ns/auth/acl#";
pub const FOAF_AGENT: &str = "http://xmlns.com/foaf/0.1/Agent";
pub const AUTHENTICATED_AGENT: &str = "http://www.w3.org/ns/auth/acl#AuthenticatedAgent";

const ACL_AUTHORIZATION: &str = "http://www.w3.org/ns/auth/acl#Authorization";
const ACL_AGENT: &str = "http://www.w3.org/ns/auth/acl#agent";
const ACL_AGENT_CLASS: &str = "http://www.w3.org/ns/auth/acl#agentClass";
const ACL_AGENT_GROUP: &str = "http://www.w3.org/ns/auth/acl#agentGroup";
const ACL_ORIGIN: &str = "http://www.w3.org/ns/auth/acl#origin";
const ACL_ACCESS_TO: &str = "http://www.w3.org/ns/auth/acl#accessTo";
const ACL_DEFAULT: &str = "http://www.w3.org/ns/auth/acl#default";
const ACL_DEFAULT_FOR_NEW: &str = "http://www.w3.org/ns/auth/acl#defaultForNew";
const ACL_MODE: &str = "http://www.w3.org/ns/auth/acl#mode";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessMode {
    Read,
    Write,
    Append,
    Control,
}

impl AccessMode {
    pub const OWNER: [AccessMode; 4] = [
        AccessMode::Read,
        AccessMode::Write,
        AccessMode::Append,
        AccessMode::Control,
    ];

    pub fn local_name(&self) -> &'static str {
        match self {
            AccessMode::Read => "Read",
            AccessMode::Write => "Write",
            AccessMode::Append => "Append",
            AccessMode::Control => "Control",
        }
    }

    pub fn from_iri(iri: &str) -> Option<Self> {
        match iri.strip_prefix(ACL_NS)? {
            "Read" => Some(AccessMode::Read),
            "Write" => Some(AccessMode::Write),
            "Append" => Some(AccessMode::Append),
            "Control" => Some(AccessMode::Control),
            _ => None,
        }
    }
}

/// Who an authorization applies to
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Subject {
    /// A single WebID
    Agent(String),
    /// `acl:agentClass foaf:Agent`, i.e. everyone including anonymous readers
    Public,
    /// Any other `acl:agentClass`
    Class(String),
    Group(String),
    Origin(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authorization {
    /// IRI of the authorization node
    pub id: String,
    pub subjects: Vec<Subject>,
    pub access_to: Vec<String>,
    /// Containers whose members inherit this grant
    pub default: Vec<String>,
    pub modes: BTreeSet<AccessMode>,
}

impl Authorization {
    pub fn is_inheritable(&self) -> bool {
        !self.default.is_empty()
    }

    pub fn is_public(&self) -> bool {
        self.subjects.contains(&Subject::Public)
    }

    fn applies_to(&self, agent: Option<&str>) -> bool {
        self.subjects.iter().any(|s| match s {
            Subject::Public => true,
            Subject::Agent(a) => agent == Some(a.as_str()),
            Subject::Class(c) => c == AUTHENTICATED_AGENT && agent.is_some(),
            Subject::Group(_) | Subject::Origin(_) => false,
        })
    }

    fn grants(&self, mode: AccessMode) -> bool {
        self.modes.contains(&mode)
            || (mode == AccessMode::Append && self.modes.contains(&AccessMode::Write))
    }
}

/// Parsed policy document
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicyDocument {
    pub authorizations: Vec<Authorization>,
}

impl PolicyDocument {
    /// Owner grant with full control, public grant with read only
    pub fn public_read(
        policy_url: &str,
        resource: &str,
        owner_web_id: &str,
        is_container: bool,
    ) -> Self {
        let mut doc = PolicyDocument::default();
        doc.add_owner_grant(policy_url, resource, owner_web_id, is_container);
        doc.add_public_grant(policy_url, resource, is_container);
        doc
    }

    /// Owner holds Control through some authorization
    pub fn has_owner_grant(&self, owner_web_id: &str) -> bool {
        self.authorizations.iter().any(|a| {
            a.subjects.contains(&Subject::Agent(owner_web_id.to_string()))
                && a.modes.contains(&AccessMode::Control)
        })
    }

    pub fn has_public_read(&self) -> bool {
        self.authorizations
            .iter()
            .any(|a| a.is_public() && a.modes.contains(&AccessMode::Read))
    }

    pub fn owner_grant(&self, owner_web_id: &str) -> Option<&Authorization> {
        self.authorizations.iter().find(|a| {
            a.subjects.contains(&Subject::Agent(owner_web_id.to_string()))
                && a.modes.contains(&AccessMode::Control)
        })
    }

    pub fn public_grant(&self) -> Option<&Authorization> {
        self.authorizations.iter().find(|a| a.is_public())
    }

    pub fn add_owner_grant(
        &mut self,
        policy_url: &str,
        resource: &str,
        owner_web_id: &str,
        is_container: bool,
    ) {
        let id = self.unique_id(policy_url, "owner");
        self.authorizations.push(Authorization {
            id,
            subjects: vec![Subject::Agent(owner_web_id.to_string())],
            access_to: vec![resource.to_string()],
            default: if is_container { vec![resource.to_string()] } else { Vec::new() },
            modes: AccessMode::OWNER.into_iter().collect(),
        });
    }

    pub fn add_public_grant(&mut self, policy_url: &str, resource: &str, is_container: bool) {
        let id = self.unique_id(policy_url, "public");
        self.authorizations.push(Authorization {
            id,
            subjects: vec![Subject::Public],
            access_to: vec![resource.to_string()],
            default: if is_container { vec![resource.to_string()] } else { Vec::new() },
            modes: [AccessMode::Read].into_iter().collect(),
        });
    }

    /// Drop the public subject everywhere; authorizations left with no subject
    /// are removed. Returns whether anything changed.
    pub fn remove_public(&mut self) -> bool {
        let before = self.clone();
        for auth in &mut self.authorizations {
            auth.subjects.retain(|s| *s != Subject::Public);
        }
        self.authorizations.retain(|a| !a.subjects.is_empty());
        *self != before
    }

    pub fn is_empty(&self) -> bool {
        self.authorizations.is_empty()
    }

    /// WAC check. `inherited` selects `acl:default` grants (policy found on an
    /// ancestor container) instead of `acl:accessTo` grants.
    pub fn allows(&self, agent: Option<&str>, mode: AccessMode, target: &str, inherited: bool) -> bool {
        self.authorizations.iter().any(|a| {
            let covers = if inherited {
                a.default.iter().any(|d| d == target)
            } else {
                a.access_to.iter().any(|t| t == target)
            };
            covers && a.applies_to(agent) && a.grants(mode)
        })
    }

    fn unique_id(&self, policy_url: &str, name: &str) -> String {
        let base = format!("{}#{}", policy_url, name);
        if !self.authorizations.iter().any(|a| a.id == base) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}-{}", base, n);
            if !self.authorizations.iter().any(|a| a.id == candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    // ========================================================================
    // Turtle
    // ========================================================================

    pub fn from_turtle(document: &str, policy_url: &str) -> Self {
        let triples = turtle::parse(document, policy_url);
        let mut order: Vec<String> = Vec::new();
        for t in &triples {
            if t.predicate == RDF_TYPE && t.object.as_iri() == Some(ACL_AUTHORIZATION) {
                if let Term::Iri(id) = &t.subject {
                    if !order.contains(id) {
                        order.push(id.clone());
                    }
                }
            }
        }

        let authorizations = order
            .into_iter()
            .map(|id| Self::collect_authorization(&triples, id))
            .collect();
        PolicyDocument { authorizations }
    }

    fn collect_authorization(triples: &[Triple], id: String) -> Authorization {
        let mut auth = Authorization {
            id: id.clone(),
            subjects: Vec::new(),
            access_to: Vec::new(),
            default: Vec::new(),
            modes: BTreeSet::new(),
        };
        for t in triples.iter().filter(|t| t.subject.as_iri() == Some(id.as_str())) {
            let Some(object) = t.object.as_iri() else {
                continue;
            };
            match t.predicate.as_str() {
                ACL_AGENT => auth.subjects.push(Subject::Agent(object.to_string())),
                ACL_AGENT_CLASS if object == FOAF_AGENT => auth.subjects.push(Subject::Public),
                ACL_AGENT_CLASS => auth.subjects.push(Subject::Class(object.to_string())),
                ACL_AGENT_GROUP => auth.subjects.push(Subject::Group(object.to_string())),
                ACL_ORIGIN => auth.subjects.push(Subject::Origin(object.to_string())),
                ACL_ACCESS_TO => auth.access_to.push(object.to_string()),
                ACL_DEFAULT | ACL_DEFAULT_FOR_NEW => auth.default.push(object.to_string()),
                ACL_MODE => {
                    if let Some(mode) = AccessMode::from_iri(object) {
                        auth.modes.insert(mode);
                    }
                }
                _ => {}
            }
        }
        auth
    }

    pub fn to_turtle(&self, policy_url: &str) -> String {
        let mut out = String::from(
            "@prefix acl: <http://www.w3.org/ns/auth/acl#>.\n@prefix foaf: <http://xmlns.com/foaf/0.1/>.\n",
        );
        let local_prefix = format!("{}#", policy_url);

        for auth in &self.authorizations {
            let node = match auth.id.strip_prefix(&local_prefix) {
                Some(fragment) => format!("<#{}>", fragment),
                None => turtle::iri(&auth.id),
            };
            let mut lines = vec!["a acl:Authorization".to_string()];
            for subject in &auth.subjects {
                lines.push(match subject {
                    Subject::Agent(a) => format!("acl:agent {}", turtle::iri(a)),
                    Subject::Public => "acl:agentClass foaf:Agent".to_string(),
                    Subject::Class(c) => format!("acl:agentClass {}", turtle::iri(c)),
                    Subject::Group(g) => format!("acl:agentGroup {}", turtle::iri(g)),
                    Subject::Origin(o) => format!("acl:origin {}", turtle::iri(o)),
                });
            }
            for target in &auth.access_to {
                lines.push(format!("acl:accessTo {}", turtle::iri(target)));
            }
            for target in &auth.default {
                lines.push(format!("acl:default {}", turtle::iri(target)));
            }
            if !auth.modes.is_empty() {
                let modes: Vec<String> = auth
                    .modes
                    .iter()
                    .map(|m| format!("acl:{}", m.local_name()))
                    .collect();
                lines.push(format!("acl:mode {}", modes.join(", ")));
            }
            out.push_str(&format!("\n{}\n    {}.\n", node, lines.join(";\n    ")));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = "https://pod.example/chat/conversations/c1.json.acl";
    const RESOURCE: &str = "https://pod.example/chat/conversations/c1.json";
    const OWNER: &str = "https://pod.example/alice/profile/card#me";

    #[test]
    fn test_fresh_document_round_trip() {
        let doc = PolicyDocument::public_read(POLICY, RESOURCE, OWNER, false);
        let text = doc.to_turtle(POLICY);
        assert!(text.contains("<#owner>"));
        assert!(text.contains("acl:agentClass foaf:Agent"));

        let parsed = PolicyDocument::from_turtle(&text, POLICY);
        assert_eq!(parsed, doc);
        assert!(parsed.has_owner_grant(OWNER));
        assert!(parsed.has_public_read());
        assert_eq!(
            parsed.public_grant().unwrap().modes,
            [AccessMode::Read].into_iter().collect()
        );
    }

    #[test]
    fn test_container_grants_are_inheritable() {
        let container = "https://pod.example/chat/messages/c1/";
        let doc = PolicyDocument::public_read(&format!("{}.acl", container), container, OWNER, true);
        assert!(doc.authorizations.iter().all(|a| a.is_inheritable()));
        assert!(doc.allows(None, AccessMode::Read, container, true));
        assert!(!doc.allows(None, AccessMode::Write, container, true));
        assert!(doc.allows(Some(OWNER), AccessMode::Append, container, true));
    }

    #[test]
    fn test_remove_public_keeps_owner() {
        let mut doc = PolicyDocument::public_read(POLICY, RESOURCE, OWNER, false);
        assert!(doc.remove_public());
        assert_eq!(doc.authorizations.len(), 1);
        assert!(doc.has_owner_grant(OWNER));
        assert!(!doc.has_public_read());
        assert!(!doc.remove_public());
    }

    #[test]
    fn test_remove_public_from_mixed_authorization() {
        let text = format!(
            "@prefix acl: <http://www.w3.org/ns/auth/acl#>.\n\
             <#mixed> a acl:Authorization; acl:agent <{}>; acl:agentClass <http://xmlns.com/foaf/0.1/Agent>;\n\
             acl:accessTo <{}>; acl:mode acl:Read, acl:Control.\n",
            OWNER, RESOURCE
        );
        let mut doc = PolicyDocument::from_turtle(&text, POLICY);
        assert!(doc.has_public_read());
        assert!(doc.remove_public());
        assert_eq!(doc.authorizations.len(), 1);
        assert_eq!(doc.authorizations[0].subjects, vec![Subject::Agent(OWNER.to_string())]);
    }

    #[test]
    fn test_foreign_document_with_full_iris() {
        let text = format!(
            "<{p}#a> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://www.w3.org/ns/auth/acl#Authorization> ;\n\
             <http://www.w3.org/ns/auth/acl#agent> <{o}> ;\n\
             <http://www.w3.org/ns/auth/acl#accessTo> <{r}> ;\n\
             <http://www.w3.org/ns/auth/acl#mode> <http://www.w3.org/ns/auth/acl#Write>, <http://www.w3.org/ns/auth/acl#Control> .\n",
            p = POLICY,
            o = OWNER,
            r = RESOURCE
        );
        let doc = PolicyDocument::from_turtle(&text, POLICY);
        assert_eq!(doc.authorizations.len(), 1);
        assert!(doc.has_owner_grant(OWNER));
        assert!(!doc.has_public_read());
    }

    #[test]
    fn test_unique_ids() {
        let mut doc = PolicyDocument::public_read(POLICY, RESOURCE, OWNER, false);
        doc.add_public_grant(POLICY, RESOURCE, false);
        assert_eq!(doc.authorizations[2].id, format!("{}#public-2", POLICY));
    }
}
