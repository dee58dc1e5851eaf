//! Cross-document link building
//!
//! A [`RouteMap`] maps each [`Environment`] to a path template. Templates may
//! use two placeholders:
//!
//! | Placeholder | Replaced with |
//! |-------------|---------------|
//! | `{doc_uid}` | Target document uid |
//! | `{doc_slug}` | Target document slug (needs a registry entry) |
//!
//! The anchor, when present, becomes the URL fragment. Anchors must be in
//! slug form, so fragments never need percent-encoding.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::registry::RegistryEntry;
use super::slug::is_slug;

/// Environment variable naming the active environment
pub const ENVIRONMENT_VAR: &str = "DOCANCHOR_ENV";

const UID_PLACEHOLDER: &str = "{doc_uid}";
const SLUG_PLACEHOLDER: &str = "{doc_slug}";

/// Deployment surface a link is built for
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Internal content-library pages
    #[default]
    ContentLibrary,

    /// External knowledge base
    KnowledgeBase,

    /// Developer documentation
    DevDocs,
}

impl Environment {
    pub fn all() -> &'static [Environment] {
        &[
            Environment::ContentLibrary,
            Environment::KnowledgeBase,
            Environment::DevDocs,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::ContentLibrary => "content_library",
            Environment::KnowledgeBase => "knowledge_base",
            Environment::DevDocs => "dev_docs",
        }
    }

    /// Reads the environment from `DOCANCHOR_ENV`, defaulting to the content library
    pub fn from_env() -> Self {
        std::env::var(ENVIRONMENT_VAR)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    fn default_template(&self) -> &'static str {
        match self {
            Environment::ContentLibrary => "/library/docs/{doc_uid}",
            Environment::KnowledgeBase => "/kb/articles/{doc_uid}",
            Environment::DevDocs => "/dev/docs/{doc_uid}",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "content_library" | "library" => Ok(Environment::ContentLibrary),
            "knowledge_base" | "kb" => Ok(Environment::KnowledgeBase),
            "dev_docs" | "docs" => Ok(Environment::DevDocs),
            _ => Err(format!("Unknown environment: {}", s)),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum LinkError {
    #[error("Target document '{0}' is not in the registry")]
    UnresolvedTarget(String),

    #[error("Document '{doc_uid}' has no heading with anchor '{anchor_id}'")]
    UnknownAnchor { doc_uid: String, anchor_id: String },

    #[error("No route configured for environment '{0}'")]
    NoRoute(Environment),

    #[error("Route template '{0}' needs {{doc_slug}}, which requires a registry entry")]
    SlugUnavailable(String),

    #[error("Anchor '{0}' is not a valid fragment (expected lower-case letters, digits and single hyphens)")]
    InvalidAnchor(String),

    #[error("Target document uid is empty")]
    EmptyTarget,

    #[error("Registry lookup failed: {0}")]
    Registry(String),
}

/// Environment → path template mapping, with one active environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMap {
    environment: Environment,
    templates: BTreeMap<Environment, String>,
}

impl RouteMap {
    /// Creates an empty route map for `environment`
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            templates: BTreeMap::new(),
        }
    }

    /// Adds or replaces a route (builder style)
    pub fn with_route(mut self, environment: Environment, template: impl Into<String>) -> Self {
        self.templates.insert(environment, template.into());
        self
    }

    /// Same routes with a different active environment
    pub fn for_environment(&self, environment: Environment) -> Self {
        Self {
            environment,
            templates: self.templates.clone(),
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn template(&self, environment: Environment) -> Option<&str> {
        self.templates.get(&environment).map(String::as_str)
    }

    /// Template for the active environment
    pub fn active_template(&self) -> Result<&str, LinkError> {
        self.template(self.environment)
            .ok_or(LinkError::NoRoute(self.environment))
    }

    pub fn routes(&self) -> impl Iterator<Item = (Environment, &str)> {
        self.templates.iter().map(|(e, t)| (*e, t.as_str()))
    }
}

/// Built-in routes for every environment, with `environment` active
pub fn get_default_route_map(environment: Environment) -> RouteMap {
    Environment::all()
        .iter()
        .fold(RouteMap::new(environment), |map, env| {
            map.with_route(*env, env.default_template())
        })
}

/// Builds an href for `target_doc_uid` using the active route.
///
/// This does not consult the registry: callers must know the target exists.
/// Templates using `{doc_slug}` fail with [`LinkError::SlugUnavailable`].
pub fn build_href(
    target_doc_uid: &str,
    anchor_id: Option<&str>,
    route_map: &RouteMap,
) -> Result<String, LinkError> {
    let template = route_map.active_template()?;
    if template.contains(SLUG_PLACEHOLDER) {
        return Err(LinkError::SlugUnavailable(template.to_string()));
    }
    fill(template, target_doc_uid, None, anchor_id)
}

/// Builds an href to a registered document, checking the anchor against its headings
pub fn build_entry_href(
    entry: &RegistryEntry,
    anchor_id: Option<&str>,
    route_map: &RouteMap,
) -> Result<String, LinkError> {
    if let Some(anchor) = anchor_id.map(str::trim).filter(|a| !a.is_empty()) {
        if !entry.has_anchor(anchor) {
            return Err(LinkError::UnknownAnchor {
                doc_uid: entry.doc_uid.to_string(),
                anchor_id: anchor.to_string(),
            });
        }
    }

    let template = route_map.active_template()?;
    fill(
        template,
        entry.doc_uid.as_str(),
        Some(&entry.doc_slug),
        anchor_id,
    )
}

/// Simplified [`build_href`] using the default routes of the environment
/// named by `DOCANCHOR_ENV`
pub fn build_link(target: &str, anchor_id: Option<&str>) -> Result<String, LinkError> {
    build_link_for(Environment::from_env(), target, anchor_id)
}

/// [`build_link`] for an explicit environment
pub fn build_link_for(
    environment: Environment,
    target: &str,
    anchor_id: Option<&str>,
) -> Result<String, LinkError> {
    build_href(target, anchor_id, &get_default_route_map(environment))
}

fn fill(
    template: &str,
    doc_uid: &str,
    doc_slug: Option<&str>,
    anchor_id: Option<&str>,
) -> Result<String, LinkError> {
    let doc_uid = doc_uid.trim();
    if doc_uid.is_empty() {
        return Err(LinkError::EmptyTarget);
    }

    let mut href = template.replace(UID_PLACEHOLDER, doc_uid);
    if let Some(slug) = doc_slug {
        href = href.replace(SLUG_PLACEHOLDER, slug);
    }

    if let Some(anchor) = anchor_id.map(str::trim).filter(|a| !a.is_empty()) {
        if !is_slug(anchor) {
            return Err(LinkError::InvalidAnchor(anchor.to_string()));
        }
        href.push('#');
        href.push_str(anchor);
    }

    Ok(href)
}
