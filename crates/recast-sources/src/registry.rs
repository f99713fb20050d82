//! Container registry digest lookups over the OCI distribution API.
//!
//! Unqualified references are resolved against the configured registry.
//! Authentication is either HTTP basic (when credentials are configured)
//! or the bearer-token challenge flow most public registries use.

use recast_common::config::SourcesConfig;
use recast_common::error::{RecastError, Result};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, WWW_AUTHENTICATE};
use serde::Deserialize;

use crate::{DigestResolver, ResolvedImage};

const DIGEST_HEADER: &str = "Docker-Content-Digest";

const MANIFEST_TYPES: &[&str] = &[
    "application/vnd.oci.image.index.v1+json",
    "application/vnd.docker.distribution.manifest.list.v2+json",
    "application/vnd.oci.image.manifest.v1+json",
    "application/vnd.docker.distribution.manifest.v2+json",
];

/// Returns the fully-qualified form of `reference`.
///
/// A reference is already qualified when its first `.` comes before its
/// first `/` (`example.com/image`); anything else is placed under `registry`.
#[must_use]
pub fn qualify(reference: &str, registry: &str) -> String {
    match (reference.find('.'), reference.find('/')) {
        (Some(dot), Some(slash)) if dot < slash => reference.to_string(),
        _ => format!("{registry}/{reference}"),
    }
}

/// A qualified reference split into the pieces the API needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// API host, e.g. `registry-1.docker.io`.
    pub host: String,
    /// Repository path, e.g. `library/alpine`.
    pub repository: String,
    /// Tag or digest to look up.
    pub reference: String,
}

impl ImageRef {
    /// Parses a qualified image name such as `reg.c5h.io/base:3` or
    /// `docker.io/alpine@sha256:...`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name has no repository component.
    pub fn parse(qualified: &str) -> Result<Self> {
        let (host, rest) = qualified
            .split_once('/')
            .filter(|(_, rest)| !rest.is_empty())
            .ok_or_else(|| RecastError::Config {
                message: format!("image reference has no repository: {qualified}"),
            })?;

        let (repository, reference) = if let Some((repo, digest)) = rest.split_once('@') {
            (repo.to_string(), digest.to_string())
        } else {
            match rest.rsplit_once(':') {
                Some((repo, tag)) if !tag.contains('/') => (repo.to_string(), tag.to_string()),
                _ => (rest.to_string(), "latest".to_string()),
            }
        };

        let (host, repository) = if host == "docker.io" || host == "index.docker.io" {
            let repository = if repository.contains('/') {
                repository
            } else {
                format!("library/{repository}")
            };
            ("registry-1.docker.io".to_string(), repository)
        } else {
            (host.to_string(), repository)
        };

        Ok(Self {
            host,
            repository,
            reference,
        })
    }

    fn manifest_url(&self) -> String {
        format!(
            "https://{}/v2/{}/manifests/{}",
            self.host, self.repository, self.reference
        )
    }
}

/// Parameters of a `WWW-Authenticate: Bearer ...` challenge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BearerChallenge {
    /// Token endpoint.
    pub realm: String,
    /// Service name to request a token for.
    pub service: Option<String>,
    /// Scope requested by the registry, if any.
    pub scope: Option<String>,
}

/// Parses a bearer challenge header; returns `None` for other schemes.
#[must_use]
pub fn parse_challenge(header: &str) -> Option<BearerChallenge> {
    let params = header.trim().strip_prefix("Bearer ")?;
    let mut challenge = BearerChallenge::default();
    for part in split_params(params) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').to_string();
        match key.trim() {
            "realm" => challenge.realm = value,
            "service" => challenge.service = Some(value),
            "scope" => challenge.scope = Some(value),
            _ => {}
        }
    }
    (!challenge.realm.is_empty()).then_some(challenge)
}

// Splits on commas that are not inside quotes; scopes may contain commas.
fn split_params(params: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in params.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                parts.push(&params[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&params[start..]);
    parts
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Registry client resolving references to manifest digests.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: Client,
    registry: String,
    credentials: Option<(String, String)>,
}

impl RegistryClient {
    /// Creates a client for the registry named in `config`.
    #[must_use]
    pub fn new(http: Client, config: &SourcesConfig) -> Self {
        Self {
            http,
            registry: config.registry.clone(),
            credentials: config
                .credentials()
                .map(|(user, pass)| (user.to_string(), pass.to_string())),
        }
    }

    fn head_manifest(&self, image: &ImageRef, token: Option<&str>) -> reqwest::Result<Response> {
        let mut request = self
            .http
            .head(image.manifest_url())
            .header(ACCEPT, MANIFEST_TYPES.join(", "));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        } else if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }
        request.send()
    }

    fn fetch_token(&self, challenge: &BearerChallenge, image: &ImageRef) -> Result<String> {
        let scope = challenge
            .scope
            .clone()
            .unwrap_or_else(|| format!("repository:{}:pull", image.repository));
        let mut query = vec![("scope", scope)];
        if let Some(service) = &challenge.service {
            query.push(("service", service.clone()));
        }

        let mut request = self.http.get(&challenge.realm).query(&query);
        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        let response: TokenResponse = request
            .send()
            .and_then(Response::error_for_status)
            .and_then(Response::json)
            .map_err(|e| RecastError::resolver(&challenge.realm, e))?;

        response
            .token
            .or(response.access_token)
            .ok_or_else(|| RecastError::resolver(&challenge.realm, "token endpoint returned no token"))
    }
}

impl DigestResolver for RegistryClient {
    fn latest_digest(&self, reference: &str) -> Result<ResolvedImage> {
        let image = qualify(reference, &self.registry);
        let parsed = ImageRef::parse(&image)?;
        tracing::debug!(image = %image, host = %parsed.host, "looking up manifest digest");

        let mut response = self
            .head_manifest(&parsed, None)
            .map_err(|e| RecastError::resolver(&image, e))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let challenge = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|h| h.to_str().ok())
                .and_then(parse_challenge)
                .ok_or_else(|| RecastError::resolver(&image, "registry rejected credentials"))?;
            let token = self.fetch_token(&challenge, &parsed)?;
            response = self
                .head_manifest(&parsed, Some(&token))
                .map_err(|e| RecastError::resolver(&image, e))?;
        }

        let response = response
            .error_for_status()
            .map_err(|e| RecastError::resolver(&image, e))?;

        let digest = response
            .headers()
            .get(DIGEST_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(ToString::to_string)
            .ok_or_else(|| RecastError::resolver(&image, "registry response carried no digest"))?;

        tracing::debug!(image = %image, digest = %digest, "resolved digest");
        Ok(ResolvedImage { image, digest })
    }

    fn registry(&self) -> &str {
        &self.registry
    }
}
