//! The standard template function set.
//!
//! | function | material |
//! |---|---|
//! | `image(ref)` | `image:<ref>` |
//! | `alpine_packages(names)` | `apk:<name>` per package |
//! | `github_tag(repo)`, `prefixed_github_tag(repo, prefix)` | `github:<repo>` |
//! | `git_tag(repo)`, `prefixed_git_tag(repo, prefix)` | `git:<repo>` |
//! | `regex_url_content(name, url, regex)` | `regexurl:<name>` |
//! | `<family>_url()` | `<family>` (the release version) |
//! | `<family>_checksum()` | none |
//!
//! `registry`, `increment_int`, `list` and `tagsafe` are pure helpers.

use std::collections::HashMap;
use std::sync::Arc;

use recast_sources::git::github_url;
use recast_sources::{ReleaseProvider, Resolvers};
use tera::Value;

use crate::ledger::material_key;
use crate::registry::{
    Effect, FunctionRegistry, RenderScope, ResultShape, TemplateFn, template_fn,
};

/// Builds the registry every render and dry run uses.
#[must_use]
pub fn standard_registry(resolvers: &Resolvers) -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    register_image(&mut registry, resolvers);
    register_packages(&mut registry, resolvers);
    register_tags(&mut registry, resolvers);
    register_content(&mut registry, resolvers);
    register_helpers(&mut registry, resolvers);
    for provider in &resolvers.releases {
        register_release(&mut registry, Arc::clone(provider));
    }
    tracing::debug!(functions = registry.len(), "built function registry");
    registry
}

fn register_image(registry: &mut FunctionRegistry, resolvers: &Resolvers) {
    let digests = Arc::clone(&resolvers.digests);
    registry.register(
        "image",
        ResultShape::Scalar,
        Effect::Reference { arg: "ref" },
        move |scope| {
            let digests = Arc::clone(&digests);
            let scope = scope.clone();
            template_fn(move |args| {
                let reference = string_arg(args, "image", "ref")?;
                let resolved = digests
                    .latest_digest(&reference)
                    .map_err(|e| scope.fail(e))?;
                let digest = resolved
                    .digest
                    .strip_prefix("sha256:")
                    .unwrap_or(&resolved.digest);
                scope.record(material_key("image", &reference), digest);
                Ok(Value::String(format!("{}@{}", resolved.image, resolved.digest)))
            })
        },
    );
}

fn register_packages(registry: &mut FunctionRegistry, resolvers: &Resolvers) {
    let packages = Arc::clone(&resolvers.packages);
    registry.register(
        "alpine_packages",
        ResultShape::Mapping,
        Effect::Recording,
        move |scope| {
            let packages = Arc::clone(&packages);
            let scope = scope.clone();
            template_fn(move |args| {
                let names = string_list_arg(args, "alpine_packages", "names")?;
                let resolved = packages
                    .latest_packages(&names)
                    .map_err(|e| scope.fail(e))?;
                let mut result = tera::Map::new();
                for (name, version) in resolved {
                    scope.record(material_key("apk", &name), version.clone());
                    let _ = result.insert(name, Value::String(version));
                }
                Ok(Value::Object(result))
            })
        },
    );
}

fn register_tags(registry: &mut FunctionRegistry, resolvers: &Resolvers) {
    let variants: [(&'static str, &'static str, fn(&str) -> String, bool); 4] = [
        ("github_tag", "github", github_url, false),
        ("prefixed_github_tag", "github", github_url, true),
        ("git_tag", "git", str::to_string, false),
        ("prefixed_git_tag", "git", str::to_string, true),
    ];

    for (name, kind, to_url, prefixed) in variants {
        let tags = Arc::clone(&resolvers.tags);
        registry.register(name, ResultShape::Scalar, Effect::Recording, move |scope| {
            let tags = Arc::clone(&tags);
            let scope = scope.clone();
            template_fn(move |args| {
                let repo = string_arg(args, name, "repo")?;
                let prefix = if prefixed {
                    string_arg(args, name, "prefix")?
                } else {
                    String::new()
                };
                let tag = tags
                    .latest_tag(&to_url(&repo), &prefix)
                    .map_err(|e| scope.fail(e))?;
                let version = tag.strip_prefix(prefix.as_str()).unwrap_or(&tag);
                scope.record(material_key(kind, &repo), version);
                Ok(Value::String(tag))
            })
        });
    }
}

fn register_content(registry: &mut FunctionRegistry, resolvers: &Resolvers) {
    let content = Arc::clone(&resolvers.content);
    registry.register(
        "regex_url_content",
        ResultShape::Scalar,
        Effect::Recording,
        move |scope| {
            let content = Arc::clone(&content);
            let scope = scope.clone();
            template_fn(move |args| {
                let name = string_arg(args, "regex_url_content", "name")?;
                let url = string_arg(args, "regex_url_content", "url")?;
                let pattern = string_arg(args, "regex_url_content", "regex")?;
                let found = content
                    .regex_url_content(&url, &pattern)
                    .map_err(|e| scope.fail(e))?;
                scope.record(material_key("regexurl", &name), found.clone());
                Ok(Value::String(found))
            })
        },
    );
}

fn register_helpers(registry: &mut FunctionRegistry, resolvers: &Resolvers) {
    let registry_address = resolvers.digests.registry().to_string();
    registry.register("registry", ResultShape::Scalar, Effect::Pure, move |_| {
        let address = registry_address.clone();
        template_fn(move |_| Ok(Value::String(address.clone())))
    });

    registry.register("increment_int", ResultShape::Scalar, Effect::Pure, |_| {
        template_fn(|args| {
            let value = args
                .get("value")
                .and_then(Value::as_i64)
                .ok_or_else(|| tera::Error::msg("increment_int: missing integer argument `value`"))?;
            let next = value
                .checked_add(1)
                .ok_or_else(|| tera::Error::msg("increment_int: overflow"))?;
            Ok(Value::from(next))
        })
    });

    registry.register("list", ResultShape::Sequence, Effect::Pure, |_| {
        template_fn(|args| match args.get("values") {
            Some(Value::Array(values)) => Ok(Value::Array(values.clone())),
            Some(other) => Ok(Value::Array(vec![other.clone()])),
            None => Ok(Value::Array(Vec::new())),
        })
    });

    registry.register("tagsafe", ResultShape::Scalar, Effect::Pure, |_| {
        template_fn(|args| {
            let value = string_arg(args, "tagsafe", "value")?;
            Ok(Value::String(tagsafe(&value)))
        })
    });
}

fn register_release(registry: &mut FunctionRegistry, provider: Arc<dyn ReleaseProvider>) {
    let family = provider.family().to_string();

    let url_provider = Arc::clone(&provider);
    registry.register(
        format!("{family}_url"),
        ResultShape::Scalar,
        Effect::Recording,
        move |scope| release_accessor(scope, Arc::clone(&url_provider), true),
    );

    registry.register(
        format!("{family}_checksum"),
        ResultShape::Scalar,
        Effect::Recording,
        move |scope| release_accessor(scope, Arc::clone(&provider), false),
    );
}

// Both accessors share the scope's memo, so the family resolves once per render.
fn release_accessor(scope: &RenderScope, provider: Arc<dyn ReleaseProvider>, url: bool) -> TemplateFn {
    let memo = scope.release_memo(provider.family());
    let scope = scope.clone();
    template_fn(move |_| {
        let release = memo
            .get_or_resolve(provider.as_ref())
            .map_err(|e| scope.fail(e))?;
        if url {
            scope.record(provider.family(), release.version);
            Ok(Value::String(release.url))
        } else {
            Ok(Value::String(release.checksum))
        }
    })
}

/// Replaces characters that are not valid in build-arg names with `_`.
#[must_use]
pub fn tagsafe(input: &str) -> String {
    input.replace(['-', '/', ' '], "_")
}

fn string_arg(args: &HashMap<String, Value>, function: &str, name: &str) -> tera::Result<String> {
    args.get(name)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| tera::Error::msg(format!("{function}: missing string argument `{name}`")))
}

fn string_list_arg(
    args: &HashMap<String, Value>,
    function: &str,
    name: &str,
) -> tera::Result<Vec<String>> {
    let invalid = || tera::Error::msg(format!("{function}: `{name}` must be a list of strings"));
    match args.get(name) {
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| v.as_str().map(ToString::to_string).ok_or_else(invalid))
            .collect(),
        Some(Value::String(single)) => Ok(vec![single.clone()]),
        _ => Err(invalid()),
    }
}
