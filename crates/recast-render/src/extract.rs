//! Dependency extraction by template dry run.
//!
//! The template is rendered with every recording function replaced by a
//! stub of the same shape, so conditionals and loops run exactly as in a
//! real render while no resolver is ever called.

use std::path::Path;
use std::sync::Arc;

use recast_common::error::Result;
use recast_common::types::Project;

use crate::registry::{FunctionRegistry, ReferenceCollector};
use crate::template::{LoadedTemplate, template_error};

/// Harvests project references from templates without side effects.
#[derive(Debug, Clone)]
pub struct DependencyExtractor {
    registry: Arc<FunctionRegistry>,
}

impl DependencyExtractor {
    /// Creates an extractor over the registry real renders use.
    #[must_use]
    pub const fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self { registry }
    }

    /// Dry-runs a project's template and returns the project with its needs.
    ///
    /// Needs keep first-reference order, appear once each, and never
    /// include the project itself. A render that fails part way, for
    /// example by reading a key of a stubbed mapping, keeps the references
    /// collected before the failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be loaded or parsed.
    pub fn extract(
        &self,
        template_base: &Path,
        project_name: &str,
        template_relative: &Path,
    ) -> Result<Project> {
        let LoadedTemplate { mut tera, name } =
            LoadedTemplate::load(template_base, template_relative)?;
        let collector = ReferenceCollector::new();
        self.registry.bind_dry_run(&mut tera, &collector);

        if let Err(e) = tera.render(&name, &tera::Context::new()) {
            tracing::warn!(
                project = project_name,
                error = %template_error(&name, &e),
                "dry run stopped early, keeping references found so far"
            );
        }

        let mut needed: Vec<String> = Vec::new();
        for reference in collector.names() {
            if reference != project_name && !needed.contains(&reference) {
                needed.push(reference);
            }
        }
        tracing::debug!(project = project_name, ?needed, "extracted dependencies");
        Ok(Project::new(project_name, needed))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tera::Value;

    use super::*;
    use crate::registry::{Effect, ResultShape, template_fn};

    fn registry(calls: &Arc<AtomicUsize>) -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        let counter = Arc::clone(calls);
        registry.register(
            "image",
            ResultShape::Scalar,
            Effect::Reference { arg: "ref" },
            move |_| {
                let counter = Arc::clone(&counter);
                template_fn(move |_| {
                    let _ = counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::String("resolved".into()))
                })
            },
        );
        let counter = Arc::clone(calls);
        registry.register(
            "alpine_packages",
            ResultShape::Mapping,
            Effect::Recording,
            move |_| {
                let counter = Arc::clone(&counter);
                template_fn(move |_| {
                    let _ = counter.fetch_add(1, Ordering::SeqCst);
                    Ok(serde_json::json!({"curl": "8"}))
                })
            },
        );
        registry
    }

    fn extract(template: &str, name: &str) -> (Result<Project>, usize) {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join(name)).expect("mkdir");
        std::fs::write(dir.path().join(name).join("Dockerfile.tera"), template).expect("write");
        let calls = Arc::new(AtomicUsize::new(0));
        let extractor = DependencyExtractor::new(Arc::new(registry(&calls)));
        let result = extractor.extract(
            dir.path(),
            name,
            &Path::new(name).join("Dockerfile.tera"),
        );
        (result, calls.load(Ordering::SeqCst))
    }

    #[test]
    fn references_are_collected_in_order_without_resolving() {
        let (project, calls) = extract(r#"{{ image(ref="foo") }}{{ image(ref="bar") }}"#, "app");
        assert_eq!(project.expect("extract").needed, vec!["foo", "bar"]);
        assert_eq!(calls, 0);
    }

    #[test]
    fn control_flow_is_evaluated() {
        let template = r#"
{% if true %}FROM {{ image(ref="base") }}{% else %}FROM {{ image(ref="never") }}{% endif %}
{% for n in ["a", "b"] %}COPY --from={{ image(ref=n) }} / /{% endfor %}
{% for k, v in alpine_packages(names=["curl"]) %}{{ image(ref="inside-empty-loop") }}{% endfor %}
"#;
        let (project, calls) = extract(template, "app");
        assert_eq!(project.expect("extract").needed, vec!["base", "a", "b"]);
        assert_eq!(calls, 0);
    }

    #[test]
    fn duplicates_and_self_references_are_dropped() {
        let (project, _) = extract(
            r#"{{ image(ref="base") }}{{ image(ref="app") }}{{ image(ref="base") }}"#,
            "app",
        );
        let project = project.expect("extract");
        assert_eq!(project.name, "app");
        assert_eq!(project.needed, vec!["base"]);
    }

    #[test]
    fn template_without_references_has_no_needs() {
        let (project, _) = extract("FROM scratch\n", "base");
        assert!(project.expect("extract").needed.is_empty());
    }

    #[test]
    fn stubbed_mapping_lookup_keeps_earlier_references() {
        let template = "FROM {{ image(ref=\"base\") }}\n\
            {% set pkgs = alpine_packages(names=[\"curl\"]) %}RUN apk add curl={{ pkgs.curl }}\n";
        let (project, calls) = extract(template, "app");
        assert_eq!(project.expect("extract").needed, vec!["base"]);
        assert_eq!(calls, 0);
    }

    #[test]
    fn failing_render_without_references_has_no_needs() {
        let (project, _) = extract(
            "{% set p = alpine_packages(names=[\"curl\"]) %}{{ p.curl }}",
            "base",
        );
        assert!(project.expect("extract").needed.is_empty());
    }

    #[test]
    fn broken_template_is_an_error() {
        let (project, _) = extract("{{ image(ref=\"a\") ", "app");
        assert!(project.is_err());
    }
}
