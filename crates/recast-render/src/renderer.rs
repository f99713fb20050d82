//! Provenance-recording renderer.

use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use recast_common::error::{RecastError, Result};
use recast_common::types::Change;
use tempfile::NamedTempFile;

use crate::bom;
use crate::diff::diff;
use crate::registry::{FunctionRegistry, RenderScope};
use crate::template::{LoadedTemplate, template_error, template_name};

/// Renders templates and embeds the resolved materials in the output.
#[derive(Debug, Clone)]
pub struct ProvenanceRenderer {
    registry: Arc<FunctionRegistry>,
}

impl ProvenanceRenderer {
    /// Creates a renderer over the given function registry.
    #[must_use]
    pub const fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self { registry }
    }

    /// Renders `template_base/template_relative` into `output`.
    ///
    /// The previous ledger is read from `output` before it is replaced, and
    /// the materials whose values moved are returned in key order. Nothing
    /// is written unless the whole template rendered.
    ///
    /// # Errors
    ///
    /// Returns [`RecastError::Resolver`] when a lookup failed mid-render,
    /// [`RecastError::Template`] for any other engine failure, and
    /// [`RecastError::Io`] when the template cannot be read or the output
    /// cannot be written.
    pub fn generate(
        &self,
        source_link: &str,
        template_base: &Path,
        template_relative: &Path,
        output: &Path,
    ) -> Result<Vec<Change>> {
        let scope = RenderScope::new();
        let prior = bom::read(output);

        let LoadedTemplate { mut tera, name } =
            LoadedTemplate::load(template_base, template_relative)?;
        self.registry.bind(&mut tera, &scope);

        let body = tera
            .render(&name, &tera::Context::new())
            .map_err(|e| scope.take_failure().unwrap_or_else(|| template_error(&name, &e)))?;

        let ledger = scope.ledger();
        let mut content = bom::header(source_link, &template_name(template_relative), &ledger)?;
        content.push_str(&body);
        write_atomically(output, content.as_bytes())?;

        let changes = diff(&prior, &ledger);
        tracing::info!(
            template = %name,
            output = %output.display(),
            materials = ledger.len(),
            changes = changes.len(),
            "generated"
        );
        Ok(changes)
    }
}

// Readers of `path` see either the previous content or the new one.
fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let io_error = |source| RecastError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(io_error)?;

    let mut file = NamedTempFile::new_in(parent).map_err(io_error)?;
    file.write_all(content).map_err(io_error)?;
    let _ = file.persist(path).map_err(|e| io_error(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tera::Value;

    use super::*;
    use crate::ledger::material_key;
    use crate::registry::{Effect, ResultShape, template_fn};

    struct Upstream {
        digest: Mutex<String>,
        calls: AtomicUsize,
    }

    fn registry(upstream: &Arc<Upstream>) -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        let upstream = Arc::clone(upstream);
        registry.register(
            "image",
            ResultShape::Scalar,
            Effect::Reference { arg: "ref" },
            move |scope| {
                let upstream = Arc::clone(&upstream);
                let scope = scope.clone();
                template_fn(move |args| {
                    let _ = upstream.calls.fetch_add(1, Ordering::SeqCst);
                    let reference = args.get("ref").and_then(Value::as_str).unwrap_or_default();
                    if reference == "gone" {
                        return Err(scope.fail(RecastError::resolver("image:gone", "404")));
                    }
                    let digest = upstream.digest.lock().unwrap().clone();
                    scope.record(material_key("image", reference), digest.clone());
                    Ok(Value::String(format!("reg/{reference}@sha256:{digest}")))
                })
            },
        );
        registry
    }

    fn setup(template: &str) -> (tempfile::TempDir, Arc<Upstream>, ProvenanceRenderer) {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("src/app")).expect("mkdir");
        std::fs::write(dir.path().join("src/app/Dockerfile.tera"), template).expect("write");
        let upstream = Arc::new(Upstream {
            digest: Mutex::new("aaa".into()),
            calls: AtomicUsize::new(0),
        });
        let renderer = ProvenanceRenderer::new(Arc::new(registry(&upstream)));
        (dir, upstream, renderer)
    }

    fn generate(dir: &Path, renderer: &ProvenanceRenderer) -> Result<Vec<Change>> {
        renderer.generate(
            "https://src.example/tree/",
            &dir.join("src"),
            Path::new("app/Dockerfile.tera"),
            &dir.join("out/app/Dockerfile"),
        )
    }

    #[test]
    fn writes_header_then_body() {
        let (dir, _, renderer) = setup("FROM {{ image(ref=\"base\") }}\n");
        let changes = generate(dir.path(), &renderer).expect("generate");
        assert_eq!(changes, vec![Change::new("image:base", "", "aaa")]);

        let written = std::fs::read_to_string(dir.path().join("out/app/Dockerfile")).expect("read");
        assert_eq!(
            written,
            "# Generated from https://src.example/tree/app/Dockerfile.tera\n\
             # BOM: {\"image:base\":\"aaa\"}\n\
             \n\
             FROM reg/base@sha256:aaa\n"
        );
    }

    #[test]
    fn regeneration_without_upstream_change_is_a_no_op() {
        let (dir, _, renderer) = setup("FROM {{ image(ref=\"base\") }}\n");
        let _ = generate(dir.path(), &renderer).expect("first");
        let first = std::fs::read(dir.path().join("out/app/Dockerfile")).expect("read");

        let changes = generate(dir.path(), &renderer).expect("second");
        let second = std::fs::read(dir.path().join("out/app/Dockerfile")).expect("read");
        assert!(changes.is_empty(), "got: {changes:?}");
        assert_eq!(first, second);
    }

    #[test]
    fn upstream_change_is_reported() {
        let (dir, upstream, renderer) = setup("FROM {{ image(ref=\"base\") }}\n");
        let _ = generate(dir.path(), &renderer).expect("first");
        *upstream.digest.lock().unwrap() = "bbb".into();
        let changes = generate(dir.path(), &renderer).expect("second");
        assert_eq!(changes, vec![Change::new("image:base", "aaa", "bbb")]);
    }

    #[test]
    fn foreign_output_file_counts_as_no_provenance() {
        let (dir, _, renderer) = setup("FROM {{ image(ref=\"base\") }}\n");
        std::fs::create_dir_all(dir.path().join("out/app")).expect("mkdir");
        std::fs::write(dir.path().join("out/app/Dockerfile"), "FROM alpine\n").expect("write");
        let changes = generate(dir.path(), &renderer).expect("generate");
        assert_eq!(changes, vec![Change::new("image:base", "", "aaa")]);
    }

    #[test]
    fn resolver_failure_writes_nothing() {
        let (dir, _, renderer) = setup("FROM {{ image(ref=\"gone\") }}\n");
        let err = generate(dir.path(), &renderer).expect_err("resolver failure");
        assert!(err.is_resolver(), "got: {err}");
        assert!(!dir.path().join("out/app/Dockerfile").exists());
    }

    #[test]
    fn resolver_failure_keeps_previous_output() {
        let (dir, _, renderer) = setup("FROM {{ image(ref=\"base\") }}\n");
        let _ = generate(dir.path(), &renderer).expect("first");
        let before = std::fs::read(dir.path().join("out/app/Dockerfile")).expect("read");

        std::fs::write(
            dir.path().join("src/app/Dockerfile.tera"),
            "FROM {{ image(ref=\"gone\") }}\n",
        )
        .expect("write");
        assert!(generate(dir.path(), &renderer).is_err());
        let after = std::fs::read(dir.path().join("out/app/Dockerfile")).expect("read");
        assert_eq!(before, after);
    }

    #[test]
    fn unknown_function_is_template_error() {
        let (dir, upstream, renderer) = setup("FROM {{ nope() }}\n");
        let err = generate(dir.path(), &renderer).expect_err("unknown function");
        assert!(
            matches!(err, RecastError::Template { ref template, .. } if template == "app/Dockerfile.tera"),
            "got: {err}"
        );
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn each_render_starts_with_an_empty_ledger() {
        let (dir, _, renderer) = setup("FROM {{ image(ref=\"base\") }}\n");
        let _ = generate(dir.path(), &renderer).expect("first");
        std::fs::write(
            dir.path().join("src/app/Dockerfile.tera"),
            "FROM {{ image(ref=\"other\") }}\n",
        )
        .expect("write");
        let _ = generate(dir.path(), &renderer).expect("second");

        let written = std::fs::read_to_string(dir.path().join("out/app/Dockerfile")).expect("read");
        let ledger = bom::parse(&written).expect("bom");
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get("image:other"), Some("aaa"));
    }
}
