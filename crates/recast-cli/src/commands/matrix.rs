//! `recast matrix`: Render a build matrix from generated descriptors.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Args;
use recast_common::constants::DEFAULT_REGISTRY;
use recast_common::types::Project;
use recast_graph::discovery::find_descriptors;
use recast_graph::order;
use recast_graph::scan::scan_descriptor;

/// Arguments for the `matrix` command.
#[derive(Args, Debug)]
pub struct MatrixArgs {
    /// Directory containing rendered descriptors.
    pub input: PathBuf,

    /// Registry whose images count as project dependencies.
    #[arg(long, env = "REGISTRY", default_value = DEFAULT_REGISTRY)]
    pub registry: String,

    /// Template rendered with the ordered `targets`.
    #[arg(long, env = "MATRIX_TEMPLATE")]
    pub template: PathBuf,

    /// Path of the rendered matrix.
    #[arg(long, env = "MATRIX_OUTPUT")]
    pub output: PathBuf,
}

/// Scans descriptors under `input` and orders them by dependency.
///
/// # Errors
///
/// Returns an error if a descriptor cannot be read or the projects cannot be ordered.
pub fn targets(input: &Path, registry: &str) -> anyhow::Result<Vec<Project>> {
    let files = find_descriptors(input)
        .with_context(|| format!("failed to scan directory {}", input.display()))?;
    let mut projects = Vec::with_capacity(files.len());
    for file in files {
        projects.push(
            scan_descriptor(&file, registry)
                .with_context(|| format!("failed to find dependencies of {}", file.display()))?,
        );
    }
    order(projects).context("failed to order dependencies")
}

/// Renders `template` with a `targets` list of `{name, needed}` entries.
///
/// # Errors
///
/// Returns an error if the template does not render.
pub fn render(template: &str, targets: &[Project]) -> anyhow::Result<String> {
    let mut context = tera::Context::new();
    context.insert("targets", targets);
    Ok(tera::Tera::one_off(template, &context, false)?)
}

/// Executes the `matrix` command.
///
/// # Errors
///
/// Returns an error if scanning, ordering, rendering, or writing fails.
pub fn execute(args: MatrixArgs) -> anyhow::Result<()> {
    let targets = targets(&args.input, &args.registry)?;
    let template = std::fs::read_to_string(&args.template)
        .with_context(|| format!("failed to load template from {}", args.template.display()))?;
    let rendered = render(&template, &targets).context("failed to generate output")?;
    std::fs::write(&args.output, rendered)
        .with_context(|| format!("failed to write output to {}", args.output.display()))?;
    tracing::info!(targets = targets.len(), output = %args.output.display(), "wrote matrix");
    Ok(())
}
