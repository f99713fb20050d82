//! `recast plan`: Show discovered projects in build order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::Args;
use recast_common::constants::DEFAULT_TEMPLATE_NAME;
use recast_common::types::Project;
use recast_graph::discovery::find_template_projects;
use recast_graph::order;
use recast_render::{DependencyExtractor, FunctionRegistry};

use super::{SourceArgs, function_registry};

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Directory containing one sub-directory per project.
    pub input: PathBuf,

    /// File name of the template inside each project directory.
    #[arg(long, env = "TEMPLATE", default_value = DEFAULT_TEMPLATE_NAME)]
    pub template: String,

    /// Print the plan as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub sources: SourceArgs,
}

/// A project ready to render, in build order.
#[derive(Debug, Clone)]
pub struct PlannedProject {
    /// Name and dependencies.
    pub project: Project,
    /// Project directory relative to the input root.
    pub dir: PathBuf,
    /// Template path relative to the input root.
    pub template: PathBuf,
}

/// Discovers template projects under `input` and orders them by dependency.
///
/// # Errors
///
/// Returns an error if discovery, extraction, or ordering fails.
pub fn discover(
    input: &Path,
    template_name: &str,
    registry: Arc<FunctionRegistry>,
) -> anyhow::Result<Vec<PlannedProject>> {
    let extractor = DependencyExtractor::new(registry);
    let found = find_template_projects(input, template_name)
        .with_context(|| format!("failed to scan directory {}", input.display()))?;

    let mut projects = Vec::with_capacity(found.len());
    let mut locations = HashMap::with_capacity(found.len());
    for candidate in found {
        let project = extractor
            .extract(input, &candidate.name, &candidate.template)
            .with_context(|| format!("failed to find dependencies of {}", candidate.name))?;
        projects.push(project);
        let _ = locations.insert(candidate.name.clone(), candidate);
    }

    let ordered = order(projects).context("failed to order projects")?;
    Ok(ordered
        .into_iter()
        .filter_map(|project| {
            let location = locations.remove(&project.name)?;
            Some(PlannedProject {
                project,
                dir: location.dir,
                template: location.template,
            })
        })
        .collect())
}

/// Executes the `plan` command.
///
/// Dry-runs every template to collect its dependencies and prints the
/// projects in the order `generate` would process them.
///
/// # Errors
///
/// Returns an error if discovery, extraction, or ordering fails.
pub fn execute(args: PlanArgs) -> anyhow::Result<()> {
    let registry = function_registry(&args.sources.config())?;
    let planned = discover(&args.input, &args.template, registry)?;

    if args.json {
        let projects: Vec<&Project> = planned.iter().map(|p| &p.project).collect();
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(());
    }

    println!("Build plan for: {}", args.input.display());
    println!("{}", "\u{2550}".repeat(35));
    println!();
    for (position, planned) in planned.iter().enumerate() {
        println!("  {:>3}. {}", position + 1, planned.project);
    }
    println!();
    println!("  {} project(s) in build order.", planned.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use recast_common::config::SourcesConfig;

    use super::*;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, content).expect("write");
    }

    #[test]
    fn discover_orders_projects_by_dependency() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "app/Dockerfile.tera", "FROM {{ image(ref=\"golang\") }}\n");
        write(dir.path(), "golang/Dockerfile.tera", "FROM {{ image(ref=\"base\") }}\nADD {{ golang_url() }} /\n");
        write(dir.path(), "base/Dockerfile.tera", "FROM scratch\n");
        write(dir.path(), "old/Dockerfile.tera", "FROM {{ image(ref=\"base\") }}\n");
        write(dir.path(), "old/IGNORE", "");

        let registry = function_registry(&SourcesConfig::default()).expect("registry");
        let planned = discover(dir.path(), "Dockerfile.tera", registry).expect("discover");

        let names: Vec<&str> = planned.iter().map(|p| p.project.name.as_str()).collect();
        assert_eq!(names, vec!["base", "golang", "app"]);
        assert_eq!(planned[2].template, PathBuf::from("app/Dockerfile.tera"));
        assert_eq!(planned[2].project.needed, vec!["golang"]);
    }

    #[test]
    fn discover_reports_cycles() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "x/Dockerfile.tera", "FROM {{ image(ref=\"y\") }}\n");
        write(dir.path(), "y/Dockerfile.tera", "FROM {{ image(ref=\"x\") }}\n");

        let registry = function_registry(&SourcesConfig::default()).expect("registry");
        let err = discover(dir.path(), "Dockerfile.tera", registry).expect_err("cycle");
        assert!(format!("{err:#}").contains("is there a loop?"), "got: {err:#}");
    }
}
