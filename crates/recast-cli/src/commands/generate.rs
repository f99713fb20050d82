//! `recast generate`: Render every project and report changed materials.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{ArgAction, Args};
use recast_common::config::GeneratorConfig;
use recast_common::constants::{
    DEFAULT_OUTPUT_NAME, DEFAULT_PUSH_RETRIES, DEFAULT_SOURCE_LINK, DEFAULT_TEMPLATE_NAME,
};
use recast_common::types::Change;
use recast_render::ProvenanceRenderer;

use super::plan::{PlannedProject, discover};
use super::{SourceArgs, function_registry};
use crate::exec::Tool;
use crate::output::{LogGroup, format_changes};

/// Arguments for the `generate` command.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Directory containing one sub-directory per project template.
    pub input: PathBuf,

    /// Directory receiving the rendered descriptors.
    pub output: PathBuf,

    /// File name of the template inside each project directory.
    #[arg(long, env = "TEMPLATE", default_value = DEFAULT_TEMPLATE_NAME)]
    pub template: String,

    /// File name of each rendered descriptor.
    #[arg(long = "output-name", env = "OUTPUT", default_value = DEFAULT_OUTPUT_NAME)]
    pub output_name: String,

    /// Only generate these projects (comma separated).
    #[arg(long = "project", env = "PROJECT", value_delimiter = ',')]
    pub projects: Vec<String>,

    /// Link to a browsable version of the source repository.
    #[arg(long, env = "SOURCE_LINK", default_value = DEFAULT_SOURCE_LINK)]
    pub source_link: String,

    /// Commit each generated descriptor with a summary of its changes.
    #[arg(long, env = "COMMIT")]
    pub commit: bool,

    /// Build each project after a successful commit.
    #[arg(long, env = "BUILD")]
    pub build: bool,

    /// Build every project regardless of commits.
    #[arg(long, env = "FORCE_BUILD")]
    pub force_build: bool,

    /// Push each built image.
    #[arg(long, env = "PUSH")]
    pub push: bool,

    /// How many times to retry a failed push.
    #[arg(long, env = "PUSH_RETRIES", default_value_t = DEFAULT_PUSH_RETRIES)]
    pub push_retries: u32,

    /// Wrap each project's output in GitHub Actions log groups.
    #[arg(long, env = "WORKFLOW_COMMANDS", default_value_t = true, action = ArgAction::Set)]
    pub workflow_commands: bool,

    #[command(flatten)]
    pub sources: SourceArgs,
}

impl GenerateArgs {
    fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            template_name: self.template.clone(),
            output_name: self.output_name.clone(),
            source_link: self.source_link.clone(),
        }
    }

    fn selected(&self, name: &str) -> bool {
        self.projects.is_empty() || self.projects.iter().any(|p| p == name)
    }

    const fn builds(&self) -> bool {
        (self.commit && self.build) || self.force_build
    }
}

struct Tools {
    git: Option<Tool>,
    buildah: Option<Tool>,
}

/// Executes the `generate` command.
///
/// Projects are processed in dependency order. A failed commit skips the
/// rest of that project; any other failure stops the run.
///
/// # Errors
///
/// Returns an error if discovery, rendering, building, or pushing fails.
pub fn execute(args: GenerateArgs) -> anyhow::Result<()> {
    let generator = args.generator_config();
    let sources = args.sources.config();
    let registry = function_registry(&sources)?;

    let planned = discover(&args.input, &generator.template_name, Arc::clone(&registry))?;
    let renderer = ProvenanceRenderer::new(registry);
    let tools = Tools {
        git: args.commit.then(|| Tool::find("git")).transpose()?,
        buildah: args.builds().then(|| Tool::find("buildah")).transpose()?,
    };

    for project in planned.iter().filter(|p| args.selected(&p.project.name)) {
        let _group = LogGroup::start(args.workflow_commands, &project.project.name);
        tracing::info!(project = %project.project.name, "checking project");
        process(&args, &generator, &sources.registry, &renderer, &tools, project)?;
    }
    Ok(())
}

fn process(
    args: &GenerateArgs,
    generator: &GeneratorConfig,
    registry: &str,
    renderer: &ProvenanceRenderer,
    tools: &Tools,
    planned: &PlannedProject,
) -> anyhow::Result<()> {
    let name = &planned.project.name;
    let relative_output = planned.dir.join(&generator.output_name);
    let changes = renderer
        .generate(
            &generator.source_link,
            &args.input,
            &planned.template,
            &args.output.join(&relative_output),
        )
        .with_context(|| format!("failed to generate project {name}"))?;
    for change in &changes {
        tracing::info!(project = %name, %change, "material changed");
    }

    if let Some(git) = &tools.git {
        if let Err(e) = commit(git, &args.output, &relative_output, name, &changes) {
            tracing::warn!(project = %name, error = %format!("{e:#}"), "failed to commit");
            return Ok(());
        }
    }

    if let Some(buildah) = &tools.buildah {
        let image = format!("{registry}/{name}");
        let context = args.output.join(&planned.dir);
        let bud: [&OsStr; 7] = [
            "bud".as_ref(),
            "--timestamp".as_ref(),
            "0".as_ref(),
            "--layers".as_ref(),
            "--tag".as_ref(),
            image.as_ref(),
            context.as_os_str(),
        ];
        buildah
            .run(bud)
            .with_context(|| format!("failed to build {name}"))?;

        if args.push {
            push(buildah, name, &image, args.push_retries)?;
        }
    }
    Ok(())
}

fn commit(
    git: &Tool,
    repo: &Path,
    file: &Path,
    project: &str,
    changes: &[Change],
) -> anyhow::Result<()> {
    let add: [&OsStr; 4] = ["-C".as_ref(), repo.as_os_str(), "add".as_ref(), file.as_os_str()];
    git.run(add)?;
    let message = commit_message(project, changes);
    let commit_args: [&OsStr; 7] = [
        "-C".as_ref(),
        repo.as_os_str(),
        "commit".as_ref(),
        "--no-gpg-sign".as_ref(),
        "-m".as_ref(),
        message.as_ref(),
        file.as_os_str(),
    ];
    git.run(commit_args)
}

fn commit_message(project: &str, changes: &[Change]) -> String {
    format!("[{project}] {}", format_changes(changes))
}

fn push(buildah: &Tool, project: &str, image: &str, retries: u32) -> anyhow::Result<()> {
    let attempts = retries + 1;
    for attempt in 1..=attempts {
        match buildah.run(["push", image]) {
            Ok(()) => return Ok(()),
            Err(e) => tracing::warn!(
                project,
                attempt,
                attempts,
                error = %format!("{e:#}"),
                "failed to push"
            ),
        }
    }
    anyhow::bail!("failed to push {project} after {attempts} attempts")
}
