//! CLI command definitions and dispatch.

pub mod generate;
pub mod matrix;
pub mod plan;

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use recast_common::config::SourcesConfig;
use recast_common::constants::{DEFAULT_ALPINE_MIRROR, DEFAULT_REGISTRY};
use recast_render::{FunctionRegistry, standard_registry};
use recast_sources::Resolvers;

/// Recast: regenerate container descriptors with a bill of materials.
#[derive(Parser, Debug)]
#[command(name = "recast", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "RECAST_LOG_JSON")]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render every project template and report changed materials.
    Generate(generate::GenerateArgs),
    /// Show discovered projects in build order.
    Plan(plan::PlanArgs),
    /// Render a build matrix from already generated descriptors.
    Matrix(matrix::MatrixArgs),
}

/// Resolver settings shared by commands that render templates.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Registry that images are pushed to and unqualified refs resolve against.
    #[arg(long, env = "REGISTRY", default_value = DEFAULT_REGISTRY)]
    pub registry: String,

    /// Username for registry lookups.
    #[arg(long, env = "REGISTRY_USER")]
    pub registry_user: Option<String>,

    /// Password for registry lookups.
    #[arg(long, env = "REGISTRY_PASS", hide_env_values = true)]
    pub registry_pass: Option<String>,

    /// Alpine mirror used for package and release lookups.
    #[arg(long, env = "ALPINE_MIRROR", default_value = DEFAULT_ALPINE_MIRROR)]
    pub alpine_mirror: String,

    /// PostgreSQL major versions to expose as `postgres<major>` functions.
    #[arg(long = "postgres-major", env = "POSTGRES_MAJORS", value_delimiter = ',')]
    pub postgres_majors: Vec<String>,
}

impl SourceArgs {
    /// Converts the arguments into a resolver configuration.
    pub fn config(&self) -> SourcesConfig {
        let defaults = SourcesConfig::default();
        SourcesConfig {
            registry: self.registry.clone(),
            registry_user: self.registry_user.clone(),
            registry_pass: self.registry_pass.clone(),
            alpine_mirror: self.alpine_mirror.clone(),
            postgres_majors: if self.postgres_majors.is_empty() {
                defaults.postgres_majors
            } else {
                self.postgres_majors.clone()
            },
        }
    }
}

/// Builds the function registry backed by the configured resolvers.
///
/// # Errors
///
/// Returns an error if the resolvers cannot be constructed.
pub fn function_registry(config: &SourcesConfig) -> anyhow::Result<Arc<FunctionRegistry>> {
    let resolvers = Resolvers::from_config(config)?;
    tracing::debug!(?resolvers, "resolvers ready");
    Ok(Arc::new(standard_registry(&resolvers)))
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Generate(args) => generate::execute(args),
        Command::Plan(args) => plan::execute(args),
        Command::Matrix(args) => matrix::execute(args),
    }
}
