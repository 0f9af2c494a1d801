//! Command dispatch

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::ApplicationError;
use crate::application::services::{AddRequest, Outcome, StructureOp};
use crate::cli::args::{Cli, Commands, ConfigCommands, IdsFilter, NodeArgs};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{NodeFactory, TreeError, TreeNodeConvert};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Ok(());
    };
    if let Commands::Completion { shell } = command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(*shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let container = ServiceContainer::new(load_settings(cli)?);
    match command {
        Commands::Config { command } => _config(&container, command),
        Commands::Show => _show(&container, &structure_file(cli, &container)?),
        Commands::Ids { filter } => _ids(&container, &structure_file(cli, &container)?, *filter),
        Commands::Find { id } => _find(&container, &structure_file(cli, &container)?, id),
        Commands::Check => _check(&container, &structure_file(cli, &container)?),
        Commands::MoveUp(args) => _mutate(&container, cli, args, StructureOp::MoveUp),
        Commands::MoveDown(args) => _mutate(&container, cli, args, StructureOp::MoveDown),
        Commands::MakeChild(args) => _mutate(&container, cli, args, StructureOp::MakeChild),
        Commands::MakeParent(args) => _mutate(&container, cli, args, StructureOp::MakeParent),
        Commands::Delete(args) => _mutate(&container, cli, args, StructureOp::Delete),
        Commands::Add {
            node_type,
            parent,
            name,
            id,
            dry_run,
        } => {
            let request = AddRequest {
                node_type: node_type.clone(),
                parent: parent.clone(),
                name: name.clone(),
                id: id.clone(),
            };
            _add(&container, &structure_file(cli, &container)?, &request, *dry_run)
        }
        Commands::Completion { .. } => Ok(()),
    }
}

/// Layered settings from the working directory, then command-line overrides.
fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let cwd = std::env::current_dir().map_err(|e| InfraError::io("get working directory", e))?;
    let mut settings = Settings::load(Some(&cwd))?;
    if let Some(provider) = cli.provider {
        settings.provider = provider.into();
    }
    if let Some(language) = &cli.language {
        settings.language = language.clone();
    }
    debug!("settings: {:?}", settings);
    Ok(settings)
}

fn structure_file(cli: &Cli, container: &ServiceContainer) -> CliResult<PathBuf> {
    cli.file
        .clone()
        .or_else(|| container.settings.default_file.clone())
        .ok_or_else(|| {
            CliError::Usage("no structure file: pass --file or set default_file".to_string())
        })
}

#[instrument(skip(container))]
fn _show(container: &ServiceContainer, file: &Path) -> CliResult<()> {
    let model = container.structure_service().load(file)?;
    output::info(&model.to_tree_string());
    Ok(())
}

#[instrument(skip(container))]
fn _ids(container: &ServiceContainer, file: &Path, filter: IdsFilter) -> CliResult<()> {
    let model = container.structure_service().load(file)?;
    for id in model.node_ids(filter.into()) {
        output::info(&id);
    }
    Ok(())
}

#[instrument(skip(container))]
fn _find(container: &ServiceContainer, file: &Path, id: &str) -> CliResult<()> {
    let service = container.structure_service();
    let model = service.load(file)?;
    let idx = model.lookup(id).map_err(ApplicationError::from)?;
    let node = model.node(idx).map_err(ApplicationError::from)?;

    let path = model
        .parents(idx)
        .map_err(ApplicationError::from)?
        .into_iter()
        .rev()
        .filter_map(|i| model.node(i).ok().map(|n| n.name.clone()))
        .collect::<Vec<_>>()
        .join(" / ");

    output::header(&node.name);
    output::action("id", &node.id);
    output::action("type", node.type_name());
    output::action("path", &path);
    match model.url(idx, &container.settings.api_base) {
        Ok(url) => output::action("url", &url),
        Err(e @ TreeError::MissingAncestor { .. }) => output::warning(&e),
        Err(e) => return Err(ApplicationError::from(e).into()),
    }
    Ok(())
}

#[instrument(skip(container))]
fn _check(container: &ServiceContainer, file: &Path) -> CliResult<()> {
    let model = container.structure_service().load(file)?;
    model.verify().map_err(ApplicationError::from)?;
    output::success(&format!(
        "{}: {} nodes, {} structure is consistent",
        file.display(),
        model.arena().len(),
        model.factory().name()
    ));
    Ok(())
}

#[instrument(skip(container, cli))]
fn _mutate(
    container: &ServiceContainer,
    cli: &Cli,
    args: &NodeArgs,
    op: StructureOp,
) -> CliResult<()> {
    let file = structure_file(cli, container)?;
    let outcome = container
        .structure_service()
        .apply(&file, &args.id, op, args.dry_run)?;
    report(&outcome, &op.to_string(), args.dry_run);
    Ok(())
}

#[instrument(skip(container))]
fn _add(
    container: &ServiceContainer,
    file: &Path,
    request: &AddRequest,
    dry_run: bool,
) -> CliResult<()> {
    let outcome = container.structure_service().add(file, request, dry_run)?;
    report(&outcome, "add", dry_run);
    Ok(())
}

fn report(outcome: &Outcome, action: &str, dry_run: bool) {
    if dry_run {
        print!("{}", outcome.document);
    } else if outcome.changed {
        output::success(&format!("{action}: {}", outcome.id));
    } else {
        output::warning(&format!("{action}: {} is already at the edge, nothing to do", outcome.id));
    }
}

#[instrument(skip(container))]
fn _config(container: &ServiceContainer, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => output::info(&container.settings.to_toml()?),
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            let global = global_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(unavailable)".to_string());
            output::action("global", &global);
            let cwd =
                std::env::current_dir().map_err(|e| InfraError::io("get working directory", e))?;
            output::action("local", &local_config_path(&cwd).display());
        }
    }
    Ok(())
}
