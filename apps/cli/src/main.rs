use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use wsconf_workspace::{
    read_workspace, write_workspace, FsHost, ProjectDefinition, ProjectDraft, TargetDraft,
    WorkspaceDefinition, WorkspaceWriter, WORKSPACE_FILE_NAMES,
};

#[derive(Parser)]
#[command(
    name = "wsconf",
    about = "Inspect and edit workspace.json files without losing comments",
    author,
    version
)]
struct Cli {
    /// 工作區檔案或所在目錄；預設為目前目錄。 / Workspace file or directory (defaults to current directory).
    #[arg(long, global = true, value_name = "PATH")]
    workspace: Option<PathBuf>,
    /// 提高日誌層級（可重複）。 / Raise the log level (repeatable).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 建立新的工作區檔案。 / Create a new workspace file.
    Init(InitArgs),
    /// 顯示工作區內容。 / Show the workspace contents.
    Show(ShowArgs),
    /// 管理專案。 / Manage projects.
    #[command(subcommand)]
    Project(ProjectCommand),
    /// 管理建置目標。 / Manage build targets.
    #[command(subcommand)]
    Target(TargetCommand),
    /// 管理擴充欄位。 / Manage extension fields.
    #[command(subcommand)]
    Extension(ExtensionCommand),
}

#[derive(Args)]
struct InitArgs {
    /// 自訂 `$schema` 位址。 / Custom `$schema` reference.
    #[arg(long)]
    schema: Option<String>,
    /// 覆寫既有檔案。 / Overwrite an existing file.
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct ShowArgs {
    /// 以 JSON 輸出。 / Print as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// 新增專案。 / Add a project.
    Add {
        name: String,
        #[arg(long)]
        root: String,
        #[arg(long)]
        source_root: Option<String>,
        #[arg(long)]
        prefix: Option<String>,
    },
    /// 移除專案。 / Remove a project.
    Remove { name: String },
    /// 設定專案欄位；省略值則清除選用欄位。 / Set a project field; omit the value to clear an optional field.
    Set {
        name: String,
        field: ProjectField,
        value: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProjectField {
    Root,
    #[value(alias = "sourceRoot")]
    SourceRoot,
    Prefix,
}

#[derive(Subcommand)]
enum TargetCommand {
    /// 新增建置目標。 / Add a target to a project.
    Add {
        project: String,
        name: String,
        #[arg(long)]
        builder: String,
    },
    /// 移除建置目標。 / Remove a target.
    Remove { project: String, name: String },
    /// 設定目標選項（JSON 值）。 / Set a target option to a JSON value.
    SetOption {
        project: String,
        name: String,
        key: String,
        /// JSON 值，例如 `"dist"` 或 `true`。 / JSON value such as `"dist"` or `true`.
        value: String,
        /// 寫入指定組態的覆寫值。 / Write the override for this configuration instead.
        #[arg(long)]
        configuration: Option<String>,
    },
}

#[derive(Subcommand)]
enum ExtensionCommand {
    /// 設定擴充欄位（JSON 值）。 / Set an extension to a JSON value.
    Set {
        key: String,
        value: String,
        /// 改為設定此專案的擴充欄位。 / Target this project's extensions instead.
        #[arg(long)]
        project: Option<String>,
    },
    /// 移除擴充欄位。 / Remove an extension.
    Remove {
        key: String,
        #[arg(long)]
        project: Option<String>,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli {
        workspace,
        verbose,
        command,
    } = Cli::parse();
    init_tracing(verbose);
    let location = resolve_workspace(workspace)?;
    match command {
        Commands::Init(args) => execute_init(args, &location),
        Commands::Show(args) => execute_show(args, &location),
        Commands::Project(command) => edit_workspace(&location, |ws| execute_project(command, ws)),
        Commands::Target(command) => edit_workspace(&location, |ws| execute_target(command, ws)),
        Commands::Extension(command) => {
            edit_workspace(&location, |ws| execute_extension(command, ws))
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn execute_init(args: InitArgs, location: &Path) -> Result<()> {
    let path = if location.is_dir() {
        location.join(WORKSPACE_FILE_NAMES[0])
    } else {
        location.to_path_buf()
    };
    if path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }

    let mut writer = WorkspaceWriter::new(FsHost).path(&path);
    if let Some(schema) = args.schema {
        writer = writer.schema(schema);
    }
    writer
        .write(&WorkspaceDefinition::new())
        .with_context(|| format!("write {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}

fn execute_show(args: ShowArgs, location: &Path) -> Result<()> {
    let workspace = load(location)?;
    if args.json {
        let mut document = Map::new();
        for (key, value) in workspace.extensions().iter() {
            document.insert(key.to_string(), value.clone());
        }
        document.insert("projects".to_string(), workspace.projects().to_json());
        println!("{}", serde_json::to_string_pretty(&Value::Object(document))?);
        return Ok(());
    }

    if let Some(path) = workspace.file_path() {
        println!("Workspace: {}", path.display());
    }
    let mut extensions: Vec<&str> = workspace.extensions().keys().collect();
    extensions.sort_unstable();
    if !extensions.is_empty() {
        println!("Extensions: {}", extensions.join(", "));
    }
    println!("Projects ({}):", workspace.projects().len());
    for (name, project) in workspace.projects().iter() {
        println!("  {name} ({})", describe_project(project));
        for (target, definition) in project.targets().iter() {
            println!("    - {target}: {}", definition.builder());
        }
    }
    Ok(())
}

fn describe_project(project: &ProjectDefinition) -> String {
    let mut parts = vec![format!("root: {}", display_root(project.root()))];
    if let Some(source_root) = project.source_root() {
        parts.push(format!("sourceRoot: {source_root}"));
    }
    if let Some(prefix) = project.prefix() {
        parts.push(format!("prefix: {prefix}"));
    }
    parts.join(", ")
}

fn display_root(root: &str) -> &str {
    if root.is_empty() {
        "."
    } else {
        root
    }
}

fn execute_project(command: ProjectCommand, workspace: &mut WorkspaceDefinition) -> Result<()> {
    match command {
        ProjectCommand::Add {
            name,
            root,
            source_root,
            prefix,
        } => {
            let draft = ProjectDraft {
                root,
                source_root,
                prefix,
                ..ProjectDraft::default()
            };
            workspace
                .projects_mut()
                .add(name.as_str(), draft.build()?)
                .with_context(|| format!("add project '{name}'"))?;
            println!("Added project '{name}'");
        }
        ProjectCommand::Remove { name } => {
            workspace
                .projects_mut()
                .delete(&name)
                .ok_or_else(|| anyhow!("project '{name}' does not exist"))?;
            println!("Removed project '{name}'");
        }
        ProjectCommand::Set { name, field, value } => {
            let project = project_mut(workspace, &name)?;
            match field {
                ProjectField::Root => {
                    let root = value.ok_or_else(|| anyhow!("root cannot be cleared"))?;
                    project.set_root(root);
                }
                ProjectField::SourceRoot => project.set_source_root(value.as_deref()),
                ProjectField::Prefix => project.set_prefix(value.as_deref()),
            }
            println!("Updated project '{name}'");
        }
    }
    Ok(())
}

fn execute_target(command: TargetCommand, workspace: &mut WorkspaceDefinition) -> Result<()> {
    match command {
        TargetCommand::Add {
            project,
            name,
            builder,
        } => {
            project_mut(workspace, &project)?
                .targets_mut()
                .add(name.as_str(), TargetDraft::new(builder).build())
                .with_context(|| format!("add target '{name}' to '{project}'"))?;
            println!("Added target '{project}:{name}'");
        }
        TargetCommand::Remove { project, name } => {
            project_mut(workspace, &project)?
                .targets_mut()
                .delete(&name)
                .ok_or_else(|| anyhow!("target '{project}:{name}' does not exist"))?;
            println!("Removed target '{project}:{name}'");
        }
        TargetCommand::SetOption {
            project,
            name,
            key,
            value,
            configuration,
        } => {
            let value = parse_json(&value)?;
            let target = project_mut(workspace, &project)?
                .targets_mut()
                .get_mut(&name)
                .ok_or_else(|| anyhow!("target '{project}:{name}' does not exist"))?;
            match configuration {
                Some(configuration) => {
                    target.set_configuration_option(&configuration, &key, Some(value))
                }
                None => target.set_option(&key, Some(value)),
            }
            println!("Updated option '{key}' of '{project}:{name}'");
        }
    }
    Ok(())
}

fn execute_extension(command: ExtensionCommand, workspace: &mut WorkspaceDefinition) -> Result<()> {
    let (key, value, project) = match command {
        ExtensionCommand::Set {
            key,
            value,
            project,
        } => (key, Some(parse_json(&value)?), project),
        ExtensionCommand::Remove { key, project } => (key, None, project),
    };
    let extensions = match project.as_deref() {
        Some(project) => project_mut(workspace, project)?.extensions_mut(),
        None => workspace.extensions_mut(),
    };
    let removing = value.is_none();
    let previous = extensions
        .set(key.as_str(), value)
        .with_context(|| format!("update extension '{key}'"))?;
    if removing && previous.is_none() {
        bail!("extension '{key}' does not exist");
    }
    println!(
        "{} extension '{key}'",
        if removing { "Removed" } else { "Set" }
    );
    Ok(())
}

fn edit_workspace<F>(location: &Path, edit: F) -> Result<()>
where
    F: FnOnce(&mut WorkspaceDefinition) -> Result<()>,
{
    let mut workspace = load(location)?;
    edit(&mut workspace)?;
    let changes = workspace.change_count();
    println!("Recorded {changes} change(s)");
    write_workspace(&workspace, FsHost, None).context("write workspace")?;
    debug!(changes, "workspace saved");
    Ok(())
}

fn load(location: &Path) -> Result<WorkspaceDefinition> {
    read_workspace(location, FsHost)
        .with_context(|| format!("read workspace at {}", location.display()))
}

fn project_mut<'a>(
    workspace: &'a mut WorkspaceDefinition,
    name: &str,
) -> Result<&'a mut ProjectDefinition> {
    workspace
        .projects_mut()
        .get_mut(name)
        .ok_or_else(|| anyhow!("project '{name}' does not exist"))
}

fn parse_json(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("'{raw}' is not valid JSON"))
}

fn resolve_workspace(workspace: Option<PathBuf>) -> Result<PathBuf> {
    match workspace {
        Some(path) => {
            if path.is_absolute() {
                Ok(path)
            } else {
                Ok(std::env::current_dir()
                    .context("determine current directory")?
                    .join(path))
            }
        }
        None => std::env::current_dir().context("determine current directory"),
    }
}
