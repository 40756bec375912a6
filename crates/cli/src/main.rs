use crate::{commands::Commands, error::CliError};
use clap::Parser;
use engine_config::SyncSettings;
use engine_core::remote::memory::InMemoryTransformationService;
use engine_processing::{client::TransformationClient, reconcile::StatusProposal};
use model::{
    core::identifiers::{Lfn, TransformationId},
    pagination::filter::{FileQuery, TaskQuery, TransformationQuery},
    transformation::record::NewTransformation,
};
use serde_json::Value;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;

#[derive(Parser, Debug)]
#[command(
    name = "tsync",
    version = "0.1.0",
    about = "Keeps transformation file state in sync with a transformation service"
)]
struct Cli {
    #[arg(long, help = "Service snapshot (JSON); an empty service is assumed if missing")]
    snapshot: PathBuf,

    #[arg(long, help = "Client settings file (JSON)")]
    settings: Option<PathBuf>,

    #[arg(long, help = "If specified, writes the JSON result to this file instead of stdout")]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = run(&cli).await?;

    match &cli.output {
        Some(path) => output::write_json(&result, path).await?,
        None => output::print_json(&result)?,
    }
    Ok(())
}

async fn load_settings(path: Option<&Path>) -> Result<SyncSettings, CliError> {
    let settings = match path {
        Some(path) => SyncSettings::from_file(path).await?,
        None => SyncSettings::default(),
    };
    Ok(settings.with_env_overrides()?.validate()?)
}

async fn open_service(path: &Path) -> Result<InMemoryTransformationService, CliError> {
    if tokio::fs::try_exists(path).await? {
        Ok(InMemoryTransformationService::load(path).await?)
    } else {
        info!(path = %path.display(), "Snapshot not found, starting from an empty service");
        Ok(InMemoryTransformationService::new())
    }
}

async fn run(cli: &Cli) -> Result<Value, CliError> {
    let settings = load_settings(cli.settings.as_deref()).await?;
    let service = Arc::new(open_service(&cli.snapshot).await?);
    let client = TransformationClient::new(service.clone(), settings);

    let result = execute(&client, &cli.command).await;

    // Partial work such as a removal stopped midway is still persisted.
    if cli.command.mutates() {
        service.save(&cli.snapshot).await?;
        info!(path = %cli.snapshot.display(), "Snapshot saved");
    }

    let metrics = client.metrics();
    info!(
        pages_fetched = metrics.pages_fetched,
        page_retries = metrics.page_retries,
        chunks_committed = metrics.chunks_committed,
        chunks_failed = metrics.chunks_failed,
        files_updated = metrics.files_updated,
        files_moved = metrics.files_moved,
        compensations = metrics.compensations,
        compensation_failures = metrics.compensation_failures,
        anomalies = metrics.anomalies,
        "Client metrics"
    );
    result
}

fn to_lfns(raw: &[String]) -> Vec<Lfn> {
    raw.iter().map(|lfn| Lfn::new(lfn.as_str())).collect()
}

async fn execute(client: &TransformationClient, command: &Commands) -> Result<Value, CliError> {
    let value = match command {
        Commands::Files {
            transformation,
            statuses,
            offset,
            max,
        } => {
            let query = FileQuery::for_transformation(TransformationId::new(*transformation))
                .with_statuses(statuses.iter().copied());
            serde_json::to_value(client.get_transformation_files(&query, *offset, *max).await?)?
        }
        Commands::Tasks {
            transformation,
            statuses,
        } => {
            let query = TaskQuery {
                statuses: statuses.clone(),
                ..TaskQuery::for_transformation(TransformationId::new(*transformation))
            };
            serde_json::to_value(client.get_transformation_tasks(&query).await?)?
        }
        Commands::Transformations { statuses, kind } => {
            let query = TransformationQuery {
                statuses: statuses.clone(),
                kind: kind.clone(),
            };
            serde_json::to_value(client.get_transformations(&query).await?)?
        }
        Commands::Create { name, kind } => {
            let id = client
                .add_transformation(&NewTransformation {
                    name: name.clone(),
                    kind: kind.clone(),
                    inherited_from: None,
                })
                .await?;
            serde_json::to_value(client.get_transformation(id).await?)?
        }
        Commands::Derive { parent, name, kind } => {
            let parent = client
                .get_transformation(TransformationId::new(*parent))
                .await?;
            let id = client
                .add_transformation(&NewTransformation {
                    name: name.clone(),
                    kind: kind.clone().unwrap_or(parent.kind),
                    inherited_from: Some(parent.id),
                })
                .await?;
            serde_json::to_value(client.get_transformation(id).await?)?
        }
        Commands::AddFiles {
            transformation,
            lfns,
        } => serde_json::to_value(
            client
                .add_files_to_transformation(TransformationId::new(*transformation), &to_lfns(lfns))
                .await?,
        )?,
        Commands::SetFileStatus {
            transformation,
            status,
            force,
            lfns,
        } => serde_json::to_value(
            client
                .set_file_status(
                    TransformationId::new(*transformation),
                    StatusProposal::uniform(*status, to_lfns(lfns)),
                    *force,
                )
                .await?,
        )?,
        Commands::SetParam {
            transformation,
            name,
            value,
            force,
        } => {
            let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value.as_str()));
            serde_json::to_value(
                client
                    .set_transformation_parameter(
                        TransformationId::new(*transformation),
                        name,
                        value,
                        *force,
                    )
                    .await?,
            )?
        }
        Commands::Migrate {
            transformation,
            keep_max_reset,
        } => {
            let reset_unused = keep_max_reset.then_some(false);
            serde_json::to_value(
                client
                    .move_files_to_derived(TransformationId::new(*transformation), reset_unused)
                    .await?,
            )?
        }
        Commands::Clean { transformation } => serde_json::to_value(
            client
                .clean_transformation(TransformationId::new(*transformation))
                .await?,
        )?,
        Commands::RemoveFiles { lfns } => {
            serde_json::to_value(client.remove_files(&to_lfns(lfns)).await?)?
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    struct Workspace {
        dir: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            Self {
                dir: tempdir().unwrap(),
            }
        }

        fn snapshot(&self) -> PathBuf {
            self.dir.path().join("service.json")
        }

        async fn tsync(&self, args: &[&str]) -> Result<Value, CliError> {
            let snapshot = self.snapshot();
            let mut argv = vec!["tsync", "--snapshot", snapshot.to_str().unwrap()];
            argv.extend_from_slice(args);
            let cli = Cli::try_parse_from(argv).unwrap();
            run(&cli).await
        }
    }

    #[tokio::test]
    async fn test_state_survives_between_invocations() {
        let ws = Workspace::new();
        let created = ws.tsync(&["create", "--name", "reco"]).await.unwrap();
        let id = created["id"].as_u64().unwrap().to_string();

        ws.tsync(&["add-files", "--transformation", &id, "/a", "/b"])
            .await
            .unwrap();
        let outcome = ws
            .tsync(&[
                "set-file-status",
                "--transformation",
                &id,
                "--status",
                "Processed",
                "/a",
            ])
            .await
            .unwrap();
        assert_eq!(outcome["committed"]["/a"], "Processed");

        let files = ws
            .tsync(&["files", "--transformation", &id, "--status", "Unused"])
            .await
            .unwrap();
        let files = files.as_array().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["lfn"], "/b");
    }

    #[tokio::test]
    async fn test_migrate_reports_moves() {
        let ws = Workspace::new();
        ws.tsync(&["create", "--name", "reco"]).await.unwrap();
        ws.tsync(&["add-files", "--transformation", "1", "/a", "/b"])
            .await
            .unwrap();
        let derived = ws
            .tsync(&["derive", "--parent", "1", "--name", "reco-v2"])
            .await
            .unwrap();
        assert_eq!(derived["inherited_from"], 1);
        assert_eq!(derived["type"], "Processing");

        let report = ws
            .tsync(&["migrate", "--transformation", "2"])
            .await
            .unwrap();
        assert_eq!(report["parent"], 1);
        assert_eq!(report["moved"]["Unused"], 2);
    }

    #[tokio::test]
    async fn test_read_only_commands_leave_no_snapshot() {
        let ws = Workspace::new();
        let listed = ws.tsync(&["transformations"]).await.unwrap();
        assert_eq!(listed, Value::Array(Vec::new()));
        assert!(!ws.snapshot().exists());
    }

    #[tokio::test]
    async fn test_status_parameter_is_validated() {
        let ws = Workspace::new();
        ws.tsync(&["create", "--name", "reco"]).await.unwrap();

        let err = ws
            .tsync(&[
                "set-param",
                "--transformation",
                "1",
                "--name",
                "Status",
                "--value",
                "Bogus",
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Client(_)));

        let write = ws
            .tsync(&[
                "set-param",
                "--transformation",
                "1",
                "--name",
                "GroupSize",
                "--value",
                "5",
            ])
            .await
            .unwrap();
        assert_eq!(write["written"], 5);
    }

    #[test]
    fn test_unknown_file_status_is_rejected_by_the_parser() {
        let result = Cli::try_parse_from([
            "tsync",
            "--snapshot",
            "s.json",
            "set-file-status",
            "--transformation",
            "1",
            "--status",
            "Sleeping",
            "/a",
        ]);
        assert!(result.is_err());
    }
}
