//! Application shell: backup, restore and transform of Node Classification groups.

use crate::api::{ClassifierClient, ClientError, Hierarchy};
use crate::cli::{ExecutionMode, Settings};
use crate::http::Transport;
use crate::support::io::FileOption;
use crate::support::transform::Transformer;
use anyhow::{Context, Result};
use tracing::{debug, info};
use url::Url;

/// Message shown when the retry budget for reaching the service runs out.
pub const TIMEOUT_MESSAGE: &str =
    "ERROR: Timeout expired connecting to the console service.  Verify it is up and running.";

pub struct App {
    settings: Settings,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn run(&self, mode: ExecutionMode) -> Result<()> {
        match mode {
            ExecutionMode::Backup(config) => {
                let client = self.client().context("Obtaining backup")?;
                backup_groups(&client, &self.settings.uri, &config.file, config.inherited)
                    .context("Obtaining backup")
            }
            ExecutionMode::Restore(config) => {
                let client = self.client().context("Restoring backup")?;
                restore_groups(&client, &self.settings.uri, &config.file).context("Restoring backup")
            }
            ExecutionMode::Transform(config) => {
                transform_groups(&config.input, &config.output, &config.transformer)
                    .context("Transforming backup")
            }
        }
    }

    fn client(&self) -> Result<ClassifierClient, ClientError> {
        let config = self.settings.connection_config()?;
        ClassifierClient::connect(config, self.settings.retry_policy())
    }
}

/// Full address of an endpoint below the service URI.
pub fn endpoint_uri(uri: &Url, endpoint: &str) -> String {
    format!("{}/{}", uri.as_str().trim_end_matches('/'), endpoint)
}

/// Write every group, pretty printed, in a form the import endpoint accepts.
pub fn backup_groups<T: Transport>(
    client: &ClassifierClient<T>,
    uri: &Url,
    file: &FileOption,
    inherited: bool,
) -> Result<()> {
    info!(
        "Starting Node Classification Backup using GET {}",
        endpoint_uri(uri, "groups")
    );
    let groups = client.groups(inherited)?;
    debug!("Number of groups retrieved: {}", groups.len());

    let document = serde_json::to_string_pretty(&groups)?;
    debug!("Write {} bytes of JSON to {} ...", document.len(), file);
    file.write_document(&document)
        .with_context(|| format!("Writing {}", file))?;

    info!(
        "Finished Node Classification Backup STATUS=OK BYTESIZE={} GROUPCOUNT={} OUTPUT={}",
        document.len(),
        groups.len(),
        file
    );
    Ok(())
}

/// Stream a backup to the import endpoint without buffering it.
pub fn restore_groups<T: Transport>(
    client: &ClassifierClient<T>,
    uri: &Url,
    file: &FileOption,
) -> Result<()> {
    info!(
        "Starting Node Classification Restore using POST {}",
        endpoint_uri(uri, "import-hierarchy")
    );
    debug!("Open {} for streaming ...", file);
    let stream = file
        .open_input()
        .with_context(|| format!("Opening {}", file))?;
    client.import_hierarchy(stream)?;

    info!("Finished Node Classification Restore STATUS=OK INPUT={}", file);
    Ok(())
}

/// Rewrite a backup for restoration on a different cluster.
pub fn transform_groups(input: &FileOption, output: &FileOption, transformer: &Transformer) -> Result<()> {
    let text = input
        .read_to_string()
        .with_context(|| format!("Reading {}", input))?;
    let groups: Hierarchy =
        serde_json::from_str(&text).with_context(|| format!("Parsing groups from {}", input))?;

    let groups = transformer.transform(groups);

    let document = serde_json::to_string_pretty(&groups)?;
    debug!("Write {} bytes to {} ...", document.len(), output);
    output
        .write_document(&document)
        .with_context(|| format!("Writing {}", output))?;

    info!("Transformation completed successfully! GROUPCOUNT={}", groups.len());
    Ok(())
}

/// User-facing text for a failed run.
pub fn format_error(error: &anyhow::Error) -> String {
    let timed_out = error
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<ClientError>(), Some(ClientError::Timeout { .. })));

    if timed_out {
        TIMEOUT_MESSAGE.to_string()
    } else {
        format!("ERROR {:#}", error)
    }
}
