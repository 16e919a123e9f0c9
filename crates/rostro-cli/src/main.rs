use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rostro_capture::{
    capture_and_submit, Acquisition, CaptureCoordinator, FilePicker, Identify, Source,
    StaticPermissions, WorkflowError,
};
use rostro_core::{
    AttemptStatus, HttpRegistry, ImageHandle, OperationAck, PersonRecord, PersonUpdate, Phase,
    Registry, Route, SubmissionController,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

mod config;
mod output;

use config::Config;

#[derive(Parser)]
#[command(name = "rostro", about = "Identify faces against a remote identity registry")]
struct Cli {
    /// Registry base URL (overrides ROSTRO_BASE_URL and the config file)
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a photo against the registry
    Identify {
        /// Photo to submit
        image: PathBuf,
        /// Treat the photo as a camera capture
        #[arg(long)]
        camera: bool,
        /// Enroll the face under this ID if nobody matches
        #[arg(long)]
        enroll_id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        requisitioned: bool,
    },
    /// List enrolled people
    List,
    /// Show one person's record
    Show {
        id: String,
        /// Download the stored photo to this path
        #[arg(long)]
        save_image: Option<PathBuf>,
    },
    /// Enroll a new person with a reference photo
    Enroll {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        requisitioned: bool,
        /// Reference photo
        image: PathBuf,
    },
    /// Change a person's details; fields not given keep their value
    Edit {
        id: String,
        #[command(flatten)]
        edits: Edits,
        /// Replace the stored photo
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Remove a person from the registry
    Remove {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Print the URL of a person's stored photo
    ImageUrl { id: String },
}

/// Field overrides for `edit`; anything left out keeps its stored value.
#[derive(clap::Args, Debug, Default)]
struct Edits {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    requisitioned: Option<bool>,
}

impl Edits {
    fn apply(self, update: &mut PersonUpdate) {
        if let Some(name) = self.name {
            update.name = name;
        }
        if let Some(last_name) = self.last_name {
            update.last_name = last_name;
        }
        if let Some(email) = self.email {
            update.email = email;
        }
        if let Some(requisitioned) = self.requisitioned {
            update.requisitioned = requisitioned;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    let registry = Arc::new(
        HttpRegistry::new(&config.registry()).context("cannot set up registry client")?,
    );

    match cli.command {
        Commands::Identify {
            image,
            camera,
            enroll_id,
            name,
            last_name,
            email,
            requisitioned,
        } => {
            let source = if camera { Source::Camera } else { Source::Library };
            let enrollment = enroll_id.map(|user_id| PersonRecord {
                user_id,
                name: name.unwrap_or_default(),
                last_name: last_name.unwrap_or_default(),
                email: email.unwrap_or_default(),
                requisitioned,
            });
            identify(&config, registry, image, source, enrollment, cli.json).await?;
        }
        Commands::List => {
            let people = registry.list().await.context("cannot list people")?;
            if cli.json {
                let rows: Vec<_> = people
                    .iter()
                    .map(|p| output::person_json(p, &registry.image_url(&p.user_id)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                println!("{}", output::people_table(&people));
            }
        }
        Commands::Show { id, save_image } => {
            let record = registry
                .read(&id)
                .await
                .with_context(|| format!("cannot load person {id}"))?;
            let image_url = registry.image_url(&id);
            if cli.json {
                let value = output::person_json(&record, &image_url);
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}", output::person(&record, &image_url));
            }
            if let Some(path) = save_image {
                let bytes = registry.fetch_image(&id).await?;
                tokio::fs::write(&path, &bytes)
                    .await
                    .with_context(|| format!("cannot write {}", path.display()))?;
                eprintln!("Saved photo to {}", path.display());
            }
        }
        Commands::Enroll {
            id,
            name,
            last_name,
            email,
            requisitioned,
            image,
        } => {
            let record = PersonRecord {
                user_id: id,
                name,
                last_name,
                email,
                requisitioned,
            };
            let ack = enroll(&config, registry.as_ref(), &record, image).await?;
            println!(
                "{}",
                ack.message
                    .unwrap_or_else(|| format!("Enrolled {}", record.user_id))
            );
        }
        Commands::Edit { id, edits, image } => {
            let ack = edit(&config, registry.as_ref(), &id, edits, image).await?;
            println!("{}", ack.message.unwrap_or_else(|| format!("Updated {id}")));
        }
        Commands::Remove { id, yes } => {
            let stdin = BufReader::new(tokio::io::stdin());
            match remove(registry.as_ref(), &id, yes, stdin).await? {
                Some(ack) => {
                    println!("{}", ack.message.unwrap_or_else(|| format!("Removed {id}")))
                }
                None => println!("Cancelled; {id} was kept"),
            }
        }
        Commands::ImageUrl { id } => {
            println!("{}", registry.image_url(&id));
        }
    }

    Ok(())
}

fn coordinator(
    config: &Config,
    selection: Option<PathBuf>,
) -> CaptureCoordinator<FilePicker, StaticPermissions> {
    CaptureCoordinator::new(
        FilePicker::new(selection, &config.capture_dir),
        StaticPermissions {
            camera: config.camera_enabled,
            library: true,
        },
    )
}

/// Run the comparison workflow for one photo and act on the route.
async fn identify(
    config: &Config,
    registry: Arc<HttpRegistry>,
    image: PathBuf,
    source: Source,
    enrollment: Option<PersonRecord>,
    json: bool,
) -> Result<()> {
    let coordinator = coordinator(config, Some(image));
    let controller =
        SubmissionController::new(Arc::clone(&registry)).with_pacing(config.pacing());

    let mut phases = controller.subscribe();
    let progress = tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            if *phases.borrow_and_update() == Phase::Submitting {
                eprintln!("Analyzing face...");
            }
        }
    });

    let submitted = capture_and_submit(&coordinator, &controller, source).await;
    progress.abort();

    match submitted {
        Ok(Identify::Cancelled) => {
            println!("Cancelled; nothing was submitted");
            return Ok(());
        }
        Ok(Identify::Submitted(AttemptStatus::Aborted)) => bail!("comparison was abandoned"),
        Ok(Identify::Submitted(AttemptStatus::Resolved)) => {}
        Err(WorkflowError::Submit(rejected)) => {
            discard(rejected.image).await;
            bail!("comparison refused: {}", rejected.reason);
        }
        Err(e) => return Err(e.into()),
    }

    let route = controller
        .take_route()
        .context("comparison finished without an outcome")?;

    match route {
        Route::ShowMatch {
            submitted,
            stored_image,
            similarity,
            person,
        } => {
            let shown = submitted.to_string();
            let rendered = if json {
                let value = output::match_json(&shown, &stored_image, similarity, &person);
                serde_json::to_string_pretty(&value)
            } else {
                Ok(output::match_found(&shown, &stored_image, similarity, &person))
            };
            discard(submitted).await;
            println!("{}", rendered?);
        }
        Route::OfferEnrollment { image } => {
            let result = enroll_unknown(registry.as_ref(), &image, enrollment, json).await;
            discard(image).await;
            result?;
        }
        Route::ShowError {
            image,
            class,
            message,
        } => {
            discard(image).await;
            bail!("{message} [{class:?}]");
        }
    }

    Ok(())
}

async fn enroll_unknown(
    registry: &HttpRegistry,
    image: &ImageHandle,
    enrollment: Option<PersonRecord>,
    json: bool,
) -> Result<()> {
    let Some(record) = enrollment else {
        if json {
            println!("{}", serde_json::json!({ "outcome": "no_match" }));
        } else {
            println!("No match found. Re-run with --enroll-id (and --name, --last-name, --email) to enroll this face.");
        }
        return Ok(());
    };

    let ack = registry
        .create(&record, image)
        .await
        .context("enrollment failed")?;
    if json {
        println!(
            "{}",
            serde_json::json!({
                "outcome": "enrolled",
                "user_id": record.user_id,
                "message": ack.message,
            })
        );
    } else {
        println!("No match found; enrolled as {}", record.user_id);
    }
    Ok(())
}

/// Enroll `record` with a normalized copy of the photo at `path`.
async fn enroll(
    config: &Config,
    registry: &HttpRegistry,
    record: &PersonRecord,
    path: PathBuf,
) -> Result<OperationAck> {
    // Validate before spending time on the photo.
    record.validate_for_create()?;
    let image = acquire_library_image(config, path).await?;
    let result = registry.create(record, &image).await;
    discard(image).await;
    result.context("enrollment failed")
}

/// Apply `edits` over the stored record, optionally replacing the photo.
async fn edit(
    config: &Config,
    registry: &HttpRegistry,
    id: &str,
    edits: Edits,
    image: Option<PathBuf>,
) -> Result<OperationAck> {
    let current = registry
        .read(id)
        .await
        .with_context(|| format!("cannot load person {id}"))?;
    let mut update = PersonUpdate::from(&current);
    edits.apply(&mut update);

    let image = match image {
        Some(path) => Some(acquire_library_image(config, path).await?),
        None => None,
    };
    let result = registry.update(id, &update, image.as_ref()).await;
    if let Some(image) = image {
        discard(image).await;
    }
    result.context("update failed")
}

/// Delete `id` once confirmed. `None` means the operator declined.
async fn remove(
    registry: &HttpRegistry,
    id: &str,
    yes: bool,
    mut answers: impl AsyncBufRead + Unpin,
) -> Result<Option<OperationAck>> {
    let record = registry
        .read(id)
        .await
        .with_context(|| format!("cannot load person {id}"))?;
    if !yes {
        eprint!("Remove {} ({id}) from the registry? [y/N] ", record.full_name());
        let mut answer = String::new();
        answers.read_line(&mut answer).await?;
        if !confirmed(&answer) {
            return Ok(None);
        }
    }
    let ack = registry
        .delete(id)
        .await
        .with_context(|| format!("cannot remove person {id}"))?;
    Ok(Some(ack))
}

fn confirmed(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

async fn acquire_library_image(config: &Config, path: PathBuf) -> Result<ImageHandle> {
    match coordinator(config, Some(path)).acquire(Source::Library).await? {
        Acquisition::Captured(image) => Ok(image),
        Acquisition::Cancelled => bail!("no photo selected"),
    }
}

/// Remove a normalized capture once its step is done.
async fn discard(image: ImageHandle) {
    if let Err(e) = tokio::fs::remove_file(image.path()).await {
        tracing::debug!(image = %image, error = %e, "could not remove capture");
    }
}
