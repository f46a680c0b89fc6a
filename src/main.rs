use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use iocraft::prelude::*;
use std::{
    future::Future,
    io::{self, IsTerminal, Write},
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::{
    client::SummaryClient,
    config::{Config, DEFAULT_API_URL},
    intake::Intake,
    model::{FileId, Summary, SummaryMode},
    present::{CLIPBOARD_HAND_OFF, Presenter, SystemClipboard, render_markdown},
    ui::{
        ConfigHeader, DocumentReady, ErrorMessage, Header, InputPrompt, ModeOptions,
        SuccessMessage, SummaryActions, SummaryHeader, Working,
    },
    workflow::{Phase, WorkflowController},
};

mod client;
mod config;
mod error;
mod intake;
mod model;
mod present;
mod rest_types;
mod serde_utils;
mod ui;
mod workflow;

#[derive(Parser)]
#[command(name = "pdfsum")]
#[command(version)]
#[command(about = "Summarize PDF documents with a remote summarization service")]
struct Cli {
    /// Base URL of the summarization API, e.g. http://localhost:8000/api/
    #[arg(long, global = true)]
    api_url: Option<Url>,
    /// Log more (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a PDF, summarize it and print the summary
    Summarize {
        #[arg(value_hint = ValueHint::FilePath)]
        pdf: PathBuf,
        #[arg(short, long, value_enum)]
        mode: Option<SummaryMode>,
        /// Copy the summary to the clipboard
        #[arg(short, long)]
        copy: bool,
        /// Save the summary; a directory gets summary.md inside it
        #[arg(short, long, value_hint = ValueHint::AnyPath)]
        output: Option<PathBuf>,
    },
    /// Upload a PDF and print its file ID
    Upload {
        #[arg(value_hint = ValueHint::FilePath)]
        pdf: PathBuf,
    },
    /// Step through upload, summary and export interactively (default)
    Interactive {
        #[arg(short, long, value_enum)]
        mode: Option<SummaryMode>,
    },
    /// Remove an uploaded file from the service
    Delete { file_id: String },
    /// Configure pdfsum interactively
    Config,
}

fn main() -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    let _rt_guard = rt.enter();
    clap_complete::CompleteEnv::with_factory(Cli::command).complete();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    rt.block_on(async {
        match cli.command.unwrap_or(Commands::Interactive { mode: None }) {
            Commands::Config => interactive_config(),
            requires_service => {
                let mut config = config::read_config()?;
                if let Some(api_url) = cli.api_url {
                    config.api_url = api_url;
                }
                let client = SummaryClient::new(config.api_url.clone())?;
                info!(api = %client.base_url(), "using summarization service");

                match requires_service {
                    Commands::Summarize {
                        pdf,
                        mode,
                        copy,
                        output,
                    } => {
                        summarize_document(
                            client,
                            pdf,
                            mode.unwrap_or(config.default_mode),
                            copy,
                            output,
                        )
                        .await
                    }
                    Commands::Upload { pdf } => upload_document(client, pdf).await,
                    Commands::Interactive { mode } => {
                        let mode = mode.unwrap_or(config.default_mode);
                        interactive_session(client, &config, mode).await
                    }
                    Commands::Delete { file_id } => delete_document(&client, file_id).await,
                    Commands::Config => unreachable!("handled before the service is configured"),
                }
            }
        }
    })
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "error",
        1 => "pdfsum=info",
        _ => "pdfsum=debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();
}

/// Await `work` with a spinner on screen. Output that is not a terminal gets
/// no spinner.
async fn with_spinner<F: Future>(label: &str, work: F) -> F::Output {
    if !io::stdout().is_terminal() {
        return work.await;
    }

    let mut working = element!(Working(label: label.to_string()));
    tokio::pin!(work);
    tokio::select! {
        output = &mut work => return output,
        _ = working.render_loop() => {}
    }
    work.await
}

fn print_error(message: impl ToString) {
    element!(ErrorMessage(message: message.to_string())).print();
}

fn print_success(message: impl ToString) {
    element!(SuccessMessage(message: message.to_string())).print();
}

fn print_summary(summary: &Summary, elapsed: Option<Duration>) {
    if !io::stdout().is_terminal() {
        println!("{}", summary.text.trim_end());
        return;
    }

    let elapsed = elapsed
        .map(|d| humantime::format_duration(Duration::from_secs(d.as_secs())).to_string());
    element!(SummaryHeader(mode: summary.mode, elapsed: elapsed)).print();
    println!("{}", render_markdown(&summary.text));
}

async fn summarize_document(
    client: SummaryClient,
    pdf: PathBuf,
    mode: SummaryMode,
    copy: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let file = Intake::default().pick_path(&pdf)?;
    let mut controller = WorkflowController::new(client, mode);

    let started = Instant::now();
    let file_id = with_spinner("Uploading and processing...", controller.submit_upload(file)).await?;
    info!(%file_id, "uploaded {}", pdf.display());

    let summary = with_spinner("Generating summary...", controller.request_summary()).await?;
    print_summary(&summary, Some(started.elapsed()));

    let mut presenter = Presenter::default();
    let mut clipboard = SystemClipboard::default();
    if copy {
        presenter.copy(&summary, &mut clipboard)?;
        eprintln!("Copied summary to clipboard");
    }
    if let Some(output) = output {
        let path = presenter.export(&summary, &output)?;
        eprintln!("Saved summary to {}", path.display());
    }
    release_clipboard(&mut presenter, &mut clipboard)?;

    Ok(())
}

/// Keep copied text available once this process exits.
fn release_clipboard(presenter: &mut Presenter, clipboard: &mut SystemClipboard) -> Result<()> {
    if presenter.holds_clipboard() {
        eprintln!(
            "Holding the clipboard until another application takes it (at most {})",
            humantime::format_duration(CLIPBOARD_HAND_OFF)
        );
    }
    presenter.release(clipboard)?;
    Ok(())
}

async fn upload_document(client: SummaryClient, pdf: PathBuf) -> Result<()> {
    let file = Intake::default().pick_path(&pdf)?;
    let name = file.name().to_string();
    let mut controller = WorkflowController::new(client, SummaryMode::default());

    let file_id = with_spinner("Uploading and processing...", controller.submit_upload(file)).await?;

    if io::stdout().is_terminal() {
        let page_count = controller.snapshot().document().and_then(|d| d.page_count);
        element!(DocumentReady(name: name, page_count: page_count)).print();
        println!("File ID: {}", file_id);
    } else {
        println!("{}", file_id);
    }
    Ok(())
}

async fn delete_document(client: &SummaryClient, file_id: String) -> Result<()> {
    let message = client.delete_file(&FileId::new(file_id)).await?;
    println!("{}", message);
    Ok(())
}

async fn interactive_session(client: SummaryClient, config: &Config, mode: SummaryMode) -> Result<()> {
    element!(Header()).print();

    let mut controller = WorkflowController::new(client, mode);
    let view = controller.subscribe();
    let mut intake = Intake::default();
    let mut presenter = Presenter::default();
    let mut clipboard = SystemClipboard::default();
    let mut elapsed = None;

    'session: loop {
        let snapshot = view.borrow().clone();
        if snapshot.in_flight() {
            bail!("Workflow left {} with no request outstanding", snapshot.phase());
        }
        match snapshot.phase() {
            Phase::Idle => {
                if let Some(error) = intake.error() {
                    print_error(error);
                } else if let Some(error) = &snapshot.error {
                    print_error(error);
                }
                let Some(input) = read_input(
                    "PDF file",
                    None,
                    Some("Drag & drop a PDF here or type its path (q to quit)"),
                )?
                else {
                    break;
                };
                match input.as_str() {
                    "" => continue,
                    "q" | "quit" => break,
                    _ => {}
                }

                // Rejections are shown inline on the next prompt.
                let Ok(file) = intake.drop_path(&input) else {
                    continue;
                };
                if with_spinner("Uploading and processing...", controller.submit_upload(file))
                    .await
                    .is_err()
                {
                    intake.clear();
                }
            }
            Phase::Ready => {
                if let Some(document) = snapshot.document() {
                    let name = document
                        .file_name
                        .clone()
                        .or_else(|| intake.selected().map(str::to_string))
                        .or_else(|| snapshot.file_id().map(FileId::to_string))
                        .unwrap_or_default();
                    element!(DocumentReady(name: name, page_count: document.page_count)).print();
                }
                if let Some(error) = &snapshot.error {
                    print_error(error);
                }
                element!(ModeOptions(selected: snapshot.mode)).print();

                let Some(choice) = read_input(
                    "Summary mode",
                    Some(snapshot.mode.as_str()),
                    Some("1-3 or a mode name; n for another document, q to quit"),
                )?
                else {
                    break;
                };
                match choice.as_str() {
                    "q" | "quit" => break,
                    "n" | "new" => {
                        controller.reset();
                        intake.clear();
                        continue;
                    }
                    _ => {}
                }
                let Some(mode) = SummaryMode::from_choice(&choice) else {
                    print_error(format!("Unknown summary mode '{}'", choice));
                    continue;
                };

                controller.set_mode(mode)?;
                let started = Instant::now();
                if with_spinner("Generating summary...", controller.request_summary())
                    .await
                    .is_ok()
                {
                    elapsed = Some(started.elapsed());
                }
            }
            Phase::Done => {
                let Some(summary) = snapshot.summary() else {
                    bail!("Workflow finished without a summary");
                };
                print_summary(summary, elapsed);

                loop {
                    element!(SummaryActions(copied: presenter.copied())).print();
                    let Some(action) = read_input("Action", None, None)? else {
                        break 'session;
                    };
                    match action.as_str() {
                        "c" | "copy" => {
                            if let Err(e) = presenter.copy(summary, &mut clipboard) {
                                print_error(e);
                            }
                        }
                        "d" | "download" => match presenter.export(summary, &config.export_dir) {
                            Ok(path) => print_success(format!("Saved {}", path.display())),
                            Err(e) => print_error(e),
                        },
                        "m" | "mode" => {
                            controller.set_mode(controller.mode())?;
                            break;
                        }
                        "n" | "new" => {
                            controller.reset();
                            intake.clear();
                            break;
                        }
                        "q" | "quit" => break 'session,
                        "" => {}
                        other => print_error(format!("Unknown action '{}'", other)),
                    }
                }
            }
            Phase::Uploading | Phase::Summarizing => {}
        }
    }

    release_clipboard(&mut presenter, &mut clipboard)
}

/// Prompt for one line. `None` means stdin was closed.
fn read_input(prompt: &str, default: Option<&str>, description: Option<&str>) -> Result<Option<String>> {
    element! {
        InputPrompt(
            prompt: prompt.to_string(),
            default: default.map(|s| s.to_string()),
            description: description.map(|s| s.to_string())
        )
    }
    .print();

    print!("> ");
    io::stdout().flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    let input = input.trim().to_string();

    if input.is_empty() {
        Ok(Some(default.map(str::to_string).unwrap_or(input)))
    } else {
        Ok(Some(input))
    }
}

fn interactive_config() -> Result<()> {
    element!(ConfigHeader()).print();

    let current = config::read_config_file()?;
    let current_url = current
        .api_url
        .as_ref()
        .map(Url::to_string)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let api_url = loop {
        let Some(url_str) = read_input(
            "API base URL",
            Some(&current_url),
            Some("Where the summarization service's /upload and /summarize routes live"),
        )?
        else {
            return Ok(());
        };

        match Url::parse(&url_str) {
            Ok(url) => break url,
            Err(e) => {
                print_error(format!("Invalid URL: {}", e));
                println!();
            }
        }
    };

    let current_mode = current.default_mode.unwrap_or_default();
    element!(ModeOptions(selected: current_mode)).print();
    let default_mode = loop {
        let Some(choice) = read_input(
            "Default summary mode",
            Some(current_mode.as_str()),
            Some("Used when --mode is not given"),
        )?
        else {
            return Ok(());
        };

        match SummaryMode::from_choice(&choice) {
            Some(mode) => break mode,
            None => {
                print_error(format!("Unknown summary mode '{}'", choice));
                println!();
            }
        }
    };

    let current_dir = current
        .export_dir
        .as_ref()
        .map(|d| d.display().to_string())
        .unwrap_or_else(|| ".".to_string());
    let Some(export_dir) = read_input(
        "Download directory",
        Some(&current_dir),
        Some("Where the interactive download action writes summary.md"),
    )?
    else {
        return Ok(());
    };

    let path = config::write_config(config::ConfigFile {
        api_url: Some(api_url),
        default_mode: Some(default_mode),
        export_dir: Some(PathBuf::from(export_dir)),
    })?;

    print_success(format!("Configuration saved to {}", path.display()));

    Ok(())
}
