use anyhow::{Context, Result};
use guided_tutor::config::TutorConfig;
use guided_tutor::driver::{Driver, Outbound};
use guided_tutor::interrupt::InterruptRegistry;
use guided_tutor::kernel::event::{Role, TurnId};
use guided_tutor::services::files::{InMemoryFileSystem, ProjectFileSystem};
use guided_tutor::services::store::{
    load_progress_entries, ConversationStore, FileConversationStore, FileMentorReportStore,
};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

const PROJECT_SNAPSHOT: &str = "project.json";
const PROGRESS_FILE: &str = "progress.json";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Setup Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let config = TutorConfig::from_env()?;
    tracing::info!("Tutor starting (model {}, data in {})", config.model, config.data_dir.display());

    // 2. Collaborators
    let project_path = config.data_dir.join(PROJECT_SNAPSHOT);
    let mut files = InMemoryFileSystem::new();
    if project_path.exists() {
        let json = std::fs::read_to_string(&project_path)?;
        files.import_project(&json)?;
        tracing::info!("Loaded {} project entries", files.len());
    }
    let progress = load_progress_entries(&config.data_dir.join(PROGRESS_FILE))?;
    let conversations = FileConversationStore::open(config.data_dir.join("conversations.json"))?;
    let reports = FileMentorReportStore::new(config.data_dir.join("mentor_reports.jsonl"));

    // 3. New or resumed conversation
    let resume = std::env::args().nth(1);
    let mut driver = match resume {
        Some(id) => {
            let id: Uuid = id.parse().context("conversation id must be a UUID")?;
            let record = conversations.load(id)?;
            Driver::resume(config, &record, files, Box::new(conversations), Box::new(reports))
        }
        None => Driver::start(config, files, Box::new(conversations), Box::new(reports)),
    };
    driver.set_progress_entries(progress);

    for turn in driver.session().transcript().closed() {
        print_turn(turn.role, &turn.content);
    }
    println!("Commands: /apply, /reject, /files, /title <text>, /quit. Ctrl+C stops a reply, or exits when idle.");

    // 4. Output printer (sees deltas while a reply is still streaming)
    let printer = tokio::spawn(print_outbound(driver.subscribe()));

    // 5. Ctrl+C: cancel the running reply, or shut down when there is none
    let interrupts = Arc::new(InterruptRegistry::new());
    let shutdown = interrupts.shutdown();
    {
        let interrupts = interrupts.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if interrupts.interrupt() {
                    break;
                }
            }
        });
    }

    // 6. Console loop
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let cancel = interrupts.begin();

        match line {
            "/quit" => break,
            "/apply" => {
                driver.confirm_file_ops(&cancel).await;
                match driver.files().export_project() {
                    Ok(json) => {
                        if let Err(e) = std::fs::write(&project_path, json) {
                            tracing::warn!("Failed to save project snapshot: {}", e);
                        }
                    }
                    Err(e) => tracing::warn!("Failed to serialize project: {}", e),
                }
            }
            "/reject" => driver.reject_file_ops(&cancel).await,
            "/files" => {
                for path in driver.files().paths() {
                    println!("  {}", path);
                }
            }
            _ if line.starts_with("/title ") => driver.rename(line.trim_start_matches("/title ").trim()),
            _ => driver.submit(line, &cancel).await,
        }

        interrupts.finish();
    }

    tracing::info!("Conversation {} closed", driver.session().id);
    drop(driver);
    let _ = printer.await;
    Ok(())
}

async fn print_outbound(mut updates: mpsc::UnboundedReceiver<Outbound>) {
    let mut streaming: Option<TurnId> = None;
    while let Some(out) = updates.recv().await {
        match out {
            Outbound::Delta { id, text } => {
                if streaming != Some(id) {
                    println!("\n[{}]", Role::Assistant.as_str());
                    streaming = Some(id);
                }
                print!("{}", text);
                let _ = std::io::stdout().flush();
            }
            Outbound::Turn(turn) => {
                if streaming == Some(turn.id) {
                    println!("\n");
                    streaming = None;
                } else if turn.role == Role::Assistant {
                    print_turn(turn.role, &turn.content);
                }
            }
            Outbound::Notice(notice) => {
                streaming = None;
                println!("\n[{}] {}", notice.title, notice.description);
            }
            Outbound::Review(batch) => {
                println!("Proposed file operations ({}):", batch.len());
                println!("{}", batch.review_text());
                println!("Type /apply to confirm or /reject to discard.");
            }
            Outbound::Applied(entry) => {
                for result in &entry.results {
                    match &result.error {
                        Some(err) => println!("  {:?} {} -> {}", result.operation.action, result.operation.path, err),
                        None => println!("  {:?} {} -> {:?}", result.operation.action, result.operation.path, result.status),
                    }
                }
            }
        }
    }
}

fn print_turn(role: Role, content: &str) {
    println!("\n[{}]\n{}\n", role.as_str(), content);
}
