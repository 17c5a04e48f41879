//! Scripted wizard host.
//!
//! Mounts a wizard over a file-backed draft store and an in-memory history
//! stack, then reads commands line by line from a script file or stdin:
//!
//! ```text
//! complete <key> <json>   submit data for a step
//! next | prev | goto <n>  in-wizard navigation
//! back | forward          native history navigation
//! wait <ms>               let the event loop run (drives autosave)
//! flush | reload | reset | submit | status | quit
//! ```
//!
//! Usage: `form-wizard [--script PATH] [FORM_ID] [STEP_KEY...]`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use form_wizard::config::AppConfig;
use form_wizard::wizard::{
    format_save_time, Clock, FileStore, HistoryPort, MemoryHistory, PopOutcome, PopState,
    StepDescriptor, SystemClock, WizardController, WizardPorts,
};

const TICK: Duration = Duration::from_millis(50);
const DEFAULT_FORM_ID: &str = "culprit-profile";
const DEFAULT_STEPS: [&str; 3] = ["basics", "details", "review"];

#[derive(Parser, Debug)]
#[command(name = "form-wizard", version, about = "Drive a multi-step form wizard from a command script")]
struct Cli {
    /// Read commands from this file instead of stdin
    #[arg(long, value_name = "PATH")]
    script: Option<PathBuf>,

    /// Form identifier, also names the stored draft
    #[arg(default_value = DEFAULT_FORM_ID)]
    form_id: String,

    /// Step keys in order (defaults to basics, details, review)
    #[arg(value_name = "STEP_KEY")]
    steps: Vec<String>,
}

struct Session {
    config: AppConfig,
    form_id: String,
    steps: Vec<StepDescriptor>,
    history: Arc<MemoryHistory>,
    ports: WizardPorts,
    wizard: Option<WizardController>,
}

impl Session {
    fn open(config: AppConfig, form_id: String, keys: Vec<String>) -> Result<Self> {
        let store = FileStore::open(config.drafts_dir())
            .with_context(|| format!("opening draft store at {}", config.drafts_dir().display()))?;

        let history = Arc::new(MemoryHistory::new("/"));
        history.visit(&format!("/forms/{form_id}"));

        let steps = keys
            .into_iter()
            .enumerate()
            .map(|(i, key)| StepDescriptor::new(i as u32 + 1, key))
            .collect();

        let ports = WizardPorts {
            history: history.clone(),
            store: Arc::new(store),
            clock: Arc::new(SystemClock),
        };

        let mut session = Self {
            config,
            form_id,
            steps,
            history,
            ports,
            wizard: None,
        };
        session.mount()?;
        Ok(session)
    }

    fn mount(&mut self) -> Result<()> {
        let wizard = WizardController::mount(
            self.form_id.clone(),
            self.steps.clone(),
            &self.config.wizard,
            self.ports.clone(),
        )?;
        self.wizard = Some(wizard);
        Ok(())
    }

    fn wizard(&mut self) -> Result<&mut WizardController> {
        self.wizard
            .as_mut()
            .ok_or_else(|| anyhow!("wizard is not mounted (use `reload`)"))
    }

    fn tick(&mut self) {
        if let Some(wizard) = self.wizard.as_mut() {
            wizard.tick();
        }
    }

    async fn wait(&mut self, millis: u64) {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(millis);
        let mut ticker = tokio::time::interval(TICK);
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                _ = ticker.tick() => self.tick(),
            }
        }
        self.tick();
    }

    fn pop(&mut self, pop: Option<PopState>) -> Result<()> {
        let Some(pop) = pop else {
            println!("no history entry in that direction");
            return Ok(());
        };

        let outcome = self.wizard()?.handle_pop_state(&pop);
        match outcome {
            PopOutcome::Exited => {
                println!("left wizard, now at {}", self.history.location());
                if let Some(mut wizard) = self.wizard.take() {
                    wizard.unmount();
                }
            }
            other => println!("{other:?}"),
        }
        Ok(())
    }

    fn status(&mut self) -> Result<()> {
        let location = self.history.location();
        let now = self.ports.clock.now();
        let wizard = self.wizard()?;

        let saved = wizard
            .last_saved_at()
            .map(|t| format_save_time(t, now))
            .unwrap_or_else(|| "never".to_string());

        println!(
            "step {}/{} ({}) progress={}% save={:?} saved={} location={}",
            wizard.current_step(),
            wizard.total_steps(),
            wizard.current_key(),
            wizard.progress_percent(),
            wizard.save_status(),
            saved,
            location,
        );
        Ok(())
    }

    /// Run one script line. Returns false on `quit`.
    async fn execute(&mut self, line: &str) -> Result<bool> {
        let mut parts = line.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or_default().trim();

        match command {
            "complete" => {
                let (key, json) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| anyhow!("usage: complete <key> <json>"))?;
                let value: serde_json::Value =
                    serde_json::from_str(json.trim()).context("step data must be JSON")?;
                let navigation = self.wizard()?.complete_step_value(key, value)?;
                println!("{navigation:?}");
            }
            "next" => println!("{:?}", self.wizard()?.go_next()),
            "prev" => println!("{:?}", self.wizard()?.go_back()),
            "goto" => {
                let step: i64 = rest.parse().context("usage: goto <n>")?;
                println!("{:?}", self.wizard()?.navigate_to_step(step));
            }
            "back" => {
                let pop = self.history.back();
                self.pop(pop)?;
            }
            "forward" => {
                let pop = self.history.forward();
                self.pop(pop)?;
            }
            "wait" => {
                let millis: u64 = rest.parse().context("usage: wait <ms>")?;
                self.wait(millis).await;
            }
            "flush" => {
                self.wizard()?.flush();
            }
            "reload" => {
                if let Some(mut wizard) = self.wizard.take() {
                    wizard.unmount();
                }
                self.mount()?;
                self.status()?;
            }
            "reset" => self.wizard()?.reset(),
            "submit" => {
                self.wizard()?.finish();
                println!("submitted");
            }
            "status" => self.status()?,
            "quit" => return Ok(false),
            other => bail!("unknown command: {other}"),
        }
        Ok(true)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();
    let _log_guard = form_wizard::logging::init(&config.logging, &config.log_dir());
    tracing::info!("{} v{} starting", form_wizard::NAME, form_wizard::VERSION);

    let keys = if cli.steps.is_empty() {
        DEFAULT_STEPS.iter().map(|k| k.to_string()).collect()
    } else {
        cli.steps
    };

    let input: Box<dyn AsyncBufRead + Unpin> = match &cli.script {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening script {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let mut session = Session::open(config, cli.form_id, keys)?;
    session.status()?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match session.execute(line).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                tracing::warn!(command = line, "{e:#}");
                println!("error: {e:#}");
            }
        }
        session.tick();
    }

    if let Some(wizard) = session.wizard.as_mut() {
        wizard.unmount();
    }
    Ok(())
}
