//! WebPilot command implementations

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use webpilot_agent::{
    AgentError, AgentLoop, AgentSettings, EnvError, EnvResult, LlmOracle, Sensor, TaskOutcome,
};
use webpilot_browser::{ChromeEnvironment, LaunchSettings};
use webpilot_config::{self, Config};
use webpilot_keepalive::{KeepAliveReport, KeepAliveService, ProbeStatus};
use webpilot_provider::OpenAiProvider;

use crate::confirm::StdinConfirmer;
use crate::input::LineReader;

const HELP: &str = "\
Type a task in plain language, for example:
  find the cheapest flight from Berlin to Rome next Friday
  check my inbox and summarise unread mail

Commands:
  help, помощь, справка   show this help
  exit, quit, выход       leave (the browser closes unless KEEP_BROWSER_OPEN=true)
  Ctrl+C during a task    cancel the task";

/// One line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Help,
    Exit,
    Task(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    match line.to_lowercase().as_str() {
        "" => Input::Empty,
        "help" | "помощь" | "справка" => Input::Help,
        "exit" | "quit" | "выход" => Input::Exit,
        _ => Input::Task(line.to_string()),
    }
}

/// One-line report for a finished task
pub fn describe_outcome(result: &std::result::Result<TaskOutcome, AgentError>) -> String {
    match result {
        Ok(TaskOutcome::Completed { summary: Some(s) }) => format!("✓ Task complete: {}", s),
        Ok(TaskOutcome::Completed { summary: None }) => "✓ Task complete".to_string(),
        Ok(TaskOutcome::NeedsInput { prompt }) => format!("? Input needed: {}", prompt),
        Err(e) if e.is_canceled() => format!("✗ Task stopped: {}", e),
        Err(e) => format!("✗ Task failed: {}", e),
    }
}

pub fn probe_status(result: EnvResult<String>) -> ProbeStatus {
    match result {
        Ok(_) => ProbeStatus::Alive,
        Err(EnvError::Closed) => ProbeStatus::Closed,
        Err(e) => ProbeStatus::Failed(e.to_string()),
    }
}

fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

/// Load the config file and apply environment overrides
async fn load_config() -> Result<Config> {
    let mut config = Config::load()
        .await
        .context("Failed to read ~/.webpilot/config.json")?;
    config.apply_env();
    Ok(config)
}

type Agent = AgentLoop<ChromeEnvironment, LlmOracle<OpenAiProvider>>;

/// Browser, agent and keep-alive for the lifetime of the process
struct Session {
    agent: Agent,
    env: Arc<ChromeEnvironment>,
    keepalive: JoinHandle<KeepAliveReport>,
    keepalive_cancel: CancellationToken,
    keep_open: bool,
}

impl Session {
    async fn start(config: &Config, lines: Arc<LineReader>) -> Result<Self> {
        let api_key = config
            .api_key()
            .context("No API key configured. Set OPENAI_API_KEY or edit ~/.webpilot/config.json")?;
        let model = Some(config.oracle.model.clone()).filter(|m| !m.is_empty());
        let provider = OpenAiProvider::new(api_key, config.api_base(), model);
        let oracle = LlmOracle::from_config(provider, &config.oracle);
        info!("◆ decision model: {}", oracle.model());

        let env = Arc::new(
            ChromeEnvironment::launch(LaunchSettings::from_config(config))
                .await
                .context("Failed to launch the browser")?,
        );

        let agent = AgentLoop::new(
            env.clone(),
            Arc::new(oracle),
            Arc::new(StdinConfirmer::new(lines)),
            AgentSettings::from_config(&config.agent),
        );

        let keepalive_cancel = CancellationToken::new();
        let service = KeepAliveService::new(
            Some(config.keepalive.interval_s),
            Some(config.keepalive.probe_timeout_s),
            config.keepalive.enabled,
        );
        let probe_env = env.clone();
        let token = keepalive_cancel.clone();
        let keepalive = tokio::spawn(async move {
            service
                .run(
                    move || {
                        let env = probe_env.clone();
                        async move { probe_status(env.current_url().await) }
                    },
                    token,
                )
                .await
        });

        Ok(Self {
            agent,
            env,
            keepalive,
            keepalive_cancel,
            keep_open: config.browser.keep_open,
        })
    }

    /// Run one task; Ctrl+C cancels it
    async fn run_task(&self, task: &str) -> std::result::Result<TaskOutcome, AgentError> {
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            }
        });

        println!("\n◆ Working on: {}", task);
        let started = Instant::now();
        let result = self.agent.execute(task, &cancel).await;
        watcher.abort();

        println!("{}", describe_outcome(&result));
        println!("  Took {}", format_duration(started.elapsed()));
        result
    }

    /// Fails when the browser has gone away
    async fn check_environment(&self) -> Result<()> {
        match self.env.current_url().await {
            Ok(url) => {
                info!("◆ browser at {}", url);
                Ok(())
            }
            Err(EnvError::Closed) => anyhow::bail!("The browser was closed. Restart webpilot."),
            Err(e) => {
                warn!("Browser check failed: {}", e);
                Ok(())
            }
        }
    }

    async fn shutdown(self) {
        self.keepalive_cancel.cancel();
        match self.keepalive.await {
            Ok(report) => info!(
                "◆ keep-alive stopped ({} probes, {} failures)",
                report.probes, report.failures
            ),
            Err(e) => warn!("Keep-alive task failed: {}", e),
        }

        if self.keep_open {
            println!("◆ The browser stays open");
            self.env.detach();
        } else {
            println!("◆ Closing the browser");
            self.env.close().await;
        }
    }
}

/// Interactive session
pub async fn run_command() -> Result<()> {
    let config = load_config().await?;
    let lines = Arc::new(LineReader::stdin());
    let session = Session::start(&config, lines.clone()).await?;

    println!("◆ WebPilot ready");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{}\n", HELP);

    let result = repl(&session, &lines).await;
    session.shutdown().await;
    result
}

async fn repl(session: &Session, lines: &LineReader) -> Result<()> {
    loop {
        print!("◆ ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await else {
            break;
        };
        match parse_input(&line) {
            Input::Empty => continue,
            Input::Help => println!("{}\n", HELP),
            Input::Exit => break,
            Input::Task(task) => {
                // outcome is already reported; the session continues either way
                let _ = session.run_task(&task).await;
                session.check_environment().await?;
                println!();
            }
        }
    }
    Ok(())
}

/// One-shot task
pub async fn task_command(task: String) -> Result<()> {
    let config = load_config().await?;
    let session = Session::start(&config, Arc::new(LineReader::stdin())).await?;

    let result = session.run_task(&task).await;
    session.shutdown().await;

    match result {
        Ok(_) => Ok(()),
        Err(e) => Err(e).context("Task did not complete"),
    }
}

/// Write the default config and create the browser profile
pub async fn init_command() -> Result<()> {
    println!("◆ Initializing WebPilot...");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = webpilot_config::init().await?;

    println!("Config:  {}", webpilot_config::config_path().display());
    println!("Profile: {}", config.user_data_dir().display());
    println!("\n◆ WebPilot initialized");
    println!("\nNext steps:");
    println!("  1. Set OPENAI_API_KEY (or add it to ~/.webpilot/config.json)");
    println!("  2. Start a session: webpilot run");

    Ok(())
}

/// Print configuration status
pub async fn status_command() -> Result<()> {
    let config_path = webpilot_config::config_path();

    println!("◆ WebPilot Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_path.exists() {
            "[OK]"
        } else {
            "[Missing]"
        }
    );

    let config = load_config().await?;
    let profile = config.user_data_dir();
    println!(
        "Profile:   {} {}",
        profile.display(),
        if profile.exists() { "[OK]" } else { "[Missing]" }
    );
    println!(
        "Model:     {}",
        if config.oracle.model.is_empty() {
            "[Provider default]"
        } else {
            config.oracle.model.as_str()
        }
    );
    println!(
        "API Key:   {}",
        if config.has_api_key() {
            "[Set]"
        } else {
            "[Missing]"
        }
    );
    println!("Start URL: {}", config.browser.start_url);
    println!(
        "Limits:    {} iterations, {} consecutive errors, {}s per task",
        config.agent.max_iterations, config.agent.max_errors, config.agent.task_timeout_s
    );
    println!(
        "Keep-alive: {}",
        if config.keepalive.enabled {
            format!("every {}s", config.keepalive.interval_s)
        } else {
            "[Disabled]".to_string()
        }
    );

    println!("\n◆ Ready");

    Ok(())
}
