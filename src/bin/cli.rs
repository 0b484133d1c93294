//! proposal-rpa
//!
//! Attaches to (or launches) Chrome, waits for the operator to log in, then
//! sends proposals until the target count is reached. Ctrl-C stops the run
//! at the next checkpoint.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use proposal_rpa::engine::{Session, SessionProvider};
use proposal_rpa::{
    AmbiguityPolicy, AutomationEngine, CancelFlag, ChromeProvider, ConnectionOptions, EngineConfig, Endpoint,
    LaunchOptions, RunStatus, TemplateBook,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Ambiguity {
    /// Skip the item when the term matches several options
    Reject,
    /// Pick the option whose label equals the term exactly
    PreferExact,
}

impl From<Ambiguity> for AmbiguityPolicy {
    fn from(value: Ambiguity) -> Self {
        match value {
            Ambiguity::Reject => AmbiguityPolicy::Reject,
            Ambiguity::PreferExact => AmbiguityPolicy::PreferExact,
        }
    }
}

#[derive(Parser)]
#[command(name = "proposal-rpa")]
#[command(version)]
#[command(about = "Batch-send proposals from a logged-in browser tab", long_about = None)]
struct Cli {
    /// JSON settings file; missing keys take their defaults
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// JSON template collection; the active template becomes the comment
    #[arg(long, value_name = "FILE")]
    templates: Option<PathBuf>,

    /// Comment text, overrides any template
    #[arg(long, value_name = "TEXT")]
    comment: Option<String>,

    /// Number of proposals to send
    #[arg(long, short = 'n', value_name = "N")]
    max_count: Option<usize>,

    /// Template term label to pick in the modal
    #[arg(long, value_name = "LABEL")]
    term: Option<String>,

    /// WebSocket endpoint of a running browser (launches one when absent)
    #[arg(long, value_name = "URL")]
    ws_endpoint: Option<String>,

    /// Launch the browser without a window. There is nothing to log in to,
    /// so the operator prompt is skipped; use a logged-in --user-data-dir.
    #[arg(long)]
    headless: bool,

    /// Path to custom browser executable
    #[arg(long, value_name = "PATH")]
    chrome_path: Option<PathBuf>,

    /// Persistent browser profile directory
    #[arg(long, value_name = "DIR")]
    user_data_dir: Option<PathBuf>,

    /// Drive the tab whose URL contains this text
    #[arg(long, value_name = "TEXT", default_value = "impact")]
    tab_hint: String,

    /// Open this URL in the driven tab before starting
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// What to do when the term matches several options
    #[arg(long, value_enum, default_value = "reject")]
    ambiguity: Ambiguity,

    /// Start immediately instead of waiting for Enter
    #[arg(long)]
    no_wait: bool,
}

impl Cli {
    fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.settings {
            Some(path) => EngineConfig::from_json_file(path)?,
            None => EngineConfig::default(),
        };

        if let Some(path) = &self.templates {
            let book = TemplateBook::from_json_file(path)
                .with_context(|| format!("Failed to read templates from {}", path.display()))?;
            match book.active() {
                Some(template) => {
                    log::info!("Using template {:?}", template.name);
                    config.template_text = template.content.clone();
                }
                None => log::warn!("{} holds no templates", path.display()),
            }
        }
        if let Some(comment) = &self.comment {
            config.template_text = comment.clone();
        }
        if let Some(max_count) = self.max_count {
            config.max_count = max_count;
        }
        if let Some(term) = &self.term {
            config.template_term = term.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Whether to wait for the operator to log in. Only a visible browser
    /// can be logged in to.
    fn wait_for_login(&self) -> bool {
        !self.no_wait && (self.ws_endpoint.is_some() || !self.headless)
    }

    fn endpoint(&self) -> Endpoint {
        match &self.ws_endpoint {
            Some(url) => Endpoint::Connect(ConnectionOptions::new(url.clone())),
            None => {
                let mut options = LaunchOptions::new().headless(self.headless);
                if let Some(path) = &self.chrome_path {
                    options = options.chrome_path(path.clone());
                }
                if let Some(dir) = &self.user_data_dir {
                    options = options.user_data_dir(dir.clone());
                }
                Endpoint::Launch(options)
            }
        }
    }
}

fn wait_for_operator() -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(stdout)?;
    writeln!(stdout, "Log in to the site in the browser window and solve any CAPTCHA.")?;
    writeln!(stdout, "Open the list with the \"Send Proposal\" buttons, then press Enter here.")?;
    stdout.flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.engine_config()?;
    let provider = ChromeProvider::new(cli.endpoint()).tab_hint(cli.tab_hint.clone());

    log::info!("proposal-rpa v{}", env!("CARGO_PKG_VERSION"));
    match provider.endpoint() {
        Endpoint::Connect(options) => log::info!("Attaching to {}", options.ws_url),
        Endpoint::Launch(options) => log::info!("Launching browser ({})", if options.headless { "headless" } else { "headed" }),
    }

    let url = cli.url.clone();
    let hint = cli.tab_hint.clone();
    let wait = cli.wait_for_login();
    let (provider, session) = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let handle = provider.connect().context("Failed to reach the browser")?;
        if let Some(url) = url.as_deref() {
            log::info!("Opening {}", url);
            handle.navigate(url, Some(hint.as_str()))?;
        }
        if wait {
            wait_for_operator()?;
        }
        // Picked after the prompt: the operator may have switched tabs
        let page = provider.active_page(&handle).context("No tab to drive")?;
        Ok((provider, Session::new(handle, page)))
    })
    .await??;

    let cancel = CancelFlag::new();
    let mut engine = AutomationEngine::new(provider, config)
        .disambiguator(AmbiguityPolicy::from(cli.ambiguity))
        .cancel_flag(cancel.clone());

    let mut run = tokio::task::spawn_blocking(move || engine.run(session));

    let report = tokio::select! {
        joined = &mut run => joined?,
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupted, stopping after the current step");
            cancel.cancel();
            run.await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    if let RunStatus::Failed { reason } = &report.status {
        anyhow::bail!("run failed: {}", reason);
    }
    Ok(())
}
