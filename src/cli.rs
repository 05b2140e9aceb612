//! Headless host shell: drives the tool lifecycle against simulated sensors
//! and exposes the store's read operations.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::time::Duration;

use crate::db::models::{Measure, ToolKind};
use crate::db::Database;
use crate::finalize::{spawn_commit, CommitOutcome, FinalizeStep};
use crate::navigation::{
    HostContext, HostHandle, LifecycleDelegate, Localizer, NavigationRequest, Navigator,
    RenderContext,
};
use crate::sensing::{FeedController, FeedScript, SensorKind, SensorSubsystem, SimulatedSensors};
use crate::settings::{default_settings_path, Settings, SettingsStore};
use crate::tools::create_tool;

const BAROMETER_BASELINE_HPA: f32 = 1013.25;
const MAGNETOMETER_BASELINE_UT: [f32; 3] = [22.0, 5.0, -42.0];
const NOISE_JITTER: f32 = 0.8;
const SURFACE_ID: u64 = 1;

#[derive(Parser)]
#[command(name = "misura")]
#[command(version)]
#[command(about = "Capture sensor measurements and browse the measurement store", long_about = None)]
pub struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Database file, overriding settings and MISURA_DB_PATH
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List stored measures, oldest first
    List {
        /// Only measures with exactly this title
        #[arg(long)]
        title: Option<String>,
    },

    /// Show the most recently stored measure
    Latest,

    /// Show measures with their readings for one tool
    Show {
        title: String,

        /// barometer, magnetometer or ruler
        #[arg(long)]
        tool: ToolKind,
    },

    /// Run a capture session and store the result
    Capture {
        /// barometer, magnetometer or ruler
        tool: ToolKind,

        /// Title of the stored measure
        #[arg(long)]
        title: String,

        /// Sample to feed, comma separated for vector sensors (e.g. 12.1,-3.4,40.2)
        #[arg(long = "sample", allow_hyphen_values = true)]
        samples: Vec<String>,

        /// How long to run the noisy feed when no samples are given
        #[arg(long, default_value = "250")]
        duration_ms: u64,
    },

    /// Show the effective configuration
    Config,
}

pub(crate) struct AppState {
    pub(crate) db: Database,
    pub(crate) settings: SettingsStore,
}

impl AppState {
    pub(crate) fn open(cli: &Cli) -> Result<Self> {
        let settings_path = cli
            .settings
            .clone()
            .or_else(default_settings_path)
            .unwrap_or_else(|| PathBuf::from("settings.json"));
        let settings = SettingsStore::new(settings_path)?;

        let db_path = cli
            .database
            .clone()
            .unwrap_or_else(|| settings.snapshot().resolved_database_path());
        let db = Database::new(db_path)?;

        Ok(Self { db, settings })
    }
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    let state = AppState::open(&cli)?;

    match cli.command {
        Commands::List { title } => cmd_list(&state, title.as_deref()).await,
        Commands::Latest => cmd_latest(&state).await,
        Commands::Show { title, tool } => cmd_show(&state, &title, tool).await,
        Commands::Capture {
            tool,
            title,
            samples,
            duration_ms,
        } => {
            let samples = parse_samples(&samples)?;
            cmd_capture(&state, tool, &title, samples, Duration::from_millis(duration_ms)).await
        }
        Commands::Config => cmd_config(&state),
    }
}

async fn cmd_list(state: &AppState, title: Option<&str>) -> Result<()> {
    let lines = list_lines(&state.db, title).await?;
    if lines.is_empty() {
        println!("No measures stored.");
    }
    for line in &lines {
        println!("{line}");
    }
    Ok(())
}

/// One line per measure, tagged with the tool that captured it.
async fn list_lines(db: &Database, title: Option<&str>) -> Result<Vec<String>> {
    let measures = match title {
        Some(title) => db.get_by_title(title).await?,
        None => db.get_all().await?,
    };

    let mut lines = Vec::with_capacity(measures.len());
    for measure in &measures {
        let reading = db.get_reading_for_measure(measure.id).await?;
        lines.push(measure_line(measure, reading.map(|reading| reading.kind())));
    }
    Ok(lines)
}

async fn cmd_latest(state: &AppState) -> Result<()> {
    match state.db.get_latest().await? {
        Some(measure) => {
            let reading = state.db.get_reading_for_measure(measure.id).await?;
            println!("{}", measure_line(&measure, reading.map(|reading| reading.kind())));
            if let Some(reading) = reading {
                println!("  {}", reading.describe());
            }
        }
        None => println!("No measures stored."),
    }
    Ok(())
}

async fn cmd_show(state: &AppState, title: &str, tool: ToolKind) -> Result<()> {
    let composites = state.db.get_composite_by_title(title, tool).await?;
    if composites.is_empty() {
        println!("No {tool} measures titled '{title}'.");
    }
    for composite in &composites {
        println!("{}", measure_line(&composite.measure, Some(tool)));
        println!("  {}", composite.reading.describe());
    }
    Ok(())
}

fn cmd_config(state: &AppState) -> Result<()> {
    let settings = state.settings.snapshot();
    println!("settings file: {}", state.settings.path().display());
    match state.db.path() {
        Some(path) => println!("database: {}", path.display()),
        None => println!("database: in memory"),
    }
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

/// Runs one full attachment cycle of `kind` and commits the saved capture.
async fn cmd_capture(
    state: &AppState,
    kind: ToolKind,
    title: &str,
    samples: Vec<Vec<f32>>,
    noisy_duration: Duration,
) -> Result<()> {
    let settings = state.settings.snapshot();
    let sensors = Arc::new(SimulatedSensors::new());
    let navigator = Arc::new(QueuedNavigator::default());

    let subsystem: Arc<dyn SensorSubsystem> = sensors.clone();
    let tool_settings = settings.clone();
    let mut delegate =
        LifecycleDelegate::new(move || create_tool(kind, Arc::clone(&subsystem), &tool_settings));

    let locale = BuiltinLocalizer::new(&settings.locale);
    delegate.on_attach(&HostContext::new(settings.locale.clone()))?;
    delegate.on_create(None)?;
    delegate.on_view_created(Some(RenderContext { surface_id: SURFACE_ID }), None)?;
    delegate.on_host_ready(&HostHandle::new(navigator.clone()), None)?;
    delegate.on_start()?;
    delegate.on_resume()?;

    let view = delegate.view();
    let label = delegate.toolbar_label(&locale).unwrap_or_default();
    info!("Showing {label} in {} on surface {}", view.layout, view.context.surface_id);

    feed_input(&mut delegate, &sensors, &settings, kind, samples, noisy_duration).await?;

    let tool = delegate
        .tool_mut()
        .ok_or_else(|| anyhow!("{kind} tool is no longer attached"))?;
    tool.save()?;

    let request = navigator
        .take()
        .context("save did not navigate to the finalize step")?;
    let mut step = FinalizeStep::receive(request)?;
    step.set_title(title);
    println!("{label}: {}", step.preview());

    let attachment = delegate
        .attachment_token()
        .ok_or_else(|| anyhow!("{kind} tool is no longer attached"))?;
    let outcome = spawn_commit(step, state.db.clone(), attachment).await?;

    delegate.on_pause()?;
    delegate.on_stop()?;
    delegate.on_view_destroyed()?;
    delegate.on_destroy()?;
    delegate.on_detach()?;

    match outcome {
        CommitOutcome::Committed(measure) => {
            println!("{}", measure_line(&measure, Some(kind)));
            Ok(())
        }
        CommitOutcome::Failed(step, err) => {
            Err(anyhow!(err).context(format!("could not store '{}'", step.title())))
        }
        CommitOutcome::Discarded => bail!("capture was detached before the store replied"),
    }
}

async fn feed_input(
    delegate: &mut LifecycleDelegate,
    sensors: &Arc<SimulatedSensors>,
    settings: &Settings,
    kind: ToolKind,
    samples: Vec<Vec<f32>>,
    noisy_duration: Duration,
) -> Result<()> {
    let sensor = match kind {
        ToolKind::Barometer => SensorKind::Pressure,
        ToolKind::Magnetometer => SensorKind::MagneticField,
        ToolKind::Ruler => {
            let tool = delegate
                .tool_mut()
                .ok_or_else(|| anyhow!("ruler is no longer attached"))?;
            for sample in samples {
                for value in sample {
                    tool.submit_value(value)?;
                }
            }
            return Ok(());
        }
    };

    let interval = settings.rate_for(kind).unwrap_or_default().period();
    let mut feed = FeedController::new(Arc::clone(sensors));

    if samples.is_empty() {
        let baseline = match sensor {
            SensorKind::Pressure => vec![BAROMETER_BASELINE_HPA],
            SensorKind::MagneticField => MAGNETOMETER_BASELINE_UT.to_vec(),
        };
        feed.start_feed(
            sensor,
            FeedScript::Noisy {
                baseline,
                jitter: NOISE_JITTER,
                seed: None,
            },
            interval,
        )?;
        tokio::time::sleep(noisy_duration).await;
        let delivered = feed.stop_feed().await?;
        info!("Fed {delivered} simulated {sensor} samples");
    } else {
        feed.start_feed(sensor, FeedScript::Replay(samples), interval)?;
        let delivered = feed.wait().await?;
        info!("Replayed {delivered} {sensor} samples");
    }
    Ok(())
}

fn parse_samples(raw: &[String]) -> Result<Vec<Vec<f32>>> {
    raw.iter()
        .map(|sample| {
            sample
                .split(',')
                .map(|part| {
                    part.trim()
                        .parse::<f32>()
                        .with_context(|| format!("invalid sample value '{part}'"))
                })
                .collect()
        })
        .collect()
}

/// A measure without a stored reading shows `-` for its tool.
fn measure_line(measure: &Measure, kind: Option<ToolKind>) -> String {
    format!(
        "#{}\t{}\t{}\t{}",
        measure.id,
        measure.start_date.format("%Y-%m-%d %H:%M:%S"),
        kind.map_or("-", |kind| kind.as_str()),
        measure.title
    )
}

/// Holds navigation requests until the host picks them up.
#[derive(Default)]
struct QueuedNavigator {
    requests: Mutex<VecDeque<NavigationRequest>>,
}

impl QueuedNavigator {
    fn take(&self) -> Option<NavigationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

impl Navigator for QueuedNavigator {
    fn navigate(&self, request: NavigationRequest) {
        info!("Navigating via {}", request.action);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(request);
    }
}

struct BuiltinLocalizer {
    italian: bool,
}

impl BuiltinLocalizer {
    fn new(locale: &str) -> Self {
        let italian = locale.to_ascii_lowercase().starts_with("it");
        if !italian && !locale.to_ascii_lowercase().starts_with("en") {
            warn!("No strings for locale '{locale}'; using English");
        }
        Self { italian }
    }
}

impl Localizer for BuiltinLocalizer {
    fn resolve(&self, key: &str) -> String {
        let text = match (key, self.italian) {
            ("text_barometer", false) => "Barometer",
            ("text_barometer", true) => "Barometro",
            ("text_magnetometer", false) => "Magnetometer",
            ("text_magnetometer", true) => "Magnetometro",
            ("text_ruler", false) => "Ruler",
            ("text_ruler", true) => "Righello",
            (other, _) => other,
        };
        text.to_string()
    }
}
