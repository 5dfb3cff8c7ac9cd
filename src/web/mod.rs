//! HTTP/SSE bridge between an external UI and a running simulation.
//!
//! The engine runs on a blocking task. UI requests are forwarded to it over a
//! channel and applied between frames; frames are published back as JSON.

use std::{
    collections::VecDeque,
    convert::Infallible,
    net::SocketAddr,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::{
    net::TcpListener,
    sync::{broadcast, mpsc},
};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{error, info, warn};

use crate::{
    engine::{Engine, EngineBuilder},
    scenario::Scenario,
    settings::Settings,
    systems::{BulkEdit, BulkEditOutcome, BulkEditSystem},
    world::{Signal, World, WorldSnapshot},
};

/// Published frames kept for `/api/frames`; older ones are dropped.
const RETAINED_FRAMES: usize = 256;

#[derive(Clone, Serialize)]
pub struct UiFrame {
    pub snapshot: WorldSnapshot,
    /// Result of the most recent bulk edit, if any has run.
    pub bulk_edit: Option<BulkEditOutcome>,
    pub completed: bool,
}

impl UiFrame {
    fn capture(engine: &Engine, world: &World, completed: bool) -> Self {
        Self {
            snapshot: world.snapshot(engine.scenario_name()),
            bulk_edit: engine
                .system::<BulkEditSystem>()
                .and_then(BulkEditSystem::last_outcome),
            completed,
        }
    }
}

#[derive(Clone, Serialize)]
pub struct StateEnvelope {
    pub scenario: String,
    pub total_frames: u64,
    pub frame: Option<UiFrame>,
    pub settings: Settings,
    pub completed: bool,
}

/// Requests from the UI, applied on the simulation thread between frames.
#[derive(Debug, Clone)]
pub enum BridgeCommand {
    UpdateSettings(Settings),
    BulkEdit(BulkEdit),
    ReloadColors,
}

#[derive(Clone)]
struct AppState {
    broadcaster: broadcast::Sender<String>,
    commands: mpsc::UnboundedSender<BridgeCommand>,
    latest_frame: Arc<Mutex<Option<UiFrame>>>,
    frames: Arc<Mutex<VecDeque<UiFrame>>>,
    settings: Arc<Mutex<Settings>>,
    total_frames: u64,
    scenario_name: String,
    simulation_done: Arc<AtomicBool>,
}

pub struct WebServerConfig {
    pub scenario: Scenario,
    pub settings: Settings,
    /// Where accepted settings changes are persisted.
    pub settings_path: Option<PathBuf>,
    pub frames: u64,
    /// Publish a UI frame every this many simulation frames.
    pub publish_interval: u32,
    pub snapshot_dir: PathBuf,
    pub host: String,
    pub port: u16,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Publisher {
    broadcaster: broadcast::Sender<String>,
    latest_frame: Arc<Mutex<Option<UiFrame>>>,
    frames: Arc<Mutex<VecDeque<UiFrame>>>,
}

impl Publisher {
    fn publish(&self, frame: UiFrame) {
        *lock(&self.latest_frame) = Some(frame.clone());
        {
            let mut frames = lock(&self.frames);
            if frames.len() == RETAINED_FRAMES {
                frames.pop_front();
            }
            frames.push_back(frame.clone());
        }
        if let Ok(payload) = serde_json::to_string(&frame) {
            let _ = self.broadcaster.send(payload);
        }
    }
}

fn apply_bridge_command(
    command: BridgeCommand,
    engine: &mut Engine,
    world: &mut World,
    shared_settings: &Mutex<Settings>,
    settings_path: Option<&PathBuf>,
) {
    match command {
        BridgeCommand::UpdateSettings(settings) => {
            if let Some(path) = settings_path {
                if let Err(err) = settings.save(path) {
                    warn!("failed to persist settings: {err}");
                }
            }
            info!(
                winter_illusion = settings.use_dead_model_during_winter,
                growth_disabled = settings.disable_tree_growth,
                colors = ?settings.color_variation_set,
                "settings updated"
            );
            *lock(shared_settings) = settings.clone();
            *engine.settings_mut() = settings;
        }
        BridgeCommand::BulkEdit(edit) => match engine.system_mut::<BulkEditSystem>() {
            Some(system) => system.queue(edit),
            None => warn!("bulk edit requested but the bulk edit system is not installed"),
        },
        BridgeCommand::ReloadColors => world.raise_signal(Signal::ColorReload),
    }
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        scenario,
        settings,
        settings_path,
        frames: total_frames,
        publish_interval,
        snapshot_dir,
        host,
        port,
    } = config;

    let scenario_name = scenario.name.clone();
    let mut world = scenario.build_world()?;
    let mut engine = EngineBuilder::new(scenario.engine_settings(snapshot_dir))
        .with_settings(settings.clone())
        .with_default_systems()
        .build();

    let (tx, _) = broadcast::channel::<String>(512);
    let (command_tx, mut command_rx) = mpsc::unbounded_channel::<BridgeCommand>();
    let latest_frame: Arc<Mutex<Option<UiFrame>>> = Arc::new(Mutex::new(None));
    let frames: Arc<Mutex<VecDeque<UiFrame>>> =
        Arc::new(Mutex::new(VecDeque::with_capacity(RETAINED_FRAMES)));
    let shared_settings = Arc::new(Mutex::new(settings));
    let simulation_done = Arc::new(AtomicBool::new(false));

    let publisher = Publisher {
        broadcaster: tx.clone(),
        latest_frame: latest_frame.clone(),
        frames: frames.clone(),
    };
    let settings_for_sim = shared_settings.clone();
    let done_for_sim = simulation_done.clone();
    let publish_interval = publish_interval.max(1) as u64;
    let scenario_label = scenario_name.clone();

    let sim_handle = tokio::task::spawn_blocking(move || -> Result<()> {
        for frame in 0..total_frames {
            while let Ok(command) = command_rx.try_recv() {
                apply_bridge_command(
                    command,
                    &mut engine,
                    &mut world,
                    &settings_for_sim,
                    settings_path.as_ref(),
                );
            }
            engine.step(&mut world)?;
            if (frame + 1) % publish_interval == 0 {
                publisher.publish(UiFrame::capture(&engine, &world, false));
            }
        }

        done_for_sim.store(true, Ordering::SeqCst);
        publisher.publish(UiFrame::capture(&engine, &world, true));
        Ok(())
    });

    let state = Arc::new(AppState {
        broadcaster: tx,
        commands: command_tx,
        latest_frame,
        frames,
        settings: shared_settings,
        total_frames,
        scenario_name,
        simulation_done,
    });

    tokio::spawn(async move {
        match sim_handle.await {
            Ok(Ok(())) => info!(scenario = %scenario_label, "simulation completed"),
            Ok(Err(err)) => error!("simulation error: {err:#}"),
            Err(err) => error!("simulation task failed: {err}"),
        }
    });

    let router = router(state);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;
    info!(%addr, "UI bridge listening (Ctrl+C to stop)");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/frames", get(all_frames))
        .route("/api/events", get(stream_events))
        .route("/api/settings", post(update_settings))
        .route("/api/bulk-edit", post(bulk_edit))
        .route("/api/reload-colors", post(reload_colors))
        .with_state(state)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down UI bridge");
}

async fn latest_state(State(state): State<Arc<AppState>>) -> Json<StateEnvelope> {
    Json(StateEnvelope {
        scenario: state.scenario_name.clone(),
        total_frames: state.total_frames,
        frame: lock(&state.latest_frame).clone(),
        settings: lock(&state.settings).clone(),
        completed: state.simulation_done.load(Ordering::SeqCst),
    })
}

#[derive(Serialize)]
struct FramesResponse {
    scenario: String,
    total_frames: u64,
    completed: bool,
    frames: Vec<UiFrame>,
}

async fn all_frames(State(state): State<Arc<AppState>>) -> Json<FramesResponse> {
    Json(FramesResponse {
        scenario: state.scenario_name.clone(),
        total_frames: state.total_frames,
        completed: state.simulation_done.load(Ordering::SeqCst),
        frames: lock(&state.frames).iter().cloned().collect(),
    })
}

fn forward(state: &AppState, command: BridgeCommand) -> StatusCode {
    match state.commands.send(command) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => StatusCode::CONFLICT,
    }
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<Settings>,
) -> StatusCode {
    forward(&state, BridgeCommand::UpdateSettings(settings))
}

async fn bulk_edit(State(state): State<Arc<AppState>>, Json(edit): Json<BulkEdit>) -> StatusCode {
    forward(&state, BridgeCommand::BulkEdit(edit))
}

async fn reload_colors(State(state): State<Arc<AppState>>) -> StatusCode {
    forward(&state, BridgeCommand::ReloadColors)
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}
