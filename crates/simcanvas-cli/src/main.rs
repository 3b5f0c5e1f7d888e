mod app;

use std::collections::HashSet;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use simcanvas_canvas::{CanvasView, EdgeChange, LoadOutcome, NodeChange};
use simcanvas_core::config::{Config, LoggingConfig};
use simcanvas_core::layout::LayoutWatcher;
use simcanvas_core::simulation::SimulationParams;
use simcanvas_core::types::{Canvas, CanvasPatch, Connection, Node, NodeType, Position};

use crate::app::{AppContext, next_node_id};

#[derive(Parser)]
#[command(
    name = "simcanvas",
    about = "Canvas graph editor state and simulation chat client",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Canvas management
    Canvas {
        #[command(subcommand)]
        action: CanvasAction,
    },

    /// Start a simulation and stream its chapters
    Simulate {
        /// Personality traits
        #[arg(long)]
        personality: Option<String>,

        /// Background experience
        #[arg(long)]
        background: Option<String>,

        /// Number of rounds (1-10)
        #[arg(long)]
        rounds: Option<u32>,
    },

    /// Inspect simulations
    Simulation {
        #[command(subcommand)]
        action: SimulationAction,
    },

    /// Split layout preference
    Layout {
        #[command(subcommand)]
        action: LayoutAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show system status
    Status,
}

#[derive(Subcommand)]
enum CanvasAction {
    /// Create an empty canvas
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List canvases, most recently updated first
    List,
    /// Show a canvas as JSON
    Show { id: String },
    /// Load a canvas and make it active
    Load { id: String },
    /// Rename a canvas
    Rename {
        id: String,
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a canvas
    Delete { id: String },
    /// Remove all nodes and edges
    Clear { id: String },
    /// Add a node
    AddNode {
        canvas: String,
        /// Node id (default: next free number)
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long, default_value_t = 0.0)]
        x: f64,
        #[arg(long, default_value_t = 0.0)]
        y: f64,
        /// default, input, output or custom
        #[arg(long = "type", default_value = "default")]
        node_type: NodeType,
    },
    /// Move a node
    MoveNode {
        canvas: String,
        id: String,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },
    /// Remove a node and its edges
    RemoveNode { canvas: String, id: String },
    /// Connect two nodes
    Connect {
        canvas: String,
        source: String,
        target: String,
        #[arg(long)]
        source_handle: Option<String>,
        #[arg(long)]
        target_handle: Option<String>,
    },
    /// Remove an edge
    RemoveEdge { canvas: String, id: String },
    /// Create a canvas with the example flow
    Demo {
        #[arg(long, default_value = "Example Flow")]
        name: String,
    },
}

#[derive(Subcommand)]
enum SimulationAction {
    /// Fetch a simulation by id
    Get { id: String },
}

#[derive(Subcommand)]
enum LayoutAction {
    /// Print the split ratio
    Get,
    /// Set the split ratio (percent, clamped to 0-100)
    Set { ratio: f64 },
    /// Print the split ratio whenever another process changes it
    Watch,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a specific config value
    Get { key: String },
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let level = logging
        .level
        .clone()
        .unwrap_or_else(|| if verbose { "debug" } else { "info" }.to_string());

    let mut filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    for directive in &logging.filters {
        match directive.parse() {
            Ok(d) => filter = filter.add_directive(d),
            Err(e) => eprintln!("Ignoring invalid log filter '{directive}': {e}"),
        }
    }

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match (logging.format.as_str(), logging.output.as_str()) {
        ("json", "stdout") => builder.json().with_writer(std::io::stdout).init(),
        ("json", _) => builder.json().with_writer(std::io::stderr).init(),
        (_, "stdout") => builder.with_writer(std::io::stdout).init(),
        _ => builder.with_writer(std::io::stderr).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config
    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_path);
    let config = Config::load(&config_path)?;

    init_logging(&config.logging.clone().unwrap_or_default(), cli.verbose);

    let mut ctx = AppContext::load(config, config_path).await?;

    match cli.command {
        Commands::Canvas { action } => run_canvas(&mut ctx, action).await?,
        Commands::Simulate {
            personality,
            background,
            rounds,
        } => {
            let defaults = SimulationParams::default();
            let params = SimulationParams {
                personality: personality.unwrap_or(defaults.personality),
                background: background.unwrap_or(defaults.background),
                rounds: rounds.unwrap_or(defaults.rounds),
            };
            run_simulation(&mut ctx, params).await?;
        }
        Commands::Simulation { action } => match action {
            SimulationAction::Get { id } => {
                let simulation = ctx.session.api().get_simulation(&id).await?;
                println!("{}", serde_json::to_string_pretty(&simulation)?);
            }
        },
        Commands::Layout { action } => match action {
            LayoutAction::Get => println!("{}", ctx.layout.split_ratio()),
            LayoutAction::Set { ratio } => {
                let stored = ctx.layout.set_split_ratio(ratio)?;
                println!("{stored}");
            }
            LayoutAction::Watch => watch_layout(&mut ctx).await?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&ctx.config)?;
                println!("{json}");
            }
            ConfigAction::Get { key } => match ctx.config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => println!("{key} is not set"),
            },
        },
        Commands::Status => print_status(&ctx),
    }

    Ok(())
}

async fn run_canvas(ctx: &mut AppContext, action: CanvasAction) -> anyhow::Result<()> {
    let store = &mut ctx.canvases;
    match action {
        CanvasAction::Create { name, description } => {
            let id = store.create_canvas(&name, description.as_deref())?;
            println!("{id}");
        }
        CanvasAction::List => {
            if store.is_empty() {
                println!("No canvases.");
            }
            for canvas in store.list() {
                let marker = if store.active_canvas_id() == Some(canvas.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {}", summary(canvas));
            }
            return Ok(());
        }
        CanvasAction::Show { id } => {
            let canvas = store.fetch(&id)?;
            println!("{}", serde_json::to_string_pretty(canvas)?);
            return Ok(());
        }
        CanvasAction::Load { id } => {
            if store.load_canvas(&id)? == LoadOutcome::Placeholder {
                tracing::info!(canvas_id = %id, "Created placeholder canvas");
            }
            println!("{}", summary(store.fetch(&id)?));
        }
        CanvasAction::Rename {
            id,
            name,
            description,
        } => {
            store.update_canvas(
                &id,
                CanvasPatch {
                    name: Some(name),
                    description,
                    ..Default::default()
                },
            )?;
        }
        CanvasAction::Delete { id } => store.delete_canvas(&id)?,
        CanvasAction::Clear { id } => {
            let mut view = CanvasView::mount(store, &id);
            view.clear_canvas(store);
        }
        CanvasAction::AddNode {
            canvas,
            id,
            label,
            x,
            y,
            node_type,
        } => {
            let mut view = CanvasView::mount(store, &canvas);
            let id = id.unwrap_or_else(|| next_node_id(store, &canvas));
            let label = label.unwrap_or_else(|| format!("Node {id}"));
            let node = Node::labeled(id.clone(), &label, Position::new(x, y)).with_type(node_type);
            view.add_node(store, node);
            println!("{id}");
        }
        CanvasAction::MoveNode { canvas, id, x, y } => {
            let mut view = CanvasView::mount(store, &canvas);
            view.on_nodes_change(
                store,
                vec![NodeChange::Position {
                    id,
                    position: Some(Position::new(x, y)),
                    dragging: false,
                }],
            );
        }
        CanvasAction::RemoveNode { canvas, id } => {
            let mut view = CanvasView::mount(store, &canvas);
            view.on_nodes_change(store, vec![NodeChange::Remove { id }]);
        }
        CanvasAction::Connect {
            canvas,
            source,
            target,
            source_handle,
            target_handle,
        } => {
            let mut view = CanvasView::mount(store, &canvas);
            let connection = Connection {
                source,
                target,
                source_handle,
                target_handle,
            };
            let edge_id = connection.edge_id();
            view.on_connect(store, connection);
            if view.edges().iter().any(|e| e.id == edge_id) {
                println!("{edge_id}");
            } else {
                anyhow::bail!("could not connect: both nodes must exist on canvas {canvas}");
            }
        }
        CanvasAction::RemoveEdge { canvas, id } => {
            let mut view = CanvasView::mount(store, &canvas);
            view.on_edges_change(store, vec![EdgeChange::Remove { id }]);
        }
        CanvasAction::Demo { name } => {
            let id = ctx.seed_demo(&name)?;
            println!("{id}");
        }
    }

    if let Some(error) = ctx.canvases.error() {
        tracing::warn!("{error}");
    }
    ctx.save_canvases().await?;
    Ok(())
}

fn summary(canvas: &Canvas) -> String {
    format!(
        "{}  {}  ({} nodes, {} edges, updated {})",
        canvas.id,
        canvas.name,
        canvas.nodes.len(),
        canvas.edges.len(),
        canvas.updated_at.format("%Y-%m-%d %H:%M:%S")
    )
}

async fn run_simulation(ctx: &mut AppContext, params: SimulationParams) -> anyhow::Result<()> {
    let mut last_progress = None;
    let mut last_error = None;
    let mut printed = HashSet::new();
    ctx.chat.subscribe(move |state| {
        if last_progress != Some(state.progress) {
            last_progress = Some(state.progress);
            println!("[progress] {}%", state.progress);
        }
        for message in state.messages.iter().filter(|m| !m.is_user) {
            if printed.insert(format!("{}:{}", message.id, message.content)) {
                println!("\n--- Chapter {} ---\n{}\n", message.id, message.content);
            }
        }
        if state.error != last_error {
            last_error = state.error.clone();
            if let Some(error) = &state.error {
                println!("[error] {error}");
            }
        }
    });

    let created = ctx.session.submit(&mut ctx.chat, &params).await?;
    println!("Simulation {} started ({} rounds)", created.id, params.rounds);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            more = ctx.session.pump(&mut ctx.chat) => {
                if !more {
                    break;
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(text)) => {
                    ctx.session.send_user_message(&mut ctx.chat, &text);
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!(%e, "stdin read failed");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                ctx.session.disconnect();
                break;
            }
        }
    }

    println!(
        "Simulation finished: {} messages, progress {}%",
        ctx.chat.messages().len(),
        ctx.chat.progress()
    );
    Ok(())
}

async fn watch_layout(ctx: &mut AppContext) -> anyhow::Result<()> {
    let (_watcher, mut changes) = LayoutWatcher::start(ctx.layout.path().to_path_buf())?;
    println!("{}", ctx.layout.split_ratio());

    loop {
        tokio::select! {
            change = changes.recv() => match change {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    if ctx.layout.reload() {
                        println!("{}", ctx.layout.split_ratio());
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

fn print_status(ctx: &AppContext) {
    println!("simcanvas v{}", env!("CARGO_PKG_VERSION"));
    println!("Config: {}", ctx.config_path.display());
    println!("API: {}", ctx.session.api().base_url);
    println!("Stream: {}", ctx.session.api().ws_base_url);
    println!("Snapshot: {}", ctx.snapshot.path().display());
    println!("Canvases: {}", ctx.canvases.len());
    match ctx.canvases.active_canvas() {
        Some(canvas) => println!("Active canvas: {} ({})", canvas.name, canvas.id),
        None => println!("Active canvas: none"),
    }
    println!(
        "Layout: {}% ({})",
        ctx.layout.split_ratio(),
        ctx.layout.path().display()
    );

    let (warnings, errors) = ctx.config.validate();
    for w in warnings {
        println!("warning: {w}");
    }
    for e in errors {
        println!("error: {e}");
    }
}
