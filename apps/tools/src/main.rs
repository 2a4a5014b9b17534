use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shared::{
    domain::{ElementHandle, Layout, Position, Role},
    geometry::{Rect, Size, Viewport},
};
use storage::{KeyValueStore, MemoryStore, SqliteStore, TOUR_COMPLETED_KEY};
use tour_core::{
    config::load_settings_from,
    default_steps,
    headless::{PageAction, PageFixture},
    load_settings, load_steps, place_tooltip, HeadlessPage, RoleSwitcher, Settings, TourController,
    TourPhase,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tour_tools", about = "Inspect and drive the guided tour")]
struct Cli {
    /// Overrides the configured key-value database.
    #[arg(long)]
    database_url: Option<String>,
    /// Config file; defaults to `tour.toml` in the working directory.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Shows whether the tour has been completed.
    Status,
    /// Clears the completion flag so the tour starts on the next page load.
    Reset,
    Role {
        #[command(subcommand)]
        action: RoleCommand,
    },
    /// Runs the tour against a headless page and prints every step.
    Simulate {
        /// Page fixture JSON; defaults to the built-in Smart Classroom header.
        #[arg(long)]
        fixture: Option<PathBuf>,
        /// Step catalog JSON; defaults to the built-in steps.
        #[arg(long)]
        steps: Option<PathBuf>,
        #[arg(long, default_value_t = 1280.0)]
        width: f64,
        #[arg(long, default_value_t = 800.0)]
        height: f64,
        /// Skips the tour when this step index is reached.
        #[arg(long)]
        skip_at: Option<usize>,
        /// Removes every settle and display delay.
        #[arg(long)]
        instant: bool,
        /// Reads and writes the completion flag in the configured database.
        #[arg(long)]
        persist: bool,
        /// Dumps the page action log as JSON lines.
        #[arg(long)]
        log_actions: bool,
    },
    /// Computes a tooltip placement.
    Place {
        /// Target box as `x,y,width,height` (viewport coordinates).
        #[arg(long)]
        target: String,
        /// Tooltip size as `width,height`.
        #[arg(long, default_value = "320,200")]
        tooltip: String,
        /// Viewport as `width,height[,scroll_x,scroll_y]`.
        #[arg(long)]
        viewport: String,
        #[arg(long, default_value = "right")]
        position: String,
        /// Forces the mobile layout regardless of viewport width.
        #[arg(long)]
        mobile: bool,
    },
    /// Prints the built-in page fixture as JSON.
    Fixture {
        #[arg(long, default_value_t = 1280.0)]
        width: f64,
        #[arg(long, default_value_t = 800.0)]
        height: f64,
    },
}

#[derive(Subcommand, Debug)]
enum RoleCommand {
    Show,
    Set { role: String },
    Toggle,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => load_settings_from(path)?,
        None => load_settings(),
    };
    if let Some(database_url) = cli.database_url {
        settings.database_url = database_url;
    }

    match cli.command {
        Command::Status => {
            let store = SqliteStore::new(&settings.database_url).await?;
            match store.entry(TOUR_COMPLETED_KEY).await? {
                Some(entry) if entry.value == storage::FLAG_TRUE => {
                    println!("tour completed at {}", entry.updated_at.to_rfc3339());
                }
                _ => println!("tour not completed; it starts on the next page load"),
            }
        }
        Command::Reset => {
            let store = SqliteStore::new(&settings.database_url).await?;
            store.remove(TOUR_COMPLETED_KEY).await?;
            info!(database_url = %settings.database_url, "tour completion flag cleared");
        }
        Command::Role { action } => {
            let store = Arc::new(SqliteStore::new(&settings.database_url).await?);
            let switcher = RoleSwitcher::new(store);
            let role = match action {
                RoleCommand::Show => switcher.current().await?,
                RoleCommand::Set { role } => {
                    let role = Role::parse(&role)
                        .with_context(|| format!("unknown role '{role}'; expected candidate or student"))?;
                    switcher.set(role).await?
                }
                RoleCommand::Toggle => switcher.toggle().await?,
            };
            info!(%role, "role applied");
            println!("current role: {role}");
        }
        Command::Simulate {
            fixture,
            steps,
            width,
            height,
            skip_at,
            instant,
            persist,
            log_actions,
        } => {
            let options = SimulateOptions {
                fixture,
                steps,
                viewport: Viewport::new(width, height),
                skip_at,
                persist,
                log_actions,
            };
            let settings = if instant {
                settings.without_delays()
            } else {
                settings
            };
            let report = simulate(options, settings).await?;
            println!("layout: {:?}", report.layout);
            println!("shown steps: {:?}", report.shown_steps);
            println!("clicks: {}", report.clicks.len());
            println!("result: {:?}", report.phase);
            for action in &report.actions {
                println!("{}", serde_json::to_string(action)?);
            }
        }
        Command::Place {
            target,
            tooltip,
            viewport,
            position,
            mobile,
        } => {
            let target = match parse_numbers(&target)?[..] {
                [x, y, w, h] => Rect::new(x, y, w, h),
                _ => bail!("target must be `x,y,width,height`, got '{target}'"),
            };
            let tooltip = match parse_numbers(&tooltip)?[..] {
                [w, h] => Size::new(w, h),
                _ => bail!("tooltip must be `width,height`, got '{tooltip}'"),
            };
            let viewport = match parse_numbers(&viewport)?[..] {
                [w, h] => Viewport::new(w, h),
                [w, h, sx, sy] => Viewport::new(w, h).scrolled(sx, sy),
                _ => bail!("viewport must be `width,height[,scroll_x,scroll_y]`, got '{viewport}'"),
            };
            let layout = if mobile {
                Layout::Mobile
            } else {
                Layout::for_width(viewport.width, settings.breakpoint_px)
            };
            let placement = place_tooltip(
                target,
                tooltip,
                parse_position(&position)?,
                viewport,
                layout,
                &settings.placement,
            );
            println!("{}", serde_json::to_string_pretty(&placement)?);
        }
        Command::Fixture { width, height } => {
            let fixture = PageFixture::smart_classroom(Viewport::new(width, height));
            println!("{}", serde_json::to_string_pretty(&fixture)?);
        }
    }

    Ok(())
}

struct SimulateOptions {
    fixture: Option<PathBuf>,
    steps: Option<PathBuf>,
    viewport: Viewport,
    skip_at: Option<usize>,
    persist: bool,
    log_actions: bool,
}

struct SimulationReport {
    layout: Layout,
    shown_steps: Vec<usize>,
    phase: TourPhase,
    clicks: Vec<ElementHandle>,
    actions: Vec<PageAction>,
}

async fn simulate(options: SimulateOptions, settings: Settings) -> Result<SimulationReport> {
    let mut fixture = match &options.fixture {
        Some(path) => PageFixture::load(path)?,
        None => PageFixture::smart_classroom(options.viewport),
    };
    // The page must agree with the controller on which layout is showing.
    fixture.breakpoint_px = settings.breakpoint_px;
    let steps = match &options.steps {
        Some(path) => load_steps(path)?,
        None => default_steps(),
    };
    let store: Arc<dyn KeyValueStore> = if options.persist {
        Arc::new(SqliteStore::new(&settings.database_url).await?)
    } else {
        Arc::new(MemoryStore::new())
    };

    let page = Arc::new(HeadlessPage::from_fixture(fixture));
    let mut tour = TourController::new(steps, page.clone(), store, settings)?;
    let mut shown_steps = Vec::new();

    if tour.init().await == TourPhase::Welcome {
        tour.start().await;
    } else {
        info!("tour already completed; run `tour_tools reset` to show it again");
    }

    while let TourPhase::Step(index) = tour.phase() {
        shown_steps.push(index);
        let title = &tour.steps()[index].title;
        match page.tooltip() {
            Some((view, Some(placement))) => info!(
                step = index,
                %title,
                icon = %view.icon,
                top = placement.top,
                left = placement.left,
                arrow = ?placement.arrow,
                "simulated step"
            ),
            _ => info!(step = index, %title, "simulated step without tooltip"),
        }
        if options.skip_at == Some(index) {
            tour.skip().await;
        } else {
            tour.advance().await;
        }
    }

    Ok(SimulationReport {
        layout: tour.layout(),
        shown_steps,
        phase: tour.phase(),
        clicks: page.clicks(),
        actions: if options.log_actions {
            page.actions()
        } else {
            Vec::new()
        },
    })
}

fn parse_numbers(raw: &str) -> Result<Vec<f64>> {
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .with_context(|| format!("'{part}' is not a number"))
        })
        .collect()
}

fn parse_position(raw: &str) -> Result<Position> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "bottom" => Ok(Position::Bottom),
        "top" => Ok(Position::Top),
        "left" => Ok(Position::Left),
        "right" => Ok(Position::Right),
        other => bail!("unknown position '{other}'; expected bottom, top, left or right"),
    }
}
