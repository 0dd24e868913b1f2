//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use syllatrack_api::{AppState, build_router, serve};
use syllatrack_core::pipeline::{IngestContext, IngestOutcome, ProgressReporter, ingest_document};
use syllatrack_core::{IngestWorker, NewCourse, NewTask, Tracker};
use syllatrack_extraction::ChatClient;
use syllatrack_shared::dates::{format_date_short, parse_date_safe, today_local};
use syllatrack_shared::{
    AppConfig, init_config, load_config, load_config_from, validate_api_key,
};
use syllatrack_storage::{BlobStore, FsBlobStore, Storage};

/// Queue depth between upload handlers and the ingestion worker.
const INGEST_QUEUE_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Syllatrack: turn syllabi into a course and deadline tracker.
#[derive(Parser)]
#[command(
    name = "syllatrack",
    version,
    about = "Extract courses and graded tasks from syllabi and track upcoming deadlines.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.syllatrack/syllatrack.toml.
    #[arg(long, global = true, env = "SYLLATRACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Act as this user instead of the configured default.
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Start the HTTP API with background syllabus ingestion.
    Serve {
        /// Address to bind (defaults to server.bind from config).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Ingest a syllabus file in the foreground.
    Ingest {
        /// PDF (or .txt/.md) syllabus to ingest.
        file: PathBuf,
    },

    /// Course management.
    Courses {
        #[command(subcommand)]
        action: CoursesAction,
    },

    /// Task management.
    Tasks {
        #[command(subcommand)]
        action: TasksAction,
    },

    /// Show dashboard insights: deadlines, overdue counts, breakdowns.
    Insights {
        /// Reference day as YYYY-MM-DD (defaults to today).
        #[arg(long)]
        today: Option<String>,

        /// How many upcoming tasks to list.
        #[arg(long)]
        limit: Option<usize>,

        /// Print the raw JSON view.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Course subcommands.
#[derive(Subcommand)]
pub(crate) enum CoursesAction {
    /// List courses.
    List,
    /// Add a course by hand.
    Add {
        /// Course name.
        name: String,
        #[arg(long)]
        instructor: Option<String>,
        #[arg(long)]
        semester: Option<String>,
    },
    /// Delete a course and all of its tasks.
    Delete {
        /// Course id.
        id: String,
    },
}

/// Task subcommands.
#[derive(Subcommand)]
pub(crate) enum TasksAction {
    /// List tasks, optionally for one course.
    List {
        #[arg(long)]
        course: Option<String>,
    },
    /// Add a task by hand.
    Add {
        /// Owning course id.
        #[arg(long)]
        course: String,
        /// Task title.
        title: String,
        /// Due date as YYYY-MM-DD.
        #[arg(long)]
        due: Option<String>,
        /// Homework, Quiz, Exam, Project, Paper, Lab, or Other.
        #[arg(long = "type")]
        kind: Option<String>,
        #[arg(long)]
        weight: Option<f64>,
    },
    /// Delete a task.
    Delete {
        /// Task id.
        id: String,
        /// Owning course id.
        #[arg(long)]
        course: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "syllatrack=info,tower_http=info",
        1 => "syllatrack=debug,tower_http=debug",
        _ => "syllatrack=trace,tower_http=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()).await,
        };
    }

    let config = resolve_config(cli.config.as_deref())?;
    let user = cli
        .user
        .clone()
        .unwrap_or_else(|| config.defaults.user_id.clone());

    match cli.command {
        Command::Serve { bind } => cmd_serve(&config, &user, bind.as_deref()).await,
        Command::Ingest { file } => cmd_ingest(&config, &user, &file).await,
        Command::Courses { action } => {
            let tracker = open_tracker(&config, &user).await?;
            match action {
                CoursesAction::List => cmd_courses_list(&tracker).await,
                CoursesAction::Add {
                    name,
                    instructor,
                    semester,
                } => cmd_courses_add(&tracker, name, instructor, semester).await,
                CoursesAction::Delete { id } => cmd_courses_delete(&tracker, &id).await,
            }
        }
        Command::Tasks { action } => {
            let tracker = open_tracker(&config, &user).await?;
            match action {
                TasksAction::List { course } => cmd_tasks_list(&tracker, course.as_deref()).await,
                TasksAction::Add {
                    course,
                    title,
                    due,
                    kind,
                    weight,
                } => {
                    let input = NewTask {
                        course_id: Some(course),
                        title: Some(title),
                        due_date: due,
                        kind,
                        weight,
                    };
                    cmd_tasks_add(&tracker, input).await
                }
                TasksAction::Delete { id, course } => {
                    cmd_tasks_delete(&tracker, &id, &course).await
                }
            }
        }
        Command::Insights { today, limit, json } => {
            let tracker = open_tracker(&config, &user).await?;
            let limit = limit.unwrap_or(config.defaults.upcoming_limit);
            cmd_insights(&tracker, today.as_deref(), limit, json).await
        }
        Command::Config { .. } => Ok(()),
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

/// Open the configured stores and wrap them in a [`Tracker`].
async fn open_tracker(config: &AppConfig, user: &str) -> Result<Tracker> {
    let storage = Storage::open(Path::new(&config.storage.database_path)).await?;
    let blobs = FsBlobStore::new(&config.storage.blob_dir);
    Ok(Tracker::new(Arc::new(storage), Arc::new(blobs)).with_default_user(user))
}

// ---------------------------------------------------------------------------
// serve / ingest
// ---------------------------------------------------------------------------

async fn cmd_serve(config: &AppConfig, user: &str, bind: Option<&str>) -> Result<()> {
    validate_api_key(config)?;
    let generator = Arc::new(ChatClient::from_config(&config.llm)?);

    let tracker = open_tracker(config, user).await?;
    tracker.blobs().ensure_container().await?;

    let worker = IngestWorker {
        store: tracker.store().clone(),
        blobs: tracker.blobs().clone(),
        generator,
        owner: user.to_string(),
    };
    let (trigger, _worker) = worker.spawn(INGEST_QUEUE_CAPACITY);
    let tracker = tracker.with_trigger(trigger);

    let addr = bind.unwrap_or(config.server.bind.as_str());
    info!(
        %addr,
        database = %config.storage.database_path,
        blobs = %config.storage.blob_dir,
        model = %config.llm.model,
        "starting server"
    );

    let router = build_router(AppState::new(tracker, config.defaults.upcoming_limit));
    serve(router, addr).await?;
    Ok(())
}

async fn cmd_ingest(config: &AppConfig, user: &str, file: &Path) -> Result<()> {
    validate_api_key(config)?;
    let generator = ChatClient::from_config(&config.llm)?;

    let bytes = std::fs::read(file).map_err(|e| eyre!("cannot read {}: {e}", file.display()))?;
    let file_name = file.file_name().map(|n| n.to_string_lossy().into_owned());

    let tracker = open_tracker(config, user).await?;
    let blob_name = tracker.store_document(&bytes, file_name.as_deref()).await?;
    info!(file = %file.display(), blob = %blob_name, "ingesting syllabus");

    let ctx = IngestContext {
        store: tracker.store().as_ref(),
        blobs: tracker.blobs().as_ref(),
        generator: &generator,
    };
    let reporter = CliProgress::new();
    let outcome = ingest_document(ctx, &blob_name, user, &reporter).await?;

    println!();
    match outcome {
        IngestOutcome::Ingested {
            course_id,
            tasks_written,
            tasks_failed,
        } => {
            println!("  Syllabus ingested!");
            println!("  Course: {course_id}");
            println!("  Tasks:  {tasks_written}");
            if tasks_failed > 0 {
                println!("  Failed: {tasks_failed}");
            }
            println!("  Blob:   {blob_name}");
        }
        IngestOutcome::NothingToIngest => {
            println!("  No text could be extracted from {}; nothing ingested.", file.display());
        }
        IngestOutcome::LowConfidence => {
            println!("  Could not confidently extract course info; nothing ingested.");
        }
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn task_written(&self, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Saving tasks [{current}/{total}]"));
    }

    fn done(&self, _outcome: &IngestOutcome) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// courses / tasks
// ---------------------------------------------------------------------------

async fn cmd_courses_list(tracker: &Tracker) -> Result<()> {
    let courses = tracker.list_courses(None).await?;
    if courses.is_empty() {
        println!("No courses for {}.", tracker.default_user());
        return Ok(());
    }

    for c in &courses {
        println!("{}  {}", c.id, c.name);
        let details: Vec<&str> = [c.instructor.as_deref(), c.semester.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !details.is_empty() {
            println!("    {}", details.join(" · "));
        }
    }
    Ok(())
}

async fn cmd_courses_add(
    tracker: &Tracker,
    name: String,
    instructor: Option<String>,
    semester: Option<String>,
) -> Result<()> {
    let course = tracker
        .create_course(NewCourse {
            user_id: None,
            course_name: Some(name),
            instructor,
            semester,
        })
        .await?;
    println!("Created course {} ({})", course.name, course.id);
    Ok(())
}

async fn cmd_courses_delete(tracker: &Tracker, id: &str) -> Result<()> {
    let report = tracker.delete_course_cascade(id, None).await?;
    if !report.course_deleted {
        println!("Course {id} was already gone.");
    }
    println!(
        "Deleted {} task(s){}",
        report.tasks_deleted,
        if report.tasks_failed > 0 {
            format!(", {} could not be deleted", report.tasks_failed)
        } else {
            String::new()
        }
    );
    Ok(())
}

async fn cmd_tasks_list(tracker: &Tracker, course: Option<&str>) -> Result<()> {
    let tasks = tracker.list_tasks(course).await?;
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }

    for t in &tasks {
        let kind = t.kind.as_deref().unwrap_or("-");
        let weight = t.weight.map(|w| format!("{w}")).unwrap_or_else(|| "-".into());
        println!(
            "{:<12} {:<10} {:>6}  {}  ({})",
            format_date_short(t.due_date.as_deref()),
            kind,
            weight,
            t.title,
            t.id
        );
    }
    Ok(())
}

async fn cmd_tasks_add(tracker: &Tracker, input: NewTask) -> Result<()> {
    let task = tracker.create_task(input).await?;
    println!("Created task {} ({})", task.title, task.id);
    Ok(())
}

async fn cmd_tasks_delete(tracker: &Tracker, id: &str, course: &str) -> Result<()> {
    if tracker.delete_task(id, Some(course)).await? {
        println!("Deleted task {id}");
    } else {
        println!("Task {id} was already gone.");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// insights
// ---------------------------------------------------------------------------

async fn cmd_insights(
    tracker: &Tracker,
    today: Option<&str>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let today: NaiveDate = match today {
        Some(raw) => parse_date_safe(Some(raw)).ok_or_else(|| eyre!("--today must be YYYY-MM-DD"))?,
        None => today_local(),
    };

    let view = tracker.insights(None, today, limit).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!();
    println!("  Insights for {} as of {}", tracker.default_user(), view.today);
    println!("  Courses:      {}", view.total_courses);
    println!("  Tasks:        {}", view.total_tasks);
    println!("  Overdue:      {}", view.kpis.overdue);
    println!("  Due in 7d:    {}", view.kpis.due_next_7);
    if view.orphaned_tasks > 0 {
        println!("  Orphaned:     {} (hidden)", view.orphaned_tasks);
    }

    println!();
    println!("  Tasks per course");
    for row in &view.tasks_per_course {
        println!("    {:>4}  {}", row.count, row.course_name);
    }

    println!();
    println!("  Tasks per type");
    for (kind, count) in &view.task_type_counts {
        println!("    {count:>4}  {kind}");
    }

    println!();
    println!("  Upcoming");
    if view.upcoming.is_empty() {
        println!("    nothing due");
    }
    for up in &view.upcoming {
        println!("    {:<8} {}  [{}] {}", up.due_label, up.title, up.kind, up.course_name);
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
