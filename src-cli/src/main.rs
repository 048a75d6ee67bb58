mod cli;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tokio::sync::broadcast::error::TryRecvError;

use packline::config::PacklineConfig;
use packline::db::upload_repo;
use packline::inbox::InboxOutcome;
use packline::sanitize::redact_path;
use packline::view::ViewFilter;
use packline::{
    telemetry, Actor, Category, Database, InboxWatcher, Ingestor, LineQuery, LocalView,
    MappingResolver, OrderLine, OrderSnapshot, OrderStore, PickOutcome, PickRequest,
    ReaderRegistry, Workflow,
};

use crate::cli::{Cli, Command, LinesArgs, MappingsAction};

const RESET_TOKEN: &str = "RESET";

struct App {
    config: PacklineConfig,
    db: Database,
    store: Arc<OrderStore>,
}

impl App {
    fn open(cli: &Cli) -> Result<Self> {
        let config = packline::load_config_or_default(&cli.config)
            .with_context(|| format!("loading config {}", cli.config.display()))?;
        telemetry::init(&config.logging)?;

        let db_path = cli
            .db
            .clone()
            .or_else(|| config.resolved_database_path())
            .context("no database path: pass --db or set database_path")?;
        let db = Database::open(&db_path)?;
        let store = Arc::new(OrderStore::new(db.clone(), config.snapshot_capacity)?);
        Ok(Self { config, db, store })
    }

    fn actor(&self, name: Option<String>) -> Result<Actor> {
        let name = name.unwrap_or_else(|| self.config.default_actor.clone());
        Ok(Actor::new(name)?)
    }

    fn workflow(&self) -> Workflow {
        Workflow::new(Arc::clone(&self.store), self.config.concurrency_guard)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let app = App::open(&cli)?;

    match cli.command {
        Command::Ingest {
            file,
            dry_run,
            json,
        } => {
            let ingestor = Ingestor::new(Arc::clone(&app.store));
            if dry_run {
                let preview = ingestor.preview_file(&file)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&preview)?);
                } else {
                    println!("{}", preview);
                }
            } else {
                let report = ingestor.ingest_file(&file)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    println!("{}", report);
                }
            }
        }
        Command::Lines(args) => list_lines(&app, &args)?,
        Command::Pick {
            line_id,
            quantity,
            actor,
        } => {
            let actor = app.actor(actor)?;
            let line = app.store.get(&line_id)?;
            let outcome = app
                .workflow()
                .pick(&PickRequest::for_line(&line, quantity), &actor)?;
            print_outcome(&outcome);
        }
        Command::Scan {
            code,
            role,
            quantity,
            actor,
        } => {
            let actor = app.actor(actor)?;
            let resolver = MappingResolver::new(app.db.clone())?;
            let mut view = LocalView::new(role.into());
            view.apply(&app.store.current());

            let found = view.match_scan(&code, &resolver.current())?;
            let quantity = quantity.unwrap_or(found.observed.quantity);
            let outcome = app
                .workflow()
                .pick(&found.pick_request(quantity), &actor)?;
            print_outcome(&outcome);
        }
        Command::Board { role, portal, json } => {
            let mut view = LocalView::new(role.into());
            view.apply(&app.store.current());
            print_board(&view, portal.as_deref(), json)?;
        }
        Command::Mappings { action } => {
            let resolver = MappingResolver::new(app.db.clone())?;
            match action {
                MappingsAction::Import { file } => {
                    let grid = ReaderRegistry::new().read_path(&file)?;
                    let written = resolver.import_mapping_grid(&redact_path(&file), &grid)?;
                    println!("Imported {} codes", written);
                }
                MappingsAction::Clear => {
                    let deleted = resolver.clear()?;
                    println!("Removed {} mappings", deleted);
                }
            }
        }
        Command::Uploads { limit } => {
            for upload in upload_repo::list_recent(&app.db, limit)? {
                println!(
                    "{}  {:<8} {:<32} rows {:>5}  written {:>5}  {}",
                    upload.uploaded_at,
                    upload.kind,
                    upload.file_name,
                    upload.row_count,
                    upload.line_count,
                    upload.id
                );
            }
        }
        Command::Reset { confirm } => {
            if confirm != RESET_TOKEN {
                bail!("refusing to reset: pass --confirm {}", RESET_TOKEN);
            }
            let deleted = app.store.reset()?;
            println!("Deleted {} order lines", deleted);
        }
        Command::Watch { inbox } => {
            let inbox = inbox.or_else(|| app.config.inbox.resolved_directory());
            watch(&app, inbox.as_deref())?;
        }
    }

    Ok(())
}

fn list_lines(app: &App, args: &LinesArgs) -> Result<()> {
    let query = LineQuery {
        category: args.category.map(Category::from),
        status: args.status.map(Into::into),
    };
    let lines = app.store.list(&query)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
        return Ok(());
    }
    for line in &lines {
        print_line(line);
    }
    println!("{} lines", lines.len());
    Ok(())
}

fn print_line(line: &OrderLine) {
    println!(
        "{}  {:<14} {:<12} {:<20} {:>6}  {:<14} {}",
        line.id,
        line.category.as_str(),
        line.display_portal(),
        line.sku,
        line.quantity,
        line.status,
        line.picked_by.as_deref().unwrap_or("-")
    );
}

fn print_outcome(outcome: &PickOutcome) {
    match outcome {
        PickOutcome::Transitioned { line } => {
            println!("Line moved to {}", line.status);
            print_line(line);
        }
        PickOutcome::Split { remaining, picked } => {
            println!("Line split");
            print_line(remaining);
            print_line(picked);
        }
    }
}

fn print_board(view: &LocalView, portal: Option<&str>, json: bool) -> Result<()> {
    let groups = view.portal_groups();
    let stats = view.master_sku_stats(portal);
    let filter = ViewFilter {
        portal: portal.map(str::to_string),
        ..ViewFilter::default()
    };
    let lines = view.display_lines(&filter);

    if json {
        let body = serde_json::json!({
            "role": view.role(),
            "version": view.version(),
            "portals": groups,
            "masterSkus": stats,
            "lines": lines,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("{} board", view.role());
    for group in &groups {
        println!("  {:<12} {:>4} lines {:>7} units", group.portal, group.lines, group.units);
    }
    for stat in &stats {
        println!("  {:<12} {:>7} open", stat.master_sku, stat.units);
    }
    for line in lines {
        print_line(line);
    }
    Ok(())
}

fn print_snapshot(snapshot: &OrderSnapshot) {
    println!(
        "v{}  {} lines  open FG {} / SFG {} / WIP {}",
        snapshot.version,
        snapshot.len(),
        snapshot.open_units(Category::FinishedGoods),
        snapshot.open_units(Category::SemiFinished),
        snapshot.open_units(Category::Wip)
    );
}

fn print_inbox_outcome(outcome: &InboxOutcome) {
    match outcome {
        InboxOutcome::Ingested { report, .. } => println!("{}", report),
        InboxOutcome::Failed { file, reason } => {
            eprintln!("{} rejected: {}", redact_path(file), reason)
        }
    }
}

fn watch(app: &App, inbox: Option<&Path>) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))?;

    let mut updates = app.store.subscribe();
    print_snapshot(&app.store.current());

    let inbox_thread = match inbox {
        Some(dir) => {
            let ingestor = Arc::new(Ingestor::new(Arc::clone(&app.store)));
            let watcher = InboxWatcher::new(
                dir,
                Duration::from_millis(app.config.inbox.debounce_ms),
                ingestor,
            );
            let stop = watcher.shutdown_handle();
            let handle = std::thread::spawn(move || watcher.watch(print_inbox_outcome));
            Some((stop, handle))
        }
        None => None,
    };

    while running.load(Ordering::SeqCst) {
        match updates.try_recv() {
            Ok(snapshot) => print_snapshot(&snapshot),
            Err(TryRecvError::Empty) => std::thread::sleep(Duration::from_millis(100)),
            Err(TryRecvError::Lagged(skipped)) => {
                log::warn!("Skipped {} snapshots", skipped);
            }
            Err(TryRecvError::Closed) => break,
        }
    }

    if let Some((stop, handle)) = inbox_thread {
        stop.store(true, Ordering::Relaxed);
        handle
            .join()
            .map_err(|_| anyhow!("inbox watcher panicked"))??;
    }
    Ok(())
}
