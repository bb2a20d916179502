// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use water_management::report::{format_amount, VOLUME_UNIT};
use water_management::{
    build_chart, export_to_path, init_tracing, Chart, ChartKind, DateRange, DetailFilter,
    EntryForm, EntryWorkflow, LogTarget, Overview, Reading, ReadingStore, Settings,
    DEFAULT_EXPORT_FILE,
};

/// Water meter readings, billing and reports
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML config file (defaults to ./water.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file, overrides the configured path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive terminal UI (default)
    Ui,
    /// Record one meter reading
    Add {
        /// House number, e.g. H-123
        #[arg(long)]
        house: String,
        /// Water meter reading in m³
        #[arg(long)]
        meter: f64,
    },
    /// Key metrics and the most recent entries
    Overview {
        #[arg(long)]
        json: bool,
    },
    /// Usage and revenue charts: bar, pie or line
    Chart {
        #[arg(default_value = "bar")]
        kind: ChartKind,
        #[arg(long)]
        json: bool,
    },
    /// Filtered readings, newest first
    List(FilterArgs),
    /// Write readings to CSV
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Export the whole table instead of the filtered view
        #[arg(long)]
        all: bool,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Delete every reading
    Clear {
        /// Required; there is no undo
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Case-insensitive part of the house number
    #[arg(short, long, default_value = "")]
    search: String,
    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl FilterArgs {
    /// Missing bounds default to the observed span of the data
    fn to_filter(&self, readings: &[Reading], today: NaiveDate) -> DetailFilter {
        let range = match (self.from, self.to) {
            (None, None) => None,
            (from, to) => {
                let observed = DateRange::observed(readings, today);
                Some(DateRange::new(
                    from.unwrap_or(observed.start),
                    to.unwrap_or(observed.end),
                ))
            }
        };

        DetailFilter {
            search: self.search.clone(),
            range,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    dotenvy::dotenv().ok();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    let command = cli.command.unwrap_or(Command::Ui);
    let target = if matches!(command, Command::Ui) {
        LogTarget::Interactive
    } else {
        LogTarget::Stderr
    };
    init_tracing(&settings, target)?;

    info!(
        db_path = %settings.db_path.display(),
        unit_rate = settings.unit_rate,
        "starting water management"
    );

    let store = ReadingStore::open(&settings.db_path)?;

    match command {
        Command::Ui => run_ui_mode(&store, &settings),
        Command::Add { house, meter } => run_add(&store, &settings, house, meter),
        Command::Overview { json } => run_overview(&store, &settings, json),
        Command::Chart { kind, json } => run_chart(&store, &settings, kind, json),
        Command::List(filter) => run_list(&store, &settings, &filter),
        Command::Export { output, all, filter } => run_export(&store, output, all, &filter),
        Command::Clear { yes } => run_clear(&store, yes),
    }
}

fn run_add(store: &ReadingStore, settings: &Settings, house: String, meter: f64) -> Result<()> {
    let workflow = EntryWorkflow::new(settings.unit_rate);

    match workflow.submit(store, &EntryForm::new(house, meter)) {
        Ok(submitted) => {
            println!("✅ Data successfully added!");
            println!("   House Number: {}", submitted.house_number);
            println!("   Water Meter:  {} {}", format_amount(submitted.water_meter), VOLUME_UNIT);
            println!("   Price:        {} {}", format_amount(submitted.price), settings.currency);
            println!("   Date:         {}", submitted.date);
            Ok(())
        }
        Err(e) => bail!(e),
    }
}

fn run_overview(store: &ReadingStore, settings: &Settings, json: bool) -> Result<()> {
    let readings = store.read_all()?;
    let overview = Overview::from_readings(&readings);

    if json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
        return Ok(());
    }

    let overview = match overview {
        Some(o) => o,
        None => {
            println!("ℹ️  No data available yet. Please add data using the Form page.");
            return Ok(());
        }
    };

    println!("💧 Water Management Dashboard");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("\nKey Metrics");
    for (i, metric) in overview.metrics(&settings.currency).iter().enumerate() {
        if i == 3 {
            println!("\nFinancial Summary");
        }
        println!("  {:<20} {} {}", metric.label, metric.value, metric.unit);
    }

    println!("\nRecent Entries");
    print_readings(&overview.recent, &settings.currency);

    Ok(())
}

fn run_chart(store: &ReadingStore, settings: &Settings, kind: ChartKind, json: bool) -> Result<()> {
    let readings = store.read_all()?;
    let chart = build_chart(kind, &readings);

    if json {
        println!("{}", serde_json::to_string_pretty(&chart)?);
        return Ok(());
    }
    if readings.is_empty() {
        println!("ℹ️  No data available yet. Please add data using the Form page.");
        return Ok(());
    }

    println!("📈 {}", kind.title());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    match chart {
        Chart::Bar(totals) => {
            let max_usage = totals.iter().map(|t| t.usage).fold(0.0_f64, f64::max);
            let max_revenue = totals.iter().map(|t| t.revenue).fold(0.0_f64, f64::max);

            println!("\nWater Usage by House ({})", VOLUME_UNIT);
            for t in &totals {
                println!(
                    "  {:<16} {:>10}  {}",
                    t.house_number,
                    format_amount(t.usage),
                    text_bar(t.usage, max_usage)
                );
            }
            println!("\nRevenue by House ({})", settings.currency);
            for t in &totals {
                println!(
                    "  {:<16} {:>10}  {}",
                    t.house_number,
                    format_amount(t.revenue),
                    text_bar(t.revenue, max_revenue)
                );
            }
        }
        Chart::Pie(shares) => {
            println!("\nWater Usage Distribution");
            for s in &shares {
                println!(
                    "  {:<16} {:>6.1}%  {}",
                    s.house_number,
                    s.percent,
                    text_bar(s.percent, 100.0)
                );
            }
        }
        Chart::Line(series) => {
            println!("\nWater Usage Over Time ({})", VOLUME_UNIT);
            for s in &series {
                println!("  {}", s.house_number);
                for (day, usage) in &s.points {
                    println!("    {}  {:>10}", day, format_amount(*usage));
                }
            }
        }
    }

    Ok(())
}

fn run_list(store: &ReadingStore, settings: &Settings, filter: &FilterArgs) -> Result<()> {
    let readings = store.read_all()?;
    if readings.is_empty() {
        println!("ℹ️  No data available yet.");
        return Ok(());
    }

    let today = Local::now().date_naive();
    let view = filter.to_filter(&readings, today).apply(&readings, today);

    println!(
        "📋 {} rows  |  {} → {}",
        view.rows.len(),
        view.range.start,
        view.range.end
    );
    print_readings(&view.rows, &settings.currency);

    Ok(())
}

fn run_export(
    store: &ReadingStore,
    output: Option<PathBuf>,
    all: bool,
    filter: &FilterArgs,
) -> Result<()> {
    let readings = store.read_all()?;
    let rows = if all {
        readings
    } else {
        let today = Local::now().date_naive();
        filter.to_filter(&readings, today).apply(&readings, today).rows
    };

    if rows.is_empty() {
        println!("ℹ️  Nothing to export.");
        return Ok(());
    }

    let path = output.unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_FILE));
    export_to_path(&rows, &path)?;
    println!("📥 Exported {} rows to {}", rows.len(), path.display());

    Ok(())
}

fn run_clear(store: &ReadingStore, yes: bool) -> Result<()> {
    if !yes {
        println!("⚠️  This deletes every reading. Re-run with --yes to confirm.");
        return Ok(());
    }

    if !store.clear_all() {
        bail!("Failed to clear data");
    }

    println!("✅ All data has been cleared!");
    Ok(())
}

fn print_readings(rows: &[Reading], currency: &str) {
    println!(
        "  {:<16} {:>16} {:>16}  {}",
        "House Number",
        format!("Water Meter ({})", VOLUME_UNIT),
        format!("Price ({})", currency),
        "Date"
    );
    for r in rows {
        println!(
            "  {:<16} {:>16} {:>16}  {}",
            r.house_number,
            format_amount(r.water_meter),
            format_amount(r.price),
            r.date
        );
    }
}

fn text_bar(value: f64, max: f64) -> String {
    if max <= 0.0 {
        return String::new();
    }
    "█".repeat(((value / max) * 30.0).round() as usize)
}

#[cfg(feature = "tui")]
fn run_ui_mode(store: &ReadingStore, settings: &Settings) -> Result<()> {
    let mut app = ui::App::new(store, settings);
    ui::run_ui(&mut app).context("Terminal UI failed")?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_store: &ReadingStore, _settings: &Settings) -> Result<()> {
    bail!(
        "TUI mode not available. Rebuild with `cargo build --features tui` \
         or use the subcommands: add, overview, chart, list, export, clear"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(id: i64, date: &str) -> Reading {
        Reading {
            id,
            house_number: "H-1".to_string(),
            water_meter: 1.0,
            date: date.to_string(),
            price: 4.5,
        }
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli =
            Cli::try_parse_from(["water-management", "--db", "x.db", "chart", "pie"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        assert!(matches!(cli.command, Some(Command::Chart { kind: ChartKind::Pie, json: false })));

        let cli = Cli::try_parse_from(["water-management"]).unwrap();
        assert!(cli.command.is_none());

        assert!(Cli::try_parse_from(["water-management", "chart", "scatter"]).is_err());
    }

    #[test]
    fn test_filter_args_fill_missing_bound() {
        let readings = vec![reading(1, "2024-01-01 08:00:00"), reading(2, "2024-01-09 08:00:00")];
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let args = FilterArgs {
            search: String::new(),
            from: NaiveDate::from_ymd_opt(2024, 1, 5),
            to: None,
        };
        let range = args.to_filter(&readings, today).range.unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());

        assert!(FilterArgs::default().to_filter(&readings, today).range.is_none());
    }

    #[test]
    fn test_export_all_writes_whole_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReadingStore::open_in_memory().unwrap();
        store.insert("H-1", 2.0, "2024-01-01 08:00:00", 9.0);
        store.insert("H-2", 3.0, "not a date", 13.5);

        let all_path = dir.path().join("all.csv");
        run_export(&store, Some(all_path.clone()), true, &FilterArgs::default()).unwrap();
        let exported = water_management::load_csv(&all_path).unwrap();
        assert_eq!(exported, store.read_all().unwrap());

        // The filtered view skips rows without a usable date
        let view_path = dir.path().join("view.csv");
        run_export(&store, Some(view_path.clone()), false, &FilterArgs::default()).unwrap();
        assert_eq!(water_management::load_csv(&view_path).unwrap().len(), 1);
    }

    #[test]
    fn test_clear_requires_confirmation() {
        let store = ReadingStore::open_in_memory().unwrap();
        store.insert("H-1", 2.0, "2024-01-01 08:00:00", 9.0);

        run_clear(&store, false).unwrap();
        assert_eq!(store.count().unwrap(), 1);

        run_clear(&store, true).unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_add_rejects_empty_house_with_error() {
        let store = ReadingStore::open_in_memory().unwrap();
        let err = run_add(&store, &Settings::default(), "  ".to_string(), 1.0).unwrap_err();

        assert_eq!(err.to_string(), "Please enter a house number");
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_text_bar() {
        assert_eq!(text_bar(5.0, 10.0).chars().count(), 15);
        assert!(text_bar(1.0, 0.0).is_empty());
    }
}
