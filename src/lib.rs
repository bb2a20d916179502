// Water Management System - Core Library
// Storage, entry workflow and reports shared by the CLI, the TUI and tests

pub mod config;
pub mod db;
pub mod entry;
pub mod export;
pub mod logging;
pub mod report;

// Re-export commonly used types
pub use config::Settings;
pub use db::{
    Reading, ReadingStore, DATE_FORMAT,
    setup_database, insert_reading, get_all_readings, clear_readings, verify_count,
};
pub use entry::{EntryError, EntryForm, EntryWorkflow, Submitted};
pub use export::{
    export_csv_bytes, export_to_path, load_csv, read_csv, write_csv, DEFAULT_EXPORT_FILE,
};
pub use logging::{init_tracing, LogTarget};
pub use report::{
    build_chart, house_totals, usage_series, usage_shares,
    Chart, ChartKind, ColumnMaxima, DateRange, DetailFilter, DetailedView,
    HouseTotal, Metric, Overview, UsageSeries, UsageShare,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
