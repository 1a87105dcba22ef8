//! `lgatlas` - CLI for the NSW local government area atlas
//!
//! This binary provides the command-line interface for fetching NSW open
//! data, inspecting the local store and producing choropleth dashboards.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, Write as _};

use clap::Parser;

use lgatlas::boundary::{self, normalize_name};
use lgatlas::cli::{
    CacheCommand, Cli, Command, ConfigCommand, ExportCommand, ExportFormat, FetchCommand,
    LocateCommand, OutputFormat, RankCommand, RenderCommand, ServeCommand, StatsCommand,
};
use lgatlas::stats::IndicatorSummary;
use lgatlas::{
    init_logging, server, sources, stats, Config, Dashboard, Error, FetchOptions, Indicator,
    Storage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Fetch(cmd) => handle_fetch(&config, &cmd).await,
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Stats(cmd) => handle_stats(&config, &cmd),
        Command::Rank(cmd) => handle_rank(&config, &cmd),
        Command::Locate(cmd) => handle_locate(&config, &cmd),
        Command::Render(cmd) => handle_render(&config, &cmd),
        Command::Serve(cmd) => handle_serve(&config, &cmd).await,
        Command::Export(cmd) => handle_export(&config, &cmd),
        Command::Cache(cmd) => handle_cache(&config, cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Storage> {
    Ok(Storage::open(config.database_path())?)
}

/// Pick the year to operate on, defaulting to the latest stored year.
fn resolve_year(storage: &Storage, requested: Option<i32>) -> anyhow::Result<i32> {
    let years = storage.years()?;
    match requested {
        Some(year) if years.contains(&year) => Ok(year),
        Some(year) => Err(Error::no_data(format!("observations for year {year}")).into()),
        None => Ok(years
            .last()
            .copied()
            .ok_or_else(|| Error::no_data("observations"))?),
    }
}

/// Normalize region names and check they all exist in the store.
fn resolve_regions(storage: &Storage, raw: &[String]) -> anyhow::Result<Option<Vec<String>>> {
    if raw.is_empty() {
        return Ok(None);
    }

    let mut names = Vec::with_capacity(raw.len());
    for name in raw {
        let normalized = normalize_name(name);
        if !storage.has_region(&normalized)? {
            return Err(Error::unknown_region(name).into());
        }
        names.push(normalized);
    }
    Ok(Some(names))
}

async fn handle_fetch(config: &Config, cmd: &FetchCommand) -> anyhow::Result<()> {
    let mut storage = open_storage(config)?;
    let options = FetchOptions {
        offline: cmd.offline,
        no_fallback: cmd.no_fallback,
        force: cmd.force,
        strict: cmd.strict,
    };
    let report = sources::fetch(config, &options, &mut storage).await?;

    println!("Fetched from {}", report.source);
    if report.boundary_cache_hit {
        println!("  Boundaries:   cached");
    } else {
        println!("  Boundaries:   {} regions", report.regions_fetched);
    }
    println!(
        "  Observations: {} fetched, {} kept, {} rejected",
        report.observations_fetched, report.observations_kept, report.observations_rejected
    );
    if report.snapshot_recorded {
        println!("  Snapshot:     recorded");
    } else {
        println!("  Snapshot:     unchanged since last fetch");
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let stats = storage.stats()?;

    if json {
        let status = serde_json::json!({
            "database_path": storage.path(),
            "db_size_bytes": stats.db_size_bytes,
            "regions": stats.regions,
            "observations": stats.observations,
            "snapshots": stats.snapshots,
            "first_year": stats.first_year,
            "last_year": stats.last_year,
            "last_fetch": stats.last_fetch.map(|when| when.to_rfc3339()),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("lgatlas status");
        println!("--------------");
        println!("Database:      {}", storage.path().display());
        println!("Size:          {}", format_size(stats.db_size_bytes));
        println!("Regions:       {}", stats.regions);
        println!("Observations:  {}", stats.observations);
        match (stats.first_year, stats.last_year) {
            (Some(first), Some(last)) if first != last => {
                println!("Years:         {first}-{last}");
            }
            (Some(first), _) => println!("Years:         {first}"),
            _ => println!("Years:         none"),
        }
        println!("Snapshots:     {}", stats.snapshots);
        match stats.last_fetch {
            Some(when) => println!("Last fetch:    {}", when.format("%Y-%m-%d %H:%M:%S UTC")),
            None => println!("Last fetch:    never"),
        }
    }
    Ok(())
}

fn handle_stats(config: &Config, cmd: &StatsCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let indicator = Indicator::from(cmd.indicator);
    let year = resolve_year(&storage, cmd.year)?;
    let regions = resolve_regions(&storage, &cmd.region)?;

    let observations = storage.observations(indicator, year, regions.as_deref())?;
    let summary = IndicatorSummary::from_observations(indicator, year, &observations)
        .ok_or_else(|| Error::no_data(format!("{indicator} observations for {year}")))?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{} ({year})", indicator.label());
        println!("  Regions: {}", summary.count);
        println!("  Mean:    {}", indicator.format_value(summary.mean));
        println!("  Median:  {}", indicator.format_value(summary.median));
        println!("  Min:     {}", indicator.format_value(summary.min));
        println!("  Max:     {}", indicator.format_value(summary.max));
    }
    Ok(())
}

fn handle_rank(config: &Config, cmd: &RankCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let indicator = Indicator::from(cmd.indicator);
    let year = resolve_year(&storage, cmd.year)?;

    let observations = storage.observations(indicator, year, None)?;
    if observations.is_empty() {
        return Err(Error::no_data(format!("{indicator} observations for {year}")).into());
    }
    let ranked = stats::rank(&observations, cmd.limit);

    match cmd.format {
        OutputFormat::Table => {
            println!("Top {} by {} ({year})", ranked.len(), indicator.label());
            let width = ranked
                .iter()
                .map(|observation| observation.region.len())
                .max()
                .unwrap_or(0);
            for (index, observation) in ranked.iter().enumerate() {
                println!(
                    "{:>4}. {:<width$}  {}",
                    index + 1,
                    observation.region,
                    indicator.format_value(observation.value),
                );
            }
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(io::stdout());
            writer.write_record(["rank", "region", "year", "value"])?;
            for (index, observation) in ranked.iter().enumerate() {
                writer.write_record([
                    (index + 1).to_string(),
                    observation.region.clone(),
                    observation.year.to_string(),
                    observation.value.to_string(),
                ])?;
            }
            writer.flush()?;
        }
        OutputFormat::Json => {
            let rows: Vec<_> = ranked
                .iter()
                .enumerate()
                .map(|(index, observation)| {
                    serde_json::json!({
                        "rank": index + 1,
                        "region": observation.region,
                        "year": observation.year,
                        "value": observation.value,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}

fn handle_locate(config: &Config, cmd: &LocateCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let boundaries = storage.boundaries()?;
    if boundaries.is_empty() {
        return Err(Error::no_data("region boundaries").into());
    }

    let Some(found) = boundary::locate(&boundaries, cmd.lat, cmd.lon) else {
        if cmd.json {
            println!("{}", serde_json::json!({ "region": null }));
        } else {
            println!("No region contains ({}, {})", cmd.lat, cmd.lon);
        }
        return Ok(());
    };

    // Locating works without observations; the profile is best-effort.
    let profile_year = match cmd.year {
        Some(year) => Some(year),
        None => storage.latest_year()?,
    };
    let profile = match profile_year {
        Some(year) => storage.region_profile(&found.name, year)?,
        None => Vec::new(),
    };

    if cmd.json {
        let mut values = serde_json::Map::new();
        for observation in &profile {
            values.insert(
                observation.indicator.as_str().to_string(),
                serde_json::json!(observation.value),
            );
        }
        let payload = serde_json::json!({
            "region": found.name,
            "year": profile_year,
            "values": values,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("({}, {}) is in {}", cmd.lat, cmd.lon, found.name);
        if let Some(year) = profile_year {
            if profile.is_empty() {
                println!("  No observations for {year}");
            } else {
                for observation in &profile {
                    let label = format!("{}:", observation.indicator.label());
                    println!(
                        "  {label:<20} {}",
                        observation.indicator.format_value(observation.value)
                    );
                }
            }
        }
    }
    Ok(())
}

fn handle_render(config: &Config, cmd: &RenderCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;

    let mut render_config = config.clone();
    if let Some(title) = &cmd.title {
        render_config.dashboard.title = title.clone();
    }

    let regions = if cmd.region.is_empty() {
        None
    } else {
        Some(cmd.region.as_slice())
    };
    let dashboard = Dashboard::build(&storage, &render_config, cmd.year, regions)?;
    let indicator = cmd
        .indicator
        .map_or_else(|| render_config.default_indicator(), Indicator::from);

    let html = dashboard.render(&render_config, indicator)?;
    std::fs::write(&cmd.output, html)?;
    println!(
        "Wrote dashboard for {} to {}",
        dashboard.year(),
        cmd.output.display()
    );
    Ok(())
}

async fn handle_serve(config: &Config, cmd: &ServeCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    server::serve(config, &storage, &cmd.host, cmd.port, cmd.year).await?;
    Ok(())
}

fn handle_export(config: &Config, cmd: &ExportCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let year = resolve_year(&storage, cmd.year)?;

    match cmd.format {
        ExportFormat::Geojson => {
            let dashboard = Dashboard::build(&storage, config, Some(year), None)?;
            let body = dashboard.feature_collection_json();
            match &cmd.output {
                Some(path) => std::fs::write(path, body)?,
                None => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(body.as_bytes())?;
                    stdout.write_all(b"\n")?;
                }
            }
        }
        ExportFormat::Csv => match &cmd.output {
            Some(path) => write_observation_table(&storage, year, csv::Writer::from_path(path)?)?,
            None => write_observation_table(&storage, year, csv::Writer::from_writer(io::stdout()))?,
        },
    }

    if let Some(path) = &cmd.output {
        println!("Exported {year} data to {}", path.display());
    }
    Ok(())
}

/// Write one row per region with a column per indicator.
///
/// Missing values become empty cells so the table keeps its shape.
fn write_observation_table<W: io::Write>(
    storage: &Storage,
    year: i32,
    mut writer: csv::Writer<W>,
) -> anyhow::Result<()> {
    let mut header = vec!["region".to_string(), "year".to_string()];
    header.extend(Indicator::ALL.iter().map(|ind| ind.as_str().to_string()));
    writer.write_record(&header)?;

    for name in storage.region_names()? {
        let profile = storage.region_profile(&name, year)?;
        let mut record = vec![name, year.to_string()];
        for indicator in Indicator::ALL {
            let value = profile
                .iter()
                .find(|observation| observation.indicator == indicator)
                .map(|observation| observation.value);
            record.push(value.map_or_else(String::new, |value| value.to_string()));
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn handle_cache(config: &Config, cmd: CacheCommand) -> anyhow::Result<()> {
    match cmd {
        CacheCommand::Stats { json } => {
            let storage = open_storage(config)?;
            let stats = storage.stats()?;
            if json {
                let payload = serde_json::json!({
                    "database_path": storage.path(),
                    "db_size_bytes": stats.db_size_bytes,
                    "regions": stats.regions,
                    "observations": stats.observations,
                    "snapshots": stats.snapshots,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Store statistics");
                println!("----------------");
                println!("Database:      {}", storage.path().display());
                println!("Size:          {}", format_size(stats.db_size_bytes));
                println!("Regions:       {}", stats.regions);
                println!("Observations:  {}", stats.observations);
                println!("Snapshots:     {}", stats.snapshots);
            }
        }
        CacheCommand::Clear { yes } => {
            if !yes {
                println!("This will delete all stored boundaries, observations and snapshots.");
                println!("Use --yes to confirm.");
                return Ok(());
            }
            let storage = open_storage(config)?;
            storage.clear()?;
            println!("Store cleared.");
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Sources]");
                println!("  Boundary URL:       {}", config.sources.boundary_url);
                println!(
                    "  Name property:      {}",
                    config.sources.boundary_name_property
                );
                println!("  CKAN base URL:      {}", config.sources.ckan_base_url);
                println!("  Crime dataset:      {}", config.sources.crime_dataset_id);
                println!(
                    "  Indicator CSV:      {}",
                    config
                        .sources
                        .indicator_csv_url
                        .as_deref()
                        .unwrap_or("(resolved via CKAN)")
                );
                println!(
                    "  API key:            {}",
                    if config.sources.api_key.is_some() {
                        "set"
                    } else {
                        "not set"
                    }
                );
                println!("  Timeout (secs):     {}", config.sources.timeout_secs);
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Keep snapshots:     {}", config.storage.keep_snapshots);
                println!();
                println!("[Map]");
                println!(
                    "  Center:             {}, {}",
                    config.map.center_lat, config.map.center_lon
                );
                println!("  Zoom:               {}", config.map.zoom);
                println!("  Simplify tolerance: {}", config.map.simplify_tolerance);
                println!("  Ramp colors:        {}", config.map.color_ramp.len());
                println!();
                println!("[Dashboard]");
                println!("  Title:              {}", config.dashboard.title);
                println!("  Table limit:        {}", config.dashboard.table_limit);
                println!(
                    "  Default indicator:  {}",
                    config.dashboard.default_indicator
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

/// Render a byte count with a binary unit suffix.
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
