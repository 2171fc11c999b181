use std::fs;
use std::process::ExitCode;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use kindred::database::Database;
use kindred::engine::Engine;
use kindred::errlog::ErrorLog;
use kindred::error::{KindredError, Result};
use kindred::parse::FileLoader;
use kindred::persist::{PersistenceMode, Persistor};
use kindred::settings::Settings;

fn main() -> ExitCode {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "kindred failed");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &Settings) -> Result<()> {
    let mut log = ErrorLog::new();
    let loaded = load_database(settings, &mut log);
    if !log.is_empty() {
        eprint!("{}", log);
    }
    let mut db = loaded?;
    info!(name = db.name(), records = db.len(), persistent = db.is_persistent(), "database ready");

    let Some(script) = &settings.script else {
        warn!("no script configured, nothing to run");
        return Ok(());
    };
    let loader = FileLoader::new(&settings.script_path);
    let mut engine = Engine::new(&mut db);
    let outcome = engine.execute_program(script, &settings.entry, &loader);
    if !engine.log().is_empty() {
        eprint!("{}", engine.log());
    }
    print!("{}", outcome?.text());
    Ok(())
}

/// Opens the configured store, seeding it from the record file when it
/// holds nothing yet.
fn load_database(settings: &Settings, log: &mut ErrorLog) -> Result<Database> {
    let options = settings.validation();
    let mode = settings.persistence();
    let db = match &mode {
        PersistenceMode::File(_) => Database::open(&mode, options, log)?,
        PersistenceMode::InMemory => Database::new("memory").with_options(options),
    };
    let Some(path) = &settings.gedcom else {
        return Ok(db);
    };
    if !db.is_empty() {
        info!(path = %path, "store already populated, record file not read");
        return Ok(db);
    }
    let text = fs::read_to_string(path).map_err(|e| KindredError::Config(format!("cannot read {}: {}", path, e)))?;
    let mut loaded = Database::from_text(path, &text, options, log)
        .ok_or_else(|| KindredError::Structural(format!("{} has structural errors", path)))?;
    if db.is_persistent() {
        loaded.attach(Persistor::new(&mode)?)?;
    }
    Ok(loaded)
}
