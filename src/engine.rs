//! Script execution against a database: parse, check, run.

use tracing::{info, warn};

use crate::database::Database;
use crate::errlog::{DiagnosticKind, ErrorLog};
use crate::error::{KindredError, Result};
use crate::interp::{run_program, Output};
use crate::parse::{parse_program, MemoryLoader, ScriptLoader};

/// Name under which [`Engine::execute`] registers an inline script.
pub const INLINE_SCRIPT: &str = "<script>";

pub struct Engine<'db> {
    database: &'db mut Database,
    log: ErrorLog,
}

impl<'db> Engine<'db> {
    pub fn new(database: &'db mut Database) -> Self {
        Self { database, log: ErrorLog::new() }
    }

    /// Diagnostics of every script executed so far.
    pub fn log(&self) -> &ErrorLog {
        &self.log
    }
    pub fn database(&self) -> &Database {
        self.database
    }

    /// Parses `script` as a single file and runs its `main` procedure.
    pub fn execute(&mut self, script: &str) -> Result<Output> {
        let loader = MemoryLoader::new().with(INLINE_SCRIPT, script);
        self.execute_program(INLINE_SCRIPT, "main", &loader)
    }

    /// Parses `file` (and whatever it includes) through `loader`, then runs
    /// procedure `entry`. Nothing runs if parsing reported anything.
    pub fn execute_program(&mut self, file: &str, entry: &str, loader: &dyn ScriptLoader) -> Result<Output> {
        let before = self.log.len();
        let Some(program) = parse_program(file, loader, &mut self.log) else {
            let first = self.log.iter().skip(before).find(|d| d.kind == DiagnosticKind::Syntax);
            let errors = self.log.len() - before;
            warn!(file, errors, "script rejected");
            return Err(KindredError::Parse {
                message: first.map(|d| d.message.clone()).unwrap_or_else(|| format!("cannot parse {}", file)),
                line: first.and_then(|d| d.line),
                col: None,
            });
        };
        info!(file, files = program.files().len(), "script parsed");
        match run_program(&program, self.database, entry, &mut self.log) {
            Some(output) => Ok(output),
            None => {
                let message = self
                    .log
                    .iter()
                    .skip(before)
                    .rfind(|d| d.kind == DiagnosticKind::Runtime)
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| format!("{} failed", entry));
                Err(KindredError::Execution(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_script_runs_main() {
        let mut db = Database::new("engine");
        let mut engine = Engine::new(&mut db);
        let output = engine.execute("proc main() { print(\"hi\") }").expect("script runs");
        assert_eq!(output.text(), "hi");
        assert!(engine.log().is_empty());
    }

    #[test]
    fn syntax_error_carries_line() {
        let mut db = Database::new("engine");
        let mut engine = Engine::new(&mut db);
        match engine.execute("\nproc main() { x := }") {
            Err(KindredError::Parse { line, .. }) => assert_eq!(line, Some(2)),
            other => panic!("expected parse error, got {:?}", other.map(|o| o.text())),
        }
    }

    #[test]
    fn missing_entry_is_an_execution_error() {
        let mut db = Database::new("engine");
        let mut engine = Engine::new(&mut db);
        let result = engine.execute("proc other() { }");
        assert!(matches!(result, Err(KindredError::Execution(_))));
        assert_eq!(engine.log().count(DiagnosticKind::Runtime), 1);
    }
}
