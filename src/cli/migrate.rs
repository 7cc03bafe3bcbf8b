//! `tasknest migrate`: convert the legacy project/task tables into a snapshot.

use crate::db::Database;
use crate::format::{OutputFormat, format_migration_text, to_json};
use crate::migration::{MigrationOptions, migrate_legacy};
use anyhow::Result;
use clap::Args;
use std::io::{BufRead, Write};

/// Arguments for the migrate command.
#[derive(Args, Debug, Default)]
pub struct MigrateArgs {
    /// Migrate without prompting when snapshots already exist.
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Show what would be migrated without writing a snapshot.
    #[arg(long)]
    pub dry_run: bool,
}

/// Ask whether to add another snapshot next to `existing` ones.
///
/// Anything other than `y`/`yes` declines.
pub fn prompt_confirm<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    existing: i64,
) -> Result<bool> {
    writeln!(
        output,
        "{} snapshot(s) already exist. Migrating again adds another one.",
        existing
    )?;
    write!(output, "Continue? [y/N] ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let answer = answer.trim();
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

/// Run the migration, prompting on stdin unless `--yes` or `--dry-run`.
pub fn run_migrate(db: &Database, args: &MigrateArgs, format: OutputFormat) -> Result<String> {
    let options = MigrationOptions {
        dry_run: args.dry_run,
    };
    let skip_prompt = args.yes || args.dry_run;
    let outcome = migrate_legacy(db, options, |existing| {
        if skip_prompt {
            return Ok(true);
        }
        prompt_confirm(std::io::stdin().lock(), std::io::stdout(), existing)
    })?;

    Ok(match format {
        OutputFormat::Json => to_json(&outcome)?,
        OutputFormat::Text => format_migration_text(&outcome),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SnapshotStore;
    use std::io::Cursor;

    #[test]
    fn test_prompt_accepts_yes() {
        let mut out = Vec::new();
        assert!(prompt_confirm(Cursor::new("y\n"), &mut out, 2).unwrap());
        assert!(prompt_confirm(Cursor::new("YES\n"), Vec::new(), 2).unwrap());
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("2 snapshot(s) already exist"));
        assert!(shown.ends_with("Continue? [y/N] "));
    }

    #[test]
    fn test_prompt_declines_by_default() {
        assert!(!prompt_confirm(Cursor::new("\n"), Vec::new(), 1).unwrap());
        assert!(!prompt_confirm(Cursor::new("nope\n"), Vec::new(), 1).unwrap());
        assert!(!prompt_confirm(Cursor::new(""), Vec::new(), 1).unwrap());
    }

    #[test]
    fn test_run_migrate_with_yes_skips_prompt() {
        let db = Database::open_in_memory().unwrap();
        db.create_snapshot("existing", None, &[]).unwrap();

        let args = MigrateArgs {
            yes: true,
            dry_run: false,
        };
        let text = run_migrate(&db, &args, OutputFormat::Text).unwrap();
        assert!(text.contains("No projects found in legacy tables."));
        assert_eq!(db.snapshot_count().unwrap(), 2);
    }

    #[test]
    fn test_run_migrate_dry_run_json() {
        let db = Database::open_in_memory().unwrap();
        let args = MigrateArgs {
            yes: false,
            dry_run: true,
        };
        let json = run_migrate(&db, &args, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["outcome"], "completed");
        assert!(value["snapshot"].is_null());
        assert_eq!(db.snapshot_count().unwrap(), 0);
    }
}
