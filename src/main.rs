use clap::{Parser, Subcommand};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password, Select};
use screencheck::config::{self, Config};
use screencheck::{ControlKind, Database, Error, FormSession, Table, User};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "screencheck")]
#[command(author, version, about = "Record smartphone screen inspections and defects")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// SQLite database file (created if missing)
    #[arg(long, env = "SCREENCHECK_DB", default_value = config::DEFAULT_DB_PATH, global = true)]
    db: PathBuf,

    /// Username (prompted for when missing)
    #[arg(short, long, env = "SCREENCHECK_USER", global = true)]
    username: Option<String>,

    /// Password (prompted for when missing)
    #[arg(short, long, env = "SCREENCHECK_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Enforce foreign key references
    #[arg(long, global = true)]
    foreign_keys: bool,

    /// Log every statement
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database file, its tables and the default admin
    Init,

    /// Check credentials and show the dashboard
    Login,

    /// List the tables you can open
    Tables,

    /// Show the columns and form fields of a table
    Describe {
        table: Table,
    },

    /// Print every record of a table
    List {
        table: Table,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print one record
    Show {
        table: Table,
        id: i64,
    },

    /// Add a record (prompts for each field unless --set is given)
    Add {
        table: Table,

        /// Field value as column=value; repeatable
        #[arg(short, long = "set", value_name = "COLUMN=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },

    /// Edit a record (prompts for each field unless --set is given)
    Edit {
        table: Table,
        id: i64,

        /// Field value as column=value; repeatable
        #[arg(short, long = "set", value_name = "COLUMN=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },

    /// Delete a record
    Delete {
        table: Table,
        id: i64,

        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show statistics (breakdowns are admin-only)
    Stats {
        /// Include defects per type and smartphones per manufacturer
        #[arg(long)]
        detailed: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a backup of the database
    Backup {
        /// Output path for backup (default: screencheck_backup_<timestamp>.db)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Parse a `--set` argument of the form `COLUMN=VALUE`
fn parse_assignment(arg: &str) -> std::result::Result<(String, String), String> {
    match arg.split_once('=') {
        Some((column, value)) if !column.trim().is_empty() => {
            Ok((column.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected COLUMN=VALUE, got '{}'", arg)),
    }
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("\x1b[31mError:\x1b[0m {}", e);
        std::process::exit(1);
    }
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose { "screencheck=debug" } else { "screencheck=info" }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(args: Args) -> screencheck::Result<()> {
    let config = Config::at(&args.db).with_foreign_keys(args.foreign_keys);
    let mut db = Database::connect(&config)?;

    if let Command::Init = args.command {
        println!("Database ready: {}", db.path().display());
        return Ok(());
    }

    let user = login(&db, args.username, args.password)?;

    match args.command {
        Command::Init => Ok(()),

        Command::Login => {
            println!("Welcome, {}! (role: {})", user.display_name(), user.role());
            print_summary(&db)
        }

        Command::Tables => {
            for table in Table::ALL.into_iter().filter(|t| can_open(&user, *t)) {
                println!("{}", table);
            }
            Ok(())
        }

        Command::Describe { table } => {
            require_access(&user, table)?;
            let columns = db.describe(table.name())?;
            println!("{:<16} {:<10} {:<9} {:<4} {}", "COLUMN", "TYPE", "NOT NULL", "PK", "FIELD");
            println!("{}", "-".repeat(70));
            for c in columns {
                let field = if screencheck::forms::is_auto_timestamp(&c.name) {
                    "(automatic)".to_string()
                } else {
                    screencheck::forms::map(table, &c.name).to_string()
                };
                println!(
                    "{:<16} {:<10} {:<9} {:<4} {}",
                    c.name,
                    c.declared_type,
                    if c.not_null { "yes" } else { "" },
                    if c.is_primary_key { "yes" } else { "" },
                    field
                );
            }
            Ok(())
        }

        Command::List { table, json } => {
            require_access(&user, table)?;
            let records = db.list(table)?;
            if json {
                match serde_json::to_string_pretty(&records) {
                    Ok(json) => println!("{}", json),
                    Err(e) => eprintln!("Error serializing records: {}", e),
                }
            } else if records.is_empty() {
                println!("No records in {}.", table);
            } else {
                let header: Vec<&str> = records[0].columns().collect();
                println!("{}", header.iter().map(|c| format!("{:<16}", truncate(c, 16))).collect::<String>());
                println!("{}", "-".repeat(16 * header.len()));
                for r in &records {
                    println!("{}", r.iter().map(|(_, v)| format!("{:<16}", truncate(v, 16))).collect::<String>());
                }
            }
            Ok(())
        }

        Command::Show { table, id } => {
            require_access(&user, table)?;
            let record = db.load(table, id)?;
            for (column, value) in record.iter() {
                println!("{:<16} {}", column, value);
            }
            Ok(())
        }

        Command::Add { table, set } => {
            require_access(&user, table)?;
            let form = FormSession::open_add(&mut db, table)?;
            let id = fill_and_save(form, &set)?;
            println!("Created {} record {}", table, id);
            Ok(())
        }

        Command::Edit { table, id, set } => {
            require_access(&user, table)?;
            let form = FormSession::open_edit(&mut db, table, id)?;
            fill_and_save(form, &set)?;
            println!("Updated {} record {}", table, id);
            Ok(())
        }

        Command::Delete { table, id, yes } => {
            require_access(&user, table)?;
            // make sure it exists before asking
            db.load(table, id)?;
            if !yes && !confirm(&format!("Delete {} record {}?", table, id))? {
                println!("Cancelled.");
                return Ok(());
            }
            db.delete(table, id)?;
            println!("Deleted {} record {}", table, id);
            Ok(())
        }

        Command::Stats { detailed, json } => {
            if detailed && !user.role().is_admin() {
                return Err(Error::PermissionDenied("detailed statistics are admin-only".to_string()));
            }
            let summary = db.get_summary()?;
            let breakdown = if detailed { Some(db.get_breakdown()?) } else { None };

            if json {
                let value = serde_json::json!({ "summary": summary, "breakdown": breakdown });
                match serde_json::to_string_pretty(&value) {
                    Ok(json) => println!("{}", json),
                    Err(e) => eprintln!("Error serializing statistics: {}", e),
                }
                return Ok(());
            }

            print_summary(&db)?;
            if let Some(b) = breakdown {
                println!("\n\x1b[1mDefects by type:\x1b[0m");
                for (kind, n) in &b.defects_by_type {
                    println!("  {:<16} {}", kind, n);
                }
                println!("\n\x1b[1mSmartphones by manufacturer:\x1b[0m");
                for (maker, n) in &b.smartphones_by_manufacturer {
                    println!("  {:<16} {}", maker, n);
                }
            }
            Ok(())
        }

        Command::Backup { output } => {
            if !user.role().is_admin() {
                return Err(Error::PermissionDenied("backups are admin-only".to_string()));
            }
            let (path, bytes) = db.backup(output)?;
            println!("Backup created: {} ({} bytes)", path.display(), bytes);
            Ok(())
        }
    }
}

// ============================================================================
// Login & access
// ============================================================================

fn login(db: &Database, username: Option<String>, password: Option<String>) -> screencheck::Result<User> {
    let username = match username {
        Some(u) => u,
        None => Input::<String>::with_theme(&theme())
            .with_prompt("Username")
            .interact_text()
            .map_err(|dialoguer::Error::IO(e)| e)?,
    };
    let password = match password {
        Some(p) => p,
        None => Password::with_theme(&theme())
            .with_prompt("Password")
            .interact()
            .map_err(|dialoguer::Error::IO(e)| e)?,
    };
    if username.is_empty() || password.is_empty() {
        return Err(Error::Authentication);
    }
    db.authenticate(&username, &password)?
        .ok_or(Error::Authentication)
}

fn can_open(user: &User, table: Table) -> bool {
    !table.is_admin_only() || user.role().is_admin()
}

fn require_access(user: &User, table: Table) -> screencheck::Result<()> {
    if can_open(user, table) {
        Ok(())
    } else {
        Err(Error::PermissionDenied(format!("table '{}' is admin-only", table)))
    }
}

fn print_summary(db: &Database) -> screencheck::Result<()> {
    let s = db.get_summary()?;
    println!("\x1b[1mStatistics:\x1b[0m");
    println!("  Smartphones:        {}", s.smartphones);
    println!("  Inspections:        {}", s.inspections);
    println!("  Defects found:      {}", s.defects);
    println!("  Inspections today:  {}", s.inspections_today);
    Ok(())
}

// ============================================================================
// Form filling
// ============================================================================

/// Apply `--set` pairs, or prompt for every field when there are none, then
/// save. A rejected interactive save re-prompts for the missing field.
fn fill_and_save(mut form: FormSession<'_>, set: &[(String, String)]) -> screencheck::Result<i64> {
    if !set.is_empty() {
        for (column, value) in set {
            form.set(column, value.as_str())?;
        }
        return form.save();
    }

    let editable: Vec<(String, ControlKind, bool)> = form
        .bindings()
        .iter()
        .filter(|b| !b.read_only)
        .map(|b| (b.name().to_string(), b.kind, b.column.is_required()))
        .collect();
    for (name, kind, required) in &editable {
        prompt_field(&mut form, name, *kind, *required)?;
    }

    loop {
        match form.save() {
            Ok(id) => return Ok(id),
            Err(Error::MissingField(field)) => {
                eprintln!("\x1b[33mField '{}' is required\x1b[0m", field);
                if let Some((name, kind, _)) = editable.iter().find(|(n, _, _)| *n == field) {
                    prompt_field(&mut form, name, *kind, true)?;
                }
            }
            Err(e @ Error::Persistence(_)) => {
                eprintln!("\x1b[31m{}\x1b[0m", e);
                if !confirm("Correct the values and try again?")? {
                    form.cancel();
                    return Err(e);
                }
                for (name, kind, required) in &editable {
                    prompt_field(&mut form, name, *kind, *required)?;
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Ask for one field with the control its kind calls for
fn prompt_field(form: &mut FormSession<'_>, name: &str, kind: ControlKind, required: bool) -> screencheck::Result<()> {
    let current = form.get(name).unwrap_or_default().to_string();
    let label = if required { format!("{} *", name) } else { name.to_string() };
    let theme = theme();

    let value = match kind {
        ControlKind::Secret => {
            let label = if form.mode().is_edit() {
                format!("{} (blank keeps current)", label)
            } else {
                label
            };
            Password::with_theme(&theme)
                .with_prompt(label)
                .allow_empty_password(true)
                .interact()
                .map_err(|dialoguer::Error::IO(e)| e)?
        }
        ControlKind::Choice(options) => {
            let items = choice_items(options, required);
            let picked = Select::with_theme(&theme)
                .with_prompt(label)
                .items(&items)
                .default(choice_default(&items, &current))
                .interact()
                .map_err(|dialoguer::Error::IO(e)| e)?;
            items[picked].to_string()
        }
        ControlKind::Text => Input::<String>::with_theme(&theme)
            .with_prompt(label)
            .with_initial_text(current)
            .allow_empty(true)
            .interact_text()
            .map_err(|dialoguer::Error::IO(e)| e)?,
    };
    form.set(name, value)
}

/// Entries offered for a choice field. Nullable columns get a leading empty
/// entry.
fn choice_items(options: &'static [&'static str], required: bool) -> Vec<&'static str> {
    let mut items = Vec::with_capacity(options.len() + 1);
    if !required {
        items.push("");
    }
    items.extend_from_slice(options);
    items
}

fn choice_default(items: &[&str], current: &str) -> usize {
    items.iter().position(|item| *item == current).unwrap_or(0)
}

// ============================================================================
// Terminal helpers
// ============================================================================

fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

fn confirm(question: &str) -> screencheck::Result<bool> {
    let answer = Confirm::with_theme(&theme())
        .with_prompt(question)
        .default(false)
        .interact()
        .map_err(|dialoguer::Error::IO(e)| e)?;
    Ok(answer)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 4).collect();
        format!("{}...", head)
    }
}
