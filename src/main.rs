use booker::transfer::{self, CredentialImport, ImportOutcome};
use booker::{Config, Decision, Direction, NewBook, SortKey, SortSpec, Store, ViewState, count_label, credential};
use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "booker")]
#[command(about = "Booker - local book list with JSON export/import and API key generation")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the store directory (default: data_dir from config)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    /// Path to the config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a book
    Add {
        #[arg(short, long, default_value = "")]
        number: String,
        #[arg(short, long)]
        title: String,
        #[arg(short, long, default_value = "")]
        year: String,
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Delete a book by id
    Delete { id: String },

    /// List books, optionally filtered and sorted
    List {
        /// Case-insensitive text to search for
        #[arg(long, default_value = "")]
        search: String,

        /// Column to sort by (number, title, year, notes, id, createdAt)
        #[arg(long)]
        sort: Option<SortKey>,

        /// Sort descending
        #[arg(long)]
        desc: bool,
    },

    /// Export books and API key as JSON
    Export {
        /// Output file (default: Booker-export-<date>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write to stdout instead of a file
        #[arg(long, conflicts_with = "output")]
        stdout: bool,
    },

    /// Import books from a JSON export, replacing the current list
    Import {
        file: PathBuf,

        /// Replace without asking
        #[arg(long)]
        yes: bool,
    },

    /// Remove every book
    Clear {
        #[arg(long)]
        yes: bool,
    },

    /// Manage the API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Generate and store a new key
    Generate,

    /// Remove the stored key
    Clear {
        #[arg(long)]
        yes: bool,
    },

    /// Print the stored key
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    // Setup tracing
    let level = config.log_level.parse().unwrap_or(tracing::Level::WARN);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let store_path = cli.store_path.clone().unwrap_or_else(|| config.data_dir.clone());
    let mut store = Store::open(&store_path)?;

    match cli.command {
        Commands::Add {
            number,
            title,
            year,
            notes,
        } => {
            let input = NewBook {
                number,
                title,
                year,
                notes,
            };
            match store.add(&input)? {
                Some(id) => println!("Added {}", id),
                None => println!("{}", "Title is required; nothing added.".yellow()),
            }
        }
        Commands::Delete { id } => {
            if store.remove(&id)? {
                println!("Deleted {}", id);
            } else {
                println!("{}", format!("No book with id {}", id).yellow());
            }
        }
        Commands::List { search, sort, desc } => {
            let mut state = ViewState::new(config.default_sort);
            if let Some(key) = sort {
                state.sort = SortSpec::new(key, Direction::Asc);
            }
            if desc {
                state.sort.direction = Direction::Desc;
            }
            state.set_search(search);

            let books = state.apply(store.items());
            print_table(&books);
            println!("{}", count_label(books.len()).dimmed());
        }
        Commands::Export { output, stdout } => {
            let json = transfer::export_json(&store)?;
            if stdout {
                println!("{}", json);
            } else {
                let path = output
                    .unwrap_or_else(|| PathBuf::from(transfer::export_filename(chrono::Local::now().date_naive())));
                std::fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
                println!("Exported {} to {}", count_label(store.len()), path.display());
            }
        }
        Commands::Import { file, yes } => {
            let text = std::fs::read_to_string(&file).with_context(|| format!("Failed to read {:?}", file))?;
            let pending = match transfer::prepare_import(&text) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("{}", e.to_string().red());
                    return Ok(());
                }
            };

            let decision = if yes || confirm(&pending.prompt())? {
                Decision::Replace
            } else {
                Decision::Cancel
            };

            match pending.resolve(&mut store, decision)? {
                ImportOutcome::Cancelled => println!("Import cancelled."),
                ImportOutcome::Replaced { count, credential } => {
                    println!("Imported {}.", count_label(count));
                    let status = credential.status();
                    match credential {
                        CredentialImport::Imported => println!("{}", status.green()),
                        CredentialImport::NotPresent => println!("{}", status),
                    }
                }
            }
        }
        Commands::Clear { yes } => {
            if yes || confirm("Clear ALL books? (This cannot be undone)")? {
                store.clear_all()?;
                println!("Cleared all books.");
            }
        }
        Commands::Key { action } => match action {
            KeyAction::Generate => match credential::generate() {
                Ok(key) => {
                    store.set_credential(&key)?;
                    println!("{}", key);
                    eprintln!("{}", "Generated key. Save it somewhere safe.".green());
                }
                Err(e) => {
                    eprintln!("{}", e.to_string().red());
                    eprintln!("Failed to generate key.");
                }
            },
            KeyAction::Clear { yes } => {
                if yes || confirm("Clear the stored API key?")? {
                    store.clear_credential()?;
                    println!("Cleared key.");
                }
            }
            KeyAction::Show => match store.credential() {
                Some(key) => println!("{}", key),
                None => eprintln!("{}", "No API key stored.".yellow()),
            },
        },
    }

    Ok(())
}

/// Ask a yes/no question on stdin; anything but y/yes declines
fn confirm(prompt: &str) -> Result<bool> {
    let mut stderr = io::stderr();
    write!(stderr, "{}\n[y/N] ", prompt)?;
    stderr.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_table(books: &[booker::Book]) {
    let num = |n: Option<f64>| n.map(|v| v.to_string()).unwrap_or_default();

    println!(
        "{}",
        format!("{:<8} {:<40} {:<6} {:<30} {}", "#", "Title", "Year", "Notes", "Id").bold()
    );
    for book in books {
        println!(
            "{:<8} {:<40} {:<6} {:<30} {}",
            num(book.number),
            book.title,
            num(book.year),
            book.notes,
            book.id.dimmed()
        );
    }
}
