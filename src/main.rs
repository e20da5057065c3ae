//! Command-line interface for the expunge library.
//!
//! Works either on PDF files directly or on documents held in a local store
//! directory (`--store`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::Level;

use expunge::{
    redacted_filename, AppConfig, DocumentStore, LocalStore, MemoryStore, RedactionService,
    SearchOutcome, TextExtractor,
};

/// Search for text in PDF documents and redact it irreversibly.
#[derive(Parser)]
#[command(name = "expunge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Document store directory; positional documents are then store ids
    #[arg(long, value_name = "DIR", global = true)]
    store: Option<PathBuf>,

    /// Match case-insensitively
    #[arg(short = 'i', long, global = true)]
    ignore_case: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every occurrence of a query
    Search {
        /// PDF file, or document id with --store
        document: String,

        /// Text to search for
        query: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a redacted copy of a document
    Redact {
        /// PDF file, or document id with --store
        document: String,

        /// Text to remove
        query: String,

        /// Output PDF file (defaults to <name>_redacted.pdf)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Redact a stored document into a new stored document
    Save {
        /// Document id in the store
        id: String,

        /// Text to remove
        query: String,
    },

    /// Copy a PDF into the store and print its id
    Import {
        /// PDF file
        input: PathBuf,
    },

    /// Extract text from a PDF (for debugging and verification)
    Extract {
        /// Input PDF file path
        input: PathBuf,

        /// Output text file (optional, defaults to stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Print positioned runs as JSON instead of plain text
        #[arg(long)]
        runs: bool,
    },
}

/// Command handler holding the loaded configuration.
struct Handler {
    config: AppConfig,
    use_store: bool,
}

impl Handler {
    fn new(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => AppConfig::load(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?,
            None => AppConfig::default(),
        };
        if let Some(root) = &cli.store {
            config.store.root = root.clone();
        }
        if cli.ignore_case {
            config.engine.matching.case_sensitive = false;
        }
        Ok(Self {
            config,
            use_store: cli.store.is_some(),
        })
    }

    fn local_store(&self) -> Result<LocalStore> {
        LocalStore::open(&self.config.store).with_context(|| {
            format!("Failed to open store {}", self.config.store.root.display())
        })
    }

    fn service<S: DocumentStore>(&self, store: S) -> Result<RedactionService<S>> {
        Ok(RedactionService::new(store, self.config.engine.clone())?)
    }

    /// Loads a file into a throwaway memory store and returns its id.
    fn file_service(&self, path: &Path) -> Result<(RedactionService<MemoryStore>, String)> {
        let bytes = read_input(path)?;
        let store = MemoryStore::new();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        let id = store.insert(&name, &bytes)?.id;
        Ok((self.service(store)?, id))
    }

    fn search(&self, document: &str, query: &str, json: bool) -> Result<()> {
        let outcome = (if self.use_store {
            self.service(self.local_store()?)?.search(document, query)
        } else {
            let (service, id) = self.file_service(Path::new(document))?;
            service.search(&id, query)
        })
        .with_context(|| "Search failed")?;

        if json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else {
            print_matches(&outcome);
        }
        Ok(())
    }

    fn redact(&self, document: &str, query: &str, output: Option<&Path>) -> Result<()> {
        let download = (if self.use_store {
            self.service(self.local_store()?)?
                .redact_and_stream(document, query)
        } else {
            let (service, id) = self.file_service(Path::new(document))?;
            service.redact_and_stream(&id, query)
        })
        .with_context(|| "Redaction failed")?;

        let target = match output {
            Some(path) => path.to_path_buf(),
            None if self.use_store => PathBuf::from(&download.filename),
            None => Path::new(document)
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(redacted_filename(document)),
        };
        std::fs::write(&target, &download.bytes)
            .with_context(|| format!("Failed to write {}", target.display()))?;

        if download.total_replacements > 0 {
            println!(
                "✓ Successfully redacted {} instance(s) → {}",
                download.total_replacements,
                target.display()
            );
        } else {
            println!("⚠ No instances found to redact; copied unchanged → {}", target.display());
        }
        Ok(())
    }

    fn save(&self, id: &str, query: &str) -> Result<()> {
        anyhow::ensure!(self.use_store, "save requires --store");
        let saved = self
            .service(self.local_store()?)?
            .redact_and_persist(id, query)
            .with_context(|| "Redaction failed")?;
        println!("{}", serde_json::to_string_pretty(&saved)?);
        Ok(())
    }

    fn import(&self, input: &Path) -> Result<()> {
        let metadata = self
            .local_store()?
            .import(input)
            .with_context(|| format!("Failed to import {}", input.display()))?;
        println!("{}", metadata.id);
        Ok(())
    }

    fn extract(&self, input: &Path, output: Option<&Path>, runs: bool) -> Result<()> {
        let bytes = read_input(input)?;
        let extracted = TextExtractor::extract(&bytes).with_context(|| "Text extraction failed")?;
        let text = if runs {
            serde_json::to_string_pretty(&extracted.runs().collect::<Vec<_>>())?
        } else {
            extracted.text()
        };

        if let Some(output_path) = output {
            std::fs::write(output_path, &text)
                .with_context(|| format!("Failed to write to {}", output_path.display()))?;
            println!(
                "✓ Extracted {} characters → {}",
                text.chars().count(),
                output_path.display()
            );
        } else {
            println!("{}", text);
        }
        Ok(())
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        anyhow::bail!("Input file does not exist: {}", path.display());
    }
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_matches(outcome: &SearchOutcome) {
    for m in &outcome.matches {
        println!(
            "page {:>3}  x={:>7.1} y={:>7.1}  {}",
            m.page, m.x, m.y, m.context
        );
    }
    println!("{} match(es)", outcome.total_matches);
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let handler = Handler::new(&cli)?;

    match &cli.command {
        Commands::Search {
            document,
            query,
            json,
        } => handler.search(document, query, *json)?,
        Commands::Redact {
            document,
            query,
            output,
        } => handler.redact(document, query, output.as_deref())?,
        Commands::Save { id, query } => handler.save(id, query)?,
        Commands::Import { input } => handler.import(input)?,
        Commands::Extract {
            input,
            output,
            runs,
        } => handler.extract(input, output.as_deref(), *runs)?,
    }

    Ok(())
}
