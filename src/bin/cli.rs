// zlibrary-core
// Copyright (C) 2026 zlibrary-core contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Thin CLI shell (§6.5). Wires the driver surface of §6.4 to `clap`
//! subcommands. Every decision is made in the core; this binary only
//! parses arguments, constructs the components, and maps `CoreError` to
//! the exit codes of §6.4/§7.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use zlibrary_core::bootstrap::{bootstrap, BootstrapOptions};
use zlibrary_core::catalog::{services, BookFilter};
use zlibrary_core::orchestrator::SearchOptions;
use zlibrary_core::upstream::SearchFilters;
use zlibrary_core::CoreError;

#[derive(Parser)]
#[command(name = "zlibrary-cli")]
#[command(about = "Manual exercising harness for the zlibrary-core driver surface", long_about = None)]
struct Cli {
    /// Path to the structured credential file; falls back to
    /// ZLIBRARY_CREDENTIALS_FILE, a default path, then environment variables.
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Path to the catalog database; falls back to ZLIBRARY_DB_PATH, then
    /// ~/.zlibrary/books.db.
    #[arg(long)]
    database: Option<PathBuf>,

    /// Base URL of the upstream service.
    #[arg(long, default_value = "https://example-upstream.invalid")]
    upstream_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Search {
        query: String,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        extension: Option<String>,
        #[arg(long, default_value_t = false)]
        save: bool,
    },
    Download {
        book_id: String,
        hash: String,
        title: String,
        destination: PathBuf,
    },
    DownloadAll {
        query: String,
        destination: PathBuf,
    },
    Browse {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    Show {
        book_id: String,
    },
    Save {
        book_id: String,
    },
    Unsave {
        book_id: String,
    },
    Lists,
    Downloads {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    Stats,
    Export {
        #[arg(long, default_value = "json")]
        format: String,
    },
    Import {
        path: PathBuf,
    },
    Vacuum,
    Backup {
        destination: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    zlibrary_core::logging::init();
    let cli = Cli::parse();

    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            err.exit_code()
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<(), CoreError> {
    let core = bootstrap(BootstrapOptions {
        credentials_path: cli.credentials,
        database_path: cli.database,
        upstream_base_url: cli.upstream_url,
    })
    .await?;
    let cancel = CancellationToken::new();

    match cli.command {
        Commands::Search { query, language, extension, save } => {
            let filters = SearchFilters { language, extension, ..Default::default() };
            let options = SearchOptions { save_to_catalog: save };
            let results = core.orchestrator.search(&query, &filters, &options, &cancel).await?;
            for book in results {
                println!("{}\t{}\t{}", book.id, book.title, book.author);
            }
        }
        Commands::Download { book_id, hash, title, destination } => {
            let book = zlibrary_core::upstream::BookRecord {
                id: book_id,
                hash,
                title,
                author: String::new(),
                year: None,
                publisher: None,
                language: None,
                extension: None,
                filesize_human: None,
                filesize_bytes: None,
                cover_url: None,
                description: None,
                isbn: None,
                edition: None,
                pages: None,
            };
            let path = core.orchestrator.download(&book, &destination, &cancel).await?;
            println!("downloaded to {}", path.display());
        }
        Commands::DownloadAll { query, destination } => {
            let filters = SearchFilters::default();
            let options = SearchOptions { save_to_catalog: true };
            let results = core.orchestrator.search_all_pages(&query, &filters, &options, &cancel).await?;
            for book in results {
                match core.orchestrator.download(&book, &destination, &cancel).await {
                    Ok(path) => println!("downloaded {} -> {}", book.id, path.display()),
                    Err(err) => eprintln!("failed {}: {err}", book.id),
                }
            }
        }
        Commands::Browse { title, author, language, limit, offset } => {
            let filter = BookFilter {
                title_contains: title,
                author_contains: author,
                language,
                limit,
                offset,
                ..Default::default()
            };
            let rows = services::browse(core.database.pool(), &filter).await?;
            for row in rows {
                println!("{}\t{}\t{}", row.book.id, row.book.title, row.authors.join("; "));
            }
        }
        Commands::Show { book_id } => {
            let row = services::show_book(core.database.pool(), &book_id).await?;
            println!("{:#?}", row.book);
            println!("authors: {}", row.authors.join("; "));
        }
        Commands::Save { book_id } => {
            services::save(core.database.pool(), &book_id, None, None, 0).await?;
        }
        Commands::Unsave { book_id } => {
            services::unsave(core.database.pool(), &book_id).await?;
        }
        Commands::Lists => {
            for list in services::list_all(core.database.pool()).await? {
                println!("{}\t{}", list.id, list.name);
            }
        }
        Commands::Downloads { limit } => {
            for download in services::recent_downloads(core.database.pool(), limit).await? {
                println!("{}\t{}\t{}", download.book_id, download.status, download.filename);
            }
        }
        Commands::Stats => {
            let stats = services::stats(&core.database).await?;
            println!("books: {}", stats.book_count);
            println!("languages: {}", stats.distinct_languages);
            println!("formats: {}", stats.distinct_formats);
            println!("downloads: {}", stats.total_downloads);
            println!("db file size: {} bytes", stats.database_file_size);
        }
        Commands::Export { format } => {
            let output = match format.as_str() {
                "csv" => services::export_csv(core.database.pool()).await?,
                _ => services::export_json(core.database.pool()).await?,
            };
            println!("{output}");
        }
        Commands::Import { path } => {
            let json = std::fs::read_to_string(&path)?;
            let count = services::import_json(core.database.pool(), &json).await?;
            println!("imported {count} books");
        }
        Commands::Vacuum => {
            services::vacuum(&core.database).await?;
        }
        Commands::Backup { destination } => {
            core.database.export_file(&destination).await?;
            println!("backed up to {}", destination.display());
        }
    }

    Ok(())
}
