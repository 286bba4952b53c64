use anyhow::{Context, Result};
use chirp_core::collect::{JsonLinesSource, PostSource, SearchApiSource};
use chirp_core::config::Settings;
use chirp_core::db::Database;
use chirp_core::pipeline::{collect_to_flat_file, import_flat_file};
use chirp_core::query::PostQueries;
use chirp_types::Table;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Chirp post importer
///
/// Collects posts from the search API into a flat file, normalizes the file
/// into author/post/mention/hashtag tables and appends them to the store.
#[derive(Parser, Debug)]
#[command(name = "chirp")]
#[command(about = "Import social-media posts into a relational store", long_about = None)]
struct Args {
    /// Settings file (default: settings.toml in the working directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store connection string, overrides the settings file
    #[arg(short, long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect posts and write them to the flat file
    Collect(CollectArgs),
    /// Normalize the flat file and append it to the store
    Import {
        /// Flat file to read (default: pipeline.flat_file)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Collect, then import
    Run(CollectArgs),
    /// Look up stored posts
    #[command(subcommand)]
    Query(QueryCommand),
    /// Print the row count of every table, or of one table
    Stats {
        /// Store table name, e.g. twitt or association_hashtag_twitt
        #[arg(value_parser = parse_table)]
        table: Option<Table>,
    },
}

#[derive(clap::Args, Debug)]
struct CollectArgs {
    /// Search query (default: collect.query)
    #[arg(short, long)]
    query: Option<String>,

    /// Maximum number of posts (default: collect.count)
    #[arg(short = 'n', long)]
    count: Option<usize>,

    /// Read raw posts from a JSON Lines dump instead of the search API
    #[arg(long)]
    from_dump: Option<PathBuf>,

    /// Flat file to write (default: pipeline.flat_file)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum QueryCommand {
    /// Posts written by an author
    Author { name: String },
    /// Posts carrying a hashtag
    Hashtag { name: String },
    /// Posts mentioning a user
    Mention { name: String },
    /// Every hashtag with the posts carrying it
    Traverse,
    /// One post and its hashtags, by external id
    Post { id: String },
}

fn parse_table(name: &str) -> Result<Table, String> {
    Table::parse(name).ok_or_else(|| {
        let known: Vec<&str> = Table::LOAD_ORDER.iter().map(|t| t.as_str()).collect();
        format!("unknown table {:?}, expected one of: {}", name, known.join(", "))
    })
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => Settings::from_file(path),
        None => Settings::new(),
    }
    .context("Failed to load settings")?;

    if let Some(url) = &args.database {
        settings.database.url = url.clone();
    }
    Ok(settings)
}

fn open_store(settings: &Settings) -> Result<Database> {
    let db = Database::new(&settings.database.url)
        .with_context(|| format!("Failed to open store {}", settings.database.url))?;
    db.initialize()?;
    Ok(db)
}

fn collect(settings: &Settings, args: &CollectArgs) -> Result<PathBuf> {
    let query = args.query.clone().unwrap_or_else(|| settings.collect.query.clone());
    let count = args.count.unwrap_or(settings.collect.count);
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| settings.pipeline.flat_file.clone());

    let mut source: Box<dyn PostSource> = match &args.from_dump {
        Some(dump) => Box::new(JsonLinesSource::new(dump)),
        None => Box::new(SearchApiSource::new(&settings.collect)?),
    };

    tracing::info!("Collecting up to {} posts for {:?}", count, query);
    let rows = collect_to_flat_file(source.as_mut(), &query, count, &output)?;
    println!("Wrote {} flat rows to {}", rows, output.display());
    Ok(output)
}

fn import(settings: &Settings, input: PathBuf) -> Result<()> {
    let db = open_store(settings)?;
    let report = import_flat_file(&db, &input)?;

    println!("Import Summary");
    println!("==============");
    for (table, rows) in &report.appended {
        println!("{:<28} {}", table.as_str(), rows);
    }
    Ok(())
}

fn query(settings: &Settings, command: &QueryCommand) -> Result<()> {
    let db = open_store(settings)?;
    let queries = PostQueries::new(&db);

    let ids = match command {
        QueryCommand::Author { name } => queries.posts_by_author(name)?,
        QueryCommand::Hashtag { name } => queries.posts_by_hashtag(name)?,
        QueryCommand::Mention { name } => queries.posts_mentioning(name)?,
        QueryCommand::Traverse => {
            for row in queries.hashtag_posts()? {
                println!("#{}\t{}\t{}", row.hashtag_name, row.twitt_real_id, row.text);
            }
            return Ok(());
        }
        QueryCommand::Post { id } => {
            match queries.post(id)? {
                Some(details) => {
                    println!("{}\t{}", details.post.external_id, details.post.text);
                    for hashtag in &details.hashtags {
                        println!("#{}", hashtag);
                    }
                }
                None => println!("No post with id {}", id),
            }
            return Ok(());
        }
    };

    for id in &ids {
        println!("{}", id);
    }
    tracing::info!("{} matching posts", ids.len());
    Ok(())
}

fn stats(settings: &Settings, only: Option<Table>) -> Result<()> {
    let db = open_store(settings)?;
    for (table, count) in PostQueries::new(&db).table_counts()? {
        if only.map_or(true, |only| only == table) {
            println!("{:<28} {}", table.as_str(), count);
        }
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let settings = load_settings(&args)?;

    match &args.command {
        Command::Collect(collect_args) => {
            collect(&settings, collect_args)?;
        }
        Command::Import { input } => {
            let input = input
                .clone()
                .unwrap_or_else(|| settings.pipeline.flat_file.clone());
            import(&settings, input)?;
        }
        Command::Run(collect_args) => {
            let flat_file = collect(&settings, collect_args)?;
            import(&settings, flat_file)?;
        }
        Command::Query(command) => query(&settings, command)?,
        Command::Stats { table } => stats(&settings, *table)?,
    }
    Ok(())
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chirp_core=info,chirp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        tracing::error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}
