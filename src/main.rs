//! CLI entry point for folio

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio::commands::show::ShowFormat;

#[derive(Parser)]
#[command(name = "folio")]
#[command(version)]
#[command(about = "Load, select and render the posts of a Markdown blog", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List posts, newest first
    #[command(alias = "ls")]
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Render a post (the latest one when no slug is given)
    Show {
        /// Slug of the post to show
        slug: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "html")]
        format: ShowFormat,
    },

    /// Create a new post
    New {
        /// Title of the new post
        title: String,

        /// File name to use instead of one derived from the title
        #[arg(short, long)]
        slug: Option<String>,
    },

    /// Start a local server
    #[command(alias = "s")]
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Reload posts and connected pages when files change
        #[arg(short, long)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "folio=debug,info"
    } else {
        "folio=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let folio = folio::Folio::new(&base_dir)?;

    match cli.command {
        Commands::List { json } => {
            folio::commands::list::run(&folio, json).await?;
        }

        Commands::Show { slug, format } => {
            folio::commands::show::run(&folio, slug.as_deref(), format).await?;
        }

        Commands::New { title, slug } => {
            let path = folio.new_post(&title, slug.as_deref())?;
            println!("Created: {}", path.display());
        }

        Commands::Serve { port, ip, watch } => {
            tracing::info!("Starting server at http://{}:{}", ip, port);
            folio::server::start(&folio, &ip, port, watch).await?;
        }
    }

    Ok(())
}
