use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use postboard::client::PostsClient;
use postboard::config::{ClientConfig, DEFAULT_BASE_URL};
use postboard::model::{CreatePostRequest, PostId, SearchParams};
use postboard::query::CacheEntry;

#[derive(Parser)]
#[command(name = "postboard")]
#[command(author, version, about = "Browse and edit posts on a blog-post service")]
struct Cli {
    /// Base URL of the service
    #[arg(long, env = "POSTBOARD_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, env = "POSTBOARD_USERNAME")]
    username: String,

    #[arg(long, env = "POSTBOARD_PASSWORD", hide_env_values = true)]
    password: String,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List posts
    List,

    /// List one page of posts
    Search {
        #[arg(long, default_value_t = 0)]
        skip: u64,
        #[arg(long, default_value_t = 10)]
        limit: u64,
    },

    /// Show a post
    Get { id: PostId },

    /// Create a post
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        user_id: u64,
        #[arg(long)]
        body: Option<String>,
    },

    /// Change the title or body of a post
    Update {
        id: PostId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        body: Option<String>,
    },

    /// Delete a post
    Delete { id: PostId },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .init();

    let client = PostsClient::new(&ClientConfig::new(cli.base_url))?;
    client
        .login(&cli.username, &cli.password)
        .await
        .wrap_err("login failed")?;

    match cli.command {
        Commands::List => print(&settled(client.fetch_posts().await?)?),
        Commands::Search { skip, limit } => {
            print(&settled(client.fetch_search(SearchParams::new(skip, limit)).await?)?)
        }
        Commands::Get { id } => print(&settled(client.fetch_post(id).await?)?),
        Commands::Create {
            title,
            user_id,
            body,
        } => {
            let request = CreatePostRequest {
                title,
                user_id,
                body,
            };
            print(&client.create_post(request).await?)
        }
        Commands::Update { id, title, body } => {
            let mut post = settled(client.fetch_post(id).await?)?;
            if let Some(title) = title {
                post.title = title;
            }
            if let Some(body) = body {
                post.body = body;
            }
            print(&client.update_post(post).await?)
        }
        Commands::Delete { id } => {
            client.delete_post(id).await?;
            println!("Deleted post {id}");
            Ok(())
        }
    }
}

/// The data of a settled entry, or the error of its last fetch.
fn settled<T>(entry: CacheEntry<T>) -> Result<T> {
    if let Some(error) = entry.error {
        return Err(error.into());
    }
    entry.data.ok_or_else(|| eyre!("no data"))
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
