use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use corporate_site::config;
use corporate_site::content::{News, Page, Pagination, Service};
use corporate_site::settings::{SettingGroup, SettingsStore};
use corporate_site::slug::{SlugGenerator, Sluggable};
use corporate_site::{contact, db};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(about = "Inspect settings, slugs and the contact inbox of an existing site database")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print settings, optionally only one group
    Settings {
        #[arg(long)]
        group: Option<String>,
    },
    /// Show the slug a new record with this title would receive
    Slug {
        #[arg(long, value_enum, default_value = "news")]
        table: SlugTable,
        title: String,
    },
    /// List contact messages, newest first
    Inbox {
        #[arg(long)]
        unread: bool,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SlugTable {
    News,
    Pages,
    Services,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let pool = db::init_pool(&cfg.database_url()).await?;

    match args.command {
        Command::Settings { group } => {
            let store = SettingsStore::with_pool(pool);
            let map = match group {
                Some(g) => {
                    let group = SettingGroup::parse(&g)
                        .ok_or_else(|| anyhow!("unknown settings group: {g}"))?;
                    store.by_group(group).await?
                }
                None => store.all().await?,
            };
            for (key, value) in map {
                println!("{key} = {}", value.unwrap_or_default());
            }
        }
        Command::Slug { table, title } => {
            let slugs = SlugGenerator::new(cfg.content.slug_max_attempts);
            let slug = match table {
                SlugTable::News => preview::<News>(&slugs, &pool, &title).await?,
                SlugTable::Pages => preview::<Page>(&slugs, &pool, &title).await?,
                SlugTable::Services => preview::<Service>(&slugs, &pool, &title).await?,
            };
            println!("{slug}");
        }
        Command::Inbox { unread, limit } => {
            let page = Pagination::new(Some(1), Some(limit), limit.max(1), limit.max(1));
            let inbox = contact::list(&pool, unread, page).await?;
            println!("{} message(s)", inbox.total);
            for c in inbox.items {
                let flag = if c.is_read { " " } else { "*" };
                println!(
                    "{flag} #{:<5} {}  {} <{}>  {}",
                    c.id,
                    c.created_at.format("%Y-%m-%d %H:%M"),
                    c.name,
                    c.email,
                    c.subject.unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}

async fn preview<E: Sluggable>(slugs: &SlugGenerator, pool: &db::Pool, title: &str) -> Result<String> {
    Ok(slugs.unique_slug::<E>(pool, title).await?)
}
