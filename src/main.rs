//! Inspection CLI over the content router.

use std::process::ExitCode;

use clap::Parser;
use time::format_description::well_known::Rfc3339;
use tracing::error;

use foglio::application::router::ContentRouter;
use foglio::application::source::ContentSource;
use foglio::cache::{CacheConfig, ContentCache};
use foglio::config::{self, CliArgs, Command, ManifestCommand};
use foglio::domain::entities::{BlogPost, Memo};
use foglio::infra::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("foglio: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = config::load(args.config_file.as_ref(), &args.overrides)?;
    telemetry::init(&settings.logging)?;

    let cache = ContentCache::shared(&CacheConfig::from(&settings.cache));
    let router = ContentRouter::new(settings.router_options(), cache)?;

    match args.command {
        Command::Posts => {
            let mut posts = router.blog_posts().await?;
            posts.sort_by(|a, b| b.date.cmp(&a.date));
            for post in &posts {
                println!("{}  {}", format_date(post), post.id);
            }
        }
        Command::Post { id } => match router.blog_post(&id).await? {
            Some(post) => {
                println!("title: {}", post.title);
                println!("date: {}", format_date(&post));
                for discussion in &post.discussions {
                    println!("discussion: {} {}", discussion.platform, discussion.url);
                }
                println!();
                print!("{}", post.content);
            }
            None => return Err(format!("post `{id}` not found").into()),
        },
        Command::Memos => {
            for memo in router.memos().await? {
                println!("{}  {}", format_timestamp(&memo), memo.content);
            }
        }
        Command::Links => {
            let site_config = router.site_config().await?;
            for (name, url) in &site_config.links {
                println!("{name}  {url}");
            }
        }
        Command::Likes => {
            let likes = router.likes().await?;
            for (id, count) in &likes.counts {
                println!("{count:>6}  {id}");
            }
        }
        Command::Manifest { command } => match command {
            ManifestCommand::Show => {
                let manifest = router.manifest().await?;
                println!("{}", serde_json::to_string_pretty(&manifest)?);
            }
            ManifestCommand::Ensure => {
                router.ensure_manifest().await?;
                println!("manifest present");
            }
        },
    }

    Ok(())
}

fn format_date(post: &BlogPost) -> String {
    post.date
        .format(&Rfc3339)
        .unwrap_or_else(|_| post.date.unix_timestamp().to_string())
}

fn format_timestamp(memo: &Memo) -> String {
    memo.timestamp
        .format(&Rfc3339)
        .unwrap_or_else(|_| memo.timestamp.unix_timestamp().to_string())
}
