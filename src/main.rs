use std::sync::Arc;

use anyhow::bail;
use clap::Parser;
use inquire::error::InquireResult;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod config;
mod links;
mod metadata;
#[cfg(test)]
mod tests;
mod web;

use app::{LinkQuery, LinkSave, LinkService, SharePayload};
use cli::{parse_tags, Command};
use config::Config;
use links::{BackendCsv, LinkId, LinkStore};
use metadata::{HttpFetcher, Resolver};

fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("html5ever=error".parse()?)
        .add_directive("selectors=error".parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn confirm(message: &str) -> anyhow::Result<bool> {
    match inquire::prompt_confirmation(message) {
        InquireResult::Ok(answer) => Ok(answer),
        InquireResult::Err(err) => bail!("An error occurred: {}", err),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging()?;
    let args = cli::Args::parse();

    let config = Config::load()?;
    let user = args.user.unwrap_or_else(|| config.default_user.clone());

    let store: Arc<dyn LinkStore> = Arc::new(BackendCsv::load(config.links_path())?);
    let service = LinkService::new(store.clone(), config.normalize_urls);
    let resolver = Resolver::new(HttpFetcher::new(&config.fetch_options())?, store);

    match args.command {
        Command::Save {
            url,
            title,
            description,
            tags,
            app,
            no_meta,
        } => {
            let mut link = service.save_link_with_metadata(&user, &url, app)?;

            if title.is_some() || description.is_some() || tags.is_some() {
                link = service.save_link(
                    &user,
                    LinkSave {
                        url: link.url.clone(),
                        title,
                        description,
                        tags: tags.as_deref().map(parse_tags),
                        ..Default::default()
                    },
                )?;
            }

            if !no_meta {
                runtime()?.block_on(resolver.resolve_and_apply(&link.url, &link.id));
                link = service.get_link(&user, &link.id)?;
            }

            print_json(&link)
        }

        Command::Share { web_url, text } => {
            let link = service.save_shared(&user, &SharePayload { web_url, text })?;
            runtime()?.block_on(resolver.resolve_and_apply(&link.url, &link.id));
            print_json(&service.get_link(&user, &link.id)?)
        }

        Command::List {
            read,
            tags,
            query,
            sort,
            limit,
            count,
        } => {
            if count {
                return print_json(&service.counts(&user)?);
            }

            let query = LinkQuery {
                read,
                tags: tags.as_deref().map(parse_tags),
                query,
                sort,
                limit,
            };
            print_json(&service.list_links(&user, &query)?)
        }

        Command::Get { id } => print_json(&service.get_link(&user, &LinkId::from(id))?),

        Command::ToggleRead { id } => print_json(&service.toggle_read(&user, &LinkId::from(id))?),

        Command::MarkRead { id } => print_json(&service.mark_as_read(&user, &LinkId::from(id))?),

        Command::Delete { id, yes } => {
            let id = LinkId::from(id);
            let link = service.get_link(&user, &id)?;

            if !yes && !confirm(&format!("Are you sure you want to delete {}?", link.url))? {
                return Ok(());
            }

            service.delete_link(&user, &id)?;
            println!("link {id} removed");
            Ok(())
        }

        Command::ResetUnread { yes } => {
            let counts = service.counts(&user)?;
            if !yes
                && !confirm(&format!(
                    "You are about to mark {} links unread. Are you sure?",
                    counts.read
                ))?
            {
                return Ok(());
            }

            let count = service.reset_all_to_unread(&user)?;
            println!("{count} links inspected");
            Ok(())
        }

        Command::Migrate { id: Some(id) } => {
            print_json(&service.update_link_metadata(&user, &LinkId::from(id))?)
        }

        Command::Migrate { id: None } => {
            let count = service.migrate_all_links_metadata(&user)?;
            println!("{count} links inspected");
            Ok(())
        }

        Command::Tags {} => print_json(&service.tags(&user)?),

        Command::Preview { url } => print_json(&runtime()?.block_on(resolver.resolve(&url))),

        Command::Resolve { id } => {
            let link = service.get_link(&user, &LinkId::from(id))?;
            runtime()?.block_on(resolver.resolve_and_apply(&link.url, &link.id));
            print_json(&service.get_link(&user, &link.id)?)
        }

        Command::Info { url } => print_json(&metadata::url_info(&url)),

        Command::Daemon { addr } => {
            let addr = addr.unwrap_or_else(|| config.listen_addr.clone());
            runtime()?.block_on(web::start_daemon(&addr, service, resolver))
        }
    }
}
