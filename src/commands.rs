//! One-shot subcommands.

use clap::Subcommand;
use color_eyre::Result;
use std::io::stdout;

use crate::app::App;
use crate::art::{filters_from, ArtworkRepository, Filters};
use crate::cache::{FetchMode, QueryCache};
use crate::collections::ArtworkCollection;
use crate::config::Config;
use crate::error::{should_show_offline_fallback, ArtError};
use crate::platform::SqliteKv;
use crate::prefs::{Language, PreferenceStore, PreferenceUpdate, Theme};
use crate::render;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// List one page of artworks
  List {
    #[arg(long, default_value_t = 1)]
    page: u32,
    /// Artworks per page (default from config)
    #[arg(long)]
    limit: Option<u32>,
    #[command(flatten)]
    filters: FilterArgs,
  },
  /// Show one artwork
  Show { id: u64 },
  /// Full-text search
  Search {
    query: String,
    #[command(flatten)]
    filters: FilterArgs,
  },
  /// Add an artwork to saved
  Save { id: u64 },
  /// Remove an artwork from saved
  Unsave { id: u64 },
  /// List saved artworks
  Saved,
  /// Add an artwork to disliked
  Dislike { id: u64 },
  /// Remove an artwork from disliked
  Undislike { id: u64 },
  /// List disliked artworks
  Disliked,
  /// Show or change preferences
  Prefs {
    #[command(subcommand)]
    action: PrefsCommand,
  },
  /// Manage cached query results
  Cache {
    #[command(subcommand)]
    action: CacheCommand,
  },
  /// Page through artworks interactively
  Browse {
    #[command(flatten)]
    filters: FilterArgs,
  },
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommand {
  Get,
  Set {
    #[arg(long, value_enum)]
    theme: Option<Theme>,
    #[arg(long, value_enum)]
    language: Option<Language>,
    /// Show teaching tips (true/false)
    #[arg(long)]
    tips: Option<bool>,
  },
  /// Forget stored preferences
  Clear,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
  /// Drop every cached result, in memory and on disk
  Clear,
}

#[derive(clap::Args, Debug, Default)]
pub struct FilterArgs {
  /// Department title, e.g. "Prints and Drawings"
  #[arg(long)]
  department: Option<String>,
  /// Artwork type title, e.g. "Painting"
  #[arg(long = "type")]
  artwork_type: Option<String>,
}

impl FilterArgs {
  pub fn filters(&self) -> Filters {
    filters_from([
      ("department_title", self.department.as_deref()),
      ("artwork_type_title", self.artwork_type.as_deref()),
    ])
  }
}

/// Everything a command may need.
pub struct Context {
  pub config: Config,
  pub cache: QueryCache,
  pub repo: ArtworkRepository,
  pub saved: ArtworkCollection,
  pub disliked: ArtworkCollection,
  pub prefs: PreferenceStore<SqliteKv>,
}

pub async fn run(command: Command, ctx: &Context) -> Result<()> {
  match command {
    Command::List {
      page,
      limit,
      filters,
    } => {
      let page_size = limit.unwrap_or(ctx.config.api.page_size);
      let result = ctx
        .repo
        .load_page(page, page_size, &filters.filters(), FetchMode::Cached)
        .await
        .map_err(offline_hint)?;
      print_notice(&result);
      println!("{}", render::artwork_list(&result.data.items));
      println!("{}", render::page_footer(&result.data.pagination));
    }
    Command::Show { id } => {
      let result = ctx
        .repo
        .load_by_id(id, FetchMode::Cached)
        .await
        .map_err(offline_hint)?;
      print_notice(&result);
      println!("{}", render::artwork_detail(&result.data, &ctx.config.api.iiif_url));
    }
    Command::Search { query, filters } => {
      let result = ctx
        .repo
        .load_search(&query, &filters.filters(), FetchMode::Cached)
        .await
        .map_err(offline_hint)?;
      print_notice(&result);
      println!("{}", render::artwork_list(&result.data));
    }
    Command::Save { id } => add(ctx, &ctx.saved, id).await?,
    Command::Unsave { id } => remove(&ctx.saved, id)?,
    Command::Saved => println!("{}", render::artwork_list(&ctx.saved.list().await?)),
    Command::Dislike { id } => add(ctx, &ctx.disliked, id).await?,
    Command::Undislike { id } => remove(&ctx.disliked, id)?,
    Command::Disliked => println!("{}", render::artwork_list(&ctx.disliked.list().await?)),
    Command::Prefs { action } => prefs(ctx, action)?,
    Command::Cache {
      action: CacheCommand::Clear,
    } => {
      ctx.cache.clear()?;
      println!("Cleared cached results");
    }
    Command::Browse { filters } => {
      let mut app = App::new(
        ctx.repo.clone(),
        ctx.saved.clone(),
        ctx.disliked.clone(),
        &ctx.config.api,
        filters.filters(),
        stdout(),
      );
      app.run().await?;
    }
  }
  Ok(())
}

async fn add(ctx: &Context, collection: &ArtworkCollection, id: u64) -> Result<()> {
  let name = collection.kind().as_str();
  if collection.contains(id).await? {
    println!("{} is already in {}", id, name);
    return Ok(());
  }

  let artwork = ctx.repo.fetch_by_id(id).await.map_err(offline_hint)?;
  if collection.add(&artwork)? {
    println!("Added \"{}\" to {}", artwork.title, name);
  } else {
    println!("\"{}\" is already in {}", artwork.title, name);
  }
  Ok(())
}

fn remove(collection: &ArtworkCollection, id: u64) -> Result<()> {
  let name = collection.kind().as_str();
  if collection.remove(id)? {
    println!("Removed {} from {}", id, name);
  } else {
    println!("{} is not in {}", id, name);
  }
  Ok(())
}

fn prefs(ctx: &Context, action: PrefsCommand) -> Result<()> {
  match action {
    PrefsCommand::Get => match ctx.prefs.get()? {
      Some(preference) => println!("{}", preference),
      None => println!("{}\n(defaults)", ctx.prefs.load_or_default()?),
    },
    PrefsCommand::Set {
      theme,
      language,
      tips,
    } => {
      let update = PreferenceUpdate {
        theme,
        language,
        show_teaching_tips: tips,
      };
      if update.is_empty() {
        println!("Nothing to change; pass --theme, --language or --tips");
        return Ok(());
      }
      println!("{}", ctx.prefs.update(update)?);
    }
    PrefsCommand::Clear => {
      ctx.prefs.clear()?;
      println!("Preferences cleared");
    }
  }
  Ok(())
}

fn print_notice<T>(result: &crate::cache::CacheResult<T>) {
  if let Some(notice) = render::source_notice(result) {
    eprintln!("{}", notice);
  }
}

/// Point the user at local data when the remote is unreachable.
fn offline_hint(error: ArtError) -> ArtError {
  if should_show_offline_fallback(Some(&error), false) {
    eprintln!("{}", render::offline_view().lines().take(2).collect::<Vec<_>>().join("\n"));
  }
  error
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::Parser;
  use serde_json::Value;

  #[derive(Parser, Debug)]
  struct Cli {
    #[command(subcommand)]
    command: Command,
  }

  fn parse(args: &[&str]) -> Command {
    Cli::try_parse_from(std::iter::once("artvault").chain(args.iter().copied()))
      .unwrap()
      .command
  }

  #[test]
  fn test_list_arguments() {
    let Command::List {
      page,
      limit,
      filters,
    } = parse(&["list", "--page", "3", "--department", "Prints and Drawings"])
    else {
      panic!("expected list");
    };
    assert_eq!(page, 3);
    assert_eq!(limit, None);

    let filters = filters.filters();
    assert_eq!(
      filters.get("department_title"),
      Some(&Some(Value::String("Prints and Drawings".into())))
    );
    assert_eq!(filters.get("artwork_type_title"), Some(&None));
  }

  #[test]
  fn test_prefs_set_arguments() {
    let Command::Prefs {
      action: PrefsCommand::Set {
        theme,
        language,
        tips,
      },
    } = parse(&["prefs", "set", "--theme", "dark", "--tips", "false"])
    else {
      panic!("expected prefs set");
    };
    assert_eq!(theme, Some(Theme::Dark));
    assert_eq!(language, None);
    assert_eq!(tips, Some(false));
  }

  #[test]
  fn test_search_type_filter() {
    let Command::Search { query, filters } = parse(&["search", "monet", "--type", "Painting"])
    else {
      panic!("expected search");
    };
    assert_eq!(query, "monet");
    assert_eq!(
      filters.filters().get("artwork_type_title"),
      Some(&Some(Value::String("Painting".into())))
    );
  }

  #[test]
  fn test_unknown_theme_is_rejected() {
    let result = Cli::try_parse_from(["artvault", "prefs", "set", "--theme", "sepia"]);
    assert!(result.is_err());
  }
}
