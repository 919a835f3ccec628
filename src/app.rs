use color_eyre::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::art::{ArtQueryKey, Artwork, ArtworkPage, ArtworkRepository, Filters};
use crate::collections::ArtworkCollection;
use crate::config::ApiConfig;
use crate::connectivity::ConnectivityEvent;
use crate::offline::{FallbackAction, OfflineFallback};
use crate::query::{Query, QueryState};
use crate::render;

const HELP: &str = concat!(
  "[n] next  [p] previous  [o <id>] open  [b] back  ",
  "[s <id>] save  [d <id>] dislike  [r] retry  [h] home  [q] quit"
);

/// A screen on the navigation stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
  List { page: u32 },
  Detail { id: u64 },
}

/// Data behind the current screen
#[derive(Debug, Clone)]
enum Screen {
  Page(ArtworkPage),
  Detail(Artwork),
}

/// Interactive pager over the artwork list.
pub struct App<W: Write> {
  repo: ArtworkRepository,
  saved: ArtworkCollection,
  disliked: ArtworkCollection,
  filters: Filters,
  page_size: u32,
  iiif_url: String,

  /// Navigation stack - root is always the list
  view_stack: Vec<View>,

  /// Query for the screen on top of the stack
  query: Option<Query<Screen>>,

  fallback: OfflineFallback,
  out: W,
  should_quit: bool,
}

impl<W: Write> App<W> {
  pub fn new(
    repo: ArtworkRepository,
    saved: ArtworkCollection,
    disliked: ArtworkCollection,
    api: &ApiConfig,
    filters: Filters,
    out: W,
  ) -> Self {
    Self {
      repo,
      saved,
      disliked,
      filters,
      page_size: api.page_size,
      iiif_url: api.iiif_url.clone(),
      view_stack: vec![View::List { page: 1 }],
      query: None,
      fallback: OfflineFallback::new(),
      out,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut events = self.repo.cache().connectivity().events();

    self.load();
    self.draw()?;

    while !self.should_quit {
      let loading = self.is_loading();
      tokio::select! {
        settled = settle(self.query.as_mut()), if loading => {
          if settled {
            self.on_settled();
            self.draw()?;
          }
        }
        line = input.next_line() => match line? {
          Some(line) => self.handle_line(&line).await?,
          None => self.should_quit = true,
        },
        Some(event) = events.next() => self.handle_connectivity(event)?,
      }
    }

    Ok(())
  }

  fn current_view(&self) -> View {
    self.view_stack.last().copied().unwrap_or(View::List { page: 1 })
  }

  fn is_loading(&self) -> bool {
    self.query.as_ref().is_some_and(|q| q.is_loading())
  }

  fn data(&self) -> Option<&Screen> {
    self.query.as_ref().and_then(|q| q.data())
  }

  /// Replace the query with one for the view on top of the stack.
  fn load(&mut self) {
    self.fallback = OfflineFallback::new();
    let mut query = self.query_for(self.current_view());
    query.fetch();
    self.query = Some(query);
  }

  fn query_for(&self, view: View) -> Query<Screen> {
    let repo = self.repo.clone();
    match view {
      View::List { page } => {
        let page_size = self.page_size;
        let filters = self.filters.clone();
        let key = ArtQueryKey::page(page, page_size, &filters);
        Query::new(self.repo.cache(), &key, move |mode| {
          let repo = repo.clone();
          let filters = filters.clone();
          async move {
            let result = repo.load_page(page, page_size, &filters, mode).await;
            result.map(|r| r.map(Screen::Page))
          }
        })
      }
      View::Detail { id } => {
        let key = ArtQueryKey::ArtworkDetail { id };
        Query::new(self.repo.cache(), &key, move |mode| {
          let repo = repo.clone();
          async move {
            let result = repo.load_by_id(id, mode).await;
            result.map(|r| r.map(Screen::Detail))
          }
        })
      }
    }
  }

  fn on_settled(&mut self) {
    let Some(query) = &self.query else {
      return;
    };
    match query.state() {
      QueryState::Success(result) => match &result.error {
        Some(err) => self.fallback.on_fetch_error(err, true),
        None => self.fallback.on_fetch_success(),
      },
      QueryState::Error(err) => self.fallback.on_fetch_error(err, false),
      QueryState::Idle | QueryState::Loading => {}
    }
  }

  fn handle_connectivity(&mut self, event: ConnectivityEvent) -> Result<()> {
    debug!("browse: {:?}", event);
    if event == ConnectivityEvent::Reconnected {
      let action = self.fallback.on_reconnect();
      if action != FallbackAction::None {
        self.apply(action);
        self.draw()?;
      }
    }
    Ok(())
  }

  fn apply(&mut self, action: FallbackAction) {
    match action {
      FallbackAction::None => {}
      FallbackAction::Refetch => match &mut self.query {
        Some(query) => query.refetch(),
        None => self.load(),
      },
      FallbackAction::RefetchNow => match &mut self.query {
        Some(query) => query.retry_now(),
        None => self.load(),
      },
      FallbackAction::NavigateHome => {
        self.view_stack = vec![View::List { page: 1 }];
        self.load();
      }
    }
  }

  async fn handle_line(&mut self, line: &str) -> Result<()> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
      // An empty line means the user is back at the prompt.
      (None, _) => {
        if self.repo.cache().on_window_focus() > 0 {
          if let Some(query) = &mut self.query {
            query.fetch();
          }
        }
      }
      (Some("q"), _) => {
        self.should_quit = true;
        return Ok(());
      }
      (Some("n"), _) => self.turn_page(1)?,
      (Some("p"), _) => self.turn_page(-1)?,
      (Some("b"), _) => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
          self.load();
        }
      }
      (Some("r"), _) => {
        let action = self.fallback.retry_now();
        self.apply(action);
      }
      (Some("h"), _) => {
        let action = self.fallback.navigate_home();
        self.apply(action);
      }
      (Some("o"), Some(id)) => match id.parse() {
        Ok(id) => {
          self.view_stack.push(View::Detail { id });
          self.load();
        }
        Err(_) => writeln!(self.out, "Not an artwork id: {}", id)?,
      },
      (Some("s"), Some(id)) => return self.add_to(true, id).await,
      (Some("d"), Some(id)) => return self.add_to(false, id).await,
      _ => {
        writeln!(self.out, "{}", HELP)?;
        return Ok(());
      }
    }
    self.draw()
  }

  fn turn_page(&mut self, delta: i32) -> Result<()> {
    let View::List { page } = self.current_view() else {
      return Ok(());
    };
    if delta > 0 {
      if let Some(Screen::Page(current)) = self.data() {
        if !current.pagination.has_next() {
          writeln!(self.out, "Already on the last page")?;
          return Ok(());
        }
      }
    }
    let next = page.saturating_add_signed(delta).max(1);
    if next != page {
      if let Some(top) = self.view_stack.last_mut() {
        *top = View::List { page: next };
      }
      self.load();
    }
    Ok(())
  }

  /// Add `id` to saved (`true`) or disliked (`false`).
  async fn add_to(&mut self, saved: bool, id: &str) -> Result<()> {
    let Ok(id) = id.parse::<u64>() else {
      writeln!(self.out, "Not an artwork id: {}", id)?;
      return Ok(());
    };

    let artwork = match self.visible_artwork(id) {
      Some(artwork) => artwork,
      None => match self.repo.fetch_by_id(id).await {
        Ok(artwork) => artwork,
        Err(e) => {
          writeln!(self.out, "Could not load artwork {}: {}", id, e)?;
          return Ok(());
        }
      },
    };

    let collection = if saved { &self.saved } else { &self.disliked };
    let name = collection.kind().as_str();
    match collection.add(&artwork) {
      Ok(true) => writeln!(self.out, "Added \"{}\" to {}", artwork.title, name)?,
      Ok(false) => writeln!(self.out, "\"{}\" is already in {}", artwork.title, name)?,
      Err(e) => writeln!(self.out, "Could not update {}: {}", name, e)?,
    }
    Ok(())
  }

  /// Artwork `id` from the current screen or any cached detail.
  fn visible_artwork(&self, id: u64) -> Option<Artwork> {
    let on_screen = match self.data() {
      Some(Screen::Page(page)) => page.items.iter().find(|a| a.id == id).cloned(),
      Some(Screen::Detail(artwork)) => Some(artwork.clone()).filter(|a| a.id == id),
      None => None,
    };
    on_screen.or_else(|| {
      self
        .repo
        .cache()
        .get_query_data(&ArtQueryKey::ArtworkDetail { id })
    })
  }

  fn label(&self) -> String {
    match self.current_view() {
      View::List { page } => format!("artworks page {}", page),
      View::Detail { id } => format!("artwork {}", id),
    }
  }

  fn render(&self) -> String {
    if self.fallback.is_offline() {
      let mut view = render::offline_view().to_string();
      if self.is_loading() {
        view.push_str("\nRetrying...");
      }
      return view;
    }

    let Some(query) = &self.query else {
      return String::new();
    };
    match query.state() {
      QueryState::Idle => String::new(),
      QueryState::Loading if !self.repo.cache().connectivity().is_online() => {
        format!("Loading {} (offline, retrying)...", self.label())
      }
      QueryState::Loading => format!("Loading {}...", self.label()),
      QueryState::Error(e) => format!("Could not load {}: {}\n{}", self.label(), e, HELP),
      QueryState::Success(result) => {
        let body = match &result.data {
          Screen::Page(page) => format!(
            "{}\n{}",
            render::artwork_list(&page.items),
            render::page_footer(&page.pagination)
          ),
          Screen::Detail(artwork) => render::artwork_detail(artwork, &self.iiif_url),
        };
        match render::source_notice(result) {
          Some(notice) => format!("{}\n{}", notice, body),
          None => body,
        }
      }
    }
  }

  fn draw(&mut self) -> Result<()> {
    let screen = self.render();
    writeln!(self.out, "\n{}", screen)?;
    write!(self.out, "> ")?;
    self.out.flush()?;
    Ok(())
  }
}

async fn settle(query: Option<&mut Query<Screen>>) -> bool {
  match query {
    Some(query) => query.settled().await,
    None => false,
  }
}
