//! User preference record.
//!
//! The record is stored whole, as one JSON document under a single key.
//! Nothing writes the default on first read; callers that need concrete
//! values use [`PreferenceStore::load_or_default`].

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::error::{ArtError, Result};
use crate::platform::KeyValueStore;

const PREFERENCE_KEY: &str = "user_preference";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
  #[default]
  Light,
  Dark,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  #[default]
  En,
  Id,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preference {
  pub theme: Theme,
  pub language: Language,
  pub show_teaching_tips: bool,
}

impl Default for Preference {
  fn default() -> Self {
    Self {
      theme: Theme::Light,
      language: Language::En,
      show_teaching_tips: true,
    }
  }
}

impl fmt::Display for Preference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let theme = match self.theme {
      Theme::Light => "light",
      Theme::Dark => "dark",
    };
    let language = match self.language {
      Language::En => "en",
      Language::Id => "id",
    };
    write!(
      f,
      "theme: {}\nlanguage: {}\nteaching tips: {}",
      theme,
      language,
      if self.show_teaching_tips { "on" } else { "off" }
    )
  }
}

/// Fields to change; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct PreferenceUpdate {
  pub theme: Option<Theme>,
  pub language: Option<Language>,
  pub show_teaching_tips: Option<bool>,
}

impl PreferenceUpdate {
  pub fn is_empty(&self) -> bool {
    self.theme.is_none() && self.language.is_none() && self.show_teaching_tips.is_none()
  }

  fn apply(self, current: Preference) -> Preference {
    Preference {
      theme: self.theme.unwrap_or(current.theme),
      language: self.language.unwrap_or(current.language),
      show_teaching_tips: self.show_teaching_tips.unwrap_or(current.show_teaching_tips),
    }
  }
}

pub struct PreferenceStore<K: KeyValueStore> {
  store: K,
}

impl<K: KeyValueStore> PreferenceStore<K> {
  pub fn new(store: K) -> Self {
    Self { store }
  }

  /// The stored preference, or `None` if it was never set.
  pub fn get(&self) -> Result<Option<Preference>> {
    let Some(raw) = self.store.get(PREFERENCE_KEY)? else {
      return Ok(None);
    };
    serde_json::from_str(&raw).map(Some).map_err(|e| {
      warn!("Stored preference is unreadable: {}", e);
      ArtError::storage(format!("Failed to parse preference: {}", e))
    })
  }

  /// Overwrite the whole record.
  pub fn set(&self, preference: &Preference) -> Result<()> {
    let raw = serde_json::to_string(preference)
      .map_err(|e| ArtError::storage(format!("Failed to serialize preference: {}", e)))?;
    self.store.set(PREFERENCE_KEY, &raw)?;
    debug!("Saved preference {:?}", preference);
    Ok(())
  }

  pub fn clear(&self) -> Result<()> {
    self.store.remove(PREFERENCE_KEY)
  }

  pub fn load_or_default(&self) -> Result<Preference> {
    Ok(self.get()?.unwrap_or_default())
  }

  /// Merge `update` into the current record and store the result.
  pub fn update(&self, update: PreferenceUpdate) -> Result<Preference> {
    let merged = update.apply(self.load_or_default()?);
    self.set(&merged)?;
    Ok(merged)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::Database;
  use crate::platform::{MemoryKv, SqliteKv};

  fn store() -> PreferenceStore<MemoryKv> {
    PreferenceStore::new(MemoryKv::default())
  }

  #[test]
  fn test_round_trip() {
    let prefs = PreferenceStore::new(SqliteKv::new(Database::open_in_memory().unwrap()));
    let preference = Preference {
      theme: Theme::Dark,
      language: Language::Id,
      show_teaching_tips: false,
    };

    prefs.set(&preference).unwrap();
    assert_eq!(prefs.get().unwrap(), Some(preference));
  }

  #[test]
  fn test_clear_then_get_is_none() {
    let prefs = store();
    prefs.set(&Preference::default()).unwrap();

    prefs.clear().unwrap();

    assert_eq!(prefs.get().unwrap(), None);
  }

  #[test]
  fn test_default_is_not_written_on_read() {
    let prefs = store();
    assert_eq!(prefs.load_or_default().unwrap(), Preference::default());
    assert_eq!(prefs.get().unwrap(), None);
  }

  #[test]
  fn test_update_merges_with_current() {
    let prefs = store();
    prefs
      .update(PreferenceUpdate {
        theme: Some(Theme::Dark),
        ..Default::default()
      })
      .unwrap();

    let merged = prefs
      .update(PreferenceUpdate {
        show_teaching_tips: Some(false),
        ..Default::default()
      })
      .unwrap();

    assert_eq!(
      merged,
      Preference {
        theme: Theme::Dark,
        language: Language::En,
        show_teaching_tips: false,
      }
    );
    assert_eq!(prefs.get().unwrap(), Some(merged));
  }

  #[test]
  fn test_stored_format() {
    let kv = MemoryKv::default();
    kv.set(PREFERENCE_KEY, r#"{"theme":"dark","language":"en","showTeachingTips":true}"#)
      .unwrap();
    let prefs = PreferenceStore::new(kv);

    assert_eq!(prefs.get().unwrap().unwrap().theme, Theme::Dark);
  }

  #[test]
  fn test_corrupt_record_is_a_storage_error() {
    let kv = MemoryKv::default();
    kv.set(PREFERENCE_KEY, "not json").unwrap();
    let prefs = PreferenceStore::new(kv);

    assert!(matches!(prefs.get(), Err(ArtError::Storage { .. })));
  }
}
