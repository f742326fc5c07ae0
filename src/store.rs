use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::fs::create_dir_all;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::fetch::{FeedError, FeedSource, load_feed};

/// A named profile and the feed URLs it follows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub feeds: Vec<String>,
}

impl Profile {
    pub fn new(name: &str) -> Self {
        Profile {
            name: name.to_string(),
            feeds: Vec::new(),
        }
    }

    pub fn has_feed(&self, url: &str) -> bool {
        self.feeds.iter().any(|f| f == url)
    }

    /// Append a feed URL (error if already present)
    pub fn add_feed(&mut self, url: &str) -> Result<(), ProfileError> {
        if self.has_feed(url) {
            return Err(ProfileError::DuplicateFeed(url.to_string()));
        }
        self.feeds.push(url.to_string());
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("'{0}' is not a valid profile name (it must be non-empty and contain no spaces)")]
    InvalidName(String),
    #[error("{0} is already taken!")]
    DuplicateName(String),
    #[error("no profile named '{0}'")]
    NotFound(String),
    #[error("{0} is already in your feeds!")]
    DuplicateFeed(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access profile store '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("profile store '{}' is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize profiles: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// On-disk layouts the store understands. Writes always use `Profiles`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoreDocument {
    Profiles(Vec<Profile>),
    /// TinyDB-style `{"_default": {"1": {...}, "2": {...}}}`
    Tables(BTreeMap<String, BTreeMap<String, Profile>>),
}

const DEFAULT_TABLE: &str = "_default";

impl StoreDocument {
    fn into_profiles(self) -> Vec<Profile> {
        match self {
            StoreDocument::Profiles(profiles) => profiles,
            StoreDocument::Tables(mut tables) => {
                let Some(table) = tables.remove(DEFAULT_TABLE) else {
                    return Vec::new();
                };
                // document ids are numeric strings; "10" sorts after "9"
                let mut docs: Vec<(u64, Profile)> = table
                    .into_iter()
                    .map(|(id, profile)| (id.parse().unwrap_or(u64::MAX), profile))
                    .collect();
                docs.sort_by_key(|(id, _)| *id);
                docs.into_iter().map(|(_, profile)| profile).collect()
            }
        }
    }
}

/// How one candidate URL fared in [`ProfileStore::add_feeds`]
#[derive(Debug)]
pub enum FeedOutcome {
    Added,
    Duplicate,
    Invalid(FeedError),
}

/// Per-URL outcomes, in the order the candidates were given
#[derive(Debug, Default)]
pub struct AddReport {
    pub outcomes: Vec<(String, FeedOutcome)>,
}

impl AddReport {
    pub fn added(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, FeedOutcome::Added))
            .map(|(url, _)| url.as_str())
    }
}

/// Profile names must be non-empty and free of whitespace.
pub fn validate_name(name: &str) -> Result<(), ProfileError> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(ProfileError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// JSON-backed collection of profiles, written back on every mutation.
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    profiles: Vec<Profile>,
}

impl ProfileStore {
    /// Load profiles from JSON (or start empty if the file is missing or blank)
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let io_err = |source: io::Error| StoreError::Io {
            path: path.clone(),
            source,
        };

        if !path.exists() {
            if let Some(parent) = path.parent() {
                create_dir_all(parent).map_err(io_err)?;
            }
            return Ok(ProfileStore {
                path,
                profiles: Vec::new(),
            });
        }

        let contents = fs::read_to_string(&path).map_err(io_err)?;
        let profiles = if contents.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str::<StoreDocument>(&contents)
                .map_err(|source| StoreError::Corrupt {
                    path: path.clone(),
                    source,
                })?
                .into_profiles()
        };

        tracing::debug!(path = %path.display(), count = profiles.len(), "loaded profiles");
        Ok(ProfileStore { path, profiles })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    fn find_index(&self, name: &str) -> Option<usize> {
        self.profiles.iter().position(|p| same_name(&p.name, name))
    }

    /// Case-insensitive lookup
    pub fn find_by_name(&self, name: &str) -> Option<&Profile> {
        self.find_index(name).map(|i| &self.profiles[i])
    }

    /// Create an empty profile and persist it
    pub fn create(&mut self, name: &str) -> Result<&Profile, StoreError> {
        validate_name(name)?;
        if self.find_index(name).is_some() {
            return Err(ProfileError::DuplicateName(name.to_string()).into());
        }

        self.profiles.push(Profile::new(name));
        if let Err(err) = self.save() {
            self.profiles.pop();
            return Err(err);
        }

        tracing::info!(profile = name, "created profile");
        let idx = self.profiles.len() - 1;
        Ok(&self.profiles[idx])
    }

    /// Validate each candidate by fetching and parsing it, then append the
    /// valid, not-yet-present ones to the profile's feed list.
    ///
    /// Invalid and duplicate candidates are reported in the returned
    /// [`AddReport`] and skipped; the rest of the batch carries on.
    pub async fn add_feeds<S: FeedSource>(
        &mut self,
        profile_name: &str,
        candidates: &[String],
        source: &S,
    ) -> Result<AddReport, StoreError> {
        let idx = self
            .find_index(profile_name)
            .ok_or_else(|| ProfileError::NotFound(profile_name.to_string()))?;
        let previous = self.profiles[idx].feeds.clone();

        let mut report = AddReport::default();
        for url in candidates {
            let outcome = match load_feed(source, url).await {
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "rejected feed");
                    FeedOutcome::Invalid(err)
                }
                Ok(_) => match self.profiles[idx].add_feed(url) {
                    Ok(()) => FeedOutcome::Added,
                    Err(_) => FeedOutcome::Duplicate,
                },
            };
            report.outcomes.push((url.clone(), outcome));
        }

        if report.added().next().is_some() {
            if let Err(err) = self.save() {
                self.profiles[idx].feeds = previous;
                return Err(err);
            }
            tracing::info!(
                profile = %self.profiles[idx].name,
                added = report.added().count(),
                "added feeds"
            );
        }

        Ok(report)
    }

    fn save(&self) -> Result<(), StoreError> {
        let io_err = |source: io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.profiles).map_err(StoreError::Serialize)?;
        fs::write(&self.path, json).map_err(io_err)?;

        tracing::debug!(path = %self.path.display(), "saved profiles");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const ONE_ITEM_RSS: &str = "<rss><channel><title>Stub</title>\
        <item><title>t</title><description>d</description><link>l</link><pubDate>p</pubDate></item>\
        </channel></rss>";

    #[derive(Default)]
    struct StubSource {
        responses: HashMap<String, Result<String, u16>>,
    }

    impl StubSource {
        fn with(mut self, url: &str, response: Result<&str, u16>) -> Self {
            self.responses
                .insert(url.to_string(), response.map(str::to_string));
            self
        }
    }

    impl FeedSource for StubSource {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            match self.responses.get(url) {
                Some(Ok(body)) => Ok(body.clone().into_bytes()),
                Some(Err(status)) => Err(FetchError::HttpStatus(*status)),
                None => Err(FetchError::InvalidUrl(url.to_string())),
            }
        }
    }

    fn setup_store() -> (TempDir, ProfileStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = ProfileStore::open(temp_dir.path().join("profiles.json")).unwrap();
        (temp_dir, store)
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_file_opens_empty_and_creates_parent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("profiles.json");

        let store = ProfileStore::open(&path).unwrap();
        assert!(store.profiles().is_empty());
        assert!(temp_dir.path().join("nested").is_dir());
        assert!(!path.exists());
    }

    #[test]
    fn blank_file_opens_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("profiles.json");
        fs::write(&path, "  \n").unwrap();

        assert!(ProfileStore::open(&path).unwrap().profiles().is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("profiles.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            ProfileStore::open(&path),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn reads_tinydb_layout_in_document_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("profiles.json");
        fs::write(
            &path,
            r#"{"_default": {
                "10": {"name": "zed", "feeds": []},
                "2": {"name": "bob", "feeds": ["https://b/rss"]},
                "1": {"name": "ann", "feeds": []}
            }}"#,
        )
        .unwrap();

        let store = ProfileStore::open(&path).unwrap();
        let names: Vec<_> = store.profiles().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["ann", "bob", "zed"]);
        assert_eq!(store.find_by_name("BOB").unwrap().feeds, vec!["https://b/rss"]);
    }

    #[test]
    fn tinydb_layout_is_rewritten_as_array_on_next_change() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("profiles.json");
        fs::write(
            &path,
            r#"{"_default": {"1": {"name": "ann", "feeds": ["https://a/rss"]}}}"#,
        )
        .unwrap();

        let mut store = ProfileStore::open(&path).unwrap();
        store.create("bob").unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!([
                {"name": "ann", "feeds": ["https://a/rss"]},
                {"name": "bob", "feeds": []}
            ])
        );
    }

    #[test]
    fn failed_create_leaves_store_unchanged() {
        let (_dir, mut store) = setup_store();
        // a directory in place of the file makes every write fail
        fs::create_dir(store.path()).unwrap();

        assert!(matches!(store.create("Alice"), Err(StoreError::Io { .. })));
        assert!(store.find_by_name("Alice").is_none());
    }

    #[test]
    fn create_persists_array_layout() {
        let (_dir, mut store) = setup_store();
        store.create("Alice").unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!([{"name": "Alice", "feeds": []}]));

        let reopened = ProfileStore::open(store.path()).unwrap();
        assert_eq!(reopened.profiles(), &[Profile::new("Alice")]);
    }

    #[test]
    fn find_by_name_ignores_case() {
        let (_dir, mut store) = setup_store();
        store.create("Alice").unwrap();

        assert_eq!(store.find_by_name("aLiCe").unwrap().name, "Alice");
        assert!(store.find_by_name("bob").is_none());
    }

    #[test]
    fn empty_name_is_invalid() {
        let (_dir, mut store) = setup_store();
        assert!(matches!(
            store.create(""),
            Err(StoreError::Profile(ProfileError::InvalidName(_)))
        ));
    }

    #[test]
    fn profile_add_feed_rejects_duplicates() {
        let mut profile = Profile::new("p");
        profile.add_feed("https://a/rss").unwrap();
        assert_eq!(
            profile.add_feed("https://a/rss"),
            Err(ProfileError::DuplicateFeed("https://a/rss".into()))
        );
        assert_eq!(profile.feeds, vec!["https://a/rss"]);
    }

    #[tokio::test]
    async fn adding_same_feed_twice_keeps_one_copy() {
        let (_dir, mut store) = setup_store();
        store.create("Alice").unwrap();
        let source = StubSource::default().with("https://example.com/rss", Ok(ONE_ITEM_RSS));
        let batch = urls(&["https://example.com/rss"]);

        let first = store.add_feeds("Alice", &batch, &source).await.unwrap();
        assert!(matches!(first.outcomes[0].1, FeedOutcome::Added));

        let second = store.add_feeds("alice", &batch, &source).await.unwrap();
        assert!(matches!(second.outcomes[0].1, FeedOutcome::Duplicate));

        let reopened = ProfileStore::open(store.path()).unwrap();
        assert_eq!(
            reopened.find_by_name("Alice").unwrap().feeds,
            vec!["https://example.com/rss"]
        );
    }

    #[tokio::test]
    async fn batch_skips_bad_and_duplicate_urls_and_keeps_going() {
        let (_dir, mut store) = setup_store();
        store.create("Alice").unwrap();
        let source = StubSource::default()
            .with("https://a/rss", Ok(ONE_ITEM_RSS))
            .with("https://gone/rss", Err(404))
            .with("https://html/page", Ok("<html><body/></html>"))
            .with("https://b/rss", Ok(ONE_ITEM_RSS));
        let batch = urls(&[
            "https://a/rss",
            "https://gone/rss",
            "https://a/rss",
            "https://html/page",
            "https://b/rss",
        ]);

        let report = store.add_feeds("Alice", &batch, &source).await.unwrap();
        let kinds: Vec<_> = report
            .outcomes
            .iter()
            .map(|(_, o)| match o {
                FeedOutcome::Added => "added",
                FeedOutcome::Duplicate => "duplicate",
                FeedOutcome::Invalid(_) => "invalid",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["added", "invalid", "duplicate", "invalid", "added"]
        );
        assert_eq!(
            store.find_by_name("Alice").unwrap().feeds,
            vec!["https://a/rss", "https://b/rss"]
        );
    }

    #[tokio::test]
    async fn add_feeds_to_unknown_profile_fails() {
        let (_dir, mut store) = setup_store();
        let err = store
            .add_feeds("ghost", &urls(&["https://a/rss"]), &StubSource::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Profile(ProfileError::NotFound(ref n)) if n == "ghost"
        ));
    }

    proptest! {
        #[test]
        fn names_differing_only_in_case_collide(name in "[a-zA-Z]{1,12}") {
            let (_dir, mut store) = setup_store();
            store.create(&name).unwrap();

            let flipped: String = name
                .chars()
                .map(|c| if c.is_ascii_uppercase() { c.to_ascii_lowercase() } else { c.to_ascii_uppercase() })
                .collect();
            let err = store.create(&flipped).unwrap_err();
            prop_assert!(matches!(err, StoreError::Profile(ProfileError::DuplicateName(_))));
            prop_assert_eq!(store.profiles().len(), 1);
        }

        #[test]
        fn names_with_spaces_are_rejected_and_not_written(
            head in "[a-zA-Z0-9]{0,6}",
            tail in "[a-zA-Z0-9]{0,6}",
        ) {
            let (_dir, mut store) = setup_store();
            let name = format!("{head} {tail}");

            let err = store.create(&name).unwrap_err();
            prop_assert!(matches!(err, StoreError::Profile(ProfileError::InvalidName(_))));
            prop_assert!(store.profiles().is_empty());
            prop_assert!(!store.path().exists());
        }
    }
}
