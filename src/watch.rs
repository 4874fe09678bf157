//! Change detection for the watched document folder.
//!
//! Both ingestion strategies — a timer-based folder scan and an OS
//! file-event subscription — reduce to one interface: a [`ChangeDetector`]
//! that diffs the world against the coordinator's processed set and reports
//! which sources appeared and which disappeared. The coordinator drives
//! whichever detector it is given.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{Config as NotifyConfig, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use walkdir::WalkDir;

use crate::config::WatchConfig;
use crate::ingest::source_id;

/// Sources that appeared on disk and sources that are gone.
#[derive(Debug, Default, Clone)]
pub struct ChangeSet {
    pub added: Vec<PathBuf>,
    pub removed: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// A pluggable ingestion strategy.
pub trait ChangeDetector {
    /// Diff the observed file set against the already-processed sources.
    fn detect_changes(&mut self, processed: &BTreeSet<String>) -> Result<ChangeSet>;
}

/// Timer-friendly strategy: scan the watch folder on every call and diff
/// against the processed set.
pub struct PollDetector {
    root: PathBuf,
    root_prefix: String,
    include: GlobSet,
}

impl PollDetector {
    pub fn new(config: &WatchConfig) -> Result<Self> {
        if !config.folder.exists() {
            std::fs::create_dir_all(&config.folder)?;
        }

        Ok(Self {
            root_prefix: format!("{}{}", source_id(&config.folder), std::path::MAIN_SEPARATOR),
            root: config.folder.clone(),
            include: build_globset(&config.include_globs)?,
        })
    }

    fn scan(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();

        for entry in WalkDir::new(&self.root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            if self.include.is_match(relative) {
                paths.push(path.to_path_buf());
            }
        }

        paths.sort();
        Ok(paths)
    }
}

impl ChangeDetector for PollDetector {
    fn detect_changes(&mut self, processed: &BTreeSet<String>) -> Result<ChangeSet> {
        let on_disk = self.scan()?;
        let on_disk_ids: BTreeSet<String> = on_disk.iter().map(|p| source_id(p)).collect();

        let added: Vec<PathBuf> = on_disk
            .into_iter()
            .filter(|p| !processed.contains(&source_id(p)))
            .collect();

        // Only sources under the watched folder are subject to
        // disappearance; files ingested explicitly from elsewhere stay.
        let removed: Vec<String> = processed
            .iter()
            .filter(|s| s.starts_with(&self.root_prefix) && !on_disk_ids.contains(*s))
            .cloned()
            .collect();

        Ok(ChangeSet { added, removed })
    }
}

/// Event-driven strategy: subscribe to OS file notifications and translate
/// buffered events into a change set. The first call falls back to a full
/// scan so files that existed before the watcher started are picked up.
pub struct EventDetector {
    scanner: PollDetector,
    include: GlobSet,
    root: PathBuf,
    receiver: Receiver<notify::Result<notify::Event>>,
    _watcher: RecommendedWatcher,
    primed: bool,
}

impl EventDetector {
    pub fn new(config: &WatchConfig) -> Result<Self> {
        let scanner = PollDetector::new(config)?;

        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            NotifyConfig::default(),
        )?;
        watcher.watch(&config.folder, RecursiveMode::Recursive)?;

        Ok(Self {
            scanner,
            include: build_globset(&config.include_globs)?,
            root: config.folder.clone(),
            receiver: rx,
            _watcher: watcher,
            primed: false,
        })
    }

    fn matches(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.include.is_match(relative)
    }
}

impl ChangeDetector for EventDetector {
    fn detect_changes(&mut self, processed: &BTreeSet<String>) -> Result<ChangeSet> {
        if !self.primed {
            self.primed = true;
            return self.scanner.detect_changes(processed);
        }

        let mut added_ids = BTreeSet::new();
        let mut added = Vec::new();
        let mut removed = BTreeSet::new();

        for event in self.receiver.try_iter() {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("file watch error: {}", e);
                    continue;
                }
            };

            match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) => {
                    for path in &event.paths {
                        if !self.matches(path) || !path.is_file() {
                            continue;
                        }
                        let id = source_id(path);
                        if !processed.contains(&id) && added_ids.insert(id) {
                            added.push(path.clone());
                        }
                    }
                }
                EventKind::Remove(_) => {
                    for path in &event.paths {
                        if !self.matches(path) {
                            continue;
                        }
                        let id = source_id(path);
                        if processed.contains(&id) {
                            removed.insert(id);
                        }
                    }
                }
                _ => {}
            }
        }

        added.sort();
        Ok(ChangeSet {
            added,
            removed: removed.into_iter().collect(),
        })
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
