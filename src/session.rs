//! Configuration session
//!
//! Owns the loaded configuration and the selection tree for the duration of
//! one editing session. Nothing is written unless a validation run passes.

use log::info;

use crate::models::{AgentConfiguration, ConfigurationSnapshot, ValidationReport};
use crate::store::{ChannelCatalog, ConfigStore, StoreError};
use crate::tree::PathTree;
use crate::validation::{SkipSet, ValidationPipeline};

/// Result of `ConfigSession::save`
#[derive(Debug)]
pub enum SaveOutcome {
    Saved(ValidationReport),
    /// Nothing was written; the snapshot carries the field markers
    Rejected {
        report: ValidationReport,
        snapshot: ConfigurationSnapshot,
    },
}

pub struct ConfigSession<S: ConfigStore> {
    store: S,
    config: AgentConfiguration,
    tree: PathTree,
}

impl<S: ConfigStore> ConfigSession<S> {
    /// Load the configuration and rebuild the tree with the persisted selection
    pub fn open<C: ChannelCatalog>(store: S, catalog: &C) -> Result<Self, StoreError> {
        let config = store.read()?;
        let channels = catalog.all_channel_paths()?;
        let selected = catalog.selected_channel_paths()?;

        let mut tree = PathTree::build(&channels);
        tree.reset(false);
        let applied = tree.apply_selection(&selected);
        info!(
            "Loaded {} channels, {} of {} persisted selections still present",
            tree.leaf_count(),
            applied,
            selected.len()
        );

        Ok(Self { store, config, tree })
    }

    pub fn configuration(&self) -> &AgentConfiguration {
        &self.config
    }

    pub fn tree(&self) -> &PathTree {
        &self.tree
    }

    pub fn set_all_channels(&mut self, value: bool) {
        self.tree.set_all_checked(value);
    }

    pub fn set_channel_checked(&mut self, path: &str, value: bool) -> bool {
        self.tree.set_channel_checked(path, value)
    }

    /// Exact-set selection: clear, then apply
    pub fn replace_selection<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        self.tree.reset(false);
        self.tree.apply_selection(paths)
    }

    pub fn selected_channels(&self) -> Vec<String> {
        self.tree.selected_leaf_paths().map(str::to_string).collect()
    }

    /// Fresh snapshot of the current state for one validation run
    pub fn snapshot(&self) -> ConfigurationSnapshot {
        ConfigurationSnapshot::from_configuration(&self.config, self.selected_channels())
    }

    /// Persist a snapshot that already passed validation
    pub fn commit(&mut self, snapshot: &ConfigurationSnapshot) -> Result<(), StoreError> {
        let updated = snapshot.apply_to(&self.config)?;
        self.store.write(&updated)?;
        self.config = updated;
        Ok(())
    }

    /// Validate a fresh snapshot and write it only if every step passed
    pub fn save(
        &mut self,
        pipeline: &mut ValidationPipeline<'_>,
        skip: &SkipSet,
    ) -> Result<SaveOutcome, StoreError> {
        let mut snapshot = self.snapshot();
        let report = pipeline.run(&mut snapshot, skip);
        if !report.is_success() {
            return Ok(SaveOutcome::Rejected { report, snapshot });
        }

        self.commit(&snapshot)?;
        info!("Configuration saved with {} channels", snapshot.selected_channels.len());
        Ok(SaveOutcome::Saved(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct MemoryStore {
        stored: RefCell<AgentConfiguration>,
        writes: RefCell<usize>,
    }

    impl ConfigStore for &MemoryStore {
        fn read(&self) -> Result<AgentConfiguration, StoreError> {
            Ok(self.stored.borrow().clone())
        }

        fn write(&self, config: &AgentConfiguration) -> Result<(), StoreError> {
            *self.stored.borrow_mut() = config.clone();
            *self.writes.borrow_mut() += 1;
            Ok(())
        }
    }

    struct MemoryCatalog {
        all: Vec<String>,
        selected: Vec<String>,
    }

    impl ChannelCatalog for MemoryCatalog {
        fn all_channel_paths(&self) -> Result<Vec<String>, StoreError> {
            Ok(self.all.clone())
        }

        fn selected_channel_paths(&self) -> Result<Vec<String>, StoreError> {
            Ok(self.selected.clone())
        }
    }

    fn catalog(selected: &[&str]) -> MemoryCatalog {
        MemoryCatalog {
            all: ["Application", "Security", "System-Log/Security", "Vendor-App/Admin"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            selected: selected.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn passing_pipeline() -> ValidationPipeline<'static> {
        ValidationPipeline::new().step("Always", |_: &mut ConfigurationSnapshot| Ok(None))
    }

    #[test]
    fn test_open_applies_persisted_selection() {
        let store = MemoryStore::default();
        let session = ConfigSession::open(&store, &catalog(&["Security", "Removed-Channel"])).unwrap();

        assert_eq!(session.selected_channels(), vec!["Security"]);
        assert_eq!(session.snapshot().selected_channels, vec!["Security"]);
    }

    #[test]
    fn test_toggles() {
        let store = MemoryStore::default();
        let mut session = ConfigSession::open(&store, &catalog(&[])).unwrap();

        session.set_all_channels(true);
        assert_eq!(session.selected_channels().len(), 4);

        session.set_all_channels(false);
        assert!(session.set_channel_checked("Vendor-App", true));
        assert_eq!(session.selected_channels(), vec!["Vendor-App/Admin"]);

        assert_eq!(session.replace_selection(["Application"]), 1);
        assert_eq!(session.selected_channels(), vec!["Application"]);
    }

    #[test]
    fn test_save_writes_only_after_pass() {
        let store = MemoryStore::default();
        let mut session = ConfigSession::open(&store, &catalog(&[])).unwrap();
        session.set_channel_checked("System-Log/Security", true);

        let mut failing = ValidationPipeline::new().step("Never", |snapshot: &mut ConfigurationSnapshot| {
            snapshot.primary.host.mark(false);
            Ok(Some("Invalid primary host".to_string()))
        });
        match session.save(&mut failing, &SkipSet::new()).unwrap() {
            SaveOutcome::Rejected { report, snapshot } => {
                assert_eq!(report.failure().unwrap().message, "Invalid primary host");
                assert_eq!(snapshot.invalid_fields(), vec!["primary.host"]);
            }
            SaveOutcome::Saved(_) => panic!("failing pipeline saved"),
        }
        assert_eq!(*store.writes.borrow(), 0);

        let outcome = session.save(&mut passing_pipeline(), &SkipSet::new()).unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved(_)));
        assert_eq!(*store.writes.borrow(), 1);
        assert_eq!(store.stored.borrow().channels.selected, vec!["System-Log/Security"]);
        assert_eq!(session.configuration().channels.selected, vec!["System-Log/Security"]);
    }

    #[test]
    fn test_commit_rejects_unparsable_numbers() {
        let store = MemoryStore::default();
        let mut session = ConfigSession::open(&store, &catalog(&[])).unwrap();
        let mut snapshot = session.snapshot();
        snapshot.max_batch_size.content = "many".to_string();

        assert!(matches!(session.commit(&snapshot), Err(StoreError::Invalid(_))));
        assert_eq!(*store.writes.borrow(), 0);
    }
}
