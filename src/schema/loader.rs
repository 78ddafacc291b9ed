//! Class loader for reading class declarations from disk
//!
//! - One declaration per `*.json` file in the class directory
//! - Files are read in file-name order
//! - Declarations are registered parent-first, and after the classes their
//!   fields reference, regardless of file order
//! - Classes whose fields reference each other load together

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::class::Schema;
use super::definition::ClassDefinition;
use super::errors::{CompositionError, CompositionResult};
use super::registry::ClassRegistry;

/// Reads class declarations and registers them into a `ClassRegistry`
#[derive(Debug)]
pub struct ClassLoader {
    /// Directory containing declaration files
    class_dir: PathBuf,
    /// Declarations read so far, with their source
    definitions: Vec<(String, ClassDefinition)>,
}

impl ClassLoader {
    pub fn new(class_dir: &Path) -> Self {
        Self {
            class_dir: class_dir.to_path_buf(),
            definitions: Vec::new(),
        }
    }

    pub fn class_dir(&self) -> &Path {
        &self.class_dir
    }

    /// Reads every `*.json` file in the class directory.
    ///
    /// A missing directory holds no declarations. Returns the number of
    /// declarations read.
    pub fn read_all(&mut self) -> CompositionResult<usize> {
        if !self.class_dir.exists() {
            debug!(dir = %self.class_dir.display(), "Class directory does not exist");
            return Ok(0);
        }

        let entries = fs::read_dir(&self.class_dir).map_err(|e| io_error(&self.class_dir, e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error(&self.class_dir, e))?.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            self.read_file(path)?;
        }
        Ok(paths.len())
    }

    /// Reads a single declaration file
    pub fn read_file(&mut self, path: &Path) -> CompositionResult<()> {
        let content = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        let definition: ClassDefinition =
            serde_json::from_str(&content).map_err(|e| CompositionError::Json {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        debug!(class = %definition.name, path = %path.display(), "Read class declaration");
        self.definitions.push((path.display().to_string(), definition));
        Ok(())
    }

    /// Adds a declaration built in code
    pub fn add(&mut self, definition: ClassDefinition) {
        self.definitions.push(("<in-memory>".to_string(), definition));
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ClassDefinition> {
        self.definitions.iter().map(|(_, d)| d)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Registers every declaration as one batch, dependencies first. Stops
    /// at the first composition failure; classes registered before it stay
    /// registered.
    pub fn load_into(&self, registry: &ClassRegistry) -> CompositionResult<Vec<Arc<Schema>>> {
        let ordered = self.ordered()?;
        let published = registry.create_classes(ordered.into_iter().cloned())?;
        info!(dir = %self.class_dir.display(), classes = published.len(), "Loaded class declarations");
        Ok(published)
    }

    /// Declarations ordered so that parents and referenced classes come
    /// before the classes that need them.
    fn ordered(&self) -> CompositionResult<Vec<&ClassDefinition>> {
        let mut batch = HashSet::new();
        for definition in self.definitions() {
            if !batch.insert(definition.name.as_str()) {
                return Err(CompositionError::DuplicateClass(definition.name.clone()));
            }
        }

        let mut placed: HashSet<&str> = HashSet::new();
        let mut ordered = Vec::with_capacity(self.definitions.len());
        let mut pending: Vec<&ClassDefinition> = self.definitions().collect();

        while !pending.is_empty() {
            let (ready, blocked): (Vec<_>, Vec<_>) = pending.into_iter().partition(|d| {
                dependencies(d)
                    .into_iter()
                    .all(|dep| dep == d.name || !batch.contains(dep) || placed.contains(dep))
            });

            if ready.is_empty() {
                if let Some(name) = parent_cycle(&blocked) {
                    return Err(CompositionError::InheritanceCycle(name.to_string()));
                }
                // The rest only reference each other; one batch accepts that
                ordered.extend(blocked);
                break;
            }

            for definition in ready {
                placed.insert(definition.name.as_str());
                ordered.push(definition);
            }
            pending = blocked;
        }
        Ok(ordered)
    }
}

fn dependencies(definition: &ClassDefinition) -> Vec<&str> {
    definition
        .parent
        .as_deref()
        .into_iter()
        .chain(
            definition
                .fields
                .iter()
                .filter_map(|(_, spec)| spec.type_spec.as_ref()?.class_name()),
        )
        .collect()
}

/// First class whose parent chain, within `blocked`, returns to itself
fn parent_cycle<'a>(blocked: &[&'a ClassDefinition]) -> Option<&'a str> {
    let parent_of = |name: &str| {
        blocked
            .iter()
            .find(|d| d.name == name)
            .and_then(|d| d.parent.as_deref())
    };

    for start in blocked {
        let mut seen = HashSet::new();
        let mut current = start.name.as_str();
        while let Some(parent) = parent_of(current) {
            if parent == start.name {
                return Some(start.name.as_str());
            }
            if !seen.insert(parent) {
                break;
            }
            current = parent;
        }
    }
    None
}

fn io_error(path: &Path, e: std::io::Error) -> CompositionError {
    CompositionError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}
