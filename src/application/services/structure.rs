//! Structure file service
//!
//! Loads a JSON structure file into a [`TreeModel`], applies one mutation
//! and writes the result back. Every write is preceded by an invariant check,
//! so a file is never replaced with a corrupt tree.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::application::{ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::{AnyProvider, NodeJson, TreeError, TreeModel};
use crate::infrastructure::traits::FileSystem;

/// Structural mutation addressed by node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureOp {
    MoveUp,
    MoveDown,
    MakeChild,
    MakeParent,
    Delete,
}

impl fmt::Display for StructureOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MoveUp => "move up",
            Self::MoveDown => "move down",
            Self::MakeChild => "make child",
            Self::MakeParent => "make parent",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// A node to be created and linked by [`StructureService::add`].
#[derive(Debug, Clone, Default)]
pub struct AddRequest {
    pub node_type: String,
    /// Container to append to; `None` appends a root
    pub parent: Option<String>,
    pub name: Option<String>,
    /// Fixed id, a random UUID when `None`
    pub id: Option<String>,
}

/// Result of a mutation: whether the tree changed and its serialized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub id: String,
    pub changed: bool,
    pub document: String,
}

/// Service for reading and editing structure files.
pub struct StructureService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
}

impl StructureService {
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self { fs, settings }
    }

    /// Node factory for the configured vocabulary and language.
    pub fn provider(&self) -> AnyProvider {
        AnyProvider::from_kind(self.settings.provider, &self.settings.language)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn load(&self, path: &Path) -> ApplicationResult<TreeModel<AnyProvider>> {
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read structure", path)?;
        let mut model = TreeModel::new(self.provider());
        model.parse_str(&content)?;
        Ok(model)
    }

    /// Serialize the model, pretty-printed unless disabled in settings.
    pub fn render(&self, model: &TreeModel<AnyProvider>) -> ApplicationResult<String> {
        let value = model.to_value()?;
        let mut text = if self.settings.pretty {
            serde_json::to_string_pretty(&value).map_err(TreeError::from)?
        } else {
            serde_json::to_string(&value).map_err(TreeError::from)?
        };
        text.push('\n');
        Ok(text)
    }

    /// Verify the model and write it to `path`.
    pub fn save(&self, path: &Path, model: &TreeModel<AnyProvider>) -> ApplicationResult<()> {
        model.verify()?;
        let text = self.render(model)?;
        self.fs
            .write(path, &text)
            .with_path_context("write structure", path)?;
        debug!("wrote {}", path.display());
        Ok(())
    }

    /// Apply `op` to the node `id` of the file at `path`.
    ///
    /// The file is left untouched for `dry_run` and for no-op moves.
    #[instrument(level = "debug", skip(self))]
    pub fn apply(
        &self,
        path: &Path,
        id: &str,
        op: StructureOp,
        dry_run: bool,
    ) -> ApplicationResult<Outcome> {
        let mut model = self.load(path)?;
        let idx = model.lookup(id)?;
        let changed = match op {
            StructureOp::MoveUp => model.move_up(idx)?,
            StructureOp::MoveDown => model.move_down(idx)?,
            StructureOp::MakeChild => model.make_child(idx).map(|_| true)?,
            StructureOp::MakeParent => model.make_parent(idx).map(|_| true)?,
            StructureOp::Delete => model.delete_node(idx).map(|removed| removed > 0)?,
        };
        debug!("{} {}: changed={}", op, id, changed);
        self.finish(path, &model, id.to_string(), changed, dry_run)
    }

    /// Create a node and link it below `parent`, or as the last root.
    #[instrument(level = "debug", skip(self))]
    pub fn add(&self, path: &Path, request: &AddRequest, dry_run: bool) -> ApplicationResult<Outcome> {
        let mut model = self.load(path)?;
        let id = request
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let idx = model.create_from(&NodeJson::leaf(&id, &request.node_type))?;
        if let Some(name) = &request.name {
            model.rename(idx, name.as_str())?;
        }
        match &request.parent {
            Some(parent) => {
                let parent = model.lookup(parent)?;
                model.add_child(idx, parent)?;
            }
            None => model.insert_last(idx)?,
        }
        self.finish(path, &model, id, true, dry_run)
    }

    fn finish(
        &self,
        path: &Path,
        model: &TreeModel<AnyProvider>,
        id: String,
        changed: bool,
        dry_run: bool,
    ) -> ApplicationResult<Outcome> {
        model.verify()?;
        if changed && !dry_run {
            self.save(path, model)?;
        }
        Ok(Outcome {
            id,
            changed,
            document: self.render(model)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProviderKind;
    use crate::infrastructure::traits::RealFileSystem;
    use tempfile::TempDir;

    fn service(provider: ProviderKind) -> StructureService {
        let settings = Settings {
            provider,
            pretty: false,
            ..Settings::default()
        };
        StructureService::new(Arc::new(RealFileSystem), Arc::new(settings))
    }

    #[test]
    fn given_compact_setting_when_rendering_then_single_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("s.json");
        std::fs::write(&path, r#"[{"id":"A","type":"leaf"}]"#).unwrap();

        let svc = service(ProviderKind::Generic);
        let model = svc.load(&path).unwrap();

        assert_eq!(svc.render(&model).unwrap(), "[{\"id\":\"A\",\"type\":\"leaf\"}]\n");
    }

    #[test]
    fn given_first_root_when_moving_up_then_file_is_untouched() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("s.json");
        let original = r#"[ {"id":"A","type":"leaf"}, {"id":"B","type":"leaf"} ]"#;
        std::fs::write(&path, original).unwrap();

        let outcome = service(ProviderKind::Generic)
            .apply(&path, "A", StructureOp::MoveUp, false)
            .unwrap();

        assert!(!outcome.changed);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }
}
