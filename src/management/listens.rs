use std::{collections::BTreeSet, path::PathBuf};

use crate::{
    error::{Error, Result},
    utils,
};

/// Locally cached set of shares the user has already listened to.
///
/// This cache is advisory; the listen-recording service stays authoritative.
#[derive(Debug, Clone)]
pub struct ListenCache {
    user_id: String,
    listened: BTreeSet<String>,
    dir: Option<PathBuf>,
}

impl ListenCache {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            listened: BTreeSet::new(),
            dir: None,
        }
    }

    /// Cache that persists to `<data_dir>/state/listens-<user>.json`.
    pub fn persistent(user_id: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(data_dir.into().join("state")),
            ..Self::new(user_id)
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Whether [`persist`](Self::persist) has somewhere to write.
    pub fn is_persistent(&self) -> bool {
        self.dir.is_some()
    }

    pub fn has(&self, share_id: &str) -> bool {
        self.listened.contains(share_id)
    }

    /// Returns `false` if the share was already known.
    pub fn add(&mut self, share_id: impl Into<String>) -> bool {
        self.listened.insert(share_id.into())
    }

    pub fn remove(&mut self, share_id: &str) -> bool {
        self.listened.remove(share_id)
    }

    pub fn extend(&mut self, share_ids: impl IntoIterator<Item = String>) {
        self.listened.extend(share_ids);
    }

    pub fn len(&self) -> usize {
        self.listened.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listened.is_empty()
    }

    pub async fn persist(&self) -> Result<()> {
        let path = self.get_path()?;
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&self.listened)?;
        async_fs::write(path, json).await?;
        Ok(())
    }

    /// Replaces the in-memory set with the persisted one. A missing file leaves it empty.
    pub async fn load(&mut self) -> Result<()> {
        let path = self.get_path()?;
        match async_fs::read_to_string(&path).await {
            Ok(json) => {
                self.listened = serde_json::from_str(&json)?;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.listened.clear();
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_path(&self) -> Result<PathBuf> {
        utils::validate_user_id(&self.user_id)?;
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| Error::Storage("listen cache has no storage directory".to_string()))?;
        Ok(dir.join(format!("listens-{}.json", self.user_id)))
    }
}
