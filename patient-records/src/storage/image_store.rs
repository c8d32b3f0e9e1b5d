//! Image storage for record photographs
//!
//! Photos arrive as inline data URIs (`data:image/png;base64,...`) and are
//! written to a flat directory, one file per save:
//!
//! Example: owner 7 saving a PNG lands at "patient_images/patient_7_1718000000000_a1b2c3d4.png"
//!
//! Stored paths are turned back into `file://` locators at read time. The
//! images directory has moved between releases and some platforms hide or
//! re-case files, so resolution tries several candidate locations before
//! giving up.

use crate::config;
use crate::error::{AppError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use reqwest::Url;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// A decoded inline image payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// Declared MIME-like type, e.g. `image/png`
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    /// Parse `data:<type>;base64,<payload>`. Anything else is rejected.
    pub fn parse(encoded: &str) -> Result<Self> {
        let invalid = |reason: &str| AppError::InvalidImageData(reason.to_string());

        let rest = encoded
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| invalid("missing 'data:' prefix"))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| invalid("missing ',' separator"))?;
        let (mime_type, encoding) = header
            .split_once(';')
            .ok_or_else(|| invalid("missing ';' before encoding"))?;

        if !encoding.eq_ignore_ascii_case(config::IMAGE_PAYLOAD_ENCODING) {
            return Err(invalid("unsupported encoding"));
        }
        if !mime_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '/' | '.'))
        {
            return Err(invalid("malformed type"));
        }
        if data.is_empty() {
            return Err(invalid("empty payload"));
        }

        let bytes = STANDARD
            .decode(data)
            .map_err(|e| AppError::InvalidImageData(format!("bad base64: {}", e)))?;
        if bytes.is_empty() {
            return Err(invalid("empty payload"));
        }

        Ok(Self {
            mime_type: mime_type.to_string(),
            bytes,
        })
    }

    /// File extension derived from the declared subtype
    pub fn extension(&self) -> String {
        let ext: String = self
            .mime_type
            .split_once('/')
            .map(|(_, subtype)| subtype)
            .unwrap_or_default()
            .split('+')
            .next()
            .unwrap_or_default()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        if ext.is_empty() {
            config::DEFAULT_IMAGE_EXTENSION.to_string()
        } else {
            ext
        }
    }
}

/// Directory-backed image store
#[derive(Clone)]
pub struct ImageStore {
    root: PathBuf,
    prefix: &'static str,
}

impl ImageStore {
    /// Create a store writing `<prefix>_<owner>_...` files under `root`.
    /// A relative root is anchored at the current directory.
    pub fn new(root: PathBuf, prefix: &'static str) -> Self {
        Self {
            root: absolute(&root),
            prefix,
        }
    }

    /// Initialize the store (create directory if needed)
    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        tracing::info!("Image store initialized at: {:?}", self.root);
        Ok(())
    }

    /// Parse an encoded payload and save it for `owner_id`
    pub async fn save_encoded(&self, encoded: &str, owner_id: i64) -> Result<PathBuf> {
        let payload = ImagePayload::parse(encoded)?;
        self.save(&payload, owner_id).await
    }

    /// Write an image for `owner_id`, returns the absolute path of the new file
    pub async fn save(&self, payload: &ImagePayload, owner_id: i64) -> Result<PathBuf> {
        let write_failed = |e: std::io::Error| AppError::ImageWriteFailed(e.to_string());

        fs::create_dir_all(&self.root).await.map_err(write_failed)?;

        let file_name = self.file_name_for(owner_id, &payload.extension());
        let path = absolute(&self.root.join(&file_name));

        // Write to temp file first (atomic write)
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await.map_err(write_failed)?;
        if let Err(e) = write_all_synced(&mut file, &payload.bytes).await {
            drop(file);
            let _ = fs::remove_file(&temp_path).await;
            return Err(write_failed(e));
        }
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(write_failed(e));
        }

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(AppError::ImageWriteFailed(format!(
                "{} missing after write",
                path.display()
            )));
        }

        tracing::debug!(
            "Saved image: {:?} ({} bytes, owner {})",
            path,
            payload.bytes.len(),
            owner_id
        );

        Ok(path)
    }

    /// Remove an image file. Never fails: returns false when nothing was removed.
    pub async fn delete(&self, path: &Path) -> bool {
        match fs::try_exists(path).await {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                tracing::warn!("Could not check image {:?}: {}", path, e);
                return false;
            }
        }

        match fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!("Deleted image: {:?}", path);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to delete image {:?}: {}", path, e);
                false
            }
        }
    }

    /// Resolve a stored path into a `file://` locator, if the file can be found
    pub fn resolve_locator(&self, stored: &str) -> Option<String> {
        let found = self.locate(stored)?;
        match Url::from_file_path(&found) {
            Ok(url) => Some(url.to_string()),
            Err(()) => {
                tracing::warn!("Cannot express {:?} as a file URL", found);
                None
            }
        }
    }

    /// Find the file a stored path refers to, trying each strategy in order
    pub fn locate(&self, stored: &str) -> Option<PathBuf> {
        let path = stored_path(stored)?;
        let base_name = path.file_name()?.to_str()?.to_string();

        if path.is_absolute() && path.is_file() {
            return Some(path);
        }

        let mut directories = Vec::with_capacity(2);
        if path.is_absolute() {
            if let Some(parent) = path.parent() {
                directories.push(parent.to_path_buf());
            }
        }
        directories.push(self.root.clone());

        let found = directories.iter().find_map(|dir| {
            RESOLUTION_STRATEGIES
                .iter()
                .find_map(|strategy| strategy(dir, &base_name))
        });

        if found.is_none() {
            tracing::debug!(
                "Image not found: {} (searched {:?})",
                stored,
                directories
            );
        }
        found
    }

    /// Build a collision-resistant file name restricted to `[A-Za-z0-9._-]`
    fn file_name_for(&self, owner_id: i64, extension: &str) -> String {
        let entropy = uuid::Uuid::new_v4().simple().to_string();
        let raw = format!(
            "{}_{}_{}_{}.{}",
            self.prefix,
            owner_id,
            Utc::now().timestamp_millis(),
            &entropy[..config::IMAGE_NAME_ENTROPY_LEN],
            extension
        );
        sanitize_file_name(&raw)
    }

    /// Get image store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

async fn write_all_synced(file: &mut fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.sync_all().await
}

/// One way of finding `base_name` inside `dir`
type Strategy = fn(&Path, &str) -> Option<PathBuf>;

/// Tried in order for every candidate directory; first hit wins
const RESOLUTION_STRATEGIES: &[Strategy] = &[find_exact, find_hidden, find_case_insensitive];

/// Exact file name
fn find_exact(dir: &Path, base_name: &str) -> Option<PathBuf> {
    let candidate = dir.join(base_name);
    candidate.is_file().then_some(candidate)
}

/// The same name with a leading dot (file hidden by the OS)
fn find_hidden(dir: &Path, base_name: &str) -> Option<PathBuf> {
    if base_name.starts_with('.') {
        return None;
    }
    find_exact(dir, &format!(".{}", base_name))
}

/// Case-insensitive match against the name or its hidden variant
fn find_case_insensitive(dir: &Path, base_name: &str) -> Option<PathBuf> {
    let wanted = base_name.to_lowercase();
    let wanted_hidden = if wanted.starts_with('.') {
        wanted.clone()
    } else {
        format!(".{}", wanted)
    };

    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| {
                        let name = name.to_lowercase();
                        name == wanted || name == wanted_hidden
                    })
                    .unwrap_or(false)
        })
}

/// Interpret a stored value as a filesystem path (plain or `file://` URL)
fn stored_path(stored: &str) -> Option<PathBuf> {
    let stored = stored.trim();
    if stored.is_empty() {
        return None;
    }

    if stored.starts_with("file://") {
        return Url::parse(stored).ok()?.to_file_path().ok();
    }

    Some(PathBuf::from(stored))
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // 1x1 transparent PNG
    const PNG_PAYLOAD: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    async fn create_test_store() -> (ImageStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path().join("patient_images"), "patient");
        store.initialize().await.unwrap();
        (store, temp_dir)
    }

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn test_parse_payload() {
        let payload = ImagePayload::parse(PNG_PAYLOAD).unwrap();
        assert_eq!(payload.mime_type, "image/png");
        assert_eq!(payload.extension(), "png");
        assert!(payload.bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn test_parse_rejects_malformed_payloads() {
        let cases = [
            "image/png;base64,AAAA",
            "data:image/png;base64AAAA",
            "data:image/png,AAAA",
            "data:image/png;utf8,AAAA",
            "data:image/png;base64,",
            "data:image/png;base64,!!!not-base64!!!",
            "data:image/p ng;base64,AAAA",
        ];
        for case in cases {
            assert!(
                matches!(ImagePayload::parse(case), Err(AppError::InvalidImageData(_))),
                "accepted {:?}",
                case
            );
        }
    }

    #[test]
    fn test_extension_defaults_to_png() {
        let payload = ImagePayload {
            mime_type: "image".to_string(),
            bytes: vec![1],
        };
        assert_eq!(payload.extension(), "png");

        let svg = ImagePayload {
            mime_type: "image/svg+xml".to_string(),
            bytes: vec![1],
        };
        assert_eq!(svg.extension(), "svg");

        let jpeg = ImagePayload::parse("data:image/JPEG;base64,AAAA").unwrap();
        assert_eq!(jpeg.extension(), "jpeg");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("patient_1_2.png"), "patient_1_2.png");
        assert_eq!(sanitize_file_name("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_file_name("a b\\c:d"), "a_b_c_d");
    }

    #[tokio::test]
    async fn test_save_and_resolve() {
        let (store, _temp) = create_test_store().await;

        let path = store.save_encoded(PNG_PAYLOAD, 7).await.unwrap();
        assert!(path.is_absolute());
        assert!(path.exists());

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("patient_7_"));
        assert!(name.ends_with(".png"));
        assert!(name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')));

        let locator = store.resolve_locator(path.to_str().unwrap()).unwrap();
        assert!(locator.starts_with("file://"));

        assert!(store.delete(&path).await);
        assert!(store.resolve_locator(path.to_str().unwrap()).is_none());
    }

    #[tokio::test]
    async fn test_consecutive_saves_do_not_collide() {
        let (store, _temp) = create_test_store().await;

        let a = store.save_encoded(PNG_PAYLOAD, 1).await.unwrap();
        let b = store.save_encoded(PNG_PAYLOAD, 1).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(file_count(store.root()), 2);
    }

    #[tokio::test]
    async fn test_invalid_payload_writes_nothing() {
        let (store, _temp) = create_test_store().await;

        let result = store.save_encoded("data:image/png;base64AAAA", 7).await;
        assert!(matches!(result, Err(AppError::InvalidImageData(_))));
        assert_eq!(file_count(store.root()), 0);
    }

    #[tokio::test]
    async fn test_save_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path().join("not").join("yet"), "doctor");

        let path = store.save_encoded(PNG_PAYLOAD, 2).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_save_fails_when_root_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let store = ImageStore::new(blocker, "patient");

        let result = store.save_encoded(PNG_PAYLOAD, 1).await;
        assert!(matches!(result, Err(AppError::ImageWriteFailed(_))));
    }

    #[tokio::test]
    async fn test_relative_root_resolves_relocated_file() {
        let relative = PathBuf::from(format!(".images-{}", uuid::Uuid::new_v4().simple()));
        let store = ImageStore::new(relative, "patient");
        assert!(store.root().is_absolute());

        let path = store.save_encoded(PNG_PAYLOAD, 1).await.unwrap();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        let url = store.resolve_locator(&format!("/old/location/{}", name));
        std::fs::remove_dir_all(store.root()).unwrap();

        assert_eq!(url, Some(Url::from_file_path(&path).unwrap().to_string()));
    }

    #[tokio::test]
    async fn test_delete_missing_returns_false() {
        let (store, _temp) = create_test_store().await;
        assert!(!store.delete(&store.root().join("nope.png")).await);
    }

    #[tokio::test]
    async fn test_resolve_file_url() {
        let (store, _temp) = create_test_store().await;
        let path = store.save_encoded(PNG_PAYLOAD, 3).await.unwrap();
        let url = Url::from_file_path(&path).unwrap().to_string();

        assert_eq!(store.resolve_locator(&url), Some(url.clone()));
    }

    #[tokio::test]
    async fn test_resolve_hidden_and_recased_files() {
        let (store, _temp) = create_test_store().await;
        let path = store.save_encoded(PNG_PAYLOAD, 4).await.unwrap();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();

        // Hidden by the OS
        let hidden = store.root().join(format!(".{}", name));
        std::fs::rename(&path, &hidden).unwrap();
        assert_eq!(store.locate(path.to_str().unwrap()), Some(hidden.clone()));

        // Re-cased
        let upper = store.root().join(name.to_uppercase());
        std::fs::rename(&hidden, &upper).unwrap();
        let found = store.locate(path.to_str().unwrap()).unwrap();
        assert_eq!(
            found.file_name().unwrap().to_str().unwrap().to_lowercase(),
            name.to_lowercase()
        );
    }

    #[tokio::test]
    async fn test_resolve_relocated_into_canonical_directory() {
        let (store, temp) = create_test_store().await;
        let path = store.save_encoded(PNG_PAYLOAD, 5).await.unwrap();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();

        // Path recorded by an older release under a directory that no longer exists
        let stale = temp.path().join("old_location").join(&name);
        assert_eq!(
            store.locate(stale.to_str().unwrap()),
            Some(store.root().join(&name))
        );

        // Bare file name
        assert!(store.resolve_locator(&name).is_some());
    }

    #[test]
    fn test_resolve_gives_up() {
        let store = ImageStore::new(PathBuf::from("/definitely/not/here"), "patient");
        assert!(store.resolve_locator("").is_none());
        assert!(store.resolve_locator("/definitely/not/here/x.png").is_none());
        assert!(store.resolve_locator("file://not a url").is_none());
    }

    #[test]
    fn test_strategies_are_independent() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".photo.png"), b"x").unwrap();

        assert!(find_exact(temp.path(), "photo.png").is_none());
        assert!(find_hidden(temp.path(), "photo.png").is_some());
        assert!(find_case_insensitive(temp.path(), "PHOTO.PNG").is_some());
        assert!(find_case_insensitive(temp.path(), "other.png").is_none());
    }
}
