//! Storage locations (S3, GCS, Azure, local, in-memory)

use crate::config::Credentials;
use crate::error::{Error, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// Kind of backend behind a [`Storage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageScheme {
    S3,
    Gcs,
    Azure,
    Memory,
    Local,
}

impl StorageScheme {
    /// URL scheme used when rendering paths
    pub fn as_str(self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Gcs => "gs",
            Self::Azure => "az",
            Self::Memory => "memory",
            Self::Local => "file",
        }
    }
}

/// An object store rooted at a prefix
#[derive(Clone)]
pub struct Storage {
    /// The object store implementation
    store: Arc<dyn ObjectStore>,
    /// Root prefix within the bucket/container
    prefix: ObjectPath,
    /// Backend kind
    scheme: StorageScheme,
    /// Bucket, container or local directory, for display
    authority: String,
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("root", &self.root())
            .finish_non_exhaustive()
    }
}

impl Storage {
    /// Parse a location URL and create the matching object store
    ///
    /// Supported formats:
    /// - `s3://bucket/path/` or `s3a://bucket/path/` - AWS S3
    /// - `gs://bucket/path/` - Google Cloud Storage
    /// - `az://container/path/` - Azure Blob Storage
    /// - `memory://` - process-local in-memory store
    /// - `/local/path/`, `./path/` or `file:///path` - Local filesystem
    ///
    /// Local directories are created when `create` is set.
    pub fn parse(location: &str, credentials: &Credentials, create: bool) -> Result<Self> {
        let location = location.trim();
        if let Some((scheme, _)) = location.split_once("://") {
            match scheme {
                "s3" | "s3a" => return Self::parse_s3(location, credentials),
                "gs" => return Self::parse_gcs(location),
                "az" => return Self::parse_azure(location),
                "memory" => return Ok(Self::in_memory()),
                "file" => {}
                other => {
                    return Err(Error::config(format!(
                        "Unsupported storage scheme '{other}' in {location}"
                    )))
                }
            }
        }
        Self::parse_local(location, create)
    }

    /// Split a bucket URL into bucket and prefix
    fn bucket_and_prefix(location: &str) -> Result<(String, String)> {
        let url = Url::parse(location)
            .map_err(|e| Error::config(format!("Invalid storage URL {location}: {e}")))?;
        let bucket = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::config(format!("Missing bucket in {location}")))?
            .to_string();
        let prefix = url.path().trim_matches('/').to_string();
        Ok((bucket, prefix))
    }

    /// Parse S3 URL
    fn parse_s3(location: &str, credentials: &Credentials) -> Result<Self> {
        let (bucket, prefix) = Self::bucket_and_prefix(location)?;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(&bucket);
        if let Some(key) = &credentials.aws_access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(secret) = &credentials.aws_secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        if let Some(region) = &credentials.region {
            builder = builder.with_region(region);
        }

        let store = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create S3 client: {e}")))?;

        Self::from_store(Arc::new(store), StorageScheme::S3, bucket, &prefix)
    }

    /// Parse GCS URL
    fn parse_gcs(location: &str) -> Result<Self> {
        let (bucket, prefix) = Self::bucket_and_prefix(location)?;

        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(&bucket)
            .build()
            .map_err(|e| Error::config(format!("Failed to create GCS client: {e}")))?;

        Self::from_store(Arc::new(store), StorageScheme::Gcs, bucket, &prefix)
    }

    /// Parse Azure Blob URL
    fn parse_azure(location: &str) -> Result<Self> {
        let (container, prefix) = Self::bucket_and_prefix(location)?;

        let store = MicrosoftAzureBuilder::from_env()
            .with_container_name(&container)
            .build()
            .map_err(|e| Error::config(format!("Failed to create Azure client: {e}")))?;

        Self::from_store(Arc::new(store), StorageScheme::Azure, container, &prefix)
    }

    /// Parse local filesystem path
    fn parse_local(path: &str, create: bool) -> Result<Self> {
        let path = path.strip_prefix("file://").unwrap_or(path);
        let path = if path.is_empty() { "." } else { path };

        if create {
            std::fs::create_dir_all(path)
                .map_err(|e| Error::config(format!("Failed to create directory {path}: {e}")))?;
        } else if !Path::new(path).is_dir() {
            // Nothing can match below a missing directory
            return Err(Error::source_not_found(path));
        }

        let store = LocalFileSystem::new_with_prefix(path)
            .map_err(|e| Error::config(format!("Failed to create local store: {e}")))?
            .with_automatic_cleanup(true);

        Self::from_store(Arc::new(store), StorageScheme::Local, path.to_string(), "")
    }

    /// A fresh in-memory store
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            prefix: ObjectPath::default(),
            scheme: StorageScheme::Memory,
            authority: String::new(),
        }
    }

    /// Wrap an existing store
    pub fn from_store(
        store: Arc<dyn ObjectStore>,
        scheme: StorageScheme,
        authority: impl Into<String>,
        prefix: &str,
    ) -> Result<Self> {
        Ok(Self {
            store,
            prefix: parse_path(prefix)?,
            scheme,
            authority: authority.into(),
        })
    }

    /// Backend kind
    pub fn scheme(&self) -> StorageScheme {
        self.scheme
    }

    /// Root of this storage as a URL-like string
    pub fn root(&self) -> String {
        self.display(&ObjectPath::default())
    }

    /// Render a relative path under this storage for logs and errors
    pub fn display_relative(&self, relative: &str) -> String {
        match self.object_path(relative) {
            Ok(path) => self.display_absolute(&path),
            Err(_) => format!("{}/{relative}", self.root()),
        }
    }

    fn display(&self, relative: &ObjectPath) -> String {
        let joined = join_paths(&self.prefix, relative);
        self.display_absolute(&joined)
    }

    fn display_absolute(&self, path: &ObjectPath) -> String {
        match self.scheme {
            StorageScheme::Local => {
                let root = self.authority.trim_end_matches('/');
                if path.as_ref().is_empty() {
                    root.to_string()
                } else {
                    format!("{root}/{path}")
                }
            }
            scheme => format!("{}://{}/{path}", scheme.as_str(), self.authority),
        }
    }

    /// Absolute object path for a path relative to the root
    pub(crate) fn object_path(&self, relative: &str) -> Result<ObjectPath> {
        Ok(join_paths(&self.prefix, &parse_path(relative)?))
    }

    /// Path relative to the root, if the object lives below it
    pub(crate) fn relative_path(&self, path: &ObjectPath) -> Option<String> {
        path.prefix_match(&self.prefix).map(|parts| {
            parts
                .map(|p| p.as_ref().to_string())
                .collect::<Vec<_>>()
                .join("/")
        })
    }

    /// List every object below a relative prefix, sorted
    pub async fn list(&self, relative_prefix: &str) -> Result<Vec<String>> {
        let prefix = self.object_path(relative_prefix)?;
        let prefix = (!prefix.as_ref().is_empty()).then_some(prefix);

        let metas: Vec<_> = self.store.list(prefix.as_ref()).try_collect().await?;
        let mut paths: Vec<String> = metas
            .iter()
            .filter_map(|meta| self.relative_path(&meta.location))
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Read an object
    pub async fn get(&self, relative: &str) -> Result<Bytes> {
        let path = self.object_path(relative)?;
        Ok(self.store.get(&path).await?.bytes().await?)
    }

    /// Write an object, replacing any existing one
    pub async fn put(&self, relative: &str, data: Bytes) -> Result<()> {
        let path = self.object_path(relative)?;
        self.store.put(&path, data.into()).await?;
        Ok(())
    }

    /// Move an object
    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from = self.object_path(from)?;
        let to = self.object_path(to)?;
        self.store.rename(&from, &to).await?;
        Ok(())
    }

    /// Delete a single object; a missing object is not an error
    pub async fn delete(&self, relative: &str) -> Result<()> {
        let path = self.object_path(relative)?;
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove directories left empty below a relative prefix
    ///
    /// Renames on the local filesystem leave their source directories behind.
    /// The tree is pruned bottom-up, keeping any directory that still holds a
    /// file. Other backends have no directories, so this is a no-op there.
    pub async fn prune_empty_dirs(&self, relative_prefix: &str) -> Result<()> {
        if self.scheme != StorageScheme::Local {
            return Ok(());
        }
        let path = self.object_path(relative_prefix)?;
        let dir = path
            .parts()
            .fold(PathBuf::from(&self.authority), |dir, part| dir.join(part.as_ref()));

        tokio::task::spawn_blocking(move || prune_dir(&dir))
            .await
            .map_err(|e| Error::output(format!("Directory cleanup task failed: {e}")))??;
        Ok(())
    }

    /// Delete everything below a relative prefix, returning the count
    pub async fn delete_prefix(&self, relative_prefix: &str) -> Result<usize> {
        let paths = self.list(relative_prefix).await?;
        for path in &paths {
            self.delete(path).await?;
        }
        Ok(paths.len())
    }
}

/// Parse a slash-separated path, ignoring empty segments
fn parse_path(raw: &str) -> Result<ObjectPath> {
    let cleaned = raw
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/");
    ObjectPath::parse(&cleaned)
        .map_err(|e| Error::output(format!("Invalid object path '{raw}': {e}")))
}

/// Remove `dir` and its subdirectories while they are empty
///
/// Returns whether `dir` is gone.
fn prune_dir(dir: &Path) -> std::io::Result<bool> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };

    let mut empty = true;
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            empty &= prune_dir(&entry.path())?;
        } else {
            empty = false;
        }
    }
    if !empty {
        return Ok(false);
    }

    match std::fs::remove_dir(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e),
    }
}

fn join_paths(base: &ObjectPath, relative: &ObjectPath) -> ObjectPath {
    base.parts().chain(relative.parts()).collect()
}
