//! Live document storage and the per-cycle text cache.
//!
//! The editor owns open buffers; the server mirrors them in a [`DocumentStore`].
//! A [`DocumentTextCache`] is created for one reconciliation cycle and dropped with
//! it, so disk snapshots never outlive the run that read them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use url::Url;

use crate::error::TextSourceError;

/// An open editor buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveDocument {
    pub uri: Url,
    pub text: Arc<str>,
    pub version: i32,
}

/// Mirror of the editor's open buffers, shared between handlers.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    docs: Arc<RwLock<HashMap<Url, LiveDocument>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, uri: Url, text: String, version: i32) {
        let doc = LiveDocument {
            uri: uri.clone(),
            text: Arc::from(text),
            version,
        };
        self.docs.write().expect("Documents: lock poisoned").insert(uri, doc);
    }

    /// Replaces the text of an open buffer. Older versions are ignored.
    pub fn update(&self, uri: &Url, text: String, version: i32) {
        let mut docs = self.docs.write().expect("Documents: lock poisoned");
        match docs.get_mut(uri) {
            Some(doc) if doc.version > version => {
                tracing::debug!("Ignoring stale change v{version} for {uri} (have v{})", doc.version);
            }
            Some(doc) => {
                doc.text = Arc::from(text);
                doc.version = version;
            }
            None => {
                docs.insert(
                    uri.clone(),
                    LiveDocument {
                        uri: uri.clone(),
                        text: Arc::from(text),
                        version,
                    },
                );
            }
        }
    }

    pub fn close(&self, uri: &Url) {
        self.docs.write().expect("Documents: lock poisoned").remove(uri);
    }

    pub fn get(&self, uri: &Url) -> Option<LiveDocument> {
        self.docs.read().expect("Documents: lock poisoned").get(uri).cloned()
    }

    /// URIs of every open buffer, sorted so refresh order is stable.
    pub fn uris(&self) -> Vec<Url> {
        let mut uris: Vec<Url> = self
            .docs
            .read()
            .expect("Documents: lock poisoned")
            .keys()
            .cloned()
            .collect();
        uris.sort();
        uris
    }
}

/// Memoizes file text for one reconciliation cycle, preferring live buffers over disk.
#[derive(Debug)]
pub struct DocumentTextCache<'a> {
    store: &'a DocumentStore,
    texts: HashMap<Url, Arc<str>>,
    disk_reads: usize,
}

impl<'a> DocumentTextCache<'a> {
    pub fn new(store: &'a DocumentStore) -> Self {
        Self {
            store,
            texts: HashMap::new(),
            disk_reads: 0,
        }
    }

    /// Number of files read from disk so far in this cycle.
    pub fn disk_reads(&self) -> usize {
        self.disk_reads
    }

    /// Returns the text of `line` from `start_character` to the end of that line.
    /// Lines or columns past the end of the file yield an empty string.
    pub async fn get_line(
        &mut self,
        uri: &Url,
        line: u32,
        start_character: u32,
    ) -> Result<String, TextSourceError> {
        let text = self.line_text(uri, line).await?;
        Ok(text.chars().skip(start_character as usize).collect())
    }

    /// Returns the whole of `line`, or an empty string past the end of the file.
    pub async fn line_text(&mut self, uri: &Url, line: u32) -> Result<String, TextSourceError> {
        let text = self.text(uri).await?;
        Ok(text.lines().nth(line as usize).unwrap_or_default().to_string())
    }

    async fn text(&mut self, uri: &Url) -> Result<Arc<str>, TextSourceError> {
        if let Some(text) = self.texts.get(uri) {
            return Ok(text.clone());
        }

        let text = match self.store.get(uri) {
            Some(doc) => doc.text,
            None => {
                let path = uri
                    .to_file_path()
                    .map_err(|()| TextSourceError::NotAFile { uri: uri.clone() })?;
                let data = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|source| TextSourceError::Unreadable { path, source })?;
                self.disk_reads += 1;
                Arc::from(data)
            }
        };

        self.texts.insert(uri.clone(), text.clone());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn uri(path: &str) -> Url {
        Url::parse(&format!("file://{path}")).expect("valid uri")
    }

    #[tokio::test]
    async fn prefers_live_buffer() {
        let store = DocumentStore::new();
        let u = uri("/nowhere/main.clue");
        store.open(u.clone(), "local x = 1\nprint(x)".to_string(), 1);

        let mut cache = DocumentTextCache::new(&store);
        assert_eq!(cache.get_line(&u, 1, 6).await.expect("line"), "x)");
        assert_eq!(cache.get_line(&u, 5, 0).await.expect("line"), "");
        assert_eq!(cache.disk_reads(), 0);
    }

    #[tokio::test]
    async fn reads_disk_once_per_cycle() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "first line\nsecond line").expect("write");
        let u = Url::from_file_path(file.path()).expect("file uri");

        let store = DocumentStore::new();
        let mut cache = DocumentTextCache::new(&store);
        assert_eq!(cache.get_line(&u, 0, 6).await.expect("line"), "line");
        assert_eq!(cache.get_line(&u, 1, 0).await.expect("line"), "second line");
        assert_eq!(cache.disk_reads(), 1);

        // A fresh cycle sees changes made on disk in between.
        std::fs::write(file.path(), "changed\n").expect("rewrite");
        let mut next = DocumentTextCache::new(&store);
        assert_eq!(next.get_line(&u, 0, 0).await.expect("line"), "changed");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_file_is_an_error() {
        let store = DocumentStore::new();
        let mut cache = DocumentTextCache::new(&store);
        let err = cache
            .get_line(&uri("/definitely/not/here.clue"), 0, 0)
            .await
            .expect_err("missing file");
        assert!(matches!(err, TextSourceError::Unreadable { .. }));
    }

    #[test]
    fn stale_updates_are_ignored() {
        let store = DocumentStore::new();
        let u = uri("/a.clue");
        store.open(u.clone(), "v2".to_string(), 2);
        store.update(&u, "v1".to_string(), 1);
        assert_eq!(&*store.get(&u).expect("open").text, "v2");
        store.update(&u, "v3".to_string(), 3);
        assert_eq!(&*store.get(&u).expect("open").text, "v3");
        store.close(&u);
        assert!(store.get(&u).is_none());
    }
}
