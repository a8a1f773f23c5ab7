//! Decides what to hand the compiler when a file changes.
//!
//! Files inside a workspace root re-run the whole root, since the compiler's own
//! dependency resolution can surface errors in files other than the edited one.
//! Files outside every root are compiled alone.

use std::path::{Component, Path, PathBuf};

use url::Url;

/// One unit of work for a single compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub uri: Url,
    pub path: PathBuf,
    pub is_directory: bool,
}

impl Scope {
    pub fn directory(uri: Url) -> Option<Self> {
        Self::new(uri, true)
    }

    pub fn file(uri: Url) -> Option<Self> {
        Self::new(uri, false)
    }

    fn new(uri: Url, is_directory: bool) -> Option<Self> {
        let path = uri.to_file_path().ok()?;
        Some(Self {
            uri,
            path,
            is_directory,
        })
    }

    /// Maps a path reported by the compiler onto the file it refers to.
    ///
    /// In single-file mode the reported path is not trusted and the invoked file is
    /// used instead. In directory mode relative paths are taken from the root and an
    /// empty path cannot be attributed. Paths under the root keep the root URI's
    /// spelling, so they match the URIs the editor uses.
    pub fn attribute(&self, reported: &str) -> Option<Url> {
        if !self.is_directory {
            return Some(self.uri.clone());
        }
        if reported.is_empty() {
            return None;
        }
        let reported = Path::new(reported);
        if !reported.is_absolute() {
            return self.join(reported);
        }
        match reported.strip_prefix(&self.path) {
            Ok(relative) => self.join(relative),
            Err(_) => Url::from_file_path(reported).ok(),
        }
    }

    /// Appends `relative` to the root URI segment by segment.
    fn join(&self, relative: &Path) -> Option<Url> {
        let mut url = self.uri.clone();
        {
            let mut segments = url.path_segments_mut().ok()?;
            segments.pop_if_empty();
            for component in relative.components() {
                match component {
                    Component::Normal(part) => {
                        segments.push(part.to_str()?);
                    }
                    Component::CurDir => {}
                    Component::ParentDir => {
                        segments.pop();
                    }
                    Component::RootDir | Component::Prefix(_) => return None,
                }
            }
        }
        Some(url)
    }
}

/// Returns true when `uri` lies strictly under `root`. Both sides are compared as
/// file paths, so differently escaped spellings of one directory agree.
fn is_under(uri: &Url, root: &Url) -> bool {
    match (uri.to_file_path(), root.to_file_path()) {
        (Ok(path), Ok(root)) => path != root && path.starts_with(&root),
        _ => false,
    }
}

/// The most specific workspace root containing `uri`, if any.
fn containing_root<'a>(uri: &Url, roots: &'a [Url]) -> Option<&'a Url> {
    roots
        .iter()
        .filter(|root| is_under(uri, root))
        .max_by_key(|root| root.to_file_path().map_or(0, |path| path.components().count()))
}

/// Resolves the scope to re-run after `changed` was opened or saved.
/// Returns `None` for documents that are not on disk.
pub fn scope_for(changed: &Url, roots: &[Url]) -> Option<Scope> {
    match containing_root(changed, roots) {
        Some(root) => Scope::directory(root.clone()),
        None => Scope::file(changed.clone()),
    }
}

/// Every known unit: each root, then each open document outside all roots.
pub fn all_scopes(roots: &[Url], open_documents: &[Url]) -> Vec<Scope> {
    let dirs = roots.iter().cloned().filter_map(Scope::directory);
    let files = open_documents
        .iter()
        .filter(|uri| containing_root(uri, roots).is_none())
        .cloned()
        .filter_map(Scope::file);
    dirs.chain(files).collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).expect("valid url")
    }

    #[test]
    fn file_under_root_resolves_to_root() {
        let roots = vec![url("file:///ws/app"), url("file:///ws/lib/")];
        let scope = scope_for(&url("file:///ws/app/src/main.clue"), &roots).expect("scope");
        assert!(scope.is_directory);
        assert_eq!(scope.path, PathBuf::from("/ws/app"));

        let scope = scope_for(&url("file:///ws/lib/x.clue"), &roots).expect("scope");
        assert_eq!(scope.uri, url("file:///ws/lib/"));
    }

    #[test]
    fn sibling_with_shared_prefix_is_not_under_root() {
        let roots = vec![url("file:///ws/app")];
        let scope = scope_for(&url("file:///ws/application/a.clue"), &roots).expect("scope");
        assert!(!scope.is_directory);
        assert_eq!(scope.path, PathBuf::from("/ws/application/a.clue"));
    }

    #[test]
    fn nested_roots_pick_the_innermost() {
        let roots = vec![url("file:///ws"), url("file:///ws/inner")];
        let scope = scope_for(&url("file:///ws/inner/a.clue"), &roots).expect("scope");
        assert_eq!(scope.path, PathBuf::from("/ws/inner"));
    }

    #[test]
    fn non_file_documents_have_no_scope() {
        assert!(scope_for(&url("untitled:Untitled-1"), &[]).is_none());
    }

    #[test]
    fn all_scopes_lists_roots_then_loose_files() {
        let roots = vec![url("file:///ws/a"), url("file:///ws/b")];
        let open = vec![
            url("file:///ws/a/x.clue"),
            url("file:///tmp/loose.clue"),
            url("untitled:Untitled-1"),
        ];
        let scopes = all_scopes(&roots, &open);
        let summary: Vec<(&str, bool)> = scopes
            .iter()
            .map(|s| (s.uri.as_str(), s.is_directory))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("file:///ws/a", true),
                ("file:///ws/b", true),
                ("file:///tmp/loose.clue", false),
            ]
        );
    }

    #[test]
    fn attribution_by_mode() {
        let dir = Scope::directory(url("file:///ws/app")).expect("scope");
        assert_eq!(dir.attribute("src/a.clue"), Some(url("file:///ws/app/src/a.clue")));
        assert_eq!(dir.attribute("/abs/b.clue"), Some(url("file:///abs/b.clue")));
        assert_eq!(dir.attribute(""), None);

        assert_eq!(dir.attribute("./src/../b.clue"), Some(url("file:///ws/app/b.clue")));
        assert_eq!(dir.attribute("/ws/app/src/c.clue"), Some(url("file:///ws/app/src/c.clue")));

        let file = Scope::file(url("file:///tmp/one.clue")).expect("scope");
        assert_eq!(file.attribute(""), Some(url("file:///tmp/one.clue")));
        assert_eq!(file.attribute("elsewhere.clue"), Some(url("file:///tmp/one.clue")));
    }

    #[test]
    fn attributed_uris_keep_the_root_spelling() {
        let root = url("file:///c%3A/ws/");
        let scope = scope_for(&url("file:///c%3A/ws/a.clue"), &[root.clone()]).expect("scope");
        assert!(scope.is_directory);
        assert_eq!(scope.uri, root);

        assert_eq!(scope.attribute("src/a.clue"), Some(url("file:///c%3A/ws/src/a.clue")));
        assert_eq!(scope.attribute("/c:/ws/src/b.clue"), Some(url("file:///c%3A/ws/src/b.clue")));
    }
}
