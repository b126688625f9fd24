//! Document sources feeding [`crate::IndexBuilder`].
//!
//! A source owns discovery and I/O. The index only sees `(id, lines)` pairs
//! and per-document errors.

use crate::error::IngestError;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One document ready for ingestion.
pub struct SourceDocument<L> {
    pub id: String,
    pub lines: L,
}

pub trait DocumentSource {
    type Lines: Iterator<Item = io::Result<String>>;

    /// Next document, a per-document error, or `None` when exhausted.
    fn next_document(&mut self) -> Option<Result<SourceDocument<Self::Lines>, IngestError>>;
}

/// Recursively walks a directory and yields files with a matching extension.
///
/// Document ids are paths relative to the root joined with `/`, so a flat
/// corpus is identified by bare file names.
pub struct DirectorySource {
    root: PathBuf,
    files: std::vec::IntoIter<walkdir::Result<PathBuf>>,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(root: P, extension: &str) -> Self {
        let root = root.as_ref().to_path_buf();
        let mut files: Vec<walkdir::Result<PathBuf>> = WalkDir::new(&root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) if e.file_type().is_file() && has_extension(e.path(), extension) => {
                    Some(Ok(e.into_path()))
                }
                Ok(_) => None,
                Err(err) => Some(Err(err)),
            })
            .collect();
        // walk order depends on the filesystem; keep ingestion reproducible
        files.sort_by(|a, b| match (a, b) {
            (Ok(a), Ok(b)) => a.cmp(b),
            (Ok(_), Err(_)) => std::cmp::Ordering::Less,
            (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
            (Err(_), Err(_)) => std::cmp::Ordering::Equal,
        });
        tracing::debug!(root = %root.display(), files = files.len(), "discovered documents");
        Self { root, files: files.into_iter() }
    }

    fn doc_id(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Lines of a file decoded lossily: malformed UTF-8 becomes U+FFFD, which the
/// tokenizer then deletes, so Latin-1 and other legacy encodings still index.
pub struct LossyLines<R> {
    inner: io::Split<R>,
}

impl<R: BufRead> LossyLines<R> {
    pub fn new(reader: R) -> Self {
        Self { inner: reader.split(b'\n') }
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.inner.next()?;
        Some(line.map(|mut bytes| {
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            match String::from_utf8(bytes) {
                Ok(s) => s,
                Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
            }
        }))
    }
}

impl DocumentSource for DirectorySource {
    type Lines = LossyLines<BufReader<File>>;

    fn next_document(&mut self) -> Option<Result<SourceDocument<Self::Lines>, IngestError>> {
        let path = match self.files.next()? {
            Ok(path) => path,
            Err(err) => {
                let doc_id = err.path().map(|p| self.doc_id(p));
                return Some(Err(match doc_id {
                    Some(doc_id) => IngestError::Io { doc_id, source: err.into() },
                    None => IngestError::Source(err.to_string()),
                }));
            }
        };
        let id = self.doc_id(&path);
        Some(match File::open(&path) {
            Ok(f) => Ok(SourceDocument { id, lines: LossyLines::new(BufReader::new(f)) }),
            Err(source) => Err(IngestError::Io { doc_id: id, source }),
        })
    }
}

/// In-memory `(id, text)` pairs, mostly for tests and embedding.
pub struct MemorySource {
    docs: std::vec::IntoIter<(String, String)>,
}

impl MemorySource {
    pub fn new<I, K, V>(docs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let docs: Vec<(String, String)> = docs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { docs: docs.into_iter() }
    }
}

impl DocumentSource for MemorySource {
    type Lines = std::vec::IntoIter<io::Result<String>>;

    fn next_document(&mut self) -> Option<Result<SourceDocument<Self::Lines>, IngestError>> {
        let (id, text) = self.docs.next()?;
        let lines: Vec<io::Result<String>> = text.lines().map(|l| Ok(l.to_string())).collect();
        Some(Ok(SourceDocument { id, lines: lines.into_iter() }))
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn walks_recursively_and_filters_by_extension() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.txt"), "two").unwrap();
        fs::write(dir.path().join("a.txt"), "one").unwrap();
        fs::write(dir.path().join("skip.md"), "no").unwrap();
        fs::write(dir.path().join("nested/c.TXT"), "three").unwrap();

        let mut source = DirectorySource::new(dir.path(), "txt");
        let mut ids = Vec::new();
        while let Some(doc) = source.next_document() {
            ids.push(doc.unwrap().id);
        }
        assert_eq!(ids, vec!["a.txt", "b.txt", "nested/c.TXT"]);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let raw: &[u8] = b"caf\xe9 cat\r\nsecond line\n\xff";
        let lines: Vec<String> = LossyLines::new(raw).map(Result::unwrap).collect();
        assert_eq!(lines, vec!["caf\u{FFFD} cat", "second line", "\u{FFFD}"]);
    }

    #[test]
    fn memory_source_splits_lines() {
        let mut source = MemorySource::new([("x", "one\ntwo")]);
        let doc = source.next_document().unwrap().unwrap();
        assert_eq!(doc.id, "x");
        let lines: Vec<String> = doc.lines.map(Result::unwrap).collect();
        assert_eq!(lines, vec!["one", "two"]);
        assert!(source.next_document().is_none());
    }
}
