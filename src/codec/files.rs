//! `0x02 FILES` codec: encodes a path / list of paths / name→path mapping
//! into a concatenated byte stream plus a `Files` header; decodes the
//! reverse (spec.md §4.2).

use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};

use crate::error::CodecError;
use crate::frame::FileEntry;

/// What a handler hands the FILES codec to encode.
pub enum FileSource {
    /// A single file; `key` defaults to `"file"`.
    Single(PathBuf),
    /// An ordered list; `key` is the list index as a string.
    List(Vec<PathBuf>),
    /// A name→path mapping; `key` is the map key.
    Named(Vec<(String, PathBuf)>),
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Reads every referenced file and concatenates their bytes, producing the
/// matching `Files` header entries in the same order.
pub async fn encode(source: &FileSource) -> Result<(Bytes, Vec<FileEntry>), CodecError> {
    let paths: Vec<(String, &Path)> = match source {
        FileSource::Single(p) => vec![("file".to_string(), p.as_path())],
        FileSource::List(paths) => paths
            .iter()
            .enumerate()
            .map(|(i, p)| (i.to_string(), p.as_path()))
            .collect(),
        FileSource::Named(named) => named.iter().map(|(k, p)| (k.clone(), p.as_path())).collect(),
    };

    let mut body = BytesMut::new();
    let mut entries = Vec::with_capacity(paths.len());
    for (key, path) in paths {
        let bytes = tokio::fs::read(path).await.map_err(CodecError::FileIo)?;
        entries.push(FileEntry {
            key,
            name: file_name(path),
            size: bytes.len() as u64,
            r#type: None,
        });
        body.extend_from_slice(&bytes);
    }
    Ok((body.freeze(), entries))
}

/// One decoded file: its metadata plus its byte range within the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFile {
    pub entry: FileEntry,
    pub data: Bytes,
}

/// Splits a concatenated payload back into its constituent files using the
/// declared `Files` header, validating the total length matches.
pub fn decode(payload: &Bytes, entries: &[FileEntry]) -> Result<Vec<DecodedFile>, CodecError> {
    let declared: u64 = entries.iter().map(|e| e.size).sum();
    if declared != payload.len() as u64 {
        return Err(CodecError::FilesLengthMismatch {
            declared,
            actual: payload.len() as u64,
        });
    }
    let mut out = Vec::with_capacity(entries.len());
    let mut cursor = 0usize;
    for entry in entries {
        let end = cursor + entry.size as usize;
        out.push(DecodedFile {
            entry: entry.clone(),
            data: payload.slice(cursor..end),
        });
        cursor = end;
    }
    Ok(out)
}

/// Applies the `Offset` header to a FILES payload (GLOSSARY note (c)):
/// drops the first `offset` bytes, subtracting from declared sizes in
/// order and removing any entry whose remaining size reaches zero, while
/// keeping the original `name` on partially-consumed entries.
pub fn apply_offset(
    payload: &Bytes,
    entries: &[FileEntry],
    offset: u64,
) -> (Bytes, Vec<FileEntry>) {
    let mut remaining_offset = offset;
    let mut new_entries = Vec::with_capacity(entries.len());
    for entry in entries {
        if remaining_offset >= entry.size {
            remaining_offset -= entry.size;
            continue;
        }
        let mut trimmed = entry.clone();
        trimmed.size -= remaining_offset;
        remaining_offset = 0;
        new_entries.push(trimmed);
    }
    let trimmed_payload = payload.slice((offset.min(payload.len() as u64) as usize)..);
    (trimmed_payload, new_entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, name: &str, size: u64) -> FileEntry {
        FileEntry {
            key: key.into(),
            name: name.into(),
            size,
            r#type: None,
        }
    }

    #[test]
    fn decode_splits_by_declared_sizes() {
        let payload = Bytes::from_static(b"helloworld!");
        let entries = vec![entry("0", "a.txt", 5), entry("1", "b.txt", 6)];
        let files = decode(&payload, &entries).unwrap();
        assert_eq!(files[0].data, Bytes::from_static(b"hello"));
        assert_eq!(files[1].data, Bytes::from_static(b"world!"));
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        let payload = Bytes::from_static(b"short");
        let entries = vec![entry("0", "a.txt", 10)];
        assert!(matches!(
            decode(&payload, &entries),
            Err(CodecError::FilesLengthMismatch { .. })
        ));
    }

    #[test]
    fn offset_drops_whole_files_and_trims_partial() {
        // Files: "hello" (5) + "world!" (6); offset 7 consumes "hello" (5)
        // entirely and 2 bytes of "world!".
        let payload = Bytes::from_static(b"helloworld!");
        let entries = vec![entry("0", "a.txt", 5), entry("1", "b.txt", 6)];
        let (trimmed_payload, trimmed_entries) = apply_offset(&payload, &entries, 7);
        assert_eq!(trimmed_payload, Bytes::from_static(b"rld!"));
        assert_eq!(trimmed_entries.len(), 1);
        assert_eq!(trimmed_entries[0].name, "b.txt");
        assert_eq!(trimmed_entries[0].size, 4);
    }

    #[test]
    fn offset_consuming_exactly_one_file_drops_it() {
        let payload = Bytes::from_static(b"helloworld!");
        let entries = vec![entry("0", "a.txt", 5), entry("1", "b.txt", 6)];
        let (_, trimmed_entries) = apply_offset(&payload, &entries, 5);
        assert_eq!(trimmed_entries.len(), 1);
        assert_eq!(trimmed_entries[0].name, "b.txt");
        assert_eq!(trimmed_entries[0].size, 6);
    }
}
