//! Translation of service object properties into `StorageRecord`s

use std::collections::HashSet;

use adapter_core::StorageRecord;

use crate::backend::BlobObject;

/// Build a file record from a service object
///
/// `explicit_path` wins over the object's own name. Absent properties stay
/// absent; a missing or pre-epoch last-modified yields no timestamp.
pub fn normalize(object: &BlobObject, explicit_path: Option<&str>) -> StorageRecord {
    let props = &object.properties;
    StorageRecord {
        size: props.content_length,
        mimetype: props.content_type.clone(),
        timestamp: props
            .last_modified
            .and_then(|at| u64::try_from(at.timestamp()).ok()),
        ..StorageRecord::file(explicit_path.unwrap_or(&object.name))
    }
}

/// Synthesized record for a directory
pub fn directory(path: &str) -> StorageRecord {
    StorageRecord::dir(path.trim_end_matches('/'))
}

/// Insert a directory record for every ancestor implied by the file records
///
/// Each directory appears once, immediately before the first file beneath it.
/// Directory records already present in the input are kept and not repeated.
pub fn emulate_directories(records: Vec<StorageRecord>) -> Vec<StorageRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(records.len() * 2);

    for record in records {
        if record.is_dir() {
            if seen.insert(record.path.clone()) {
                out.push(record);
            }
            continue;
        }

        for (idx, _) in record.path.match_indices('/') {
            let ancestor = &record.path[..idx];
            if ancestor.is_empty() || ancestor.ends_with('/') {
                continue;
            }
            if seen.insert(ancestor.to_string()) {
                out.push(directory(ancestor));
            }
        }
        out.push(record);
    }

    out
}
