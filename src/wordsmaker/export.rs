use crate::engine::TreeEngine;
use crate::error::{Result, WordsError};
use crate::store::StorageBackend;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashSet;
use std::io::Write;
use tracing::warn;

/// Writes the project as a gzip'd tar archive that mirrors the tree: one
/// directory per folder, one `<name>.txt` per document holding its title and
/// body. Entries appear in outline order.
pub fn write_archive<W: Write, B: StorageBackend>(writer: W, engine: &TreeEngine<B>) -> Result<()> {
    let enc = GzEncoder::new(writer, Compression::default());
    let mut tar = tar::Builder::new(enc);

    let root = sanitize_filename(engine.project().as_str());
    let root = if root.is_empty() { "project".to_string() } else { root };
    append_dir(&mut tar, &root)?;

    let mut used: HashSet<String> = HashSet::new();
    // Directory path of each depth currently open in the walk.
    let mut dirs: Vec<String> = vec![root];

    for (depth, node) in engine.tree().outline() {
        dirs.truncate(depth + 1);
        let parent_dir = dirs[depth].clone();
        let mut base = sanitize_filename(&node.name);
        if base.is_empty() {
            base = format!("untitled-{}", node.id);
        }

        if node.is_folder() {
            let mut path = format!("{}/{}", parent_dir, base);
            if !used.insert(path.clone()) {
                path = format!("{}-{}", path, node.id);
                used.insert(path.clone());
            }
            append_dir(&mut tar, &path)?;
            dirs.push(path);
            continue;
        }

        let mut path = format!("{}/{}.txt", parent_dir, base);
        if !used.insert(path.clone()) {
            path = format!("{}/{}-{}.txt", parent_dir, base, node.id);
            used.insert(path.clone());
        }
        let body = match engine.load_document(node.id) {
            Ok(body) => body,
            Err(WordsError::NotFound(what)) => {
                warn!(id = node.id, missing = %what, "exporting document without content");
                String::new()
            }
            Err(e) => return Err(e),
        };
        let content = format!("{}\n\n{}", node.name, body);

        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        tar.append_data(&mut header, &path, content.as_bytes())
            .map_err(WordsError::Io)?;
    }

    tar.into_inner()
        .map_err(WordsError::Io)?
        .finish()
        .map_err(WordsError::Io)?;
    Ok(())
}

fn append_dir<W: Write>(tar: &mut tar::Builder<W>, path: &str) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Directory);
    header.set_size(0);
    header.set_mode(0o755);
    header.set_cksum();
    tar.append_data(&mut header, path, std::io::empty())
        .map_err(WordsError::Io)
}

pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeKind, ProjectName, ROOT_ID};
    use crate::store::{Area, ContentStore, MemBackend};
    use crate::tree::Tree;
    use chrono::{TimeZone, Utc};
    use flate2::read::GzDecoder;
    use std::io::Read;
    use std::rc::Rc;

    fn read_entries(bytes: &[u8]) -> Vec<(String, String)> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        archive
            .entries()
            .unwrap()
            .map(|e| {
                let mut entry = e.unwrap();
                let path = entry.path().unwrap().to_string_lossy().trim_end_matches('/').to_string();
                let mut content = String::new();
                entry.read_to_string(&mut content).unwrap();
                (path, content)
            })
            .collect()
    }

    #[test]
    fn archive_mirrors_the_tree() {
        let backend = Rc::new(MemBackend::new());
        let project = ProjectName::new("My Novel").unwrap();
        backend.create_area(Area::Project(&project)).unwrap();
        let mut engine = TreeEngine::new(Tree::new(), ContentStore::new(backend, project));
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let part = engine
            .create_node(ROOT_ID, NodeKind::Folder, "Part I", now)
            .unwrap();
        let ch = engine
            .create_node(part.id, NodeKind::File, "Chapter 1: Arrival", now)
            .unwrap();
        engine.save_document(ch.id, "The train was late.", 4, now).unwrap();
        engine
            .create_node(part.id, NodeKind::File, "Chapter 1: Arrival", now)
            .unwrap();

        let mut out = Vec::new();
        write_archive(&mut out, &engine).unwrap();
        let entries = read_entries(&out);
        let paths: Vec<&str> = entries.iter().map(|(p, _)| p.as_str()).collect();

        assert_eq!(
            paths,
            vec![
                "My Novel",
                "My Novel/Part I",
                "My Novel/Part I/Chapter 1_ Arrival.txt",
                "My Novel/Part I/Chapter 1_ Arrival-3.txt",
            ]
        );
        assert_eq!(entries[2].1, "Chapter 1: Arrival\n\nThe train was late.");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Hello World"), "Hello World");
        assert_eq!(sanitize_filename("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_filename("  padded  "), "padded");
    }
}
