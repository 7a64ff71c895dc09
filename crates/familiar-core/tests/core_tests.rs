use std::fs;
use std::io::Write;
use tempfile::TempDir;

use familiar_core::chunker::ChunkingConfig;
use familiar_core::data_processor::{list_documents, read_document, DataProcessor};
use familiar_core::Error;

#[test]
fn process_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let processor = DataProcessor::default();
    let corpus = processor.process_directory(dir).expect("process");

    assert_eq!(corpus.documents, 1);
    assert_eq!(corpus.chunks.len(), 1, "one small paragraph becomes one chunk");
    assert_eq!(corpus.chunks[0].text.trim(), "Short text");
    assert_eq!(corpus.chunks[0].id, "a.txt:0");
    assert_eq!(corpus.chunks[0].source.origin, "misc");
}

#[test]
fn empty_directory_is_not_an_error() {
    let tmp = TempDir::new().unwrap();
    let corpus = DataProcessor::default().process_directory(tmp.path()).expect("process");
    assert_eq!(corpus.documents, 0);
    assert!(corpus.chunks.is_empty());
    assert!(corpus.skipped.is_empty());
}

#[test]
fn missing_directory_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = DataProcessor::default().process_directory(&tmp.path().join("nope")).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn undecodable_documents_are_skipped_not_fatal() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("good.md"), "# Title\n\nSome prose.").unwrap();
    fs::write(dir.join("binary.bin"), [0x89u8, b'P', b'N', b'G', 0, 0, 1]).unwrap();
    fs::write(dir.join("latin1.txt"), [b'c', b'a', b'f', 0xE9]).unwrap();

    let corpus = DataProcessor::default().process_directory(dir).expect("process");
    assert_eq!(corpus.documents, 1);
    assert_eq!(corpus.skipped.len(), 2);
    assert!(corpus.chunks.iter().all(|c| c.doc_id == "good.md"));
}

#[test]
fn read_document_reports_unsupported_format() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("blob.dat");
    fs::write(&path, [0xFFu8, 0xFE, 0xFD]).unwrap();
    let err = read_document(tmp.path(), &path).unwrap_err();
    match err {
        Error::UnsupportedFormat { path: p, .. } => assert_eq!(p, path),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn nested_documents_get_normalized_ids_and_origin() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("baldrick-pest/docs")).unwrap();
    fs::write(dir.join("baldrick-pest/docs/README.md"), "pest runs tests").unwrap();

    let path = dir.join("baldrick-pest/docs/README.md");
    let doc = read_document(dir, &path).expect("read");
    assert_eq!(doc.id, "baldrick-pest/docs/README.md");
    assert_eq!(doc.source.origin, "baldrick-pest/docs");
    assert_eq!(doc.source.file_name, "README.md");
}

#[test]
fn hidden_entries_are_ignored_and_listing_is_sorted() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join(".git")).unwrap();
    fs::write(dir.join(".git/HEAD"), "ref: refs/heads/main").unwrap();
    fs::write(dir.join(".DS_Store"), "x").unwrap();
    fs::write(dir.join("b.md"), "b").unwrap();
    fs::write(dir.join("a.md"), "a").unwrap();

    let files = list_documents(dir);
    let names: Vec<String> = files.iter().map(|p| p.file_name().unwrap().to_string_lossy().to_string()).collect();
    assert_eq!(names, vec!["a.md", "b.md"]);
}

#[test]
fn chunk_ids_are_stable_across_runs() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let body = (0..2000).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
    fs::write(dir.join("long.txt"), body).unwrap();

    let processor = DataProcessor::new(ChunkingConfig { max_tokens: 120, overlap_percent: 0.1 });
    let first = processor.process_directory(dir).expect("first");
    let second = processor.process_directory(dir).expect("second");
    assert!(first.chunks.len() > 1);
    assert_eq!(first.chunks, second.chunks);
}

#[test]
fn unreadable_paths_are_io_errors() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("dir.md")).unwrap();
    let err = read_document(tmp.path(), &tmp.path().join("dir.md")).unwrap_err();
    assert!(matches!(err, Error::Io(_)), "{err}");
}

#[cfg(unix)]
#[test]
fn broken_links_are_skipped_not_fatal() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("good.md"), "Some prose.").unwrap();
    std::os::unix::fs::symlink(dir.join("gone.md"), dir.join("dangling.md")).unwrap();

    let corpus = DataProcessor::default().process_directory(dir).expect("process");
    assert_eq!(corpus.documents, 1);
    assert_eq!(corpus.skipped.len(), 1);
    assert!(corpus.skipped[0].path.ends_with("dangling.md"));
    assert!(corpus.skipped[0].reason.starts_with("unreadable"));
}

#[cfg(unix)]
#[test]
fn symlinked_documents_are_followed() {
    let outside = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();
    fs::write(outside.path().join("real.md"), "Linked prose.").unwrap();
    std::os::unix::fs::symlink(outside.path().join("real.md"), tmp.path().join("linked.md")).unwrap();

    let corpus = DataProcessor::default().process_directory(tmp.path()).expect("process");
    assert_eq!(corpus.documents, 1);
    assert_eq!(corpus.chunks[0].doc_id, "linked.md");
    assert_eq!(corpus.chunks[0].text, "Linked prose.");
}

#[test]
fn document_paths_are_absolute_and_resolved() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("sub")).unwrap();
    fs::write(dir.join("a.txt"), "Short text").unwrap();

    let corpus = DataProcessor::default().process_directory(&dir.join("sub/..")).expect("process");
    let expected = dir.canonicalize().unwrap().join("a.txt");
    assert_eq!(corpus.chunks[0].doc_path, expected.to_string_lossy());
    assert_eq!(corpus.chunks[0].id, "a.txt:0");
}
