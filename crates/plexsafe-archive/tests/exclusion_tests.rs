//! Exclusion and entry-order integration tests
//!
//! Checks the archived entry set against configured exclusions and that
//! archiving the same tree twice yields the same entry order.

mod common;

use common::*;
use plexsafe_archive::backend::{
    ArchiveBackend, CompressRequest, SevenZipBackend, TarGzBackend, ZipBackend,
};
use plexsafe_archive::{ExclusionSet, NullProgress, PathFilter};
use plexsafe_core::CompressionLevel;
use std::path::Path;
use tempfile::TempDir;

fn archive_names(backend: &dyn ArchiveBackend, source: &Path, exclusions: &[&str]) -> Vec<String> {
    let work = TempDir::new().unwrap();
    let archive = work.path().join(format!("out.{}", backend.format().extension()));
    let filter = PathFilter::new(ExclusionSet::new(exclusions.iter().copied()));
    let request = CompressRequest::new(source, filter, CompressionLevel::default());
    backend.compress(&request, &archive, &NullProgress).unwrap();

    match backend.format() {
        plexsafe_core::ArchiveFormat::Zip => zip_entry_names(&archive),
        plexsafe_core::ArchiveFormat::SevenZip => sevenz_entry_names(&archive),
        _ => targz_entry_names(&archive),
    }
}

#[test]
fn test_excluded_folder_at_any_depth() {
    let source = TempDir::new().unwrap();
    scenario_tree(source.path());

    for backend in [
        &ZipBackend as &dyn ArchiveBackend,
        &TarGzBackend,
        &SevenZipBackend,
    ] {
        let names = archive_names(backend, source.path(), &["Logs"]);
        assert_eq!(names, vec!["A", "A/1.txt", "B", "B/3.txt"], "{}", backend.format());
    }
}

#[test]
fn test_exclusion_is_segment_exact() {
    let source = TempDir::new().unwrap();
    write_file(source.path(), "Logs/a.log", b"a");
    write_file(source.path(), "LogsArchive/b.log", b"b");
    write_file(source.path(), "Plex Logs/c.log", b"c");

    let names = archive_names(&ZipBackend, source.path(), &["logs"]);
    assert_eq!(
        names,
        vec!["LogsArchive", "LogsArchive/b.log", "Plex Logs", "Plex Logs/c.log"]
    );
}

#[test]
fn test_multi_segment_exclusion_is_anchored() {
    let source = TempDir::new().unwrap();
    write_file(source.path(), "Cache/PhotoTranscoder/1.jpg", b"1");
    write_file(source.path(), "Cache/Other/2.bin", b"2");
    write_file(source.path(), "Media/Cache/PhotoTranscoder/3.jpg", b"3");

    let names = archive_names(&TarGzBackend, source.path(), &["Cache/PhotoTranscoder"]);
    assert!(!names.iter().any(|n| n.starts_with("Cache/PhotoTranscoder")));
    assert!(names.contains(&"Cache/Other/2.bin".to_string()));
    assert!(names.contains(&"Media/Cache/PhotoTranscoder/3.jpg".to_string()));
}

#[test]
fn test_empty_exclusions_include_everything() {
    let source = TempDir::new().unwrap();
    scenario_tree(source.path());

    let names = archive_names(&ZipBackend, source.path(), &[]);
    assert_eq!(
        names,
        vec!["A", "A/1.txt", "A/Logs", "A/Logs/2.txt", "B", "B/3.txt"]
    );
}

#[test]
fn test_entry_order_is_stable() {
    let source = TempDir::new().unwrap();
    rich_tree(source.path());
    scenario_tree(source.path());

    for backend in [
        &ZipBackend as &dyn ArchiveBackend,
        &TarGzBackend,
        &SevenZipBackend,
    ] {
        let first = archive_names(backend, source.path(), &["Logs"]);
        let second = archive_names(backend, source.path(), &["Logs"]);
        assert_eq!(first, second);

        // parents precede their children
        for (i, name) in first.iter().enumerate() {
            if let Some((parent, _)) = name.rsplit_once('/') {
                let parent_pos = first.iter().position(|n| n == parent).unwrap();
                assert!(parent_pos < i, "{} listed before its parent", name);
            }
        }
    }
}
