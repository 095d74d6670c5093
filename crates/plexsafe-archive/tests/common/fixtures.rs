//! Fixture trees and archive inspection helpers

use filetime::FileTime;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;
use walkdir::WalkDir;

/// 2021-06-01 12:00:00 UTC, an even second so zip's DOS time keeps it
pub const FIXED_MTIME: i64 = 1_622_548_800;

/// Write `content` at `root/rel`, creating parents
pub fn write_file(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
}

/// The exclusion scenario tree: `{A/1.txt, A/Logs/2.txt, B/3.txt}`
pub fn scenario_tree(root: &Path) {
    write_file(root, "A/1.txt", b"one");
    write_file(root, "A/Logs/2.txt", b"two");
    write_file(root, "B/3.txt", b"three");
}

/// A tree with the awkward cases: empty directories, empty files, deep
/// nesting, names with spaces and a pinned modification time
pub fn rich_tree(root: &Path) {
    write_file(root, "Preferences.xml", b"<Preferences FriendlyName=\"test\"/>");
    write_file(
        root,
        "Plug-in Support/Databases/com.plexapp.plugins.library.db",
        &vec![7u8; 64 * 1024],
    );
    write_file(root, "Media/localhost/0/abc.bundle/Contents/Thumbnails/thumb1.jpg", b"jpeg");
    write_file(root, "Metadata/Movies/empty.txt", b"");
    fs::create_dir_all(root.join("Crash Reports/empty dir")).unwrap();
    fs::create_dir_all(root.join("Codecs")).unwrap();

    let pinned = root.join("Preferences.xml");
    filetime::set_file_mtime(&pinned, FileTime::from_unix_time(FIXED_MTIME, 0)).unwrap();
}

/// Highly compressible content, large enough for level differences to show
pub fn compressible_tree(root: &Path) {
    let line = b"<MediaContainer size=\"1\" allowSync=\"1\" identifier=\"com.plexapp\"/>\n";
    let content: Vec<u8> = line.iter().copied().cycle().take(256 * 1024).collect();
    write_file(root, "Logs.txt", &content);
    write_file(root, "nested/again.txt", &content);
}

/// Relative path (forward slashes) to file content; directories map to None
pub fn snapshot(root: &Path) -> BTreeMap<String, Option<Vec<u8>>> {
    let mut map = BTreeMap::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.unwrap();
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap()
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let content = if entry.file_type().is_dir() {
            None
        } else {
            Some(fs::read(entry.path()).unwrap())
        };
        map.insert(rel, content);
    }
    map
}

/// Modification time of `path` in unix seconds
pub fn mtime_secs(path: &Path) -> i64 {
    FileTime::from_last_modification_time(&fs::metadata(path).unwrap()).unix_seconds()
}

/// Entry names of a zip archive in archive order, trailing slashes trimmed
pub fn zip_entry_names(archive: &Path) -> Vec<String> {
    let mut zip = ::zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
    (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().trim_end_matches('/').to_string())
        .collect()
}

/// Entry names of a tar.gz archive in archive order, trailing slashes trimmed
pub fn targz_entry_names(archive: &Path) -> Vec<String> {
    let decoder = flate2::read::GzDecoder::new(File::open(archive).unwrap());
    let mut tar = tar::Archive::new(decoder);
    tar.entries()
        .unwrap()
        .map(|e| {
            e.unwrap()
                .path()
                .unwrap()
                .to_string_lossy()
                .trim_end_matches('/')
                .to_string()
        })
        .collect()
}

/// Entry names of a 7z archive in archive order, trailing slashes trimmed
pub fn sevenz_entry_names(archive: &Path) -> Vec<String> {
    let reader = sevenz_rust2::ArchiveReader::new(
        File::open(archive).unwrap(),
        sevenz_rust2::Password::empty(),
    )
    .unwrap();
    reader
        .archive()
        .files
        .iter()
        .map(|f| f.name().trim_end_matches('/').to_string())
        .collect()
}

/// The only regular file in `dir`, which must hold exactly one
pub fn single_file_in(dir: &Path) -> std::path::PathBuf {
    let files: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_file())
        .collect();
    assert_eq!(files.len(), 1, "expected one file in {}: {:?}", dir.display(), files);
    files.into_iter().next().unwrap()
}

/// Whether the `rar` tool is installed
pub fn rar_available() -> bool {
    which::which("rar").is_ok()
}
