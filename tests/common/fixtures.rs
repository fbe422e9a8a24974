//! Mod archive fixtures

use std::io::{Cursor, Write};
use zip::write::FileOptions;

/// One entry of a fixture archive
#[derive(Clone, Copy, Debug)]
pub enum Entry<'a> {
    /// Explicit directory entry
    Dir(&'a str),
    /// File entry with content
    File(&'a str, &'a [u8]),
}

/// Build a zip archive with entries in the given order
pub fn build_zip(entries: &[Entry<'_>]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default();
    for entry in entries {
        match entry {
            Entry::Dir(name) => writer
                .add_directory(*name, options)
                .expect("failed to add directory"),
            Entry::File(name, content) => {
                writer
                    .start_file(*name, options)
                    .expect("failed to start file");
                writer.write_all(content).expect("failed to write file");
            }
        }
    }
    writer
        .finish()
        .expect("failed to finish archive")
        .into_inner()
}

/// A Psych-style mod laid out at the archive root
pub fn flat_mod() -> Vec<u8> {
    build_zip(&[
        Entry::File("data/song.json", b"{\"song\":\"tutorial\"}"),
        Entry::File("images/bg.png", b"\x89PNG"),
        Entry::File("pack.json", b"{}"),
    ])
}

/// A V-Slice mod wrapped in a single folder, with the folder listed first
pub fn wrapped_mod(folder: &str) -> Vec<u8> {
    let dir = format!("{}/", folder);
    let data = format!("{}/data/", folder);
    let chart = format!("{}/data/chart.json", folder);
    let script = format!("{}/scripts/init.hx", folder);
    let meta = format!("{}/_polymod_meta.json", folder);
    build_zip(&[
        Entry::Dir(&dir),
        Entry::Dir(&data),
        Entry::File(&chart, b"{\"notes\":[]}"),
        Entry::File(&script, b"trace('hi');"),
        Entry::File(&meta, b"{\"title\":\"Wrapped\"}"),
    ])
}

/// An archive with no marker folders anywhere
pub fn markerless_mod() -> Vec<u8> {
    build_zip(&[
        Entry::File("readme.txt", b"no markers here"),
        Entry::File("Pack/assets/a.png", b"a"),
    ])
}
