//! Package archives built in memory.

use std::io::{Cursor, Write};

use flate2::Compression;
use flate2::write::GzEncoder;

/// A gzipped tarball with every entry placed under `wrapper/`.
///
/// Mirrors how published tarballs are laid out: `wrapper/manifest.json`,
/// `wrapper/lib/...`.
pub fn tar_gz_archive(wrapper: &str, entries: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{wrapper}/{name}"), content.as_bytes())
            .expect("append tar entry");
    }

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .expect("finish tarball")
}

/// A zip archive with entries at the root.
pub fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .expect("start zip entry");
        writer.write_all(content.as_bytes()).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}
