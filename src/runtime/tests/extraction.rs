//! Integration tests for layer extraction across multiple layers.

mod common;

use std::fs;

use common::{layer, patterns, Item};
use layercheck_core::CheckError;
use layercheck_runtime::extract;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[test]
fn test_escaping_entry_creates_nothing_outside_destination() {
    let sandbox = TempDir::new().unwrap();
    let dest = sandbox.path().join("dest");
    fs::create_dir(&dest).unwrap();
    let layers = vec![layer(
        "sha256:l0",
        &[
            Item::File("licenses/ok.txt", b"fine"),
            Item::RawFile("../escape.txt", b"evil"),
        ],
    )];

    let result = extract(&dest, &layers, &patterns(&["*", "*/*"]), &CancellationToken::new());

    assert!(matches!(result, Err(CheckError::PathEscape { .. })));
    assert!(!sandbox.path().join("escape.txt").exists());
}

#[cfg(unix)]
#[test]
fn test_escaping_symlink_is_not_created_and_rest_succeeds() {
    let dest = TempDir::new().unwrap();
    let layers = vec![layer(
        "sha256:l0",
        &[
            Item::Symlink("licenses/passwd", "../../../../etc/passwd"),
            Item::File("licenses/a.txt", b"license"),
        ],
    )];

    let report = extract(
        dest.path(),
        &layers,
        &patterns(&["/licenses/*"]),
        &CancellationToken::new(),
    )
    .unwrap();

    assert!(fs::symlink_metadata(dest.path().join("licenses/passwd")).is_err());
    assert_eq!(fs::read(dest.path().join("licenses/a.txt")).unwrap(), b"license");
    assert!(report.skipped_links.contains("licenses/passwd"));
}

/// linkN -> linkN-1 -> ... -> link1 -> original, spread across layers in
/// reverse order so every hop needs its own pass.
#[cfg(unix)]
#[test]
fn test_symlink_chain_across_layers_resolves() {
    const N: usize = 5;
    let original = b"the original bytes";
    let names: Vec<String> = (1..=N).map(|i| format!("chain/link{}", i)).collect();

    let mut layers = vec![layer("sha256:base", &[Item::File("data/original", original)])];
    for i in (0..N).rev() {
        let target = if i == 0 {
            "/data/original".to_string()
        } else {
            format!("link{}", i)
        };
        layers.push(layer(
            &format!("sha256:l{}", i),
            &[Item::Symlink(&names[i], &target)],
        ));
    }
    let dest = TempDir::new().unwrap();
    let last = format!("/{}", names[N - 1]);

    let report = extract(dest.path(), &layers, &patterns(&[&last]), &CancellationToken::new())
        .unwrap();

    assert!(report.passes <= N + 1);
    assert!(report.dangling.is_empty());
    for name in &names {
        assert_eq!(fs::read(dest.path().join(name)).unwrap(), original);
        let text = fs::read_link(dest.path().join(name)).unwrap();
        assert!(text.is_relative());
    }
}

#[test]
fn test_reextraction_in_later_layer_is_a_noop() {
    let dest = TempDir::new().unwrap();
    let layers = vec![
        layer("sha256:l0", &[Item::File("etc/os-release", b"ID=rhel")]),
        layer("sha256:l1", &[Item::File("etc/os-release", b"ID=rhel\nVERSION_ID=9")]),
    ];

    let report = extract(
        dest.path(),
        &layers,
        &patterns(&["/etc/os-release"]),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(report.extracted.len(), 1);
    assert_eq!(
        fs::read_to_string(dest.path().join("etc/os-release")).unwrap(),
        "ID=rhel\nVERSION_ID=9"
    );
}

#[test]
fn test_whiteout_in_later_layer_deletes_file() {
    let dest = TempDir::new().unwrap();
    let layers = vec![
        layer(
            "sha256:l0",
            &[
                Item::File("licenses/a.txt", b"a"),
                Item::File("licenses/b.txt", b"b"),
            ],
        ),
        layer("sha256:l1", &[Item::Whiteout("licenses/b.txt")]),
    ];

    extract(
        dest.path(),
        &layers,
        &patterns(&["/licenses/*"]),
        &CancellationToken::new(),
    )
    .unwrap();

    assert!(dest.path().join("licenses/a.txt").exists());
    assert!(!dest.path().join("licenses/b.txt").exists());
}

#[test]
fn test_gzip_layer_is_decompressed() {
    use std::io::Write;

    let plain = layer("sha256:plain", &[Item::File("licenses/a.txt", b"gzipped")]);
    let mut raw = Vec::new();
    std::io::copy(&mut layercheck_runtime::Layer::open(&plain).unwrap(), &mut raw).unwrap();
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&raw).unwrap();
    let gz = layercheck_runtime::MemoryLayer::new("sha256:gz", encoder.finish().unwrap());
    let dest = TempDir::new().unwrap();

    extract(
        dest.path(),
        &[gz],
        &patterns(&["/licenses/*"]),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(fs::read(dest.path().join("licenses/a.txt")).unwrap(), b"gzipped");
}
