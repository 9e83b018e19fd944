mod support;

use std::path::Path;

use panim::{DylibLoader, FrameBuffer, LoadError, PanimError, PluginHost, StateLayout, Tick};
use support::fixtures::{dylib_filename, fixture_artifacts};

fn tick() -> Tick {
    Tick {
        dt: 0.5,
        width: 4,
        height: 4,
        offline: false,
    }
}

fn u64_at(host: &PluginHost<DylibLoader>, offset: usize) -> u64 {
    let bytes: [u8; 8] = host.state().as_bytes()[offset..offset + 8]
        .try_into()
        .unwrap();
    u64::from_ne_bytes(bytes)
}

/// Install `artifact` at `dest`, replacing whatever is there.
fn install(artifact: &Path, dest: &Path) {
    std::fs::copy(artifact, dest).expect("install fixture library");
}

#[test]
fn hot_reload_grows_state_and_keeps_values() {
    let fixtures = fixture_artifacts();
    let temp = tempfile::tempdir().unwrap();
    let shadow_dir = temp.path().join("shadow");
    let plugin = temp.path().join(dylib_filename("anim"));
    install(&fixtures.v1, &plugin);

    let mut host = PluginHost::load(DylibLoader::new(&shadow_dir), &plugin).unwrap();
    assert_eq!(host.layout(), StateLayout::new(40, 1));
    assert_eq!(host.state().len(), 40);

    let mut frame = FrameBuffer::new(0, 0);
    for _ in 0..3 {
        host.update(tick(), &mut frame).unwrap();
    }
    assert_eq!(u64_at(&host, 16), 3);
    assert_eq!(u64_at(&host, 24), 1_500_000);
    assert_eq!(&frame.as_bytes()[..4], &[0x11, 0x22, 0x33, 0xff]);
    assert!(!host.finished().unwrap());

    // Rebuilt library lands on the same path.
    install(&fixtures.v2, &plugin);
    let report = host.reload_in_place().unwrap();
    assert_eq!((report.migration.from_len, report.migration.to_len), (40, 64));
    assert_eq!(host.state().len(), 64);
    assert_eq!(host.state().schema_version(), 2);
    assert_eq!(u64_at(&host, 16), 3);
    assert_eq!(u64_at(&host, 24), 1_500_000);
    // Appended fields: post_reload count, schema seen by post_reload, magic.
    assert_eq!(u64_at(&host, 40), 1);
    assert_eq!(u64_at(&host, 48), 1);
    assert_eq!(u64_at(&host, 56), 0x00c0_ffee);

    host.update(tick(), &mut frame).unwrap();
    assert_eq!(u64_at(&host, 16), 4);
    assert_eq!(&frame.as_bytes()[..4], &[0x44, 0x55, 0x66, 0xff]);

    // Same build again: nothing grows, post_reload sees schema 2.
    let report = host.reload_in_place().unwrap();
    assert!(!report.migration.grew());
    assert_eq!(u64_at(&host, 40), 2);
    assert_eq!(u64_at(&host, 48), 2);

    host.reset().unwrap();
    assert_eq!(u64_at(&host, 16), 0);
    assert_eq!(u64_at(&host, 32), 1);
    assert_eq!(u64_at(&host, 56), 0x00c0_ffee);

    drop(host);
    assert_eq!(std::fs::read_dir(&shadow_dir).unwrap().count(), 0);
}

#[test]
fn missing_symbol_keeps_previous_module() {
    let fixtures = fixture_artifacts();
    let temp = tempfile::tempdir().unwrap();
    let plugin = temp.path().join(dylib_filename("anim"));
    install(&fixtures.v1, &plugin);

    let mut host =
        PluginHost::load(DylibLoader::new(temp.path().join("shadow")), &plugin).unwrap();
    let mut frame = FrameBuffer::new(0, 0);
    host.update(tick(), &mut frame).unwrap();
    let before = host.state().as_bytes().to_vec();

    install(&fixtures.broken, &plugin);
    let err = host.reload_in_place().unwrap_err();
    assert!(
        matches!(
            err,
            PanimError::Load(LoadError::MissingSymbol {
                symbol: "panim_finished",
                ..
            })
        ),
        "{err}"
    );
    assert_eq!(host.state().as_bytes(), before.as_slice());

    host.update(tick(), &mut frame).unwrap();
    assert_eq!(u64_at(&host, 16), 2);
    assert_eq!(&frame.as_bytes()[..4], &[0x11, 0x22, 0x33, 0xff]);
}

#[test]
fn missing_symbol_fails_initial_load() {
    let fixtures = fixture_artifacts();
    let temp = tempfile::tempdir().unwrap();
    let err = PluginHost::load(DylibLoader::new(temp.path().join("shadow")), &fixtures.broken)
        .err()
        .expect("broken module must not load");
    assert!(matches!(err, LoadError::MissingSymbol { .. }), "{err}");
}
