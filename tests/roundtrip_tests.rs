//! Round-trip tests through the stores: bytes -> words -> store -> bytes.

use layervault::codec::{self, ContentKind, Encoding, WORD_WIDTH};
use layervault::prelude::*;
use layervault::store::JournalOptions;

use proptest::prelude::*;
use tempfile::tempdir;

/// Push a buffer through the full write protocol of `store`.
fn store_bytes<S: AssetStore>(store: &S, id: u64, bytes: &[u8], kind: ContentKind, per_write: usize) {
    let chunked = codec::chunk(bytes, store.word_width(), kind.is_compressible()).unwrap();
    let slices = chunked.write_slices(per_write);
    store
        .create_asset(id, Nonce::new(), slices[0], chunked.total_length)
        .expect("create");
    for slice in &slices[1..] {
        store.append_asset_content(id, Nonce::new(), slice).expect("append");
    }
    let tag = ContentTag { kind, encoding: chunked.encoding };
    store
        .finalize(id, Nonce::new(), chunked.words.len() as u64, tag)
        .expect("finalize");
}

#[test]
fn test_edge_lengths_through_memory_store() {
    let store = MemoryStore::new();
    for (i, len) in [0usize, 1, 31, 32, 33, 64, 1000, 8192, 8193].into_iter().enumerate() {
        let data: Vec<u8> = (0..len).map(|b| (b % 251) as u8).collect();
        store_bytes(&store, i as u64, &data, ContentKind::RasterImage, 1);
        assert_eq!(store.read_content(i as u64).unwrap().bytes, data, "len {}", len);
    }
}

#[test]
fn test_compressed_and_raw_in_one_journal() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mixed.lvj");
    let svg = br##"<svg viewBox="0 0 10 10"><rect fill="#ff0" width="10" height="10"/></svg>"##.repeat(30);
    let font: Vec<u8> = (0..3000u32).map(|i| (i * 31 % 256) as u8).collect();
    let font_id = AUXILIARY_ID_BASE + 1;

    {
        let store = JournalStore::open(&path).unwrap();
        store_bytes(&store, 0x200, &svg, ContentKind::VectorImage, 256);
        store_bytes(&store, font_id, &font, ContentKind::Font, 4);
    }

    let store = JournalStore::open(&path).unwrap();
    let svg_back = store.read_content(0x200).unwrap();
    assert_eq!(svg_back.kind, ContentKind::VectorImage);
    assert_eq!(svg_back.bytes, svg);
    assert!(svg_back.data_uri().starts_with("data:image/svg+xml;base64,"));

    let record = store.read_asset(0x200).unwrap();
    assert!(record.total_length < svg.len() as u64);
    assert_eq!(
        record.tag().unwrap().encoding,
        Encoding::Deflate { inflated_length: Some(svg.len() as u64) }
    );

    assert_eq!(store.read_content(font_id).unwrap().bytes, font);
}

#[test]
fn test_custom_word_width_journal() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("narrow.lvj");
    let options = JournalOptions { word_width: 5, ..Default::default() };
    let data = b"odd sized words still round trip".to_vec();

    {
        let store = JournalStore::open_with(&path, options).unwrap();
        store_bytes(&store, 77, &data, ContentKind::Binary, 3);
    }
    let store = JournalStore::open_with(&path, options).unwrap();
    assert_eq!(store.word_width(), 5);
    assert_eq!(store.read_content(77).unwrap().bytes, data);
}

#[test]
fn test_interrupted_after_create() {
    // create landed, no appends: the reader sees only the first word's share
    let store = MemoryStore::new();
    let data: Vec<u8> = (0..100).map(|i| i as u8 + 1).collect();
    let chunked = codec::chunk(&data, WORD_WIDTH, false).unwrap();

    store
        .create_asset(5, Nonce::new(), &chunked.words[..1], chunked.total_length)
        .unwrap();

    let record = store.read_asset(5).unwrap();
    assert_eq!(record.status, AssetStatus::Open);
    assert_eq!(record.total_length, 100);
    assert_eq!(record.available_content(), data[..WORD_WIDTH].to_vec());
    assert_ne!(record.available_content(), data);
    assert!(matches!(store.read_content(5), Err(Error::NotReady(5))));

    // Strict reconstruction of the same words reports the truncation.
    assert!(matches!(
        codec::reconstruct(record.total_length, &record.words, WORD_WIDTH, Encoding::Raw),
        Err(Error::TruncatedAsset { needed: 4, available: 1, .. })
    ));
}

#[test]
fn test_duplicate_append_is_detected_at_finalize() {
    let store = MemoryStore::new();
    let data = vec![3u8; 64];
    let chunked = codec::chunk(&data, WORD_WIDTH, false).unwrap();

    store.create_asset(1, Nonce::new(), &chunked.words[..1], 64).unwrap();
    store.append_asset_content(1, Nonce::new(), &chunked.words[1..]).unwrap();
    // A blind retry of an append that already landed
    store.append_asset_content(1, Nonce::new(), &chunked.words[1..]).unwrap();

    let tag = ContentTag { kind: ContentKind::Binary, encoding: Encoding::Raw };
    assert!(matches!(
        store.finalize(1, Nonce::new(), 2, tag),
        Err(Error::ChunkCountMismatch { id: 1, expected: 2, actual: 3 })
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_store_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..2000),
                            per_write in 1usize..20,
                            compress in any::<bool>()) {
        let store = MemoryStore::new();
        let kind = if compress { ContentKind::VectorImage } else { ContentKind::Audio };
        store_bytes(&store, 1, &data, kind, per_write);
        prop_assert_eq!(store.read_content(1).unwrap().bytes, data);
    }
}
