use mmrag_store::mock::MockEmbedder;
use mmrag_store::{
    add_text, Chunker, ChunkerConfig, CollectionStore, Embedder, HybridRetriever, MetadataFilter,
    SearchMethod, StoreError, VectorIndex,
};
use std::sync::Arc;

fn chunker() -> Chunker {
    Chunker::with_config(ChunkerConfig::characters(120, 30)).unwrap()
}

fn transcript(topic: &str, lines: usize) -> String {
    (0..lines)
        .map(|i| format!("Line {} of the {} transcript covers detail {}.", i, topic, i * 7))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_chunks_cover_text_without_gaps() {
    let _ = tracing_subscriber::fmt::try_init();

    let text = transcript("keynote", 30);
    let chunks = chunker().chunk(&text);
    assert!(chunks.len() > 1);

    let chars: Vec<char> = text.chars().collect();
    let mut covered = 0;
    for chunk in &chunks {
        assert!(chunk.start_char <= covered, "gap before chunk {}", chunk.seq);
        assert!(chunk.end_char - chunk.start_char <= 120);
        let expected: String = chars[chunk.start_char..chunk.end_char].iter().collect();
        assert_eq!(chunk.text, expected);
        covered = covered.max(chunk.end_char);
    }
    assert_eq!(covered, chars.len());
}

#[test]
fn test_add_text_is_idempotent_per_source() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(MockEmbedder::new(64));
    let mut store = CollectionStore::open("chat_audio_context", dir.path(), embedder);
    let chunker = chunker();
    let text = transcript("podcast", 12);

    let first = add_text(&mut store, &chunker, &text, Some("episode1.mp3")).unwrap();
    assert!(!first.already_exists());
    assert_eq!(store.count(), first.chunks_created());

    let second = add_text(&mut store, &chunker, &text, Some("episode1.mp3")).unwrap();
    assert!(second.already_exists());
    assert_eq!(second.chunks_created(), 0);
    assert_eq!(store.count(), first.chunks_created());
}

#[test]
fn test_count_grows_by_chunks_in_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(MockEmbedder::new(64));
    let mut store = CollectionStore::open("chat_video_context", dir.path(), embedder);
    let chunker = chunker();

    add_text(&mut store, &chunker, &transcript("intro", 5), Some("intro.mp4")).unwrap();
    let before = store.count();

    let text = transcript("demo", 10);
    let expected: Vec<String> = chunker.chunk(&text).into_iter().map(|c| c.text).collect();
    let outcome = add_text(&mut store, &chunker, &text, Some("demo.mp4")).unwrap();

    assert_eq!(outcome.chunks_created(), expected.len());
    assert_eq!(store.count(), before + expected.len());

    let appended: Vec<String> = store.entries()[before..]
        .iter()
        .map(|e| e.document.clone())
        .collect();
    assert_eq!(appended, expected);
}

#[test]
fn test_retrieve_on_fresh_collection() {
    let dir = tempfile::tempdir().unwrap();
    let store = CollectionStore::open(
        "chat_image_context",
        dir.path(),
        Arc::new(MockEmbedder::new(16)),
    );

    let retrieval = HybridRetriever::new().retrieve(&store, "what is in the picture", 5, None);
    assert_eq!(retrieval.context, "");
    assert_eq!(retrieval.method, SearchMethod::None);
    assert_eq!(retrieval.method.as_str(), "none");
}

#[test]
fn test_retrieved_distances_are_non_decreasing() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(MockEmbedder::new(128));
    let mut store = CollectionStore::open("chat_pdf_context", dir.path(), embedder);
    let chunker = chunker();

    add_text(&mut store, &chunker, &transcript("finance", 20), Some("a.pdf")).unwrap();
    add_text(&mut store, &chunker, &transcript("weather", 20), Some("b.pdf")).unwrap();

    let retrieval = HybridRetriever::new().retrieve(&store, "finance detail", 6, None);
    assert_eq!(retrieval.method, SearchMethod::Semantic);
    assert_eq!(retrieval.hits.len(), 6);
    for pair in retrieval.hits.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

#[test]
fn test_reload_returns_identical_entries() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(MockEmbedder::new(64));

    let before = {
        let mut store = CollectionStore::open("chat_pdf_context", dir.path(), embedder.clone());
        let chunker = chunker();
        add_text(&mut store, &chunker, &transcript("contract", 8), Some("c.pdf")).unwrap();
        add_text(&mut store, &chunker, "untagged note", None).unwrap();
        store.get(&MetadataFilter::all())
    };

    let reloaded = CollectionStore::open("chat_pdf_context", dir.path(), embedder);
    assert_eq!(reloaded.count(), before.len());
    assert_eq!(reloaded.get(&MetadataFilter::all()), before);
    assert!(reloaded.exists_for_source("c.pdf"));
}

#[test]
fn test_self_query_has_zero_distance() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(MockEmbedder::new(32));
    let mut store = CollectionStore::open("chat_video_context", dir.path(), embedder.clone());

    add_text(&mut store, &chunker(), "a single short scene", Some("s.mp4")).unwrap();

    let vector = embedder.embed("a single short scene").unwrap();
    let result = store.query_vector(&vector, 1).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.hits[0].document, "a single short scene");
    assert!(result.hits[0].distance.abs() < 1e-6);
}

#[test]
fn test_corrupt_index_file_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken_index.bin");
    std::fs::write(&path, [0u8, 1, 2]).unwrap();

    assert!(matches!(
        VectorIndex::load(&path),
        Err(StoreError::IndexLoad { .. })
    ));
    assert!(matches!(
        VectorIndex::load(dir.path().join("absent.bin")),
        Err(StoreError::IndexLoad { .. })
    ));
}

#[test]
fn test_deleted_files_start_empty() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(MockEmbedder::new(32));
    {
        let mut store = CollectionStore::open("chat_audio_context", dir.path(), embedder.clone());
        add_text(&mut store, &chunker(), "meeting notes", Some("m.wav")).unwrap();
        std::fs::remove_file(store.index_path()).unwrap();
        std::fs::remove_file(store.metadata_path()).unwrap();
    }

    let mut store = CollectionStore::open("chat_audio_context", dir.path(), embedder);
    assert_eq!(store.count(), 0);

    // Re-upload is stored again
    let outcome = add_text(&mut store, &chunker(), "meeting notes", Some("m.wav")).unwrap();
    assert_eq!(outcome.chunks_created(), 1);
}
