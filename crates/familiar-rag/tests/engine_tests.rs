use std::fs;
use std::path::Path;
use std::sync::Arc;

use familiar_core::chunker::ChunkingConfig;
use familiar_core::config::Settings;
use familiar_core::Error;
use familiar_embed::HashEmbedder;
use familiar_llm::mock::{EchoGenerator, FixedGenerator, UnavailableGenerator};
use familiar_rag::{QueryEngine, EMPTY_RESPONSE};
use familiar_vector::{IndexBuilder, VectorIndex};

fn sky_and_grass(dir: &Path) {
    fs::write(dir.join("doc1.txt"), "The sky is blue.").unwrap();
    fs::write(dir.join("doc2.txt"), "Grass is green.").unwrap();
}

fn settings_for(index_path: &Path, k: usize) -> Settings {
    Settings {
        index_path: index_path.to_string_lossy().to_string(),
        embed_model: "hash:384".into(),
        k,
        ..Settings::default()
    }
}

#[test]
fn answers_from_the_matching_document() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    sky_and_grass(src.path());
    let embedder = HashEmbedder::new(384);
    IndexBuilder::new(&embedder, ChunkingConfig::default()).build_and_persist(src.path(), out.path()).unwrap();

    let engine = QueryEngine::new(Arc::new(embedder), Arc::new(EchoGenerator::default()), settings_for(out.path(), 1));
    let answer = engine.answer_from_path("What color is the sky?").unwrap();

    assert!(answer.text.contains("The sky is blue."), "{}", answer.text);
    assert!(!answer.text.contains("Grass is green."));
    assert!(answer.text.contains("Query: What color is the sky?"));
    let doc1 = src.path().canonicalize().unwrap().join("doc1.txt").to_string_lossy().to_string();
    assert_eq!(answer.sources, vec![doc1]);
    assert_eq!(answer.chunk_ids, vec!["doc1.txt:0".to_string()]);
    assert_eq!((answer.retrieved, answer.included), (1, 1));
}

#[test]
fn sources_are_deduplicated_in_order() {
    let src = tempfile::tempdir().unwrap();
    let long = (0..1200).map(|i| format!("sky{i}")).collect::<Vec<_>>().join(" ");
    fs::write(src.path().join("long.md"), &long).unwrap();
    fs::write(src.path().join("other.md"), "Grass is green.").unwrap();
    let embedder = HashEmbedder::new(384);
    let (index, _) = IndexBuilder::new(&embedder, ChunkingConfig::default()).build(src.path()).unwrap();
    assert!(index.len() >= 3);

    let engine = QueryEngine::new(
        Arc::new(embedder),
        Arc::new(FixedGenerator::new("ok")),
        Settings { embed_model: "hash:384".into(), k: 10, max_context_tokens: 100_000, ..Settings::default() },
    );
    let answer = engine.answer("sky1 sky2 sky3", &index).unwrap();
    let mut deduped = answer.sources.clone();
    deduped.dedup();
    assert_eq!(answer.sources, deduped);
    assert_eq!(answer.sources.len(), 2);
    assert_eq!(answer.included, index.len());
}

#[test]
fn empty_index_answers_without_calling_the_model() {
    let generator = Arc::new(FixedGenerator::new("should not be used"));
    let engine = QueryEngine::new(
        Arc::new(HashEmbedder::new(384)),
        generator.clone(),
        Settings { embed_model: "hash:384".into(), ..Settings::default() },
    );
    let answer = engine.answer("anything?", &VectorIndex::new("hash:384", 384)).unwrap();
    assert_eq!(answer.text, EMPTY_RESPONSE);
    assert!(answer.sources.is_empty());
    assert!(generator.prompts().is_empty());
}

#[test]
fn mismatched_embedder_is_rejected() {
    let src = tempfile::tempdir().unwrap();
    sky_and_grass(src.path());
    let builder_embedder = HashEmbedder::new(64);
    let (index, _) = IndexBuilder::new(&builder_embedder, ChunkingConfig::default()).build(src.path()).unwrap();

    let engine = QueryEngine::new(
        Arc::new(HashEmbedder::new(32)),
        Arc::new(EchoGenerator::default()),
        Settings { embed_model: "hash:64".into(), ..Settings::default() },
    );
    let err = engine.answer("What color is the sky?", &index).unwrap_err();
    assert!(matches!(err, Error::ModelMismatch { .. }), "{err}");
}

#[test]
fn configured_model_must_match_the_index() {
    let src = tempfile::tempdir().unwrap();
    sky_and_grass(src.path());
    let embedder = HashEmbedder::new(64);
    let (index, _) = IndexBuilder::new(&embedder, ChunkingConfig::default()).build(src.path()).unwrap();

    let generator = Arc::new(FixedGenerator::new("ok"));
    let engine = QueryEngine::new(Arc::new(embedder), generator.clone(), Settings::default());
    match engine.answer("What color is the sky?", &index) {
        Err(Error::ModelMismatch { index_model, query_model }) => {
            assert_eq!(index_model, "hash:64");
            assert_eq!(query_model, Settings::default().embed_model);
        }
        other => panic!("expected ModelMismatch, got {other:?}"),
    }
    assert!(generator.prompts().is_empty());
}

#[test]
fn generation_failures_propagate() {
    let src = tempfile::tempdir().unwrap();
    sky_and_grass(src.path());
    let embedder = HashEmbedder::new(384);
    let (index, _) = IndexBuilder::new(&embedder, ChunkingConfig::default()).build(src.path()).unwrap();
    let engine = QueryEngine::new(
        Arc::new(embedder),
        Arc::new(UnavailableGenerator::new("gemma3:1b")),
        Settings { embed_model: "hash:384".into(), ..Settings::default() },
    );
    let err = engine.answer("sky", &index).unwrap_err();
    assert!(matches!(err, Error::ModelUnavailable { .. }), "{err}");
}

#[test]
fn blank_query_and_missing_index_fail_typed() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = QueryEngine::new(
        Arc::new(HashEmbedder::new(384)),
        Arc::new(EchoGenerator::default()),
        settings_for(&tmp.path().join("none"), 2),
    );
    assert!(matches!(engine.answer_from_path("   "), Err(Error::EmptyQuery)));
    assert!(matches!(engine.answer_from_path("sky?"), Err(Error::IndexNotFound(_))));
}
