//! Differential testing against batch recomputation
//!
//! The incremental path must be indistinguishable from rebuilding the whole
//! index from the current page set. We drive randomized mutation sequences
//! through the indexer while mirroring them in a plain in-memory page map,
//! then check that `scan_all` and `batch_index` over the mirror agree.

use linkdex::config::Config;
use linkdex::model::{Link, Mutation, Page};
use linkdex::oracle::{batch_index, compare, Comparison};
use linkdex::Indexer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Enables log output for failed runs via RUST_LOG.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const SOURCES: [&str; 6] = [
    "https://site0.example/",
    "https://site1.example/",
    "https://site2.example/",
    "https://site3.example/",
    "https://site4.example/",
    "https://site5.example/",
];

const TARGETS: [&str; 8] = [
    "https://alpha.com/a",
    "https://alpha.com/b",
    "https://alpha.com/c",
    "https://beta.com/x",
    "https://beta.com/y",
    "https://gamma.net/",
    "https://gamma.net/deep/page",
    "https://site0.example/",
];

const ANCHORS: [&str; 4] = ["click here", "read more", "", "details"];

fn random_page(rng: &mut StdRng) -> Page {
    let url = SOURCES[rng.gen_range(0..SOURCES.len())];
    let link_count = rng.gen_range(0..=4);
    let links = (0..link_count)
        .map(|_| {
            Link::new(
                TARGETS[rng.gen_range(0..TARGETS.len())],
                ANCHORS[rng.gen_range(0..ANCHORS.len())],
            )
            .unwrap()
        })
        .collect();
    Page::new(url, links).unwrap()
}

fn random_mutation(rng: &mut StdRng, model: &BTreeMap<String, Page>) -> Mutation {
    // Bias toward upserts so the index has something to delete
    if rng.gen_range(0..4) == 0 && !model.is_empty() {
        // Keys come out of the BTreeMap sorted, so which page gets deleted
        // depends only on the rng state
        let keys: Vec<&String> = model.keys().collect();
        let url = keys[rng.gen_range(0..keys.len())];
        Mutation::delete(url.as_str()).unwrap()
    } else {
        Mutation::upsert(random_page(rng))
    }
}

/// Mirrors one mutation in the reference page map.
fn apply_to_model(model: &mut BTreeMap<String, Page>, mutation: &Mutation) {
    match mutation {
        Mutation::Upsert(page) => {
            if page.is_empty() {
                model.remove(page.url());
            } else {
                model.insert(page.url().to_string(), page.clone());
            }
        }
        Mutation::Delete { url } => {
            model.remove(url);
        }
    }
}

fn assert_matches_batch(indexer: &Indexer, model: &BTreeMap<String, Page>, step: usize) {
    let scanned = indexer.scan_all().unwrap();
    let expected = batch_index(model.values()).unwrap();
    match compare(&scanned, &expected) {
        Comparison::Equal => {}
        Comparison::Mismatched(mismatches) => {
            panic!(
                "incremental state diverged from batch at step {step}: {:#?}",
                mismatches
            );
        }
    }
}

#[tokio::test]
async fn random_sequence_matches_batch_after_every_step() {
    init_tracing();
    let indexer = Indexer::open_in_memory(&Config::default()).unwrap();
    let mut model: BTreeMap<String, Page> = BTreeMap::new();
    let mut rng = StdRng::seed_from_u64(7);

    for step in 0..200 {
        let mutation = random_mutation(&mut rng, &model);
        // Deletes are only drawn from pages the model still holds, so every
        // mutation must succeed
        indexer
            .submit(mutation.clone())
            .await
            .unwrap_or_else(|e| panic!("unexpected error at step {step}: {e}"));
        apply_to_model(&mut model, &mutation);
        assert_matches_batch(&indexer, &model, step);
    }

    indexer.shutdown().await;
}

#[tokio::test]
async fn batched_random_sequence_settles_to_batch_state() {
    // Distinct source pages per step keep per-page ordering irrelevant, so
    // the final state is independent of worker interleaving
    init_tracing();
    let indexer = Indexer::open_in_memory(&Config::default()).unwrap();
    let mut model: BTreeMap<String, Page> = BTreeMap::new();
    let mut rng = StdRng::seed_from_u64(42);

    let mut handles = Vec::new();
    for i in 0..50 {
        let url = format!("https://page{i}.example/");
        let link_count = rng.gen_range(0..=3);
        let links: Vec<Link> = (0..link_count)
            .map(|_| {
                Link::new(
                    TARGETS[rng.gen_range(0..TARGETS.len())],
                    ANCHORS[rng.gen_range(0..ANCHORS.len())],
                )
                .unwrap()
            })
            .collect();
        let page = Page::new(&url, links).unwrap();
        let mutation = Mutation::upsert(page);
        apply_to_model(&mut model, &mutation);
        handles.push(indexer.enqueue(mutation).unwrap());
    }

    indexer.wait_until_settled().await;
    for handle in handles {
        handle.outcome().await.unwrap();
    }
    assert_matches_batch(&indexer, &model, 0);

    indexer.shutdown().await;
}

#[tokio::test]
async fn repeated_full_sequence_is_deterministic() {
    // Same seed twice, entry for entry
    let mut scans = Vec::new();
    for _ in 0..2 {
        let indexer = Indexer::open_in_memory(&Config::default()).unwrap();
        let mut model: BTreeMap<String, Page> = BTreeMap::new();
        let mut rng = StdRng::seed_from_u64(1234);

        for _ in 0..80 {
            let mutation = random_mutation(&mut rng, &model);
            if indexer.submit(mutation.clone()).await.is_ok() {
                apply_to_model(&mut model, &mutation);
            }
        }
        scans.push(indexer.scan_all().unwrap());
        indexer.shutdown().await;
    }
    assert_eq!(scans[0], scans[1]);
}
