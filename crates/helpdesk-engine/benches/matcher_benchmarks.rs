//! Benchmarks for FAQ matching and full turn evaluation.
//!
//! The matcher is a linear scan, so cost grows with the knowledge base. The
//! default run uses 500 entries; set `BENCH_FULL_SCALE=1` to use 10,000:
//!
//! ```bash
//! BENCH_FULL_SCALE=1 cargo bench -p helpdesk-engine
//! ```

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use helpdesk_core::types::{FaqEntry, HistoryTurn};
use helpdesk_engine::{DecisionEngine, FaqMatcher};

const CI_FAQ_COUNT: usize = 500;
const FULL_SCALE_FAQ_COUNT: usize = 10_000;

const TOPICS: [&str; 6] = ["shipping", "refund", "password", "invoice", "warranty", "account"];

fn faq_count() -> usize {
    if std::env::var("BENCH_FULL_SCALE").is_ok() {
        FULL_SCALE_FAQ_COUNT
    } else {
        CI_FAQ_COUNT
    }
}

fn generate_faqs(count: usize) -> Vec<FaqEntry> {
    (0..count)
        .map(|i| {
            let topic = TOPICS[i % TOPICS.len()];
            FaqEntry::new(
                format!("How does {} work for plan {}?", topic, i),
                format!(
                    "Our {} process for plan {} takes a few business days. \
                     Contact support if you need anything else.",
                    topic, i
                ),
                topic,
                vec![topic.to_string(), format!("plan {}", i)],
            )
        })
        .collect()
}

fn bench_find_best(c: &mut Criterion) {
    let count = faq_count();
    let faqs = generate_faqs(count);
    let matcher = FaqMatcher::default();

    let mut group = c.benchmark_group("find_best");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function(format!("short_query_{}faqs", count), |b| {
        b.iter(|| {
            let result = matcher.find_best(black_box("refund for plan 42"), &faqs);
            assert!(result.is_match());
            result.score
        });
    });

    let long_query = "I ordered something last week and the shipping has not arrived, \
                      can I get a refund or should I wait for the warranty team to reply";
    group.bench_function(format!("long_query_{}faqs", count), |b| {
        b.iter(|| matcher.find_best(black_box(long_query), &faqs).score);
    });

    group.finish();
}

fn bench_evaluate_turn(c: &mut Criterion) {
    let count = faq_count();
    let faqs = generate_faqs(count);
    let engine = DecisionEngine::default();
    let history = vec![
        HistoryTurn::user("how do I reset my password"),
        HistoryTurn::assistant("Use the reset link on the sign-in page."),
        HistoryTurn::user("thanks, and invoices?"),
        HistoryTurn::assistant("Invoices are emailed monthly."),
    ];

    c.bench_function(format!("evaluate_turn_{}faqs", count).as_str(), |b| {
        b.iter(|| {
            engine
                .evaluate(black_box("where is my invoice for plan 7"), &faqs, &history)
                .confidence
        });
    });
}

criterion_group!(benches, bench_find_best, bench_evaluate_turn);
criterion_main!(benches);
