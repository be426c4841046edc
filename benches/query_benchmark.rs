use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use snapdex::core::error::Result;
use snapdex::search::retriever::{Candidate, Retrieved};
use snapdex::search::{MoreLikeThisRequest, SortField};
use snapdex::{Config, Database, DocOrd, Document, IndexSchema, QueryRequest, ResultRetriever};
use rand::Rng;

/// Helper to create test documents
fn create_test_document(id: usize) -> Document {
    let mut rng = rand::thread_rng();
    let words = ["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog"];
    let content: String = (0..50)
        .map(|_| words[rng.gen_range(0..words.len())])
        .collect::<Vec<_>>()
        .join(" ");

    Document::new(format!("docs/{}", id))
        .with_field("title", format!("Document {}", id))
        .with_field("content", content)
        .with_field("category", format!("category_{}", id % 10))
        .with_field("Score_Range", rng.gen_range(0.0..100.0))
}

fn populated(count: usize) -> Database {
    let db = Database::open(IndexSchema::new().add_exact_field("category"), Config::default()).unwrap();
    db.add_documents((0..count).map(create_test_document)).unwrap();
    // Build the reader outside the measured loops.
    db.search(&QueryRequest::new("*:*").with_page(0, 1)).unwrap();
    db
}

/// Vetoes every `n`th ordinal, forcing the window to widen.
struct EveryNth(u32);

impl ResultRetriever for EveryNth {
    type Output = DocOrd;

    fn retrieve(&self, candidate: Candidate<'_>) -> Result<Retrieved<DocOrd>> {
        if candidate.ord.0 % self.0 == 0 {
            Ok(Retrieved::Skip)
        } else {
            Ok(Retrieved::Include(candidate.ord))
        }
    }
}

/// Benchmark paging with and without vetoes
fn bench_paged_query(c: &mut Criterion) {
    let db = populated(10_000);
    let mut group = c.benchmark_group("paged_query");

    for veto_every in [u32::MAX, 10, 2] {
        group.bench_with_input(BenchmarkId::from_parameter(veto_every), &veto_every, |b, &n| {
            let retriever = EveryNth(n);
            let request = QueryRequest::new("content:fox").with_page(0, 100);
            b.iter(|| {
                let tx = db.begin_read();
                db.read(&tx, |op| Ok(op.query(&request, &retriever)?.count())).unwrap()
            });
        });
    }

    group.finish();
}

/// Benchmark sorted collection
fn bench_sorted_query(c: &mut Criterion) {
    let db = populated(10_000);
    let request = QueryRequest::new("content:quick")
        .with_page(0, 50)
        .with_sort(SortField::desc("Score_Range"));

    c.bench_function("sorted_query", |b| {
        b.iter(|| black_box(db.search(&request).unwrap()));
    });
}

/// Benchmark intersection widening
fn bench_intersect(c: &mut Criterion) {
    let db = populated(10_000);
    let request = QueryRequest::new("content:lazy INTERSECT category:category_7 INTERSECT Score_Range:[90 TO *]")
        .with_page(0, 25);

    c.bench_function("intersect_query", |b| {
        b.iter(|| black_box(db.intersect(&request).unwrap()));
    });
}

/// Benchmark more-like-this from a fixed seed
fn bench_more_like_this(c: &mut Criterion) {
    let db = populated(5_000);
    let request = MoreLikeThisRequest::for_document("docs/42").with_fields(["content", "title"]);

    c.bench_function("more_like_this", |b| {
        b.iter(|| black_box(db.more_like_this(&request).unwrap()));
    });
}

/// Benchmark reader construction after a commit
fn bench_snapshot_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_rebuild");
    group.sample_size(10);

    for size in [1_000, 10_000] {
        let db = populated(size);
        let mut next = size;
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                db.add_document(create_test_document(next)).unwrap();
                next += 1;
                let tx = db.begin_read();
                black_box(db.snapshot(&tx).unwrap().num_docs())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_paged_query,
    bench_sorted_query,
    bench_intersect,
    bench_more_like_this,
    bench_snapshot_rebuild
);
criterion_main!(benches);
