use snapdex::core::error::{ErrorKind, Result};
use snapdex::search::retriever::{Candidate, Retrieved};
use snapdex::search::sort::SortField;
use snapdex::{Config, Database, DocOrd, Document, IndexSchema, QueryRequest, ResultRetriever};

struct OrdRetriever;

impl ResultRetriever for OrdRetriever {
    type Output = u32;

    fn retrieve(&self, candidate: Candidate<'_>) -> Result<Retrieved<u32>> {
        Ok(Retrieved::Include(candidate.ord.0))
    }
}

/// Entry `i` sits at ordinal `i`; `A` covers 1..=500, `B` covers 400..=600.
fn overlapping(config: Config) -> Result<Database> {
    let schema = IndexSchema::new().add_exact_field("A").add_exact_field("B");
    let db = Database::open(schema, config)?;
    db.add_documents((0..700u32).map(|i| {
        let mut doc = Document::new(format!("entries/{}", i)).with_field("Num_Range", i as i64);
        if (1..=500).contains(&i) {
            doc = doc.with_field("A", "yes");
        }
        if (400..=600).contains(&i) {
            doc = doc.with_field("B", "yes");
        }
        doc
    }))?;
    Ok(db)
}

#[test]
fn test_intersection_fills_page_from_overlap() -> Result<()> {
    let db = overlapping(Config::default())?;
    let tx = db.begin_read();

    db.read(&tx, |op| {
        let request = QueryRequest::new("A:yes INTERSECT B:yes").with_page(0, 50);
        let mut results = op.intersect_query(&request, &OrdRetriever)?;
        let page = results.by_ref().collect::<Result<Vec<_>>>()?;

        assert_eq!(page.len(), 50);
        assert!(page.iter().all(|ord| (400..=500).contains(ord)));
        assert_eq!(page, (400..450).collect::<Vec<_>>());
        // First clause's match count, not the exact overlap.
        assert_eq!(results.total_results(), 500);
        assert_eq!(results.skipped_results(), 0);
        Ok(())
    })
}

#[test]
fn test_intersection_pages_and_tail() -> Result<()> {
    let db = overlapping(Config::default())?;
    let tx = db.begin_read();

    db.read(&tx, |op| {
        let second = QueryRequest::new("A:yes INTERSECT B:yes").with_page(50, 50);
        let page = op.intersect_query(&second, &OrdRetriever)?.collect::<Result<Vec<_>>>()?;
        assert_eq!(page, (450..500).collect::<Vec<_>>());

        let tail = QueryRequest::new("A:yes INTERSECT B:yes").with_page(100, 50);
        let page = op.intersect_query(&tail, &OrdRetriever)?.collect::<Result<Vec<_>>>()?;
        assert_eq!(page, vec![500]);
        Ok(())
    })
}

#[test]
fn test_intersection_follows_sort_of_first_clause() -> Result<()> {
    let db = overlapping(Config::default())?;
    let tx = db.begin_read();

    db.read(&tx, |op| {
        let request = QueryRequest::new("A:yes INTERSECT B:yes")
            .with_page(0, 10)
            .with_sort(SortField::desc("Num_Range"));
        let page = op.intersect_query(&request, &OrdRetriever)?.collect::<Result<Vec<_>>>()?;
        assert_eq!(page, (491..=500).rev().collect::<Vec<_>>());
        Ok(())
    })
}

#[test]
fn test_three_clauses_and_disjoint_clauses() -> Result<()> {
    let db = overlapping(Config::default())?;
    let tx = db.begin_read();

    db.read(&tx, |op| {
        let narrowed = QueryRequest::new("A:yes INTERSECT B:yes INTERSECT Num_Range:[450 TO 455]");
        let page = op.intersect_query(&narrowed, &OrdRetriever)?.collect::<Result<Vec<_>>>()?;
        assert_eq!(page, (450..=455).collect::<Vec<_>>());

        // Terminates once the first clause is exhausted.
        let disjoint = QueryRequest::new("A:yes INTERSECT Num_Range:[650 TO 700]").with_page(0, 20);
        let page = op.intersect_query(&disjoint, &OrdRetriever)?.collect::<Result<Vec<_>>>()?;
        assert!(page.is_empty());
        Ok(())
    })
}

#[test]
fn test_widening_cap_bounds_rounds() -> Result<()> {
    let db = overlapping(Config {
        max_intersect_widenings: 0,
        ..Config::default()
    })?;
    let tx = db.begin_read();

    db.read(&tx, |op| {
        let request = QueryRequest::new("A:yes INTERSECT B:yes").with_page(0, 10);
        let page = op.intersect_query(&request, &OrdRetriever)?.collect::<Result<Vec<_>>>()?;
        // A single round sees ordinals 1..=20 only.
        assert!(page.is_empty());
        Ok(())
    })
}

#[test]
fn test_malformed_intersection_is_rejected() -> Result<()> {
    let db = overlapping(Config::default())?;
    let tx = db.begin_read();

    db.read(&tx, |op| {
        for text in ["A:yes", "A:yes INTERSECT ", " INTERSECT B:yes", "A:yes INTERSECT   INTERSECT "] {
            let request = QueryRequest::new(text);
            let err = op.intersect_query(&request, &OrdRetriever).err().unwrap();
            assert!(err.is(ErrorKind::InvalidIntersectQuery), "accepted '{}'", text);
        }
        Ok(())
    })
}

#[test]
fn test_intersection_through_database() -> Result<()> {
    let db = overlapping(Config::default())?;
    let outcome = db.intersect(&QueryRequest::new("A:yes INTERSECT B:yes").with_page(0, 5))?;

    let keys: Vec<&str> = outcome.hits.iter().map(|hit| hit.key.as_str()).collect();
    assert_eq!(keys, vec!["entries/400", "entries/401", "entries/402", "entries/403", "entries/404"]);
    assert_eq!(outcome.hits[0].ord, DocOrd(400));
    Ok(())
}
