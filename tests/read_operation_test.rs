use tokio_util::sync::CancellationToken;

use snapdex::core::error::{ErrorKind, Result};
use snapdex::reader::FieldSet;
use snapdex::schema::schema::FieldIndexing;
use snapdex::search::retriever::{Candidate, Retrieved};
use snapdex::search::sort::{SortField, SortKind};
use snapdex::{Config, Database, DocOrd, Document, DocumentRetriever, IndexSchema, QueryRequest, ResultRetriever};

/// Vetoes candidates by ordinal and returns `(ord, key)` pairs.
struct VetoRetriever<F> {
    veto: F,
}

impl<F: Fn(DocOrd) -> bool> ResultRetriever for VetoRetriever<F> {
    type Output = (DocOrd, String);

    fn retrieve(&self, candidate: Candidate<'_>) -> Result<Retrieved<(DocOrd, String)>> {
        if (self.veto)(candidate.ord) {
            return Ok(Retrieved::Skip);
        }
        Ok(Retrieved::Include((candidate.ord, candidate.document.id.clone())))
    }
}

fn accept_all() -> VetoRetriever<fn(DocOrd) -> bool> {
    VetoRetriever { veto: |_| false }
}

fn database_with(count: usize, config: Config) -> Result<Database> {
    let schema = IndexSchema::new()
        .add_exact_field("Color")
        .add_field("Secret", FieldIndexing::Analyzed, false);
    let db = Database::open(schema, config)?;
    let colors = ["red", "green", "blue"];
    db.add_documents((0..count).map(|i| {
        Document::new(format!("items/{}", i))
            .with_field("Tag", "alpha")
            .with_field("Name", format!("item{}", i))
            .with_field("Color", colors[i % colors.len()])
            .with_field("Num_Range", i as i64)
            .with_field("Secret", "hidden")
    }))?;
    Ok(db)
}

#[test]
fn test_unfiltered_page_is_exact() -> Result<()> {
    let db = database_with(10_000, Config::default())?;
    let tx = db.begin_read();
    let request = QueryRequest::new("Tag:alpha").with_page(0, 10);

    db.read(&tx, |op| {
        let retriever = accept_all();
        let mut results = op.query(&request, &retriever)?;
        let page = results.by_ref().collect::<Result<Vec<_>>>()?;

        assert_eq!(page.len(), 10);
        assert_eq!(results.total_results(), 10_000);
        assert_eq!(results.skipped_results(), 0);
        Ok(())
    })
}

#[test]
fn test_vetoed_candidates_are_replaced() -> Result<()> {
    let db = database_with(10_000, Config::default())?;
    let tx = db.begin_read();
    let request = QueryRequest::new("Tag:alpha").with_page(0, 10);

    db.read(&tx, |op| {
        let retriever = VetoRetriever { veto: |ord: DocOrd| ord.0 % 2 == 1 };
        let mut results = op.query(&request, &retriever)?;
        let page = results.by_ref().collect::<Result<Vec<_>>>()?;

        assert_eq!(page.len(), 10);
        assert!(results.skipped_results() >= 10);
        assert_eq!(results.total_results(), 10_000);
        for (ord, key) in &page {
            assert_eq!(ord.0 % 2, 0);
            assert_eq!(key, &format!("items/{}", ord.0));
        }
        Ok(())
    })
}

#[test]
fn test_every_third_vetoed_returns_min_of_page_and_eligible() -> Result<()> {
    let every_third = |ord: DocOrd| ord.0 % 3 == 2;

    let db = database_with(1_000, Config::default())?;
    let tx = db.begin_read();
    db.read(&tx, |op| {
        let retriever = VetoRetriever { veto: every_third };
        for (start, page_size) in [(0, 100), (10, 37), (0, 1)] {
            let request = QueryRequest::new("Tag:alpha").with_page(start, page_size);
            let page = op.query(&request, &retriever)?.collect::<Result<Vec<_>>>()?;
            assert_eq!(page.len(), page_size);
            assert!(page.iter().all(|(ord, _)| !every_third(*ord)));
        }

        // Sorted path widens the same way.
        let request = QueryRequest::new("Tag:alpha")
            .with_page(0, 50)
            .with_sort(SortField::desc("Num_Range"));
        let page = op.query(&request, &retriever)?.collect::<Result<Vec<_>>>()?;
        assert_eq!(page.len(), 50);
        assert_eq!(page[0].0, DocOrd(999));
        Ok(())
    })?;

    let small = database_with(10, Config::default())?;
    let tx = small.begin_read();
    small.read(&tx, |op| {
        let retriever = VetoRetriever { veto: every_third };
        let request = QueryRequest::new("Tag:alpha").with_page(0, 20);
        let page = op.query(&request, &retriever)?.collect::<Result<Vec<_>>>()?;
        assert_eq!(page.len(), 7);
        Ok(())
    })
}

#[test]
fn test_fanned_out_entries_surface_once() -> Result<()> {
    let db = Database::open(IndexSchema::new(), Config::default().with_max_outputs_per_document(3))?;
    db.add_documents((1..=3).flat_map(|order| {
        ["a", "b", "c"].into_iter().map(move |line| {
            Document::new(format!("orders/{}", order)).with_field("Line", line)
        })
    }))?;

    let request = QueryRequest::new("*:*").with_page(0, 2);
    let outcome = db.search(&request)?;

    let keys: Vec<&str> = outcome.hits.iter().map(|hit| hit.key.as_str()).collect();
    assert_eq!(keys, vec!["orders/1", "orders/2"]);
    assert_eq!(outcome.skipped_results, 2);
    assert_eq!(outcome.total_results, 9);
    Ok(())
}

#[test]
fn test_vetoed_entry_before_start_leaves_key_free() -> Result<()> {
    let db = Database::open(IndexSchema::new(), Config::default().with_max_outputs_per_document(2))?;
    db.add_documents([
        Document::new("orders/1").with_field("Line", "a"),
        Document::new("orders/1").with_field("Line", "b"),
        Document::new("orders/2").with_field("Line", "c"),
    ])?;
    let tx = db.begin_read();

    db.read(&tx, |op| {
        let retriever = VetoRetriever { veto: |ord: DocOrd| ord.0 == 0 };
        let request = QueryRequest::new("*:*").with_page(1, 2);
        let page = op.query(&request, &retriever)?.collect::<Result<Vec<_>>>()?;
        let keys: Vec<&str> = page.iter().map(|(_, key)| key.as_str()).collect();
        assert_eq!(keys, vec!["orders/1", "orders/2"]);

        // An accepted entry before `start` still hides its key.
        let request = QueryRequest::new("*:*").with_page(1, 2);
        let page = op.query(&request, &accept_all())?.collect::<Result<Vec<_>>>()?;
        let keys: Vec<&str> = page.iter().map(|(_, key)| key.as_str()).collect();
        assert_eq!(keys, vec!["orders/2"]);
        Ok(())
    })
}

#[test]
fn test_sorting() -> Result<()> {
    let db = database_with(12, Config::default())?;
    let tx = db.begin_read();

    db.read(&tx, |op| {
        let retriever = accept_all();
        let keys = |request: &QueryRequest| -> Result<Vec<String>> {
            Ok(op
                .query(request, &retriever)?
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .map(|(_, key)| key)
                .collect())
        };

        let by_name = QueryRequest::new("Tag:alpha").with_page(0, 4).with_sort(SortField::asc("Name"));
        assert_eq!(keys(&by_name)?, vec!["items/0", "items/1", "items/10", "items/11"]);

        let natural = QueryRequest::new("Tag:alpha")
            .with_page(0, 4)
            .with_sort(SortField::asc("__alphaNumeric;Name"));
        assert_eq!(keys(&natural)?, vec!["items/0", "items/1", "items/2", "items/3"]);

        let numeric = QueryRequest::new("Tag:alpha")
            .with_page(0, 3)
            .with_sort(SortField::desc("Num_Range"));
        assert_eq!(keys(&numeric)?, vec!["items/11", "items/10", "items/9"]);

        let seeded = QueryRequest::new("Tag:alpha").with_page(0, 12).with_sort(SortField::asc("__random;7"));
        let first = keys(&seeded)?;
        assert_eq!(first, keys(&seeded)?);
        assert_eq!(first.len(), 12);

        for unseeded in ["__random", "__random;"] {
            let request = QueryRequest::new("Tag:alpha").with_page(0, 12).with_sort(SortField::asc(unseeded));
            let mut shuffled = keys(&request)?;
            shuffled.sort();
            shuffled.dedup();
            assert_eq!(shuffled.len(), 12);
        }

        let invalid = QueryRequest::new("Tag:alpha").with_sort(SortField::asc("Name").with_kind(SortKind::Numeric));
        let err = op.query(&invalid, &retriever).err().unwrap();
        assert!(err.is(ErrorKind::InvalidSort));
        Ok(())
    })
}

#[test]
fn test_boosted_query_ranks_by_score() -> Result<()> {
    let db = Database::open(IndexSchema::new(), Config::default())?;
    db.add_documents([
        Document::new("posts/1").with_field("Body", "rust"),
        Document::new("posts/2").with_field("Body", "go"),
        Document::new("posts/3").with_field("Body", "rust rust rust"),
    ])?;

    let request = QueryRequest::new("Body:go OR Body:rust^4").with_page(0, 3);
    let outcome = db.search(&request)?;
    let keys: Vec<&str> = outcome.hits.iter().map(|hit| hit.key.as_str()).collect();
    assert_eq!(keys.len(), 3);
    assert_eq!(keys[2], "posts/2");
    assert!(outcome.hits.windows(2).all(|w| w[0].score >= w[1].score));
    Ok(())
}

#[test]
fn test_projection_keeps_requested_fields() -> Result<()> {
    let db = database_with(3, Config::default())?;
    let request = QueryRequest::new("Color:red").with_fields(["Name"]);
    let outcome = db.search(&request)?;

    assert_eq!(outcome.hits.len(), 1);
    let document = &outcome.hits[0].document;
    assert_eq!(document.id, "items/0");
    assert_eq!(document.field_names(), vec!["Name"]);
    Ok(())
}

#[test]
fn test_term_enumeration_pages_within_field() -> Result<()> {
    let db = database_with(9, Config::default())?;
    let tx = db.begin_read();

    db.read(&tx, |op| {
        let cancel = CancellationToken::new();
        assert_eq!(op.terms("Color", None, 2, &cancel)?, vec!["blue", "green"]);
        assert_eq!(op.terms("Color", Some("green"), 10, &cancel)?, vec!["red"]);
        assert!(op.terms("Color", Some("red"), 10, &cancel)?.is_empty());
        assert!(op.terms("Missing", None, 10, &cancel)?.is_empty());

        cancel.cancel();
        let err = op.terms("Color", None, 10, &cancel).unwrap_err();
        assert!(err.is(ErrorKind::Cancelled));
        Ok(())
    })
}

#[test]
fn test_raw_entries_and_count() -> Result<()> {
    let db = database_with(5, Config::default())?;
    let tx = db.begin_read();

    db.read(&tx, |op| {
        assert_eq!(op.entries_count(), 5);

        let request = QueryRequest::new("Tag:alpha").with_page(1, 2);
        let entries = op.index_entries(&request)?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "items/1");
        assert_eq!(entries[0].terms["__document_id"], vec!["items/1"]);
        assert_eq!(entries[0].terms["Color"], vec!["green"]);
        assert_eq!(entries[0].numeric["Num_Range"], 1.0);

        let json = entries[1].to_json()?;
        assert!(json.contains("items/2"));
        Ok(())
    })
}

#[test]
fn test_cancellation_stops_lazy_results() -> Result<()> {
    let db = database_with(100, Config::default())?;
    let tx = db.begin_read();

    db.read(&tx, |op| {
        let cancel = CancellationToken::new();
        let request = QueryRequest::new("Tag:alpha").with_page(0, 50).with_cancellation(cancel.clone());
        let retriever = accept_all();
        let mut results = op.query(&request, &retriever)?;

        for _ in 0..3 {
            assert!(results.next().is_some_and(|r| r.is_ok()));
        }
        cancel.cancel();

        let err = results.next().and_then(|r| r.err()).unwrap();
        assert!(err.is(ErrorKind::Cancelled));
        assert!(results.next().is_none());

        let err = op.query(&request, &retriever).err().unwrap();
        assert!(err.is(ErrorKind::Cancelled));
        Ok(())
    })
}

#[test]
fn test_facet_counts_use_snapshot_cache() -> Result<()> {
    let db = database_with(10, Config::default())?;
    let tx = db.begin_read();

    db.read(&tx, |op| {
        let colors = FieldSet::new(["Color"])?;
        let facets = op.facet_counts(&QueryRequest::new("Tag:alpha"), &colors)?;
        let counts: Vec<(String, usize)> = facets
            .iter()
            .map(|(values, count)| (values.get(0).unwrap_or_default().to_string(), *count))
            .collect();
        assert_eq!(
            counts,
            vec![("red".to_string(), 4), ("blue".to_string(), 3), ("green".to_string(), 3)]
        );
        assert_eq!(op.state().field_cache().len(), 10);

        let first = op.field_values(DocOrd(0), &colors)?;
        let again = op.field_values(DocOrd(0), &colors)?;
        assert!(std::sync::Arc::ptr_eq(&first, &again));

        let secret = FieldSet::new(["Secret"])?;
        let err = op.field_values(DocOrd(0), &secret).unwrap_err();
        assert!(err.is(ErrorKind::Configuration));
        Ok(())
    })
}

#[test]
fn test_facets_keep_fields_apart() -> Result<()> {
    let db = Database::open(IndexSchema::new(), Config::default())?;
    db.add_documents([
        Document::new("items/1").with_field("Tag", "x").with_field("Color", "red"),
        Document::new("items/2").with_field("Tag", "x").with_field("Size", "red"),
        Document::new("items/3").with_field("Tag", "x").with_field("Color", "red"),
    ])?;
    let tx = db.begin_read();

    db.read(&tx, |op| {
        let fields = FieldSet::new(["Color", "Size"])?;
        let facets = op.facet_counts(&QueryRequest::new("Tag:x"), &fields)?;
        let counts: Vec<(Vec<Option<String>>, usize)> = facets
            .iter()
            .map(|(values, count)| (values.values().to_vec(), *count))
            .collect();
        assert_eq!(
            counts,
            vec![
                (vec![Some("red".to_string()), None], 2),
                (vec![None, Some("red".to_string())], 1),
            ]
        );
        Ok(())
    })
}

#[test]
fn test_default_retriever_through_read_operation() -> Result<()> {
    let db = database_with(4, Config::default())?;
    let tx = db.begin_read();

    db.read(&tx, |op| {
        let request = QueryRequest::new("Color:blue");
        let hits = op.query(&request, &DocumentRetriever)?.collect::<Result<Vec<_>>>()?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "items/2");
        assert_eq!(hits[0].ord, DocOrd(2));
        Ok(())
    })
}
