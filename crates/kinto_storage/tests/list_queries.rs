use kinto_storage::{
    CollectionBinding, CollectionRegistry, ColumnDef, ColumnType, Comparison, Filter, ListQuery,
    Object, RecordStorage, Sort, SortDirection, Storage, StorageError, StorageSettings, TableDef,
};
use serde_json::{json, Value};

fn object(value: Value) -> Object {
    value.as_object().cloned().unwrap()
}

/// Five records created in title order: a, b, c, d, e.
fn seeded(max_fetch_size: usize) -> Storage {
    let registry = CollectionRegistry::new()
        .with(CollectionBinding::new(
            "articles",
            TableDef::new("articles")
                .column(ColumnDef::new("title", ColumnType::Text).required())
                .column(ColumnDef::new("rank", ColumnType::Integer))
                .column(ColumnDef::new("published", ColumnType::Boolean)),
        ))
        .unwrap();
    let settings = StorageSettings {
        max_fetch_size,
        ..StorageSettings::default()
    };
    let storage = Storage::open(settings, registry).unwrap();
    storage.initialize_schema(false).unwrap();

    for payload in [
        json!({"title": "a", "rank": 3, "published": true}),
        json!({"title": "b", "rank": 1, "published": false}),
        json!({"title": "c", "rank": 2, "published": true}),
        json!({"title": "d", "rank": 2}),
        json!({"title": "e"}),
    ] {
        storage.create("articles", "blog", object(payload)).unwrap();
    }
    storage
}

fn titles(storage: &Storage, query: &ListQuery) -> Vec<String> {
    storage
        .get_all("articles", "blog", query)
        .unwrap()
        .records
        .iter()
        .map(|record| record["title"].as_str().unwrap().to_string())
        .collect()
}

fn filtered(filters: Vec<Filter>) -> ListQuery {
    ListQuery {
        filters,
        sorting: vec![Sort::asc("title")],
        ..ListQuery::default()
    }
}

#[test]
fn default_order_is_newest_first() {
    let storage = seeded(100);
    assert_eq!(
        titles(&storage, &ListQuery::default()),
        ["e", "d", "c", "b", "a"]
    );
}

#[test]
fn filters_are_combined_with_and() {
    let storage = seeded(100);
    let query = filtered(vec![
        Filter::new("rank", Comparison::Gte, 2),
        Filter::new("published", Comparison::Eq, true),
    ]);
    let result = storage.get_all("articles", "blog", &query).unwrap();
    assert_eq!(result.total_records, 2);
    assert_eq!(titles(&storage, &query), ["a", "c"]);
}

#[test]
fn every_comparison_translates() {
    let storage = seeded(100);
    let cases: Vec<(Filter, Vec<&str>)> = vec![
        (Filter::new("rank", Comparison::Eq, 2), vec!["c", "d"]),
        (Filter::new("rank", Comparison::Neq, 2), vec!["a", "b"]),
        (Filter::new("rank", Comparison::Lt, 2), vec!["b"]),
        (Filter::new("rank", Comparison::Lte, 2), vec!["b", "c", "d"]),
        (Filter::new("rank", Comparison::Gt, 2), vec!["a"]),
        (Filter::new("rank", Comparison::Gte, 2), vec!["a", "c", "d"]),
        (
            Filter::new("title", Comparison::In, json!(["a", "e", "z"])),
            vec!["a", "e"],
        ),
        (
            Filter::new("title", Comparison::Exclude, json!(["a", "e"])),
            vec!["b", "c", "d"],
        ),
        (Filter::new("title", Comparison::Like, "%c%"), vec!["c"]),
        (Filter::new("rank", Comparison::Has, false), vec!["e"]),
        (
            Filter::new("published", Comparison::Eq, json!(null)),
            vec!["d", "e"],
        ),
        (Filter::new("title", Comparison::In, json!([])), vec![]),
    ];

    for (filter, expected) in cases {
        let described = format!("{filter:?}");
        assert_eq!(
            titles(&storage, &filtered(vec![filter])),
            expected,
            "{described}"
        );
    }
}

#[test]
fn meta_fields_are_filterable() {
    let storage = seeded(100);
    let all = storage
        .get_all("articles", "blog", &filtered(vec![]))
        .unwrap()
        .records;
    let third_modified = all[2]["last_modified"].clone();
    let first_id = all[0]["id"].clone();

    assert_eq!(
        titles(
            &storage,
            &filtered(vec![Filter::new("last_modified", Comparison::Gt, third_modified)])
        ),
        ["d", "e"]
    );
    assert_eq!(
        titles(
            &storage,
            &filtered(vec![Filter::new("id", Comparison::In, json!([first_id]))])
        ),
        ["a"]
    );
}

#[test]
fn sorts_apply_in_order() {
    let storage = seeded(100);
    let query = ListQuery {
        sorting: vec![
            Sort::new("rank", SortDirection::try_from(1).unwrap()),
            Sort::new("title", SortDirection::try_from(-1).unwrap()),
        ],
        ..ListQuery::default()
    };
    assert_eq!(titles(&storage, &query), ["e", "b", "d", "c", "a"]);
}

#[test]
fn pagination_rules_narrow_records_but_not_the_count() {
    let storage = seeded(100);
    let query = ListQuery {
        sorting: vec![Sort::asc("rank"), Sort::asc("title")],
        pagination_rules: vec![
            vec![Filter::new("rank", Comparison::Gt, 2)],
            vec![
                Filter::new("rank", Comparison::Eq, 2),
                Filter::new("title", Comparison::Gt, "c"),
            ],
        ],
        ..ListQuery::default()
    };
    let result = storage.get_all("articles", "blog", &query).unwrap();
    assert_eq!(result.total_records, 5);
    assert_eq!(titles(&storage, &query), ["d", "a"]);
}

#[test]
fn limit_is_capped_and_ignored_by_the_count() {
    let storage = seeded(3);

    let limited = storage
        .get_all(
            "articles",
            "blog",
            &ListQuery {
                limit: Some(2),
                ..ListQuery::default()
            },
        )
        .unwrap();
    assert_eq!(limited.records.len(), 2);
    assert_eq!(limited.total_records, 5);

    for limit in [None, Some(0), Some(10)] {
        let capped = storage
            .get_all(
                "articles",
                "blog",
                &ListQuery {
                    limit,
                    ..ListQuery::default()
                },
            )
            .unwrap();
        assert_eq!(capped.records.len(), 3, "limit {limit:?}");
        assert_eq!(capped.total_records, 5);
    }
}

#[test]
fn deleted_records_are_listed_only_on_request() {
    let storage = seeded(100);
    let b = storage
        .get_all(
            "articles",
            "blog",
            &filtered(vec![Filter::new("title", Comparison::Eq, "b")]),
        )
        .unwrap()
        .records
        .remove(0);
    let id = b["id"].as_str().unwrap().to_string();
    storage.delete("articles", "blog", &id, true).unwrap();

    let live = storage
        .get_all("articles", "blog", &filtered(vec![]))
        .unwrap();
    assert_eq!(live.total_records, 4);

    let everything = storage
        .get_all(
            "articles",
            "blog",
            &ListQuery {
                include_deleted: true,
                sorting: vec![Sort::asc("title")],
                ..ListQuery::default()
            },
        )
        .unwrap();
    assert_eq!(everything.total_records, 5);
    assert_eq!(everything.records[1]["id"], json!(id));
    assert_eq!(everything.records[1]["deleted"], json!(true));
}

#[test]
fn malformed_queries_fail_fast() {
    let storage = seeded(100);
    let cases = [
        filtered(vec![Filter::new("colour", Comparison::Eq, "red")]),
        filtered(vec![Filter::new("rank", Comparison::In, 2)]),
        filtered(vec![Filter::new("rank", Comparison::Eq, json!([2]))]),
        filtered(vec![Filter::new("parent_id", Comparison::Eq, "blog")]),
        ListQuery {
            sorting: vec![Sort::desc("colour")],
            ..ListQuery::default()
        },
    ];
    for query in cases {
        assert!(
            matches!(
                storage.get_all("articles", "blog", &query),
                Err(StorageError::InvalidQuery(_))
            ),
            "{query:?}"
        );
    }
    assert!(SortDirection::try_from(0).is_err());
}
