//! Property tests checking find results against a straightforward model of the query
//! semantics.

use bson::{Bson, Document, doc};
use proptest::prelude::*;
use revlayer::{memory::InMemoryStore, prelude::*};
use tokio::runtime::Runtime;

const TAGS: [&str; 3] = ["a", "b", "c"];

#[derive(Clone, Debug)]
struct Row {
    n: Option<i64>,
    tag: Option<String>,
}

#[derive(Clone, Debug)]
enum Condition {
    Number(FieldOp, i64),
    Tags(FieldOp, Vec<String>),
}

impl Condition {
    fn query(&self) -> Document {
        match self {
            Condition::Number(FieldOp::Eq, value) => doc! { "n": *value },
            Condition::Number(op, value) => doc! { "n": { operator(op): *value } },
            Condition::Tags(op, tags) => {
                let tags = tags.iter().cloned().map(Bson::String).collect::<Vec<_>>();
                doc! { "tag": { operator(op): tags } }
            }
        }
    }

    fn matches(&self, row: &Row) -> bool {
        match self {
            Condition::Number(op, value) => match row.n {
                Some(n) => match op {
                    FieldOp::Eq => n == *value,
                    FieldOp::Ne => n != *value,
                    FieldOp::Gt => n > *value,
                    FieldOp::Gte => n >= *value,
                    FieldOp::Lt => n < *value,
                    _ => n <= *value,
                },
                None => matches!(op, FieldOp::Ne),
            },
            Condition::Tags(op, tags) => match &row.tag {
                Some(tag) => {
                    let member = tags.contains(tag);
                    if matches!(op, FieldOp::In) { member } else { !member }
                }
                None => matches!(op, FieldOp::NotIn),
            },
        }
    }
}

fn operator(op: &FieldOp) -> &'static str {
    match op {
        FieldOp::Eq => "$eq",
        FieldOp::Ne => "$ne",
        FieldOp::Gt => "$gt",
        FieldOp::Gte => "$gte",
        FieldOp::Lt => "$lt",
        FieldOp::Lte => "$lte",
        FieldOp::In => "$in",
        FieldOp::NotIn => "$nin",
    }
}

fn arb_tag() -> impl Strategy<Value = String> {
    prop::sample::select(TAGS.to_vec()).prop_map(str::to_string)
}

fn arb_row() -> impl Strategy<Value = Row> {
    (prop::option::of(-5i64..5), prop::option::of(arb_tag())).prop_map(|(n, tag)| Row { n, tag })
}

fn arb_condition() -> impl Strategy<Value = Condition> {
    let number_op = prop_oneof![
        Just(FieldOp::Eq),
        Just(FieldOp::Ne),
        Just(FieldOp::Gt),
        Just(FieldOp::Gte),
        Just(FieldOp::Lt),
        Just(FieldOp::Lte),
    ];
    let tag_op = prop_oneof![Just(FieldOp::In), Just(FieldOp::NotIn)];

    prop_oneof![
        (number_op, -6i64..6).prop_map(|(op, value)| Condition::Number(op, value)),
        (tag_op, prop::collection::vec(arb_tag(), 0..3)).prop_map(|(op, tags)| Condition::Tags(op, tags)),
    ]
}

fn stored(index: usize, row: &Row) -> Document {
    let mut document = doc! { "_id": format!("d{index:02}") };
    if let Some(n) = row.n {
        document.insert("n", n);
    }
    if let Some(tag) = &row.tag {
        document.insert("tag", tag.clone());
    }
    document
}

fn run_find(rows: &[Row], condition: &Condition, limit: usize, transient: bool) -> Paginated<Document> {
    Runtime::new().unwrap().block_on(async {
        let store = InMemoryStore::builder()
            .transient_views(transient)
            .build()
            .await
            .unwrap();
        let service = Service::builder()
            .connection(store)
            .model("rows")
            .build()
            .unwrap();

        service
            .create(rows.iter().enumerate().map(|(i, row)| stored(i, row)).collect::<Vec<_>>())
            .await
            .unwrap();

        service
            .find(condition.query(), Filters::builder().limit(limit).build())
            .await
            .unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn find_returns_exactly_the_matching_documents(
        rows in prop::collection::vec(arb_row(), 0..12),
        condition in arb_condition(),
        transient in any::<bool>(),
    ) {
        let expected = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| condition.matches(row))
            .map(|(i, _)| format!("d{i:02}"))
            .collect::<Vec<_>>();

        let page = run_find(&rows, &condition, 100, transient);
        let found = page.data
            .iter()
            .map(|document| document.get_str("id").unwrap().to_string())
            .collect::<Vec<_>>();

        prop_assert_eq!(page.total, expected.len());
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn limit_bounds_data_but_not_total(
        rows in prop::collection::vec(arb_row(), 0..12),
        condition in arb_condition(),
        limit in 0usize..6,
    ) {
        let matching = rows.iter().filter(|row| condition.matches(row)).count();

        let page = run_find(&rows, &condition, limit, true);

        prop_assert_eq!(page.total, matching);
        prop_assert_eq!(page.limit, limit);
        prop_assert_eq!(page.data.len(), matching.min(limit));
    }
}
