mod common;

use akin_university::interfaces::csv::course_reader::import_courses;
use common::*;
use rust_decimal_macros::dec;
use std::fs::File;

#[tokio::test]
async fn test_import_fixture_catalog() {
    let h = harness();
    let file = File::open("tests/fixtures/courses.csv").unwrap();

    let imported = import_courses(&h.registrar, file).await.unwrap();
    assert_eq!(imported, 3);

    let courses = h.registrar.list_courses().await.unwrap();
    let titles: Vec<_> = courses.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Introduction to Computer Science",
            "Business Administration",
            "Public Health"
        ]
    );
    assert_eq!(courses[2].price, money(dec!(350.50)));
    assert_eq!(courses[2].duration_months, 12);
    assert_eq!(courses[2].level.as_deref(), Some("Graduate"));
}

#[tokio::test]
async fn test_import_skips_invalid_rows() {
    let h = harness();
    let data = "title, description, level, price, duration_months, credits\n\
                Good,,, 10, 6, 3\n\
                Bad price,,, ten, 6, 3\n\
                ,,, 10, 6, 3\n";

    let imported = import_courses(&h.registrar, data.as_bytes()).await.unwrap();
    assert_eq!(imported, 1);
    assert_eq!(h.registrar.list_courses().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_shipped_catalog_is_valid() {
    let h = harness();
    let file = File::open("data/courses.csv").unwrap();
    let imported = import_courses(&h.registrar, file).await.unwrap();
    assert_eq!(imported, 6);
}

#[tokio::test]
async fn test_add_courses_rejects_whole_batch() {
    let h = harness();
    let batch = vec![
        new_course("Algebra", dec!(10), 6, 3),
        new_course("Forever", dec!(10), 1000, 3),
    ];
    assert!(h.registrar.add_courses(batch).await.is_err());
    assert!(h.registrar.list_courses().await.unwrap().is_empty());

    let added = h
        .registrar
        .add_courses(vec![
            new_course("Algebra", dec!(10), 6, 3),
            new_course("Geometry", dec!(12), 3, 2),
        ])
        .await
        .unwrap();
    assert_eq!(added.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2]);
}
