//! Common test records and helpers.
//!
//! The `Book` family nests three levels deep, mixes composite and leaf
//! siblings on every level and carries ignored fields; `Student` is a flat
//! two-level record with narrow integer columns.
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

use serde::Serialize;
use xlgrid::{Diagnostic, ReadOutcome};

// Re-export fixtures for convenience
pub use super::fixtures::*;

xlgrid::record! {
    #[derive(Debug, Default, Clone, PartialEq, Serialize)]
    pub struct Names {
        #[grid("col:英文名")]
        pub english: String,
        #[grid("col:中文名")]
        pub chinese: String,
        #[grid("col:法文名")]
        pub french: String,
    }
}

xlgrid::record! {
    #[derive(Debug, Default, Clone, PartialEq, Serialize)]
    pub struct Pointer {
        #[grid("col:x")]
        pub x: i64,
        #[grid("col:y")]
        pub y: i64,
    }
}

xlgrid::record! {
    #[derive(Debug, Default, Clone, PartialEq, Serialize)]
    pub struct Author {
        #[grid("col:姓")]
        pub first_name: String,
        #[grid("col:名")]
        pub last_name: String,
    }
}

xlgrid::record! {
    #[derive(Debug, Default, Clone, PartialEq, Serialize)]
    pub struct Title {
        #[grid("col:主标题")]
        pub main_title: Names,
        #[grid("col:副标题")]
        pub sub_title: Names,
    }
}

xlgrid::record! {
    #[derive(Debug, Default, Clone, PartialEq, Serialize)]
    pub struct Bookmark {
        #[grid("-")]
        pub title: String,
        #[grid("col:序号")]
        pub index: i32,
        #[grid("col:页数")]
        pub page: u32,
        #[grid("col:起始")]
        pub start: Pointer,
        #[grid("col:终点")]
        pub end: Pointer,
    }
}

xlgrid::record! {
    #[derive(Debug, Default, Clone, PartialEq, Serialize)]
    pub struct Book {
        #[grid("-")]
        pub not_presented: String,
        #[grid("col:书名")]
        pub title: Title,
        #[grid("col:作者")]
        pub author: Author,
        #[grid("col:书签")]
        pub bookmark: Bookmark,
        #[grid("col:备注")]
        pub remark: String,
    }
}

xlgrid::record! {
    #[derive(Debug, Default, Clone, PartialEq, Serialize)]
    pub struct Score {
        #[grid("col:语文")]
        pub chinese: u8,
        #[grid("col:数学")]
        pub math: u8,
        #[grid("col:英语")]
        pub english: u8,
    }
}

xlgrid::record! {
    #[derive(Debug, Default, Clone, PartialEq, Serialize)]
    pub struct Student {
        #[grid("col:姓名")]
        pub name: String,
        #[grid("col:性别")]
        pub sex: i32,
        #[grid("col:年龄")]
        pub age: u16,
        #[grid("col:成绩")]
        pub score: Score,
        #[grid("col:绩点")]
        pub gpa: f64,
    }
}

/// Install a test logger once; later calls are no-ops.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn names(english: &str, chinese: &str, french: &str) -> Names {
    Names {
        english: english.to_string(),
        chinese: chinese.to_string(),
        french: french.to_string(),
    }
}

/// Two books with every mapped field set, including the ignored ones.
#[must_use]
pub fn sample_books() -> Vec<Book> {
    vec![
        Book {
            not_presented: "never rendered".to_string(),
            title: Title {
                main_title: names("Song of Zhangsan", "张三之歌", "Chanson de trois"),
                sub_title: names(
                    "Confession of an Extralegal Madman",
                    "一个法外狂徒的自白",
                    "Confession d'un maniaque extra - judiciaire",
                ),
            },
            author: Author {
                first_name: "罗".to_string(),
                last_name: "用好".to_string(),
            },
            bookmark: Bookmark {
                title: "skipped".to_string(),
                index: 1,
                page: 10,
                start: Pointer { x: 100, y: 200 },
                end: Pointer { x: -100, y: -200 },
            },
            remark: "  padded & <escaped>  ".to_string(),
        },
        Book {
            not_presented: String::new(),
            title: Title {
                main_title: names("Second", "第二", "Deuxième"),
                sub_title: names("", "", ""),
            },
            author: Author {
                first_name: "Li".to_string(),
                last_name: "Si".to_string(),
            },
            bookmark: Bookmark {
                title: String::new(),
                index: -7,
                page: u32::MAX,
                start: Pointer {
                    x: i64::MIN,
                    y: 0,
                },
                end: Pointer {
                    x: i64::MAX,
                    y: 1,
                },
            },
            remark: String::new(),
        },
    ]
}

/// What reading `books` back yields: ignored fields are never written.
#[must_use]
pub fn without_ignored(books: &[Book]) -> Vec<Book> {
    books
        .iter()
        .cloned()
        .map(|mut book| {
            book.not_presented.clear();
            book.bookmark.title.clear();
            book
        })
        .collect()
}

#[must_use]
pub fn sample_students() -> Vec<Student> {
    vec![
        Student {
            name: "张三".to_string(),
            sex: 1,
            age: 12,
            score: Score {
                chinese: 85,
                math: 100,
                english: 90,
            },
            gpa: 3.75,
        },
        Student {
            name: "李四".to_string(),
            sex: 0,
            age: 13,
            score: Score {
                chinese: 0,
                math: 255,
                english: 61,
            },
            gpa: 0.1,
        },
    ]
}

/// Assert a read produced no diagnostics, printing them otherwise.
pub fn assert_clean<T>(outcome: &ReadOutcome<T>) {
    assert!(
        outcome.diagnostics.is_empty(),
        "unexpected diagnostics: {}",
        outcome
            .diagnostics
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    );
}

/// Field paths of all reconciliation gaps, joined with `.`.
#[must_use]
pub fn gap_paths(diagnostics: &[Diagnostic]) -> Vec<String> {
    diagnostics
        .iter()
        .filter_map(|d| match d {
            Diagnostic::ReconciliationGap { path } => Some(path.join(".")),
            _ => None,
        })
        .collect()
}
