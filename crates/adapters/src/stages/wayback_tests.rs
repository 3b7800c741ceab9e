// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn url_set(urls: &[&str]) -> BTreeSet<String> {
    urls.iter().map(|u| u.to_string()).collect()
}

#[test]
fn urls_categorized_by_type() {
    let urls = url_set(&[
        "https://example.com/app.js",
        "https://example.com/api/users",
        "https://example.com/v2/orders",
        "https://example.com/report.pdf",
        "https://example.com/index.html",
    ]);

    let categories = categorize_urls(&urls);

    assert_eq!(categories["js"].len(), 1);
    assert_eq!(categories["api"].len(), 2);
    assert_eq!(categories["doc"].len(), 1);
    assert_eq!(categories["other"].len(), 1);
}

#[parameterized(
    no_query = { "https://example.com/path", &[] },
    single = { "https://example.com/?id=1", &["id"] },
    multiple = { "https://example.com/search?q=x&page=2&sort=asc", &["q", "page", "sort"] },
    empty_name_skipped = { "https://example.com/?=v&x=1", &["x"] },
    fragment_ignored = { "https://example.com/?a=1#b=2", &["a"] },
)]
fn parameter_extraction(url: &str, expected: &[&str]) {
    assert_eq!(query_params(url), expected);
}

#[test]
fn parameters_unique_across_urls() {
    let urls = url_set(&[
        "https://example.com/?id=1&user=2",
        "https://example.com/other?id=9&token=x",
    ]);
    assert_eq!(extract_parameters(&urls), ["id", "token", "user"]);
}
