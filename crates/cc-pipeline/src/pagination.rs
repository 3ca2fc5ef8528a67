//! Pagination combinators (spec §4.1): page-number and cursor-style
//! iteration, both accumulating items in order with a bounded page count.

use cc_core::ApiResponse;
use futures::future::BoxFuture;

/// Page-number pagination (spec §4.1 `getAllPages`): repeatedly calls
/// `fetch_page(page, limit)` until a page returns fewer than `limit` items
/// or reports `has_more == false`. Any page failure is returned verbatim.
pub async fn get_all_pages<T, F>(
    limit: u32,
    max_pages: u32,
    mut fetch_page: F,
) -> ApiResponse<Vec<T>>
where
    T: Clone,
    F: FnMut(u32, u32) -> BoxFuture<'static, (ApiResponse<Vec<T>>, bool)>,
{
    let mut items = Vec::new();
    let mut page = 1u32;

    loop {
        let (response, has_more) = fetch_page(page, limit).await;
        if !response.success {
            return response;
        }
        let page_items = response.data.clone().unwrap_or_default();
        let page_len = page_items.len() as u32;
        items.extend(page_items);

        if page_len < limit || !has_more || page >= max_pages {
            break;
        }
        page += 1;
    }

    ApiResponse::ok(items, 200, Default::default())
}

/// Cursor-style pagination (spec §4.1 `collectCursorPaginated`). Stops when
/// `extract_cursor` returns `None` or `max_pages` is reached. Any page
/// failure is returned verbatim.
pub async fn collect_cursor_paginated<T, P, FetchPage, ExtractItems, ExtractCursor>(
    initial_cursor: Option<P>,
    max_pages: u32,
    mut fetch_page: FetchPage,
    mut extract_items: ExtractItems,
    mut extract_cursor: ExtractCursor,
    mut on_page: Option<&mut dyn FnMut(&[T])>,
) -> ApiResponse<Vec<T>>
where
    T: Clone,
    P: Clone,
    FetchPage: FnMut(Option<P>) -> BoxFuture<'static, ApiResponse<serde_json::Value>>,
    ExtractItems: FnMut(&serde_json::Value) -> Vec<T>,
    ExtractCursor: FnMut(&serde_json::Value) -> Option<P>,
{
    let mut items = Vec::new();
    let mut cursor = initial_cursor;
    let mut pages = 0u32;

    loop {
        let response = fetch_page(cursor.clone()).await;
        if !response.success {
            return response.map(|_| Vec::new());
        }
        let Some(body) = response.data.as_ref() else {
            break;
        };

        let page_items = extract_items(body);
        if let Some(cb) = on_page.as_deref_mut() {
            cb(&page_items);
        }
        items.extend(page_items);

        pages += 1;
        cursor = extract_cursor(body);
        if cursor.is_none() || pages >= max_pages {
            break;
        }
    }

    ApiResponse::ok(items, 200, Default::default())
}
