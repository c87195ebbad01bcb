mod common;

use uuid::Uuid;

use library_lending::application::lending::{
    LoanListQuery, checkout_book, list_books, list_loans,
};
use library_lending::domain::Borrower;
use library_lending::domain::book::Book;
use library_lending::domain::commands::CheckoutBook;
use library_lending::ports::book_repository::BookFilter;

use common::{cleanup_book, create_test_pool, make_deps, member_actor, seed_book, unique_user};

/// 共有データベース上で他のテストと干渉しないよう、タイトルに埋め込んだ
/// トークンで検索を絞り込む
fn scoped_filter(token: &str) -> BookFilter {
    BookFilter {
        search: Some(token.to_string()),
        ..Default::default()
    }
}

fn titles(books: &[Book]) -> Vec<String> {
    books.iter().map(|b| b.title.clone()).collect()
}

// ============================================================================
// 蔵書一覧のページング
// ============================================================================

#[tokio::test]
async fn test_title_asc_walks_all_pages_without_gaps() {
    let pool = create_test_pool().await;
    let deps = make_deps(&pool);

    let token = Uuid::new_v4().simple().to_string();
    let suffixes = ["alpha", "bravo", "charlie", "delta", "echo"];
    let mut seeded = Vec::new();
    for suffix in suffixes {
        seeded.push(seed_book(&deps, &format!("{} {}", token, suffix), "Paging Author", 1).await);
    }

    // 1ページ目：先頭2件と次カーソル
    let page1 = list_books(&deps, scoped_filter(&token), Some("title:asc"), Some(2), None)
        .await
        .unwrap();
    assert_eq!(
        titles(&page1.items),
        vec![format!("{} alpha", token), format!("{} bravo", token)]
    );
    let cursor1 = page1.next_cursor.expect("page 1 should have a next cursor");

    // 2ページ目：続きの2件と次カーソル
    let page2 = list_books(
        &deps,
        scoped_filter(&token),
        Some("title:asc"),
        Some(2),
        Some(&cursor1),
    )
    .await
    .unwrap();
    assert_eq!(
        titles(&page2.items),
        vec![format!("{} charlie", token), format!("{} delta", token)]
    );
    let cursor2 = page2.next_cursor.expect("page 2 should have a next cursor");

    // 3ページ目：最後の1件、カーソルなし
    let page3 = list_books(
        &deps,
        scoped_filter(&token),
        Some("title:asc"),
        Some(2),
        Some(&cursor2),
    )
    .await
    .unwrap();
    assert_eq!(titles(&page3.items), vec![format!("{} echo", token)]);
    assert_eq!(page3.next_cursor, None);

    for book in seeded {
        cleanup_book(&pool, book.id).await;
    }
}

#[tokio::test]
async fn test_created_at_desc_is_default_and_orders_backwards() {
    let pool = create_test_pool().await;
    let deps = make_deps(&pool);

    let token = Uuid::new_v4().simple().to_string();
    let mut seeded = Vec::new();
    for i in 0..5 {
        seeded.push(seed_book(&deps, &format!("{} no{}", token, i), "Paging Author", 1).await);
    }

    // ソート無指定は createdAt:desc
    let mut collected = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = list_books(
            &deps,
            scoped_filter(&token),
            None,
            Some(2),
            cursor.as_deref(),
        )
        .await
        .unwrap();
        collected.extend(page.items);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    // 全ページの連結は重複も欠落もなく全集合に一致する
    assert_eq!(collected.len(), seeded.len());
    let mut seen: Vec<_> = collected.iter().map(|b| b.id.value()).collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), seeded.len());

    // (created_at, id) が単調減少している
    for pair in collected.windows(2) {
        let key = |b: &Book| (b.created_at, b.id.value());
        assert!(key(&pair[0]) > key(&pair[1]));
    }

    for book in seeded {
        cleanup_book(&pool, book.id).await;
    }
}

#[tokio::test]
async fn test_created_at_asc_orders_forwards() {
    let pool = create_test_pool().await;
    let deps = make_deps(&pool);

    let token = Uuid::new_v4().simple().to_string();
    let mut seeded = Vec::new();
    for i in 0..3 {
        seeded.push(seed_book(&deps, &format!("{} no{}", token, i), "Paging Author", 1).await);
    }

    let page = list_books(
        &deps,
        scoped_filter(&token),
        Some("createdAt:asc"),
        Some(10),
        None,
    )
    .await
    .unwrap();

    assert_eq!(page.items.len(), 3);
    assert_eq!(page.next_cursor, None);
    for pair in page.items.windows(2) {
        let key = |b: &Book| (b.created_at, b.id.value());
        assert!(key(&pair[0]) < key(&pair[1]));
    }

    for book in seeded {
        cleanup_book(&pool, book.id).await;
    }
}

#[tokio::test]
async fn test_malformed_cursor_and_unknown_sort_fall_back() {
    let pool = create_test_pool().await;
    let deps = make_deps(&pool);

    let token = Uuid::new_v4().simple().to_string();
    let book = seed_book(&deps, &format!("{} lonely", token), "Paging Author", 1).await;

    let first = list_books(&deps, scoped_filter(&token), None, Some(10), None)
        .await
        .unwrap();

    // 解読不能なカーソルはエラーではなく先頭ページ
    let garbled = list_books(
        &deps,
        scoped_filter(&token),
        None,
        Some(10),
        Some("!!not-a-cursor!!"),
    )
    .await
    .unwrap();
    assert_eq!(titles(&garbled.items), titles(&first.items));

    // 未知のソート指定は既定の createdAt:desc に倒す
    let unknown_sort = list_books(
        &deps,
        scoped_filter(&token),
        Some("publishedYear:desc"),
        Some(10),
        None,
    )
    .await
    .unwrap();
    assert_eq!(titles(&unknown_sort.items), titles(&first.items));

    cleanup_book(&pool, book.id).await;
}

#[tokio::test]
async fn test_boundary_survives_inserts_between_pages() {
    let pool = create_test_pool().await;
    let deps = make_deps(&pool);

    let token = Uuid::new_v4().simple().to_string();
    let suffixes = ["bravo", "charlie", "delta", "echo"];
    let mut seeded = Vec::new();
    for suffix in suffixes {
        seeded.push(seed_book(&deps, &format!("{} {}", token, suffix), "Paging Author", 1).await);
    }

    let page1 = list_books(&deps, scoped_filter(&token), Some("title:asc"), Some(2), None)
        .await
        .unwrap();
    assert_eq!(
        titles(&page1.items),
        vec![format!("{} bravo", token), format!("{} charlie", token)]
    );
    let cursor = page1.next_cursor.unwrap();

    // ページ取得の合間に、既に通過した境界より前に1冊増える
    seeded.push(seed_book(&deps, &format!("{} alpha", token), "Paging Author", 1).await);

    // 2ページ目は境界述語で再開するため、挿入の影響を受けず
    // 重複も欠落も発生しない
    let page2 = list_books(
        &deps,
        scoped_filter(&token),
        Some("title:asc"),
        Some(2),
        Some(&cursor),
    )
    .await
    .unwrap();
    assert_eq!(
        titles(&page2.items),
        vec![format!("{} delta", token), format!("{} echo", token)]
    );
    assert_eq!(page2.next_cursor, None);

    for book in seeded {
        cleanup_book(&pool, book.id).await;
    }
}

#[tokio::test]
async fn test_available_only_filter() {
    let pool = create_test_pool().await;
    let deps = make_deps(&pool);

    let token = Uuid::new_v4().simple().to_string();
    let stocked = seed_book(&deps, &format!("{} stocked", token), "Paging Author", 1).await;
    let empty = seed_book(&deps, &format!("{} empty", token), "Paging Author", 0).await;

    let filter = BookFilter {
        search: Some(token.clone()),
        available_only: true,
        ..Default::default()
    };
    let page = list_books(&deps, filter, Some("title:asc"), Some(10), None)
        .await
        .unwrap();

    assert_eq!(titles(&page.items), vec![format!("{} stocked", token)]);

    cleanup_book(&pool, stocked.id).await;
    cleanup_book(&pool, empty.id).await;
}

// ============================================================================
// 貸出一覧のページング
// ============================================================================

#[tokio::test]
async fn test_loans_pagination_walks_own_loans() {
    let pool = create_test_pool().await;
    let deps = make_deps(&pool);

    let member = member_actor(&unique_user("heidi"));
    let mut seeded = Vec::new();
    for i in 0..5 {
        let book = seed_book(&deps, &format!("Loan Paging {}", i), "Paging Author", 1).await;
        checkout_book(
            &deps,
            CheckoutBook {
                book_id: book.id,
                borrower: Borrower::Registered(member.id.clone()),
                actor: member.clone(),
            },
        )
        .await
        .unwrap();
        seeded.push(book);
    }

    let mut collected = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0;
    loop {
        let page = list_loans(
            &deps,
            LoanListQuery::default(),
            &member,
            Some(2),
            cursor.as_deref(),
        )
        .await
        .unwrap();
        pages += 1;
        collected.extend(page.items);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(collected.len(), 5);

    // 重複なし、(borrowed_at, id) 降順
    let mut ids: Vec<_> = collected.iter().map(|l| l.id.value()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 5);
    for pair in collected.windows(2) {
        assert!((pair[0].borrowed_at, pair[0].id.value()) > (pair[1].borrowed_at, pair[1].id.value()));
    }

    for book in seeded {
        cleanup_book(&pool, book.id).await;
    }
}
