//! Cursor pagination over a post's comment tree.

use futures::future::join_all;
use tracing::warn;

use agora_core::domain::comments::{Comment, CommentEdge, CommentsPage, PageInfo};
use agora_core::domain::posts::PostId;
use agora_core::error::CoreError;
use agora_core::store::CommentStore;
use agora_core::types::cursor::Cursor;

use crate::loader::{CommentBatch, CommentLoader};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub first: usize,
    pub cursor: Option<String>,
    pub deep: bool,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            first: DEFAULT_PAGE_SIZE,
            cursor: None,
            deep: false,
        }
    }
}

/// Where a listing starts and which ids it keeps.
enum Origin {
    Fresh,
    Deep,
    After(Cursor),
}

pub async fn page<S: CommentStore>(
    store: &S,
    loader: &CommentLoader<S>,
    post_id: PostId,
    request: &PageRequest,
) -> Result<CommentsPage, CoreError> {
    if request.first == 0 {
        return Err(CoreError::ValidationFailed(
            "page size must be at least 1".to_string(),
        ));
    }

    let cursor = match request.cursor.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(Cursor::try_from(raw)?),
    };

    let (batch, origin) = match cursor {
        None => (loader.by_post.load(post_id).await?, Origin::Fresh),
        Some(cursor) => {
            let anchor = store.get_comment_by_id(cursor.comment_id()).await?;
            if anchor.post_id != post_id {
                return Err(CoreError::InvalidCursor(format!(
                    "cursor does not point into post {post_id}"
                )));
            }
            if request.deep {
                (loader.by_parent.load(anchor.id).await?, Origin::Deep)
            } else {
                let batch = match anchor.parent_id {
                    None => loader.by_post.load(post_id).await?,
                    Some(parent_id) => loader.by_parent.load(parent_id).await?,
                };
                (batch, Origin::After(cursor))
            }
        }
    };

    let (nodes, has_next_page) = window(&batch, &origin, request.first);
    let edges = edges(loader, nodes).await;
    let page_info = match (edges.first(), edges.last()) {
        (Some(first), Some(last)) => PageInfo {
            start_cursor: first.cursor.clone(),
            end_cursor: last.cursor.clone(),
            has_next_page,
        },
        _ => PageInfo::default(),
    };
    Ok(CommentsPage { edges, page_info })
}

fn window<'a>(batch: &'a CommentBatch, origin: &Origin, first: usize) -> (Vec<&'a Comment>, bool) {
    let kept: Vec<&Comment> = match origin {
        Origin::Fresh | Origin::Deep => batch.iter().collect(),
        Origin::After(cursor) => batch
            .iter()
            .filter(|comment| comment.id > cursor.comment_id())
            .collect(),
    };
    let has_next_page = kept.len() > first;
    (kept.into_iter().take(first).collect(), has_next_page)
}

async fn edges<S: CommentStore>(loader: &CommentLoader<S>, nodes: Vec<&Comment>) -> Vec<CommentEdge> {
    let replies = join_all(nodes.iter().map(|node| loader.by_parent.load(node.id))).await;
    nodes
        .into_iter()
        .zip(replies)
        .map(|(node, replies)| {
            let has_sub_comments = match replies {
                Ok(children) => !children.is_empty(),
                Err(err) => {
                    warn!(comment_id = node.id, error = %err, "sub-comment lookup failed");
                    false
                }
            };
            CommentEdge {
                cursor: Cursor::from(node.id).encode(),
                node: node.clone(),
                has_sub_comments,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{PageRequest, page};
    use crate::loader::{CommentLoader, LoaderConfig};
    use crate::testing::{FixtureStore, comment};
    use agora_core::domain::comments::CommentsPage;
    use agora_core::error::CoreError;
    use agora_core::types::cursor::Cursor;

    fn thread() -> Arc<FixtureStore> {
        Arc::new(FixtureStore::with_comments(vec![
            comment(10, 7, None),
            comment(11, 7, None),
            comment(12, 7, None),
            comment(13, 7, None),
            comment(14, 7, None),
            comment(20, 7, Some(10)),
            comment(21, 7, Some(10)),
            comment(22, 7, Some(10)),
            comment(40, 9, None),
        ]))
    }

    fn loader(store: &Arc<FixtureStore>) -> CommentLoader<FixtureStore> {
        CommentLoader::new(
            Arc::clone(store),
            LoaderConfig {
                max_batch: 100,
                wait: Duration::from_millis(1),
            },
        )
    }

    fn request(first: usize, cursor: Option<i64>, deep: bool) -> PageRequest {
        PageRequest {
            first,
            cursor: cursor.map(|id| Cursor::from(id).encode()),
            deep,
        }
    }

    fn ids(page: &CommentsPage) -> Vec<i64> {
        page.edges.iter().map(|edge| edge.node.id).collect()
    }

    #[tokio::test]
    async fn first_page_then_strict_continuation() {
        let store = thread();
        let first = page(&*store, &loader(&store), 7, &request(2, None, false))
            .await
            .unwrap();
        assert_eq!(ids(&first), vec![10, 11]);
        assert!(first.page_info.has_next_page);
        assert_eq!(first.page_info.start_cursor, Cursor::from(10).encode());
        assert_eq!(first.page_info.end_cursor, Cursor::from(11).encode());

        let next = page(&*store, &loader(&store), 7, &request(2, Some(11), false))
            .await
            .unwrap();
        assert_eq!(ids(&next), vec![12, 13]);
        assert!(next.page_info.has_next_page);

        let last = page(&*store, &loader(&store), 7, &request(2, Some(13), false))
            .await
            .unwrap();
        assert_eq!(ids(&last), vec![14]);
        assert!(!last.page_info.has_next_page);
    }

    #[tokio::test]
    async fn deep_listing_returns_children_of_the_cursor() {
        let store = thread();
        let deep = page(&*store, &loader(&store), 7, &request(10, Some(10), true))
            .await
            .unwrap();
        assert_eq!(ids(&deep), vec![20, 21, 22]);
        assert!(!deep.page_info.has_next_page);
        assert!(deep.edges.iter().all(|edge| !edge.has_sub_comments));
    }

    #[tokio::test]
    async fn continuing_from_a_reply_lists_its_later_siblings() {
        let store = thread();
        let siblings = page(&*store, &loader(&store), 7, &request(10, Some(20), false))
            .await
            .unwrap();
        assert_eq!(ids(&siblings), vec![21, 22]);
    }

    #[tokio::test]
    async fn edges_flag_comments_with_replies() {
        let store = thread();
        let fresh = page(&*store, &loader(&store), 7, &request(3, None, false))
            .await
            .unwrap();
        let flags: Vec<_> = fresh.edges.iter().map(|edge| edge.has_sub_comments).collect();
        assert_eq!(flags, vec![true, false, false]);
        assert_eq!(fresh.edges[1].cursor, Cursor::from(11).encode());
    }

    #[tokio::test]
    async fn reply_lookups_are_batched_into_one_call_per_comment() {
        let store = thread();
        page(&*store, &loader(&store), 7, &request(5, None, false))
            .await
            .unwrap();
        let calls = store.calls();
        assert_eq!(calls.by_post_id, 1);
        assert_eq!(calls.by_parent_id, 5);
    }

    #[tokio::test]
    async fn post_without_comments_yields_an_empty_page() {
        let store = thread();
        let empty = page(&*store, &loader(&store), 99, &request(10, None, false))
            .await
            .unwrap();
        assert_eq!(empty, CommentsPage::empty());
        assert_eq!(empty.page_info.start_cursor, "");
        assert!(!empty.page_info.has_next_page);
    }

    #[tokio::test]
    async fn cursor_to_a_missing_comment_is_not_found() {
        let store = thread();
        let err = page(&*store, &loader(&store), 7, &request(2, Some(999), false))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn malformed_cursor_is_rejected() {
        let store = thread();
        let bad = PageRequest {
            first: 2,
            cursor: Some("not base64!".to_string()),
            deep: false,
        };
        let err = page(&*store, &loader(&store), 7, &bad).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidCursor(_)));
        assert_eq!(store.calls().by_post_id, 0);
    }

    #[tokio::test]
    async fn cursor_from_another_post_is_rejected() {
        let store = thread();
        let err = page(&*store, &loader(&store), 7, &request(2, Some(40), false))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidCursor(_)));
    }

    #[tokio::test]
    async fn deep_cursor_from_another_post_is_rejected() {
        let store = Arc::new(FixtureStore::with_comments(vec![
            comment(10, 7, None),
            comment(40, 9, None),
            comment(41, 9, Some(40)),
        ]));
        let err = page(&*store, &loader(&store), 7, &request(10, Some(40), true))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidCursor(_)));
        assert_eq!(store.calls().by_parent_id, 0);
    }

    #[tokio::test]
    async fn deep_cursor_to_a_missing_comment_is_not_found() {
        let store = thread();
        let err = page(&*store, &loader(&store), 7, &request(10, Some(999), true))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn empty_cursor_starts_from_the_top() {
        let store = thread();
        let blank = PageRequest {
            first: 2,
            cursor: Some(String::new()),
            deep: false,
        };
        let result = page(&*store, &loader(&store), 7, &blank).await.unwrap();
        assert_eq!(ids(&result), vec![10, 11]);
    }

    #[tokio::test]
    async fn failed_reply_lookup_reports_no_replies() {
        let store = thread();
        store.fail_parent(10);
        let result = page(&*store, &loader(&store), 7, &request(2, None, false))
            .await
            .unwrap();
        assert_eq!(ids(&result), vec![10, 11]);
        assert!(!result.edges[0].has_sub_comments);
    }

    #[tokio::test]
    async fn zero_page_size_is_rejected() {
        let store = thread();
        let err = page(&*store, &loader(&store), 7, &request(0, None, false))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed(_)));
    }
}
