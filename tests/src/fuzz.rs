use std::collections::HashSet;

use bolero::generator::TypeGenerator;
use futures::executor::block_on;
use talkback_client::{
    api::{
        Author, CommentId, PageCursor, PostCommentResult, RawStreamComment, RawStreamEvent,
        MAX_DISPLAY_NAME_LEN,
    },
    stream,
};
use talkback_mock_service::UiCall;

use crate::harness::*;

const ME: &str = "alice";

/// Ids are folded onto a small range so that operations keep hitting the same
/// comments, including the ones posted by the fuzzed user
fn comment_id(id: u8) -> CommentId {
    CommentId(1000 + u64::from(id % 8))
}

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
enum FuzzOp {
    StreamNew {
        id: u8,
        mine: bool,
        #[generator(_code = "bolero::generator::gen_with::<String>().len(1..100usize)")]
        author: String,
        visibility: u8,
    },
    StreamUpdate {
        id: u8,
        with_body: bool,
        visibility: Option<u8>,
    },
    StreamDelete {
        id: u8,
    },
    CommentsEnabled(bool),
    Post {
        accepted: bool,
    },
    Delete {
        id: u8,
    },
    NextPage {
        #[generator(_code = "bolero::generator::gen_with::<Vec<u8>>().len(0..6usize)")]
        ids: Vec<u8>,
        more: bool,
    },
}

struct WidgetFuzzer {
    h: Harness,
    checked_badges: usize,
}

impl WidgetFuzzer {
    fn new() -> WidgetFuzzer {
        let h = Harness::new();
        h.service.set_auth(Some(logged_in(ME)));
        h.service
            .push_page(Ok(page(&[1000, 1001, 1002]).with_next_page(PageCursor(2))));
        block_on(h.widget.initial_load()).expect("initial load");
        WidgetFuzzer {
            h,
            checked_badges: 0,
        }
    }

    fn push(&self, e: RawStreamEvent) {
        for e in stream::normalize(e) {
            self.h.widget.apply_stream_event(e);
        }
    }

    fn execute_fuzz_op(&mut self, op: FuzzOp) {
        let h = &self.h;
        match op {
            FuzzOp::StreamNew {
                id,
                mine,
                author,
                visibility,
            } => {
                let author = match mine {
                    true => String::from(ME),
                    false => author,
                };
                self.push(RawStreamEvent {
                    comment: Some(RawStreamComment {
                        comment_id: Some(comment_id(id)),
                        content: Some(String::from("<p>pushed</p>")),
                        visibility: Some(visibility % 4),
                        author: Some(Author {
                            display_name: author,
                        }),
                        timestamp: Some(time()),
                        ..RawStreamComment::default()
                    }),
                    collection: None,
                });
            }
            FuzzOp::StreamUpdate {
                id,
                with_body,
                visibility,
            } => {
                self.push(RawStreamEvent {
                    comment: Some(RawStreamComment {
                        comment_id: Some(comment_id(id)),
                        updated: Some(true),
                        content: with_body.then(|| String::from("<p>edited</p>")),
                        visibility: visibility.map(|v| v % 4),
                        ..RawStreamComment::default()
                    }),
                    collection: None,
                });
            }
            FuzzOp::StreamDelete { id } => self.push(RawStreamEvent::deleted(comment_id(id))),
            FuzzOp::CommentsEnabled(enabled) => {
                self.push(RawStreamEvent::comments_enabled(enabled))
            }
            FuzzOp::Post { accepted } => {
                if !accepted {
                    h.service.push_post_result(Ok(PostCommentResult::failed(Some(
                        String::from("rejected"),
                    ))));
                }
                let res = block_on(h.widget.submit_comment(String::from("fuzzed comment")));
                assert_eq!(res.is_ok(), accepted, "post result was {res:?}");
                assert!(!h.widget.is_posting());
            }
            FuzzOp::Delete { id } => {
                block_on(h.widget.delete_comment(comment_id(id))).expect("deleting comment");
                assert!(!h.widget.has_comment(comment_id(id)));
            }
            FuzzOp::NextPage { ids, more } => {
                if h.widget.has_more_pages() {
                    let ids: Vec<u64> = ids.into_iter().map(|i| comment_id(i).0).collect();
                    let mut next = page(&ids);
                    if more {
                        next = next.with_next_page(PageCursor(3));
                    }
                    h.service.push_page(Ok(next));
                }
                block_on(h.widget.next_page()).expect("fetching next page");
            }
        }
        self.check_invariants();
    }

    fn check_invariants(&mut self) {
        let h = &self.h;
        assert_eq!(h.ui.test_double_renders(), Vec::<CommentId>::new());

        let displayed = h.ui.test_displayed();
        let known: HashSet<CommentId> = (1000..1200)
            .map(CommentId)
            .filter(|id| h.widget.has_comment(*id))
            .collect();
        assert_eq!(displayed, known);
        assert_eq!(h.widget.num_comments(), known.len());

        for call in h.ui.test_calls() {
            let rendered = match call {
                UiCall::Render(r) | UiCall::AddNextPageComments(r) => r,
                UiCall::AddComment(c) => vec![c],
                _ => continue,
            };
            for c in rendered {
                assert!(c.author_display_name.chars().count() <= MAX_DISPLAY_NAME_LEN);
            }
        }

        let badges = h.ui.test_badges();
        for (id, kind) in &badges[self.checked_badges..] {
            assert!(
                h.widget.is_own_comment(*id),
                "{kind:?} badge shown on {id} which is not an own comment"
            );
        }
        self.checked_badges = badges.len();
    }
}

#[test]
fn widget_matches_what_is_displayed() {
    init_logging();
    bolero::check!()
        .with_generator(bolero::generator::gen_with::<Vec<FuzzOp>>().len(1..100usize))
        .cloned()
        .for_each(|ops| {
            let mut fuzzer = WidgetFuzzer::new();
            for op in ops {
                fuzzer.execute_fuzz_op(op);
            }
        });
}
