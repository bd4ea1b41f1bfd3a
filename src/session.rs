//! Reconciliation session state
//!
//! Owns the last accepted snapshot, the live display list, and the in-flight
//! guard that keeps poll cycles from overlapping. One `apply_snapshot` call is
//! one reconciliation pass: flatten, diff, resolve, render, all synchronous.

use crate::model::{Comment, ThreadDocument};
use crate::reconcile::{apply_update, diff_new, flatten, full_render, DisplayList};
use std::time::Instant;

/// What the viewer is currently looking at. Anything other than `Live` is a
/// placeholder and triggers a full rebuild on the next successful snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    Error(String),
    Empty,
    Live,
}

/// Result of one reconciliation pass, for the notification banner and scroll
/// bookkeeping.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub full_rebuild: bool,
    pub new_count: usize,
    /// Display index each new entry was inserted at, in insertion order.
    pub inserted_at: Vec<usize>,
    /// Replies that fell back to the front because their parent was missing.
    pub orphaned: usize,
}

pub struct FeedSession {
    comments: Vec<Comment>,
    display: DisplayList,
    state: ViewState,
    in_flight: bool,
    title: Option<String>,
    thread_link: Option<String>,
}

impl FeedSession {
    pub fn new() -> Self {
        Self {
            comments: Vec::new(),
            display: DisplayList::default(),
            state: ViewState::Loading,
            in_flight: false,
            title: None,
            thread_link: None,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn display(&self) -> &DisplayList {
        &self.display
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn thread_link(&self) -> Option<&str> {
        self.thread_link.as_deref()
    }

    /// Claim the in-flight slot for a new poll cycle. Returns false if a prior
    /// cycle has not finished; that cycle is skipped entirely, not queued.
    pub fn begin_poll(&mut self) -> bool {
        if self.in_flight {
            tracing::debug!("previous poll still in flight, skipping this cycle");
            return false;
        }
        self.in_flight = true;
        true
    }

    /// Drop back to the loading placeholder for a manual full refresh.
    pub fn reset(&mut self) {
        self.comments.clear();
        self.display.clear();
        self.state = ViewState::Loading;
    }

    /// A fetch failed. On initial load this surfaces an error placeholder; a
    /// background failure keeps the current view and only logs.
    pub fn fail_poll(&mut self, err: &anyhow::Error) {
        self.in_flight = false;
        if self.state == ViewState::Live {
            tracing::warn!(error = %err, "background refresh failed, keeping current view");
        } else {
            tracing::warn!(error = %err, "initial load failed");
            self.state = ViewState::Error("Failed to load comments. Please try again.".to_string());
        }
    }

    /// Reconcile a freshly fetched snapshot against the display.
    ///
    /// From a placeholder state the whole tree is rendered. Otherwise only
    /// genuinely new comments (by id) are inserted; the stored tree is updated
    /// when new items were accepted.
    pub fn apply_snapshot(
        &mut self,
        doc: ThreadDocument,
        fresh_until: Instant,
    ) -> ReconcileOutcome {
        self.in_flight = false;

        if let Some(title) = doc.display_title() {
            self.title = Some(title);
        }
        if let Some(link) = doc.thread_link() {
            self.thread_link = Some(link);
        }

        if self.state != ViewState::Live {
            if doc.comments.is_empty() {
                self.comments.clear();
                self.display.clear();
                self.state = ViewState::Empty;
                return ReconcileOutcome {
                    full_rebuild: true,
                    ..ReconcileOutcome::default()
                };
            }

            self.comments = doc.comments;
            full_render(&mut self.display, &self.comments);
            self.state = ViewState::Live;
            tracing::debug!(total = self.display.len(), "full render");
            return ReconcileOutcome {
                full_rebuild: true,
                ..ReconcileOutcome::default()
            };
        }

        let previous = flatten(&self.comments, 0);
        let current = flatten(&doc.comments, 0);
        let fresh = diff_new(&previous, &current);
        if fresh.is_empty() {
            tracing::debug!(total = current.len(), "no new comments this cycle");
            return ReconcileOutcome::default();
        }

        tracing::debug!(count = fresh.len(), "inserting new comments");
        self.comments = doc.comments;
        let report = apply_update(&mut self.display, fresh, fresh_until);

        ReconcileOutcome {
            full_rebuild: false,
            new_count: report.positions.len(),
            inserted_at: report.positions,
            orphaned: report.orphaned,
        }
    }

    /// Drop expired "new" highlights; called from the UI tick.
    pub fn expire_fresh(&mut self, now: Instant) {
        self.display.expire_fresh(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Comment;

    fn doc(comments: Vec<Comment>) -> ThreadDocument {
        ThreadDocument {
            title: None,
            gamethread: None,
            comments,
        }
    }

    fn comment(id: &str, created: i64) -> Comment {
        Comment {
            id: id.to_string(),
            created: Some(created),
            ..Comment::default()
        }
    }

    fn reply(id: &str, parent: &str, created: i64) -> Comment {
        Comment {
            id: id.to_string(),
            parent_id: Some(format!("t1_{}", parent)),
            created: Some(created),
            ..Comment::default()
        }
    }

    fn ids(session: &FeedSession) -> Vec<&str> {
        session
            .display()
            .entries()
            .iter()
            .map(|entry| entry.comment.id.as_str())
            .collect()
    }

    #[test]
    fn test_initial_load_renders_fully() {
        let mut session = FeedSession::new();
        assert_eq!(*session.state(), ViewState::Loading);

        assert!(session.begin_poll());
        let outcome = session.apply_snapshot(doc(vec![comment("a", 1)]), Instant::now());

        assert!(outcome.full_rebuild);
        assert_eq!(outcome.new_count, 0);
        assert_eq!(*session.state(), ViewState::Live);
        assert_eq!(ids(&session), vec!["a"]);
    }

    #[test]
    fn test_empty_document_shows_empty_state() {
        let mut session = FeedSession::new();
        session.begin_poll();
        session.apply_snapshot(doc(vec![]), Instant::now());
        assert_eq!(*session.state(), ViewState::Empty);

        // Comments arriving later recover from the placeholder.
        session.begin_poll();
        session.apply_snapshot(doc(vec![comment("a", 1)]), Instant::now());
        assert_eq!(*session.state(), ViewState::Live);
        assert_eq!(ids(&session), vec!["a"]);
    }

    #[test]
    fn test_background_poll_inserts_only_new() {
        let mut session = FeedSession::new();
        session.begin_poll();
        session.apply_snapshot(doc(vec![comment("a1", 100)]), Instant::now());

        session.begin_poll();
        let outcome = session.apply_snapshot(
            doc(vec![comment("a1", 100), comment("b1", 200)]),
            Instant::now(),
        );

        assert!(!outcome.full_rebuild);
        assert_eq!(outcome.new_count, 1);
        assert_eq!(outcome.inserted_at, vec![0]);
        assert_eq!(ids(&session), vec!["b1", "a1"]);
    }

    #[test]
    fn test_new_reply_nests_under_parent() {
        let mut session = FeedSession::new();
        session.begin_poll();
        session.apply_snapshot(doc(vec![comment("a1", 100)]), Instant::now());

        let mut updated = comment("a1", 100);
        updated.replies = vec![reply("c1", "a1", 200)];
        session.begin_poll();
        let outcome = session.apply_snapshot(doc(vec![updated]), Instant::now());

        assert_eq!(outcome.new_count, 1);
        assert_eq!(ids(&session), vec!["a1", "c1"]);
        assert_eq!(session.display().entries()[1].depth, 1);
    }

    #[test]
    fn test_zero_diff_poll_leaves_display_alone() {
        let mut session = FeedSession::new();
        session.begin_poll();
        session.apply_snapshot(doc(vec![comment("a", 1)]), Instant::now());

        session.begin_poll();
        let outcome = session.apply_snapshot(doc(vec![comment("a", 1)]), Instant::now());

        assert_eq!(outcome.new_count, 0);
        assert_eq!(ids(&session), vec!["a"]);
    }

    #[test]
    fn test_in_flight_guard_skips_overlapping_polls() {
        let mut session = FeedSession::new();
        assert!(session.begin_poll());
        assert!(!session.begin_poll());

        session.apply_snapshot(doc(vec![comment("a", 1)]), Instant::now());
        assert!(session.begin_poll());
    }

    #[test]
    fn test_failure_during_initial_load_shows_error() {
        let mut session = FeedSession::new();
        session.begin_poll();
        session.fail_poll(&anyhow::anyhow!("connection refused"));

        assert!(matches!(session.state(), ViewState::Error(_)));
        // Guard was released; the next tick can try again.
        assert!(session.begin_poll());
    }

    #[test]
    fn test_background_failure_preserves_display() {
        let mut session = FeedSession::new();
        session.begin_poll();
        session.apply_snapshot(doc(vec![comment("a", 1)]), Instant::now());

        session.begin_poll();
        session.fail_poll(&anyhow::anyhow!("timed out"));

        assert_eq!(*session.state(), ViewState::Live);
        assert_eq!(ids(&session), vec!["a"]);
        assert!(session.begin_poll());
    }

    #[test]
    fn test_recovery_after_error_rebuilds() {
        let mut session = FeedSession::new();
        session.begin_poll();
        session.fail_poll(&anyhow::anyhow!("boom"));

        session.begin_poll();
        let outcome = session.apply_snapshot(doc(vec![comment("a", 1)]), Instant::now());
        assert!(outcome.full_rebuild);
        assert_eq!(*session.state(), ViewState::Live);
    }

    #[test]
    fn test_reset_returns_to_loading_placeholder() {
        let mut session = FeedSession::new();
        session.begin_poll();
        session.apply_snapshot(doc(vec![comment("a", 1)]), Instant::now());

        session.reset();
        assert_eq!(*session.state(), ViewState::Loading);
        assert!(session.display().is_empty());
    }

    #[test]
    fn test_title_and_link_follow_the_document() {
        let mut session = FeedSession::new();
        session.begin_poll();
        session.apply_snapshot(
            ThreadDocument {
                title: Some("[Game Thread] Warriors at Suns".to_string()),
                gamethread: Some("https://oauth.reddit.com/r/nba/123".to_string()),
                comments: vec![comment("a", 1)],
            },
            Instant::now(),
        );

        assert_eq!(session.title(), Some("Warriors at Suns"));
        assert_eq!(
            session.thread_link(),
            Some("https://www.reddit.com/r/nba/123")
        );
    }
}
