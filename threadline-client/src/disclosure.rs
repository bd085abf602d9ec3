use std::collections::HashMap;

use crate::{Node, NodeId};

/// Number of replies revealed at each step
pub const REPLY_PAGE_SIZE: usize = 4;

/// How many replies of each top-level comment are currently revealed
///
/// This only remembers counts: the replies themselves stay in the
/// [`CommentStore`](crate::CommentStore), and every read is clamped to the
/// total the caller passes in, so replies deleted in the meantime never
/// make a stored count point past the end of the list.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReplyDisclosure {
    revealed: HashMap<NodeId, usize>,
}

impl ReplyDisclosure {
    pub fn new() -> ReplyDisclosure {
        ReplyDisclosure::default()
    }

    /// Reveal the first page of replies
    pub fn reveal(&mut self, comment: NodeId, total: usize) -> usize {
        let shown = REPLY_PAGE_SIZE.min(total);
        self.revealed.insert(comment, shown);
        shown
    }

    /// Reveal one more page of replies, without going past `total`
    pub fn show_more(&mut self, comment: NodeId, total: usize) -> usize {
        let shown = (self.revealed(&comment, total) + REPLY_PAGE_SIZE).min(total);
        self.revealed.insert(comment, shown);
        shown
    }

    pub fn hide(&mut self, comment: &NodeId) {
        self.revealed.remove(comment);
    }

    /// Number of replies currently revealed, given the comment currently has `total`
    pub fn revealed(&self, comment: &NodeId, total: usize) -> usize {
        self.revealed.get(comment).copied().unwrap_or(0).min(total)
    }

    pub fn is_expanded(&self, comment: &NodeId) -> bool {
        self.revealed.contains_key(comment)
    }

    /// Whether `show_more` would reveal anything
    pub fn has_more(&self, comment: &NodeId, total: usize) -> bool {
        self.revealed(comment, total) < total
    }

    /// The replies of `comment` that are currently revealed
    pub fn visible<'a>(&self, comment: &'a Node) -> &'a [Node] {
        let shown = self.revealed(&comment.id, comment.children.len());
        &comment.children[..shown]
    }

    pub fn clear(&mut self) {
        self.revealed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::{self, UserId},
        LocalId,
    };

    fn comment_with(replies: usize) -> Node {
        let mut c = Node::from(api::Node::now(UserId::stub(), String::from("comment")));
        for i in 0..replies {
            c.children
                .push(Node::from(api::Node::now(UserId::stub(), format!("reply {i}"))));
        }
        c
    }

    #[test]
    fn paging_is_capped() {
        let c = NodeId::Local(LocalId(2));
        let mut d = ReplyDisclosure::new();
        assert_eq!(d.revealed(&c, 10), 0);
        assert!(!d.is_expanded(&c));

        assert_eq!(d.reveal(c, 10), 4);
        assert_eq!(d.show_more(c, 10), 8);
        assert_eq!(d.show_more(c, 10), 10);
        assert_eq!(d.revealed(&c, 10), 10);
        assert!(!d.has_more(&c, 10));

        d.hide(&c);
        assert_eq!(d.revealed(&c, 10), 0);
        assert!(!d.is_expanded(&c));
    }

    #[test]
    fn small_totals() {
        let c = NodeId::Local(LocalId(1));
        let mut d = ReplyDisclosure::new();
        assert_eq!(d.reveal(c, 2), 2);
        assert_eq!(d.show_more(c, 2), 2);
        assert_eq!(d.reveal(c, 0), 0);
        assert!(d.is_expanded(&c));
    }

    #[test]
    fn show_more_when_collapsed_reveals_first_page() {
        let c = NodeId::Local(LocalId(1));
        let mut d = ReplyDisclosure::new();
        assert_eq!(d.show_more(c, 9), 4);
    }

    #[test]
    fn comments_are_independent() {
        let a = NodeId::Local(LocalId(1));
        let b = NodeId::Local(LocalId(2));
        let mut d = ReplyDisclosure::new();
        d.reveal(a, 10);
        d.show_more(a, 10);
        d.reveal(b, 10);
        d.hide(&b);
        assert_eq!(d.revealed(&a, 10), 8);
        assert_eq!(d.revealed(&b, 10), 0);
    }

    #[test]
    fn visible_replies() {
        let mut c = comment_with(6);
        let mut d = ReplyDisclosure::new();
        assert!(d.visible(&c).is_empty());
        d.reveal(c.id, c.children.len());
        assert_eq!(d.visible(&c).len(), 4);
        assert_eq!(d.visible(&c)[3].text, "reply 3");
        c.children.truncate(1);
        assert_eq!(d.visible(&c).len(), 1);
    }

    #[test]
    fn reads_are_clamped_to_shrinking_totals() {
        bolero::check!()
            .with_type::<Vec<(u8, u8)>>()
            .cloned()
            .for_each(|ops| {
                let c = NodeId::Local(LocalId(0));
                let mut d = ReplyDisclosure::new();
                let mut total = 0usize;
                for (op, n) in ops {
                    match op % 5 {
                        0 => {
                            d.reveal(c, total);
                        }
                        1 => {
                            d.show_more(c, total);
                        }
                        2 => d.hide(&c),
                        3 => total += n as usize,
                        _ => total = total.saturating_sub(n as usize),
                    }
                    assert!(d.revealed(&c, total) <= total);
                }
            })
    }
}
