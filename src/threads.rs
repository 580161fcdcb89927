use std::collections::HashMap;
use std::fmt;

use crate::config::InvalidCommentPolicy;
use crate::error::SkippedComment;
use crate::normalize::normalize_all;
use crate::types::{Comment, RawReviewComment};

type NodeId = usize;

#[derive(Debug)]
struct Node {
    comment: Comment,
    /// At most one reply per comment; threads are chains, not trees
    child: Option<NodeId>,
    /// Index of this chain's root in its anchor's root list
    root_slot: usize,
    /// Distance from the root of the chain
    depth: usize,
}

#[derive(Debug)]
struct LineThreads {
    line: u32,
    roots: Vec<NodeId>,
}

#[derive(Debug)]
struct FileThreads {
    path: String,
    lines: Vec<LineThreads>,
    line_index: HashMap<u32, usize>,
}

/// Where [`ThreadStore::add_comment`] put a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Started a new thread at its (file, line)
    Root,
    /// Became the reply of the comment with this id
    Reply { parent: u64 },
}

/// Unusual but accepted input seen while assembling threads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadDiagnostic {
    /// Several comments at the anchor could take the reply; the first in scan order got it
    DuplicateReplyTarget { id: u64, parent: u64, candidates: usize },
    /// The declared parent was never added to the store
    OrphanReply { id: u64, parent: u64 },
    /// The declared parent lives at a different (file, line)
    ParentAtOtherAnchor { id: u64, parent: u64 },
}

impl fmt::Display for ThreadDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadDiagnostic::DuplicateReplyTarget { id, parent, candidates } => write!(
                f,
                "comment {} replies to {}, which matches {} open comments; attached to the first",
                id, parent, candidates
            ),
            ThreadDiagnostic::OrphanReply { id, parent } => {
                write!(f, "comment {} replies to unknown comment {}; started a new thread", id, parent)
            }
            ThreadDiagnostic::ParentAtOtherAnchor { id, parent } => write!(
                f,
                "comment {} replies to {} on another line; started a new thread",
                id, parent
            ),
        }
    }
}

/// Review comments grouped by file, then line, then reply chain.
///
/// Files and lines keep first-insertion order and threads at a line keep
/// insertion order, so rendering is deterministic. Comments must be added
/// oldest first: a reply only attaches to a parent that is already stored.
#[derive(Debug, Default)]
pub struct ThreadStore {
    nodes: Vec<Node>,
    files: Vec<FileThreads>,
    file_index: HashMap<String, usize>,
    /// comment id -> every node carrying it, in insertion order
    by_id: HashMap<u64, Vec<NodeId>>,
    diagnostics: Vec<ThreadDiagnostic>,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from comments already sorted by creation time
    pub fn from_comments(comments: impl IntoIterator<Item = Comment>) -> Self {
        let mut store = Self::new();
        for comment in comments {
            store.add_comment(comment);
        }
        store
    }

    /// Insert one comment, either as the reply of its parent or as a new thread.
    ///
    /// The parent must be at the same (file, line) and must not have a reply
    /// yet. Otherwise the comment starts a new thread at its own anchor.
    pub fn add_comment(&mut self, comment: Comment) -> Placement {
        let (file_slot, line_slot) = self.anchor_slot(&comment.path, comment.line);
        let target = match comment.in_reply_to {
            Some(parent) => self.attachment_point(&comment, parent),
            None => None,
        };

        let id = comment.id;
        let node_id = self.nodes.len();

        let placement = match target {
            Some(parent_node) => {
                let parent = &mut self.nodes[parent_node];
                parent.child = Some(node_id);
                let (root_slot, depth) = (parent.root_slot, parent.depth + 1);
                let parent_id = parent.comment.id;
                self.nodes.push(Node {
                    comment,
                    child: None,
                    root_slot,
                    depth,
                });
                Placement::Reply { parent: parent_id }
            }
            None => {
                let roots = &mut self.files[file_slot].lines[line_slot].roots;
                let root_slot = roots.len();
                roots.push(node_id);
                self.nodes.push(Node {
                    comment,
                    child: None,
                    root_slot,
                    depth: 0,
                });
                Placement::Root
            }
        };

        self.by_id.entry(id).or_default().push(node_id);
        placement
    }

    /// Index of the file and line entries for an anchor, created on first use
    fn anchor_slot(&mut self, path: &str, line: u32) -> (usize, usize) {
        let file_slot = match self.file_index.get(path) {
            Some(&slot) => slot,
            None => {
                let slot = self.files.len();
                self.files.push(FileThreads {
                    path: path.to_string(),
                    lines: Vec::new(),
                    line_index: HashMap::new(),
                });
                self.file_index.insert(path.to_string(), slot);
                slot
            }
        };

        let file = &mut self.files[file_slot];
        let line_slot = match file.line_index.get(&line) {
            Some(&slot) => slot,
            None => {
                let slot = file.lines.len();
                file.lines.push(LineThreads {
                    line,
                    roots: Vec::new(),
                });
                file.line_index.insert(line, slot);
                slot
            }
        };

        (file_slot, line_slot)
    }

    /// The node a reply should hang from, if any.
    ///
    /// Candidates carry the parent id, share the reply's anchor, and have no
    /// reply yet. Ties go to the earliest thread at the anchor, then the
    /// shallowest node in that thread.
    fn attachment_point(&mut self, comment: &Comment, parent: u64) -> Option<NodeId> {
        let Some(nodes) = self.by_id.get(&parent) else {
            self.record(ThreadDiagnostic::OrphanReply {
                id: comment.id,
                parent,
            });
            return None;
        };

        let at_anchor: Vec<NodeId> = nodes
            .iter()
            .copied()
            .filter(|&n| {
                let c = &self.nodes[n].comment;
                c.path == comment.path && c.line == comment.line
            })
            .collect();

        if at_anchor.is_empty() {
            self.record(ThreadDiagnostic::ParentAtOtherAnchor {
                id: comment.id,
                parent,
            });
            return None;
        }

        let open: Vec<NodeId> = at_anchor
            .into_iter()
            .filter(|&n| self.nodes[n].child.is_none())
            .collect();

        if open.len() > 1 {
            self.record(ThreadDiagnostic::DuplicateReplyTarget {
                id: comment.id,
                parent,
                candidates: open.len(),
            });
        }

        open.into_iter()
            .min_by_key(|&n| (self.nodes[n].root_slot, self.nodes[n].depth))
    }

    fn record(&mut self, diagnostic: ThreadDiagnostic) {
        match diagnostic {
            ThreadDiagnostic::DuplicateReplyTarget { .. } => tracing::warn!(%diagnostic),
            _ => tracing::debug!(%diagnostic),
        }
        self.diagnostics.push(diagnostic);
    }

    /// Oddities accepted while assembling, in the order they were seen
    pub fn diagnostics(&self) -> &[ThreadDiagnostic] {
        &self.diagnostics
    }

    /// Number of comments stored across all threads
    pub fn comment_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Files that have at least one thread, in first-insertion order
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }

    /// Threads anchored at one (file, line), in insertion order
    pub fn threads_at(&self, path: &str, line: u32) -> Vec<Thread<'_>> {
        self.file_index
            .get(path)
            .and_then(|&f| {
                let file = &self.files[f];
                file.line_index.get(&line).map(|&l| &file.lines[l])
            })
            .map(|lt| lt.roots.iter().map(|&root| self.thread(root)).collect())
            .unwrap_or_default()
    }

    /// Every thread with its anchor, in report order
    pub fn threads(&self) -> impl Iterator<Item = (&str, u32, Thread<'_>)> {
        self.files.iter().flat_map(move |file| {
            file.lines.iter().flat_map(move |lt| {
                lt.roots
                    .iter()
                    .map(move |&root| (file.path.as_str(), lt.line, self.thread(root)))
            })
        })
    }

    fn thread(&self, root: NodeId) -> Thread<'_> {
        Thread { store: self, root }
    }

    /// Render the text report: file, then `line:` per thread, then `author: body` per comment
    pub fn render(&self) -> Report {
        let mut text = String::new();
        let mut comments_visited = 0;
        let mut current_file = None;

        // Threads of one file are contiguous, so a path change starts a new file block
        for (path, line, thread) in self.threads() {
            if current_file != Some(path) {
                text.push_str(path);
                text.push('\n');
                current_file = Some(path);
            }

            text.push_str(&format!("\t{}:\n", line));
            for comment in thread.comments() {
                comments_visited += 1;
                text.push_str(&format!("\t\t{}: {}\n", comment.author, comment.body));
            }
        }

        Report {
            text,
            comments_visited,
        }
    }
}

impl fmt::Display for ThreadStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render().text)
    }
}

/// Rendered report plus how many comments were walked to produce it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub text: String,
    pub comments_visited: usize,
}

/// A reply chain, from its root to the newest reply
#[derive(Clone, Copy)]
pub struct Thread<'a> {
    store: &'a ThreadStore,
    root: NodeId,
}

impl<'a> Thread<'a> {
    pub fn root(&self) -> &'a Comment {
        &self.store.nodes[self.root].comment
    }

    pub fn comments(&self) -> ThreadComments<'a> {
        ThreadComments {
            store: self.store,
            next: Some(self.root),
        }
    }
}

pub struct ThreadComments<'a> {
    store: &'a ThreadStore,
    next: Option<NodeId>,
}

impl<'a> Iterator for ThreadComments<'a> {
    type Item = &'a Comment;

    fn next(&mut self) -> Option<Self::Item> {
        let node = &self.store.nodes[self.next?];
        self.next = node.child;
        Some(&node.comment)
    }
}

/// Threads built from a batch of raw records, plus the records left out
#[derive(Debug)]
pub struct AssembledThreads {
    pub store: ThreadStore,
    pub skipped: Vec<SkippedComment>,
}

/// Normalize raw records and fold them into a [`ThreadStore`].
///
/// `raws` must already be sorted oldest first. With
/// [`InvalidCommentPolicy::Abort`] the first bad record fails the batch and
/// no store is returned.
pub fn assemble_threads(
    raws: &[RawReviewComment],
    policy: InvalidCommentPolicy,
) -> Result<AssembledThreads, SkippedComment> {
    let (comments, mut skipped) = normalize_all(raws);

    if policy == InvalidCommentPolicy::Abort && !skipped.is_empty() {
        return Err(skipped.swap_remove(0));
    }

    let store = ThreadStore::from_comments(comments);
    tracing::debug!(
        comments = store.comment_count(),
        skipped = skipped.len(),
        diagnostics = store.diagnostics().len(),
        "assembled review threads"
    );

    Ok(AssembledThreads { store, skipped })
}
