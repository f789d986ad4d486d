//! Feature extraction from file bytes and the parse tree.
//!
//! Statistical features come straight from the bytes; the word bag, the
//! callable flag, and the operation sequences come from the tree. A failed
//! sub-task never suppresses the others; its error joins a merged failure
//! description instead.

pub mod statistical;

pub use statistical::StatFeatures;

use std::collections::VecDeque;
use std::sync::Arc;

use crate::tree::TreeValue;

/// Node kinds that make a file "callable": shell-exec, include-or-eval,
/// call, method-call, static-call.
pub const CALLABLE_KINDS: &[i64] = &[265, 269, 515, 768, 769];

const OP_CLEAN_MAX_BLOCK: usize = 5;
const OP_CLEAN_MAX_PASSES: usize = 10;

/// Feature keys an analyzer can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKey {
    Statistical,
    AstWords,
    Callable,
    AstOpSequence,
    RawAst,
}

impl FeatureKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKey::Statistical => "statistical",
            FeatureKey::AstWords => "ast_words",
            FeatureKey::Callable => "callable",
            FeatureKey::AstOpSequence => "ast_op_sequence",
            FeatureKey::RawAst => "raw_ast",
        }
    }

    /// Whether this feature can only be produced from a parse tree.
    pub fn needs_tree(&self) -> bool {
        !matches!(self, FeatureKey::Statistical)
    }
}

/// All features extracted for one file. Absent components stay `None`,
/// distinguishable from present-but-empty ones.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    pub statistical: Option<StatFeatures>,
    pub ast_words: Option<Vec<String>>,
    pub ast_op_sequence: Option<Vec<Vec<i64>>>,
    pub callable: bool,
    pub raw_tree: Option<Arc<TreeValue>>,
}

impl FeatureSet {
    /// Presence rules for analyzer gating. `callable` is a plain boolean
    /// and therefore always present.
    pub fn has(&self, key: FeatureKey) -> bool {
        match key {
            FeatureKey::Statistical => self.statistical.is_some(),
            FeatureKey::AstWords => self.ast_words.is_some(),
            FeatureKey::AstOpSequence => self.ast_op_sequence.is_some(),
            FeatureKey::Callable => true,
            FeatureKey::RawAst => self.raw_tree.is_some(),
        }
    }
}

/// Extract every feature the content and tree allow. Returns the feature
/// set and, when sub-tasks failed, a merged error description.
pub fn extract_all(content: &[u8], tree: Option<Arc<TreeValue>>) -> (FeatureSet, Option<String>) {
    let mut fs = FeatureSet::default();
    let mut errors: Vec<String> = Vec::new();

    if !content.is_empty() {
        fs.statistical = Some(statistical::compute(content));
    }

    if let Some(tree) = tree {
        match words_and_callable(&tree) {
            Ok((words, callable)) => {
                fs.ast_words = Some(words);
                fs.callable = callable;
            }
            Err(e) => errors.push(format!("word extraction failed: {e}")),
        }
        match op_sequences(&tree) {
            Ok(seqs) => fs.ast_op_sequence = Some(seqs),
            Err(e) => errors.push(format!("op sequence extraction failed: {e}")),
        }
        fs.raw_tree = Some(tree);
    }

    let merged = if errors.is_empty() {
        None
    } else {
        Some(errors.join("; "))
    };
    (fs, merged)
}

/// One depth-first pass producing the word bag and the callable flag.
///
/// A word is recorded for every node whose children mapping carries a
/// string `name`; the flag is set when any node kind is in
/// [`CALLABLE_KINDS`].
pub fn words_and_callable(root: &TreeValue) -> anyhow::Result<(Vec<String>, bool)> {
    if matches!(root, TreeValue::Null) {
        anyhow::bail!("cannot process empty tree");
    }

    let mut words = Vec::new();
    let mut callable = false;
    walk(root, &mut words, &mut callable);
    return Ok((words, callable));

    fn walk(value: &TreeValue, words: &mut Vec<String>, callable: &mut bool) {
        match value {
            TreeValue::Node(node) => {
                if CALLABLE_KINDS.contains(&node.kind) {
                    *callable = true;
                }
                if let TreeValue::Map(map) = &node.children {
                    if let Some(TreeValue::Str(name)) = map.get("name") {
                        words.push(name.clone());
                    }
                }
                walk(&node.children, words, callable);
            }
            TreeValue::Seq(items) => {
                for item in items {
                    walk(item, words, callable);
                }
            }
            TreeValue::Map(map) => {
                // BTreeMap iterates keys lexically, keeping order stable.
                for child in map.values() {
                    walk(child, words, callable);
                }
            }
            TreeValue::Null | TreeValue::Bool(_) | TreeValue::Num(_) | TreeValue::Str(_) => {}
        }
    }
}

enum QueueItem<'a> {
    Value {
        key_is_children: bool,
        value: &'a TreeValue,
        parent_kind: Option<i64>,
    },
    /// Marks the end of a child group; carries the group's parent kind.
    Separator(Option<i64>),
}

/// Breadth-first operation-sequence extraction.
///
/// Kinds accumulate into a running sequence; when a child group finishes,
/// the sequence is emitted with the group's parent kind prepended and a
/// fresh sequence begins. The residual sequence flushes without a prefix.
pub fn op_sequences(root: &TreeValue) -> anyhow::Result<Vec<Vec<i64>>> {
    if matches!(root, TreeValue::Null) {
        anyhow::bail!("cannot process empty tree");
    }

    let mut result: Vec<Vec<i64>> = Vec::new();
    let mut current: Vec<i64> = Vec::new();
    let mut queue: VecDeque<QueueItem> = VecDeque::new();
    queue.push_back(QueueItem::Value {
        key_is_children: false,
        value: root,
        parent_kind: None,
    });

    while let Some(item) = queue.pop_front() {
        match item {
            QueueItem::Separator(parent_kind) => {
                if !current.is_empty() {
                    let mut finished = Vec::with_capacity(current.len() + 1);
                    if let Some(kind) = parent_kind {
                        finished.push(kind);
                    }
                    finished.append(&mut current);
                    result.push(finished);
                }
            }
            QueueItem::Value {
                key_is_children,
                value,
                parent_kind,
            } => match value {
                TreeValue::Node(node) => {
                    current.push(node.kind);
                    if !matches!(node.children, TreeValue::Null) {
                        queue.push_back(QueueItem::Value {
                            key_is_children: true,
                            value: &node.children,
                            parent_kind: Some(node.kind),
                        });
                    }
                }
                TreeValue::Seq(items) => {
                    for item in items {
                        queue.push_back(QueueItem::Value {
                            key_is_children: false,
                            value: item,
                            parent_kind,
                        });
                    }
                    if key_is_children && !items.is_empty() {
                        queue.push_back(QueueItem::Separator(parent_kind));
                    }
                }
                TreeValue::Map(map) => {
                    for child in map.values() {
                        queue.push_back(QueueItem::Value {
                            key_is_children: false,
                            value: child,
                            parent_kind,
                        });
                    }
                    if key_is_children && !map.is_empty() {
                        queue.push_back(QueueItem::Separator(parent_kind));
                    }
                }
                TreeValue::Null | TreeValue::Bool(_) | TreeValue::Num(_) | TreeValue::Str(_) => {}
            },
        }
    }

    if !current.is_empty() {
        result.push(current);
    }

    // Repetition compression, repeated until the sequence count settles.
    let mut cleaned = clean_sequences(&result, OP_CLEAN_MAX_BLOCK);
    let mut previous = result;
    for _ in 1..OP_CLEAN_MAX_PASSES {
        if previous.len() == cleaned.len() {
            break;
        }
        previous = cleaned;
        cleaned = clean_sequences(&previous, OP_CLEAN_MAX_BLOCK);
    }

    Ok(cleaned)
}

/// Delete the second of any two equal adjacent blocks, longest blocks
/// first, rescanning from the same position after each deletion.
fn clean_sequences(data: &[Vec<i64>], max_len: usize) -> Vec<Vec<i64>> {
    data.iter()
        .map(|seq| {
            let mut tmp = seq.clone();
            for length in (1..=max_len).rev() {
                let mut i = 0;
                while i < tmp.len() {
                    if i + 2 * length <= tmp.len()
                        && tmp[i..i + length] == tmp[i + length..i + 2 * length]
                    {
                        tmp.drain(i + length..i + 2 * length);
                        continue;
                    }
                    i += 1;
                }
            }
            tmp
        })
        .collect()
}
