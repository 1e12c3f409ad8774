use core::fmt;
use std::sync::Arc;

/// One level of structural wrapping a fragment sits inside.
///
/// Opening a level emits `prefix + separator + pre_open + open`; closing it
/// emits `close + post_close`. Consecutive elements of the same level are
/// split by `close + "," + open`, which is how arrays of objects repeat their
/// element wrapper without reopening the array itself.
///
/// `unique_id` names the slot a descriptor occupies at its depth: two
/// fragments whose descriptors share a unique id at some depth share the
/// already-open wrapper there.
pub trait AssemblyNode: fmt::Debug + Send + Sync {
    fn unique_id(&self) -> u64;
    fn prefix(&self) -> &str;
    fn separator(&self) -> &str;
    fn pre_open(&self) -> &str;
    fn open(&self) -> &str;
    fn close(&self) -> &str;
    fn post_close(&self) -> &str;
}

/// The bracket text of a node level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Delimiters {
    pub separator: String,
    pub pre_open: String,
    pub open: String,
    pub close: String,
    pub post_close: String,
}

impl Delimiters {
    pub fn new(
        separator: impl Into<String>,
        pre_open: impl Into<String>,
        open: impl Into<String>,
        close: impl Into<String>,
        post_close: impl Into<String>,
    ) -> Self {
        Self {
            separator: separator.into(),
            pre_open: pre_open.into(),
            open: open.into(),
            close: close.into(),
            post_close: post_close.into(),
        }
    }
}

/// A concrete nesting level: a named key plus its bracket text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseNode {
    unique_id: u64,
    prefix: String,
    delimiters: Delimiters,
}

impl BaseNode {
    pub fn new(prefix: impl Into<String>, unique_id: u64, delimiters: Delimiters) -> Self {
        Self {
            unique_id,
            prefix: prefix.into(),
            delimiters,
        }
    }

    /// Wraps this node into a [`ChildNode`] that reuses its open slot.
    pub fn child(self: &Arc<Self>) -> ChildNode {
        ChildNode::new(Arc::clone(self) as Arc<dyn AssemblyNode>)
    }
}

impl AssemblyNode for BaseNode {
    fn unique_id(&self) -> u64 {
        self.unique_id
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn separator(&self) -> &str {
        &self.delimiters.separator
    }

    fn pre_open(&self) -> &str {
        &self.delimiters.pre_open
    }

    fn open(&self) -> &str {
        &self.delimiters.open
    }

    fn close(&self) -> &str {
        &self.delimiters.close
    }

    fn post_close(&self) -> &str {
        &self.delimiters.post_close
    }
}

/// A level that lives inside an already-open ancestor slot.
///
/// It shares its parent's unique id and closing text but never emits any
/// opening text of its own.
#[derive(Clone, Debug)]
pub struct ChildNode {
    parent: Arc<dyn AssemblyNode>,
}

impl ChildNode {
    pub fn new(parent: Arc<dyn AssemblyNode>) -> Self {
        Self { parent }
    }
}

impl AssemblyNode for ChildNode {
    fn unique_id(&self) -> u64 {
        self.parent.unique_id()
    }

    fn prefix(&self) -> &str {
        ""
    }

    fn separator(&self) -> &str {
        ""
    }

    fn pre_open(&self) -> &str {
        ""
    }

    fn open(&self) -> &str {
        ""
    }

    fn close(&self) -> &str {
        self.parent.close()
    }

    fn post_close(&self) -> &str {
        self.parent.post_close()
    }
}
