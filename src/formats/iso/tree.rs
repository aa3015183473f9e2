//! Lazily materialized directory tree.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. A
//! directory's extent is only read the first time the node is expanded.
//! Every parsed record is keyed by its content fingerprint, so a record
//! reachable through several directories resolves to one node.

use super::record::DirectoryRecord;
use crate::core::{ByteSource, SourceError, TreeError, WalkError};
use crate::domain::entities::WalkLimits;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Tree shared between threads that expand nodes on demand
pub type SharedTree<S> = Arc<Mutex<DirectoryTree<S>>>;

/// Index of a node in the tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub const fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
enum Expansion {
    Pending,
    Expanded(Vec<NodeId>),
    Failed(WalkError),
}

#[derive(Debug, Clone)]
struct Node {
    record: DirectoryRecord,
    expansion: Expansion,
}

/// Absolute byte range of a record's data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataExtent {
    pub offset: u64,
    pub len: u64,
}

/// One row handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeItem {
    pub node: NodeId,
    pub path: String,
    pub name: String,
    pub depth: usize,
    pub is_directory: bool,
    pub size: u32,
    pub extent: u32,
}

/// Receives the data extent of an opened item
pub trait OpenItemHandler {
    fn open_item(&mut self, path: &str, record: &DirectoryRecord, extent: DataExtent);
}

impl<F> OpenItemHandler for F
where
    F: FnMut(&str, &DirectoryRecord, DataExtent),
{
    fn open_item(&mut self, path: &str, record: &DirectoryRecord, extent: DataExtent) {
        self(path, record, extent)
    }
}

pub struct DirectoryTree<S> {
    source: S,
    base: u64,
    block_size: u32,
    limits: WalkLimits,
    nodes: Vec<Node>,
    by_fingerprint: HashMap<u64, NodeId>,
    root: NodeId,
    pending: VecDeque<TreeItem>,
}

impl<S: ByteSource> DirectoryTree<S> {
    /// Creates a tree whose only node is `root`. `base` is the absolute
    /// offset of the image start.
    pub fn new(
        source: S,
        base: u64,
        block_size: u32,
        root: DirectoryRecord,
        limits: WalkLimits,
    ) -> Self {
        let mut by_fingerprint = HashMap::new();
        by_fingerprint.insert(root.fingerprint, NodeId(0));
        Self {
            source,
            base,
            block_size,
            limits,
            nodes: vec![Node {
                record: root,
                expansion: Expansion::Pending,
            }],
            by_fingerprint,
            root: NodeId(0),
            pending: VecDeque::new(),
        }
    }

    /// Wraps the tree for concurrent expansion requests
    pub fn shared(self) -> SharedTree<S> {
        Arc::new(Mutex::new(self))
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of distinct records materialized so far
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn record(&self, node: NodeId) -> Option<&DirectoryRecord> {
        self.nodes.get(node.0).map(|n| &n.record)
    }

    /// Children of an already expanded node
    pub fn children(&self, node: NodeId) -> Option<&[NodeId]> {
        match &self.nodes.get(node.0)?.expansion {
            Expansion::Expanded(children) => Some(children),
            _ => None,
        }
    }

    pub fn lookup(&self, fingerprint: u64) -> Option<NodeId> {
        self.by_fingerprint.get(&fingerprint).copied()
    }

    /// Absolute byte range holding the data of `record`
    pub fn data_extent(&self, record: &DirectoryRecord) -> DataExtent {
        DataExtent {
            offset: self
                .base
                .saturating_add(u64::from(record.extent_location) * u64::from(self.block_size)),
            len: u64::from(record.data_length),
        }
    }

    /// Copies an extent out of the source. Nothing is allocated for an
    /// extent that runs past the end of the source.
    pub fn read_extent(&self, extent: DataExtent) -> Result<Vec<u8>, SourceError> {
        let out_of_range = || SourceError::OutOfRange {
            offset: extent.offset,
            len: usize::try_from(extent.len).unwrap_or(usize::MAX),
            size: self.source.len(),
        };
        if !self.source.contains(extent.offset, extent.len) {
            return Err(out_of_range());
        }
        let len = usize::try_from(extent.len).map_err(|_| out_of_range())?;
        let mut data = vec![0u8; len];
        self.source.read_exact_at(extent.offset, &mut data)?;
        Ok(data)
    }

    /// Reads and parses the directory extent of `node` once, then serves
    /// the cached child list. A failed expansion is remembered and leaves
    /// the node without children.
    pub fn expand_node(&mut self, node: NodeId) -> Result<&[NodeId], TreeError> {
        let entry = self.nodes.get(node.0).ok_or(TreeError::UnknownNode(node.0))?;
        let unexpanded = match &entry.expansion {
            Expansion::Failed(err) => return Err(TreeError::Unreadable(err.clone())),
            Expansion::Expanded(_) => None,
            Expansion::Pending if !entry.record.is_directory() => {
                return Err(TreeError::NotADirectory(node.0));
            }
            Expansion::Pending => Some(entry.record.clone()),
        };

        if let Some(record) = unexpanded {
            let expansion = match self.read_directory(&record) {
                Ok(children) => Expansion::Expanded(children),
                Err(err) => {
                    warn!(node = node.0, %err, "directory subtree unreadable");
                    Expansion::Failed(err)
                }
            };
            self.nodes[node.0].expansion = expansion;
        }

        match &self.nodes[node.0].expansion {
            Expansion::Expanded(children) => Ok(children),
            Expansion::Failed(err) => Err(TreeError::Unreadable(err.clone())),
            Expansion::Pending => Err(TreeError::UnknownNode(node.0)),
        }
    }

    fn read_directory(&mut self, dir: &DirectoryRecord) -> Result<Vec<NodeId>, WalkError> {
        let extent = self.data_extent(dir);
        if extent.len > self.limits.max_directory_bytes {
            return Err(WalkError::BudgetExhausted {
                what: "directory bytes",
                limit: self.limits.max_directory_bytes,
            });
        }
        let data = self
            .read_extent(extent)
            .map_err(|_| WalkError::Truncated {
                offset: extent.offset,
                len: extent.len,
            })?;

        let block = (self.block_size as usize).max(1);
        let mut children = Vec::new();
        let mut records = 0u64;
        let mut pos = 0usize;

        while pos < data.len() {
            // Records never straddle a block; a zero length byte pads to the next one
            if data[pos] == 0 {
                pos = (pos / block + 1) * block;
                continue;
            }

            let record = DirectoryRecord::parse(&data[pos..]).ok_or_else(|| {
                WalkError::invalid(
                    extent.offset + pos as u64,
                    format!("malformed directory record of {} bytes", data[pos]),
                )
            })?;
            pos += usize::from(record.length);

            if record.is_self() || record.is_parent() {
                continue;
            }

            records += 1;
            if records > self.limits.max_directory_records {
                return Err(WalkError::BudgetExhausted {
                    what: "directory records",
                    limit: self.limits.max_directory_records,
                });
            }

            trace!(name = %record.name(), fingerprint = record.fingerprint, "directory record");
            children.push(self.intern(record));
        }

        Ok(children)
    }

    fn intern(&mut self, record: DirectoryRecord) -> NodeId {
        if let Some(&id) = self.by_fingerprint.get(&record.fingerprint) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.by_fingerprint.insert(record.fingerprint, id);
        self.nodes.push(Node {
            record,
            expansion: Expansion::Pending,
        });
        id
    }

    /// Resolves a `/`-separated path from the root, expanding directories
    /// along the way.
    pub fn resolve(&mut self, path: &str) -> Option<NodeId> {
        let mut current = self.root;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            let children = self.expand_node(current).ok()?.to_vec();
            current = children
                .into_iter()
                .find(|&child| self.nodes[child.0].record.name() == part)?;
        }
        Some(current)
    }

    /// Queues the children of the directory at `path` for [`next_item`].
    ///
    /// Returns `false` when the path does not resolve, is not a directory,
    /// or its extent cannot be read.
    ///
    /// [`next_item`]: Self::next_item
    pub fn begin_iteration(&mut self, path: &str) -> bool {
        self.pending.clear();
        let Some(node) = self.resolve(path) else {
            debug!(path, "iteration path does not resolve");
            return false;
        };
        let children = match self.expand_node(node) {
            Ok(children) => children.to_vec(),
            Err(err) => {
                debug!(path, %err, "iteration not started");
                return false;
            }
        };

        let prefix = path.trim_end_matches('/');
        let depth = prefix.split('/').filter(|p| !p.is_empty()).count();
        for child in children {
            let item = self.item(child, prefix, depth);
            self.pending.push_back(item);
        }
        true
    }

    pub fn next_item(&mut self) -> Option<TreeItem> {
        self.pending.pop_front()
    }

    /// Expands `node` if it is a directory; returns whether it produced
    /// children.
    pub fn populate_item(&mut self, node: NodeId) -> bool {
        match self.nodes.get(node.0) {
            Some(n) if n.record.is_directory() => {}
            _ => return false,
        }
        self.expand_node(node)
            .map(|children| !children.is_empty())
            .unwrap_or(false)
    }

    /// Hands the data extent of `node` to the host.
    pub fn open_item(
        &self,
        path: &str,
        node: NodeId,
        host: &mut impl OpenItemHandler,
    ) -> Result<(), TreeError> {
        let record = self.record(node).ok_or(TreeError::UnknownNode(node.0))?;
        host.open_item(path, record, self.data_extent(record));
        Ok(())
    }

    /// Expands the whole tree depth-first, bounded by `max_path_depth`.
    ///
    /// Unreadable subtrees are skipped. A child that is also one of its own
    /// ancestors is listed but not descended into.
    pub fn walk_all(&mut self) -> Vec<TreeItem> {
        let mut out = Vec::new();
        let mut ancestors = vec![self.root];
        self.visit(self.root, String::new(), &mut ancestors, &mut out);
        out
    }

    fn visit(
        &mut self,
        dir: NodeId,
        prefix: String,
        ancestors: &mut Vec<NodeId>,
        out: &mut Vec<TreeItem>,
    ) {
        let depth = ancestors.len() - 1;
        if depth >= self.limits.max_path_depth {
            warn!(
                path = %prefix,
                limit = self.limits.max_path_depth,
                "path depth budget exhausted"
            );
            return;
        }
        let children = match self.expand_node(dir) {
            Ok(children) => children.to_vec(),
            Err(err) => {
                warn!(path = %prefix, %err, "skipping unreadable directory");
                return;
            }
        };

        for child in children {
            let item = self.item(child, &prefix, depth);
            let path = item.path.clone();
            let descend = item.is_directory;
            out.push(item);

            if !descend {
                continue;
            }
            if ancestors.contains(&child) {
                warn!(%path, "directory cycle, not descending");
                continue;
            }
            ancestors.push(child);
            self.visit(child, path, ancestors, out);
            ancestors.pop();
        }
    }

    fn item(&self, node: NodeId, prefix: &str, depth: usize) -> TreeItem {
        let record = &self.nodes[node.0].record;
        let name = record.name();
        TreeItem {
            node,
            path: format!("{prefix}/{name}"),
            name,
            depth,
            is_directory: record.is_directory(),
            size: record.data_length,
            extent: record.extent_location,
        }
    }
}
