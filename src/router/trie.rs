//! Radix-ish trie path matcher.
//!
//! Grounded on the source's `psygo/trie.go`: a node holds one path segment
//! (`part`), the full pattern it terminates (set only on terminal nodes),
//! and whether the segment is wild (`:name` or `*name`). Mutation happens
//! once at route-registration time (see [`crate::router::engine::Engine`]),
//! so lookups need no synchronization, preserve that, don't add a lock
//! here.

/// One node of the trie. A non-terminal node has an empty `pattern`; a
/// matched node with an empty pattern is treated as a miss (mirrors the
/// source's `n.pattern == ""` check).
#[derive(Debug, Default)]
pub struct Node {
    part: String,
    pattern: String,
    is_wild: bool,
    children: Vec<Node>,
}

impl Node {
    fn new(part: String) -> Self {
        let is_wild = part.starts_with(':') || part.starts_with('*');
        Self { part, is_wild, pattern: String::new(), children: Vec::new() }
    }

    /// First child matching `part` exactly, or the first wild child,
    /// used only during insertion.
    fn match_child(&mut self, part: &str) -> Option<&mut Node> {
        self.children.iter().position(|c| c.part == part || c.is_wild).map(move |i| &mut self.children[i])
    }

    /// All children that could match `part` at lookup time: exact matches
    /// and every wild child, in insertion order. This is what makes lookup
    /// deterministic; ties break by insertion order.
    fn match_children(&self, part: &str) -> Vec<&Node> {
        self.children.iter().filter(|c| c.part == part || c.is_wild).collect()
    }

    /// Insert `pattern` (already split into `parts`) starting at `height`.
    pub fn insert(&mut self, pattern: &str, parts: &[&str], height: usize) {
        if parts.len() == height {
            self.pattern = pattern.to_string();
            return;
        }
        let part = parts[height];
        if self.match_child(part).is_none() {
            self.children.push(Node::new(part.to_string()));
        }
        let child = self.match_child(part).expect("just inserted or already present");
        child.insert(pattern, parts, height + 1);
    }

    /// Search for `parts` starting at `height`. Returns the first
    /// descendant whose terminal pattern is non-empty, following children
    /// in insertion order (first winning branch wins, matches the
    /// source's depth-first `for _, child := range children`).
    pub fn search(&self, parts: &[&str], height: usize) -> Option<&Node> {
        if parts.len() == height || self.part.starts_with('*') {
            return if self.pattern.is_empty() { None } else { Some(self) };
        }
        let part = parts[height];
        for child in self.match_children(part) {
            if let Some(found) = child.search(parts, height + 1) {
                return Some(found);
            }
        }
        None
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Split a route pattern on `/`, dropping empty segments. A segment
/// starting with `*` truncates the list, catch-alls must be terminal.
pub fn parse_pattern(pattern: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    for item in pattern.split('/') {
        if item.is_empty() {
            continue;
        }
        parts.push(item);
        if item.starts_with('*') {
            break;
        }
    }
    parts
}

/// Zip a matched terminal's pattern against the request's actual segments
/// to recover `:name` and `*name` captures. A `*name` segment consumes the
/// remainder of the path, joined by `/`.
pub fn extract_params(matched_pattern: &str, request_parts: &[&str]) -> std::collections::HashMap<String, String> {
    let mut params = std::collections::HashMap::new();
    for (index, part) in parse_pattern(matched_pattern).into_iter().enumerate() {
        if let Some(name) = part.strip_prefix(':') {
            if let Some(value) = request_parts.get(index) {
                params.insert(name.to_string(), value.to_string());
            }
        } else if let Some(name) = part.strip_prefix('*') {
            if !name.is_empty() {
                params.insert(name.to_string(), request_parts[index..].join("/"));
            }
            break;
        }
    }
    params
}
