use crate::error::{Error, Result};
use crate::weight::WeightPolicy;
use hashbrown::HashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

/// Representation of a page id. Ids are dense, assigned in first-seen order
/// starting at 1. The value 0 is never assigned; a u32 is sufficient for any
/// realistic document collection and keeps the edge set compact.
pub type PageId = u32;

/// Redirect chains are followed at most this many steps before the walk is
/// treated as circular.
const MAX_REDIRECT_CHAIN: usize = 20;

/// An in-memory link graph: an interner mapping page names to dense ids, the
/// set of declared pages, a weighted edge multiset and a redirect table.
///
/// The interner, edge set, redirect table and declared set only grow during
/// ingestion. [`Graph::reduce`] produces a fresh graph keyed by declared
/// pages only; the source graph is left untouched.
#[derive(Debug, Default)]
pub struct Graph {
    names: HashMap<Vec<u8>, PageId>,
    names_inv: Vec<Vec<u8>>,
    declared: BTreeSet<PageId>,
    links: BTreeMap<(PageId, PageId), u32>,
    redirects: BTreeMap<PageId, PageId>,
    max_from: PageId,
    max_to: PageId,
}

impl Graph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of interned pages.
    #[must_use]
    pub fn page_count(&self) -> PageId {
        self.names_inv.len() as PageId
    }

    /// Number of distinct edge records.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Number of redirect entries.
    #[must_use]
    pub fn redirect_count(&self) -> usize {
        self.redirects.len()
    }

    /// Largest id observed as a link source.
    #[must_use]
    pub fn max_from(&self) -> PageId {
        self.max_from
    }

    /// Largest id observed as a link destination.
    #[must_use]
    pub fn max_to(&self) -> PageId {
        self.max_to
    }

    /// Look up a page by name.
    #[must_use]
    pub fn get(&self, name: &[u8]) -> Option<PageId> {
        self.names.get(name).copied()
    }

    /// Look up a page by name, interning it if unseen. A true `is_declared`
    /// adds the page to the declared set; membership there is monotonic.
    pub fn get_or_create(&mut self, name: &[u8], is_declared: bool) -> PageId {
        let id = match self.names.get(name) {
            Some(&id) => id,
            None => {
                let id = self.names_inv.len() as PageId + 1;
                self.names_inv.push(name.to_vec());
                self.names.insert(name.to_vec(), id);
                id
            }
        };
        if is_declared {
            self.declared.insert(id);
        }
        id
    }

    /// Name of a page. The `i`-th interned name belongs to id `i + 1`.
    pub fn name_of(&self, id: PageId) -> Result<&[u8]> {
        if id == 0 || id as usize > self.names_inv.len() {
            return Err(Error::Range("name_of"));
        }
        Ok(&self.names_inv[id as usize - 1])
    }

    #[must_use]
    pub fn is_declared(&self, id: PageId) -> bool {
        self.declared.contains(&id)
    }

    /// Declared pages in ascending id order.
    pub fn declared_pages(&self) -> impl Iterator<Item = PageId> + '_ {
        self.declared.iter().copied()
    }

    #[must_use]
    pub fn declared_count(&self) -> usize {
        self.declared.len()
    }

    /// Record a directed link. Re-declared edges accumulate multiplicity.
    pub fn add_link(&mut self, from: PageId, to: PageId, cnt: u32) -> Result<()> {
        self.check_id(from, "add_link")?;
        self.check_id(to, "add_link")?;
        *self.links.entry((from, to)).or_insert(0) += cnt;
        if from > self.max_from {
            self.max_from = from;
        }
        if to > self.max_to {
            self.max_to = to;
        }
        Ok(())
    }

    /// Record a redirect. Self-redirects are silently discarded; a repeated
    /// definition for the same source overwrites the earlier target.
    pub fn define_redirect(&mut self, from: PageId, to: PageId) -> Result<()> {
        self.check_id(from, "define_redirect")?;
        self.check_id(to, "define_redirect")?;
        if from != to {
            self.redirects.insert(from, to);
        }
        Ok(())
    }

    #[must_use]
    pub fn redirect_of(&self, page: PageId) -> Option<PageId> {
        self.redirects.get(&page).copied()
    }

    /// Edge records in ascending (from, to) order. Same-source records are
    /// contiguous; the reducer and weighter rely on this.
    pub fn edges(&self) -> impl Iterator<Item = (PageId, PageId, u32)> + '_ {
        self.links.iter().map(|(&(from, to), &cnt)| (from, to, cnt))
    }

    /// Follow the redirect table from `page`, bounded and cycle tolerant.
    /// The walk remembers the smallest declared id it visits (seeded with
    /// `page` itself); if it is still inside the table when it stops, that
    /// minimum is the result, otherwise the final target is.
    #[must_use]
    pub fn resolve_chain(&self, page: PageId) -> PageId {
        let mut current = page;
        let mut minimum = page;
        let mut steps = 0;
        let mut next = self.redirects.get(&current);
        while let Some(&target) = next {
            if target == minimum || steps >= MAX_REDIRECT_CHAIN {
                break;
            }
            steps += 1;
            current = target;
            if current < minimum && self.declared.contains(&current) {
                minimum = current;
            }
            next = self.redirects.get(&current);
        }
        if next.is_some() {
            // Circular reference: take the smallest declared entry found on
            // the walk, or the starting page when none was declared.
            minimum
        } else {
            current
        }
    }

    /// Single-step resolution anchored on declared pages: declared ids map
    /// to themselves, one redirect hop is taken only when its target is
    /// declared, anything else is left as-is.
    #[must_use]
    pub fn resolve_declared(&self, page: PageId) -> PageId {
        if self.declared.contains(&page) {
            return page;
        }
        if let Some(&target) = self.redirects.get(&page) {
            if self.declared.contains(&target) {
                return target;
            }
        }
        page
    }

    /// Contract the graph onto its declared pages, folding redirects in.
    ///
    /// Under the pagerank policy both edge endpoints are resolved through
    /// [`Graph::resolve_chain`]; under the indegree policy only the
    /// destination is resolved, through [`Graph::resolve_declared`]. Edges
    /// with an undeclared endpoint after resolution are dropped, the rest
    /// keep their summed multiplicities. The result carries no redirects and
    /// numbers the declared pages in ascending order of their old ids.
    pub fn reduce(&self, policy: WeightPolicy) -> Result<Graph> {
        let mut contracted: BTreeMap<(PageId, PageId), u32> = BTreeMap::new();
        for (from, to, cnt) in self.edges() {
            let key = match policy {
                WeightPolicy::PageRank => (self.resolve_chain(from), self.resolve_chain(to)),
                WeightPolicy::InDegree => (from, self.resolve_declared(to)),
            };
            *contracted.entry(key).or_insert(0) += cnt;
        }

        let mut reduced = Graph::new();
        for &id in &self.declared {
            let name = self.name_of(id)?;
            reduced.get_or_create(name, true);
        }
        for ((from, to), cnt) in contracted {
            let from = reduced.get(self.name_of(from)?);
            let to = reduced.get(self.name_of(to)?);
            if let (Some(from), Some(to)) = (from, to) {
                reduced.add_link(from, to, cnt)?;
            }
        }
        Ok(reduced)
    }

    /// Write canonicalizing redirect entries to a sink, one
    /// `<from-name>\t<to-name>` line per entry whose source is undeclared
    /// and whose target is declared, in ascending source id order.
    pub fn dump_redirects<W: Write>(&self, sink: &mut W) -> Result<()> {
        for (&from, &to) in &self.redirects {
            if !self.declared.contains(&from) && self.declared.contains(&to) {
                sink.write_all(self.name_of(from)?)?;
                sink.write_all(b"\t")?;
                sink.write_all(self.name_of(to)?)?;
                sink.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    fn check_id(&self, id: PageId, operation: &'static str) -> Result<()> {
        if id == 0 || id as usize > self.names_inv.len() {
            return Err(Error::Range(operation));
        }
        Ok(())
    }
}
