//! Forest of classifiers linked by their parent cell types.
use std::collections::{HashMap, HashSet, VecDeque};

use crate::classifier::CellTypeClassifier;
use crate::error::{ClassifierError, Result};
use crate::models::ClassifierModel;
use crate::population::CellPopulation;

/// Why a classifier could not be attached to any tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetachReason {
    /// The named ancestor is not among the loaded classifiers.
    UnresolvedParent(String),
    /// The parent chain loops back on itself.
    Cycle,
}

/// Taxonomy derived from a set of loaded classifiers.
///
/// Classifiers whose parent chain does not reach a root are kept aside as
/// detached; they are never evaluated.
#[derive(Debug)]
pub struct Taxonomy<'a, M> {
    nodes: Vec<&'a CellTypeClassifier<M>>,
    index: HashMap<&'a str, usize>,
    children: Vec<Vec<usize>>,
    depth: Vec<Option<usize>>,
    roots: Vec<usize>,
    detached: Vec<(usize, DetachReason)>,
}

impl<'a, M: ClassifierModel> Taxonomy<'a, M> {
    pub fn build(classifiers: &'a [CellTypeClassifier<M>]) -> Result<Self> {
        Self::from_refs(classifiers.iter().collect())
    }

    /// Fails with `Validation` when two classifiers share a cell type.
    pub fn from_refs(nodes: Vec<&'a CellTypeClassifier<M>>) -> Result<Self> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.cell_type(), i).is_some() {
                return Err(ClassifierError::Validation(format!(
                    "cell type '{}' is defined more than once",
                    node.cell_type()
                )));
            }
        }

        let mut children = vec![Vec::new(); nodes.len()];
        let mut roots = Vec::new();
        for (i, node) in nodes.iter().enumerate() {
            match node.parent_type() {
                None => roots.push(i),
                Some(parent) => {
                    if let Some(&p) = index.get(parent) {
                        children[p].push(i);
                    }
                }
            }
        }

        let mut depth = vec![None; nodes.len()];
        let mut queue: VecDeque<usize> = roots.iter().copied().collect();
        for &r in &roots {
            depth[r] = Some(0);
        }
        while let Some(i) = queue.pop_front() {
            let d = depth[i].unwrap_or(0);
            for &c in &children[i] {
                if depth[c].is_none() {
                    depth[c] = Some(d + 1);
                    queue.push_back(c);
                }
            }
        }

        let mut detached = Vec::new();
        for i in 0..nodes.len() {
            if depth[i].is_some() {
                continue;
            }
            let reason = detach_reason(&nodes, &index, i);
            log::warn!(
                "Classifier '{}' is not reachable from a root: {:?}",
                nodes[i].cell_type(),
                reason
            );
            detached.push((i, reason));
        }

        Ok(Taxonomy {
            nodes,
            index,
            children,
            depth,
            roots,
            detached,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, cell_type: &str) -> Option<&'a CellTypeClassifier<M>> {
        self.index.get(cell_type).map(|&i| self.nodes[i])
    }

    pub fn roots(&self) -> Vec<&'a CellTypeClassifier<M>> {
        self.roots.iter().map(|&i| self.nodes[i]).collect()
    }

    pub fn children(&self, cell_type: &str) -> Vec<&'a CellTypeClassifier<M>> {
        self.index
            .get(cell_type)
            .map(|&i| self.children[i].iter().map(|&c| self.nodes[c]).collect())
            .unwrap_or_default()
    }

    /// Depth below the root (roots are 0); `None` for detached or unknown types.
    pub fn depth(&self, cell_type: &str) -> Option<usize> {
        self.index.get(cell_type).and_then(|&i| self.depth[i])
    }

    pub fn detached(&self) -> Vec<(&'a str, &DetachReason)> {
        self.detached
            .iter()
            .map(|(i, reason)| (self.nodes[*i].cell_type(), reason))
            .collect()
    }

    /// Classifiers from the root down to `cell_type` (inclusive).
    pub fn lineage(&self, cell_type: &str) -> Result<Vec<&'a CellTypeClassifier<M>>> {
        let &start = self
            .index
            .get(cell_type)
            .ok_or_else(|| ClassifierError::NotFound(cell_type.to_string()))?;
        if let Some((_, reason)) = self.detached.iter().find(|(i, _)| *i == start) {
            return Err(ClassifierError::Data(format!(
                "parent chain of '{}' cannot be resolved: {:?}",
                cell_type, reason
            )));
        }

        let mut chain = vec![self.nodes[start]];
        let mut current = self.nodes[start];
        while let Some(parent) = current.parent_type() {
            current = self.nodes[self.index[parent]];
            chain.push(current);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Ancestors of `cell_type`, root first, without the type itself.
    pub fn ancestors(&self, cell_type: &str) -> Result<Vec<&'a CellTypeClassifier<M>>> {
        let mut chain = self.lineage(cell_type)?;
        chain.pop();
        Ok(chain)
    }

    /// True when `ancestor` lies strictly above `descendant` in one tree.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        let mut seen = HashSet::new();
        let mut current = self.get(descendant).and_then(|c| c.parent_type());
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            if !seen.insert(name) {
                return false;
            }
            current = self.get(name).and_then(|c| c.parent_type());
        }
        false
    }

    pub(crate) fn root_ids(&self) -> &[usize] {
        &self.roots
    }

    pub(crate) fn child_ids(&self, node: usize) -> &[usize] {
        &self.children[node]
    }

    pub(crate) fn node(&self, node: usize) -> &'a CellTypeClassifier<M> {
        self.nodes[node]
    }

    pub(crate) fn node_depth(&self, node: usize) -> usize {
        self.depth[node].unwrap_or(0)
    }
}

fn detach_reason<M: ClassifierModel>(
    nodes: &[&CellTypeClassifier<M>],
    index: &HashMap<&str, usize>,
    start: usize,
) -> DetachReason {
    let mut seen = HashSet::new();
    let mut current = start;
    loop {
        if !seen.insert(current) {
            return DetachReason::Cycle;
        }
        match nodes[current].parent_type() {
            None => return DetachReason::Cycle,
            Some(parent) => match index.get(parent) {
                Some(&p) => current = p,
                None => return DetachReason::UnresolvedParent(parent.to_string()),
            },
        }
    }
}

/// Per-cell flag: does the cell pass every classifier of `lineage`?
///
/// `lineage` runs root first. Each classifier only scores the cells that
/// passed all classifiers before it.
pub fn lineage_positive<M, P>(
    lineage: &[&CellTypeClassifier<M>],
    population: &P,
    assay: Option<&str>,
) -> Result<Vec<bool>>
where
    M: ClassifierModel,
    P: CellPopulation + ?Sized,
{
    let mut passed = vec![true; population.n_cells()];
    let mut active: Vec<usize> = (0..population.n_cells()).collect();

    for classifier in lineage {
        if active.is_empty() {
            break;
        }
        let proba = classifier.predict_proba(population, assay, Some(&active))?;
        let mut still_active = Vec::with_capacity(active.len());
        for (&cell, &p) in active.iter().zip(&proba) {
            if classifier.is_positive(p) {
                still_active.push(cell);
            } else {
                passed[cell] = false;
            }
        }
        log::debug!(
            "'{}' keeps {} of {} cells",
            classifier.cell_type(),
            still_active.len(),
            active.len()
        );
        active = still_active;
    }

    Ok(passed)
}
