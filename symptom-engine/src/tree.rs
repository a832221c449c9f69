//! The trained classification tree: node representation, loading from a
//! fitted-tree artifact, structural validation, and whole-vector prediction.
//!
//! Nodes live in a flat vector and refer to their children by index, with the
//! root at index 0. A tree is immutable once built and can be shared freely.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::{debug, info, warn};

use crate::{
    catalog::SymptomCatalog,
    encoder::FeatureVector,
    error::{DiagnosisError, Result},
};

/// Index of a node within a [`ClassificationTree`]
pub type NodeId = usize;

/// Sentinel in `feature` marking a leaf in the artifact arrays
pub const FEATURE_LEAF_SENTINEL: i64 = -2;
/// Sentinel in `children_left` / `children_right` for a leaf
pub const CHILD_LEAF_SENTINEL: i64 = -1;
/// Split threshold used for binary features when the artifact omits one
pub const DEFAULT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Goes to `right` when the feature value exceeds `threshold`, else to `left`
    Split {
        feature: usize,
        threshold: f64,
        left: NodeId,
        right: NodeId,
    },
    Leaf { label: String },
}

impl TreeNode {
    pub fn split(feature: usize, left: NodeId, right: NodeId) -> Self {
        TreeNode::Split {
            feature,
            threshold: DEFAULT_THRESHOLD,
            left,
            right,
        }
    }

    pub fn leaf(label: impl Into<String>) -> Self {
        TreeNode::Leaf {
            label: label.into(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }
}

/// Binary features are 0 or 1, so a split is only meaningful when 0 falls on
/// the left and 1 on the right.
fn separates_binary_values(threshold: f64) -> bool {
    (0.0..1.0).contains(&threshold)
}

/// A fitted decision tree in parallel-array form, as exported from
/// scikit-learn's `tree_` attribute.
///
/// `value[i]` holds the class distribution of node `i`'s training samples,
/// ordered like `classes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeArtifact {
    pub classes: Vec<String>,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub feature: Vec<i64>,
    #[serde(default)]
    pub threshold: Option<Vec<f64>>,
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub value: Vec<Vec<f64>>,
}

impl TreeArtifact {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| DiagnosisError::DataFormat(format!("invalid tree artifact: {}", e)))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content).map_err(|e| match e {
            DiagnosisError::DataFormat(msg) => {
                DiagnosisError::DataFormat(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Converts the arrays into nodes, resolving each leaf to its majority class.
    fn into_nodes(self, catalog: &SymptomCatalog) -> Result<Vec<TreeNode>> {
        let node_count = self.feature.len();
        let threshold_count = self.threshold.as_ref().map_or(node_count, Vec::len);
        if self.children_left.len() != node_count
            || self.children_right.len() != node_count
            || self.value.len() != node_count
            || threshold_count != node_count
        {
            return Err(DiagnosisError::DataFormat(format!(
                "tree artifact arrays disagree on node count (feature={}, children_left={}, children_right={}, value={}, threshold={})",
                node_count,
                self.children_left.len(),
                self.children_right.len(),
                self.value.len(),
                threshold_count
            )));
        }
        if self.classes.is_empty() {
            return Err(DiagnosisError::DataFormat(
                "tree artifact lists no classes".to_string(),
            ));
        }
        if let Some(names) = &self.feature_names {
            if names.as_slice() != catalog.as_slice() {
                return Err(DiagnosisError::DataFormat(
                    "tree artifact feature names do not match the symptom catalog".to_string(),
                ));
            }
        }

        let mut nodes = Vec::with_capacity(node_count);
        for node_idx in 0..node_count {
            let feature = self.feature[node_idx];
            if feature == FEATURE_LEAF_SENTINEL {
                let class = majority_class(&self.value[node_idx], self.classes.len())
                    .ok_or_else(|| {
                        DiagnosisError::DataFormat(format!(
                            "leaf {} has {} class values, expected {}",
                            node_idx,
                            self.value[node_idx].len(),
                            self.classes.len()
                        ))
                    })?;
                nodes.push(TreeNode::leaf(self.classes[class].clone()));
                continue;
            }

            let feature = usize::try_from(feature).map_err(|_| {
                DiagnosisError::DataFormat(format!(
                    "node {} has invalid feature index {}",
                    node_idx, feature
                ))
            })?;
            let left = child_index(self.children_left[node_idx], node_idx, "left")?;
            let right = child_index(self.children_right[node_idx], node_idx, "right")?;
            let threshold = self
                .threshold
                .as_ref()
                .map_or(DEFAULT_THRESHOLD, |t| t[node_idx]);
            if !separates_binary_values(threshold) {
                return Err(DiagnosisError::DataFormat(format!(
                    "node {} has threshold {} outside [0, 1)",
                    node_idx, threshold
                )));
            }

            nodes.push(TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            });
        }

        Ok(nodes)
    }
}

/// Index of the largest value; ties go to the lower class index.
fn majority_class(values: &[f64], num_classes: usize) -> Option<usize> {
    if values.len() != num_classes {
        return None;
    }
    let mut best: Option<(usize, f64)> = None;
    for (class_idx, &value) in values.iter().enumerate() {
        if best.is_none_or(|(_, best_value)| value > best_value) {
            best = Some((class_idx, value));
        }
    }
    best.map(|(class_idx, _)| class_idx)
}

fn child_index(raw: i64, node_idx: usize, side: &str) -> Result<NodeId> {
    if raw == CHILD_LEAF_SENTINEL {
        return Err(DiagnosisError::DataFormat(format!(
            "internal node {} is missing its {} child",
            node_idx, side
        )));
    }
    usize::try_from(raw).map_err(|_| {
        DiagnosisError::DataFormat(format!(
            "node {} has invalid {} child index {}",
            node_idx, side, raw
        ))
    })
}

/// A validated binary decision tree over the symptom catalog
#[derive(Debug, Clone)]
pub struct ClassificationTree {
    nodes: Vec<TreeNode>,
    feature_names: Vec<String>,
}

impl ClassificationTree {
    pub const ROOT: NodeId = 0;

    /// Builds a tree from nodes, validating it against the catalog.
    ///
    /// The tree must be non-empty, every split must name a catalog feature and
    /// two existing children, and every node reachable from the root must be
    /// reached exactly once. Unreachable nodes are tolerated.
    pub fn new(nodes: Vec<TreeNode>, catalog: &SymptomCatalog) -> Result<Self> {
        let tree = Self {
            nodes,
            feature_names: catalog.as_slice().to_vec(),
        };
        tree.validate()?;
        Ok(tree)
    }

    pub fn from_artifact(artifact: TreeArtifact, catalog: &SymptomCatalog) -> Result<Self> {
        let nodes = artifact.into_nodes(catalog)?;
        Self::new(nodes, catalog)
    }

    pub fn load(path: impl AsRef<Path>, catalog: &SymptomCatalog) -> Result<Self> {
        let path = path.as_ref();
        let tree = Self::from_artifact(TreeArtifact::from_json_file(path)?, catalog)?;
        info!(
            path = %path.display(),
            nodes = tree.len(),
            leaves = tree.labels().count(),
            "Loaded classification tree"
        );
        Ok(tree)
    }

    fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(DiagnosisError::DataFormat(
                "classification tree has no nodes".to_string(),
            ));
        }

        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![Self::ROOT];
        while let Some(node_id) = stack.pop() {
            if visited[node_id] {
                return Err(DiagnosisError::DataFormat(format!(
                    "node {} is reachable along more than one path",
                    node_id
                )));
            }
            visited[node_id] = true;

            match &self.nodes[node_id] {
                TreeNode::Leaf { label } => {
                    if label.is_empty() {
                        return Err(DiagnosisError::DataFormat(format!(
                            "leaf {} has an empty label",
                            node_id
                        )));
                    }
                }
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if !separates_binary_values(*threshold) {
                        return Err(DiagnosisError::DataFormat(format!(
                            "node {} has threshold {} outside [0, 1)",
                            node_id, threshold
                        )));
                    }
                    if *feature >= self.feature_names.len() {
                        return Err(DiagnosisError::DataFormat(format!(
                            "node {} splits on feature {} but the catalog has {} symptoms",
                            node_id,
                            feature,
                            self.feature_names.len()
                        )));
                    }
                    for child in [*left, *right] {
                        if child >= self.nodes.len() {
                            return Err(DiagnosisError::DataFormat(format!(
                                "node {} points at missing child {}",
                                node_id, child
                            )));
                        }
                        stack.push(child);
                    }
                }
            }
        }

        let unreachable = visited.iter().filter(|seen| !**seen).count();
        if unreachable > 0 {
            warn!(unreachable, "Classification tree contains unreachable nodes");
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    /// Number of features the tree expects in a vector
    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// Symptom name a feature index stands for
    pub fn symptom(&self, feature: usize) -> Option<&str> {
        self.feature_names.get(feature).map(String::as_str)
    }

    /// Labels of all leaves, in node order; a label can repeat.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().filter_map(|node| match node {
            TreeNode::Leaf { label } => Some(label.as_str()),
            TreeNode::Split { .. } => None,
        })
    }

    /// `(left, right)` children of a split node: absent, then present
    pub fn children(&self, id: NodeId) -> Option<(NodeId, NodeId)> {
        match self.nodes.get(id)? {
            TreeNode::Split { left, right, .. } => Some((*left, *right)),
            TreeNode::Leaf { .. } => None,
        }
    }

    /// Walks from the root to a leaf and returns the leaf's label.
    pub fn predict(&self, vector: &FeatureVector) -> Result<&str> {
        if vector.len() != self.feature_count() {
            return Err(DiagnosisError::VectorLength {
                expected: self.feature_count(),
                actual: vector.len(),
            });
        }

        let mut current = Self::ROOT;
        loop {
            match &self.nodes[current] {
                TreeNode::Leaf { label } => {
                    debug!(leaf = current, label = %label, "Prediction reached leaf");
                    return Ok(label);
                }
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = f64::from(vector.get(*feature));
                    current = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }
}
