//! Interactive diagnosis: walks the classification tree one yes/no question at
//! a time.
//!
//! A [`TraversalState`] belongs to a single caller. It only stores a node index
//! and the affirmed symptoms, so any number of sessions can share one tree.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{DiagnosisError, Result},
    tree::{ClassificationTree, NodeId, TreeNode},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    Yes,
    No,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum TraversalStatus {
    /// Waiting for an answer about the split at this node
    Asking(NodeId),
    /// Reached a leaf with this label
    Resolved(String),
}

/// The question asked at a split node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub node: NodeId,
    pub symptom: String,
    pub prompt: String,
}

impl Question {
    fn new(node: NodeId, symptom: &str) -> Self {
        Self {
            node,
            symptom: symptom.to_string(),
            prompt: format!("Is {} present?", symptom.replace('_', " ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalState {
    current_node: NodeId,
    affirmed_symptoms: Vec<String>,
    status: TraversalStatus,
}

impl TraversalState {
    /// A fresh traversal positioned at the root.
    pub fn start(tree: &ClassificationTree) -> Self {
        let mut state = Self {
            current_node: ClassificationTree::ROOT,
            affirmed_symptoms: Vec::new(),
            status: TraversalStatus::Asking(ClassificationTree::ROOT),
        };
        state.settle(tree);
        state
    }

    /// Returns to the root and forgets every answer.
    pub fn restart(&mut self, tree: &ClassificationTree) {
        *self = Self::start(tree);
    }

    pub fn status(&self) -> &TraversalStatus {
        &self.status
    }

    pub fn current_node(&self) -> NodeId {
        self.current_node
    }

    /// Symptoms answered "yes", in the order they were asked
    pub fn affirmed_symptoms(&self) -> &[String] {
        &self.affirmed_symptoms
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.status, TraversalStatus::Resolved(_))
    }

    pub fn resolved_label(&self) -> Option<&str> {
        match &self.status {
            TraversalStatus::Resolved(label) => Some(label),
            TraversalStatus::Asking(_) => None,
        }
    }

    /// The question for the current node. Fails once resolved.
    pub fn current_question(&self, tree: &ClassificationTree) -> Result<Question> {
        let (_, feature) = self.asking_split(tree)?;
        let symptom = tree.symptom(feature).ok_or_else(|| {
            DiagnosisError::InvalidState(format!(
                "node {} splits on unknown feature {}",
                self.current_node, feature
            ))
        })?;
        Ok(Question::new(self.current_node, symptom))
    }

    /// Affirms the current symptom and moves to the right child.
    pub fn answer_yes(&mut self, tree: &ClassificationTree) -> Result<&TraversalStatus> {
        let question = self.current_question(tree)?;
        let (_, right) = self.children(tree)?;
        self.affirmed_symptoms.push(question.symptom);
        self.advance(tree, right);
        Ok(&self.status)
    }

    /// Denies the current symptom and moves to the left child.
    pub fn answer_no(&mut self, tree: &ClassificationTree) -> Result<&TraversalStatus> {
        self.asking_split(tree)?;
        let (left, _) = self.children(tree)?;
        self.advance(tree, left);
        Ok(&self.status)
    }

    pub fn answer(&mut self, tree: &ClassificationTree, answer: Answer) -> Result<&TraversalStatus> {
        match answer {
            Answer::Yes => self.answer_yes(tree),
            Answer::No => self.answer_no(tree),
        }
    }

    /// The split node this state is asking about, with its feature index.
    fn asking_split(&self, tree: &ClassificationTree) -> Result<(NodeId, usize)> {
        if let TraversalStatus::Resolved(label) = &self.status {
            return Err(DiagnosisError::InvalidState(format!(
                "traversal already resolved to '{}'",
                label
            )));
        }
        match tree.node(self.current_node) {
            Some(TreeNode::Split { feature, .. }) => Ok((self.current_node, *feature)),
            Some(TreeNode::Leaf { .. }) => Err(DiagnosisError::InvalidState(format!(
                "node {} is a leaf but the traversal is still asking",
                self.current_node
            ))),
            None => Err(DiagnosisError::InvalidState(format!(
                "node {} does not exist in this tree",
                self.current_node
            ))),
        }
    }

    fn children(&self, tree: &ClassificationTree) -> Result<(NodeId, NodeId)> {
        tree.children(self.current_node).ok_or_else(|| {
            DiagnosisError::InvalidState(format!("node {} has no children", self.current_node))
        })
    }

    fn advance(&mut self, tree: &ClassificationTree, next: NodeId) {
        self.current_node = next;
        self.status = TraversalStatus::Asking(next);
        self.settle(tree);
    }

    /// Resolves the state if the current node is a leaf.
    fn settle(&mut self, tree: &ClassificationTree) {
        if let Some(TreeNode::Leaf { label }) = tree.node(self.current_node) {
            debug!(
                node = self.current_node,
                label = %label,
                affirmed = self.affirmed_symptoms.len(),
                "Traversal resolved"
            );
            self.status = TraversalStatus::Resolved(label.clone());
        }
    }
}
