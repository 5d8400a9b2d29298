use super::label::Label;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("label index {index} out of range for a set of {len} labels")]
    OutOfRange { index: usize, len: usize },
    #[error("label {0} cannot be its own parent")]
    SelfParent(usize),
    #[error("label {parent} already has a parent; only one level of nesting is supported")]
    NestedParent { parent: usize },
    #[error("label {child} is already a parent and cannot get a parent itself")]
    ChildIsParent { child: usize },
}

/// The labels built for one styled mesh of a tile or marker. Parent links
/// are indices into this set, so they can never point into another set.
#[derive(Debug, Clone, Default)]
pub struct LabelSet {
    labels: Vec<Label>,
}

impl LabelSet {
    pub fn new(labels: Vec<Label>) -> Self {
        Self { labels }
    }

    pub fn push(&mut self, label: Label) -> usize {
        self.labels.push(label);
        self.labels.len() - 1
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn labels_mut(&mut self) -> &mut [Label] {
        &mut self.labels
    }

    pub fn get(&self, index: usize) -> Option<&Label> {
        self.labels.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Label> {
        self.labels.get_mut(index)
    }

    /// Make `parent` occlude jointly with `child` (e.g. an icon and its
    /// caption). The child's anchors are offset by the parent's size.
    pub fn link_parent(&mut self, child: usize, parent: usize) -> Result<(), LinkError> {
        let len = self.labels.len();
        for index in [child, parent] {
            if index >= len {
                return Err(LinkError::OutOfRange { index, len });
            }
        }
        if child == parent {
            return Err(LinkError::SelfParent(child));
        }
        if self.labels[parent].parent().is_some() {
            return Err(LinkError::NestedParent { parent });
        }
        if self.labels.iter().any(|l| l.parent() == Some(child)) {
            return Err(LinkError::ChildIsParent { child });
        }
        let parent_dimension = self.labels[parent].dimension();
        self.labels[child].set_parent(parent, parent_dimension);
        Ok(())
    }
}
