use serde::{Deserialize, Serialize};

use crate::config::ClassifierConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Gateway,
    Anchor,
    Mobile,
    Standard,
}

impl NodeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::Anchor => "anchor",
            Self::Mobile => "mobile",
            Self::Standard => "standard",
        }
    }
}

/// Decides a node's kind from its id. Called exactly once, when the node is created.
pub trait NodeClassifier: Send {
    fn classify(&self, id: &str) -> NodeKind;
}

/// Classifies by exact gateway ids and `<prefix><digits>` patterns.
#[derive(Clone, Debug, Default)]
pub struct PatternClassifier {
    config: ClassifierConfig,
}

impl PatternClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }
}

fn has_numbered_prefix(id: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| {
        id.strip_prefix(prefix.as_str())
            .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|byte| byte.is_ascii_digit()))
    })
}

impl NodeClassifier for PatternClassifier {
    fn classify(&self, id: &str) -> NodeKind {
        if self.config.gateway_ids.iter().any(|gateway| gateway == id) {
            NodeKind::Gateway
        } else if has_numbered_prefix(id, &self.config.mobile_prefixes) {
            NodeKind::Mobile
        } else if has_numbered_prefix(id, &self.config.anchor_prefixes) {
            NodeKind::Anchor
        } else {
            NodeKind::Standard
        }
    }
}
