//! Resource limits checked while composing node trees.
//!
//! Aliases are materialized as copies of the anchored subtree, so the node limit counts every
//! node an alias expands to. A few lines of nested aliases cannot grow into millions of nodes.

use std::collections::HashSet;

use saphyr_parser::Event;

/// Limits applied by the composer.
///
/// ```rust
/// use rendering_suffix::{Budget, Error};
///
/// let budget = Budget {
///     max_nodes: 10,
///     ..Budget::default()
/// };
/// let err = rendering_suffix::parse_with_budget("[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]", &budget)
///     .unwrap_err();
/// assert!(matches!(err, Error::Budget { .. }));
/// ```
#[derive(Clone, Debug)]
pub struct Budget {
    /// Maximum total parser events.
    pub max_events: usize,
    /// Maximum number of alias (`*ref`) events.
    pub max_aliases: usize,
    /// Maximum number of distinct anchors.
    pub max_anchors: usize,
    /// Maximum nesting of sequences and mappings.
    pub max_depth: usize,
    /// Maximum number of documents in one stream.
    pub max_documents: usize,
    /// Maximum number of nodes, counting every node an alias expands to.
    pub max_nodes: usize,
    /// Maximum total bytes of scalar text.
    pub max_total_scalar_bytes: usize,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_events: 1_000_000,
            max_aliases: 50_000,
            max_anchors: 50_000,
            max_depth: 2_000,
            max_documents: 1_024,
            max_nodes: 250_000,
            max_total_scalar_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Which limit was exceeded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BudgetBreach {
    Events { events: usize },
    Aliases { aliases: usize },
    Anchors { anchors: usize },
    Depth { depth: usize },
    Documents { documents: usize },
    /// Nodes including alias expansion.
    Nodes { nodes: usize },
    ScalarBytes { total_scalar_bytes: usize },
}

/// Counts events as the composer consumes them.
#[derive(Debug)]
pub(crate) struct BudgetEnforcer {
    budget: Budget,
    events: usize,
    aliases: usize,
    documents: usize,
    nodes: usize,
    depth: usize,
    total_scalar_bytes: usize,
    defined_anchors: HashSet<usize>,
}

impl BudgetEnforcer {
    pub(crate) fn new(budget: Budget) -> Self {
        Self {
            budget,
            events: 0,
            aliases: 0,
            documents: 0,
            nodes: 0,
            depth: 0,
            total_scalar_bytes: 0,
            defined_anchors: HashSet::new(),
        }
    }

    /// Account for one parser event. Alias expansion is charged separately by
    /// [`BudgetEnforcer::expand_alias`].
    pub(crate) fn observe(&mut self, ev: &Event) -> Result<(), BudgetBreach> {
        self.events += 1;
        if self.events > self.budget.max_events {
            return Err(BudgetBreach::Events { events: self.events });
        }
        match ev {
            Event::DocumentStart(..) => {
                self.documents += 1;
                if self.documents > self.budget.max_documents {
                    return Err(BudgetBreach::Documents {
                        documents: self.documents,
                    });
                }
            }
            Event::Alias(_) => {
                self.aliases += 1;
                if self.aliases > self.budget.max_aliases {
                    return Err(BudgetBreach::Aliases { aliases: self.aliases });
                }
            }
            Event::Scalar(value, _, anchor, _) => {
                self.add_nodes(1)?;
                self.total_scalar_bytes = self.total_scalar_bytes.saturating_add(value.len());
                if self.total_scalar_bytes > self.budget.max_total_scalar_bytes {
                    return Err(BudgetBreach::ScalarBytes {
                        total_scalar_bytes: self.total_scalar_bytes,
                    });
                }
                self.record_anchor(*anchor)?;
            }
            Event::SequenceStart(anchor, _) | Event::MappingStart(anchor, _) => {
                self.add_nodes(1)?;
                self.depth += 1;
                if self.depth > self.budget.max_depth {
                    return Err(BudgetBreach::Depth { depth: self.depth });
                }
                self.record_anchor(*anchor)?;
            }
            Event::SequenceEnd | Event::MappingEnd => {
                self.depth = self.depth.saturating_sub(1);
            }
            _ => {}
        }
        Ok(())
    }

    /// Charge the nodes an alias copies.
    pub(crate) fn expand_alias(&mut self, size: usize) -> Result<(), BudgetBreach> {
        self.add_nodes(size)
    }

    fn add_nodes(&mut self, n: usize) -> Result<(), BudgetBreach> {
        self.nodes = self.nodes.saturating_add(n);
        if self.nodes > self.budget.max_nodes {
            return Err(BudgetBreach::Nodes { nodes: self.nodes });
        }
        Ok(())
    }

    fn record_anchor(&mut self, anchor: usize) -> Result<(), BudgetBreach> {
        if anchor != 0 && self.defined_anchors.insert(anchor) {
            let anchors = self.defined_anchors.len();
            if anchors > self.budget.max_anchors {
                return Err(BudgetBreach::Anchors { anchors });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::parse_with_budget;
    use crate::error::Error;

    fn breach(input: &str, budget: Budget) -> BudgetBreach {
        match parse_with_budget(input, &budget) {
            Err(Error::Budget { breach, .. }) => breach,
            other => panic!("expected a budget breach, got {other:?}"),
        }
    }

    #[test]
    fn depth_limit() {
        let b = breach(
            "[[[[1]]]]",
            Budget {
                max_depth: 3,
                ..Budget::default()
            },
        );
        assert_eq!(b, BudgetBreach::Depth { depth: 4 });
    }

    #[test]
    fn alias_count_limit() {
        let b = breach(
            "a: &x 1\nb: [*x, *x, *x]\n",
            Budget {
                max_aliases: 2,
                ..Budget::default()
            },
        );
        assert_eq!(b, BudgetBreach::Aliases { aliases: 3 });
    }

    #[test]
    fn document_limit() {
        let b = breach(
            "--- 1\n--- 2\n--- 3\n",
            Budget {
                max_documents: 2,
                ..Budget::default()
            },
        );
        assert_eq!(b, BudgetBreach::Documents { documents: 3 });
    }

    #[test]
    fn aliases_count_their_expansion() {
        // 7 nodes as written, plus 3 for each copy of the anchored list
        let input = "a: &x [1, 2]\nb: *x\nc: *x\n";
        let budget = Budget {
            max_nodes: 13,
            ..Budget::default()
        };
        assert!(parse_with_budget(input, &budget).is_ok());
        let b = breach(
            input,
            Budget {
                max_nodes: 12,
                ..Budget::default()
            },
        );
        assert!(matches!(b, BudgetBreach::Nodes { .. }), "{b:?}");
    }
}
