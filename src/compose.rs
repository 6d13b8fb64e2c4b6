//! Compose `Node` trees from the `saphyr_parser::Parser` event stream.
//!
//! Responsibilities
//! - Build one `Node::document` per YAML document.
//! - Record anchored nodes once they are complete and turn aliases into `NodeKind::Alias` nodes that
//!   carry a copy of the anchored subtree.
//! - Normalize tags to the short form and keep source locations for diagnostics.
//!
//! - Enforce a [`Budget`] on the event stream; an alias is charged for every node it copies.
//!
//! Document boundaries reset anchors, as YAML anchors are document-scoped.

use std::collections::HashMap;

use saphyr_parser::{Event, Parser};

use crate::budget::{Budget, BudgetEnforcer};
use crate::error::{Error, Location, location_from_span};
use crate::node::{Node, NodeKind, ScalarStyle};
use crate::tags::normalize_tag;

/// A container under construction.
struct Frame {
    node: Node,
    /// Nodes in the subtree so far, alias copies included.
    size: usize,
}

struct Composer {
    stack: Vec<Frame>,
    /// Anchored subtrees with their sizes.
    anchors: HashMap<usize, (Node, usize)>,
    budget: BudgetEnforcer,
    documents: Vec<Node>,
    /// Root of the document currently being read.
    current: Option<Node>,
    in_document: bool,
}

impl Composer {
    fn new(budget: &Budget) -> Self {
        Self {
            stack: Vec::new(),
            anchors: HashMap::new(),
            budget: BudgetEnforcer::new(budget.clone()),
            documents: Vec::new(),
            current: None,
            in_document: false,
        }
    }

    /// Attach a finished node to its parent container (or make it the document root).
    fn attach(&mut self, node: Node, size: usize, location: Location) -> Result<(), Error> {
        if node.anchor != 0 {
            self.anchors.insert(node.anchor, (node.clone(), size));
        }
        match self.stack.last_mut() {
            Some(frame) => {
                frame.node.children.push(node);
                frame.size += size;
            }
            None => {
                if self.current.is_some() {
                    return Err(Error::msg("multiple root nodes in one document").with_location(location));
                }
                self.current = Some(node);
            }
        }
        Ok(())
    }

    fn finish_document(&mut self) {
        if self.in_document {
            self.documents.push(Node::document(self.current.take()));
        }
        self.in_document = false;
        self.anchors.clear();
    }

    fn run(mut self, input: &str) -> Result<Vec<Node>, Error> {
        let parser = Parser::new_from_str(input);
        for item in parser {
            let (event, span) = item.map_err(Error::from_scan_error)?;
            let location = location_from_span(&span);
            self.budget
                .observe(&event)
                .map_err(|breach| Error::Budget { breach, location })?;
            match event {
                Event::StreamStart | Event::Nothing => {}
                Event::StreamEnd => break,
                Event::DocumentStart(..) => {
                    self.finish_document();
                    self.in_document = true;
                }
                Event::DocumentEnd => self.finish_document(),
                Event::Scalar(value, style, anchor, tag) => {
                    self.in_document = true;
                    let node = Node {
                        kind: NodeKind::Scalar,
                        tag: tag
                            .map(|t| normalize_tag(&t.handle, &t.suffix))
                            .unwrap_or_default(),
                        value: value.into_owned(),
                        style: ScalarStyle::from(style),
                        anchor,
                        location,
                        ..Node::default()
                    };
                    self.attach(node, 1, location)?;
                }
                Event::SequenceStart(anchor, tag) => {
                    self.in_document = true;
                    self.stack.push(Frame {
                        node: Node {
                            kind: NodeKind::Sequence,
                            tag: tag
                                .map(|t| normalize_tag(&t.handle, &t.suffix))
                                .unwrap_or_default(),
                            anchor,
                            location,
                            ..Node::default()
                        },
                        size: 1,
                    });
                }
                Event::MappingStart(anchor, tag) => {
                    self.in_document = true;
                    self.stack.push(Frame {
                        node: Node {
                            kind: NodeKind::Mapping,
                            tag: tag
                                .map(|t| normalize_tag(&t.handle, &t.suffix))
                                .unwrap_or_default(),
                            anchor,
                            location,
                            ..Node::default()
                        },
                        size: 1,
                    });
                }
                Event::SequenceEnd | Event::MappingEnd => {
                    let frame = self
                        .stack
                        .pop()
                        .ok_or_else(|| Error::msg("list or mapping end with no start").with_location(location))?;
                    self.attach(frame.node, frame.size, location)?;
                }
                Event::Alias(id) => {
                    self.in_document = true;
                    let (target, size) = self
                        .anchors
                        .get(&id)
                        .ok_or_else(|| Error::unknown_anchor(id).with_location(location))?;
                    let size = *size;
                    // charge the copy before making it
                    self.budget
                        .expand_alias(size)
                        .map_err(|breach| Error::Budget { breach, location })?;
                    let target = target.clone();
                    let node = Node {
                        kind: NodeKind::Alias,
                        alias: Some(Box::new(target)),
                        location,
                        ..Node::default()
                    };
                    self.attach(node, size, location)?;
                }
            }
        }
        if !self.stack.is_empty() {
            return Err(Error::msg("unexpected end of input"));
        }
        self.finish_document();
        Ok(self.documents)
    }
}

/// Parse every document of a YAML stream under the default [`Budget`].
pub fn parse_all(input: &str) -> Result<Vec<Node>, Error> {
    Composer::new(&Budget::default()).run(input)
}

/// Parse a single-document YAML input into a `Node::document` under the default [`Budget`].
///
/// An empty stream yields an empty document; more than one document is an error.
pub fn parse(input: &str) -> Result<Node, Error> {
    parse_with_budget(input, &Budget::default())
}

/// [`parse`] with explicit limits.
pub fn parse_with_budget(input: &str, budget: &Budget) -> Result<Node, Error> {
    let mut docs = Composer::new(budget).run(input)?;
    match docs.len() {
        0 => Ok(Node::document(None)),
        1 => Ok(docs.remove(0)),
        n => Err(Error::msg(format!(
            "expected a single YAML document, found {n}"
        ))),
    }
}
