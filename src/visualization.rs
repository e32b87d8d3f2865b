//! Renders one decision tree of the ensemble as an SVG data URL.
//!
//! Output is for display only. Every failure is logged and reported as
//! `None` so a rendering problem never fails a classification.

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine};
use plotters::prelude::*;
use plotters_svg::SVGBackend;
use tracing::{debug, warn};

use crate::config::VisualizationConfig;
use crate::feature_extractor::display_name;
use crate::models::metadata::{DecisionTree, TreeNode};

const CLASS_NAMES: [&str; 2] = ["Not Fraud", "Fraud"];
const CLASS_COLORS: [RGBColor; 2] = [RGBColor(229, 129, 57), RGBColor(57, 139, 229)];

const MARGIN: i32 = 20;
const FONT_SIZE: i32 = 12;
const LINE_HEIGHT: i32 = 15;
const BOX_HEIGHT: i32 = 4 * LINE_HEIGHT + 10;
const MAX_BOX_WIDTH: i32 = 220;

/// Deepest level ever drawn, whatever the configuration asks for
pub const MAX_RENDER_DEPTH: usize = 8;

/// A node placed on the canvas.
#[derive(Debug, Clone, PartialEq)]
struct PlacedNode {
    index: usize,
    depth: usize,
    /// Position within its level, 0..2^depth
    slot: usize,
    /// Stands in for a subtree deeper than `max_depth`
    elided: bool,
    parent: Option<(usize, usize)>,
}

pub struct TreeRenderer {
    max_depth: usize,
    width: u32,
    height: u32,
}

impl TreeRenderer {
    pub fn new(config: &VisualizationConfig) -> Self {
        Self {
            max_depth: config.max_depth.min(MAX_RENDER_DEPTH),
            width: config.width.max(200),
            height: config.height.max(200),
        }
    }

    /// Render `tree` with split labels taken from `columns`.
    pub fn render(&self, tree: &DecisionTree, columns: &[String]) -> Option<String> {
        match self.try_render(tree, columns) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, "Error generating tree visualization");
                None
            }
        }
    }

    fn try_render(&self, tree: &DecisionTree, columns: &[String]) -> Result<String> {
        let placed = self.layout(tree)?;

        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (self.width, self.height))
                .into_drawing_area();
            root.fill(&WHITE)?;

            for node in &placed {
                if let Some((depth, slot)) = node.parent {
                    let (px, py) = self.anchor(depth, slot);
                    let (cx, cy) = self.anchor(node.depth, node.slot);
                    root.draw(&PathElement::new(
                        vec![(px, py + BOX_HEIGHT), (cx, cy)],
                        BLACK.stroke_width(1),
                    ))?;
                }
            }

            for node in &placed {
                let (cx, top) = self.anchor(node.depth, node.slot);
                let half = self.box_width(node.depth) / 2;
                let corners = [(cx - half, top), (cx + half, top + BOX_HEIGHT)];

                let tree_node = tree
                    .node(node.index)
                    .ok_or_else(|| anyhow::anyhow!("node {} missing", node.index))?;

                let lines = if node.elided {
                    root.draw(&Rectangle::new(corners, WHITE.filled()))?;
                    vec!["(...)".to_string()]
                } else {
                    root.draw(&Rectangle::new(corners, fill_color(tree_node).filled()))?;
                    node_lines(tree_node, columns)
                };
                root.draw(&Rectangle::new(corners, BLACK.stroke_width(1)))?;

                for (i, line) in lines.iter().enumerate() {
                    let x = cx - text_width(line) / 2;
                    let y = top + 5 + i as i32 * LINE_HEIGHT;
                    root.draw(&Text::new(
                        line.clone(),
                        (x, y),
                        ("sans-serif", FONT_SIZE).into_font(),
                    ))?;
                }
            }

            root.present()?;
        }

        debug!(nodes = placed.len(), bytes = svg.len(), "Tree visualization rendered");
        Ok(format!(
            "data:image/svg+xml;base64,{}",
            STANDARD.encode(svg.as_bytes())
        ))
    }

    /// Breadth-first placement down to `max_depth`; deeper subtrees collapse
    /// into one elided box.
    fn layout(&self, tree: &DecisionTree) -> Result<Vec<PlacedNode>> {
        if tree.root().is_none() {
            anyhow::bail!("tree has no nodes");
        }

        let mut placed = Vec::new();
        let mut frontier = vec![PlacedNode {
            index: 0,
            depth: 0,
            slot: 0,
            elided: false,
            parent: None,
        }];

        while let Some(node) = frontier.pop() {
            let tree_node = tree
                .node(node.index)
                .ok_or_else(|| anyhow::anyhow!("node {} missing", node.index))?;

            if !node.elided && !tree_node.is_leaf() {
                let elide = node.depth + 1 > self.max_depth;
                let children = [tree_node.left, tree_node.right];
                for (side, child) in children.into_iter().enumerate() {
                    if let Some(child) = child {
                        frontier.push(PlacedNode {
                            index: child,
                            depth: node.depth + 1,
                            slot: node.slot * 2 + side,
                            elided: elide,
                            parent: Some((node.depth, node.slot)),
                        });
                    }
                }
            }
            placed.push(node);
        }

        placed.sort_by_key(|n| (n.depth, n.slot));
        Ok(placed)
    }

    fn levels(&self) -> i32 {
        self.max_depth as i32 + 2
    }

    /// Top-center of the box at (`depth`, `slot`).
    fn anchor(&self, depth: usize, slot: usize) -> (i32, i32) {
        let usable_w = (self.width as i64 - 2 * MARGIN as i64).max(1);
        let slots = 1i64 << depth.min(MAX_RENDER_DEPTH + 1);
        let slot = (slot as i64).min(slots - 1);
        let x = MARGIN as i64 + (usable_w * (2 * slot + 1)) / (2 * slots);

        let usable_h = self.height as i64 - 2 * MARGIN as i64 - BOX_HEIGHT as i64;
        let y = MARGIN as i64 + usable_h * depth as i64 / (self.levels() as i64 - 1).max(1);
        (x as i32, y as i32)
    }

    fn box_width(&self, depth: usize) -> i32 {
        let slots = 1i32 << depth.min(MAX_RENDER_DEPTH + 1);
        let slot_w = (self.width as i32 - 2 * MARGIN) / slots;
        (slot_w - 8).clamp(40, MAX_BOX_WIDTH)
    }
}

fn node_lines(node: &TreeNode, columns: &[String]) -> Vec<String> {
    let mut lines = Vec::with_capacity(4);
    if let (false, Some(feature)) = (node.is_leaf(), node.feature) {
        let name = columns
            .get(feature)
            .map(|c| display_name(c).to_string())
            .unwrap_or_else(|| format!("x[{}]", feature));
        lines.push(format!("{} <= {:.2}", name, node.threshold));
    }

    let samples: f64 = node.value.iter().sum();
    lines.push(format!("samples = {}", format_weight(samples)));
    lines.push(format!(
        "value = [{}]",
        node.value
            .iter()
            .map(|v| format_weight(*v))
            .collect::<Vec<_>>()
            .join(", ")
    ));
    let class = CLASS_NAMES
        .get(node.majority_class())
        .copied()
        .unwrap_or("?");
    lines.push(format!("class = {}", class));
    lines
}

fn format_weight(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{:.3}", v)
    }
}

/// Majority-class color, lightened toward white as the node gets less pure.
fn fill_color(node: &TreeNode) -> RGBColor {
    let class = node.majority_class().min(CLASS_COLORS.len() - 1);
    let purity = node
        .class_distribution()
        .get(class)
        .copied()
        .unwrap_or(0.0);
    // 0.5 purity → white, 1.0 → full class color
    let alpha = ((purity - 0.5) * 2.0).clamp(0.0, 1.0);
    let RGBColor(r, g, b) = CLASS_COLORS[class];
    let mix = |c: u8| (255.0 - (255.0 - c as f64) * alpha).round() as u8;
    RGBColor(mix(r), mix(g), mix(b))
}

/// Rough rendered width for centering; SVG viewers lay out the real glyphs.
fn text_width(line: &str) -> i32 {
    (line.chars().count() as f64 * FONT_SIZE as f64 * 0.55) as i32
}
