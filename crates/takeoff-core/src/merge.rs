//! Rebuilding polylines from individually drawn segments.
//!
//! Lines are drawn one segment at a time. Selecting one of them joins every
//! segment it connects to (same page, same template) into a single polyline.

use crate::items::{Geometry, ItemId, Line, TakeoffItem};
use crate::template::TemplateId;
use kurbo::Point;
use std::collections::HashMap;

/// Segments only merge with segments of the same group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MergeGroup {
    Template(TemplateId),
    /// Template was deleted or never had an id; matched by its name.
    TemplateName(String),
    /// Not tagged with any template; matched by color token.
    ///
    /// Untagged segments carry no name to match on, and every ad-hoc run gets
    /// its own palette color, so the color identifies the run. Grouping them
    /// all together would join unrelated runs that happen to touch.
    Unlinked(String),
}

impl MergeGroup {
    pub fn of(item: &TakeoffItem) -> Self {
        match &item.template {
            Some(link) => match link.template_id {
                Some(id) => MergeGroup::Template(id),
                None => MergeGroup::TemplateName(link.template_name.clone()),
            },
            None => MergeGroup::Unlinked(item.style.color_token.clone()),
        }
    }
}

/// Replacement computed for a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    /// Segments absorbed into the polyline, in the order they were walked.
    pub retired: Vec<ItemId>,
    /// The new polyline item with a fresh id.
    pub merged: TakeoffItem,
}

type NodeKey = (i64, i64);

/// Endpoint graph over candidate segments.
struct SegmentGraph {
    /// Representative point of each node.
    nodes: Vec<Point>,
    /// Node pair of each segment.
    segments: Vec<(usize, usize)>,
    /// Node to incident segment indices, ascending.
    incident: Vec<Vec<usize>>,
}

impl SegmentGraph {
    fn build(lines: &[&Line], quantum: f64) -> Self {
        let mut registry: HashMap<NodeKey, usize> = HashMap::new();
        let mut nodes = Vec::new();
        let mut incident: Vec<Vec<usize>> = Vec::new();
        let mut segments = Vec::with_capacity(lines.len());

        let mut node_for = |point: Point| -> usize {
            let key = quantize(point, quantum);
            *registry.entry(key).or_insert_with(|| {
                nodes.push(point);
                incident.push(Vec::new());
                nodes.len() - 1
            })
        };

        for line in lines {
            let a = node_for(line.points[0]);
            let b = node_for(line.points[1]);
            segments.push((a, b));
        }
        for (index, &(a, b)) in segments.iter().enumerate() {
            incident[a].push(index);
            if b != a {
                incident[b].push(index);
            }
        }

        Self {
            nodes,
            segments,
            incident,
        }
    }

    fn other_end(&self, segment: usize, node: usize) -> usize {
        let (a, b) = self.segments[segment];
        if a == node { b } else { a }
    }

    /// Lowest-indexed unused segment at `node`.
    fn next_unused(&self, node: usize, used: &[bool]) -> Option<usize> {
        self.incident[node].iter().copied().find(|&s| !used[s])
    }
}

fn quantize(point: Point, quantum: f64) -> NodeKey {
    (
        (point.x / quantum).round() as i64,
        (point.y / quantum).round() as i64,
    )
}

fn two_point_line(item: &TakeoffItem) -> Option<&Line> {
    match &item.geometry {
        Geometry::Line(line) if line.points.len() == 2 => Some(line),
        _ => None,
    }
}

/// Plan the merge triggered by selecting `clicked`.
///
/// Returns `None` when the clicked item is not a two-point line or when it is
/// not connected to any other eligible segment. Endpoints closer than
/// `quantum` document pixels are treated as shared.
pub fn plan_merge(items: &[TakeoffItem], clicked: ItemId, quantum: f64) -> Option<MergePlan> {
    let clicked_item = items.iter().find(|item| item.id() == clicked)?;
    let clicked_line = two_point_line(clicked_item)?;
    let group = MergeGroup::of(clicked_item);
    let quantum = quantum.max(f64::EPSILON);

    let candidates: Vec<(&TakeoffItem, &Line)> = items
        .iter()
        .filter(|item| item.page == clicked_item.page && MergeGroup::of(item) == group)
        .filter_map(|item| two_point_line(item).map(|line| (item, line)))
        .collect();
    let lines: Vec<&Line> = candidates.iter().map(|(_, line)| *line).collect();
    let graph = SegmentGraph::build(&lines, quantum);

    let start = candidates
        .iter()
        .position(|(item, _)| item.id() == clicked)?;
    let (head, tail) = graph.segments[start];
    if head == tail {
        return None;
    }

    let mut used = vec![false; graph.segments.len()];
    used[start] = true;
    let mut walked = vec![start];
    let mut path = vec![head, tail];
    let mut closed = false;

    // Extend forward from the tail, then backward from the head.
    let mut node = tail;
    while let Some(segment) = graph.next_unused(node, &used) {
        used[segment] = true;
        walked.push(segment);
        node = graph.other_end(segment, node);
        if node == head {
            closed = true;
            break;
        }
        path.push(node);
    }
    if !closed {
        let mut node = head;
        while let Some(segment) = graph.next_unused(node, &used) {
            used[segment] = true;
            walked.push(segment);
            node = graph.other_end(segment, node);
            path.insert(0, node);
        }
    }

    if walked.len() < 2 {
        return None;
    }

    let mut polyline = Line::from_points(path.iter().map(|&n| graph.nodes[n]).collect())
        .with_flags_of(clicked_line);
    polyline.closed = closed;

    let mut merged = TakeoffItem::new(
        clicked_item.page,
        Geometry::Line(polyline),
        clicked_item.style.clone(),
    );
    merged.template = clicked_item.template.clone();

    let retired = walked.iter().map(|&s| candidates[s].0.id()).collect();
    Some(MergePlan { retired, merged })
}

/// Array with the retired segments replaced by the merged polyline.
///
/// The polyline takes the place of the first retired segment.
pub fn apply_merge(items: &[TakeoffItem], plan: &MergePlan) -> Vec<TakeoffItem> {
    let mut result = Vec::with_capacity(items.len());
    let mut inserted = false;
    for item in items {
        if plan.retired.contains(&item.id()) {
            if !inserted {
                result.push(plan.merged.clone());
                inserted = true;
            }
        } else {
            result.push(item.clone());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::ItemStyle;
    use crate::template::Template;

    fn segment(x0: f64, y0: f64, x1: f64, y1: f64) -> TakeoffItem {
        TakeoffItem::new(
            1,
            Geometry::Line(Line::segment(Point::new(x0, y0), Point::new(x1, y1))),
            ItemStyle::new("blue"),
        )
    }

    fn merged_line(plan: &MergePlan) -> &Line {
        match &plan.merged.geometry {
            Geometry::Line(line) => line,
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_merges_two_segments() {
        let items = vec![segment(0.0, 0.0, 1.0, 0.0), segment(1.0, 0.0, 2.0, 0.0)];
        let plan = plan_merge(&items, items[0].id(), 0.5).unwrap();

        let line = merged_line(&plan);
        assert_eq!(
            line.points,
            vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(2.0, 0.0)]
        );
        assert!((line.length() - 2.0).abs() < f64::EPSILON);
        assert!(!line.closed);
        assert_eq!(plan.retired.len(), 2);

        let result = apply_merge(&items, &plan);
        assert_eq!(result.len(), 1);
        assert_ne!(result[0].id(), items[0].id());
        assert_ne!(result[0].id(), items[1].id());
    }

    #[test]
    fn test_clicking_either_end_gives_same_order() {
        let items = vec![segment(0.0, 0.0, 1.0, 0.0), segment(1.0, 0.0, 2.0, 0.0)];
        let from_second = plan_merge(&items, items[1].id(), 0.5).unwrap();
        assert_eq!(
            merged_line(&from_second).points,
            vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(2.0, 0.0)]
        );
    }

    #[test]
    fn test_isolated_segment_is_noop() {
        let items = vec![segment(0.0, 0.0, 1.0, 0.0), segment(5.0, 5.0, 6.0, 5.0)];
        assert!(plan_merge(&items, items[0].id(), 0.5).is_none());
    }

    #[test]
    fn test_reversed_segments_join_within_tolerance() {
        let items = vec![
            segment(0.0, 0.0, 10.0, 0.0),
            segment(10.0, 10.0, 10.1, 0.1),
            segment(10.0, 10.0, 0.0, 10.0),
        ];
        let plan = plan_merge(&items, items[0].id(), 0.5).unwrap();
        let line = merged_line(&plan);
        assert_eq!(line.points.len(), 4);
        assert_eq!(plan.retired.len(), 3);
    }

    #[test]
    fn test_loop_becomes_closed() {
        let items = vec![
            segment(0.0, 0.0, 10.0, 0.0),
            segment(10.0, 0.0, 10.0, 10.0),
            segment(10.0, 10.0, 0.0, 0.0),
        ];
        let plan = plan_merge(&items, items[0].id(), 0.5).unwrap();
        let line = merged_line(&plan);
        assert!(line.closed);
        assert_eq!(line.points.len(), 3);
        assert!((line.length() - (20.0 + 200f64.sqrt())).abs() < 1e-9);
    }

    #[test]
    fn test_different_templates_do_not_merge() {
        let template = Template::new("Wall", crate::items::ItemKind::Line, ItemStyle::new("red"))
            .unwrap();
        let items = vec![
            segment(0.0, 0.0, 1.0, 0.0).with_template(template.link()),
            segment(1.0, 0.0, 2.0, 0.0),
        ];
        assert!(plan_merge(&items, items[0].id(), 0.5).is_none());
    }

    #[test]
    fn test_untagged_segments_group_by_color() {
        let mut red = segment(1.0, 0.0, 2.0, 0.0);
        red.style = ItemStyle::new("red");
        let items = vec![segment(0.0, 0.0, 1.0, 0.0), red];
        assert_eq!(
            MergeGroup::of(&items[1]),
            MergeGroup::Unlinked("red".to_string())
        );
        assert!(plan_merge(&items, items[0].id(), 0.5).is_none());

        let same = vec![segment(0.0, 0.0, 1.0, 0.0), segment(1.0, 0.0, 2.0, 0.0)];
        assert!(plan_merge(&same, same[0].id(), 0.5).is_some());
    }

    #[test]
    fn test_other_pages_and_polylines_ignored() {
        let mut other_page = segment(1.0, 0.0, 2.0, 0.0);
        other_page.page = 2;
        let polyline = TakeoffItem::new(
            1,
            Geometry::Line(Line::from_points(vec![
                Point::new(1.0, 0.0),
                Point::new(1.0, 5.0),
                Point::new(3.0, 5.0),
            ])),
            ItemStyle::new("blue"),
        );
        let items = vec![segment(0.0, 0.0, 1.0, 0.0), other_page, polyline];
        assert!(plan_merge(&items, items[0].id(), 0.5).is_none());
        assert!(plan_merge(&items, items[2].id(), 0.5).is_none());
    }

    #[test]
    fn test_branch_retires_only_walked_path() {
        let items = vec![
            segment(0.0, 0.0, 1.0, 0.0),
            segment(1.0, 0.0, 2.0, 0.0),
            segment(1.0, 0.0, 1.0, 1.0),
        ];
        let plan = plan_merge(&items, items[0].id(), 0.5).unwrap();
        assert_eq!(plan.retired, vec![items[0].id(), items[1].id()]);

        let result = apply_merge(&items, &plan);
        assert_eq!(result.len(), 2);
        assert_eq!(result[1].id(), items[2].id());
    }

    #[test]
    fn test_inherits_clicked_style_and_flags() {
        let mut clicked = segment(0.0, 0.0, 1.0, 0.0);
        if let Geometry::Line(line) = &mut clicked.geometry {
            line.dashed = true;
            line.stroke_width = 4.0;
        }
        let items = vec![clicked, segment(1.0, 0.0, 2.0, 0.0)];
        let plan = plan_merge(&items, items[0].id(), 0.5).unwrap();
        let line = merged_line(&plan);
        assert!(line.dashed);
        assert!((line.stroke_width - 4.0).abs() < f64::EPSILON);
        assert_eq!(plan.merged.style, items[0].style);
    }
}
