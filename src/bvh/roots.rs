use std::ops::Range;

use log::warn;

use crate::{BuildError, Geometry, Group};

/// Disjoint primitive ranges, one per root, from the geometry's groups and draw range,
/// clipped to `range` when given
pub fn root_ranges(geometry: &Geometry, range: Option<Range<u32>>) -> Result<Vec<Range<u32>>, BuildError> {
    let stride = geometry.kind().stride();
    let index_count = geometry.index_count();
    let primitive_count = index_count / stride;

    let mut groups: Vec<Group> = if geometry.groups().is_empty() {
        vec![geometry
            .draw_range()
            .unwrap_or(Group::new(0, index_count as u32))]
    } else {
        geometry.groups().to_vec()
    };

    for group in &groups {
        if group.start as usize % stride != 0 || group.count as usize % stride != 0 {
            return Err(BuildError::MisalignedGroup {
                start: group.start,
                end: group.end(),
                stride,
            });
        }
        if group.end() as usize > index_count {
            return Err(BuildError::GroupOutOfBounds {
                start: group.start,
                end: group.end(),
                length: index_count,
            });
        }
    }

    // groups are clipped by the draw range
    if let Some(draw) = geometry.draw_range().filter(|_| !geometry.groups().is_empty()) {
        for group in groups.iter_mut() {
            let start = group.start.max(draw.start);
            let end = group.end().min(draw.end()).max(start);
            *group = Group::new(start, end - start);
        }
    }

    let mut primitive_groups: Vec<Range<u32>> = groups
        .iter()
        .map(|g| g.start / stride as u32..g.end() / stride as u32)
        .filter(|r| !r.is_empty())
        .collect();

    if let Some(range) = &range {
        if range.start > range.end || range.end as usize > primitive_count {
            return Err(BuildError::InvalidRange {
                start: range.start,
                end: range.end,
                count: primitive_count,
            });
        }
        primitive_groups = primitive_groups
            .into_iter()
            .map(|r| r.start.max(range.start)..r.end.min(range.end))
            .filter(|r| !r.is_empty())
            .collect();
    }

    // cut overlapping groups at every boundary
    let mut boundaries: Vec<u32> = primitive_groups.iter().flat_map(|r| [r.start, r.end]).collect();
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut roots = Vec::new();
    for pair in boundaries.windows(2) {
        let piece = pair[0]..pair[1];
        if primitive_groups
            .iter()
            .any(|r| r.start <= piece.start && piece.end <= r.end)
        {
            roots.push(piece);
        }
    }

    let covered: u32 = roots.iter().map(|r| r.end - r.start).sum();
    let expected = range.map_or(primitive_count as u32, |r| r.end - r.start);
    if geometry.groups().len() > 1 && covered < expected {
        warn!(
            "groups leave {} of {} primitives uncovered; they are not part of the hierarchy",
            expected - covered,
            expected
        );
    }

    Ok(roots)
}
