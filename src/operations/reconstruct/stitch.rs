use std::collections::{HashMap, VecDeque};

use super::marching_squares::{LatticePoint, Segment};

/// Stitches unordered segments into closed loops by matching endpoints.
///
/// Segment endpoints lie on the doubled voxel lattice, so shared endpoints
/// match exactly. Each chain is grown forward from its end and then
/// backward from its start; chains that do not close are discarded.
#[must_use]
pub(crate) fn connect(segments: &[Segment]) -> Vec<Vec<LatticePoint>> {
    let mut by_point: HashMap<LatticePoint, Vec<usize>> = HashMap::new();
    for (i, &(a, b)) in segments.iter().enumerate() {
        by_point.entry(a).or_default().push(i);
        by_point.entry(b).or_default().push(i);
    }

    let mut used = vec![false; segments.len()];
    let mut loops = Vec::new();

    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let (a, b) = segments[start];
        let mut chain = VecDeque::from([a, b]);

        let mut closed = extend(&mut chain, segments, &by_point, &mut used, true);
        if !closed {
            closed = extend(&mut chain, segments, &by_point, &mut used, false);
        }
        if !closed {
            continue;
        }

        // Remove the duplicate closing vertex (front and back coincide).
        chain.pop_back();
        if chain.len() >= 3 {
            loops.push(chain.into_iter().collect());
        }
    }
    loops
}

/// Extends the chain from one end until it closes or runs out of segments.
/// Returns whether the chain closed.
fn extend(
    chain: &mut VecDeque<LatticePoint>,
    segments: &[Segment],
    by_point: &HashMap<LatticePoint, Vec<usize>>,
    used: &mut [bool],
    forward: bool,
) -> bool {
    loop {
        let (tip, other_end) = if forward {
            (chain.back(), chain.front())
        } else {
            (chain.front(), chain.back())
        };
        let (Some(&tip), Some(&other_end)) = (tip, other_end) else {
            return false;
        };

        let next = by_point.get(&tip).and_then(|candidates| {
            candidates.iter().copied().find(|&i| !used[i])
        });
        let Some(next) = next else {
            return false;
        };
        used[next] = true;

        let (a, b) = segments[next];
        let point = if a == tip { b } else { a };
        if forward {
            chain.push_back(point);
        } else {
            chain.push_front(point);
        }
        if point == other_end {
            return true;
        }
    }
}
