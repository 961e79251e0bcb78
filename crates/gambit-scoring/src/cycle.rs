//! Cycle detection over delegation edges.
//!
//! Every node has out-degree ≤ 1, so each traversal is a chain walk with
//! an explicit stack instead of recursion. A node already on the current
//! stack closes a loop: everything from its first stack occurrence to
//! the top is inside the cycle. A self-delegation is the one-node case
//! and is marked the same way.
//!
//! Each node is walked at most once as a root (global `visited` array),
//! so total work is linear in nodes + edges. Disjoint cycles are found
//! independently.

use crate::graph::Node;

/// Mark `in_cycle` on every node that sits on a delegation loop.
pub fn mark_cycles(nodes: &mut [Node]) {
    let n = nodes.len();
    let mut visited = vec![false; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();

    for root in 0..n {
        if visited[root] {
            continue;
        }

        let mut cur = root;
        loop {
            if on_stack[cur] {
                // Closed a loop: cur's first occurrence up to the top.
                let first = stack
                    .iter()
                    .position(|&i| i == cur)
                    .expect("on-stack node must be on the stack");
                for &i in &stack[first..] {
                    nodes[i].in_cycle = true;
                }
                break;
            }
            if visited[cur] {
                // Reached a chain explored from an earlier root.
                break;
            }
            visited[cur] = true;
            on_stack[cur] = true;
            stack.push(cur);

            match nodes[cur].target {
                Some(next) => cur = next,
                None => break,
            }
        }

        for &i in &stack {
            on_stack[i] = false;
        }
        stack.clear();
    }
}
