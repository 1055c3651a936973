use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Root-to-leaf route of one token: internal node indices and branch bits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HuffmanPath {
    pub points: Vec<usize>,
    pub codes: Vec<u8>,
}

/// Huffman coding over dictionary counts; frequent ids get shorter paths.
///
/// Internal nodes are numbered `0..vocabulary-1` with the root last.
#[derive(Clone, Debug, Default)]
pub struct HuffmanTree {
    paths: Vec<HuffmanPath>,
}

impl HuffmanTree {
    pub fn new(counts: &[u64]) -> Self {
        let leaves = counts.len();
        if leaves < 2 {
            return Self {
                paths: vec![HuffmanPath::default(); leaves],
            };
        }

        let nodes = 2 * leaves - 1;
        let mut parent = vec![0usize; nodes];
        let mut bit = vec![0u8; nodes];
        let mut heap: BinaryHeap<Reverse<(u64, usize)>> = counts
            .iter()
            .enumerate()
            .map(|(id, &count)| Reverse((count, id)))
            .collect();

        let mut next = leaves;
        while let (Some(Reverse((c1, a))), Some(Reverse((c2, b)))) = (heap.pop(), heap.pop()) {
            parent[a] = next;
            parent[b] = next;
            bit[b] = 1;
            heap.push(Reverse((c1 + c2, next)));
            next += 1;
        }

        let root = nodes - 1;
        let paths = (0..leaves)
            .map(|leaf| {
                let mut path = HuffmanPath::default();
                let mut node = leaf;
                while node != root {
                    path.codes.push(bit[node]);
                    path.points.push(parent[node] - leaves);
                    node = parent[node];
                }
                path.codes.reverse();
                path.points.reverse();
                path
            })
            .collect();
        Self { paths }
    }

    pub fn path(&self, id: usize) -> Option<&HuffmanPath> {
        self.paths.get(id)
    }

    pub fn internal_nodes(&self) -> usize {
        self.paths.len().saturating_sub(1)
    }
}
