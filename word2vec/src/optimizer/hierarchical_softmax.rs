use rand::rngs::StdRng;

use super::{HuffmanTree, Optimizer, sigmoid};
use crate::dictionary::Dictionary;
use crate::matrix::Matrix;

pub struct HierarchicalSoftmax {
    nodes: Matrix,
    tree: HuffmanTree,
}

impl HierarchicalSoftmax {
    pub fn new(dictionary: &Dictionary, dim: usize) -> Self {
        let tree = HuffmanTree::new(dictionary.counts());
        Self {
            nodes: Matrix::zeros(tree.internal_nodes(), dim),
            tree,
        }
    }
}

impl Optimizer for HierarchicalSoftmax {
    fn optimize(&self, target: usize, input: &[f64], lr: f64, grad: &mut [f64], _rng: &mut StdRng) {
        let Some(path) = self.tree.path(target) else {
            return;
        };
        for (&node, &code) in path.points.iter().zip(&path.codes) {
            let g = (1.0 - f64::from(code) - sigmoid(self.nodes.dot(node, input))) * lr;
            self.nodes.add_row_to(node, g, grad);
            self.nodes.axpy_row(node, g, input);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn updates_every_node_on_the_path() {
        let mut dic = Dictionary::new();
        for word in ["a", "a", "a", "b", "c"] {
            dic.add(word);
        }
        let hs = HierarchicalSoftmax::new(&dic, 2);
        let mut grad = vec![0.0; 2];
        let mut rng = StdRng::seed_from_u64(0);
        hs.optimize(1, &[1.0, 1.0], 0.1, &mut grad, &mut rng);

        let path = hs.tree.path(1).unwrap().clone();
        assert_eq!(path.points.len(), 2);
        for node in path.points {
            assert!(hs.nodes.row(node).iter().all(|v| *v != 0.0));
        }
    }
}
