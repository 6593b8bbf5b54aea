//! Variable order heap.
use flatsat_formula::Var;

use super::Variable;

/// Binary max-heap of variables ordered by activity.
///
/// The activities live in the variable records, so every operation that compares entries takes the
/// variable records.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct VarHeap {
    /// Heap ordered variables.
    pub heap: Vec<Var>,
    /// Position in `heap` for each variable index, `None` if not contained.
    pub indices: Vec<Option<usize>>,
}

impl VarHeap {
    pub fn new() -> VarHeap {
        VarHeap::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, var: Var) -> bool {
        self.indices.get(var.index()).map_or(false, |pos| pos.is_some())
    }

    /// Insert a variable if not already present.
    pub fn insert(&mut self, var: Var, vars: &[Variable]) {
        if self.indices.len() <= var.index() {
            self.indices.resize(var.index() + 1, None);
        }
        if self.indices[var.index()].is_none() {
            let pos = self.heap.len();
            self.indices[var.index()] = Some(pos);
            self.heap.push(var);
            self.sift_up(pos, vars);
        }
    }

    /// Remove and return the variable with the highest activity.
    pub fn pop_max(&mut self, vars: &[Variable]) -> Option<Var> {
        let last = self.heap.pop()?;
        if self.heap.is_empty() {
            self.indices[last.index()] = None;
            return Some(last);
        }
        let max = self.heap[0];
        self.indices[max.index()] = None;
        self.heap[0] = last;
        self.indices[last.index()] = Some(0);
        self.sift_down(0, vars);
        Some(max)
    }

    fn activity(vars: &[Variable], var: Var) -> f64 {
        vars[var.index()].activity
    }

    fn sift_up(&mut self, mut pos: usize, vars: &[Variable]) {
        let var = self.heap[pos];
        while pos > 0 {
            let parent_pos = (pos - 1) / 2;
            let parent_var = self.heap[parent_pos];
            if Self::activity(vars, parent_var) >= Self::activity(vars, var) {
                break;
            }
            self.heap[pos] = parent_var;
            self.indices[parent_var.index()] = Some(pos);
            pos = parent_pos;
        }
        self.heap[pos] = var;
        self.indices[var.index()] = Some(pos);
    }

    fn sift_down(&mut self, mut pos: usize, vars: &[Variable]) {
        let var = self.heap[pos];
        loop {
            let left_pos = pos * 2 + 1;
            if left_pos >= self.heap.len() {
                break;
            }
            let right_pos = left_pos + 1;
            let child_pos = if right_pos < self.heap.len()
                && Self::activity(vars, self.heap[right_pos])
                    > Self::activity(vars, self.heap[left_pos])
            {
                right_pos
            } else {
                left_pos
            };
            let child_var = self.heap[child_pos];
            if Self::activity(vars, child_var) <= Self::activity(vars, var) {
                break;
            }
            self.heap[pos] = child_var;
            self.indices[child_var.index()] = Some(pos);
            pos = child_pos;
        }
        self.heap[pos] = var;
        self.indices[var.index()] = Some(pos);
    }

    /// Whether heap and index table agree and all variables are below `var_count`.
    ///
    /// The heap order itself is not checked.
    pub(crate) fn is_consistent(&self, var_count: usize) -> bool {
        self.indices.len() <= var_count
            && self.heap.iter().enumerate().all(|(pos, var)| {
                self.indices.get(var.index()).cloned() == Some(Some(pos))
            })
            && self.indices.iter().filter(|pos| pos.is_some()).count() == self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use flatsat_formula::var;

    fn with_activities(activities: &[f64]) -> Vec<Variable> {
        activities
            .iter()
            .map(|&activity| Variable {
                activity,
                ..Variable::default()
            })
            .collect()
    }

    #[test]
    fn pops_by_activity() {
        let vars = with_activities(&[1.0, 5.0, 3.0, 4.0, 0.5]);
        let mut heap = VarHeap::new();
        for index in 0..vars.len() {
            heap.insert(Var::from_index(index), &vars);
        }
        heap.insert(var!(2), &vars);

        assert_eq!(heap.len(), 5);
        assert!(heap.is_consistent(vars.len()));

        let mut order = vec![];
        while let Some(var) = heap.pop_max(&vars) {
            assert!(heap.is_consistent(vars.len()));
            order.push(var.index());
        }
        assert_eq!(order, vec![1, 3, 2, 0, 4]);
        assert!(!heap.contains(var!(1)));
    }

    #[test]
    fn detects_inconsistent_index() {
        let heap = VarHeap {
            heap: vec![var!(1), var!(2)],
            indices: vec![Some(1), Some(0)],
        };
        assert!(!heap.is_consistent(2));

        let heap = VarHeap {
            heap: vec![var!(2), var!(1)],
            indices: vec![Some(1), Some(0)],
        };
        assert!(heap.is_consistent(2));
        assert!(!heap.is_consistent(1));
    }
}
