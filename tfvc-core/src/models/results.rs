use serde::{Deserialize, Serialize};

use crate::path::LocalPath;

/// Outcome of one or more delete invocations.
///
/// Outcome lists are kept sorted so that merging is associative and
/// commutative: folding per-workspace results in any order yields the same
/// value as a single invocation over the union of the inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub deleted_paths: Vec<LocalPath>,
    pub not_found_paths: Vec<String>,
    pub errors: Vec<String>,
}

impl DeleteResult {
    pub fn new(
        mut deleted_paths: Vec<LocalPath>,
        mut not_found_paths: Vec<String>,
        mut errors: Vec<String>,
    ) -> Self {
        deleted_paths.sort();
        not_found_paths.sort();
        errors.sort();
        Self {
            deleted_paths,
            not_found_paths,
            errors,
        }
    }

    pub fn merge_with(self, other: DeleteResult) -> DeleteResult {
        Self::new(
            concat(self.deleted_paths, other.deleted_paths),
            concat(self.not_found_paths, other.not_found_paths),
            concat(self.errors, other.errors),
        )
    }

    pub fn outcome_count(&self) -> usize {
        self.deleted_paths.len() + self.not_found_paths.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcome_count() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResult {
    pub checked_out_files: Vec<LocalPath>,
    pub not_found_files: Vec<String>,
    pub errors: Vec<String>,
}

fn concat<T>(mut left: Vec<T>, right: Vec<T>) -> Vec<T> {
    left.extend(right);
    left
}
