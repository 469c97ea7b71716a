//! Cartesian product over ordered value lists.

/// Produces every combination of the given value lists.
///
/// The first list is the outermost (slowest-varying) dimension and the last
/// list the innermost. Duplicates are kept. An empty input yields a single
/// empty combination; any empty inner list yields no combinations at all.
pub fn expand<T: Clone>(lists: &[Vec<T>]) -> Vec<Vec<T>> {
    let mut combinations: Vec<Vec<T>> = vec![Vec::with_capacity(lists.len())];

    for values in lists {
        let mut next = Vec::with_capacity(combinations.len() * values.len());
        for prefix in &combinations {
            for value in values {
                let mut row = prefix.clone();
                row.push(value.clone());
                next.push(row);
            }
        }
        combinations = next;
    }

    combinations
}
