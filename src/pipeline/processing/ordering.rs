//! Total orders used for explicit tie-breaks.
//!
//! Nulls sort after every present value so that a populated row wins a tie.

use std::cmp::Ordering;

pub fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn f64_nulls_last(a: &Option<f64>, b: &Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nulls_sort_last() {
        let mut values = vec![None, Some("b"), Some("a")];
        values.sort_by(nulls_last);
        assert_eq!(values, vec![Some("a"), Some("b"), None]);
    }

    #[test]
    fn test_float_order_is_total() {
        assert_eq!(f64_nulls_last(&Some(1.0), &Some(2.0)), Ordering::Less);
        assert_eq!(f64_nulls_last(&Some(f64::NAN), &None), Ordering::Less);
        assert_eq!(f64_nulls_last(&None, &None), Ordering::Equal);
    }
}
