//! Property pool aggregation.
//!
//! Everything a bulk modification references (filter leaves, process
//! targets, variable sources) is folded into a single
//! [`PropertyPoolMask`] so the property catalog is queried exactly once.

use crate::filter::SearchFilterGroup;
use crate::process::variable::Variable;
use crate::process::Process;
use crate::property::PropertyPoolMask;

/// Union of the pools referenced by enabled filter leaves, processes and
/// variables. Absent inputs contribute nothing.
pub fn aggregate_pools(
    filter: Option<&SearchFilterGroup>,
    processes: Option<&[Process]>,
    variables: Option<&[Variable]>,
) -> PropertyPoolMask {
    let from_filter = filter
        .map(|group| group.extract_leaf_filters(false))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|leaf| leaf.property_pool);
    let from_processes = processes
        .unwrap_or_default()
        .iter()
        .map(|p| p.property_pool);
    let from_variables = variables
        .unwrap_or_default()
        .iter()
        .map(|v| v.property_pool);

    from_filter
        .chain(from_processes)
        .chain(from_variables)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{SearchFilter, SearchOperation};
    use crate::property::PropertyPool;

    fn leaf(pool: PropertyPool, disabled: bool) -> SearchFilter {
        SearchFilter {
            property_pool: Some(pool),
            property_id: Some(1),
            operation: Some(SearchOperation::Equals),
            value: None,
            disabled,
        }
    }

    fn process(pool: PropertyPool) -> Process {
        Process {
            property_pool: pool,
            property_id: 1,
            steps: vec![],
        }
    }

    fn variable(pool: PropertyPool) -> Variable {
        Variable {
            key: "v".into(),
            name: "v".into(),
            property_pool: pool,
            property_id: 1,
            preprocesses: vec![],
        }
    }

    #[test]
    fn empty_inputs_yield_empty_mask() {
        assert_eq!(aggregate_pools(None, None, None), PropertyPoolMask::empty());
        assert_eq!(
            aggregate_pools(Some(&SearchFilterGroup::default()), Some(&[]), Some(&[])),
            PropertyPoolMask::empty()
        );
    }

    #[test]
    fn union_of_every_source() {
        let filter = SearchFilterGroup {
            filters: vec![leaf(PropertyPool::Reserved, false)],
            ..Default::default()
        };
        let processes = [process(PropertyPool::Custom)];
        let variables = [variable(PropertyPool::Internal)];
        let mask = aggregate_pools(Some(&filter), Some(&processes), Some(&variables));
        assert_eq!(mask.bits(), 7);
        assert_eq!(mask, PropertyPoolMask::ALL);
    }

    #[test]
    fn filter_process_and_variable_pools_combine() {
        let filter = SearchFilterGroup {
            filters: vec![leaf(PropertyPool::Internal, false)],
            ..Default::default()
        };
        let processes = [process(PropertyPool::Reserved)];
        let variables = [variable(PropertyPool::Custom)];
        let mask = aggregate_pools(Some(&filter), Some(&processes), Some(&variables));
        assert_eq!(mask.bits(), 1 | 2 | 4);
        assert!(mask.contains(PropertyPoolMask::INTERNAL));
        assert!(mask.contains(PropertyPoolMask::RESERVED));
        assert!(mask.contains(PropertyPoolMask::CUSTOM));
    }

    #[test]
    fn disabled_subtree_does_not_contribute() {
        let filter = SearchFilterGroup {
            filters: vec![leaf(PropertyPool::Custom, true)],
            groups: vec![SearchFilterGroup {
                filters: vec![leaf(PropertyPool::Reserved, false)],
                disabled: true,
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(aggregate_pools(Some(&filter), None, None), PropertyPoolMask::empty());

        let processes = [process(PropertyPool::Internal)];
        assert_eq!(
            aggregate_pools(Some(&filter), Some(&processes), None),
            PropertyPoolMask::INTERNAL
        );
    }
}
