use std::collections::HashMap;

use orch_core::AllocationStrategy;
use orch_types::Priority;

/// One project's share of the agent pool, as seen by the allocator: its own
/// ceiling (`ResourceLimits::max_parallel_agents`, set per-project) and the
/// priority used to weight it against the others when capacity is scarce.
#[derive(Debug, Clone)]
pub struct AllocationRequest {
    pub project_name: String,
    pub priority: Priority,
    pub requested: u32,
}

/// Splits `total_capacity` concurrent agent slots across `requests`.
///
/// Both strategies clamp a project's share to its own `requested` ceiling —
/// a `CRITICAL` project never gets more agents than its own
/// `max_parallel_agents` allows just because capacity is available, it only
/// gets first call on that capacity.
pub fn allocate(
    strategy: AllocationStrategy,
    total_capacity: u32,
    requests: &[AllocationRequest],
) -> HashMap<String, u32> {
    match strategy {
        AllocationStrategy::Fair => fair_share(total_capacity, requests),
        AllocationStrategy::PriorityBased => priority_based(total_capacity, requests),
    }
}

fn fair_share(total_capacity: u32, requests: &[AllocationRequest]) -> HashMap<String, u32> {
    if requests.is_empty() {
        return HashMap::new();
    }
    let share = total_capacity / requests.len() as u32;
    requests
        .iter()
        .map(|r| (r.project_name.clone(), share.min(r.requested)))
        .collect()
}

fn priority_based(total_capacity: u32, requests: &[AllocationRequest]) -> HashMap<String, u32> {
    if requests.is_empty() {
        return HashMap::new();
    }
    let total_weight: f64 = requests.iter().map(|r| r.priority.allocation_weight()).sum();
    if total_weight <= 0.0 {
        return fair_share(total_capacity, requests);
    }

    requests
        .iter()
        .map(|r| {
            let share = (total_capacity as f64) * (r.priority.allocation_weight() / total_weight);
            let share = share.floor().max(0.0) as u32;
            (r.project_name.clone(), share.min(r.requested))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(name: &str, priority: Priority, requested: u32) -> AllocationRequest {
        AllocationRequest {
            project_name: name.to_string(),
            priority,
            requested,
        }
    }

    #[test]
    fn fair_share_splits_evenly_and_clamps_to_request() {
        let requests = vec![
            req("a", Priority::Normal, 10),
            req("b", Priority::Normal, 1),
        ];
        let allocated = allocate(AllocationStrategy::Fair, 12, &requests);
        assert_eq!(allocated["a"], 6);
        assert_eq!(allocated["b"], 1);
    }

    #[test]
    fn priority_based_favors_higher_priority_projects() {
        let requests = vec![
            req("critical", Priority::Critical, 10),
            req("low", Priority::Low, 10),
        ];
        let allocated = allocate(AllocationStrategy::PriorityBased, 10, &requests);
        assert!(allocated["critical"] > allocated["low"]);
    }

    #[test]
    fn priority_based_still_clamps_critical_projects_to_their_own_ceiling() {
        let requests = vec![req("solo", Priority::Critical, 2)];
        let allocated = allocate(AllocationStrategy::PriorityBased, 12, &requests);
        assert_eq!(allocated["solo"], 2);
    }

    #[test]
    fn empty_request_list_allocates_nothing() {
        let allocated = allocate(AllocationStrategy::Fair, 12, &[]);
        assert!(allocated.is_empty());
    }
}
