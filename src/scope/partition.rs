//! `PartitionTasks`: greedy graph coloring into parallel-safe waves.

use std::collections::HashSet;

use super::conflict::check_conflicts;
use super::types::{TaskPartition, TaskScope};

/// Partition scopes into waves such that no two scopes assigned to the
/// same wave conflict. Tie-breaking in the conflict-degree sort is
/// stable (conflict-degree descending, then original input index
/// ascending) so tests can assert exact wave membership.
pub fn partition_tasks(scopes: &[TaskScope]) -> Vec<TaskPartition> {
    if scopes.is_empty() {
        return Vec::new();
    }

    let n = scopes.len();
    let mut adjacency: Vec<HashSet<usize>> = vec![HashSet::new(); n];
    for conflict in check_conflicts(scopes) {
        if let (Some(i), Some(j)) = (
            scopes.iter().position(|s| s.task_id == conflict.task_a),
            scopes.iter().position(|s| s.task_id == conflict.task_b),
        ) {
            adjacency[i].insert(j);
            adjacency[j].insert(i);
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        adjacency[b]
            .len()
            .cmp(&adjacency[a].len())
            .then(a.cmp(&b))
    });

    let mut group_of: Vec<Option<usize>> = vec![None; n];
    for &idx in &order {
        let forbidden: HashSet<usize> = adjacency[idx]
            .iter()
            .filter_map(|&neighbor| group_of[neighbor])
            .collect();
        let mut group = 0;
        while forbidden.contains(&group) {
            group += 1;
        }
        group_of[idx] = Some(group);
    }

    let num_groups = group_of.iter().filter_map(|g| *g).max().map_or(0, |m| m + 1);
    let mut partitions: Vec<TaskPartition> = (0..num_groups)
        .map(|group| TaskPartition {
            group,
            task_ids: Vec::new(),
            wait_for: Vec::new(),
            scopes: Vec::new(),
        })
        .collect();

    for idx in 0..n {
        let group = group_of[idx].expect("every scope is assigned a group");
        partitions[group].task_ids.push(scopes[idx].task_id.clone());
        partitions[group].scopes.push(scopes[idx].clone());
    }

    let mut seen_so_far: Vec<String> = Vec::new();
    for partition in &mut partitions {
        partition.wait_for = seen_so_far.clone();
        seen_so_far.extend(partition.task_ids.iter().cloned());
    }

    partitions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(id: &str, files: &[&str]) -> TaskScope {
        TaskScope {
            task_id: id.to_string(),
            files: files.iter().map(|s| s.to_string()).collect(),
            globs: Vec::new(),
        }
    }

    #[test]
    fn empty_input_returns_no_partitions() {
        assert!(partition_tasks(&[]).is_empty());
    }

    #[test]
    fn single_task_with_empty_scope_is_one_wave() {
        let partitions = partition_tasks(&[scope("a", &[])]);
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].task_ids, vec!["a".to_string()]);
    }

    #[test]
    fn non_overlapping_tasks_share_one_wave() {
        let scopes = vec![scope("a", &["a.go"]), scope("b", &["b.go"]), scope("c", &["c.go"])];
        let partitions = partition_tasks(&scopes);
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].task_ids.len(), 3);
    }

    #[test]
    fn identical_files_split_into_two_waves() {
        let scopes = vec![scope("a", &["shared.go"]), scope("b", &["shared.go"])];
        let partitions = partition_tasks(&scopes);
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].task_ids.len(), 1);
        assert_eq!(partitions[1].task_ids.len(), 1);
        assert_eq!(partitions[1].wait_for, partitions[0].task_ids);
    }

    #[test]
    fn overlap_partitioned_scenario_s2() {
        let x = scope("X", &["shared.go", "x.go"]);
        let y = scope("Y", &["shared.go", "y.go"]);
        let z = scope("Z", &["z.go"]);
        let partitions = partition_tasks(&[x, y, z]);
        assert_eq!(partitions.len(), 2);
        assert!(partitions[0].task_ids.contains(&"Z".to_string()));
        assert_eq!(partitions[0].task_ids.len(), 2);
        assert_eq!(partitions[1].task_ids.len(), 1);
        assert!(partitions[1].task_ids[0] == "X" || partitions[1].task_ids[0] == "Y");
    }

    #[test]
    fn wave_monotonicity_holds() {
        let scopes = vec![
            scope("a", &["f1"]),
            scope("b", &["f1"]),
            scope("c", &["f2"]),
            scope("d", &["f2"]),
        ];
        let partitions = partition_tasks(&scopes);
        let mut seen: Vec<String> = Vec::new();
        for partition in &partitions {
            for id in &seen {
                assert!(partition.wait_for.contains(id));
            }
            seen.extend(partition.task_ids.iter().cloned());
        }
    }
}
