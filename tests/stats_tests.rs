use proptest::prelude::*;
use todosync::binder::TaskStats;
use todosync::models::Task;

fn tasks_from(flags: &[bool]) -> Vec<Task> {
    flags
        .iter()
        .enumerate()
        .map(|(i, done)| {
            let mut t = Task::new(format!("t{}", i), "d", "01/05/2025", "u1");
            t.id = Some(i.to_string());
            t.completed = *done;
            t
        })
        .collect()
}

proptest! {
    #[test]
    fn pending_is_total_minus_completed(flags in proptest::collection::vec(any::<bool>(), 0..64)) {
        let stats = TaskStats::from_tasks(&tasks_from(&flags));
        prop_assert_eq!(stats.total, flags.len());
        prop_assert_eq!(stats.completed, flags.iter().filter(|d| **d).count());
        prop_assert_eq!(stats.pending, stats.total - stats.completed);
    }
}

#[test]
fn test_counts_for_mixed_list() {
    let stats = TaskStats::from_tasks(&tasks_from(&[true, false, false]));
    assert_eq!(stats, TaskStats { total: 3, completed: 1, pending: 2 });
    assert!(!stats.is_empty());
}
