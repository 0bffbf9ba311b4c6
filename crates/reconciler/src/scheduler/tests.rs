use trellis_primitives::{RootId, SchedulerPriority};

use super::*;

fn drain(scheduler: &mut ManualScheduler) -> Vec<u32> {
	let mut ran = Vec::new();
	while let Some(dequeued) = scheduler.next_task() {
		if let Task::Host(id) = dequeued.task {
			ran.push(id);
		}
	}
	ran
}

#[test]
fn urgent_before_normal_fifo_within_priority() {
	let mut scheduler = ManualScheduler::new();
	scheduler.schedule(SchedulerPriority::Normal, Task::Host(1));
	scheduler.schedule(SchedulerPriority::Idle, Task::Host(2));
	scheduler.schedule(SchedulerPriority::Normal, Task::Host(3));
	scheduler.schedule(SchedulerPriority::Immediate, Task::Host(4));

	assert_eq!(scheduler.pending_count(), 4);
	assert_eq!(drain(&mut scheduler), vec![4, 1, 3, 2]);
	assert_eq!(scheduler.completed_total(), 4);
}

#[test]
fn cancel_drops_pending_task() {
	let mut scheduler = ManualScheduler::new();
	let a = scheduler.schedule(SchedulerPriority::Normal, Task::Host(1));
	scheduler.schedule(SchedulerPriority::Normal, Task::Host(2));

	scheduler.cancel(a);
	scheduler.cancel(a);
	assert_eq!(scheduler.cancelled_total(), 1);
	assert_eq!(drain(&mut scheduler), vec![2]);
}

#[test]
fn continuation_keeps_handle_and_runs_first() {
	let mut scheduler = ManualScheduler::new();
	let root = RootId::from_index(0);
	scheduler.schedule(SchedulerPriority::Normal, Task::PerformConcurrentWork(root));
	scheduler.schedule(SchedulerPriority::Normal, Task::Host(9));

	let first = scheduler.next_task().unwrap();
	assert_eq!(first.priority, SchedulerPriority::Normal);
	scheduler.requeue(first.handle, first.priority, first.task);
	assert_eq!(scheduler.priority_of(first.handle), Some(SchedulerPriority::Normal));

	let again = scheduler.next_task().unwrap();
	assert_eq!(again.handle, first.handle);
	assert!(matches!(again.task, Task::PerformConcurrentWork(r) if r == root));
}

#[test]
fn yield_budget_refills_per_task() {
	let mut scheduler = ManualScheduler::new().with_yield_budget(Some(2));
	scheduler.schedule(SchedulerPriority::Normal, Task::Host(1));
	scheduler.next_task();
	assert!(!scheduler.should_yield());
	assert!(!scheduler.should_yield());
	assert!(scheduler.should_yield());

	scheduler.schedule(SchedulerPriority::Normal, Task::Host(2));
	scheduler.next_task();
	assert!(!scheduler.should_yield());
}

#[test]
fn unbudgeted_scheduler_only_yields_on_request() {
	let mut scheduler = ManualScheduler::new();
	assert!(!scheduler.should_yield());
	scheduler.request_yield();
	assert!(scheduler.should_yield());
	assert!(!scheduler.should_yield());
}
