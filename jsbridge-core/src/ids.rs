use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};

/// Correlates a `NativeObjectCallRequest` with its `NativeObjectCallResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(i32);

/// Correlates a `JsEvaluationRequest` with its `JsEvaluationResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i32);

impl CallId {
    pub fn new(value: i32) -> Self {
        CallId(value)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl TaskId {
    pub fn new(value: i32) -> Self {
        TaskId(value)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallId({})", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

impl From<i32> for CallId {
    fn from(value: i32) -> Self {
        CallId::new(value)
    }
}

impl From<i32> for TaskId {
    fn from(value: i32) -> Self {
        TaskId::new(value)
    }
}

/// Hands out call ids starting at 1. Ids are unique until the counter
/// passes `i32::MAX` and wraps back to 1, after which an id may repeat.
#[derive(Debug)]
pub struct CallIdAllocator {
    next: AtomicI32,
}

#[derive(Debug)]
pub struct TaskIdAllocator {
    next: AtomicI32,
}

fn next_positive(counter: &AtomicI32) -> i32 {
    let mut current = counter.load(Ordering::Relaxed);
    loop {
        let following = if current == i32::MAX { 1 } else { current + 1 };
        match counter.compare_exchange_weak(current, following, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => return current,
            Err(actual) => current = actual,
        }
    }
}

impl CallIdAllocator {
    pub fn new() -> Self {
        CallIdAllocator {
            next: AtomicI32::new(1),
        }
    }

    pub fn allocate(&self) -> CallId {
        CallId::new(next_positive(&self.next))
    }

    pub fn peek_next(&self) -> i32 {
        self.next.load(Ordering::Relaxed)
    }
}

impl TaskIdAllocator {
    pub fn new() -> Self {
        TaskIdAllocator {
            next: AtomicI32::new(1),
        }
    }

    pub fn allocate(&self) -> TaskId {
        TaskId::new(next_positive(&self.next))
    }

    pub fn peek_next(&self) -> i32 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for CallIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for TaskIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_call_id_allocation() {
        let allocator = CallIdAllocator::new();
        assert_eq!(allocator.allocate(), CallId::new(1));
        assert_eq!(allocator.allocate(), CallId::new(2));
        assert_eq!(allocator.peek_next(), 3);
    }

    #[test]
    fn test_task_id_allocation() {
        let allocator = TaskIdAllocator::new();
        assert_eq!(allocator.allocate().as_i32(), 1);
        assert_eq!(allocator.allocate().as_i32(), 2);
    }

    #[test]
    fn test_allocator_wraps_to_one() {
        let allocator = CallIdAllocator {
            next: AtomicI32::new(i32::MAX),
        };
        assert_eq!(allocator.allocate().as_i32(), i32::MAX);
        assert_eq!(allocator.allocate().as_i32(), 1);
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        let allocator = Arc::new(CallIdAllocator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let allocator = allocator.clone();
                thread::spawn(move || (0..250).map(|_| allocator.allocate()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<i32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .map(|id| id.as_i32())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1000);
    }

    #[test]
    fn test_id_serialization() {
        let call_id = CallId::new(42);
        let json = serde_json::to_string(&call_id).unwrap();
        assert_eq!(json, "42");
        let deserialized: CallId = serde_json::from_str(&json).unwrap();
        assert_eq!(call_id, deserialized);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(format!("{}", CallId::new(7)), "CallId(7)");
        assert_eq!(format!("{}", TaskId::new(9)), "TaskId(9)");
    }
}
