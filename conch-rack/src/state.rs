use parking_lot::Mutex;
use std::sync::Arc;

/// State owned by one view-model instance and shared with the tasks it spawns.
pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}
