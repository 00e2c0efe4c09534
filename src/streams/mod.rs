pub mod error;
pub mod operation;
pub mod pair;
pub mod pipe;
pub mod readable;
pub mod status;
pub mod writable;

pub use error::StreamError;
pub use operation::{Operation, OperationCompleter, OperationKind};
pub use pair::{create_operation_stream, ReadableState, WritableState};
pub use pipe::pipe_operation_streams;
pub use readable::{ReadableOperationStream, ReadableStream, ReadableStreamReader};
pub use status::{OperationStatus, StatusState};
pub use writable::WritableOperationStream;

/// Pluggable policy for sizing operations and advertising backpressure.
///
/// A pair consults its strategy on every write, dequeue, and window update.
/// The defaults give every item size 1 and never assert backpressure, so a
/// strategy only has to override the capabilities it cares about.
///
/// `size` is fallible: an `Err` is fatal and aborts the pair with the
/// returned reason.
pub trait QueuingStrategy<T> {
    /// Return the size of the chunk
    fn size(&self, chunk: &T) -> Result<usize, StreamError> {
        let _ = chunk;
        Ok(1)
    }

    /// Whether the writable side should advertise backpressure at this
    /// total queue size
    fn should_apply_backpressure(&self, queue_size: usize) -> bool {
        let _ = queue_size;
        false
    }

    /// Remaining credit at this total queue size, if the strategy has a
    /// notion of credit
    fn space(&self, queue_size: usize) -> Option<usize> {
        let _ = queue_size;
        None
    }

    /// The readable side advertised a new window
    fn on_window_update(&mut self, window: usize) {
        let _ = window;
    }
}

/// Strategy that never asserts backpressure; all operations have size 1.
#[derive(Clone, Default)]
pub struct NoBackpressureStrategy;

impl<T> QueuingStrategy<T> for NoBackpressureStrategy {}

/// Strategy that asserts backpressure whenever the queue is non-empty,
/// giving at-most-one-batch-in-flight semantics.
#[derive(Clone, Default)]
pub struct NonEmptyBackpressureStrategy;

impl<T> QueuingStrategy<T> for NonEmptyBackpressureStrategy {
    fn should_apply_backpressure(&self, queue_size: usize) -> bool {
        queue_size > 0
    }
}

/// Byte-counting strategy with an adjustable window.
///
/// Chunks are sized by byte length; backpressure is asserted once the queued
/// bytes reach the window, and `space` reports the remaining credit.
#[derive(Clone)]
pub struct AdjustableByteStrategy {
    window: usize,
}

impl AdjustableByteStrategy {
    pub const fn new(window: usize) -> Self {
        Self { window }
    }
}

impl QueuingStrategy<Vec<u8>> for AdjustableByteStrategy {
    fn size(&self, chunk: &Vec<u8>) -> Result<usize, StreamError> {
        Ok(chunk.len())
    }

    fn should_apply_backpressure(&self, queue_size: usize) -> bool {
        queue_size >= self.window
    }

    fn space(&self, queue_size: usize) -> Option<usize> {
        Some(self.window.saturating_sub(queue_size))
    }

    fn on_window_update(&mut self, window: usize) {
        self.window = window;
    }
}

/// String-length strategy with an adjustable window.
#[derive(Clone)]
pub struct AdjustableStringStrategy {
    window: usize,
}

impl AdjustableStringStrategy {
    pub const fn new(window: usize) -> Self {
        Self { window }
    }
}

impl QueuingStrategy<String> for AdjustableStringStrategy {
    fn size(&self, chunk: &String) -> Result<usize, StreamError> {
        Ok(chunk.len())
    }

    fn should_apply_backpressure(&self, queue_size: usize) -> bool {
        queue_size >= self.window
    }

    fn space(&self, queue_size: usize) -> Option<usize> {
        Some(self.window.saturating_sub(queue_size))
    }

    fn on_window_update(&mut self, window: usize) {
        self.window = window;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capabilities() {
        struct Bare;
        impl QueuingStrategy<u32> for Bare {}

        let s = Bare;
        assert_eq!(s.size(&7).unwrap(), 1);
        assert!(!s.should_apply_backpressure(1000));
        assert_eq!(s.space(1000), None);
    }

    #[test]
    fn non_empty_strategy_asserts_backpressure_on_any_content() {
        let s = NonEmptyBackpressureStrategy;
        assert!(!QueuingStrategy::<String>::should_apply_backpressure(&s, 0));
        assert!(QueuingStrategy::<String>::should_apply_backpressure(&s, 1));
    }

    #[test]
    fn adjustable_byte_strategy_window_arithmetic() {
        let mut s = AdjustableByteStrategy::new(5);
        assert_eq!(s.size(&vec![0u8; 10]).unwrap(), 10);
        assert!(!s.should_apply_backpressure(4));
        assert!(s.should_apply_backpressure(5));
        assert_eq!(s.space(3), Some(2));
        assert_eq!(s.space(9), Some(0));

        s.on_window_update(15);
        assert!(!s.should_apply_backpressure(10));
        assert_eq!(s.space(10), Some(5));
    }

    #[test]
    fn adjustable_string_strategy_sizes_by_length() {
        let s = AdjustableStringStrategy::new(20);
        assert_eq!(s.size(&"hello".to_string()).unwrap(), 5);
        assert_eq!(s.space(10), Some(10));
    }
}
