use std::{error::Error, fmt, sync::Arc};

#[derive(Debug, Clone)]
pub enum StreamError {
    /// The half was in a state that forbids the attempted operation
    InvalidState(&'static str),
    /// The linked status already reached a terminal state
    AlreadyCompleted,
    /// The stream is claimed by an exclusive reader
    Locked,
    /// The writable side was closed
    Closed,
    /// Terminated by the consumer, with an optional reason
    Canceled(Option<String>),
    /// Terminated by the producer, with an optional reason
    Aborted(Option<String>),
    Other(Arc<dyn Error + Send + Sync>),
}

impl StreamError {
    /// Wrap any error type into `StreamError`
    pub fn other<E>(e: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        StreamError::Other(Arc::new(e))
    }

    /// Wrap a boxed error
    pub fn other_boxed(e: Box<dyn Error + Send + Sync>) -> Self {
        StreamError::Other(e.into())
    }
}

impl From<&str> for StreamError {
    fn from(s: &str) -> Self {
        #[derive(Debug)]
        struct SimpleError(String);
        impl fmt::Display for SimpleError {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
        impl Error for SimpleError {}
        StreamError::Other(Arc::new(SimpleError(s.to_string())))
    }
}

impl From<String> for StreamError {
    fn from(s: String) -> Self {
        StreamError::from(s.as_str())
    }
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        StreamError::Other(Arc::new(e))
    }
}

impl From<Box<dyn Error + Send + Sync>> for StreamError {
    fn from(e: Box<dyn Error + Send + Sync>) -> Self {
        StreamError::Other(e.into())
    }
}

/// Macro for users to add direct `From` implementations for their error types.
/// This allows using `?` directly without `.map_err(StreamError::other)`.
///
/// # Example
/// ```ignore
/// use operation_streams::{StreamError, impl_stream_error_from};
///
/// impl_stream_error_from!(
///     serde_json::Error,
///     reqwest::Error,
///     your_custom::Error,
/// );
///
/// // Now you can use ? directly:
/// fn example() -> Result<(), StreamError> {
///     let data = serde_json::from_str("{}")?;  // Direct ? works!
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! impl_stream_error_from {
    ($($error_type:ty),* $(,)?) => {
        $(
            impl From<$error_type> for $crate::streams::error::StreamError {
                fn from(e: $error_type) -> Self {
                    $crate::streams::error::StreamError::Other(std::sync::Arc::new(e))
                }
            }
        )*
    };
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::InvalidState(detail) => {
                write!(f, "Operation not permitted in this state: {}", detail)
            }
            StreamError::AlreadyCompleted => {
                write!(f, "Operation status already reached a terminal state")
            }
            StreamError::Locked => write!(f, "Stream is locked to an exclusive reader"),
            StreamError::Closed => write!(f, "Stream is closed"),
            StreamError::Canceled(Some(reason)) => {
                write!(f, "Stream was canceled: {}", reason)
            }
            StreamError::Canceled(None) => write!(f, "Stream was canceled"),
            StreamError::Aborted(Some(reason)) => write!(f, "Stream was aborted: {}", reason),
            StreamError::Aborted(None) => write!(f, "Stream was aborted"),
            StreamError::Other(err) => write!(f, "{}", err),
        }
    }
}

impl Error for StreamError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StreamError::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_conversions_work() {
        let _: StreamError = "error message".into();
        let _: StreamError = String::from("error").into();

        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "io error");
        let converted: StreamError = io_err.into();
        assert!(converted.source().is_some(), "wrapped errors keep their source");

        // the protocol's own variants render their detail and carry no source
        for (err, rendered) in [
            (
                StreamError::InvalidState("readable side has no operation"),
                "Operation not permitted in this state: readable side has no operation",
            ),
            (
                StreamError::AlreadyCompleted,
                "Operation status already reached a terminal state",
            ),
            (
                StreamError::Locked,
                "Stream is locked to an exclusive reader",
            ),
            (StreamError::Closed, "Stream is closed"),
        ] {
            assert_eq!(err.to_string(), rendered);
            assert!(err.source().is_none());
        }
    }

    #[test]
    fn test_question_mark_works() -> Result<(), Box<dyn Error>> {
        fn checked_window(raw: usize, limit: usize) -> Result<usize, StreamError> {
            if raw > limit {
                return Err(StreamError::InvalidState("window exceeds the limit"));
            }
            Ok(raw)
        }

        fn caller(raw: usize) -> Result<usize, StreamError> {
            let window = checked_window(raw, 64)?;
            Ok(window * 2)
        }

        // `?` propagates StreamError between fallible layers and into
        // Box<dyn Error> at the test boundary
        assert_eq!(caller(8)?, 16);
        assert!(matches!(caller(65), Err(StreamError::InvalidState(_))));
        Ok(())
    }

    #[test]
    fn test_macro_usage_example() -> Result<(), Box<dyn Error>> {
        #[derive(Debug)]
        struct WindowParseError(String);
        impl fmt::Display for WindowParseError {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "bad window: {}", self.0)
            }
        }
        impl Error for WindowParseError {}

        impl_stream_error_from!(WindowParseError);

        fn parse_window(raw: &str) -> Result<usize, StreamError> {
            let window = raw
                .parse::<usize>()
                .map_err(|e| WindowParseError(e.to_string()))?; // works via macro
            Ok(window)
        }

        assert_eq!(parse_window("12")?, 12);
        assert!(matches!(parse_window("twelve"), Err(StreamError::Other(_))));
        Ok(())
    }

    #[test]
    fn reason_display_round_trips() {
        let e = StreamError::Aborted(Some("disk full".into()));
        assert_eq!(e.to_string(), "Stream was aborted: disk full");

        let e = StreamError::Canceled(None);
        assert_eq!(e.to_string(), "Stream was canceled");
    }
}
