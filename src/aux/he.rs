use std::{any::Any, error::Error, fmt};

/// Defines an error type carrying a debug-formatted context string.
macro_rules! make_custom_error3 {
    ($n:ident, $($error_msg:tt)*) => {
        pub struct $n {
            cxt: String,
        }

        impl $n {
            pub fn new<C: fmt::Debug + ?Sized>(cxt: &C) -> Self {
                Self {
                    cxt: format!("{:?}", cxt),
                }
            }

            pub fn context(&self) -> &str {
                &self.cxt
            }
        }

        impl fmt::Display for $n {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, $($error_msg)*).and_then(|_| write!(f, ": {}", self.cxt))
            }
        }

        impl fmt::Debug for $n {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($n)).field("cxt", &self.cxt).finish()
            }
        }

        impl Error for $n {}
    };
}

make_custom_error3!(TaskPanicked, "pooled task panicked");

impl TaskPanicked {
    /// Builds the error from a payload caught with `catch_unwind`.
    pub fn from_payload(task_index: usize, payload: &(dyn Any + Send)) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_string()
        };

        Self {
            cxt: format!("task {}: {}", task_index, msg),
        }
    }
}
