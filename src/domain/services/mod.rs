mod backoff;

pub use backoff::BackoffPolicy;
