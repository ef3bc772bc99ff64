pub mod exchange;
pub mod okx;
pub mod retry;

pub use exchange::{CandleQuery, Exchange};
pub use okx::{InstrumentSpec, OkxClient, OkxCredentials};
pub use retry::RetryPolicy;
