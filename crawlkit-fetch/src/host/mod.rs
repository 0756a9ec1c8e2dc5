//! Host APIs used by the backends.
//!
//! - [`http`] - HTTP client with tracing, user agent and TLS toggle
//! - [`process`] - Child processes in their own process group
//! - [`webdriver`] - WebDriver executable and session
//! - [`perflog`] - Status inference from browser performance logs
//! - [`socket`] - Frame-stream exchange over TCP

pub mod http;
pub mod perflog;
pub mod process;
pub mod socket;
pub mod webdriver;

pub use http::HttpClient;
pub use perflog::{DocumentResponse, LogEntry, infer_status_code, last_html_response};
pub use process::{ChildGuard, ProcessOutput, ProcessRunner};
pub use socket::{exchange, read_message, write_message};
pub use webdriver::{DriverProcess, WebDriverSession};
