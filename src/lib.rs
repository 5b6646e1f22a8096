pub mod cache;
pub mod config;
pub mod connection;
pub mod exception;
pub mod files;
pub mod mime;
pub mod net;
pub mod param;
pub mod pool;
pub mod queue;
pub mod request;
pub mod response;
pub mod server;
pub mod util;

pub use cache::PageCache;
pub use config::Config;
pub use connection::{Connection, ServerContext};
pub use exception::Exception;
pub use files::{FsStore, Store};
pub use param::{HttpRequestMethod, HttpVersion};
pub use pool::ThreadPool;
pub use queue::TaskQueue;
pub use request::Request;
pub use response::Response;
pub use server::{Server, ServerHandle};
pub use util::HtmlBuilder;
