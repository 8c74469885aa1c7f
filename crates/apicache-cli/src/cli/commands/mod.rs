mod cache;
mod context;
mod dispatch;
mod request;

pub use dispatch::dispatch;
