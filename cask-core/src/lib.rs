mod as_value;
mod batch;
mod builder;
pub mod codec;
mod coercion;
mod column_type;
mod context;
mod dao;
mod data;
mod entity;
mod error;
mod interceptor;
mod operation;
mod record;
mod result_stream;
mod session;
mod statement;
mod table_ref;
mod util;
mod value;
pub mod writer;

pub use ::anyhow::Context;
pub use as_value::*;
pub use batch::*;
pub use builder::*;
pub use coercion::*;
pub use column_type::*;
pub use context::*;
pub use dao::*;
pub use data::*;
pub use entity::*;
pub use error::*;
pub use interceptor::*;
pub use operation::*;
pub use record::*;
pub use result_stream::*;
pub use session::*;
pub use statement::*;
pub use table_ref::*;
pub use util::*;
pub use value::*;
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
