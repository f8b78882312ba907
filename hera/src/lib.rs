//! Hera Database Proxy Driver
//!
//! # Examples
//!
//! ```no_run
//! use hera::Connection;
//!
//! # async fn app() -> hera::Result<()> {
//! let mut conn = Connection::connect("hera://localhost:10101").await?;
//!
//! let stmt = conn.prepare("SELECT id, name FROM post WHERE id > ?");
//! let posts = hera::query(&stmt, &mut conn)
//!     .bind(420)
//!     .fetch_all::<(i64, String)>()
//!     .await?;
//!
//! for (id, name) in posts {
//!     println!("{id}: {name}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Paginated cursor:
//!
//! ```no_run
//! # async fn app(mut conn: hera::Connection) -> hera::Result<()> {
//! let mut stmt = conn.prepare("SELECT name FROM post");
//! stmt.set_fetch_size(100);
//!
//! let mut rows = hera::query(&stmt, &mut conn).fetch().await?;
//!
//! while let Some(row) = rows.next_row().await? {
//!     let name: String = row.try_get(0)?;
//!     println!("{name}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod common;
mod net;
mod ext;

// Protocol
pub mod netstring;
pub mod protocol;

// Encoding
pub mod value;
pub mod types;

// Component
pub mod statement;
pub mod row;
pub mod rows;

// Operation
pub mod transport;
pub mod query;
pub mod transaction;

// Connection
pub mod connection;

mod error;

pub use value::{Param, Value};
pub use row::{Column, Decode, DecodeError, FromRow, Row};
pub use rows::Rows;
pub use statement::Statement;
pub use netstring::Frame;

pub use net::Socket;
pub use connection::{Config, Connection, Signal};
pub use transaction::Transaction;
#[doc(inline)]
pub use query::query;
pub use error::{Error, ErrorKind, Result};
