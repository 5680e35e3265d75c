// 数据库抽象层模块

pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteDatabase;
pub use traits::{
    Database, NewReceipt, ReceiptFilter, ReceiptMeta, ReceiptRecord, TagRecord, MAX_TAG_NAME_LEN,
};
