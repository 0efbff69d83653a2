pub mod error;
pub mod query;
pub mod store;
pub mod supabase;

pub use error::DatabaseError;
pub use query::Query;
pub use store::{
    decode_row, decode_rows, fetch_all, fetch_by_id, insert_record, update_record, BackingStore,
    SupabaseStore,
};
pub use supabase::SupabaseClient;
